use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Each line type in an interview transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptLine {
    SessionStart {
        timestamp: DateTime<Utc>,
        session_id: String,
        component_name: String,
        component_type: String,
        mode: String,
    },
    Answer {
        timestamp: DateTime<Utc>,
        question_id: String,
        prompt: String,
        answer: String,
    },
    Skip {
        timestamp: DateTime<Utc>,
        question_id: String,
    },
    SessionEnd {
        timestamp: DateTime<Utc>,
        status: String,
        answered: usize,
        aggregate_score: Option<f64>,
    },
}

/// Writes one interview as JSONL to `~/.local/share/specplane/transcripts/`.
pub struct TranscriptWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl TranscriptWriter {
    /// Create a writer in the default transcripts directory. The file name is
    /// the current UTC timestamp plus a short hash of the component name.
    pub fn new(component_name: &str) -> io::Result<Self> {
        Self::with_dir(&Self::transcripts_dir()?, component_name)
    }

    pub fn with_dir(dir: &Path, component_name: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let timestamp_str = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();

        let mut hasher = Sha256::new();
        hasher.update(component_name.as_bytes());
        let hash = hex::encode(hasher.finalize());
        let short_hash = &hash[..6];

        let path = dir.join(format!("{}_{}.jsonl", timestamp_str, short_hash));
        // Same component in the same second shares a file; append to it
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_start(
        &self,
        session_id: &str,
        component_name: &str,
        component_type: &str,
        mode: &str,
    ) {
        self.write_line(&TranscriptLine::SessionStart {
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
            component_name: component_name.to_string(),
            component_type: component_type.to_string(),
            mode: mode.to_string(),
        });
    }

    pub fn write_answer(&self, question_id: &str, prompt: &str, answer: &str) {
        self.write_line(&TranscriptLine::Answer {
            timestamp: Utc::now(),
            question_id: question_id.to_string(),
            prompt: prompt.to_string(),
            answer: answer.to_string(),
        });
    }

    pub fn write_skip(&self, question_id: &str) {
        self.write_line(&TranscriptLine::Skip {
            timestamp: Utc::now(),
            question_id: question_id.to_string(),
        });
    }

    pub fn write_end(&self, status: &str, answered: usize, aggregate_score: Option<f64>) {
        self.write_line(&TranscriptLine::SessionEnd {
            timestamp: Utc::now(),
            status: status.to_string(),
            answered,
            aggregate_score,
        });
    }

    fn write_line(&self, line: &TranscriptLine) {
        if let Ok(json) = serde_json::to_string(line) {
            if let Ok(mut writer) = self.file.lock() {
                let _ = writeln!(writer, "{}", json);
                let _ = writer.flush();
            }
        }
    }

    fn transcripts_dir() -> io::Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine data directory",
            )
        })?;
        Ok(data_dir.join("specplane").join("transcripts"))
    }
}
