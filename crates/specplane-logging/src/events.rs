use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Structured log events for the interview lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    SessionStarted {
        session_id: String,
        component_name: String,
        component_type: String,
        mode: String,
        bank_size: usize,
    },
    AnswerRecorded {
        session_id: String,
        question_id: String,
        answered: usize,
    },
    /// Validation failure; the session is unchanged
    AnswerRejected {
        session_id: String,
        question_id: String,
        reason: String,
    },
    QuestionSkipped {
        session_id: String,
        question_id: String,
    },
    SessionCompleted {
        session_id: String,
        answered: usize,
        skipped: usize,
    },
    SessionAbandoned {
        session_id: String,
        answered: usize,
    },
    SpecGenerated {
        session_id: String,
        component_name: String,
        sections: usize,
        aggregate_score: f64,
        risk_level: String,
    },
    ArtifactsWritten {
        session_id: String,
        output_dir: PathBuf,
        files: usize,
    },
    ErrorEncountered {
        session_id: Option<String>,
        error: String,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for interview events - console output plus optional file sink
pub struct Logger {
    format: LogFormat,
    console: bool,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            console: true,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            console: true,
            file_writer: Some(Mutex::new(file)),
        })
    }

    /// Stop echoing events to stderr. The file sink, if any, keeps writing.
    pub fn without_console(mut self) -> Self {
        self.console = false;
        self
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    pub fn log(&self, event: &LogEvent) {
        // File output is always JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                let json = event.with_timestamp();
                let _ = writeln!(file, "{}", json);
            }
        }

        if !self.console {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{}", json);
        }
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::SessionStarted {
                session_id,
                component_name,
                component_type,
                mode,
                bank_size,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} {} {}",
                    "▶".bright_blue(),
                    "Interview".bold().bright_white(),
                    format!("{} ({})", component_name, component_type).bright_cyan()
                );
                let _ = writeln!(
                    stderr,
                    "  {} {}  {} {}  {} {}",
                    "Session:".dimmed(),
                    session_id.dimmed(),
                    "Mode:".dimmed(),
                    mode,
                    "Questions:".dimmed(),
                    bank_size
                );
                let _ = writeln!(stderr);
            }
            LogEvent::AnswerRecorded { .. } => {
                // The prompt itself shows the answer
            }
            LogEvent::AnswerRejected { reason, .. } => {
                let _ = writeln!(stderr, "  {} {}", "✗".bright_red(), reason.bright_red());
            }
            LogEvent::QuestionSkipped { question_id, .. } => {
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "↷".dimmed(),
                    format!("Skipped {}", question_id).dimmed()
                );
            }
            LogEvent::SessionCompleted {
                answered, skipped, ..
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Interview complete: {} answered, {} skipped",
                    "✓".bright_green(),
                    answered,
                    skipped
                );
            }
            LogEvent::SessionAbandoned {
                session_id,
                answered,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "{} Interview {} abandoned after {} answer(s)",
                    "⚠".bright_yellow(),
                    session_id,
                    answered
                );
            }
            LogEvent::SpecGenerated {
                component_name,
                sections,
                aggregate_score,
                risk_level,
                ..
            } => {
                let score = format!("{:.0}%", aggregate_score * 100.0);
                let styled_score = if *aggregate_score >= 0.9 {
                    score.bright_green()
                } else if *aggregate_score >= 0.5 {
                    score.bright_yellow()
                } else {
                    score.bright_red()
                };
                let _ = writeln!(
                    stderr,
                    "{} Spec for {}: {} section(s), coverage {} ({} risk)",
                    "✓".bright_green(),
                    component_name.bold(),
                    sections,
                    styled_score,
                    risk_level
                );
            }
            LogEvent::ArtifactsWritten {
                output_dir, files, ..
            } => {
                let _ = writeln!(
                    stderr,
                    "  {} {} file(s) written to {}",
                    "📁".dimmed(),
                    files,
                    output_dir.display()
                );
            }
            LogEvent::ErrorEncountered { error, .. } => {
                let _ = writeln!(stderr, "{} {}", "✗".bright_red(), error.bright_red());
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::SessionStarted {
                session_id, mode, ..
            } => format!("[{}] session:start:{} mode={}", timestamp, session_id, mode),
            LogEvent::AnswerRecorded {
                question_id,
                answered,
                ..
            } => format!("[{}] answer:{} n={}", timestamp, question_id, answered),
            LogEvent::AnswerRejected {
                question_id,
                reason,
                ..
            } => format!("[{}] reject:{} {}", timestamp, question_id, reason),
            LogEvent::QuestionSkipped { question_id, .. } => {
                format!("[{}] skip:{}", timestamp, question_id)
            }
            LogEvent::SessionCompleted {
                session_id,
                answered,
                skipped,
            } => format!(
                "[{}] session:done:{} answered={} skipped={}",
                timestamp, session_id, answered, skipped
            ),
            LogEvent::SessionAbandoned { session_id, .. } => {
                format!("[{}] session:abandon:{}", timestamp, session_id)
            }
            LogEvent::SpecGenerated {
                session_id,
                aggregate_score,
                risk_level,
                ..
            } => format!(
                "[{}] spec:{} {:.2} {}",
                timestamp, session_id, aggregate_score, risk_level
            ),
            LogEvent::ArtifactsWritten {
                session_id, files, ..
            } => format!("[{}] write:{} {}f", timestamp, session_id, files),
            LogEvent::ErrorEncountered { session_id, error } => format!(
                "[{}] error:{}:{}",
                timestamp,
                session_id.as_deref().unwrap_or("-"),
                error
            ),
        };
        let _ = writeln!(stderr, "{}", msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tagging() {
        let event = LogEvent::QuestionSkipped {
            session_id: "interview-1".to_string(),
            question_id: "notes".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "question_skipped");
        assert_eq!(json["question_id"], "notes");
    }

    #[test]
    fn test_with_timestamp_adds_field() {
        let event = LogEvent::SessionAbandoned {
            session_id: "interview-1".to_string(),
            answered: 3,
        };
        let value = event.with_timestamp();
        assert!(value["timestamp"].is_string());
        assert_eq!(value["event"], "session_abandoned");
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
