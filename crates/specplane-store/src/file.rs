use std::fs;
use std::path::{Path, PathBuf};

use specplane_core::Session;

use crate::error::{Result, StoreError};
use crate::{check_session_id, SessionFilter, SessionStore, SessionSummary};

/// Stores each session as `<session_id>.json` in one directory.
pub struct FileSessionStore {
    sessions_dir: PathBuf,
}

impl FileSessionStore {
    /// Use `~/.local/share/specplane/sessions`.
    pub fn new() -> Result<Self> {
        let data_dir = dirs::data_local_dir().ok_or(StoreError::NoDataDir)?;
        Ok(Self {
            sessions_dir: data_dir.join("specplane").join("sessions"),
        })
    }

    /// Create a store over a custom directory (useful for testing).
    pub fn with_dir(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
        }
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    fn session_path(&self, session_id: &str) -> Result<PathBuf> {
        check_session_id(session_id)?;
        Ok(self.sessions_dir.join(format!("{}.json", session_id)))
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, session: &Session) -> Result<()> {
        let path = self.session_path(&session.session_id)?;
        fs::create_dir_all(&self.sessions_dir)?;

        // Atomic replace
        let json = serde_json::to_string_pretty(session)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;

        tracing::debug!(session_id = %session.session_id, path = ?path, "Session saved");
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Session> {
        let path = self.session_path(session_id)?;
        if !path.exists() {
            return Err(StoreError::NotFound(session_id.to_string()));
        }

        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn list(&self, filter: &SessionFilter) -> Result<Vec<SessionSummary>> {
        if !self.sessions_dir.exists() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.sessions_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let parsed = fs::read_to_string(&path)
                .map_err(StoreError::from)
                .and_then(|content| Ok(serde_json::from_str::<Session>(&content)?));
            match parsed {
                Ok(session) => {
                    let summary = SessionSummary::from(&session);
                    if filter.matches(&summary) {
                        summaries.push(summary);
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to parse session {:?}: {}", path, e);
                }
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(limit) = filter.limit {
            summaries.truncate(limit);
        }

        Ok(summaries)
    }

    fn delete(&self, session_id: &str) -> Result<bool> {
        let path = self.session_path(session_id)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
