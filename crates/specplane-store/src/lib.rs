//! # specplane-store
//!
//! Session persistence for specplane.
//!
//! The core crate never performs I/O; this crate supplies the
//! [`SessionStore`] interface plus two adapters:
//!
//! - [`FileSessionStore`] - One pretty-printed JSON file per session
//! - [`SqliteSessionStore`] - Sessions as JSON blobs with indexed summary columns
//!
//! Every adapter round-trips sessions exactly: `load(save(s)) == s`.

mod error;
mod file;
mod sqlite;

pub use error::{Result, StoreError};
pub use file::FileSessionStore;
pub use sqlite::SqliteSessionStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use specplane_core::{ComponentType, Session, SessionMode, SessionStatus};

/// Save/load interface for interview sessions.
pub trait SessionStore: Send + Sync {
    /// Insert or replace the session with the same id.
    fn save(&self, session: &Session) -> Result<()>;

    fn load(&self, session_id: &str) -> Result<Session>;

    /// Sessions matching the filter, most recently updated first.
    fn list(&self, filter: &SessionFilter) -> Result<Vec<SessionSummary>>;

    /// Returns `false` when no such session existed.
    fn delete(&self, session_id: &str) -> Result<bool>;
}

/// Lightweight listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub component_name: String,
    pub component_type: ComponentType,
    pub mode: SessionMode,
    pub status: SessionStatus,
    pub answered: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.session_id.clone(),
            component_name: session.component_name.clone(),
            component_type: session.component_type,
            mode: session.mode,
            status: session.status,
            answered: session.answers.len(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

/// Filter options for listing sessions
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    /// Case-insensitive substring of the component name
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl SessionFilter {
    pub fn matches(&self, summary: &SessionSummary) -> bool {
        if let Some(status) = self.status {
            if summary.status != status {
                return false;
            }
        }

        if let Some(ref search) = self.search {
            if !summary
                .component_name
                .to_lowercase()
                .contains(&search.to_lowercase())
            {
                return false;
            }
        }

        true
    }
}

/// Session ids become file names; keep them to a safe alphabet.
pub(crate) fn check_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_session_id() {
        assert!(check_session_id("interview-0a1b2c").is_ok());
        assert!(check_session_id("").is_err());
        assert!(check_session_id("../etc/passwd").is_err());
        assert!(check_session_id("a/b").is_err());
    }

    #[test]
    fn test_filter_matches() {
        let session = Session::new("Rate Limiter", ComponentType::Service, SessionMode::Quick);
        let summary = SessionSummary::from(&session);

        assert!(SessionFilter::default().matches(&summary));
        assert!(SessionFilter {
            search: Some("limit".to_string()),
            ..Default::default()
        }
        .matches(&summary));
        assert!(!SessionFilter {
            status: Some(SessionStatus::Complete),
            ..Default::default()
        }
        .matches(&summary));
    }
}
