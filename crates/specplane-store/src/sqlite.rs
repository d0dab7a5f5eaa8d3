use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use specplane_core::Session;

use crate::error::{Result, StoreError};
use crate::{SessionFilter, SessionStore, SessionSummary};

/// Sessions in SQLite: the full session as a JSON blob plus summary columns
/// for listing without deserializing every row.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    /// Open or create the database at `~/.local/share/specplane/specplane.db`.
    pub fn open() -> Result<Self> {
        let db_path = Self::default_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open_at(&db_path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir().ok_or(StoreError::NoDataDir)?;
        Ok(data_dir.join("specplane").join("specplane.db"))
    }

    fn init_schema(conn: &Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                component_name TEXT NOT NULL,
                component_type TEXT NOT NULL,
                mode TEXT NOT NULL,
                status TEXT NOT NULL,
                answered INTEGER NOT NULL,
                state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_status ON sessions(status);
            CREATE INDEX IF NOT EXISTS idx_sessions_updated_at ON sessions(updated_at DESC);
            "#,
        )
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl SessionStore for SqliteSessionStore {
    fn save(&self, session: &Session) -> Result<()> {
        let state = serde_json::to_string(session)?;
        self.conn()?.execute(
            r#"
            INSERT INTO sessions (id, component_name, component_type, mode, status, answered, state, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                component_name = excluded.component_name,
                component_type = excluded.component_type,
                mode = excluded.mode,
                status = excluded.status,
                answered = excluded.answered,
                state = excluded.state,
                updated_at = excluded.updated_at
            "#,
            params![
                session.session_id,
                session.component_name,
                session.component_type.to_string(),
                session.mode.to_string(),
                session.status.to_string(),
                session.answers.len() as i64,
                state,
                format_timestamp(&session.created_at),
                format_timestamp(&session.updated_at),
            ],
        )?;

        tracing::debug!(session_id = %session.session_id, "Session saved");
        Ok(())
    }

    fn load(&self, session_id: &str) -> Result<Session> {
        let state: Option<String> = self
            .conn()?
            .query_row(
                "SELECT state FROM sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;

        match state {
            Some(state) => Ok(serde_json::from_str(&state)?),
            None => Err(StoreError::NotFound(session_id.to_string())),
        }
    }

    fn list(&self, filter: &SessionFilter) -> Result<Vec<SessionSummary>> {
        let mut sql = String::from(
            "SELECT id, component_name, component_type, mode, status, answered, created_at, updated_at FROM sessions WHERE 1=1",
        );
        let mut param_values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            param_values.push(Box::new(status.to_string()));
        }

        sql.push_str(" ORDER BY updated_at DESC");

        // Name search goes through SessionFilter::matches, so the limit can
        // only be pushed into SQL when there is no search
        if let (Some(limit), None) = (filter.limit, &filter.search) {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let params: Vec<&dyn rusqlite::ToSql> = param_values.iter().map(|p| p.as_ref()).collect();

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params.as_slice(), SummaryRow::from_row)?;

        let mut summaries = Vec::new();
        for row in rows {
            let row = row?;
            match row.to_summary() {
                Some(summary) if filter.matches(&summary) => summaries.push(summary),
                Some(_) => {}
                None => tracing::warn!("Skipping unreadable session row {}", row.id),
            }
        }

        if let Some(limit) = filter.limit {
            summaries.truncate(limit);
        }

        Ok(summaries)
    }

    fn delete(&self, session_id: &str) -> Result<bool> {
        let rows_affected = self
            .conn()?
            .execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
        Ok(rows_affected > 0)
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Raw summary columns, parsed after the statement finishes
struct SummaryRow {
    id: String,
    component_name: String,
    component_type: String,
    mode: String,
    status: String,
    answered: i64,
    created_at: String,
    updated_at: String,
}

impl SummaryRow {
    fn from_row(row: &rusqlite::Row) -> std::result::Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(0)?,
            component_name: row.get(1)?,
            component_type: row.get(2)?,
            mode: row.get(3)?,
            status: row.get(4)?,
            answered: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn to_summary(&self) -> Option<SessionSummary> {
        Some(SessionSummary {
            session_id: self.id.clone(),
            component_name: self.component_name.clone(),
            component_type: self.component_type.parse().ok()?,
            mode: self.mode.parse().ok()?,
            status: self.status.parse().ok()?,
            answered: usize::try_from(self.answered).ok()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}
