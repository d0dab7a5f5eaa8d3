//! Interview session state.
//!
//! A [`Session`] is a plain serializable value: storage and transport layers
//! can round-trip it without knowing anything about the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::answer::AnswerValue;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    InProgress,
    Complete,
    Abandoned,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::InProgress => write!(f, "in_progress"),
            SessionStatus::Complete => write!(f, "complete"),
            SessionStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_progress" | "in-progress" => Ok(SessionStatus::InProgress),
            "complete" | "completed" => Ok(SessionStatus::Complete),
            "abandoned" => Ok(SessionStatus::Abandoned),
            _ => Err(format!("Unknown session status: {}", s)),
        }
    }
}

/// How much of the bank an interview walks through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Required questions only
    Quick,
    /// Every question, optional ones may be skipped
    #[default]
    Interactive,
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionMode::Quick => write!(f, "quick"),
            SessionMode::Interactive => write!(f, "interactive"),
        }
    }
}

impl std::str::FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quick" => Ok(SessionMode::Quick),
            "interactive" => Ok(SessionMode::Interactive),
            _ => Err(format!("Unknown session mode: {}", s)),
        }
    }
}

/// Kind of component being designed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Component,
    Widget,
    Service,
    Agent,
    Container,
    MobileComponent,
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentType::Component => write!(f, "component"),
            ComponentType::Widget => write!(f, "widget"),
            ComponentType::Service => write!(f, "service"),
            ComponentType::Agent => write!(f, "agent"),
            ComponentType::Container => write!(f, "container"),
            ComponentType::MobileComponent => write!(f, "mobile_component"),
        }
    }
}

impl std::str::FromStr for ComponentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "component" => Ok(ComponentType::Component),
            "widget" => Ok(ComponentType::Widget),
            "service" => Ok(ComponentType::Service),
            "agent" => Ok(ComponentType::Agent),
            "container" => Ok(ComponentType::Container),
            "mobile_component" | "mobile" => Ok(ComponentType::MobileComponent),
            _ => Err(format!("Unknown component type: {}", s)),
        }
    }
}

/// A recorded answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,
    pub value: AnswerValue,
    pub timestamp: DateTime<Utc>,
}

/// Per-interview state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub component_name: String,
    pub component_type: ComponentType,
    #[serde(default)]
    pub mode: SessionMode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: SessionStatus,
    /// Answers in the order they were given
    #[serde(default)]
    pub answers: Vec<Answer>,
    /// Every question presented, answered or skipped, in order
    #[serde(default)]
    pub asked_question_ids: Vec<String>,
    /// Optional questions the user declined to answer
    #[serde(default)]
    pub skipped_question_ids: Vec<String>,
}

impl Session {
    pub fn new(
        component_name: impl Into<String>,
        component_type: ComponentType,
        mode: SessionMode,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: generate_session_id(),
            component_name: component_name.into(),
            component_type,
            mode,
            created_at: now,
            updated_at: now,
            status: SessionStatus::InProgress,
            answers: Vec::new(),
            asked_question_ids: Vec::new(),
            skipped_question_ids: Vec::new(),
        }
    }

    pub fn answer(&self, question_id: &str) -> Option<&Answer> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        self.answer(question_id).is_some()
    }

    pub fn is_asked(&self, question_id: &str) -> bool {
        self.asked_question_ids.iter().any(|id| id == question_id)
    }

    pub fn is_skipped(&self, question_id: &str) -> bool {
        self.skipped_question_ids.iter().any(|id| id == question_id)
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == SessionStatus::InProgress
    }

    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Complete
    }

    pub(crate) fn push_answer(&mut self, question_id: &str, value: AnswerValue) {
        let now = Utc::now();
        self.answers.push(Answer {
            question_id: question_id.to_string(),
            value,
            timestamp: now,
        });
        self.skipped_question_ids.retain(|id| id != question_id);
        if !self.is_asked(question_id) {
            self.asked_question_ids.push(question_id.to_string());
        }
        self.updated_at = now;
    }

    pub(crate) fn push_skip(&mut self, question_id: &str) {
        self.asked_question_ids.push(question_id.to_string());
        self.skipped_question_ids.push(question_id.to_string());
        self.updated_at = Utc::now();
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

fn generate_session_id() -> String {
    format!("interview-{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_empty_and_in_progress() {
        let session = Session::new("rate-limiter", ComponentType::Service, SessionMode::default());
        assert!(session.session_id.starts_with("interview-"));
        assert_eq!(session.status, SessionStatus::InProgress);
        assert_eq!(session.mode, SessionMode::Interactive);
        assert!(session.answers.is_empty());
        assert!(session.asked_question_ids.is_empty());
        assert_eq!(session.created_at, session.updated_at);
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = Session::new("a", ComponentType::Widget, SessionMode::Quick);
        let b = Session::new("a", ComponentType::Widget, SessionMode::Quick);
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn test_push_answer_and_skip() {
        let mut session = Session::new("cache", ComponentType::Component, SessionMode::Interactive);
        session.push_answer("q1", AnswerValue::text("Caches things"));
        session.push_skip("q2");

        assert!(session.is_answered("q1"));
        assert!(session.is_asked("q1"));
        assert!(session.is_asked("q2"));
        assert!(session.is_skipped("q2"));
        assert!(!session.is_answered("q2"));
        assert_eq!(session.asked_question_ids, vec!["q1", "q2"]);
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut session = Session::new("queue", ComponentType::Service, SessionMode::Quick);
        session.push_answer("q1", AnswerValue::multi_choice(["a", "b"]));
        session.push_answer("q2", AnswerValue::Boolean(false));
        session.set_status(SessionStatus::Complete);

        let json = serde_json::to_string(&session).unwrap();
        let parsed: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, session);
        assert!(json.contains(r#""status":"complete""#));
        assert!(json.contains(r#""component_type":"service""#));
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(
            "mobile-component".parse::<ComponentType>().unwrap(),
            ComponentType::MobileComponent
        );
        assert_eq!("quick".parse::<SessionMode>().unwrap(), SessionMode::Quick);
        assert_eq!(
            "in_progress".parse::<SessionStatus>().unwrap(),
            SessionStatus::InProgress
        );
        assert!("gadget".parse::<ComponentType>().is_err());
        assert_eq!(SessionStatus::Abandoned.to_string(), "abandoned");
    }
}
