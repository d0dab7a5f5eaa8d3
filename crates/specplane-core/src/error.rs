use thiserror::Error;

use crate::bank::AnswerShape;
use crate::generator::SchemaViolation;
use crate::session::SessionStatus;

/// A dependency that does not point at an earlier question in the bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedDependency {
    pub question_id: String,
    pub depends_on: String,
}

impl std::fmt::Display for UnresolvedDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.question_id, self.depends_on)
    }
}

/// Malformed or inconsistent question bank. Fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BankLoadError {
    #[error("Failed to parse question bank: {0}")]
    Parse(String),

    #[error("Question bank contains no questions")]
    Empty,

    #[error("Invalid question '{id}': {reason}")]
    InvalidQuestion { id: String, reason: String },

    #[error("Duplicate question ids: {}", .0.join(", "))]
    DuplicateIds(Vec<String>),

    #[error(
        "Dependencies must reference an earlier question: {}",
        .0.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
    )]
    UnresolvedDependencies(Vec<UnresolvedDependency>),
}

/// An answer (or skip request) that does not fit the question it targets.
///
/// Recoverable: the caller re-prompts with the same question.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unknown question: {0}")]
    UnknownQuestion(String),

    #[error("Question '{question_id}' expects a {expected} answer, got {actual}")]
    ShapeMismatch {
        question_id: String,
        expected: AnswerShape,
        actual: AnswerShape,
    },

    #[error(
        "'{value}' is not a valid choice for '{question_id}' (expected one of: {})",
        .allowed.join(", ")
    )]
    InvalidChoice {
        question_id: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("'{value}' is selected more than once for '{question_id}'")]
    DuplicateSelection { question_id: String, value: String },

    #[error("Answer to '{0}' cannot be empty")]
    EmptyAnswer(String),

    #[error("Could not read '{input}' as a {expected} answer for '{question_id}'")]
    Unparseable {
        question_id: String,
        input: String,
        expected: AnswerShape,
    },

    #[error("Question '{0}' has already been asked")]
    AlreadyAsked(String),

    #[error("Question '{0}' is not reachable in this session")]
    NotReachable(String),

    #[error("Question '{0}' is required and cannot be skipped")]
    RequiredQuestion(String),

    #[error("Component name cannot be empty")]
    EmptyComponentName,
}

/// A generated document that failed structural validation.
#[derive(Error, Debug, Clone, PartialEq)]
#[error(
    "Spec document failed schema validation ({} violation(s)): {}",
    .violations.len(),
    .violations.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("; ")
)]
pub struct SchemaValidationError {
    pub violations: Vec<SchemaViolation>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterviewError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Session '{session_id}' is {actual}, expected {expected}")]
    InvalidState {
        session_id: String,
        expected: SessionStatus,
        actual: SessionStatus,
    },

    #[error("Session '{session_id}' is {status}; a complete session is required")]
    IncompleteSession {
        session_id: String,
        status: SessionStatus,
    },

    #[error(transparent)]
    SchemaValidation(#[from] SchemaValidationError),

    #[error(transparent)]
    BankLoad(#[from] BankLoadError),
}

impl InterviewError {
    /// Stable name of the failure kind, printed by the CLI.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidState { .. } => "invalid_state_error",
            Self::IncompleteSession { .. } => "incomplete_session_error",
            Self::SchemaValidation(_) => "schema_validation_error",
            Self::BankLoad(_) => "bank_load_error",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::BankLoad(_) => 3,
            Self::InvalidState { .. } => 4,
            Self::IncompleteSession { .. } => 5,
            Self::SchemaValidation(_) => 6,
        }
    }

    /// Whether the caller can retry after fixing its input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::IncompleteSession { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_exit_codes_are_distinct() {
        let errors = [
            InterviewError::Validation(ValidationError::EmptyComponentName),
            InterviewError::BankLoad(BankLoadError::Empty),
            InterviewError::InvalidState {
                session_id: "s".to_string(),
                expected: SessionStatus::InProgress,
                actual: SessionStatus::Complete,
            },
            InterviewError::IncompleteSession {
                session_id: "s".to_string(),
                status: SessionStatus::InProgress,
            },
            InterviewError::SchemaValidation(SchemaValidationError { violations: vec![] }),
        ];

        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|c| *c != 0));

        let mut kinds: Vec<&str> = errors.iter().map(|e| e.kind()).collect();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_bank_error_lists_offending_ids() {
        let err = BankLoadError::UnresolvedDependencies(vec![
            UnresolvedDependency {
                question_id: "q2".to_string(),
                depends_on: "q9".to_string(),
            },
            UnresolvedDependency {
                question_id: "q3".to_string(),
                depends_on: "q3".to_string(),
            },
        ]);
        let message = err.to_string();
        assert!(message.contains("q2 -> q9"));
        assert!(message.contains("q3 -> q3"));

        let dup = BankLoadError::DuplicateIds(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(dup.to_string(), "Duplicate question ids: a, b");
    }

    #[test]
    fn test_recoverable() {
        assert!(InterviewError::Validation(ValidationError::EmptyComponentName).is_recoverable());
        assert!(!InterviewError::BankLoad(BankLoadError::Empty).is_recoverable());
    }
}
