//! # specplane-core
//!
//! Interview engine that turns answers to a question bank into a validated
//! specification document.
//!
//! ## Key Types
//!
//! - [`QuestionBank`] - Immutable, validated catalog of questions
//! - [`Session`] - Per-interview state, a plain serde value
//! - [`InterviewEngine`] - Question selection and answer recording
//! - [`CoverageScorer`] - Per-category completeness and risk
//! - [`SpecGenerator`] - Renders complete sessions into a [`SpecDocument`]
//! - [`Orchestrator`] - Sequences the above with state checks and events
//!
//! ## Flow
//!
//! ```text
//! start ──► advance/skip ──► ... ──► (complete) ──► finish
//!                │                                    │
//!                └── ValidationError: session kept     └── SpecDocument + CoverageReport
//! ```

pub mod answer;
pub mod bank;
pub mod coverage;
pub mod engine;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod prompt;
pub mod session;

pub use answer::AnswerValue;
pub use bank::{AnswerShape, Question, QuestionBank};
pub use coverage::{
    CoverageGap, CoverageReport, CoverageScorer, RiskLevel, DEFAULT_AT_RISK_THRESHOLD,
};
pub use engine::{InterviewEngine, Progress, Reachability};
pub use error::{
    BankLoadError, InterviewError, SchemaValidationError, UnresolvedDependency, ValidationError,
};
pub use generator::{
    validate_document, CategoryRoles, SchemaViolation, SectionEntry, SpecDocument, SpecGenerator,
    SpecSection, SCHEMA_VERSION, SUPPORTED_SCHEMA_VERSIONS,
};
pub use orchestrator::Orchestrator;
pub use session::{Answer, ComponentType, Session, SessionMode, SessionStatus};
