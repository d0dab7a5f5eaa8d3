//! Rendering a complete session into a validated [`SpecDocument`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::answer::AnswerValue;
use crate::bank::QuestionBank;
use crate::coverage::{CoverageReport, CoverageScorer};
use crate::error::{InterviewError, SchemaValidationError};
use crate::session::{ComponentType, Session, SessionStatus};

/// Version written into every generated document
pub const SCHEMA_VERSION: &str = "1.0";

/// Versions this build knows how to validate
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &[SCHEMA_VERSION];

/// Categories with a dedicated place in the generation prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRoles {
    pub purpose: String,
    pub failure_handling: String,
    pub state_management: String,
}

impl Default for CategoryRoles {
    fn default() -> Self {
        Self {
            purpose: "purpose".to_string(),
            failure_handling: "failure_handling".to_string(),
            state_management: "state_management".to_string(),
        }
    }
}

impl CategoryRoles {
    pub fn is_designated(&self, category: &str) -> bool {
        category == self.purpose
            || category == self.failure_handling
            || category == self.state_management
    }
}

/// One answered question inside a section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionEntry {
    pub question_id: String,
    pub prompt: String,
    /// Rendered answer
    pub answer: String,
    /// The typed answer the rendering came from
    pub value: AnswerValue,
}

/// Answers of one category, in bank order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecSection {
    pub name: String,
    pub entries: Vec<SectionEntry>,
}

/// The canonical output of an interview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecDocument {
    pub schema_version: String,
    pub session_id: String,
    pub component_name: String,
    pub component_type: ComponentType,
    /// Sections keyed by category name, in bank order
    pub sections: Vec<SpecSection>,
    pub coverage: CoverageReport,
    pub roles: CategoryRoles,
    pub generated_at: DateTime<Utc>,
}

impl SpecDocument {
    pub fn section(&self, name: &str) -> Option<&SpecSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }

    /// SHA-256 over the document with every timestamp removed.
    ///
    /// Two generations from the same session produce the same digest.
    pub fn content_digest(&self) -> String {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.remove("generated_at");
            if let Some(coverage) = obj.get_mut("coverage").and_then(|c| c.as_object_mut()) {
                coverage.remove("generated_at");
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(value.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// A single broken structural rule
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    #[error("required field '{0}' is empty")]
    MissingField(&'static str),

    #[error("unsupported schema version '{0}'")]
    UnsupportedSchemaVersion(String),

    #[error("section '{0}' is not a known category")]
    UnknownSection(String),

    #[error("section '{0}' appears more than once")]
    DuplicateSection(String),

    #[error("section '{0}' has no entries")]
    EmptySection(String),

    #[error("entry '{question_id}' in section '{section}' does not belong to that category")]
    MisplacedEntry { section: String, question_id: String },

    #[error("{field} = {value} is outside [0, 1]")]
    ScoreOutOfRange { field: String, value: f64 },

    #[error("at-risk category '{0}' has no score")]
    UnknownAtRiskCategory(String),
}

/// Check a document against the fixed structural schema, collecting every
/// violation.
pub fn validate_document(
    document: &SpecDocument,
    bank: &QuestionBank,
) -> Result<(), SchemaValidationError> {
    let mut violations = Vec::new();

    if document.schema_version.trim().is_empty() {
        violations.push(SchemaViolation::MissingField("schema_version"));
    } else if !SUPPORTED_SCHEMA_VERSIONS.contains(&document.schema_version.as_str()) {
        violations.push(SchemaViolation::UnsupportedSchemaVersion(
            document.schema_version.clone(),
        ));
    }
    if document.session_id.trim().is_empty() {
        violations.push(SchemaViolation::MissingField("session_id"));
    }
    if document.component_name.trim().is_empty() {
        violations.push(SchemaViolation::MissingField("component_name"));
    }

    let mut seen = HashSet::new();
    for section in &document.sections {
        if !bank.has_category(&section.name) {
            violations.push(SchemaViolation::UnknownSection(section.name.clone()));
        }
        if !seen.insert(section.name.as_str()) {
            violations.push(SchemaViolation::DuplicateSection(section.name.clone()));
        }
        if section.entries.is_empty() {
            violations.push(SchemaViolation::EmptySection(section.name.clone()));
        }
        for entry in &section.entries {
            let belongs = bank
                .get(&entry.question_id)
                .is_some_and(|q| q.category == section.name);
            if !belongs {
                violations.push(SchemaViolation::MisplacedEntry {
                    section: section.name.clone(),
                    question_id: entry.question_id.clone(),
                });
            }
        }
    }

    let coverage = &document.coverage;
    let mut check_range = |field: String, value: f64| {
        if !(0.0..=1.0).contains(&value) {
            violations.push(SchemaViolation::ScoreOutOfRange { field, value });
        }
    };
    for (category, score) in &coverage.per_category {
        check_range(format!("coverage.per_category.{}", category), *score);
    }
    check_range("coverage.aggregate_score".to_string(), coverage.aggregate_score);
    check_range("coverage.threshold".to_string(), coverage.threshold);

    for category in &coverage.at_risk_categories {
        if !coverage.per_category.contains_key(category) {
            violations.push(SchemaViolation::UnknownAtRiskCategory(category.clone()));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchemaValidationError { violations })
    }
}

/// Builds spec documents from complete sessions
#[derive(Debug, Clone, Default)]
pub struct SpecGenerator {
    scorer: CoverageScorer,
    roles: CategoryRoles,
}

impl SpecGenerator {
    pub fn new(scorer: CoverageScorer, roles: CategoryRoles) -> Self {
        Self { scorer, roles }
    }

    pub fn scorer(&self) -> &CoverageScorer {
        &self.scorer
    }

    pub fn roles(&self) -> &CategoryRoles {
        &self.roles
    }

    /// Render and validate the document for a complete session.
    pub fn generate(
        &self,
        session: &Session,
        bank: &QuestionBank,
    ) -> Result<SpecDocument, InterviewError> {
        if session.status != SessionStatus::Complete {
            return Err(InterviewError::IncompleteSession {
                session_id: session.session_id.clone(),
                status: session.status,
            });
        }

        let document = SpecDocument {
            schema_version: SCHEMA_VERSION.to_string(),
            session_id: session.session_id.clone(),
            component_name: session.component_name.clone(),
            component_type: session.component_type,
            sections: build_sections(session, bank),
            coverage: self.scorer.score(session, bank),
            roles: self.roles.clone(),
            generated_at: Utc::now(),
        };

        if let Err(e) = validate_document(&document, bank) {
            warn!(
                session_id = %session.session_id,
                violations = e.violations.len(),
                "Generated document failed schema validation"
            );
            return Err(e.into());
        }

        debug!(
            session_id = %session.session_id,
            sections = document.sections.len(),
            "Spec document generated"
        );

        Ok(document)
    }
}

fn build_sections(session: &Session, bank: &QuestionBank) -> Vec<SpecSection> {
    bank.categories()
        .into_iter()
        .filter_map(|category| {
            let entries: Vec<SectionEntry> = bank
                .in_category(category)
                .filter_map(|question| {
                    let answer = session.answer(&question.id)?;
                    Some(SectionEntry {
                        question_id: question.id.clone(),
                        prompt: question.prompt_text.clone(),
                        answer: answer.value.render(),
                        value: answer.value.clone(),
                    })
                })
                .collect();

            (!entries.is_empty()).then(|| SpecSection {
                name: category.to_string(),
                entries,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::{AnswerShape, Question};
    use crate::engine::InterviewEngine;
    use crate::session::SessionMode;

    fn bank() -> QuestionBank {
        QuestionBank::new(vec![
            Question::new("p1", "purpose", "What does it do?", AnswerShape::Text)
                .with_required(true),
            Question::new("s1", "state_management", "States?", AnswerShape::MultiChoice)
                .with_choices(["idle", "running", "stopped"]),
            Question::new("p2", "purpose", "Who uses it?", AnswerShape::Choice)
                .with_choices(["humans", "services"]),
        ])
        .unwrap()
    }

    fn complete_session(bank: &QuestionBank) -> Session {
        let engine = InterviewEngine::new(bank);
        let session = Session::new("scheduler", ComponentType::Service, SessionMode::Interactive);
        let session = engine
            .record_answer(&session, "p1", AnswerValue::text("Runs jobs"))
            .unwrap();
        let session = engine
            .record_answer(&session, "s1", AnswerValue::multi_choice(["idle", "running"]))
            .unwrap();
        let session = engine
            .record_answer(&session, "p2", AnswerValue::choice("services"))
            .unwrap();
        let mut session = session;
        session.set_status(SessionStatus::Complete);
        session
    }

    #[test]
    fn test_generate_requires_complete_session() {
        let bank = bank();
        let mut session = complete_session(&bank);
        session.status = SessionStatus::InProgress;

        let err = SpecGenerator::default().generate(&session, &bank).unwrap_err();
        assert!(matches!(
            err,
            InterviewError::IncompleteSession {
                status: SessionStatus::InProgress,
                ..
            }
        ));

        session.status = SessionStatus::Abandoned;
        assert!(SpecGenerator::default().generate(&session, &bank).is_err());
    }

    #[test]
    fn test_sections_follow_bank_order() {
        let bank = bank();
        let session = complete_session(&bank);
        let doc = SpecGenerator::default().generate(&session, &bank).unwrap();

        assert_eq!(doc.schema_version, SCHEMA_VERSION);
        assert_eq!(doc.section_names(), vec!["purpose", "state_management"]);

        let purpose = doc.section("purpose").unwrap();
        let ids: Vec<&str> = purpose.entries.iter().map(|e| e.question_id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
        assert_eq!(purpose.entries[1].answer, "services");
        assert_eq!(
            doc.section("state_management").unwrap().entries[0].answer,
            "idle, running"
        );
        assert_eq!(doc.coverage.aggregate_score, 1.0);
    }

    #[test]
    fn test_unanswered_categories_have_no_section() {
        let bank = QuestionBank::new(vec![
            Question::new("p1", "purpose", "Why?", AnswerShape::Text).with_required(true),
            Question::new("x1", "extras", "Extras?", AnswerShape::Text),
        ])
        .unwrap();
        let engine = InterviewEngine::new(&bank);
        let session = Session::new("x", ComponentType::Widget, SessionMode::Interactive);
        let session = engine
            .record_answer(&session, "p1", AnswerValue::text("Because"))
            .unwrap();
        let mut session = engine.skip(&session, "x1").unwrap();
        session.set_status(SessionStatus::Complete);

        let doc = SpecGenerator::default().generate(&session, &bank).unwrap();
        assert_eq!(doc.section_names(), vec!["purpose"]);
        assert_eq!(doc.coverage.category_score("extras"), Some(1.0));
    }

    #[test]
    fn test_validation_collects_every_violation() {
        let bank = bank();
        let session = complete_session(&bank);
        let mut doc = SpecGenerator::default().generate(&session, &bank).unwrap();

        doc.schema_version = "9.9".to_string();
        doc.component_name = " ".to_string();
        doc.sections.push(SpecSection {
            name: "astrology".to_string(),
            entries: vec![],
        });
        let duplicate = doc.sections[0].clone();
        doc.sections.push(duplicate);
        doc.coverage
            .per_category
            .insert("purpose".to_string(), 1.5);
        doc.coverage.aggregate_score = -0.1;
        doc.coverage
            .at_risk_categories
            .insert("ghost".to_string());

        let err = validate_document(&doc, &bank).unwrap_err();
        let v = &err.violations;
        assert!(v.contains(&SchemaViolation::UnsupportedSchemaVersion("9.9".to_string())));
        assert!(v.contains(&SchemaViolation::MissingField("component_name")));
        assert!(v.contains(&SchemaViolation::UnknownSection("astrology".to_string())));
        assert!(v.contains(&SchemaViolation::EmptySection("astrology".to_string())));
        assert!(v.contains(&SchemaViolation::DuplicateSection("purpose".to_string())));
        assert!(v.contains(&SchemaViolation::UnknownAtRiskCategory("ghost".to_string())));
        assert!(v.iter().any(|x| matches!(
            x,
            SchemaViolation::ScoreOutOfRange { field, .. } if field == "coverage.per_category.purpose"
        )));
        assert!(v.iter().any(|x| matches!(
            x,
            SchemaViolation::ScoreOutOfRange { field, .. } if field == "coverage.aggregate_score"
        )));
        assert_eq!(v.len(), 8);
    }

    #[test]
    fn test_misplaced_entry_detected() {
        let bank = bank();
        let session = complete_session(&bank);
        let mut doc = SpecGenerator::default().generate(&session, &bank).unwrap();
        let entry = doc.sections[1].entries[0].clone();
        doc.sections[0].entries.push(entry);

        let err = validate_document(&doc, &bank).unwrap_err();
        assert_eq!(
            err.violations,
            vec![SchemaViolation::MisplacedEntry {
                section: "purpose".to_string(),
                question_id: "s1".to_string(),
            }]
        );
    }

    #[test]
    fn test_out_of_range_threshold_fails_generation() {
        let bank = bank();
        let session = complete_session(&bank);
        let generator = SpecGenerator::new(CoverageScorer::new(1.5), CategoryRoles::default());

        let err = generator.generate(&session, &bank).unwrap_err();
        match err {
            InterviewError::SchemaValidation(e) => {
                assert_eq!(e.violations.len(), 1);
                assert!(e.to_string().contains("coverage.threshold"));
            }
            other => panic!("Expected SchemaValidation, got {:?}", other),
        }
    }

    #[test]
    fn test_content_digest_ignores_timestamps() {
        let bank = bank();
        let session = complete_session(&bank);
        let generator = SpecGenerator::default();
        let a = generator.generate(&session, &bank).unwrap();
        let mut b = generator.generate(&session, &bank).unwrap();
        b.generated_at = a.generated_at + chrono::Duration::seconds(30);

        assert_eq!(a.content_digest(), b.content_digest());
        assert_eq!(a.content_digest().len(), 64);

        b.component_name = "other".to_string();
        assert_ne!(a.content_digest(), b.content_digest());
    }
}
