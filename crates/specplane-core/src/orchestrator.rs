//! Sequences engine, scorer and generator for callers.
//!
//! The orchestrator owns the state rules (only in-progress sessions advance,
//! only complete sessions finish) and emits a [`LogEvent`] for every
//! transition. Like the engine it never mutates its input: every call takes
//! the session by reference and hands back the successor.

use std::sync::Arc;

use specplane_logging::{LogEvent, Logger};
use tracing::info;

use crate::answer::AnswerValue;
use crate::bank::{Question, QuestionBank};
use crate::coverage::CoverageReport;
use crate::engine::{InterviewEngine, Progress};
use crate::error::{InterviewError, ValidationError};
use crate::generator::{SpecDocument, SpecGenerator};
use crate::session::{ComponentType, Session, SessionMode, SessionStatus};

pub struct Orchestrator<'a> {
    bank: &'a QuestionBank,
    engine: InterviewEngine<'a>,
    generator: SpecGenerator,
    logger: Option<Arc<Logger>>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(bank: &'a QuestionBank) -> Self {
        Self {
            bank,
            engine: InterviewEngine::new(bank),
            generator: SpecGenerator::default(),
            logger: None,
        }
    }

    pub fn with_generator(mut self, generator: SpecGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn bank(&self) -> &'a QuestionBank {
        self.bank
    }

    pub fn engine(&self) -> &InterviewEngine<'a> {
        &self.engine
    }

    pub fn generator(&self) -> &SpecGenerator {
        &self.generator
    }

    /// Start an interactive-mode session.
    pub fn start(
        &self,
        component_name: &str,
        component_type: ComponentType,
    ) -> Result<Session, InterviewError> {
        self.start_with_mode(component_name, component_type, SessionMode::Interactive)
    }

    pub fn start_with_mode(
        &self,
        component_name: &str,
        component_type: ComponentType,
        mode: SessionMode,
    ) -> Result<Session, InterviewError> {
        let name = component_name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyComponentName.into());
        }

        let session = Session::new(name, component_type, mode);

        info!(
            session_id = %session.session_id,
            component = name,
            %mode,
            "Interview started"
        );
        self.emit(LogEvent::SessionStarted {
            session_id: session.session_id.clone(),
            component_name: session.component_name.clone(),
            component_type: component_type.to_string(),
            mode: mode.to_string(),
            bank_size: self.bank.len(),
        });

        Ok(session)
    }

    /// Next question to present, `None` for sessions that are not in
    /// progress or have nothing left to ask.
    pub fn current(&self, session: &Session) -> Option<&'a Question> {
        if !session.is_in_progress() {
            return None;
        }
        self.engine.next_question(session)
    }

    /// Settle a loaded session: an in-progress session with nothing left to
    /// ask (for example after the bank lost questions) becomes complete.
    pub fn resume(&self, session: &Session) -> (Session, Option<&'a Question>) {
        if !session.is_in_progress() {
            return (session.clone(), None);
        }
        match self.engine.next_question(session) {
            Some(question) => (session.clone(), Some(question)),
            None => (self.complete(session), None),
        }
    }

    /// Record an answer and select the next question. When none is left the
    /// returned session is complete.
    pub fn advance(
        &self,
        session: &Session,
        question_id: &str,
        value: AnswerValue,
    ) -> Result<(Session, Option<&'a Question>), InterviewError> {
        self.require_in_progress(session)?;

        let updated = match self.engine.record_answer(session, question_id, value) {
            Ok(updated) => updated,
            Err(e) => {
                self.emit(LogEvent::AnswerRejected {
                    session_id: session.session_id.clone(),
                    question_id: question_id.to_string(),
                    reason: e.to_string(),
                });
                return Err(e.into());
            }
        };

        self.emit(LogEvent::AnswerRecorded {
            session_id: updated.session_id.clone(),
            question_id: question_id.to_string(),
            answered: updated.answers.len(),
        });

        Ok(self.select_next(updated))
    }

    /// Decline an optional question. Same state rules as [`advance`](Self::advance).
    pub fn skip(
        &self,
        session: &Session,
        question_id: &str,
    ) -> Result<(Session, Option<&'a Question>), InterviewError> {
        self.require_in_progress(session)?;

        let updated = match self.engine.skip(session, question_id) {
            Ok(updated) => updated,
            Err(e) => {
                self.emit(LogEvent::AnswerRejected {
                    session_id: session.session_id.clone(),
                    question_id: question_id.to_string(),
                    reason: e.to_string(),
                });
                return Err(e.into());
            }
        };

        self.emit(LogEvent::QuestionSkipped {
            session_id: updated.session_id.clone(),
            question_id: question_id.to_string(),
        });

        Ok(self.select_next(updated))
    }

    pub fn abandon(&self, session: &Session) -> Result<Session, InterviewError> {
        self.require_in_progress(session)?;

        let mut abandoned = session.clone();
        abandoned.set_status(SessionStatus::Abandoned);

        info!(session_id = %abandoned.session_id, "Interview abandoned");
        self.emit(LogEvent::SessionAbandoned {
            session_id: abandoned.session_id.clone(),
            answered: abandoned.answers.len(),
        });

        Ok(abandoned)
    }

    /// Generate the document for a complete session.
    pub fn finish(
        &self,
        session: &Session,
    ) -> Result<(SpecDocument, CoverageReport), InterviewError> {
        let document = match self.generator.generate(session, self.bank) {
            Ok(document) => document,
            Err(e) => {
                self.emit(LogEvent::ErrorEncountered {
                    session_id: Some(session.session_id.clone()),
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        self.emit(LogEvent::SpecGenerated {
            session_id: document.session_id.clone(),
            component_name: document.component_name.clone(),
            sections: document.sections.len(),
            aggregate_score: document.coverage.aggregate_score,
            risk_level: document.coverage.risk_level.to_string(),
        });

        let coverage = document.coverage.clone();
        Ok((document, coverage))
    }

    /// Coverage of a session in any status.
    pub fn score(&self, session: &Session) -> CoverageReport {
        self.generator.scorer().score(session, self.bank)
    }

    pub fn progress(&self, session: &Session) -> Progress {
        self.engine.progress(session)
    }

    pub fn is_complete(&self, session: &Session) -> bool {
        self.engine.is_complete(session)
    }

    fn select_next(&self, session: Session) -> (Session, Option<&'a Question>) {
        match self.engine.next_question(&session) {
            Some(question) => (session, Some(question)),
            None => (self.complete(&session), None),
        }
    }

    fn complete(&self, session: &Session) -> Session {
        let mut completed = session.clone();
        completed.set_status(SessionStatus::Complete);

        info!(
            session_id = %completed.session_id,
            answered = completed.answers.len(),
            "Interview complete"
        );
        self.emit(LogEvent::SessionCompleted {
            session_id: completed.session_id.clone(),
            answered: completed.answers.len(),
            skipped: completed.skipped_question_ids.len(),
        });

        completed
    }

    fn require_in_progress(&self, session: &Session) -> Result<(), InterviewError> {
        if session.is_in_progress() {
            Ok(())
        } else {
            Err(InterviewError::InvalidState {
                session_id: session.session_id.clone(),
                expected: SessionStatus::InProgress,
                actual: session.status,
            })
        }
    }

    fn emit(&self, event: LogEvent) {
        if let Some(ref logger) = self.logger {
            logger.log(&event);
        }
    }
}
