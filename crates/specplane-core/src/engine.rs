//! Question selection and answer recording.
//!
//! The engine holds nothing but a reference to the bank. Every operation
//! takes the session by reference and returns a new session on success, so
//! a rejected answer never touches the caller's state.

use tracing::debug;

use crate::answer::AnswerValue;
use crate::bank::{Question, QuestionBank};
use crate::error::ValidationError;
use crate::session::{Session, SessionMode};

/// Where a question stands within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// Asked and answered
    Answered,
    /// Asked and declined (optional questions only)
    Skipped,
    /// Can be asked now
    Eligible,
    /// Waiting on a dependency that has not been settled yet
    Pending,
    /// Can never be asked in this session
    Unreachable,
}

/// Answer counts for progress display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub answered: usize,
    pub skipped: usize,
    pub required_answered: usize,
    /// Required questions that can still (or already did) get an answer
    pub required_reachable: usize,
    pub total: usize,
}

impl Progress {
    /// Share of reachable required questions answered, 0-100
    pub fn percent(&self) -> u8 {
        if self.required_reachable == 0 {
            return 100;
        }
        ((self.required_answered as f64 / self.required_reachable as f64) * 100.0) as u8
    }
}

/// Stateless interview driver over a question bank
#[derive(Debug, Clone, Copy)]
pub struct InterviewEngine<'a> {
    bank: &'a QuestionBank,
}

impl<'a> InterviewEngine<'a> {
    pub fn new(bank: &'a QuestionBank) -> Self {
        Self { bank }
    }

    pub fn bank(&self) -> &'a QuestionBank {
        self.bank
    }

    /// Reachability of every question, in bank order.
    ///
    /// Dependencies always point backwards, so one forward pass settles
    /// every question.
    pub fn reachability(&self, session: &Session) -> Vec<(&'a Question, Reachability)> {
        let questions = self.bank.questions();
        let mut states: Vec<Reachability> = Vec::with_capacity(questions.len());

        for question in questions {
            let state = if session.is_answered(&question.id) {
                Reachability::Answered
            } else if session.is_asked(&question.id) && !question.required {
                // A skipped question the bank now marks required is asked again
                Reachability::Skipped
            } else if session.mode == SessionMode::Quick && !question.required {
                Reachability::Unreachable
            } else {
                match &question.depends_on {
                    None => Reachability::Eligible,
                    Some(dependency_id) => {
                        let dependency_state = self
                            .bank
                            .position(dependency_id)
                            .and_then(|position| states.get(position).copied())
                            .unwrap_or(Reachability::Unreachable);

                        match dependency_state {
                            Reachability::Answered => match session.answer(dependency_id) {
                                Some(answer) if question.is_triggered_by(&answer.value) => {
                                    Reachability::Eligible
                                }
                                _ => Reachability::Unreachable,
                            },
                            Reachability::Skipped | Reachability::Unreachable => {
                                Reachability::Unreachable
                            }
                            Reachability::Eligible | Reachability::Pending => {
                                Reachability::Pending
                            }
                        }
                    }
                }
            };
            states.push(state);
        }

        questions.iter().zip(states).collect()
    }

    pub fn reachability_of(&self, session: &Session, question_id: &str) -> Option<Reachability> {
        let position = self.bank.position(question_id)?;
        self.reachability(session)
            .get(position)
            .map(|(_, state)| *state)
    }

    /// First eligible question in bank order, or `None` when nothing is left
    /// to ask.
    pub fn next_question(&self, session: &Session) -> Option<&'a Question> {
        self.reachability(session)
            .into_iter()
            .find(|(_, state)| *state == Reachability::Eligible)
            .map(|(question, _)| question)
    }

    /// Validate `value` against the question and return the session with the
    /// answer appended.
    pub fn record_answer(
        &self,
        session: &Session,
        question_id: &str,
        value: AnswerValue,
    ) -> Result<Session, ValidationError> {
        let question = self.eligible_question(session, question_id)?;
        value.validate_for(question)?;

        let mut updated = session.clone();
        updated.push_answer(question_id, value);

        debug!(
            session_id = %session.session_id,
            question_id,
            answered = updated.answers.len(),
            "Answer recorded"
        );

        Ok(updated)
    }

    /// Mark an eligible optional question as asked without answering it.
    pub fn skip(&self, session: &Session, question_id: &str) -> Result<Session, ValidationError> {
        let question = self.eligible_question(session, question_id)?;
        if question.required {
            return Err(ValidationError::RequiredQuestion(question_id.to_string()));
        }

        let mut updated = session.clone();
        updated.push_skip(question_id);

        debug!(session_id = %session.session_id, question_id, "Question skipped");

        Ok(updated)
    }

    /// Every required question is answered or permanently unreachable.
    pub fn is_complete(&self, session: &Session) -> bool {
        self.reachability(session)
            .iter()
            .filter(|(question, _)| question.required)
            .all(|(_, state)| {
                matches!(state, Reachability::Answered | Reachability::Unreachable)
            })
    }

    /// Required questions ruled out by the branches taken so far
    pub fn unreachable_required(&self, session: &Session) -> Vec<&'a Question> {
        self.reachability(session)
            .into_iter()
            .filter(|(question, state)| question.required && *state == Reachability::Unreachable)
            .map(|(question, _)| question)
            .collect()
    }

    pub fn progress(&self, session: &Session) -> Progress {
        let states = self.reachability(session);
        let mut progress = Progress {
            total: states.len(),
            ..Progress::default()
        };

        for (question, state) in &states {
            match state {
                Reachability::Answered => progress.answered += 1,
                Reachability::Skipped => progress.skipped += 1,
                _ => {}
            }
            if question.required && *state != Reachability::Unreachable {
                progress.required_reachable += 1;
                if *state == Reachability::Answered {
                    progress.required_answered += 1;
                }
            }
        }

        progress
    }

    fn eligible_question(
        &self,
        session: &Session,
        question_id: &str,
    ) -> Result<&'a Question, ValidationError> {
        let question = self
            .bank
            .get(question_id)
            .ok_or_else(|| ValidationError::UnknownQuestion(question_id.to_string()))?;

        if session.is_answered(question_id) || (session.is_asked(question_id) && !question.required)
        {
            return Err(ValidationError::AlreadyAsked(question_id.to_string()));
        }

        match self.reachability_of(session, question_id) {
            Some(Reachability::Eligible) => Ok(question),
            _ => Err(ValidationError::NotReachable(question_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::AnswerShape;
    use crate::session::ComponentType;

    fn branching_bank() -> QuestionBank {
        QuestionBank::new(vec![
            Question::new("purpose", "purpose", "What is it for?", AnswerShape::Text)
                .with_required(true),
            Question::new("persistent", "state", "Persistent?", AnswerShape::Boolean)
                .with_required(true),
            Question::new("store", "state", "Which store?", AnswerShape::Choice)
                .with_choices(["disk", "database"])
                .with_required(true)
                .with_dependency("persistent")
                .with_trigger(["true"]),
            Question::new("migrations", "state", "Migrations?", AnswerShape::Text)
                .with_required(true)
                .with_dependency("store")
                .with_trigger(["database"]),
            Question::new("notes", "purpose", "Anything else?", AnswerShape::Text),
        ])
        .unwrap()
    }

    fn session() -> Session {
        Session::new("cache", ComponentType::Component, SessionMode::Interactive)
    }

    #[test]
    fn test_next_question_follows_bank_order() {
        let bank = branching_bank();
        let engine = InterviewEngine::new(&bank);
        let s = session();

        assert_eq!(engine.next_question(&s).unwrap().id, "purpose");
        let s = engine
            .record_answer(&s, "purpose", AnswerValue::text("Caches reads"))
            .unwrap();
        assert_eq!(engine.next_question(&s).unwrap().id, "persistent");
    }

    #[test]
    fn test_pending_questions_are_skipped_until_dependency_answered() {
        let bank = branching_bank();
        let engine = InterviewEngine::new(&bank);
        let s = engine
            .record_answer(&session(), "purpose", AnswerValue::text("Caches reads"))
            .unwrap();

        assert_eq!(
            engine.reachability_of(&s, "store"),
            Some(Reachability::Pending)
        );
        assert_eq!(
            engine.reachability_of(&s, "migrations"),
            Some(Reachability::Pending)
        );
        assert!(!s.is_asked("store"));

        // Answering ahead of the dependency is rejected
        let err = engine
            .record_answer(&s, "store", AnswerValue::choice("disk"))
            .unwrap_err();
        assert_eq!(err, ValidationError::NotReachable("store".to_string()));
    }

    #[test]
    fn test_branch_not_taken_is_unreachable_and_does_not_block() {
        let bank = branching_bank();
        let engine = InterviewEngine::new(&bank);
        let s = engine
            .record_answer(&session(), "purpose", AnswerValue::text("Caches reads"))
            .unwrap();
        let s = engine
            .record_answer(&s, "persistent", AnswerValue::Boolean(false))
            .unwrap();

        assert_eq!(
            engine.reachability_of(&s, "store"),
            Some(Reachability::Unreachable)
        );
        // Transitively unreachable
        assert_eq!(
            engine.reachability_of(&s, "migrations"),
            Some(Reachability::Unreachable)
        );
        assert!(engine.is_complete(&s));
        let unreachable: Vec<&str> = engine
            .unreachable_required(&s)
            .iter()
            .map(|q| q.id.as_str())
            .collect();
        assert_eq!(unreachable, vec!["store", "migrations"]);
        assert_eq!(engine.next_question(&s).unwrap().id, "notes");
    }

    #[test]
    fn test_branch_taken_blocks_completion() {
        let bank = branching_bank();
        let engine = InterviewEngine::new(&bank);
        let s = engine
            .record_answer(&session(), "purpose", AnswerValue::text("Caches reads"))
            .unwrap();
        let s = engine
            .record_answer(&s, "persistent", AnswerValue::Boolean(true))
            .unwrap();

        assert_eq!(engine.next_question(&s).unwrap().id, "store");
        assert!(!engine.is_complete(&s));

        let s = engine
            .record_answer(&s, "store", AnswerValue::choice("disk"))
            .unwrap();
        assert_eq!(
            engine.reachability_of(&s, "migrations"),
            Some(Reachability::Unreachable)
        );
        assert!(engine.is_complete(&s));
    }

    #[test]
    fn test_invalid_answer_leaves_session_untouched() {
        let bank = branching_bank();
        let engine = InterviewEngine::new(&bank);
        let s = engine
            .record_answer(&session(), "purpose", AnswerValue::text("Caches reads"))
            .unwrap();
        let s = engine
            .record_answer(&s, "persistent", AnswerValue::Boolean(true))
            .unwrap();
        let before = serde_json::to_string(&s).unwrap();

        let err = engine
            .record_answer(&s, "store", AnswerValue::choice("tape"))
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidChoice { .. }));
        assert_eq!(serde_json::to_string(&s).unwrap(), before);
    }

    #[test]
    fn test_cannot_answer_twice_or_unknown() {
        let bank = branching_bank();
        let engine = InterviewEngine::new(&bank);
        let s = engine
            .record_answer(&session(), "purpose", AnswerValue::text("Caches reads"))
            .unwrap();

        assert_eq!(
            engine
                .record_answer(&s, "purpose", AnswerValue::text("again"))
                .unwrap_err(),
            ValidationError::AlreadyAsked("purpose".to_string())
        );
        assert_eq!(
            engine
                .record_answer(&s, "ghost", AnswerValue::text("boo"))
                .unwrap_err(),
            ValidationError::UnknownQuestion("ghost".to_string())
        );
    }

    #[test]
    fn test_skip_only_optional_questions() {
        let bank = branching_bank();
        let engine = InterviewEngine::new(&bank);
        let s = session();

        assert_eq!(
            engine.skip(&s, "purpose").unwrap_err(),
            ValidationError::RequiredQuestion("purpose".to_string())
        );

        let s = engine.skip(&s, "notes").unwrap();
        assert!(s.is_skipped("notes"));
        assert_eq!(
            engine.reachability_of(&s, "notes"),
            Some(Reachability::Skipped)
        );
        assert_eq!(engine.next_question(&s).unwrap().id, "purpose");
    }

    #[test]
    fn test_skipped_dependency_makes_dependents_unreachable() {
        let bank = QuestionBank::new(vec![
            Question::new("extra", "misc", "Extras?", AnswerShape::Text),
            Question::new("detail", "misc", "Details?", AnswerShape::Text)
                .with_required(true)
                .with_dependency("extra"),
        ])
        .unwrap();
        let engine = InterviewEngine::new(&bank);
        let s = engine.skip(&session(), "extra").unwrap();

        assert_eq!(
            engine.reachability_of(&s, "detail"),
            Some(Reachability::Unreachable)
        );
        assert!(engine.is_complete(&s));
        assert!(engine.next_question(&s).is_none());
    }

    #[test]
    fn test_quick_mode_only_asks_required() {
        let bank = branching_bank();
        let engine = InterviewEngine::new(&bank);
        let s = Session::new("cache", ComponentType::Component, SessionMode::Quick);
        let s = engine
            .record_answer(&s, "purpose", AnswerValue::text("Caches reads"))
            .unwrap();
        let s = engine
            .record_answer(&s, "persistent", AnswerValue::Boolean(false))
            .unwrap();

        assert!(engine.next_question(&s).is_none());
        assert_eq!(
            engine
                .record_answer(&s, "notes", AnswerValue::text("none"))
                .unwrap_err(),
            ValidationError::NotReachable("notes".to_string())
        );
    }

    #[test]
    fn test_progress() {
        let bank = branching_bank();
        let engine = InterviewEngine::new(&bank);
        let s = session();
        let progress = engine.progress(&s);
        assert_eq!(progress.total, 5);
        assert_eq!(progress.required_reachable, 4);
        assert_eq!(progress.percent(), 0);

        let s = engine
            .record_answer(&s, "purpose", AnswerValue::text("Caches reads"))
            .unwrap();
        let s = engine
            .record_answer(&s, "persistent", AnswerValue::Boolean(false))
            .unwrap();
        let progress = engine.progress(&s);
        assert_eq!(progress.answered, 2);
        assert_eq!(progress.required_answered, 2);
        assert_eq!(progress.required_reachable, 2);
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn test_siblings_unlocked_together_come_out_in_bank_order() {
        let bank = QuestionBank::new(vec![
            Question::new("root", "state", "Stateful?", AnswerShape::Boolean).with_required(true),
            Question::new("other", "purpose", "What is it for?", AnswerShape::Text)
                .with_required(true),
            Question::new("d2", "state", "Where?", AnswerShape::Text)
                .with_required(true)
                .with_dependency("root"),
            Question::new("d1", "state", "How long?", AnswerShape::Text)
                .with_required(true)
                .with_dependency("root"),
        ])
        .unwrap();
        let engine = InterviewEngine::new(&bank);

        let s = engine
            .record_answer(&session(), "root", AnswerValue::Boolean(true))
            .unwrap();
        assert_eq!(engine.next_question(&s).map(|q| q.id.as_str()), Some("other"));
        assert_eq!(engine.reachability_of(&s, "d2"), Some(Reachability::Eligible));
        assert_eq!(engine.reachability_of(&s, "d1"), Some(Reachability::Eligible));
        assert!(!s.is_asked("d2") && !s.is_asked("d1"));

        let s = engine
            .record_answer(&s, "other", AnswerValue::text("Caches reads"))
            .unwrap();
        assert_eq!(engine.next_question(&s).map(|q| q.id.as_str()), Some("d2"));

        let s = engine.record_answer(&s, "d2", AnswerValue::text("disk")).unwrap();
        assert_eq!(engine.next_question(&s).map(|q| q.id.as_str()), Some("d1"));
        assert!(!s.is_asked("d1"));
    }

    #[test]
    fn test_skipped_question_made_required_is_asked_again() {
        let before = QuestionBank::new(vec![
            Question::new("purpose", "purpose", "What is it for?", AnswerShape::Text)
                .with_required(true),
            Question::new("notes", "purpose", "Anything else?", AnswerShape::Text),
        ])
        .unwrap();
        let after = QuestionBank::new(vec![
            Question::new("purpose", "purpose", "What is it for?", AnswerShape::Text)
                .with_required(true),
            Question::new("notes", "purpose", "Anything else?", AnswerShape::Text)
                .with_required(true),
        ])
        .unwrap();

        let old_engine = InterviewEngine::new(&before);
        let s = old_engine
            .record_answer(&session(), "purpose", AnswerValue::text("Caches reads"))
            .unwrap();
        let s = old_engine.skip(&s, "notes").unwrap();
        assert!(old_engine.is_complete(&s));

        let engine = InterviewEngine::new(&after);
        assert!(!engine.is_complete(&s));
        assert_eq!(engine.next_question(&s).map(|q| q.id.as_str()), Some("notes"));

        let s = engine
            .record_answer(&s, "notes", AnswerValue::text("None"))
            .unwrap();
        assert!(engine.is_complete(&s));
        assert!(!s.is_skipped("notes"));
        assert_eq!(s.asked_question_ids, vec!["purpose", "notes"]);
        assert_eq!(engine.progress(&s).skipped, 0);
    }
}
