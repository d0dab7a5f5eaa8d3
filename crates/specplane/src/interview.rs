//! The interview loop and its interactive terminal front end.
//!
//! [`drive`] owns the loop: ask, advance, persist, repeat. Where the answers
//! come from is behind the [`Prompter`] trait so scripted runs share the same
//! path as a person at the terminal.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{Confirm, Input, MultiSelect, Select};

use specplane_core::{
    AnswerShape, AnswerValue, ComponentType, InterviewError, Orchestrator, Progress, Question,
    Session, SessionStatus, ValidationError,
};
use specplane_logging::{LogEvent, Logger, TranscriptWriter};
use specplane_store::SessionStore;

use crate::config::Settings;
use crate::output;

/// Typing this at a text prompt abandons the interview
pub const QUIT_COMMAND: &str = ":quit";

/// What the user (or a script) did with a question
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Answer(AnswerValue),
    Skip,
    /// Abandon the session
    Quit,
    /// Leave the session in progress for a later resume
    Pause,
}

/// Source of replies for [`drive`].
pub trait Prompter {
    fn ask(&mut self, question: &Question, progress: &Progress) -> Result<Reply>;

    /// Called when a reply was rejected. Return `Err` to stop the interview,
    /// `Ok` to be asked the same question again.
    fn rejected(&mut self, question: &Question, error: &ValidationError) -> Result<()>;
}

/// Side channels written as the interview progresses
#[derive(Default)]
pub struct Sinks<'a> {
    pub store: Option<&'a dyn SessionStore>,
    pub transcript: Option<&'a TranscriptWriter>,
}

impl Sinks<'_> {
    fn persist(&self, session: &Session) -> Result<()> {
        if let Some(store) = self.store {
            store
                .save(session)
                .with_context(|| format!("Failed to save session {}", session.session_id))?;
        }
        Ok(())
    }
}

/// Run the question loop until the session completes, is abandoned or the
/// prompter pauses. The session is saved after every accepted reply.
pub fn drive<P: Prompter>(
    orchestrator: &Orchestrator<'_>,
    session: Session,
    prompter: &mut P,
    sinks: &Sinks<'_>,
) -> Result<Session> {
    let (mut session, mut next) = orchestrator.resume(&session);
    sinks.persist(&session)?;

    while let Some(question) = next {
        let progress = orchestrator.progress(&session);

        let result = match prompter.ask(question, &progress)? {
            Reply::Answer(value) => {
                let rendered = value.render();
                orchestrator
                    .advance(&session, &question.id, value)
                    .map(|advanced| {
                        if let Some(transcript) = sinks.transcript {
                            transcript.write_answer(&question.id, &question.prompt_text, &rendered);
                        }
                        advanced
                    })
            }
            Reply::Skip => orchestrator.skip(&session, &question.id).map(|advanced| {
                if let Some(transcript) = sinks.transcript {
                    transcript.write_skip(&question.id);
                }
                advanced
            }),
            Reply::Quit => {
                session = orchestrator.abandon(&session)?;
                sinks.persist(&session)?;
                break;
            }
            Reply::Pause => break,
        };

        match result {
            Ok((advanced, following)) => {
                session = advanced;
                next = following;
                sinks.persist(&session)?;
            }
            Err(InterviewError::Validation(e)) => prompter.rejected(question, &e)?,
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(transcript) = sinks.transcript {
        if !session.is_in_progress() {
            let score = session
                .is_complete()
                .then(|| orchestrator.score(&session).aggregate_score);
            transcript.write_end(&session.status.to_string(), session.answers.len(), score);
        }
    }

    Ok(session)
}

/// Answers questions through dialoguer prompts.
///
/// Esc declines an optional question; on a required one it asks whether to
/// leave the interview. `:quit` at a text prompt abandons.
pub struct TerminalPrompter;

impl TerminalPrompter {
    fn header(question: &Question, progress: &Progress) {
        eprintln!();
        eprintln!(
            "{} {} {}",
            format!("[{}/{}]", progress.answered + progress.skipped + 1, progress.total).dimmed(),
            question.category.bright_blue(),
            if question.required {
                "required".bright_red().to_string()
            } else {
                "optional, Esc to skip".dimmed().to_string()
            }
        );
        if let Some(ref help) = question.help {
            eprintln!("  {}", help.dimmed());
        }
    }

    /// Esc on a required question: offer to leave
    fn escape(question: &Question) -> Result<Option<Reply>> {
        if !question.required {
            return Ok(Some(Reply::Skip));
        }
        let leave = Confirm::new()
            .with_prompt("This question is required. Leave the interview?")
            .default(false)
            .interact()?;
        if !leave {
            return Ok(None);
        }
        let abandon = Confirm::new()
            .with_prompt("Abandon it for good? (No keeps it resumable)")
            .default(false)
            .interact()?;
        Ok(Some(if abandon { Reply::Quit } else { Reply::Pause }))
    }
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &Question, progress: &Progress) -> Result<Reply> {
        Self::header(question, progress);

        loop {
            let reply = match question.answer_shape {
                AnswerShape::Text => {
                    let input: String = Input::new()
                        .with_prompt(&question.prompt_text)
                        .allow_empty(true)
                        .interact_text()?;
                    let trimmed = input.trim();
                    if trimmed == QUIT_COMMAND {
                        Some(Reply::Quit)
                    } else if trimmed.is_empty() {
                        if question.required {
                            eprintln!("  {}", "An answer is required.".bright_yellow());
                            None
                        } else {
                            Some(Reply::Skip)
                        }
                    } else {
                        Some(Reply::Answer(AnswerValue::text(trimmed)))
                    }
                }
                AnswerShape::Choice => {
                    match Select::new()
                        .with_prompt(&question.prompt_text)
                        .items(&question.choices)
                        .default(0)
                        .interact_opt()?
                    {
                        Some(index) => Some(Reply::Answer(AnswerValue::choice(
                            question.choices[index].clone(),
                        ))),
                        None => Self::escape(question)?,
                    }
                }
                AnswerShape::MultiChoice => {
                    match MultiSelect::new()
                        .with_prompt(format!("{} (space to select)", question.prompt_text))
                        .items(&question.choices)
                        .interact_opt()?
                    {
                        Some(indices) if indices.is_empty() && !question.required => {
                            Some(Reply::Skip)
                        }
                        Some(indices) => Some(Reply::Answer(AnswerValue::MultiChoice(
                            indices.iter().map(|&i| question.choices[i].clone()).collect(),
                        ))),
                        None => Self::escape(question)?,
                    }
                }
                AnswerShape::Boolean => {
                    match Confirm::new()
                        .with_prompt(&question.prompt_text)
                        .interact_opt()?
                    {
                        Some(value) => Some(Reply::Answer(AnswerValue::Boolean(value))),
                        None => Self::escape(question)?,
                    }
                }
            };

            if let Some(reply) = reply {
                return Ok(reply);
            }
        }
    }

    fn rejected(&mut self, _question: &Question, error: &ValidationError) -> Result<()> {
        eprintln!("  {} {}", "✗".bright_red(), error.to_string().bright_red());
        Ok(())
    }
}

pub struct InterviewArgs {
    pub name: Option<String>,
    pub component_type: Option<ComponentType>,
    pub resume: Option<String>,
}

const COMPONENT_TYPES: &[ComponentType] = &[
    ComponentType::Component,
    ComponentType::Widget,
    ComponentType::Service,
    ComponentType::Agent,
    ComponentType::Container,
    ComponentType::MobileComponent,
];

pub fn handle_interview(settings: &Settings, args: InterviewArgs) -> Result<()> {
    let bank = crate::bank::load_bank(settings.bank.as_deref())?;
    let store = settings.open_store()?;
    let logger = Arc::new(Logger::new(settings.log_format));
    let orchestrator = Orchestrator::new(&bank)
        .with_generator(settings.generator())
        .with_logger(Arc::clone(&logger));

    let session = match args.resume {
        Some(ref id) => {
            let session = store
                .load(id)
                .with_context(|| format!("Failed to load session {}", id))?;
            if session.status != SessionStatus::InProgress {
                return Err(InterviewError::InvalidState {
                    session_id: session.session_id.clone(),
                    expected: SessionStatus::InProgress,
                    actual: session.status,
                }
                .into());
            }
            eprintln!(
                "{} Resuming {} ({} answered)",
                "▶".bright_blue(),
                session.component_name.bold(),
                session.answers.len()
            );
            session
        }
        None => {
            let name = match args.name {
                Some(name) => name,
                None => Input::<String>::new()
                    .with_prompt("Component name")
                    .interact_text()?,
            };
            let component_type = match args.component_type {
                Some(component_type) => component_type,
                None => {
                    let items: Vec<String> =
                        COMPONENT_TYPES.iter().map(|t| t.to_string()).collect();
                    let index = Select::new()
                        .with_prompt("Component type")
                        .items(&items)
                        .default(0)
                        .interact()?;
                    COMPONENT_TYPES[index]
                }
            };
            orchestrator.start_with_mode(&name, component_type, settings.mode)?
        }
    };

    let transcript = match TranscriptWriter::new(&session.component_name) {
        Ok(writer) => {
            writer.write_start(
                &session.session_id,
                &session.component_name,
                &session.component_type.to_string(),
                &session.mode.to_string(),
            );
            Some(writer)
        }
        Err(e) => {
            tracing::warn!("Transcript disabled: {}", e);
            None
        }
    };

    let sinks = Sinks {
        store: Some(store.as_ref()),
        transcript: transcript.as_ref(),
    };
    let session = drive(&orchestrator, session, &mut TerminalPrompter, &sinks)?;

    match session.status {
        SessionStatus::Complete => {
            let (document, coverage) = orchestrator.finish(&session)?;
            let dir = output::session_output_dir(&settings.output_dir, &document);
            let written = output::write_artifacts(&dir, &document, &coverage)?;
            logger.log(&LogEvent::ArtifactsWritten {
                session_id: session.session_id.clone(),
                output_dir: dir.clone(),
                files: written.len(),
            });
            crate::sessions::print_coverage(&coverage);
            print_written(&written);
        }
        SessionStatus::InProgress => {
            eprintln!(
                "Paused. Resume with {}",
                format!("specplane interview --resume {}", session.session_id).bright_cyan()
            );
        }
        SessionStatus::Abandoned => {}
    }

    Ok(())
}

pub fn print_written(paths: &[PathBuf]) {
    for path in paths {
        println!("{}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specplane_core::QuestionBank;
    use specplane_store::{SessionFilter, SqliteSessionStore};
    use std::collections::VecDeque;

    struct Canned {
        replies: VecDeque<Reply>,
        rejections: usize,
    }

    impl Canned {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: replies.into(),
                rejections: 0,
            }
        }
    }

    impl Prompter for Canned {
        fn ask(&mut self, _question: &Question, _progress: &Progress) -> Result<Reply> {
            Ok(self.replies.pop_front().unwrap_or(Reply::Pause))
        }

        fn rejected(&mut self, _question: &Question, _error: &ValidationError) -> Result<()> {
            self.rejections += 1;
            Ok(())
        }
    }

    fn bank() -> QuestionBank {
        QuestionBank::new(vec![
            Question::new("purpose", "purpose", "What is it for?", AnswerShape::Text)
                .with_required(true),
            Question::new("mode", "state_management", "Which mode?", AnswerShape::Choice)
                .with_choices(["sync", "async"])
                .with_required(true),
            Question::new("notes", "purpose", "Anything else?", AnswerShape::Text),
        ])
        .unwrap()
    }

    #[test]
    fn test_drive_to_completion_with_retry_and_skip() {
        let bank = bank();
        let orchestrator = Orchestrator::new(&bank);
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let session = orchestrator.start("queue", ComponentType::Service).unwrap();

        let mut prompter = Canned::new(vec![
            Reply::Answer(AnswerValue::text("Buffers work")),
            Reply::Answer(AnswerValue::choice("batch")),
            Reply::Answer(AnswerValue::choice("async")),
            Reply::Skip,
        ]);
        let sinks = Sinks {
            store: Some(&store),
            transcript: None,
        };

        let session = drive(&orchestrator, session, &mut prompter, &sinks).unwrap();
        assert_eq!(session.status, SessionStatus::Complete);
        assert_eq!(prompter.rejections, 1);
        assert!(session.is_skipped("notes"));
        assert_eq!(store.load(&session.session_id).unwrap(), session);
    }

    #[test]
    fn test_drive_pause_keeps_session_resumable() {
        let bank = bank();
        let orchestrator = Orchestrator::new(&bank);
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let session = orchestrator.start("queue", ComponentType::Service).unwrap();
        let sinks = Sinks {
            store: Some(&store),
            transcript: None,
        };

        let mut first = Canned::new(vec![Reply::Answer(AnswerValue::text("Buffers work"))]);
        let paused = drive(&orchestrator, session, &mut first, &sinks).unwrap();
        assert!(paused.is_in_progress());
        assert_eq!(paused.answers.len(), 1);

        let loaded = store.load(&paused.session_id).unwrap();
        let mut second = Canned::new(vec![
            Reply::Answer(AnswerValue::choice("sync")),
            Reply::Answer(AnswerValue::text("None")),
        ]);
        let finished = drive(&orchestrator, loaded, &mut second, &sinks).unwrap();
        assert!(finished.is_complete());
        assert_eq!(finished.answers.len(), 3);
    }

    #[test]
    fn test_drive_quit_abandons_and_saves() {
        let bank = bank();
        let orchestrator = Orchestrator::new(&bank);
        let store = SqliteSessionStore::open_in_memory().unwrap();
        let session = orchestrator.start("queue", ComponentType::Service).unwrap();
        let sinks = Sinks {
            store: Some(&store),
            transcript: None,
        };

        let mut prompter = Canned::new(vec![Reply::Quit]);
        let session = drive(&orchestrator, session, &mut prompter, &sinks).unwrap();
        assert_eq!(session.status, SessionStatus::Abandoned);

        let summaries = store.list(&SessionFilter::default()).unwrap();
        assert_eq!(summaries[0].status, SessionStatus::Abandoned);
    }

    #[test]
    fn test_skipping_required_question_is_rejected() {
        let bank = bank();
        let orchestrator = Orchestrator::new(&bank);
        let session = orchestrator.start("queue", ComponentType::Service).unwrap();

        let mut prompter = Canned::new(vec![Reply::Skip]);
        let session = drive(&orchestrator, session, &mut prompter, &Sinks::default()).unwrap();
        assert_eq!(prompter.rejections, 1);
        assert!(session.answers.is_empty());
        assert!(session.is_in_progress());
    }
}
