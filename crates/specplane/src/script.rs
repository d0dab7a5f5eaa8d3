//! Non-interactive interviews driven by TOML answer scripts.
//!
//! ```toml
//! component_name = "rate-limiter"
//! component_type = "service"
//! mode = "interactive"   # optional
//!
//! [answers]
//! "purpose.problem" = "Caps request rates per API key"
//! "purpose.consumers" = ["other services"]
//! "state.persistent" = true
//! ```
//!
//! Missing optional answers are skipped. A missing required answer stops the
//! run with the session left in progress.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use specplane_core::{
    AnswerShape, AnswerValue, ComponentType, InterviewError, Orchestrator, Progress, Question,
    QuestionBank, SessionMode, SessionStatus, ValidationError,
};
use specplane_logging::{LogEvent, Logger};
use specplane_store::SessionStore;

use crate::config::Settings;
use crate::interview::{drive, Prompter, Reply, Sinks};
use crate::output;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnswerScript {
    pub component_name: String,
    pub component_type: ComponentType,
    pub mode: Option<SessionMode>,
    #[serde(default)]
    pub answers: BTreeMap<String, toml::Value>,
}

impl AnswerScript {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse script {}", path.display()))
    }

    /// Every answer key must name a bank question.
    fn check_ids(&self, bank: &QuestionBank) -> Result<(), ValidationError> {
        match self.answers.keys().find(|id| bank.get(id).is_none()) {
            Some(id) => Err(ValidationError::UnknownQuestion(id.clone())),
            None => Ok(()),
        }
    }
}

/// Convert a script value into an answer of the question's shape.
pub fn to_answer(question: &Question, value: &toml::Value) -> Result<AnswerValue, ValidationError> {
    let unparseable = || ValidationError::Unparseable {
        question_id: question.id.clone(),
        input: value.to_string(),
        expected: question.answer_shape,
    };

    match (value, question.answer_shape) {
        (toml::Value::String(s), _) => AnswerValue::parse_input(question, s),
        (toml::Value::Boolean(b), AnswerShape::Boolean) => Ok(AnswerValue::Boolean(*b)),
        (toml::Value::Array(items), AnswerShape::MultiChoice) => items
            .iter()
            .map(|item| item.as_str().map(String::from).ok_or_else(unparseable))
            .collect::<Result<Vec<_>, _>>()
            .map(AnswerValue::MultiChoice),
        _ => Err(unparseable()),
    }
}

/// Replies from a script's answer table
pub struct ScriptPrompter<'s> {
    answers: &'s BTreeMap<String, toml::Value>,
    used: HashSet<String>,
    /// Required question the script has no answer for
    missing: Option<String>,
}

impl<'s> ScriptPrompter<'s> {
    pub fn new(answers: &'s BTreeMap<String, toml::Value>) -> Self {
        Self {
            answers,
            used: HashSet::new(),
            missing: None,
        }
    }

    pub fn missing(&self) -> Option<&str> {
        self.missing.as_deref()
    }

    /// Answers that were never asked for (their branch was not taken)
    pub fn unused(&self) -> Vec<&str> {
        self.answers
            .keys()
            .filter(|id| !self.used.contains(*id))
            .map(String::as_str)
            .collect()
    }
}

impl Prompter for ScriptPrompter<'_> {
    fn ask(&mut self, question: &Question, _progress: &Progress) -> Result<Reply> {
        match self.answers.get(&question.id) {
            Some(value) => {
                self.used.insert(question.id.clone());
                Ok(Reply::Answer(to_answer(question, value).map_err(InterviewError::from)?))
            }
            None if question.required => {
                self.missing = Some(question.id.clone());
                Ok(Reply::Pause)
            }
            None => Ok(Reply::Skip),
        }
    }

    fn rejected(&mut self, _question: &Question, error: &ValidationError) -> Result<()> {
        Err(InterviewError::from(error.clone()).into())
    }
}

/// Result of one script
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub script: PathBuf,
    pub session_id: Option<String>,
    pub component_name: Option<String>,
    pub status: Option<SessionStatus>,
    pub aggregate_score: Option<f64>,
    pub output_dir: Option<PathBuf>,
    pub error: Option<String>,
}

impl RunOutcome {
    fn new(script: PathBuf) -> Self {
        Self {
            script,
            session_id: None,
            component_name: None,
            status: None,
            aggregate_score: None,
            output_dir: None,
            error: None,
        }
    }
}

/// Shared state handed to every script task
struct RunContext {
    bank: Arc<QuestionBank>,
    store: Arc<dyn SessionStore>,
    logger: Arc<Logger>,
    settings: Settings,
}

/// Run one script to completion and write its artifacts.
fn run_script(ctx: &RunContext, path: &Path) -> (RunOutcome, Option<anyhow::Error>) {
    let mut outcome = RunOutcome::new(path.to_path_buf());

    let script = match AnswerScript::load(path) {
        Ok(script) => script,
        Err(e) => {
            outcome.error = Some(format!("{:#}", e));
            return (outcome, Some(e));
        }
    };

    let orchestrator = Orchestrator::new(&ctx.bank)
        .with_generator(ctx.settings.generator())
        .with_logger(Arc::clone(&ctx.logger));

    let result = (|| -> Result<()> {
        script.check_ids(&ctx.bank).map_err(InterviewError::from)?;

        let session = orchestrator.start_with_mode(
            &script.component_name,
            script.component_type,
            script.mode.unwrap_or(ctx.settings.mode),
        )?;
        outcome.session_id = Some(session.session_id.clone());
        outcome.component_name = Some(session.component_name.clone());

        let mut prompter = ScriptPrompter::new(&script.answers);
        let sinks = Sinks {
            store: Some(ctx.store.as_ref()),
            transcript: None,
        };
        let session = drive(&orchestrator, session, &mut prompter, &sinks)
            .with_context(|| format!("Script {} was rejected", path.display()))?;
        outcome.status = Some(session.status);
        outcome.aggregate_score = Some(orchestrator.score(&session).aggregate_score);

        for id in prompter.unused() {
            tracing::warn!(
                script = %path.display(),
                question = id,
                "Answer not used: question was not reached"
            );
        }

        let (document, coverage) = orchestrator.finish(&session).with_context(|| {
            match prompter.missing() {
                Some(id) => format!(
                    "Script {} has no answer for required question {}",
                    path.display(),
                    id
                ),
                None => format!("Script {} did not complete the interview", path.display()),
            }
        })?;

        let dir = output::session_output_dir(&ctx.settings.output_dir, &document);
        let written = output::write_artifacts(&dir, &document, &coverage)?;
        ctx.logger.log(&LogEvent::ArtifactsWritten {
            session_id: document.session_id.clone(),
            output_dir: dir.clone(),
            files: written.len(),
        });
        outcome.output_dir = Some(dir);
        Ok(())
    })();

    match result {
        Ok(()) => (outcome, None),
        Err(e) => {
            ctx.logger.log(&LogEvent::ErrorEncountered {
                session_id: outcome.session_id.clone(),
                error: format!("{:#}", e),
            });
            outcome.error = Some(format!("{:#}", e));
            (outcome, Some(e))
        }
    }
}

/// Run every script concurrently. Returns the first failure, in argument
/// order, after all scripts have finished.
pub async fn handle_run(settings: &Settings, scripts: Vec<PathBuf>, json: bool) -> Result<()> {
    if scripts.is_empty() {
        anyhow::bail!("No scripts given");
    }

    let bank = crate::bank::load_bank(settings.bank.as_deref())?;
    let ctx = Arc::new(RunContext {
        bank: Arc::new(bank),
        store: settings.open_store()?,
        logger: Arc::new(Logger::new(settings.log_format)),
        settings: settings.clone(),
    });

    let mut tasks = JoinSet::new();
    for (index, path) in scripts.into_iter().enumerate() {
        let ctx = Arc::clone(&ctx);
        tasks.spawn_blocking(move || {
            let (outcome, error) = run_script(&ctx, &path);
            (index, outcome, error)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.context("Script task panicked")?);
    }
    results.sort_by_key(|(index, _, _)| *index);

    let outcomes: Vec<&RunOutcome> = results.iter().map(|(_, outcome, _)| outcome).collect();
    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        print_outcomes(&outcomes);
    }

    match results.into_iter().find_map(|(_, _, error)| error) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn print_outcomes(outcomes: &[&RunOutcome]) {
    for outcome in outcomes {
        let script = outcome.script.display().to_string();
        match (&outcome.error, &outcome.output_dir) {
            (None, Some(dir)) => {
                let score = outcome
                    .aggregate_score
                    .map(|s| format!("{:.0}%", s * 100.0))
                    .unwrap_or_default();
                println!(
                    "{} {:<32} {:>5}  {}",
                    "✓".bright_green(),
                    script,
                    score,
                    dir.display().to_string().dimmed()
                );
            }
            (Some(error), _) => {
                println!("{} {:<32} {}", "✗".bright_red(), script, error.bright_red());
            }
            (None, None) => println!("{} {}", "?".bright_yellow(), script),
        }
    }
}
