use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use specplane_core::{CoverageReport, Orchestrator, RiskLevel, Session, SessionStatus};
use specplane_logging::{LogEvent, Logger};
use specplane_store::{SessionFilter, SessionStore, SessionSummary};

use crate::config::Settings;
use crate::{bank, interview, output};

#[derive(Subcommand, Debug)]
pub enum SessionsAction {
    /// List saved sessions, most recent first
    List {
        /// Filter by status (in_progress, complete, abandoned)
        #[arg(long)]
        status: Option<SessionStatus>,

        /// Search component names
        #[arg(long)]
        search: Option<String>,

        /// Show at most this many sessions
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a session's answers and progress
    Show {
        /// Session ID (launches interactive picker if omitted)
        id: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score a session's coverage against the bank
    Score {
        /// Session ID (launches interactive picker if omitted)
        id: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Regenerate artifacts for a complete session
    Generate {
        /// Session ID (launches interactive picker if omitted)
        id: Option<String>,

        /// Output directory (default: configured output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Abandon an in-progress session
    Abandon {
        /// Session ID (launches interactive picker if omitted)
        id: Option<String>,
    },

    /// Delete a saved session
    Delete {
        /// Session ID (launches interactive picker if omitted)
        id: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

pub fn handle_sessions_command(action: SessionsAction, settings: &Settings) -> Result<()> {
    let store = settings.open_store()?;

    match action {
        SessionsAction::List {
            status,
            search,
            limit,
            json,
        } => {
            let filter = SessionFilter {
                status,
                search,
                limit,
            };
            let summaries = store.list(&filter)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if summaries.is_empty() {
                println!("{}", "No sessions found.".dimmed());
            } else {
                print_sessions_table(&summaries);
            }
        }
        SessionsAction::Show { id, json } => {
            let session = load(store.as_ref(), id)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                let bank = bank::load_bank(settings.bank.as_deref())?;
                let orchestrator = Orchestrator::new(&bank);
                print_session_detail(&session, &orchestrator);
            }
        }
        SessionsAction::Score { id, json } => {
            let session = load(store.as_ref(), id)?;
            let bank = bank::load_bank(settings.bank.as_deref())?;
            let orchestrator = Orchestrator::new(&bank).with_generator(settings.generator());
            let report = orchestrator.score(&session);

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_coverage(&report);
            }
        }
        SessionsAction::Generate { id, output } => {
            let session = load(store.as_ref(), id)?;
            let bank = bank::load_bank(settings.bank.as_deref())?;
            let logger = Arc::new(Logger::new(settings.log_format));
            let orchestrator = Orchestrator::new(&bank)
                .with_generator(settings.generator())
                .with_logger(Arc::clone(&logger));

            let (document, coverage) = orchestrator.finish(&session)?;
            let output_dir = output
                .map(|dir| {
                    if dir.is_absolute() {
                        dir
                    } else {
                        settings.working_dir.join(dir)
                    }
                })
                .unwrap_or_else(|| settings.output_dir.clone());
            let dir = output::session_output_dir(&output_dir, &document);
            let written = output::write_artifacts(&dir, &document, &coverage)?;
            logger.log(&LogEvent::ArtifactsWritten {
                session_id: session.session_id.clone(),
                output_dir: dir,
                files: written.len(),
            });

            print_coverage(&coverage);
            interview::print_written(&written);
        }
        SessionsAction::Abandon { id } => {
            let session = load(store.as_ref(), id)?;
            let bank = bank::load_bank(settings.bank.as_deref())?;
            let orchestrator = Orchestrator::new(&bank)
                .with_logger(Arc::new(Logger::new(settings.log_format)));

            let abandoned = orchestrator.abandon(&session)?;
            store.save(&abandoned)?;
            println!("{} {}", "Abandoned".bright_yellow(), abandoned.session_id);
        }
        SessionsAction::Delete { id, yes } => {
            let id = resolve_session_id(store.as_ref(), id)?;

            if !yes {
                let confirmed = dialoguer::Confirm::new()
                    .with_prompt(format!("Delete session {}?", id))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    return Ok(());
                }
            }

            if store.delete(&id)? {
                println!("{} {}", "Deleted".bright_red(), id);
            } else {
                anyhow::bail!("Session not found: {}", id);
            }
        }
    }

    Ok(())
}

fn load(store: &dyn SessionStore, id: Option<String>) -> Result<Session> {
    let id = resolve_session_id(store, id)?;
    store
        .load(&id)
        .with_context(|| format!("Failed to load session {}", id))
}

fn resolve_session_id(store: &dyn SessionStore, id: Option<String>) -> Result<String> {
    if let Some(id) = id {
        return Ok(id);
    }

    // Interactive picker
    let summaries = store.list(&SessionFilter::default())?;
    if summaries.is_empty() {
        anyhow::bail!("No sessions found.");
    }

    let items: Vec<String> = summaries
        .iter()
        .map(|s| {
            format!(
                "{} | {:11} | {} ({}, {} answered)",
                s.updated_at.format("%Y-%m-%d %H:%M"),
                s.status.to_string(),
                s.component_name,
                s.component_type,
                s.answered
            )
        })
        .collect();

    let selection = dialoguer::FuzzySelect::new()
        .with_prompt("Select a session")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(summaries[selection].session_id.clone())
}

/// Pads before coloring so ANSI codes don't break table alignment
fn colored_status(status: SessionStatus, width: usize) -> String {
    let label = format!("{:<width$}", status.to_string());
    match status {
        SessionStatus::Complete => label.bright_green().to_string(),
        SessionStatus::InProgress => label.bright_cyan().to_string(),
        SessionStatus::Abandoned => label.bright_yellow().to_string(),
    }
}

fn colored_risk(risk: RiskLevel) -> String {
    let label = risk.to_string();
    match risk {
        RiskLevel::Low => label.bright_green().to_string(),
        RiskLevel::Medium => label.bright_yellow().to_string(),
        RiskLevel::High | RiskLevel::Critical => label.bright_red().to_string(),
    }
}

fn print_sessions_table(summaries: &[SessionSummary]) {
    println!(
        "{:<20} {:<38} {:<12} {:<18} {:<8} {}",
        "UPDATED".dimmed(),
        "ID".dimmed(),
        "STATUS".dimmed(),
        "TYPE".dimmed(),
        "ANSWERS".dimmed(),
        "COMPONENT".dimmed(),
    );

    for s in summaries {
        println!(
            "{:<20} {:<38} {} {:<18} {:<8} {}",
            s.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            s.session_id,
            colored_status(s.status, 12),
            s.component_type.to_string(),
            s.answered,
            s.component_name
        );
    }
}

fn print_session_detail(session: &Session, orchestrator: &Orchestrator<'_>) {
    let progress = orchestrator.progress(session);

    println!("{}", "=== Session Detail ===".bright_blue().bold());
    println!("{}  {}", "ID:".dimmed(), session.session_id);
    println!("{}  {}", "Component:".dimmed(), session.component_name);
    println!("{}  {}", "Type:".dimmed(), session.component_type);
    println!("{}  {}", "Mode:".dimmed(), session.mode);
    println!("{}  {}", "Status:".dimmed(), colored_status(session.status, 0));
    println!(
        "{}  {}",
        "Created:".dimmed(),
        session.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "{}  {}",
        "Updated:".dimmed(),
        session.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "{}  {}/{} required ({}%), {} skipped",
        "Progress:".dimmed(),
        progress.required_answered,
        progress.required_reachable,
        progress.percent(),
        progress.skipped
    );

    if !session.answers.is_empty() {
        println!();
        println!(
            "{}",
            format!("--- Answers ({}) ---", session.answers.len()).dimmed()
        );
        for answer in &session.answers {
            let prompt = orchestrator
                .bank()
                .get(&answer.question_id)
                .map(|q| q.prompt_text.as_str())
                .unwrap_or("(not in current bank)");
            println!();
            println!(
                "  {} {}",
                format!("[{}]", answer.question_id).bright_blue(),
                answer.timestamp.format("%H:%M:%S").to_string().dimmed()
            );
            println!("    {} {}", "Q:".dimmed(), prompt);
            println!("    {} {}", "A:".dimmed(), answer.value.render());
        }
    }

    if !session.skipped_question_ids.is_empty() {
        println!();
        println!(
            "{}  {}",
            "Skipped:".dimmed(),
            session.skipped_question_ids.join(", ")
        );
    }

    if let Some(next) = orchestrator.current(session) {
        println!();
        println!(
            "{}  {} {}",
            "Next:".dimmed(),
            next.id.bright_cyan(),
            next.prompt_text
        );
    }
}

pub fn print_coverage(report: &CoverageReport) {
    println!(
        "{}  {:.0}% ({} risk)",
        "Coverage:".dimmed(),
        report.aggregate_score * 100.0,
        colored_risk(report.risk_level)
    );

    for (category, score) in &report.per_category {
        let line = format!("  {:<24} {:>4.0}%", category, score * 100.0);
        if report.is_at_risk(category) {
            println!("{} {}", line.bright_red(), "at risk".bright_red());
        } else {
            println!("{}", line);
        }
    }

    if !report.gaps.is_empty() {
        println!("{}", "Unanswered required questions:".dimmed());
        for gap in &report.gaps {
            println!(
                "  {} {} {}",
                format!("[{}]", gap.severity).bright_yellow(),
                gap.question_id,
                gap.prompt_text.dimmed()
            );
        }
    }
}
