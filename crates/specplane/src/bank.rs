use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use specplane_core::{InterviewError, Question, QuestionBank};

/// Bank compiled into the binary, used when no bank is configured
pub const DEFAULT_BANK: &str = include_str!("../assets/default_bank.toml");

#[derive(Subcommand, Debug)]
pub enum BankAction {
    /// Validate a question bank
    Check {
        /// Bank file (default: configured bank, else the built-in one)
        path: Option<std::path::PathBuf>,
    },

    /// Print the questions of a bank in ask order
    Show {
        path: Option<std::path::PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn handle_bank_command(action: BankAction, configured: Option<&Path>) -> Result<()> {
    match action {
        BankAction::Check { path } => {
            let path = path.as_deref().or(configured);
            let bank = load_bank(path)?;
            println!(
                "{} {}: {} questions, {} required, {} categories",
                "✓".bright_green(),
                describe(path),
                bank.len(),
                bank.required_count(),
                bank.categories().len()
            );
        }
        BankAction::Show { path, json } => {
            let bank = load_bank(path.as_deref().or(configured))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&bank)?);
            } else {
                print_bank(&bank);
            }
        }
    }

    Ok(())
}

/// Load a bank from TOML or JSON (by extension), or the built-in bank.
pub fn load_bank(path: Option<&Path>) -> Result<QuestionBank> {
    let Some(path) = path else {
        return QuestionBank::from_toml_str(DEFAULT_BANK)
            .map_err(InterviewError::from)
            .context("Built-in question bank is invalid");
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read question bank {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        QuestionBank::from_json_str(&content)
    } else {
        QuestionBank::from_toml_str(&content)
    };

    parsed
        .map_err(InterviewError::from)
        .with_context(|| format!("Invalid question bank {}", path.display()))
}

fn describe(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "built-in bank".to_string())
}

fn print_bank(bank: &QuestionBank) {
    for category in bank.categories() {
        println!("{}", category.bright_blue().bold());
        for question in bank.in_category(category) {
            print_question(question);
        }
        println!();
    }
}

fn print_question(question: &Question) {
    let marker = if question.required {
        "*".bright_red().to_string()
    } else {
        " ".to_string()
    };
    println!(
        "  {} {:<28} {} {}",
        marker,
        question.id,
        format!("[{}]", question.answer_shape).dimmed(),
        question.prompt_text
    );
    if !question.choices.is_empty() {
        println!("      {} {}", "choices:".dimmed(), question.choices.join(", "));
    }
    if let Some(ref dependency) = question.depends_on {
        let when = question
            .when
            .as_ref()
            .map(|w| format!(" = {}", w.join(" | ")))
            .unwrap_or_default();
        println!("      {} {}{}", "after:".dimmed(), dependency, when);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_bank_is_valid() {
        let bank = load_bank(None).unwrap();
        assert!(bank.required_count() > 0);
        for role in ["purpose", "failure_handling", "state_management"] {
            assert!(bank.has_category(role), "missing {}", role);
        }
    }

    #[test]
    fn test_load_json_bank() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bank.json");
        std::fs::write(
            &path,
            r#"{"questions":[{"id":"q1","category":"purpose","prompt_text":"Why?","required":true}]}"#,
        )
        .unwrap();
        let bank = load_bank(Some(&path)).unwrap();
        assert_eq!(bank.len(), 1);
    }

    #[test]
    fn test_invalid_bank_maps_to_bank_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bank.toml");
        std::fs::write(
            &path,
            r#"
[[questions]]
id = "q1"
category = "purpose"
prompt = "Why?"
depends_on = "q2"
"#,
        )
        .unwrap();

        let err = load_bank(Some(&path)).unwrap_err();
        let interview_error = err
            .chain()
            .find_map(|e| e.downcast_ref::<InterviewError>())
            .unwrap();
        assert_eq!(interview_error.exit_code(), 3);
        assert!(format!("{:#}", err).contains("q1 -> q2"));
    }
}
