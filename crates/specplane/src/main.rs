mod bank;
mod config;
mod interview;
mod output;
mod script;
mod sessions;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use specplane_core::{ComponentType, InterviewError, SessionMode};
use specplane_logging::{init_tracing, LogFormat};

use crate::config::{Overrides, ProjectConfig, Settings, StoreBackend};

#[derive(Parser, Debug)]
#[command(
    name = "specplane",
    about = "Interview-driven component specification generator",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Working directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    working_dir: Option<PathBuf>,

    /// Log output format (default: pretty, or log_format in specplane.toml)
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormatChoice>,

    /// Session store backend (default: file, or [store].backend)
    #[arg(long, value_enum, global = true)]
    store: Option<StoreBackend>,

    /// Show debug logs (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interview a component interactively and generate its spec
    Interview {
        /// Component name (prompted if omitted)
        #[arg(short, long)]
        name: Option<String>,

        /// Component type (prompted if omitted)
        #[arg(short = 't', long = "type", value_enum)]
        component_type: Option<ComponentTypeChoice>,

        /// Interview mode
        #[arg(short, long, value_enum)]
        mode: Option<ModeChoice>,

        /// Question bank (TOML or JSON)
        #[arg(short, long)]
        bank: Option<PathBuf>,

        /// Output directory for generated artifacts
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Resume a saved in-progress session
        #[arg(long, conflicts_with_all = ["name", "component_type", "mode"])]
        resume: Option<String>,
    },

    /// Run answer scripts non-interactively
    Run {
        /// Script files (TOML)
        #[arg(required = true)]
        scripts: Vec<PathBuf>,

        /// Default mode for scripts that don't set one
        #[arg(short, long, value_enum)]
        mode: Option<ModeChoice>,

        /// Question bank (TOML or JSON)
        #[arg(short, long)]
        bank: Option<PathBuf>,

        /// Output directory for generated artifacts
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output outcomes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect and manage saved sessions
    Sessions {
        #[command(subcommand)]
        action: sessions::SessionsAction,
    },

    /// Validate or print a question bank
    Bank {
        #[command(subcommand)]
        action: bank::BankAction,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ComponentTypeChoice {
    Component,
    Widget,
    Service,
    Agent,
    Container,
    Mobile,
}

impl From<ComponentTypeChoice> for ComponentType {
    fn from(choice: ComponentTypeChoice) -> Self {
        match choice {
            ComponentTypeChoice::Component => ComponentType::Component,
            ComponentTypeChoice::Widget => ComponentType::Widget,
            ComponentTypeChoice::Service => ComponentType::Service,
            ComponentTypeChoice::Agent => ComponentType::Agent,
            ComponentTypeChoice::Container => ComponentType::Container,
            ComponentTypeChoice::Mobile => ComponentType::MobileComponent,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeChoice {
    Quick,
    Interactive,
}

impl From<ModeChoice> for SessionMode {
    fn from(choice: ModeChoice) -> Self {
        match choice {
            ModeChoice::Quick => SessionMode::Quick,
            ModeChoice::Interactive => SessionMode::Interactive,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        let (kind, code) = match e.chain().find_map(|e| e.downcast_ref::<InterviewError>()) {
            Some(interview_error) => (interview_error.kind(), interview_error.exit_code()),
            None => ("error", 1),
        };
        eprintln!("{} {:#}", format!("{}:", kind).bright_red().bold(), e);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let working_dir = match cli.working_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let mut overrides = Overrides {
        log_format: cli.log_format.map(Into::into),
        store: cli.store,
        ..Default::default()
    };
    match cli.command {
        Commands::Interview {
            ref bank,
            ref output,
            mode,
            ..
        }
        | Commands::Run {
            ref bank,
            ref output,
            mode,
            ..
        } => {
            overrides.bank = bank.clone();
            overrides.output_dir = output.clone();
            overrides.mode = mode.map(Into::into);
        }
        Commands::Sessions { .. } | Commands::Bank { .. } => {}
    }

    let config = ProjectConfig::load(&working_dir)?;
    let settings = Settings::resolve(&working_dir, config, overrides)?;

    let level = if cli.verbose { "debug" } else { "warn" };
    init_tracing(level, settings.log_format);

    match cli.command {
        Commands::Interview {
            name,
            component_type,
            resume,
            ..
        } => interview::handle_interview(
            &settings,
            interview::InterviewArgs {
                name,
                component_type: component_type.map(Into::into),
                resume,
            },
        ),
        Commands::Run { scripts, json, .. } => script::handle_run(&settings, scripts, json).await,
        Commands::Sessions { action } => sessions::handle_sessions_command(action, &settings),
        Commands::Bank { action } => bank::handle_bank_command(action, settings.bank.as_deref()),
    }
}
