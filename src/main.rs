use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reqforge::cli::commands::generate::GenerateOptions;
use reqforge::pipeline::RunOutcome;

#[derive(Parser)]
#[command(name = "reqforge")]
#[command(
    version,
    about = "Generate a FastAPI project from a requirements document"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, short, global = true, help = "Load configuration from this file")]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a project from a .docx, .txt or .md requirements document
    Generate {
        #[arg(help = "Requirements document")]
        document: PathBuf,
        #[arg(long, short, help = "Directory that receives generated projects")]
        output: Option<PathBuf>,
        #[arg(long, help = "LLM provider (groq, openai, ollama, scripted)")]
        provider: Option<String>,
        #[arg(long, help = "Model to use")]
        model: Option<String>,
        #[arg(long, help = "Maximum reviewer-requested regenerations")]
        max_regenerations: Option<u32>,
        #[arg(long, help = "Run the four extraction queries concurrently")]
        concurrent: bool,
        #[arg(long, help = "YAML reply script for the scripted provider")]
        script: Option<PathBuf>,
        #[arg(long, help = "Print the run summary as JSON")]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json, yaml"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mreqforge encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when a pipeline run ended in failure
fn run_cli() -> anyhow::Result<bool> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Generate {
            document,
            output,
            provider,
            model,
            max_regenerations,
            concurrent,
            script,
            json,
        } => {
            let outcome = reqforge::cli::commands::generate::run(GenerateOptions {
                document,
                config: cli.config,
                output,
                provider,
                model,
                max_regenerations,
                concurrent,
                script,
                json,
            })?;
            return Ok(!matches!(outcome, RunOutcome::Failed { .. }));
        }
        Commands::Config { action } => match action {
            ConfigAction::Show { format } => {
                reqforge::cli::commands::config::show(&format)?;
            }
            ConfigAction::Path => {
                reqforge::cli::commands::config::path()?;
            }
            ConfigAction::Init { global, force } => {
                if global {
                    reqforge::cli::commands::config::init_global(force)?;
                } else {
                    reqforge::cli::commands::config::init_project(force)?;
                }
            }
        },
    }

    Ok(true)
}
