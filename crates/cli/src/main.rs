// Reconform CLI - batch reconciliation driver

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use reconform_cli::exit_codes::{
    EXIT_ERROR, EXIT_INVALID_CONFIG, EXIT_PIPELINE_ERRORS, EXIT_SUCCESS,
};
use reconform_cli::{run, CliError};

#[derive(Parser)]
#[command(name = "reconform")]
#[command(about = "Conformer record reconciliation and classification")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation job from a TOML config file
    #[command(after_help = "\
Examples:
  reconform run job.toml
  reconform run job.toml --json
  RUST_LOG=debug reconform run job.toml")]
    Run {
        /// Path to the job config file
        config: PathBuf,

        /// Print the run report as JSON instead of a human summary
        #[arg(long)]
        json: bool,
    },

    /// Validate a job config without running
    #[command(after_help = "\
Examples:
  reconform validate job.toml")]
    Validate {
        /// Path to the job config file
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    // Stderr logging, level from RUST_LOG (default info). A logging failure
    // must never take the job down. The handle stays alive for the whole run.
    let _logger = flexi_logger::Logger::try_with_env_or_str("info")
        .and_then(|logger| logger.start())
        .ok();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run { config, json } => cmd_run(&config, json),
        Commands::Validate { config } => cmd_validate(&config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {hint}");
            }
            ExitCode::from(err.code)
        }
    }
}

fn load_config(path: &Path) -> Result<reconform_config::JobConfig, CliError> {
    let text = std::fs::read_to_string(path).map_err(|e| CliError {
        code: EXIT_INVALID_CONFIG,
        message: format!("cannot read config {}: {e}", path.display()),
        hint: None,
    })?;
    reconform_config::JobConfig::from_toml(&text).map_err(|e| CliError {
        code: EXIT_INVALID_CONFIG,
        message: e.to_string(),
        hint: Some("see `reconform validate` for config checking".into()),
    })
}

fn cmd_run(config_path: &Path, json: bool) -> Result<u8, CliError> {
    let config = load_config(config_path)?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let report = run::run_job(&config, base_dir)?;

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                return Err(CliError {
                    code: EXIT_ERROR,
                    message: format!("cannot serialize run report: {e}"),
                    hint: None,
                })
            }
        }
    } else {
        run::print_human_summary(&report);
    }

    if report.group_errors.is_empty() {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_PIPELINE_ERRORS)
    }
}

fn cmd_validate(config_path: &Path) -> Result<u8, CliError> {
    let config = load_config(config_path)?;
    println!("config ok: {}", config.name);
    Ok(EXIT_SUCCESS)
}
