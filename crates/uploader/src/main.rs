//! `uploader` — client binary entry point.
//!
//! Startup sequence:
//! 1. Parse the command line.
//! 2. Load and validate [`Config`] from environment variables.
//! 3. Initialise structured JSON logging.
//! 4. Run the selected mode; exit non-zero if any file failed.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use uploader::config::Config;
use uploader::{files, telemetry, transfer, ApiClient};

#[derive(Parser)]
#[command(name = "uploader")]
#[command(about = "Encrypt model files and upload them to the key server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a fresh key, encrypt every model file in a directory, upload each one
    Upload {
        /// Directory containing model files (not searched recursively)
        models_dir: PathBuf,
    },

    /// Decrypt a local `.enc` file offline with the key in SERVER_KEY
    Decrypt {
        /// Encrypted file to decrypt
        file: PathBuf,
    },

    /// Send a local `.enc` file to the server and save the plaintext it returns
    FetchDecrypted {
        /// Encrypted file to decrypt
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // -----------------------------------------------------------------------
    // 1. Command line
    // -----------------------------------------------------------------------
    let cli = Cli::parse();

    // -----------------------------------------------------------------------
    // 2. Configuration
    // -----------------------------------------------------------------------
    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: uploader configuration invalid: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    // -----------------------------------------------------------------------
    // 3. Telemetry
    // -----------------------------------------------------------------------
    if let Err(e) = telemetry::init(&cfg.log_level) {
        eprintln!("ERROR: {e:#}");
        return ExitCode::FAILURE;
    }

    // -----------------------------------------------------------------------
    // 4. Run
    // -----------------------------------------------------------------------
    match run(cli.command, &cfg).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{e:#}"), "uploader failed");
            ExitCode::FAILURE
        }
    }
}

/// Run one mode. `Ok(false)` means the run finished but something failed.
async fn run(command: Commands, cfg: &Config) -> Result<bool> {
    match command {
        Commands::Upload { models_dir } => {
            let client = ApiClient::new(&cfg.remote()?)?;
            let report =
                transfer::encrypt_and_upload_dir(&client, &models_dir, &cfg.extensions()).await?;
            for failure in &report.failures {
                error!(file = %failure.source.display(), error = %failure.error, "file not uploaded");
            }
            info!(
                uploaded = report.uploaded.len(),
                failed = report.failures.len(),
                "batch complete"
            );
            Ok(report.is_success())
        }
        Commands::Decrypt { file } => {
            let key = cfg.offline_key()?;
            let output = files::decrypt_file(&file, &key).await?;
            info!(output = %output.display(), "decrypted locally");
            Ok(true)
        }
        Commands::FetchDecrypted { file } => {
            let client = ApiClient::new(&cfg.remote()?)?;
            transfer::fetch_decrypted(&client, &file).await?;
            Ok(true)
        }
    }
}
