//! Command-line driver for Evently client sessions.
//!
//! Keeps credentials in a JSON file (like a browser's persisted storage)
//! and talks to a real backend, so every session operation can be tried
//! by hand.
//!
//! # Usage
//!
//! ```bash
//! session-cli [--config evently.json] [--api URL] [--storage FILE] <command>
//! ```
//!
//! # Commands
//!
//! - `status` - Bootstrap both sessions and print a redacted report
//! - `login <user|organizer> <email> <password>` - Sign in and persist
//! - `verify <user|organizer>` - Re-check a stored credential
//! - `logout <user|organizer|all>` - Sign out
//! - `repair` - Fix corrupted stored values
//! - `guard <user|organizer|any> <path>` - What a protected view would do

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use evently::prelude::*;
use evently::telemetry;
use serde::Serialize;

/// Inspect and drive Evently client sessions.
#[derive(Parser)]
#[command(name = "session-cli")]
#[command(about = "Inspect and drive Evently client sessions", long_about = None)]
struct Cli {
    /// JSON client config; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long)]
    api: Option<String>,

    /// Override the credential file
    #[arg(long)]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bootstrap both sessions and print a redacted report.
    Status,

    /// Sign in and persist the credential.
    Login {
        kind: PrincipalKind,
        email: String,
        password: String,
    },

    /// Re-check the stored credential with the backend.
    ///
    /// Any failure signs the principal out.
    Verify { kind: PrincipalKind },

    /// Sign out one principal, or both.
    Logout { target: LogoutTarget },

    /// Fix corrupted stored values (stray quotes, "null", "undefined").
    Repair,

    /// Print what a protected view at PATH would do.
    Guard { requirement: GuardTarget, path: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogoutTarget {
    User,
    Organizer,
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum GuardTarget {
    User,
    Organizer,
    Any,
}

impl From<GuardTarget> for Requirement {
    fn from(target: GuardTarget) -> Self {
        match target {
            GuardTarget::User => Self::User,
            GuardTarget::Organizer => Self::Organizer,
            GuardTarget::Any => Self::Any,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Evently(#[from] EventlyError),

    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        Self::Evently(e.into())
    }
}

impl From<LoginError> for CliError {
    fn from(e: LoginError) -> Self {
        Self::Evently(e.into())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli)?;
    tracing::debug!(api = %config.api_base_url, storage = %config.storage_path.display(), "config loaded");

    match cli.command {
        Command::Status => {
            let sessions = Sessions::builder().config(config).connect().await?;
            print_json(&sessions.diagnostics())?;
        }
        Command::Login {
            kind,
            email,
            password,
        } => {
            let api = config.api_client().map_err(EventlyError::from)?;
            let sessions = offline(config, api.clone())?;
            let grant = api.login(kind, &email, &password).await?;
            sessions.sign_in(grant)?;
            print_json(&sessions.active())?;
        }
        Command::Verify { kind } => {
            let api = config.api_client().map_err(EventlyError::from)?;
            let sessions = offline(config, api)?;
            let identity = sessions.slice(kind).verify().await?;
            print_json(&identity)?;
        }
        Command::Logout { target } => {
            let api = config.api_client().map_err(EventlyError::from)?;
            let sessions = offline(config, api)?;
            match target {
                LogoutTarget::User => sessions.user().logout(),
                LogoutTarget::Organizer => sessions.organizer().logout(),
                LogoutTarget::All => sessions.logout_all(),
            }
            print_json(&sessions.active())?;
        }
        Command::Repair => {
            // Repair before anything else reads the keys, so the report
            // shows what was actually on disk.
            let store = CredentialStore::new(FileStorage::new(&config.storage_path));
            let report: Vec<RepairLine> = store
                .repair_all()
                .into_iter()
                .map(|(kind, outcome)| RepairLine {
                    kind,
                    key: kind.storage_key(),
                    outcome: format!("{outcome:?}").to_lowercase(),
                })
                .collect();
            print_json(&report)?;
        }
        Command::Guard { requirement, path } => {
            let api = config.api_client().map_err(EventlyError::from)?;
            let sessions = offline(config, api)?;
            let mut guard = sessions.guard(requirement.into());
            let decision = guard.resolve(&path).await;
            print_json(&decision)?;
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct RepairLine {
    kind: PrincipalKind,
    key: &'static str,
    outcome: String,
}

fn load_config(cli: &Cli) -> Result<ClientConfig, EventlyError> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_json_file(path)?,
        None => ClientConfig::default(),
    };
    if let Some(api) = &cli.api {
        config.api_base_url = api.clone();
    }
    if let Some(storage) = &cli.storage {
        config.storage_path = storage.clone();
    }
    Ok(config.validated())
}

/// Sessions without the startup bootstrap; commands that need the network
/// trigger it themselves.
fn offline(config: ClientConfig, api: ApiClient) -> Result<Sessions<ApiClient>, EventlyError> {
    Sessions::builder().config(config).verifier(api).build()
}

fn print_json(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
