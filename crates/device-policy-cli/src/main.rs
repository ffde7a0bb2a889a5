// device-policy-cli/src/main.rs
// ============================================================================
// Module: Device Policy CLI Entry Point
// Description: Command dispatcher for config and persisted state inspection.
// Purpose: Validate configuration and inspect durable policy snapshots offline.
// Dependencies: clap, device-policy-config, device-policy-core,
//               device-policy-store-sqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The `device-policy` CLI validates `device-policy.toml` and inspects the
//! snapshots persisted by the `SQLite` store: it prints canonical state,
//! lists the stored versions, and verifies that the latest snapshot survives
//! the engine's recompute-and-compare load path.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use device_policy_config::ConfigError;
use device_policy_config::DevicePolicyConfig;
use device_policy_config::StoreType;
use device_policy_core::DEFAULT_HASH_ALGORITHM;
use device_policy_core::DevicePolicySnapshot;
use device_policy_core::NoopNotifier;
use device_policy_core::PolicyCatalog;
use device_policy_core::PolicyEngine;
use device_policy_core::PolicyStateStore;
use device_policy_core::UserId;
use device_policy_store_sqlite::SqlitePolicyStore;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "device-policy", disable_help_subcommand = true, version)]
struct Cli {
    /// Optional config file path (defaults to device-policy.toml or env override).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Persisted policy state utilities.
    State {
        /// Selected state subcommand.
        #[command(subcommand)]
        command: StateCommand,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a device policy configuration file.
    Validate,
}

/// State subcommands.
#[derive(Subcommand, Debug)]
enum StateCommand {
    /// Print the latest snapshot as canonical JSON.
    Show(StateShowCommand),
    /// List stored snapshot versions and digests.
    History,
    /// Reload the latest snapshot through the engine and compare digests.
    Verify,
}

/// Arguments for `state show`.
#[derive(Args, Debug)]
struct StateShowCommand {
    /// Only print policies in this user's bucket.
    #[arg(long, value_name = "N", allow_negative_numbers = true, conflicts_with = "global")]
    user: Option<i32>,
    /// Only print device-wide policies.
    #[arg(long)]
    global: bool,
}

impl StateShowCommand {
    /// Returns the bucket filter selected by the flags.
    fn selected_user(&self) -> Option<UserId> {
        if self.global { Some(UserId::ALL) } else { self.user.map(UserId::new) }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(error: ConfigError) -> Self {
        Self::new(format!("failed to load config: {error}"))
    }
}

/// CLI result alias.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let config = DevicePolicyConfig::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Config {
            command,
        } => command_config(&command, &config),
        Commands::State {
            command,
        } => command_state(&command, &config),
    }
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: &ConfigCommand, config: &DevicePolicyConfig) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate => {
            let store = match config.store.store_type {
                StoreType::Memory => "memory",
                StoreType::Sqlite => "sqlite",
            };
            write_stdout_line(&format!("config valid (store: {store})"))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: State Commands
// ============================================================================

/// Dispatches state subcommands.
fn command_state(command: &StateCommand, config: &DevicePolicyConfig) -> CliResult<ExitCode> {
    let store = open_store(config)?;
    match command {
        StateCommand::Show(command) => command_state_show(command, &store),
        StateCommand::History => command_state_history(&store),
        StateCommand::Verify => command_state_verify(config, store),
    }
}

/// Prints the latest snapshot, optionally filtered to one bucket.
fn command_state_show(
    command: &StateShowCommand,
    store: &SqlitePolicyStore,
) -> CliResult<ExitCode> {
    let Some(snapshot) = load_latest(store)? else {
        write_stdout_line("no snapshot stored")?;
        return Ok(ExitCode::SUCCESS);
    };
    let selected = match command.selected_user() {
        Some(user) => snapshot.filter_user(user),
        None => snapshot,
    };
    let bytes = selected
        .canonical_bytes()
        .map_err(|err| CliError::new(format!("failed to serialize snapshot: {err}")))?;
    let text = String::from_utf8(bytes)
        .map_err(|err| CliError::new(format!("canonical json is not utf-8: {err}")))?;
    write_stdout_line(&text)?;
    Ok(ExitCode::SUCCESS)
}

/// Lists stored versions as JSON lines, newest first.
fn command_state_history(store: &SqlitePolicyStore) -> CliResult<ExitCode> {
    let versions = store
        .list_versions()
        .map_err(|err| CliError::new(format!("failed to list snapshot versions: {err}")))?;
    if versions.is_empty() {
        write_stdout_line("no snapshot stored")?;
        return Ok(ExitCode::SUCCESS);
    }
    for summary in &versions {
        let line = serde_json::to_string(summary)
            .map_err(|err| CliError::new(format!("failed to serialize version summary: {err}")))?;
        write_stdout_line(&line)?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Reopens the latest snapshot through the engine and compares digests.
fn command_state_verify(
    config: &DevicePolicyConfig,
    store: SqlitePolicyStore,
) -> CliResult<ExitCode> {
    let Some(stored) = load_latest(&store)? else {
        write_stdout_line("no snapshot stored")?;
        return Ok(ExitCode::SUCCESS);
    };
    let audit = config
        .audit
        .open_sink()
        .map_err(|err| CliError::new(format!("snapshot verification failed: {err}")))?;
    let engine = PolicyEngine::open_with_audit(
        PolicyCatalog::builtin(),
        store,
        NoopNotifier,
        config.engine.engine_config(),
        audit,
    )
    .map_err(|err| CliError::new(format!("snapshot verification failed: {err}")))?;
    let reloaded = engine
        .snapshot()
        .map_err(|err| CliError::new(format!("snapshot verification failed: {err}")))?;
    let stored_digest = snapshot_digest(&stored)?;
    let reloaded_digest = snapshot_digest(&reloaded)?;
    if stored_digest != reloaded_digest {
        return Err(CliError::new(format!(
            "snapshot verification failed: digest {stored_digest} reloaded as {reloaded_digest}"
        )));
    }
    write_stdout_line(&format!(
        "snapshot verified (sequence: {}, policies: {}, {}: {stored_digest})",
        reloaded.sequence,
        reloaded.policies.len(),
        DEFAULT_HASH_ALGORITHM.as_str()
    ))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Opens the configured `SQLite` store.
fn open_store(config: &DevicePolicyConfig) -> CliResult<SqlitePolicyStore> {
    let sqlite = config.store.sqlite_config().ok_or_else(|| {
        CliError::new("state commands require a sqlite store in the config".to_string())
    })?;
    SqlitePolicyStore::new(sqlite)
        .map_err(|err| CliError::new(format!("failed to open store: {err}")))
}

/// Loads the latest stored snapshot.
fn load_latest(store: &SqlitePolicyStore) -> CliResult<Option<DevicePolicySnapshot>> {
    store.load().map_err(|err| CliError::new(format!("failed to load snapshot: {err}")))
}

/// Returns the hex digest of a snapshot's canonical bytes.
fn snapshot_digest(snapshot: &DevicePolicySnapshot) -> CliResult<String> {
    snapshot
        .canonical_bytes_with_digest(DEFAULT_HASH_ALGORITHM)
        .map(|(_, digest)| digest.value)
        .map_err(|err| CliError::new(format!("failed to hash snapshot: {err}")))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
        .map_err(|err| CliError::new(format!("failed to write to stdout: {err}")))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
