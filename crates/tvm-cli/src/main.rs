//! tvm CLI
//!
//! Command-line interface for tvm - TV programs, series and episodes.

use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tvm_core::{Config, HttpTransport, StorageError, Store, SyncEngine};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "tvm")]
#[command(about = "tvm - Track TV programs, series and episodes")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show status (device, last sync, pending changes, totals)
    Status,
    /// List programs with their episode counts
    #[command(alias = "ls")]
    Programs,
    /// List the series of a program
    Series {
        /// Program ID
        program_id: String,
    },
    /// List the episodes of a series
    Episodes {
        /// Series ID
        series_id: String,
    },
    /// Series showing now, or with recorded or expected episodes
    Schedule,
    /// Series with at least one episode of a status
    Report {
        /// Watched, Recorded, Expected or Missed
        status: String,
    },
    /// Series that are partly watched
    Incomplete,
    /// Episodes flagged as unscheduled, in date order
    Unscheduled,
    /// Add a program, series or episode
    #[command(alias = "new")]
    Add {
        #[command(subcommand)]
        command: AddCommands,
    },
    /// Change an existing series or episode
    Edit {
        #[command(subcommand)]
        command: EditCommands,
    },
    /// Delete a program, series or episode (and everything under it)
    #[command(alias = "rm")]
    Remove {
        /// Program, Series or Episode
        kind: String,
        /// Entity ID
        id: String,
    },
    /// Device registration with the sync server
    Device {
        #[command(subcommand)]
        command: Option<DeviceCommands>,
    },
    /// Send local changes or fetch remote ones
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum AddCommands {
    /// Add a program
    Program {
        /// Program name
        name: String,
    },
    /// Add a series to a program
    Series {
        /// Program ID
        program_id: String,
        /// Series name
        name: String,
        /// Weekday it is showing on (e.g. "tue" or 2)
        #[arg(short, long)]
        showing: Option<String>,
    },
    /// Add an episode to a series
    Episode {
        /// Series ID
        series_id: String,
        /// Episode name
        name: String,
        #[command(flatten)]
        fields: commands::edit::EpisodeFields,
    },
}

#[derive(Subcommand)]
enum EditCommands {
    /// Rename, move or reschedule a series
    Series {
        /// Series ID
        id: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        /// Move to another program
        #[arg(short, long)]
        program: Option<String>,
        /// Weekday it is showing on; "none" clears it
        #[arg(short, long)]
        showing: Option<String>,
    },
    /// Change an episode's name, status, date or flags
    Episode {
        /// Episode ID
        id: String,
        /// New name
        #[arg(short, long)]
        name: Option<String>,
        #[command(flatten)]
        fields: commands::edit::EpisodeFields,
    },
}

#[derive(Subcommand, Clone)]
enum DeviceCommands {
    /// Show this device's registration
    Show,
    /// Register (or rename) this device
    Register {
        /// Device name
        name: String,
    },
    /// Forget this device on the server and locally
    Unregister,
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Send pending local changes to the server
    Push,
    /// Fetch changes from the server
    Pull {
        /// Replace all local data with the server's
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, sync_url, status_warning_days, log_file)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work without a store
    if let Commands::Config { command } = &cli.command {
        return match command {
            Some(ConfigCommands::Show) | None => commands::config::show(&output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, &output)
            }
        };
    }

    let config = Config::load().context("Failed to load configuration")?;
    init_logging(&config);

    let mut store = match Store::open_with_config(config) {
        Ok(store) => store,
        Err(e) => {
            let hint = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<StorageError>())
                .and_then(StorageError::recovery_suggestion);
            if let Some(hint) = hint {
                output.warning(hint);
            }
            return Err(e.context("Failed to open store"));
        }
    };

    match cli.command {
        Commands::Config { .. } => Ok(()), // Handled above
        Commands::Status => commands::status::show(&store, &output),
        Commands::Programs => commands::listing::programs(&store, &output),
        Commands::Series { program_id } => {
            commands::listing::series(&store, &program_id, &output)
        }
        Commands::Episodes { series_id } => {
            commands::listing::episodes(&store, &series_id, &output)
        }
        Commands::Schedule => commands::listing::schedule(&store, &output),
        Commands::Report { status } => commands::listing::report(&store, &status, &output),
        Commands::Incomplete => commands::listing::incomplete(&store, &output),
        Commands::Unscheduled => commands::listing::unscheduled(&store, &output),
        Commands::Add { command } => handle_add_command(command, &mut store, &output),
        Commands::Edit { command } => handle_edit_command(command, &mut store, &output),
        Commands::Remove { kind, id } => commands::edit::remove(&mut store, &kind, &id, &output),
        Commands::Device { command } => {
            if matches!(command, Some(DeviceCommands::Show) | None) {
                return commands::device::show(&store, &output);
            }
            let engine = sync_engine(store)?;
            match command {
                Some(DeviceCommands::Register { name }) => {
                    commands::device::register(&engine, &name, &output).await
                }
                Some(DeviceCommands::Unregister) => {
                    commands::device::unregister(&engine, &output).await
                }
                Some(DeviceCommands::Show) | None => Ok(()), // Handled above
            }
        }
        Commands::Sync { command } => {
            let engine = sync_engine(store)?;
            match command {
                SyncCommands::Push => commands::sync::push(&engine, &output).await,
                SyncCommands::Pull { all } => commands::sync::pull(&engine, all, &output).await,
            }
        }
    }
}

fn handle_add_command(command: AddCommands, store: &mut Store, output: &Output) -> Result<()> {
    match command {
        AddCommands::Program { name } => commands::edit::add_program(store, name, output),
        AddCommands::Series {
            program_id,
            name,
            showing,
        } => commands::edit::add_series(store, program_id, name, showing.as_deref(), output),
        AddCommands::Episode {
            series_id,
            name,
            fields,
        } => commands::edit::add_episode(store, series_id, name, &fields, output),
    }
}

fn handle_edit_command(command: EditCommands, store: &mut Store, output: &Output) -> Result<()> {
    match command {
        EditCommands::Series {
            id,
            name,
            program,
            showing,
        } => commands::edit::edit_series(store, &id, name, program, showing.as_deref(), output),
        EditCommands::Episode { id, name, fields } => {
            commands::edit::edit_episode(store, &id, name, &fields, output)
        }
    }
}

/// Hand the store to a sync engine talking to the configured server
fn sync_engine(store: Store) -> Result<SyncEngine<HttpTransport>> {
    let Some(url) = store.config().sync_url.clone() else {
        anyhow::bail!(
            "Sync URL not configured. Set it with:\n  \
             tvm config set sync_url http://your-server:3000"
        );
    };

    debug!(url = %url, "Using sync server");
    let transport = HttpTransport::new(&url).context("Failed to create HTTP client")?;
    Ok(SyncEngine::new(Arc::new(Mutex::new(store)), transport))
}

/// Send tracing output to the log file so it stays out of command output.
///
/// The level comes from TVM_LOG (default "info"); RUST_LOG, when set, wins.
fn init_logging(config: &Config) {
    let log_path = config.log_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let Ok(log_file) = OpenOptions::new().create(true).append(true).open(&log_path) else {
        return;
    };

    let log_level = std::env::var("TVM_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("tvm_core={},tvm_cli={}", log_level, log_level))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .try_init();
}
