//! Sync command handlers

use anyhow::{bail, Result};

use tvm_core::sync::SyncTransport;
use tvm_core::{ImportMode, SyncEngine, SyncError, SyncOutcome};

use crate::output::{Output, OutputFormat};

/// Send pending local changes to the server
pub async fn push<T: SyncTransport>(engine: &SyncEngine<T>, output: &Output) -> Result<()> {
    output.message("Pushing local changes...");
    let outcome = engine.push().await;
    report(outcome, "sent", output)
}

/// Fetch changes from the server; `all` replaces the local data set
pub async fn pull<T: SyncTransport>(
    engine: &SyncEngine<T>,
    all: bool,
    output: &Output,
) -> Result<()> {
    let mode = if all {
        ImportMode::All
    } else {
        ImportMode::Changes
    };

    output.message(if all {
        "Fetching all data..."
    } else {
        "Fetching remote changes..."
    });
    let outcome = engine.pull(mode).await;
    report(outcome, "applied", output)
}

fn report(outcome: SyncOutcome, verb: &str, output: &Output) -> Result<()> {
    match outcome {
        SyncOutcome::Completed { applied } => {
            match output.format {
                OutputFormat::Json => output.json(&serde_json::json!({
                    "status": "success",
                    "applied": applied
                })),
                OutputFormat::Quiet => println!("{}", applied),
                OutputFormat::Human => {
                    output.success(&format!("Sync complete - {} change(s) {}", applied, verb))
                }
            }
            Ok(())
        }
        SyncOutcome::AlreadyRunning => {
            output.warning("A sync is already in progress; nothing was done");
            Ok(())
        }
        SyncOutcome::Failed(errors) => {
            for error in &errors {
                output.warning(&error.to_string());
            }
            let hint = if errors.iter().all(SyncError::is_retryable) {
                " (try again later)"
            } else {
                ""
            };
            bail!("Sync failed with {} error(s){}", errors.len(), hint)
        }
    }
}
