//! Status command handler

use anyhow::Result;

use tvm_core::{EpisodeStatus, Store};

use crate::output::{Output, OutputFormat};

/// Show device, sync and content summary
pub fn show(store: &Store, output: &Output) -> Result<()> {
    let config = store.config();
    let device = store.device()?;
    let last_sync = store.last_sync_time()?;
    let pending = store.count_pending_changes()?;

    let programs = store.count_programs()?;
    let series = store.count_series()?;
    let episodes = store.count_episodes()?;
    let mut by_status = Vec::new();
    for status in &EpisodeStatus::ALL[1..] {
        by_status.push((*status, store.count_episodes_by_status(*status)?));
    }

    match output.format {
        OutputFormat::Json => {
            let statuses: serde_json::Map<String, serde_json::Value> = by_status
                .iter()
                .map(|(status, count)| (status.as_str().to_lowercase(), (*count).into()))
                .collect();
            output.json(&serde_json::json!({
                "device": device,
                "sync_url": config.sync_url,
                "last_sync": last_sync,
                "pending_changes": pending,
                "counts": {
                    "programs": programs,
                    "series": series,
                    "episodes": episodes,
                    "by_status": statuses
                }
            }));
        }
        OutputFormat::Quiet => {
            println!("{}", pending);
        }
        OutputFormat::Human => {
            println!("tvm Status");
            println!("==========");
            println!();
            println!("Sync:");
            match device {
                Some(ref device) => println!("  Device:  {} ({})", device.name, device.id),
                None => println!("  Device:  (not registered)"),
            }
            println!(
                "  Server:  {}",
                config.sync_url.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  Last:    {}",
                last_sync
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "never".to_string())
            );
            println!("  Pending: {} change(s)", pending);
            println!();
            println!("Storage:");
            println!("  Location: {}", config.database_path().display());
            println!();
            println!("Contents:");
            println!("  Programs: {}", programs);
            println!("  Series:   {}", series);
            println!("  Episodes: {}", episodes);
            for (status, count) in by_status {
                println!("    {:<9} {}", status.as_str(), count);
            }
        }
    }

    Ok(())
}
