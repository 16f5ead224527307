//! Device command handlers

use anyhow::Result;

use tvm_core::sync::SyncTransport;
use tvm_core::{Store, SyncEngine};

use crate::output::{Output, OutputFormat};

/// Show this device's registration
pub fn show(store: &Store, output: &Output) -> Result<()> {
    let device = store.device()?;

    match output.format {
        OutputFormat::Json => output.json(&serde_json::json!({ "device": device })),
        OutputFormat::Quiet => {
            if let Some(device) = device {
                println!("{}", device.id);
            }
        }
        OutputFormat::Human => match device {
            Some(device) => {
                println!("Device: {}", device.name);
                println!("ID:     {}", device.id);
            }
            None => {
                println!("This device is not registered.");
                println!("Register it with: tvm device register <name>");
            }
        },
    }

    Ok(())
}

/// Register this device, or rename it when already registered
pub async fn register<T: SyncTransport>(
    engine: &SyncEngine<T>,
    name: &str,
    output: &Output,
) -> Result<()> {
    let device = engine.register_device(name).await?;

    if output.is_json() {
        output.json(&device);
    } else if output.is_quiet() {
        println!("{}", device.id);
    } else {
        output.success(&format!("Registered '{}' as {}", device.name, device.id));
    }
    Ok(())
}

pub async fn unregister<T: SyncTransport>(engine: &SyncEngine<T>, output: &Output) -> Result<()> {
    match engine.unregister_device().await? {
        Some(device) => output.success(&format!("Unregistered '{}'", device.name)),
        None => output.message("This device is not registered."),
    }
    Ok(())
}
