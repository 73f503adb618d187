//! Stores command - list, inspect and clear stores

use super::format_bytes;
use crate::cli::args::{OutputFormat, StoresAction, StoresArgs};
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::lifecycle::LifecycleController;
use crate::message::{Command, Reply};
use crate::ui::{self, UiContext};
use console::style;

/// Execute the stores command
pub async fn execute(args: StoresArgs, config: &Config) -> CacheResult<()> {
    let controller = super::controller(config, true).await?;

    match args.action {
        StoresAction::List { format } => list_stores(&controller, format).await,
        StoresAction::Keys { name, format } => list_keys(&controller, &name, format).await,
        StoresAction::Clear { name, yes } => clear_store(&controller, &name, yes).await,
    }
}

async fn list_stores(controller: &LifecycleController, format: OutputFormat) -> CacheResult<()> {
    let storage = controller.storage();
    let valid = controller.classifier().valid_stores();
    let names = storage.names().await?;

    match format {
        OutputFormat::Plain => {
            for name in &names {
                println!("{}", name);
            }
        }
        OutputFormat::Json => {
            let mut rows = vec![];
            for name in &names {
                let store = storage.open(name).await?;
                rows.push(serde_json::json!({
                    "name": name,
                    "entries": store.keys().await?.len(),
                    "bytes": store.size_bytes().await?,
                    "valid": valid.contains(name),
                }));
            }
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Table => {
            if names.is_empty() {
                ui::step_info(&UiContext::detect(), "No stores");
                return Ok(());
            }

            println!(
                "{:<24} {:>8} {:>12} {:<8}",
                style("STORE").bold(),
                style("ENTRIES").bold(),
                style("SIZE").bold(),
                style("VALID").bold()
            );
            println!("{}", "-".repeat(55));
            for name in &names {
                let store = storage.open(name).await?;
                let validity = if valid.contains(name) {
                    style("yes").green()
                } else {
                    style("stale").yellow()
                };
                println!(
                    "{:<24} {:>8} {:>12} {:<8}",
                    name,
                    store.keys().await?.len(),
                    format_bytes(store.size_bytes().await?),
                    validity
                );
            }
            println!();
            println!("{} store(s)", names.len());
        }
    }

    Ok(())
}

async fn list_keys(
    controller: &LifecycleController,
    name: &str,
    format: OutputFormat,
) -> CacheResult<()> {
    let storage = controller.storage();
    if !storage.has(name).await? {
        return Err(CacheError::StoreNotFound(name.to_string()));
    }

    let store = storage.open(name).await?;
    let keys = store.keys().await?;

    match format {
        OutputFormat::Json => {
            let mut rows = vec![];
            for key in &keys {
                if let Some(entry) = store.get(key).await? {
                    rows.push(serde_json::json!({
                        "key": entry.key,
                        "status": entry.status,
                        "bytes": entry.body.len(),
                        "inserted_at": entry.inserted_at.to_rfc3339(),
                    }));
                }
            }
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Plain => {
            for key in &keys {
                println!("{}", key);
            }
        }
        OutputFormat::Table => {
            println!(
                "{:<20} {:>10}  {}",
                style("STORED").bold(),
                style("SIZE").bold(),
                style("KEY").bold()
            );
            for key in &keys {
                if let Some(entry) = store.get(key).await? {
                    println!(
                        "{:<20} {:>10}  {}",
                        entry.inserted_at.format("%Y-%m-%d %H:%M:%S"),
                        format_bytes(entry.body.len() as u64),
                        entry.key
                    );
                }
            }
            println!();
            println!("{} entr{} (oldest first)", keys.len(), if keys.len() == 1 { "y" } else { "ies" });
        }
    }

    Ok(())
}

async fn clear_store(controller: &LifecycleController, name: &str, yes: bool) -> CacheResult<()> {
    let ctx = UiContext::detect().with_auto_yes(yes);

    if !controller.storage().has(name).await? {
        return Err(CacheError::StoreNotFound(name.to_string()));
    }

    if !ui::confirm(&ctx, &format!("Delete store {}?", name), false).await? {
        ui::step_info(&ctx, "Aborted");
        return Ok(());
    }

    let reply = controller
        .handle_message(Command::ClearCache {
            cache_name: name.to_string(),
        })
        .await;

    match reply {
        Reply::Error { error } => Err(CacheError::User(error)),
        _ => {
            ui::step_ok(&ctx, &format!("Cleared {}", name));
            Ok(())
        }
    }
}
