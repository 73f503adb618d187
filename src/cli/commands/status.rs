//! Status command - worker record and stores

use super::format_bytes;
use crate::cli::args::StatusArgs;
use crate::config::Config;
use crate::error::CacheResult;
use crate::lifecycle::WorkerState;
use crate::ui::{self, UiContext};
use serde::Serialize;

#[derive(Serialize)]
struct StoreStatus {
    name: String,
    entries: usize,
    bytes: u64,
    valid: bool,
}

/// Execute the status command
pub async fn execute(args: StatusArgs, config: &Config) -> CacheResult<()> {
    let controller = super::controller(config, true).await?;
    let record = controller.load_record().await?;
    let valid = controller.classifier().valid_stores();
    let storage = controller.storage();

    let mut stores = vec![];
    for name in storage.names().await? {
        let store = storage.open(&name).await?;
        stores.push(StoreStatus {
            entries: store.keys().await?.len(),
            bytes: store.size_bytes().await?,
            valid: valid.contains(&name),
            name,
        });
    }

    if args.format.is_machine() {
        let json = serde_json::json!({
            "version": controller.version(),
            "backend": storage.backend_name(),
            "worker": record,
            "valid_stores": valid,
            "stores": stores,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    let ctx = UiContext::detect();
    ui::intro(&ctx, "flipcache status");

    ui::section(&ctx, "Worker");
    ui::key_value(&ctx, "configured version", controller.version());
    ui::key_value(&ctx, "backend", storage.backend_name());
    match &record {
        Some(record) => {
            let current = record.version == controller.version();
            ui::key_value_status(
                &ctx,
                "recorded version",
                &record.version,
                current,
            );
            ui::key_value_status(
                &ctx,
                "state",
                &record.state.to_string(),
                record.state == WorkerState::Active,
            );
            ui::key_value(
                &ctx,
                "installed",
                &record.installed_at.format("%Y-%m-%d %H:%M").to_string(),
            );
            if let Some(at) = record.activated_at {
                ui::key_value(&ctx, "activated", &at.format("%Y-%m-%d %H:%M").to_string());
            }
            if !current {
                ui::remark(&ctx, "Run: flipcache install");
            }
        }
        None => ui::step_warn_hint(&ctx, "No worker installed", "Run: flipcache install"),
    }

    ui::section(&ctx, "Stores");
    if stores.is_empty() {
        ui::step_info(&ctx, "No stores");
    }
    for store in &stores {
        let detail = format!("{} entries, {}", store.entries, format_bytes(store.bytes));
        if store.valid {
            ui::step_ok_detail(&ctx, &store.name, &detail);
        } else {
            ui::step_warn_hint(&ctx, &format!("{} ({})", store.name, detail), "purged on next activation");
        }
    }

    Ok(())
}
