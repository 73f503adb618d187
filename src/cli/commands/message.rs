//! Protocol commands - usage, prefetch and raw messages

use super::format_bytes;
use crate::cli::args::{MessageArgs, PrefetchArgs};
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::message::{Command, Reply};
use crate::ui::{self, TaskSpinner, UiContext};
use tokio::io::AsyncReadExt;

/// Send a raw protocol message and print the JSON reply
pub async fn execute(args: MessageArgs, config: &Config) -> CacheResult<()> {
    let json = match args.json {
        Some(json) => json,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .map_err(|e| CacheError::io("reading message from stdin", e))?;
            buf
        }
    };

    let command = Command::parse(json.trim())?;
    let reply = send(config, command).await?;
    println!("{}", reply.to_json()?);

    if reply.is_error() {
        return Err(CacheError::User("Command failed".to_string()));
    }
    Ok(())
}

/// Report storage usage
pub async fn usage(config: &Config) -> CacheResult<()> {
    let ctx = UiContext::detect();
    match send(config, Command::GetCacheSize).await? {
        Reply::Usage(Some(estimate)) => {
            ui::key_value(&ctx, "used", &format_bytes(estimate.usage));
            ui::key_value(&ctx, "quota", &format_bytes(estimate.quota));
            ui::key_value_status(
                &ctx,
                "percentage",
                &format!("{:.1}%", estimate.percentage),
                estimate.percentage < 90.0,
            );
        }
        _ => ui::step_info(&ctx, "Storage usage is not available for this backend"),
    }
    Ok(())
}

/// Prefetch model URLs
pub async fn prefetch(args: PrefetchArgs, config: &Config) -> CacheResult<()> {
    let ctx = UiContext::detect();
    let urls = if args.urls.is_empty() {
        config.install.models.clone()
    } else {
        args.urls
    };

    if urls.is_empty() {
        ui::step_info(&ctx, "No model URLs configured");
        return Ok(());
    }

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Prefetching {} model(s)...", urls.len()));

    match send(config, Command::PreloadModels { urls }).await? {
        Reply::Error { error } => {
            spinner.stop_error("Some models were not cached");
            Err(CacheError::User(error))
        }
        _ => {
            spinner.stop("Models cached");
            Ok(())
        }
    }
}

async fn send(config: &Config, command: Command) -> CacheResult<Reply> {
    let controller = super::controller(config, false).await?;
    controller.resume().await?;
    Ok(controller.handle_message(command).await)
}
