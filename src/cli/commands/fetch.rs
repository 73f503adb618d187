//! Fetch command - run a request through the cache layer

use super::format_bytes;
use crate::cli::args::{FetchArgs, OutputFormat};
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::request::{Request, Response, ResponseSource};
use crate::ui::{self, UiContext};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> CacheResult<()> {
    let controller = super::controller(config, args.offline).await?;
    controller.resume().await?;

    let request = Request::new(args.method, &args.url)?.with_destination(args.destination);
    let intercepted = controller.intercepts(&request);
    debug!("Request {} intercepted: {}", request.key(), intercepted);

    let response = controller.fetch(&request).await?;

    if let Some(path) = &args.output {
        tokio::fs::write(path, &response.body)
            .await
            .map_err(|e| CacheError::io(format!("writing {}", path.display()), e))?;
    }

    match args.format {
        OutputFormat::Json => print_json(&response, intercepted)?,
        OutputFormat::Plain => {
            if args.output.is_none() {
                let mut stdout = tokio::io::stdout();
                stdout
                    .write_all(&response.body)
                    .await
                    .map_err(|e| CacheError::io("writing response body", e))?;
                stdout
                    .flush()
                    .await
                    .map_err(|e| CacheError::io("writing response body", e))?;
            }
        }
        OutputFormat::Table => print_table(&response, intercepted),
    }

    Ok(())
}

fn source_label(source: &ResponseSource) -> String {
    match source {
        ResponseSource::Cache { inserted_at } => {
            format!("cache (stored {})", inserted_at.format("%Y-%m-%d %H:%M:%S"))
        }
        other => other.to_string(),
    }
}

fn print_table(response: &Response, intercepted: bool) {
    let ctx = UiContext::detect();
    ui::key_value_status(&ctx, "status", &response.status.to_string(), response.is_ok());
    ui::key_value(&ctx, "source", &source_label(&response.source));
    ui::key_value(&ctx, "size", &format_bytes(response.body.len() as u64));
    ui::key_value(
        &ctx,
        "content type",
        response.content_type.as_deref().unwrap_or("-"),
    );
    if !intercepted {
        ui::remark(&ctx, "Not intercepted: passed straight to the network");
    }
}

fn print_json(response: &Response, intercepted: bool) -> CacheResult<()> {
    let json = serde_json::json!({
        "url": response.url,
        "status": response.status,
        "source": response.source,
        "content_type": response.content_type,
        "size": response.body.len(),
        "intercepted": intercepted,
    });
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
