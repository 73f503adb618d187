//! Install command - populate and activate the configured version

use crate::cli::args::InstallArgs;
use crate::config::Config;
use crate::error::CacheResult;
use crate::lifecycle::{LifecycleController, WorkerState};
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the install command
pub async fn execute(args: InstallArgs, config: &Config) -> CacheResult<()> {
    let ctx = UiContext::detect();
    let controller = super::controller(config, args.offline).await?;
    let version = controller.version().to_string();

    ui::intro(&ctx, &format!("Installing {}", version));

    let resumed = if args.force {
        None
    } else {
        controller.resume().await?
    };

    match resumed.filter(|record| record.version == version).map(|r| r.state) {
        Some(WorkerState::Active) => {
            ui::step_info(&ctx, &format!("{} is already active", version));
            ui::remark(&ctx, "Use --force to reinstall");
            return Ok(());
        }
        Some(WorkerState::Installed) => {
            ui::step_info(&ctx, &format!("{} is installed and waiting", version));
        }
        _ => install(&ctx, &controller).await?,
    }

    if args.no_activate {
        ui::outro_success(&ctx, &format!("{} installed, waiting to activate", version));
        ui::remark(&ctx, r#"Activate with: flipcache message '{"type":"SKIP_WAITING"}'"#);
        return Ok(());
    }

    let report = controller.on_activate().await?;
    for store in &report.purged {
        ui::step_ok_detail(&ctx, "Purged stale store", store);
    }
    ui::outro_success(&ctx, &format!("{} active", version));

    Ok(())
}

async fn install(ctx: &UiContext, controller: &LifecycleController) -> CacheResult<()> {
    let mut spinner = TaskSpinner::new(ctx);
    spinner.start("Fetching install manifest...");

    let report = match controller.on_install().await {
        Ok(report) => report,
        Err(e) => {
            spinner.stop_error("Install failed");
            return Err(e);
        }
    };

    let message = format!("Cached {} assets into {}", report.cached, report.static_store);
    if report.models.failed.is_empty() {
        spinner.stop(&message);
    } else {
        spinner.stop_warn(&message);
    }

    if !report.models.cached.is_empty() {
        ui::step_ok(ctx, &format!("Prefetched {} model(s)", report.models.cached.len()));
    }
    for (url, reason) in &report.models.failed {
        ui::step_warn_hint(ctx, &format!("Model not cached: {}", url), reason);
    }

    Ok(())
}
