//! Classify command - show which route policy a URL resolves to

use super::format_duration;
use crate::cli::args::{ClassifyArgs, OutputFormat};
use crate::config::Config;
use crate::error::CacheResult;
use crate::request::Request;
use crate::routes::RouteClassifier;
use crate::ui::{self, UiContext};

/// Execute the classify command
pub async fn execute(args: ClassifyArgs, config: &Config) -> CacheResult<()> {
    let classifier = RouteClassifier::new(&config.cache.version)?;
    let request = Request::new(args.method, &args.url)?;
    let ctx = UiContext::detect().plain_if(args.format.is_machine());

    let Some((policy, matched_on)) = classifier.classify_explained(&request) else {
        match args.format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({ "url": request.key(), "method": request.method().to_string(), "bypass": true })
            ),
            OutputFormat::Plain => println!("bypass"),
            OutputFormat::Table => ui::step_info(
                &ctx,
                &format!("{} requests bypass the cache and go straight to the network", request.method()),
            ),
        }
        return Ok(());
    };

    match args.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "url": request.key(),
                "route": policy.route,
                "strategy": policy.strategy,
                "store": policy.store,
                "max_age_secs": policy.max_age.as_secs(),
                "max_entries": policy.max_entries,
                "matched_on": matched_on.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Plain => println!("{} {} {}", policy.route, policy.strategy, policy.store),
        OutputFormat::Table => {
            ui::key_value(&ctx, "route", &policy.route);
            ui::key_value(&ctx, "strategy", &policy.strategy.to_string());
            ui::key_value(&ctx, "store", &policy.store);
            ui::key_value(&ctx, "max age", &format_duration(policy.max_age));
            ui::key_value(&ctx, "max entries", &policy.max_entries.to_string());
            ui::key_value(&ctx, "matched on", &matched_on.to_string());
        }
    }

    Ok(())
}
