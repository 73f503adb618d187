//! Confirmation prompt with a non-interactive fallback

use super::context::UiContext;
use crate::error::{CacheError, CacheResult};

/// Ask a yes/no question
///
/// Returns true under `--yes`, and `default` when there is no terminal.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> CacheResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    // cliclack blocks on stdin
    let message = message.to_string();
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message)
            .initial_value(default)
            .interact()
    })
    .await
    .map_err(|e| CacheError::User(format!("Prompt task failed: {}", e)))?
    .map_err(|e| CacheError::User(format!("Prompt failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn confirm_auto_yes() {
        let ctx = UiContext::non_interactive().with_auto_yes(true);
        assert!(confirm(&ctx, "Clear store?", false).await.unwrap());
    }

    #[tokio::test]
    async fn confirm_non_interactive_default() {
        let ctx = UiContext::non_interactive();
        assert!(confirm(&ctx, "Clear store?", true).await.unwrap());
        assert!(!confirm(&ctx, "Clear store?", false).await.unwrap());
    }
}
