//! Status lines, headers and key/value rows

use super::context::UiContext;
use console::{style, Style};

#[derive(Debug, Clone, Copy)]
enum Level {
    Ok,
    Info,
    Warn,
}

impl Level {
    fn tag(self) -> console::StyledObject<&'static str> {
        match self {
            Self::Ok => style("[OK]").green(),
            Self::Info => style("[INFO]").cyan(),
            Self::Warn => style("[WARN]").yellow(),
        }
    }

    fn log(self, message: &str) {
        let _ = match self {
            Self::Ok => cliclack::log::success(message),
            Self::Info => cliclack::log::info(message),
            Self::Warn => cliclack::log::warning(message),
        };
    }
}

fn step(ctx: &UiContext, level: Level, message: &str) {
    if ctx.is_interactive() {
        level.log(message);
    } else {
        println!("  {} {}", level.tag(), message);
    }
}

/// Title line for a command
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.is_interactive() {
        let _ = cliclack::intro(style(title).cyan().bold());
    } else {
        println!("{}", style(title).cyan().bold());
        println!();
    }
}

/// Closing line after success
pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.is_interactive() {
        let _ = cliclack::outro(style(message).green().bold());
    } else {
        println!();
        println!("{} {}", Level::Ok.tag(), message);
    }
}

pub fn section(_ctx: &UiContext, title: &str) {
    println!();
    println!("{}", style(title).bold());
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    step(ctx, Level::Ok, message);
}

pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    step(ctx, Level::Ok, &format!("{} ({})", message, style(detail).dim()));
}

pub fn step_info(ctx: &UiContext, message: &str) {
    step(ctx, Level::Info, message);
}

pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    step(ctx, Level::Warn, &format!("{} - {}", message, style(hint).dim()));
}

/// Dimmed hint line
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.is_interactive() {
        let _ = cliclack::log::remark(message);
    } else {
        println!("  {}", style(message).dim());
    }
}

pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.is_interactive() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Key/value row colored by whether the value is healthy
pub fn key_value_status(ctx: &UiContext, key: &str, value: &str, ok: bool) {
    if ctx.is_interactive() {
        let value_style = if ok {
            Style::new().green()
        } else {
            Style::new().yellow()
        };
        println!("  {}: {}", style(key).dim(), value_style.apply_to(value));
    } else {
        let level = if ok { Level::Ok } else { Level::Warn };
        println!("  {} {}: {}", level.tag(), key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_non_interactive() {
        let ctx = UiContext::non_interactive();
        intro(&ctx, "Stores");
        step_ok(&ctx, "static-v1");
        step_warn_hint(&ctx, "Stale store", "Run: flipcache install");
        key_value_status(&ctx, "state", "active", true);
        outro_success(&ctx, "Done");
    }
}
