//! Interactive vs plain output detection

use std::io::IsTerminal;

/// Environment variables set by common CI providers
const CI_VARS: [&str; 9] = [
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "TRAVIS",
    "JENKINS_URL",
    "BUILDKITE",
    "TEAMCITY_VERSION",
    "TF_BUILD",
];

/// Decides how the CLI talks to the user
#[derive(Debug, Clone)]
pub struct UiContext {
    interactive: bool,
    auto_yes: bool,
}

impl UiContext {
    /// Detect from the current process environment
    pub fn detect() -> Self {
        Self {
            interactive: std::io::stdout().is_terminal()
                && std::io::stdin().is_terminal()
                && !CI_VARS.iter().any(|var| std::env::var_os(var).is_some()),
            auto_yes: false,
        }
    }

    /// Plain output, prompts answered with their defaults
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            auto_yes: false,
        }
    }

    /// Answer every prompt with yes
    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    /// Force plain output, e.g. when stdout carries machine-readable data
    pub fn plain_if(mut self, plain: bool) -> Self {
        if plain {
            self.interactive = false;
        }
        self
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_context() {
        let ctx = UiContext::non_interactive();
        assert!(!ctx.is_interactive());
        assert!(!ctx.auto_yes());
    }

    #[test]
    fn plain_if_overrides_detection() {
        let ctx = UiContext::detect().plain_if(true);
        assert!(!ctx.is_interactive());
    }

    #[test]
    fn with_auto_yes() {
        let ctx = UiContext::non_interactive().with_auto_yes(true);
        assert!(ctx.auto_yes());
    }
}
