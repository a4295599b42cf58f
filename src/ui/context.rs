//! UI context for detecting interactive vs CI environments

use std::io::IsTerminal;

/// Env vars set by common CI systems
const CI_VARS: [&str; 10] = [
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "JENKINS_URL",
    "BUILDKITE",
    "TEAMCITY_VERSION",
    "TF_BUILD",
    "BITBUCKET_BUILD_NUMBER",
    "DRONE",
];

/// UI context that determines output behavior
#[derive(Debug, Clone)]
pub struct UiContext {
    /// Whether running in an interactive terminal
    interactive: bool,
}

impl UiContext {
    /// Detect the current environment
    pub fn detect() -> Self {
        Self {
            interactive: Self::detect_interactive(|var| std::env::var_os(var).is_some()),
        }
    }

    /// Create a non-interactive context (for testing or explicit CI mode)
    pub fn non_interactive() -> Self {
        Self { interactive: false }
    }

    /// Check if we should use fancy output (spinners, colors)
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }

    /// Interactive only on a TTY outside CI; most smartcache runs are CI runs
    fn detect_interactive(env_is_set: impl Fn(&str) -> bool) -> bool {
        std::io::stdout().is_terminal()
            && std::io::stderr().is_terminal()
            && !CI_VARS.iter().any(|var| env_is_set(var))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_context() {
        let ctx = UiContext::non_interactive();
        assert!(!ctx.use_fancy_output());
    }

    #[test]
    fn ci_env_forces_plain_output() {
        assert!(!UiContext::detect_interactive(|var| var == "GITLAB_CI"));
    }
}
