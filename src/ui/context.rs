//! Terminal capability detection

use std::io::IsTerminal;

/// Forces plain output when set to anything but `0`
pub const ENV_PLAIN: &str = "KILN_PLAIN";

/// Variables whose presence marks a CI runner
const CI_MARKERS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "BUILDKITE",
    "JENKINS_URL",
    "TF_BUILD",
];

/// How kiln talks to the terminal
///
/// Fancy output (cliclack logs, indicatif spinners, prompts) needs both
/// stdin and stdout on a terminal. Everything else gets plain prefixed lines.
#[derive(Debug, Clone)]
pub struct UiContext {
    interactive: bool,
    auto_yes: bool,
}

impl UiContext {
    /// Inspect the process environment
    pub fn detect() -> Self {
        Self {
            interactive: Self::terminal_attached() && !Self::forced_plain(),
            auto_yes: false,
        }
    }

    /// Plain output, no prompts
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            auto_yes: false,
        }
    }

    /// Answer every confirmation with yes
    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    /// Whether prompts can be shown
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Whether confirmations are pre-approved (`--yes`)
    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }

    /// Whether spinners and styled logs are used
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }

    fn terminal_attached() -> bool {
        std::io::stdout().is_terminal() && std::io::stdin().is_terminal()
    }

    fn forced_plain() -> bool {
        if matches!(std::env::var(ENV_PLAIN), Ok(v) if v != "0") {
            return true;
        }
        if matches!(std::env::var("TERM"), Ok(term) if term == "dumb") {
            return true;
        }
        CI_MARKERS.iter().any(|var| std::env::var_os(var).is_some())
    }
}
