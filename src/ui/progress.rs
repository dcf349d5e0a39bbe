//! Progress indicators with CI fallback

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    /// Create a spinner (nothing is shown until `start`)
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    /// Start the spinner with a message
    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    /// Stop with success message
    pub fn stop(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else if self.interactive {
            println!("{} {}", style("✓").green(), message);
        } else {
            println!("{} {}", style("[OK]").green(), message);
        }
    }
}

/// Progress for a cargo build
///
/// Counts `Compiling`/`Checking`/`Documenting` lines from cargo's output and
/// shows the current unit on an indicatif spinner, or prints each line in CI.
pub struct BuildProgress {
    bar: Option<ProgressBar>,
    verbose: bool,
}

impl BuildProgress {
    /// Create a progress indicator labelled `label`
    pub fn new(ctx: &UiContext, label: &str) -> Self {
        let bar = if ctx.use_fancy_output() {
            let bar = ProgressBar::new_spinner();
            let style = ProgressStyle::default_spinner()
                .template("  {spinner:.yellow} {prefix}  {pos:>4} units  {msg:.dim}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ");
            bar.set_style(style);
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(std::time::Duration::from_millis(120));
            Some(bar)
        } else {
            println!("{} {}", style("...").dim(), label);
            None
        };
        Self {
            bar,
            verbose: false,
        }
    }

    /// Also print unit lines in CI
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Process one output line
    pub fn on_line(&self, line: String) {
        let Some((action, unit)) = parse_unit_line(&line) else {
            return;
        };
        match &self.bar {
            Some(bar) => {
                bar.inc(1);
                bar.set_message(format!("{} {}", action, unit));
            }
            None if self.verbose => println!("  {} {}", action, unit),
            None => {}
        }
    }

    /// Finish and clear the indicator
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

const UNIT_ACTIONS: [&str; 4] = ["Compiling", "Checking", "Documenting", "Running"];

/// Parse a cargo status line like `   Compiling regex v1.10.2`
fn parse_unit_line(line: &str) -> Option<(&str, &str)> {
    let (action, rest) = line.trim_start().split_once(' ')?;
    if !UNIT_ACTIONS.contains(&action) {
        return None;
    }
    let unit = rest.trim();
    if unit.is_empty() {
        return None;
    }
    Some((action, unit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_non_interactive() {
        let ctx = UiContext::non_interactive();
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start("Building dependencies...");
        spinner.stop("Dependencies ready");
    }

    #[test]
    fn parses_cargo_unit_lines() {
        assert_eq!(
            parse_unit_line("   Compiling regex v1.10.2"),
            Some(("Compiling", "regex v1.10.2"))
        );
        assert_eq!(
            parse_unit_line("    Checking mjl v0.1.0 (/ws/crates/mjl)"),
            Some(("Checking", "mjl v0.1.0 (/ws/crates/mjl)"))
        );
    }

    #[test]
    fn ignores_other_lines() {
        assert!(parse_unit_line("    Finished `release` profile [optimized] target(s)").is_none());
        assert!(parse_unit_line("warning: unused variable: `x`").is_none());
        assert!(parse_unit_line("Compiling").is_none());
        assert!(parse_unit_line("").is_none());
    }

    #[test]
    fn build_progress_non_interactive() {
        let ctx = UiContext::non_interactive();
        let progress = BuildProgress::new(&ctx, "mjp").verbose(true);
        progress.on_line("   Compiling lazy_static v1.4.0".to_string());
        progress.on_line("error[E0432]: unresolved import".to_string());
        progress.finish();
    }
}
