//! Terminal output
//!
//! Uses `cliclack` for styled logs and prompts and `indicatif` for build
//! progress, with plain `[OK]`/`[FAIL]` lines when stdout is not a terminal
//! or a CI environment is detected.
//!
//! ```rust,ignore
//! use kiln::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//! ui::intro(&ctx, "kiln check");
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Building dependencies...");
//! spinner.stop("Dependencies ready");
//!
//! ui::step_error_detail(&ctx, "fmt", "cargo fmt exited with 1");
//! ui::outro_error(&ctx, "1 of 8 checks failed");
//! ```

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, log_tail, outro_error, outro_success, remark, section,
    step_error, step_error_detail, step_info, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::{BuildProgress, TaskSpinner};
pub use prompts::confirm;
pub use theme::{init_theme, KilnTheme};
