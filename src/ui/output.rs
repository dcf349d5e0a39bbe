//! Report lines for build and check results
//!
//! Every helper renders through cliclack on a terminal and as a prefixed
//! plain line otherwise, so CI logs stay greppable (`[FAIL] clippy`).

use super::context::UiContext;
use console::{style, StyledObject};

/// Outcome marker of a report line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Mark {
    fn tag(self) -> StyledObject<&'static str> {
        match self {
            Mark::Ok => style("[OK]").green(),
            Mark::Warn => style("[WARN]").yellow(),
            Mark::Fail => style("[FAIL]").red(),
            Mark::Info => style("[INFO]").cyan(),
        }
    }

    fn log(self, text: String) {
        let result = match self {
            Mark::Ok => cliclack::log::success(text),
            Mark::Warn => cliclack::log::warning(text),
            Mark::Fail => cliclack::log::error(text),
            Mark::Info => cliclack::log::info(text),
        };
        result.ok();
    }
}

fn emit(ctx: &UiContext, mark: Mark, fancy: String, plain: String) {
    if ctx.use_fancy_output() {
        mark.log(fancy);
    } else {
        println!("  {} {}", mark.tag(), plain);
    }
}

/// Command banner, e.g. `kiln check (8 checks)`
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).yellow().bold()).ok();
    } else {
        println!("{}", style(title).bold());
    }
}

/// Closing line when everything succeeded
pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        println!("\n{} {}", Mark::Ok.tag(), message);
    }
}

/// Closing line when something failed
pub fn outro_error(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).red().bold()).ok();
    } else {
        println!("\n{} {}", Mark::Fail.tag(), message);
    }
}

/// Heading for a group of lines
pub fn section(ctx: &UiContext, title: &str) {
    println!();
    if ctx.use_fancy_output() {
        cliclack::log::step(style(title).bold()).ok();
    } else {
        println!("{}", style(title).bold());
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    emit(ctx, Mark::Ok, message.to_string(), message.to_string());
}

/// Success with a dimmed detail such as a duration or cache state
pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    emit(
        ctx,
        Mark::Ok,
        format!("{} ({})", message, style(detail).dim()),
        format!("{} ({})", message, detail),
    );
}

/// Warning with the action that resolves it
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    emit(
        ctx,
        Mark::Warn,
        format!("{}\n{}", message, style(hint).dim()),
        format!("{} - {}", message, hint),
    );
}

pub fn step_error(ctx: &UiContext, message: &str) {
    emit(ctx, Mark::Fail, message.to_string(), message.to_string());
}

/// Failure with the reason, e.g. a check name and its exit status
pub fn step_error_detail(ctx: &UiContext, message: &str, detail: &str) {
    emit(
        ctx,
        Mark::Fail,
        format!("{}: {}", message, style(detail).red()),
        format!("{}: {}", message, detail),
    );
}

pub fn step_info(ctx: &UiContext, message: &str) {
    emit(ctx, Mark::Info, message.to_string(), message.to_string());
}

/// Print the last `max` lines of a failed step's output (`0` prints all)
pub fn log_tail(ctx: &UiContext, lines: &[String], max: usize) {
    let start = if max == 0 {
        0
    } else {
        lines.len().saturating_sub(max)
    };
    if start > 0 {
        println!("    {}", style(format!("... {} earlier lines", start)).dim());
    }
    for line in &lines[start..] {
        if ctx.use_fancy_output() {
            println!("    {}", style(line).dim());
        } else {
            println!("    {}", line);
        }
    }
}

/// Dimmed follow-up hint
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}

/// Aligned `key: value` line
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {:<16} {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// `key: value` colored by whether the value is healthy
pub fn key_value_status(ctx: &UiContext, key: &str, value: &str, ok: bool) {
    let mark = if ok { Mark::Ok } else { Mark::Warn };
    if ctx.use_fancy_output() {
        let value = if ok {
            style(value).green()
        } else {
            style(value).yellow()
        };
        println!("  {:<16} {}", style(key).dim(), value);
    } else {
        println!("  {} {}: {}", mark.tag(), key, value);
    }
}
