//! Terminal output for humans
//!
//! Uses `cliclack` and `indicatif` on an interactive terminal and falls back
//! to plain `[OK]`/`[WARN]` lines in CI. Machine formats (`--format json`,
//! `--format env`) bypass this module and print directly.
//!
//! # Example
//!
//! ```rust,ignore
//! use smartcache::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Waiting for cache lock...");
//! // ... do work ...
//! spinner.stop("Evicted stale entry");
//!
//! ui::step_warn_hint(&ctx, "Cache is STALE", "Run: smartcache warm");
//! ```

mod context;
mod output;
mod progress;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, remark, step_info, step_ok_detail, step_warn,
    step_warn_hint, styled_state,
};
pub use progress::{TaskSpinner, WarmProgress};
pub use theme::{init_theme, SmartCacheTheme};
