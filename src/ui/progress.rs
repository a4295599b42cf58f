//! Progress indicators with CI fallback

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A task spinner with CI fallback
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    /// Create a new spinner (shows on `start` in interactive mode)
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
        } else {
            println!("{} {}", style("[OK]").green(), message);
        }
    }

    /// Stop with error message
    pub fn stop_error(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.error(message);
        } else {
            println!("{} {}", style("[FAIL]").red(), message);
        }
    }

    /// Stop with warning message
    pub fn stop_warn(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop(message);
        } else {
            println!("{} {}", style("[WARN]").yellow(), message);
        }
    }
}

/// Live progress for `warm`.
///
/// Shows the latest populate output line and a running count of
/// downloads in interactive mode. In CI only the download count is kept
/// and reported at the end.
pub struct WarmProgress {
    bar: Option<ProgressBar>,
    downloads: AtomicU64,
}

impl WarmProgress {
    /// Create the indicator; `label` is usually the short fingerprint
    pub fn new(ctx: &UiContext, label: &str) -> Self {
        let bar = if ctx.use_fancy_output() {
            let bar = ProgressBar::new_spinner();
            if let Ok(template) = ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} Warming {prefix}  {pos} downloads  {msg:.dim}  {elapsed:.dim}")
            {
                bar.set_style(template.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
            }
            bar.set_prefix(label.to_string());
            bar.enable_steady_tick(Duration::from_millis(120));
            Some(bar)
        } else {
            println!("Warming cache {}...", label);
            None
        };
        Self {
            bar,
            downloads: AtomicU64::new(0),
        }
    }

    /// Feed one line of populate output
    pub fn on_line(&self, line: &str) {
        let trimmed = line.trim();
        if is_download_line(trimmed) {
            let count = self.downloads.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(ref bar) = self.bar {
                bar.set_position(count);
            }
        }
        if let Some(ref bar) = self.bar {
            if !trimmed.is_empty() {
                bar.set_message(truncate(trimmed, 60));
            }
        }
    }

    /// Downloads seen so far
    pub fn downloads(&self) -> u64 {
        self.downloads.load(Ordering::Relaxed)
    }

    /// Finish and clear the spinner
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

/// Gradle prints `Download https://...`; Maven prints `Downloaded from ...`
fn is_download_line(line: &str) -> bool {
    line.starts_with("Download ") || line.starts_with("Downloaded from ")
}

fn truncate(line: &str, max_chars: usize) -> String {
    if line.chars().count() <= max_chars {
        line.to_string()
    } else {
        let head: String = line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_non_interactive() {
        let ctx = UiContext::non_interactive();
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start("Testing...");
        spinner.stop("Done");
        // Should not panic
    }

    #[test]
    fn warm_progress_counts_downloads() {
        let ctx = UiContext::non_interactive();
        let progress = WarmProgress::new(&ctx, "abc123");
        progress.on_line("Download https://repo.maven.apache.org/maven2/junit/junit/4.13.2/junit-4.13.2.jar");
        progress.on_line("Downloaded from central: https://repo.maven.apache.org/x.pom");
        progress.on_line("> Task :dependencies");
        progress.finish();

        assert_eq!(progress.downloads(), 2);
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("short", 60), "short");
        let long = "é".repeat(80);
        assert_eq!(truncate(&long, 10).chars().count(), 10);
    }
}
