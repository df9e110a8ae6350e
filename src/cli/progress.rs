//! Spinners and summary reporting for the terminal front-end.

use std::path::Path;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::InstallReport;

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Creates a ticking spinner with `message`.
pub fn make_spinner(message: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
    );
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Prints the outcome of installing and activating the offline cache.
pub fn print_install_report(report: &InstallReport, deleted: &[String], root: &Path) {
    println!("\n{SEPARATOR}");
    println!("Offline Cache");
    println!("{SEPARATOR}");
    println!("  Bucket:            {}", report.cache_name);
    println!("  Location:          {}", root.display());
    println!("  Assets cached:     {}", report.cached.len());

    if !report.failed.is_empty() {
        println!("  Assets failed:     {}", style(report.failed.len()).red());
        for (asset, reason) in &report.failed {
            println!("    {} {asset}: {reason}", style("✗").red());
        }
    }

    if !deleted.is_empty() {
        println!("  Old caches removed: {}", deleted.join(", "));
    }

    println!("{SEPARATOR}");
}
