//! CLI output formatting utilities.

use crate::orchestrator::{JobReport, JobStatus};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print the outcome line of one job.
    pub fn job(report: &JobReport) {
        let name = style(&report.file).bold();
        match &report.status {
            JobStatus::Completed => {
                println!("  {} [{}] {}", style("✓").green(), report.index, name);
            }
            JobStatus::Incomplete { stage, reason } => {
                println!(
                    "  {} [{}] {} - {} failed: {}",
                    style("!").yellow(),
                    report.index,
                    name,
                    stage,
                    style(reason).dim()
                );
            }
            JobStatus::SummaryFailed { stage, reason } => {
                println!(
                    "  {} [{}] {} - transcript only, {} failed: {}",
                    style("!").yellow(),
                    report.index,
                    name,
                    stage,
                    style(reason).dim()
                );
            }
            JobStatus::Skipped { stage, reason } => {
                println!(
                    "  {} [{}] {} - skipped at {}: {}",
                    style("✗").red(),
                    report.index,
                    name,
                    stage,
                    style(reason).dim()
                );
            }
        }
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        if let Ok(template) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(template.progress_chars("#>-"));
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(200));
        pb
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(template);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Format a duration in seconds as a short human-readable string.
pub fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else {
        format!("{}s", secs)
    }
}
