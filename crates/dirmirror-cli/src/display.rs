//! Console output for dirmirror

use console::{style, Term};
use dirmirror_sync::{RunSummary, TaskReport};
use std::time::Duration;

/// Print per-task results followed by the run total
pub fn print_summary(summary: &RunSummary) {
    for report in &summary.reports {
        print_task_report(report);
    }

    for failed in &summary.failed_tasks {
        println!();
        display_error(&format!(
            "Sync From: {} To: {} failed: {}",
            failed.task.source, failed.task.destination, failed.message
        ));
    }

    let totals = summary.totals();
    println!();
    println!("{}", style("Run Summary:").bold().underlined());
    println!(
        "  Tasks: {} completed, {}",
        style(summary.reports.len()).green(),
        if summary.failed_tasks.is_empty() {
            style("0 failed".to_string()).green()
        } else {
            style(format!("{} failed", summary.failed_tasks.len())).red()
        }
    );
    println!(
        "  Files copied: {} ({})",
        style(totals.files_copied).green(),
        style(format_bytes(totals.bytes_copied)).green()
    );
    println!("  Files deleted: {}", style(totals.files_deleted).green());
    println!(
        "  Elapsed: {}",
        style(format_duration(summary.elapsed)).blue()
    );
}

fn print_task_report(report: &TaskReport) {
    let stats = &report.stats;

    println!();
    println!(
        "{} Sync From: {} To: {}",
        style("⟲").blue().bold(),
        style(&report.task.source).cyan(),
        style(&report.task.destination).cyan()
    );

    if report.already_synchronized {
        println!(
            "  {} already synchronized ({} files)",
            style("✓").green(),
            stats.source_files
        );
        return;
    }

    println!("  Source files: {}", style(stats.source_files).cyan());
    println!(
        "  Directories created: {}",
        style(stats.directories_created).green()
    );
    println!(
        "  Files copied: {} ({})",
        style(stats.files_copied).green(),
        style(format_bytes(stats.bytes_copied)).green()
    );
    println!("  Files deleted: {}", style(stats.files_deleted).green());
    println!(
        "  Empty directories removed: {}",
        style(stats.directories_pruned).green()
    );
    println!(
        "  Errors: {}",
        if stats.failures > 0 {
            style(stats.failures).red()
        } else {
            style(stats.failures).green()
        }
    );
    for failure in &report.failures {
        println!("    {} {}", style("✗").red(), style(failure).red());
    }
    println!(
        "  Duration: {}",
        style(format_duration(report.elapsed)).blue()
    );
}

/// Block until the user presses enter
pub fn wait_for_enter() {
    let term = Term::stdout();
    if !term.is_term() {
        return;
    }
    println!();
    println!("{}", style("Press enter to exit...").dim());
    let _ = term.read_line();
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Display an error message with proper formatting
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), style(message).red());
}

/// Display a success message with proper formatting
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), style(message).green());
}

/// Display an info message with proper formatting
pub fn display_info(message: &str) {
    println!("{} {}", style("ℹ").blue().bold(), style(message).blue());
}
