//! Output formatting utilities

use colored::Colorize;

/// Print a section header
pub(crate) fn section(title: &str) {
    println!("\n{}", format!("=== {title} ===").cyan().bold());
}

/// Print a key-value pair
pub(crate) fn kv(key: &str, value: impl std::fmt::Display) {
    println!("  {}: {}", key.white().bold(), value);
}

/// Print a success message
pub(crate) fn success(msg: &str) {
    println!("{} {}", "[PASS]".green().bold(), msg);
}

/// Print a warning message
pub(crate) fn warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// Print an info message
pub(crate) fn info(msg: &str) {
    println!("{} {}", "[INFO]".blue(), msg);
}

/// Format an amount as dollars and cents.
pub(crate) fn money(value: f64) -> String {
    format!("${value:.2}")
}

/// Format a ratio as a percentage with one decimal.
pub(crate) fn percent(value: f64) -> String {
    format!("{value:.1}%")
}
