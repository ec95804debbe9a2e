//! Analyze command implementation

use super::load_cases;
use crate::error::{CliError, Result};
use crate::output;
use reimburse::analysis::{by_trip_length, efficiency_profile};
use std::path::Path;

/// Run the analyze command
pub(crate) fn run(data: &Path, bucket_width: f64, min_count: usize, json: bool) -> Result<()> {
    if !(bucket_width.is_finite() && bucket_width > 0.0) {
        return Err(CliError::Config(format!(
            "bucket width must be > 0, got {bucket_width}"
        )));
    }

    let cases = load_cases(data)?;
    let lengths = by_trip_length(&cases);
    let efficiency = efficiency_profile(&cases, bucket_width, min_count);

    if json {
        let summary = serde_json::json!({
            "cases": cases.len(),
            "by_trip_length": lengths,
            "efficiency": efficiency,
        });
        println!("{summary:#}");
        return Ok(());
    }

    output::section("By trip length");
    println!("  {:>4}  {:>5}  {:>10}  {:>9}", "days", "count", "avg", "per day");
    for s in &lengths {
        println!(
            "  {:>4}  {:>5}  {:>10}  {:>9}",
            s.days,
            s.count,
            output::money(s.avg_output),
            output::money(s.avg_per_day),
        );
    }

    output::section("By miles per day");
    if efficiency.is_empty() {
        output::warning(&format!("No bucket has {min_count} or more cases"));
        return Ok(());
    }
    println!("  {:>7}  {:>5}  {:>9}", "mi/day", "count", "per day");
    for b in &efficiency {
        println!(
            "  {:>7.0}  {:>5}  {:>9}",
            b.miles_per_day,
            b.count,
            output::money(b.avg_per_day),
        );
    }
    Ok(())
}
