use anyhow::Result;
use focus_core::violation::{ViolationReport, classify};
use serde_json::json;

pub fn run(duration_seconds: u64) -> Result<()> {
    let report = ViolationReport::for_category(classify(duration_seconds));
    let output = json!({
        "durationSeconds": duration_seconds,
        "category": report.category,
        "isCatastrophic": report.is_catastrophic,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
