use anyhow::Result;
use solguard::report::Report;

/// A single file prints its report object; several files print an array.
pub fn print(reports: &[Report]) -> Result<()> {
    let json = match reports {
        [report] => serde_json::to_string_pretty(report)?,
        _ => serde_json::to_string_pretty(reports)?,
    };
    println!("{json}");
    Ok(())
}
