use anyhow::Result;

pub fn run() -> Result<()> {
    let rules = solguard_rules::all_rules();

    println!(
        "{:<28} {:<10} {:<26} Description",
        "Name", "Severity", "Category"
    );
    println!("{}", "-".repeat(100));

    for r in &rules {
        println!(
            "{:<28} {:<10} {:<26} {}",
            r.name(),
            r.severity().label(),
            r.category().label(),
            r.description()
        );
    }

    println!("\nTotal: {} rules", rules.len());
    Ok(())
}
