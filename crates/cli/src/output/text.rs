use anyhow::Result;
use colored::{ColoredString, Colorize};
use solguard::external::ExternalStatus;
use solguard::finding::Severity;
use solguard::report::{Report, RiskLevel};

pub fn print(reports: &[Report], quiet: bool, no_color: bool) -> Result<()> {
    if no_color {
        colored::control::set_override(false);
    }

    if !quiet {
        println!();
        println!("{}", "  solguard - Solidity Security Analysis".bold());
        println!("  Files analyzed: {}", reports.len());
        println!();
    }

    for report in reports {
        print_report(report, quiet);
    }

    if !quiet && reports.len() > 1 {
        let total: usize = reports.iter().map(|r| r.total_vulnerabilities).sum();
        println!("{}", "  Overall".bold().underline());
        for severity in Severity::ALL {
            let count: usize = reports.iter().map(|r| r.count(severity)).sum();
            println!("    {:<10} {}", format!("{}:", title_case(severity)), count);
        }
        println!("    {:<10} {}", "Total:", total);
        println!();
    }

    Ok(())
}

fn print_report(report: &Report, quiet: bool) {
    if !quiet {
        println!(
            "  {} {} ({})",
            "==>".bold(),
            report.contract_name.bold(),
            report.file_name
        );
        if report.is_degraded() {
            println!(
                "    {} source could not be fully parsed; results may be incomplete",
                "warning:".yellow()
            );
        }
        for skipped in &report.skipped_rules {
            println!(
                "    {} rule `{}` skipped: {}",
                "warning:".yellow(),
                skipped.rule,
                skipped.message
            );
        }
        match &report.external {
            ExternalStatus::Failed { reason } => {
                println!("    {} external analysis failed: {}", "warning:".yellow(), reason)
            }
            ExternalStatus::TimedOut { after_ms } => println!(
                "    {} external analysis timed out after {} ms",
                "warning:".yellow(),
                after_ms
            ),
            ExternalStatus::Completed { model } => {
                println!("    {} {}", "external:".dimmed(), model)
            }
            ExternalStatus::NotRequested => {}
        }
        println!();
    }

    if report.vulnerabilities.is_empty() {
        if !quiet {
            println!("  {} No issues found.", "✓".green().bold());
            println!();
        }
        return;
    }

    for finding in &report.vulnerabilities {
        println!(
            "  [{}] {} ({}, {:.1})",
            severity_label(finding.severity()),
            finding.title,
            finding.rule_name,
            finding.risk_score()
        );
        if !finding.description.is_empty() {
            println!("    {}", finding.description);
        }

        let loc = &finding.location;
        match &loc.function {
            Some(function) => println!("    {} {} in `{}`", "-->".dimmed(), loc, function),
            None => println!("    {} {}", "-->".dimmed(), loc),
        }
        if let Some(snippet) = &loc.snippet {
            for line in snippet.lines() {
                println!("    {} {}", "|".dimmed(), line);
            }
        }

        if let Some(rec) = &finding.recommendation {
            println!("    {} {}", "Fix:".green(), rec);
        }
        if let Some(fix) = &finding.suggested_fix {
            println!("    {} {}", "-".red(), fix.original_code);
            println!("    {} {}", "+".green(), fix.fixed_code);
        }
        println!();
    }

    if !report.ai_insights.is_empty() {
        println!("{}", "  Insights".bold().underline());
        for insight in &report.ai_insights {
            println!(
                "    [{}] {} ({:.0}%)",
                insight.category,
                insight.insight,
                insight.confidence * 100.0
            );
        }
        println!();
    }

    if !quiet {
        println!("{}", "  Summary".bold().underline());
        println!(
            "    Risk:     {:.1} {}",
            report.overall_risk_score,
            risk_label(report.risk_level)
        );
        println!("    Critical: {}", report.counts.critical_count);
        println!("    High:     {}", report.counts.high_count);
        println!("    Medium:   {}", report.counts.medium_count);
        println!("    Low:      {}", report.counts.low_count);
        println!("    Info:     {}", report.counts.info_count);
        println!("    Total:    {}", report.total_vulnerabilities);
        println!();
    }
}

fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical => "CRITICAL".magenta().bold(),
        Severity::High => "HIGH".red().bold(),
        Severity::Medium => "MEDIUM".yellow().bold(),
        Severity::Low => "LOW".blue(),
        Severity::Info => "INFO".dimmed(),
    }
}

fn risk_label(level: RiskLevel) -> ColoredString {
    match level {
        RiskLevel::Critical => level.label().magenta().bold(),
        RiskLevel::High => level.label().red().bold(),
        RiskLevel::Medium => level.label().yellow(),
        RiskLevel::Low => level.label().blue(),
        RiskLevel::Minimal => level.label().green(),
    }
}

fn title_case(severity: Severity) -> String {
    let label = severity.label();
    format!("{}{}", &label[..1], label[1..].to_lowercase())
}
