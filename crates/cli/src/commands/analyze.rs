use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use rayon::prelude::*;
use tracing::{info, warn};

use solguard::config::{Config, CONFIG_FILE};
use solguard::report::Report;
use solguard::rule::RuleRegistry;
use solguard::source::{discover, load_source, SourceFile};
use solguard::Analyzer;

use crate::llm::OpenAiAnalyzer;
use crate::output;
use crate::{OutputFormat, SeverityFilter};

pub struct AnalyzeOptions {
    pub format: OutputFormat,
    pub severity: Option<SeverityFilter>,
    pub rules: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub config: Option<PathBuf>,
    pub external: bool,
    pub no_external: bool,
    pub quiet: bool,
    pub no_color: bool,
}

pub async fn run(path: &Path, options: AnalyzeOptions) -> Result<()> {
    // 1. Config, with command-line overrides
    let config_path = options
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let mut config = Config::load(&config_path)?;
    if let Some(severity) = options.severity {
        config.global.severity_threshold = severity_name(severity).to_string();
    }
    let use_external = !options.no_external && (options.external || config.external.enabled);

    // 2. Collect and load contract files; bad files are reported and skipped
    let files: Vec<PathBuf> = discover(path)?
        .into_iter()
        .filter(|f| !config.is_file_excluded(f))
        .collect();

    if !options.quiet {
        eprintln!("Analyzing {} files...", files.len());
    }

    let mut sources: Vec<SourceFile> = Vec::with_capacity(files.len());
    for file in &files {
        match load_source(file, config.limits.max_file_size) {
            Ok(source) => sources.push(source),
            Err(e) => {
                warn!(error = %e, "skipping file");
                eprintln!("Skipping {}", e);
            }
        }
    }

    // 3. Build rule registry
    let mut all_rules = solguard_rules::all_rules();
    if let Some(ref names) = options.rules {
        all_rules.retain(|r| names.iter().any(|n| n == r.name()));
    }
    if let Some(ref names) = options.exclude {
        all_rules.retain(|r| !names.iter().any(|n| n == r.name()));
    }

    let mut registry = RuleRegistry::new();
    registry.register_all(all_rules);

    let timeout = Duration::from_secs(config.external.timeout_secs);
    let collaborator = if use_external {
        match OpenAiAnalyzer::from_config(&config.external) {
            Ok(client) => Some(client),
            Err(e) => {
                warn!(error = %e, "external analysis disabled");
                if !options.quiet {
                    eprintln!("External analysis disabled: {}", e);
                }
                None
            }
        }
    } else {
        None
    };

    let analyzer = Analyzer::with_config(registry, config);

    // 4. Analyze. Local-only runs fan out across files; collaborator runs
    // go one file at a time so the remote endpoint is not flooded.
    let reports: Vec<Report> = match collaborator {
        Some(ref client) => {
            info!(files = sources.len(), "running analysis with external collaborator");
            let mut reports = Vec::with_capacity(sources.len());
            for source in &sources {
                reports.push(
                    analyzer
                        .analyze_with_collaborator(
                            &source.contents,
                            &source.file_name,
                            client,
                            timeout,
                        )
                        .await,
                );
            }
            reports
        }
        None => sources
            .par_iter()
            .map(|source| analyzer.analyze(&source.contents, &source.file_name))
            .collect(),
    };

    // 5. Output
    match options.format {
        OutputFormat::Json => output::json::print(&reports)?,
        OutputFormat::Sarif => output::sarif::print(&reports)?,
        OutputFormat::Text => output::text::print(&reports, options.quiet, options.no_color)?,
    }

    // 6. Exit code
    if reports.iter().any(|r| r.total_vulnerabilities > 0) {
        std::process::exit(1);
    }

    Ok(())
}

fn severity_name(severity: SeverityFilter) -> &'static str {
    match severity {
        SeverityFilter::Critical => "critical",
        SeverityFilter::High => "high",
        SeverityFilter::Medium => "medium",
        SeverityFilter::Low => "low",
        SeverityFilter::Info => "info",
    }
}
