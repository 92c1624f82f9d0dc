mod commands;
mod llm;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "solguard")]
#[command(about = "Security analysis for Solidity smart contracts")]
#[command(version)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze Solidity contract(s) for vulnerabilities
    Analyze {
        /// Path to a .sol/.vy file or a directory of contracts
        path: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Minimum severity to report (overrides the config file)
        #[arg(short, long)]
        severity: Option<SeverityFilter>,

        /// Run only these rules (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        rules: Option<Vec<String>>,

        /// Exclude these rules (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        exclude: Option<Vec<String>>,

        /// Path to config file (default: .solguard.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Ask the hosted model for additional findings
        #[arg(long, conflicts_with = "no_external")]
        external: bool,

        /// Never contact the hosted model, even if enabled in config
        #[arg(long)]
        no_external: bool,

        /// Suppress banner and summary
        #[arg(short, long)]
        quiet: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
    /// List all available rules
    List,
    /// Generate a default .solguard.toml config file
    Init,
}

#[derive(ValueEnum, Clone, Copy)]
enum OutputFormat {
    Text,
    Json,
    Sarif,
}

#[derive(ValueEnum, Clone, Copy)]
enum SeverityFilter {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze {
            path,
            format,
            severity,
            rules,
            exclude,
            config,
            external,
            no_external,
            quiet,
            no_color,
        } => {
            let options = commands::analyze::AnalyzeOptions {
                format,
                severity,
                rules,
                exclude,
                config,
                external,
                no_external,
                quiet,
                no_color,
            };
            commands::analyze::run(&path, options).await
        }
        Commands::List => commands::list::run(),
        Commands::Init => commands::init::run(),
    }
}
