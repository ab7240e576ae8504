use anyhow::Result;
use clap::{Parser, Subcommand};
use linkguard_engine::{CheckResult, EngineConfig, ResultAssembler};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "linkguard-cli")]
#[command(about = "Check URLs against several threat-intelligence providers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one URL through every provider and print the verdict.
    Check {
        url: String,
        /// Print the full JSON result instead of a summary line.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective provider roster.
    Providers,
    /// Serve the HTTP API.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("linkguard=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { url, json } => {
            let assembler = ResultAssembler::from_config(&EngineConfig::from_env())?;
            let result = assembler.assemble(&url).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", summary_line(&result));
            }
        }
        Commands::Providers => {
            let assembler = ResultAssembler::from_config(&EngineConfig::from_env())?;
            for row in linkguard_web::provider_rows(&assembler) {
                println!(
                    "{:<16} {:<20} weight={:.2} mode={:?}",
                    row.provider.as_str(),
                    row.kind,
                    row.weight,
                    row.mode
                );
            }
        }
        Commands::Serve => linkguard_web::serve_from_env().await?,
    }

    Ok(())
}

fn summary_line(result: &CheckResult) -> String {
    let score = |s: Option<u8>| s.map(|v| v.to_string()).unwrap_or_else(|| "n/a".to_string());
    let summary = &result.security.summary;
    format!(
        "{} status={} final={} security={} ({}) confidence={:.2} credibility={} providers: {} safe, {} unsafe, {} errored, {} simulated",
        result.url,
        result.status.as_str(),
        score(result.final_score),
        score(result.security.overall_score),
        result.security.overall_safety,
        result.security.confidence,
        score(result.content.credibility),
        summary.safe,
        summary.unsafe_count,
        summary.errored,
        summary.simulated,
    )
}
