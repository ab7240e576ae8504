//! Aggregation engine: roster, concurrent fan-out, weighted scoring and result assembly.

pub mod assemble;
pub mod config;
pub mod content;
pub mod engine;
pub mod roster;
pub mod scoring;
pub mod screenshot;

pub use assemble::{final_score, CheckResult, CheckStatus, ResultAssembler, SecuritySection};
pub use config::{api_key_env, EngineConfig};
pub use content::{ContentAnalyzer, ContentReport, HtmlContentAnalyzer, SkippedContent};
pub use engine::{normalize_url, AggregationEngine, EngineError, RegisteredProvider};
pub use roster::{ProviderRoster, RosterEntry, RosterError};
pub use scoring::{Score, ScoringModel};
pub use screenshot::{Screenshot, ScreenshotService};

pub const CRATE_NAME: &str = "linkguard-engine";

/// Build the assembler from `LINKGUARD_*` environment variables.
pub fn assembler_from_env() -> anyhow::Result<ResultAssembler> {
    ResultAssembler::from_config(&EngineConfig::from_env())
}
