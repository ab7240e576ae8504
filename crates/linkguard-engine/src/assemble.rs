//! Final check result: security verdict + page content + screenshot.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use linkguard_core::{OverallSafety, ProviderResult, SecurityVerdict, VerdictSummary};
use linkguard_transport::HttpFetcher;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::content::{ContentAnalyzer, ContentReport, HtmlContentAnalyzer, SkippedContent};
use crate::engine::{normalize_url, AggregationEngine, EngineError};
use crate::roster::ProviderRoster;
use crate::screenshot::{Screenshot, ScreenshotService};

pub const SECURITY_SHARE: f64 = 0.6;
pub const CREDIBILITY_SHARE: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Safe,
    Suspicious,
    Dangerous,
    Unknown,
}

impl CheckStatus {
    pub fn from_score(score: Option<u8>) -> Self {
        match score {
            Some(s) if s >= 60 => CheckStatus::Safe,
            Some(s) if s >= 30 => CheckStatus::Suspicious,
            Some(_) => CheckStatus::Dangerous,
            None => CheckStatus::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CheckStatus::Safe => "safe",
            CheckStatus::Suspicious => "suspicious",
            CheckStatus::Dangerous => "dangerous",
            CheckStatus::Unknown => "unknown",
        }
    }
}

/// 60/40 blend; a missing side defers to the other.
pub fn final_score(security: Option<u8>, credibility: Option<u8>) -> Option<u8> {
    match (security, credibility) {
        (Some(s), Some(c)) => {
            let blended = SECURITY_SHARE * f64::from(s) + CREDIBILITY_SHARE * f64::from(c);
            Some(blended.round().clamp(0.0, 100.0) as u8)
        }
        (Some(s), None) => Some(s),
        (None, Some(c)) => Some(c),
        (None, None) => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySection {
    pub overall_safety: OverallSafety,
    pub overall_score: Option<u8>,
    pub confidence: f64,
    pub summary: VerdictSummary,
    pub details: Vec<ProviderResult>,
    pub duration_ms: u64,
}

impl From<SecurityVerdict> for SecuritySection {
    fn from(verdict: SecurityVerdict) -> Self {
        Self {
            overall_safety: verdict.overall_safety,
            overall_score: verdict.overall_score,
            confidence: verdict.confidence,
            summary: verdict.summary,
            details: verdict.provider_results,
            duration_ms: verdict.duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub id: Uuid,
    pub url: String,
    pub final_score: Option<u8>,
    pub status: CheckStatus,
    pub security: SecuritySection,
    pub content: ContentReport,
    pub screenshot: Screenshot,
    pub checked_at: DateTime<Utc>,
}

pub struct ResultAssembler {
    engine: Arc<AggregationEngine>,
    content: Arc<dyn ContentAnalyzer>,
    screenshots: ScreenshotService,
}

impl ResultAssembler {
    pub fn new(
        engine: Arc<AggregationEngine>,
        content: Arc<dyn ContentAnalyzer>,
        screenshots: ScreenshotService,
    ) -> Self {
        Self {
            engine,
            content,
            screenshots,
        }
    }

    /// Wire the whole pipeline from config: one shared HTTP client for everything.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let roster = config.load_roster()?;
        Self::with_roster(config, &roster)
    }

    pub fn with_roster(config: &EngineConfig, roster: &ProviderRoster) -> Result<Self> {
        let http = Arc::new(HttpFetcher::new(config.http_client_config())?);
        let engine = Arc::new(AggregationEngine::from_config(config, roster, http.clone()));
        let content: Arc<dyn ContentAnalyzer> = if config.content_fetch {
            Arc::new(HtmlContentAnalyzer::new(http.clone()))
        } else {
            Arc::new(SkippedContent)
        };
        let screenshots = ScreenshotService::new(http, config.screenshot_base.clone());
        Ok(Self::new(engine, content, screenshots))
    }

    pub fn engine(&self) -> &AggregationEngine {
        &self.engine
    }

    pub async fn assemble(&self, input: &str) -> Result<CheckResult, EngineError> {
        let url = normalize_url(input)?;
        let id = Uuid::new_v4();
        let span = info_span!("check", %id, url = %url);

        async {
            let (verdict, content, screenshot) = tokio::join!(
                self.engine.analyze_url(&url),
                self.content.analyze(&url),
                self.screenshots.capture(&url),
            );

            let final_score = final_score(verdict.overall_score, content.credibility);
            let status = CheckStatus::from_score(final_score);
            info!(status = status.as_str(), final_score = ?final_score, "check assembled");

            Ok(CheckResult {
                id,
                url: verdict.url.clone(),
                final_score,
                status,
                security: verdict.into(),
                content,
                screenshot,
                checked_at: Utc::now(),
            })
        }
        .instrument(span)
        .await
    }
}
