//! Screenshot capture through an external rendering service, with a placeholder fallback.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use linkguard_transport::HttpFetcher;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::{form_urlencoded, Url};

pub const PLACEHOLDER_IMAGE: &str = "https://placehold.co/1280x800/png?text=Preview+unavailable";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    pub image_url: String,
    pub captured: bool,
    pub captured_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Screenshot {
    pub fn placeholder(error: Option<String>) -> Self {
        Self {
            image_url: PLACEHOLDER_IMAGE.to_string(),
            captured: false,
            captured_at: Utc::now(),
            error,
        }
    }
}

/// Best-effort page preview through an external capture endpoint.
pub struct ScreenshotService {
    http: Arc<HttpFetcher>,
    base: Option<String>,
}

impl ScreenshotService {
    pub fn new(http: Arc<HttpFetcher>, base: Option<String>) -> Self {
        Self { http, base }
    }

    pub fn capture_url(base: &str, target: &Url) -> String {
        let encoded: String = form_urlencoded::byte_serialize(target.as_str().as_bytes()).collect();
        let sep = if base.contains('?') { '&' } else { '?' };
        format!("{base}{sep}url={encoded}")
    }

    pub async fn capture(&self, target: &Url) -> Screenshot {
        let Some(base) = self.base.as_deref() else {
            debug!(%target, "no screenshot service configured");
            return Screenshot::placeholder(None);
        };
        let image_url = Self::capture_url(base, target);
        match self.http.probe(&image_url).await {
            Ok(_) => Screenshot {
                image_url,
                captured: true,
                captured_at: Utc::now(),
                error: None,
            },
            Err(err) => {
                warn!(%target, error = %err, "screenshot capture failed");
                Screenshot::placeholder(Some(err.to_string()))
            }
        }
    }
}
