use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use linkguard_core::{FailureKind, ProviderId, ThreatTag};
use linkguard_providers::{adapter_for_provider, virustotal, AdapterMode, ProviderSettings, RetryingAdapter};
use linkguard_transport::{BackoffPolicy, HttpClientConfig, HttpFetcher};
use serde_json::Value as JsonValue;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fixture(provider: &str, name: &str) -> JsonValue {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(provider)
        .join(format!("{name}.json"));
    let text = std::fs::read_to_string(&path).expect("read fixture");
    serde_json::from_str(&text).expect("parse fixture")
}

fn http() -> Arc<HttpFetcher> {
    Arc::new(
        HttpFetcher::new(HttpClientConfig {
            timeout: Duration::from_secs(5),
            user_agent: Some("linkguard-test".to_string()),
            ..Default::default()
        })
        .expect("fetcher"),
    )
}

fn live(provider: ProviderId, base_url: String) -> ProviderSettings {
    ProviderSettings::new(provider)
        .with_api_key("test-key")
        .with_base_url(base_url)
}

#[tokio::test]
async fn safe_browsing_match_is_reported_unsafe() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v4/threatMatches:find"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("safe_browsing", "matches")))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter_for_provider(
        ProviderId::SafeBrowsing,
        live(
            ProviderId::SafeBrowsing,
            format!("{}/v4/threatMatches:find", server.uri()),
        ),
        http(),
    );
    assert_eq!(adapter.mode(), AdapterMode::Live);

    let url = Url::parse("http://login-verify.example.net/").unwrap();
    let result = adapter.check(&url).await;
    assert!(result.error.is_none(), "{:?}", result.error);
    assert!(!result.simulated);
    assert_eq!(result.safe, Some(false));
    assert_eq!(result.score, Some(0));
    assert!(result.threat_tags.contains(&ThreatTag::Phishing));
    assert!(result.threat_tags.contains(&ThreatTag::Malware));
}

#[tokio::test]
async fn phishtank_posts_a_form_and_reads_the_verdict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("app_key=test-key"))
        .and(body_string_contains("format=json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("phishtank", "not_listed")))
        .mount(&server)
        .await;

    let adapter = adapter_for_provider(
        ProviderId::PhishTank,
        live(ProviderId::PhishTank, format!("{}/checkurl/", server.uri())),
        http(),
    );
    let result = adapter
        .check(&Url::parse("https://www.rust-lang.org/").unwrap())
        .await;
    assert_eq!(result.safe, Some(true));
    assert_eq!(result.score, Some(100));
}

#[tokio::test]
async fn server_error_becomes_an_http_status_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let adapter = adapter_for_provider(
        ProviderId::NationalCert,
        live(ProviderId::NationalCert, format!("{}/lookup", server.uri())),
        http(),
    );
    let result = adapter
        .check(&Url::parse("https://example.com/").unwrap())
        .await;
    let failure = result.error.expect("failure recorded");
    assert_eq!(failure.kind, FailureKind::HttpStatus);
    assert_eq!(failure.status, Some(503));
    assert!(failure.is_retryable());
    assert_eq!(result.score, None);
    assert_eq!(result.safe, None);
    assert!(result.enabled);
}

#[tokio::test]
async fn malformed_reply_becomes_a_schema_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let adapter = adapter_for_provider(
        ProviderId::DomainTrust,
        live(ProviderId::DomainTrust, format!("{}/v3/targets", server.uri())),
        http(),
    );
    let result = adapter
        .check(&Url::parse("https://example.com/").unwrap())
        .await;
    assert_eq!(result.error.map(|e| e.kind), Some(FailureKind::Schema));
}

#[tokio::test]
async fn virustotal_reads_stats_from_the_url_report() {
    let server = MockServer::start().await;
    let url = Url::parse("http://login-verify.example.net/").unwrap();
    Mock::given(method("GET"))
        .and(path(format!("/api/v3/urls/{}", virustotal::url_id(&url))))
        .and(header("x-apikey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("virustotal", "malicious")))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter_for_provider(
        ProviderId::VirusTotal,
        live(ProviderId::VirusTotal, format!("{}/api/v3/urls", server.uri())),
        http(),
    );
    let result = adapter.check(&url).await;
    assert_eq!(result.safe, Some(false));
    assert_eq!(result.score, Some(88));
    assert_eq!(result.raw["reputation"], -34);
}

#[tokio::test]
async fn virustotal_unknown_url_answers_without_a_score() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"error":{"code":"NotFoundError"}}"#))
        .mount(&server)
        .await;

    let adapter = adapter_for_provider(
        ProviderId::VirusTotal,
        live(ProviderId::VirusTotal, format!("{}/api/v3/urls", server.uri())),
        http(),
    );
    let result = adapter
        .check(&Url::parse("https://never-seen.example/").unwrap())
        .await;
    assert!(result.error.is_none());
    assert!(result.is_answered());
    assert_eq!(result.score, None);
    assert_eq!(result.safe, None);
}

#[tokio::test]
async fn ipqualityscore_embeds_key_and_url_in_the_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/json/url/test-key/https%3A%2F%2Fwww.rust-lang.org%2F"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("ipqualityscore", "benign")))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter_for_provider(
        ProviderId::IpQualityScore,
        live(ProviderId::IpQualityScore, format!("{}/api/json/url", server.uri())),
        http(),
    );
    let result = adapter
        .check(&Url::parse("https://www.rust-lang.org/").unwrap())
        .await;
    assert_eq!(result.safe, Some(true));
    assert_eq!(result.score, Some(100));
}

#[tokio::test]
async fn failed_lookups_never_expose_the_api_key() {
    const KEY: &str = "SECRET-KEY-123";
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string(format!("invalid key {KEY}")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let cases = [
        (ProviderId::IpQualityScore, format!("{}/api/json/url", server.uri())),
        (ProviderId::SafeBrowsing, format!("{}/v4/threatMatches:find", server.uri())),
    ];
    for (provider, base_url) in cases {
        let adapter = adapter_for_provider(
            provider,
            ProviderSettings::new(provider)
                .with_api_key(KEY)
                .with_base_url(base_url),
            http(),
        );
        let result = adapter
            .check(&Url::parse("https://example.com/").unwrap())
            .await;
        assert_eq!(result.error.as_ref().map(|e| e.kind), Some(FailureKind::HttpStatus));
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains(KEY), "{provider} leaked its key: {json}");
    }
}

#[tokio::test]
async fn throttled_lookup_is_retried_until_it_answers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("ipqualityscore", "benign")))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = RetryingAdapter::wrap(
        adapter_for_provider(
            ProviderId::IpQualityScore,
            live(ProviderId::IpQualityScore, format!("{}/api/json/url", server.uri())),
            http(),
        ),
        BackoffPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
        },
    );
    let result = adapter
        .check(&Url::parse("https://www.rust-lang.org/").unwrap())
        .await;
    assert!(result.error.is_none(), "{:?}", result.error);
    assert_eq!(result.score, Some(100));
}

#[tokio::test]
async fn rejected_credentials_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = RetryingAdapter::wrap(
        adapter_for_provider(
            ProviderId::DomainTrust,
            live(ProviderId::DomainTrust, format!("{}/v3/targets", server.uri())),
            http(),
        ),
        BackoffPolicy::with_max_retries(3),
    );
    let result = adapter
        .check(&Url::parse("https://example.com/").unwrap())
        .await;
    let failure = result.error.expect("failure recorded");
    assert_eq!(failure.status, Some(401));
    assert!(!failure.is_retryable());
}
