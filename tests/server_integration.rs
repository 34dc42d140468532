//! End-to-end tests against real HTTP: a stand-in model endpoint served by
//! axum, and the pcmp API router itself.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use product_compare::config::{FetchConfig, LlmConfig};
use product_compare::llm::{GeminiClient, StructuredExtractor};
use product_compare::models::Settings;
use product_compare::page::PageFetcher;
use product_compare::protocol::{ExtractorSource, Request, Service};
use product_compare::scrape::{Provenance, ScrapeState, Scraper};
use product_compare::server;
use product_compare::store::Storage;

const PAGE: &str = r#"<html><body>
  <main>
    <h1>Fallback Phone</h1>
    <span class="price">$199</span>
    <ul class="specifications"><li>4GB RAM</li></ul>
  </main>
</body></html>"#;

const OBJECT: &str = r#"{"title":"Model Phone","price":"299","specs":["6GB RAM","OLED"],"currency":"$"}"#;

#[derive(Clone)]
struct MockModel {
    status: StatusCode,
    reply: String,
    seen: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

impl MockModel {
    fn new(status: StatusCode, reply: impl Into<String>) -> Self {
        Self {
            status,
            reply: reply.into(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn answering(text: &str) -> Self {
        let envelope = json!({
            "candidates": [{"content": {"parts": [{"text": text}]}}]
        });
        Self::new(StatusCode::OK, envelope.to_string())
    }
}

async fn generate(
    State(mock): State<MockModel>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    mock.seen
        .lock()
        .unwrap()
        .push((query.get("key").cloned(), body));
    (mock.status, mock.reply.clone())
}

/// Serve `mock` on a free port and return the generate endpoint URL.
async fn start_model(mock: MockModel) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/v1/generate", post(generate))
        .with_state(mock);
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}/v1/generate", addr)
}

fn llm_config(endpoint: String) -> LlmConfig {
    LlmConfig {
        endpoint,
        timeout_secs: 5,
        ..LlmConfig::default()
    }
}

async fn service_with_key(endpoint: String) -> Service {
    let storage = Arc::new(Storage::in_memory());
    storage
        .save_settings(&Settings {
            api_key: "test-key".into(),
        })
        .await
        .unwrap();
    Service::new(
        storage,
        Scraper::new(PageFetcher::new(&FetchConfig::default()).unwrap(), 5000),
        ExtractorSource::Configured(llm_config(endpoint)),
    )
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

// ═══════════════════════════════════════════════════════════════════════
// Model endpoint
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_server_error_falls_back_from_requesting() {
    let endpoint = start_model(MockModel::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "upstream exploded",
    ))
    .await;
    let svc = service_with_key(endpoint).await;

    let resp = svc
        .handle(Request::ScrapeProduct {
            url: "https://shop.test/phone".into(),
            html: Some(PAGE.into()),
        })
        .await;

    assert!(resp.success, "{:?}", resp.message);
    let product = resp.product.unwrap();
    assert_eq!(product.title, "Fallback Phone");
    assert_eq!(product.price, "199");
    assert_eq!(product.specs, vec!["4GB RAM"]);
    match resp.provenance.unwrap() {
        Provenance::Fallback { from, reason } => {
            assert_eq!(from, ScrapeState::Requesting);
            assert!(reason.contains("500"), "reason: {}", reason);
        }
        other => panic!("expected fallback, got {:?}", other),
    }
}

#[tokio::test]
async fn test_model_reply_is_used_and_request_is_well_formed() {
    let mock = MockModel::answering(&format!("```json\n{}\n```", OBJECT));
    let seen = mock.seen.clone();
    let endpoint = start_model(mock).await;
    let svc = service_with_key(endpoint).await;

    let resp = svc
        .handle(Request::ScrapeProduct {
            url: "https://shop.test/phone".into(),
            html: Some(PAGE.into()),
        })
        .await;

    assert!(resp.success);
    assert_eq!(resp.provenance, Some(Provenance::Model));
    let product = resp.product.unwrap();
    assert_eq!(product.title, "Model Phone");
    assert_eq!(product.specs, vec!["6GB RAM", "OLED"]);
    assert_eq!(product.vendor, "shop.test");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1, "exactly one attempt per scrape");
    let (key, body) = &seen[0];
    assert_eq!(key.as_deref(), Some("test-key"));
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("Fallback Phone"));
    assert!(!prompt.contains("<h1>"));
    assert_eq!(body["generationConfig"]["topK"], 40);
}

#[tokio::test]
async fn test_fenced_and_bare_replies_agree() {
    let fenced = start_model(MockModel::answering(&format!("```json\n{}\n```", OBJECT))).await;
    let bare = start_model(MockModel::answering(OBJECT)).await;

    let a = GeminiClient::new(&llm_config(fenced), "k").unwrap();
    let b = GeminiClient::new(&llm_config(bare), "k").unwrap();

    let a = a.extract("excerpt").await.unwrap();
    let b = b.extract("excerpt").await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.price, "299");
}

#[tokio::test]
async fn test_unparsable_reply_falls_back_from_parsing() {
    let endpoint = start_model(MockModel::answering("Sorry, I cannot help with that.")).await;
    let svc = service_with_key(endpoint).await;

    let resp = svc
        .handle(Request::ScrapeProduct {
            url: "https://shop.test/phone".into(),
            html: Some(PAGE.into()),
        })
        .await;

    assert!(resp.success);
    assert_eq!(resp.product.unwrap().title, "Fallback Phone");
    assert!(matches!(
        resp.provenance,
        Some(Provenance::Fallback {
            from: ScrapeState::Parsing,
            ..
        })
    ));
}

// ═══════════════════════════════════════════════════════════════════════
// HTTP API
// ═══════════════════════════════════════════════════════════════════════

async fn start_api() -> (u16, reqwest::Client) {
    let endpoint = start_model(MockModel::answering(OBJECT)).await;
    let svc = Arc::new(service_with_key(endpoint).await);
    let port = find_free_port();
    let bind = format!("127.0.0.1:{}", port);
    tokio::spawn(async move {
        server::run_server(&bind, svc).await.ok();
    });
    wait_for_server(port).await;
    (port, reqwest::Client::new())
}

fn product(url: &str, title: &str, price: &str, specs: &[&str]) -> Value {
    json!({
        "url": url,
        "title": title,
        "price": price,
        "currency": "$",
        "specs": specs,
        "image": null,
        "vendor": "shop.test"
    })
}

#[tokio::test]
async fn test_api_round_trip() {
    let (port, client) = start_api().await;
    let api = format!("http://127.0.0.1:{}/api", port);

    for p in [
        product("https://shop.test/b", "Budget Phone", "99", &["2GB RAM"]),
        product("https://shop.test/a", "Alpha Phone", "1,299", &["12GB RAM"]),
        product("https://shop.test/k", "Kettle", "25", &["1.7L"]),
    ] {
        let resp: Value = client
            .post(&api)
            .json(&json!({"action": "addProduct", "product": p}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp["success"], true, "{}", resp);
    }

    let resp: Value = client
        .get(format!(
            "http://127.0.0.1:{}/products?filter=ram&sort=price",
            port
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let titles: Vec<&str> = resp["products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Budget Phone", "Alpha Phone"]);

    let resp: Value = client
        .post(&api)
        .json(&json!({"action": "removeProduct", "url": "https://shop.test/k"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["removed"], true);

    let resp: Value = client
        .post(&api)
        .json(&json!({"action": "getProducts"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["products"].as_array().unwrap().len(), 2);
    assert!(resp["products"][0]["addedAt"].is_string());
}

#[tokio::test]
async fn test_api_scrape_and_export() {
    let (port, client) = start_api().await;

    let resp: Value = client
        .post(format!("http://127.0.0.1:{}/api", port))
        .json(&json!({
            "action": "scrapeProduct",
            "url": "https://shop.test/phone",
            "html": PAGE
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["success"], true);
    assert!(resp.get("error").is_none());
    assert_eq!(resp["provenance"]["via"], "model");
    assert_eq!(resp["product"]["title"], "Model Phone");

    let resp = client
        .get(format!("http://127.0.0.1:{}/export.csv", port))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/csv"));
    let body = resp.text().await.unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[1],
        r#""Model Phone","299","$","6GB RAM; OLED","https://shop.test/phone","shop.test""#
    );
}

#[tokio::test]
async fn test_api_reports_failures() {
    let (port, client) = start_api().await;

    let resp: Value = client
        .post(format!("http://127.0.0.1:{}/api", port))
        .json(&json!({"action": "scrapeProduct", "url": "not a url", "html": ""}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp["success"], false);
    assert!(resp.get("message").is_none());
    assert!(resp.get("product").is_none());
    assert!(resp["error"]
        .as_str()
        .unwrap()
        .starts_with("Error scraping product"));

    let health: Value = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
}
