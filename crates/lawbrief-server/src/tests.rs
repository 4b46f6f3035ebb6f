use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use lawbrief_core::{
    config::Config,
    llm::CompletionBackend,
    mail::{MailTransport, Message},
    regulatory::{HeadlineSource, RegulatorySource, UpdateSink},
    report::summary_pdf,
    session::SessionStore,
    FeedEntry, RegulatoryUpdate, StoreReport,
};
use lopdf::{dictionary, Document, Object, StringFormat};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;

use crate::{build_router, AppState};

// ── Fakes ─────────────────────────────────────────────────────────────────

struct FakeBackend;

#[async_trait]
impl CompletionBackend for FakeBackend {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if prompt.contains("answer the following question") {
            Ok("Thirty days.".into())
        } else {
            Ok("A supply agreement with a late delivery penalty.".into())
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
struct FakeMailer {
    sent: Mutex<usize>,
}

#[async_trait]
impl MailTransport for FakeMailer {
    async fn send(&self, _message: Message) -> Result<()> {
        *self.sent.lock().unwrap() += 1;
        Ok(())
    }
}

struct FakeRecitals {
    fail: bool,
}

#[async_trait]
impl RegulatorySource for FakeRecitals {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<RegulatoryUpdate>> {
        if self.fail {
            bail!("gdpr-info.eu returned 503");
        }
        Ok((1..=limit)
            .map(|n| RegulatoryUpdate {
                number: n.to_string(),
                title: format!("Recital {n}"),
                content: "Text.".into(),
                release_date: "2018-05-25".into(),
                link: format!("https://gdpr-info.eu/recitals/no-{n}/"),
            })
            .collect())
    }
}

struct FakeHeadlines;

#[async_trait]
impl HeadlineSource for FakeHeadlines {
    async fn latest(&self, _limit: usize) -> Result<Vec<FeedEntry>> {
        bail!("feed unavailable")
    }
}

#[derive(Default)]
struct FakeSink {
    rows: Mutex<Vec<String>>,
}

#[async_trait]
impl UpdateSink for FakeSink {
    async fn store(&self, updates: &[RegulatoryUpdate]) -> Result<StoreReport> {
        let mut rows = self.rows.lock().unwrap();
        rows.extend(updates.iter().map(|u| u.title.clone()));
        Ok(StoreReport {
            stored: updates.len(),
            ..Default::default()
        })
    }
}

// ── Harness ───────────────────────────────────────────────────────────────

struct Harness {
    app: Router,
    mailer: Arc<FakeMailer>,
    sink: Arc<FakeSink>,
}

fn harness(with_mailer: bool, recitals_fail: bool) -> Harness {
    let mut env = HashMap::new();
    env.insert("GROQ_API_KEY".to_string(), "gsk_test".to_string());
    env.insert("STATIC_DIR".to_string(), "/nonexistent".to_string());
    env.insert("SENDER_EMAIL".to_string(), "sender@example.com".to_string());
    let config = Config::from_vars(&env).unwrap();

    let mailer = Arc::new(FakeMailer::default());
    let sink = Arc::new(FakeSink::default());
    let (log_tx, _) = broadcast::channel(16);
    let state = Arc::new(AppState {
        config: Arc::new(config),
        sessions: SessionStore::new(),
        backend: Arc::new(FakeBackend),
        mailer: with_mailer.then(|| Arc::clone(&mailer) as Arc<dyn MailTransport>),
        recitals: Arc::new(FakeRecitals {
            fail: recitals_fail,
        }),
        headlines: Arc::new(FakeHeadlines),
        sink: Some(Arc::clone(&sink) as Arc<dyn UpdateSink>),
        log_tx,
        log_ring: Arc::new(Mutex::new(VecDeque::new())),
    });
    Harness {
        app: build_router(state),
        mailer,
        sink,
    }
}

const BOUNDARY: &str = "lawbrief-test-boundary";

fn upload_request(uri: &str, field: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"contract.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Option<String>, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, content_type, bytes)
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, _, bytes) = send(app, req).await;
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn contract_pdf() -> Vec<u8> {
    summary_pdf("Late delivery incurs a penalty. The Confidentiality of prices is required.")
        .unwrap()
}

async fn create_session(app: &Router) -> String {
    let (status, body) = send_json(app, upload_request("/api/documents", "file", &contract_pdf())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let h = harness(true, false);
    let (status, body) = send_json(&h.app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_upload_runs_full_analysis() {
    let h = harness(true, false);
    let (status, body) =
        send_json(&h.app, upload_request("/api/documents", "file", &contract_pdf())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["file_name"], "contract.pdf");
    assert_eq!(body["page_count"], 1);
    assert_eq!(body["summary"], "A supply agreement with a late delivery penalty.");

    let risks = body["risks"].as_array().unwrap();
    let penalty = risks.iter().find(|r| r["phrase"] == "penalty").unwrap();
    assert_eq!(penalty["level"], "High");
    assert!(body["risk_score"].as_u64().unwrap() >= 3);

    let clauses = body["clauses"].as_array().unwrap();
    let conf = clauses
        .iter()
        .find(|c| c["name"] == "Confidentiality Clause")
        .unwrap();
    assert!(conf["context"].as_str().unwrap().contains("sensitive information"));
    assert_eq!(conf["matches"], json!(["Confidentiality"]));

    let charts = body["charts"].as_array().unwrap();
    let kinds: Vec<&str> = charts.iter().map(|c| c["kind"].as_str().unwrap()).collect();
    assert_eq!(kinds, ["clauses", "obligations", "risks"]);
    assert_eq!(charts[0]["title"], "Detected Key Clauses");
    assert!(charts[0]["legend"]
        .as_str()
        .unwrap()
        .contains("Confidentiality Clause: 1"));
    assert_eq!(charts[2]["title"], "Detected Risks by Level");
    let risk_legend = charts[2]["legend"].as_str().unwrap();
    assert!(risk_legend.starts_with("High: "), "{risk_legend}");
    assert!(!risk_legend.starts_with("High: 0"), "{risk_legend}");
}

#[tokio::test]
async fn test_session_artifacts_and_delete() {
    let h = harness(true, false);
    let id = create_session(&h.app).await;

    let (status, body) = send_json(&h.app, get(&format!("/api/sessions/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());

    for kind in ["clauses", "obligations", "risks"] {
        let (status, ct, bytes) = send(&h.app, get(&format!("/api/sessions/{id}/charts/{kind}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ct.as_deref(), Some("image/png"));
        assert!(bytes.starts_with(b"\x89PNG"));
    }

    for file in ["summary.pdf", "report.pdf"] {
        let (status, ct, bytes) = send(&h.app, get(&format!("/api/sessions/{id}/{file}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ct.as_deref(), Some("application/pdf"));
        assert!(bytes.starts_with(b"%PDF"));
    }

    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/api/sessions/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&h.app, req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send_json(&h.app, get(&format!("/api/sessions/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_unknown_chart_kind_is_bad_request() {
    let h = harness(true, false);
    let id = create_session(&h.app).await;
    let (status, _) = send_json(&h.app, get(&format!("/api/sessions/{id}/charts/pie"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unreadable_upload_is_bad_request() {
    let h = harness(true, false);
    let (status, body) =
        send_json(&h.app, upload_request("/api/documents", "file", b"not a pdf at all")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("parse"));
}

/// Attach a standard security handler entry to an otherwise plain PDF.
fn encrypted_pdf() -> Vec<u8> {
    let mut doc = Document::load_mem(&contract_pdf()).unwrap();
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "O" => Object::String(vec![0x4f; 32], StringFormat::Hexadecimal),
        "U" => Object::String(vec![0x55; 32], StringFormat::Hexadecimal),
        "P" => -4,
    });
    doc.trailer.set("Encrypt", Object::Reference(encrypt_id));
    doc.trailer.set(
        "ID",
        vec![
            Object::String(vec![0x22; 16], StringFormat::Hexadecimal),
            Object::String(vec![0x22; 16], StringFormat::Hexadecimal),
        ],
    );
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

#[tokio::test]
async fn test_encrypted_upload_is_bad_request() {
    let h = harness(true, false);
    let (status, body) =
        send_json(&h.app, upload_request("/api/documents", "file", &encrypted_pdf())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["error"].as_str().unwrap().contains("encrypted"));
}

#[tokio::test]
async fn test_upload_without_file_field_is_bad_request() {
    let h = harness(true, false);
    let (status, body) =
        send_json(&h.app, upload_request("/api/documents", "attachment", &contract_pdf())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("file"));
}

#[tokio::test]
async fn test_quick_summary_creates_no_session() {
    let h = harness(true, false);
    let (status, body) =
        send_json(&h.app, upload_request("/api/summary", "file", &contract_pdf())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"], "A supply agreement with a late delivery penalty.");
    assert!(body.get("id").is_none());
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let h = harness(true, false);
    for uri in [
        "/api/sessions/missing",
        "/api/sessions/missing/report.pdf",
        "/api/sessions/missing/charts/risks",
    ] {
        let (status, _) = send_json(&h.app, get(uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
    let (status, _) = send_json(
        &h.app,
        json_request("POST", "/api/sessions/missing/ask", json!({"question": "Why?"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ask_question() {
    let h = harness(true, false);
    let id = create_session(&h.app).await;
    let uri = format!("/api/sessions/{id}/ask");

    let (status, body) = send_json(
        &h.app,
        json_request("POST", &uri, json!({"question": "What is the notice period?"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Thirty days.");

    let (status, _) = send_json(&h.app, json_request("POST", &uri, json!({"question": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_email_report() {
    let h = harness(true, false);
    let id = create_session(&h.app).await;
    let (status, body) = send_json(
        &h.app,
        json_request(
            "POST",
            &format!("/api/sessions/{id}/email"),
            json!({"recipient": "client@example.com"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "error": null}));
    assert_eq!(*h.mailer.sent.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_email_without_mailer_reports_failure() {
    let h = harness(false, false);
    let id = create_session(&h.app).await;
    let (status, body) = send_json(
        &h.app,
        json_request(
            "POST",
            &format!("/api/sessions/{id}/email"),
            json!({"recipient": "client@example.com"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "email is not configured");
}

#[tokio::test]
async fn test_updates_are_cached_and_stored() {
    let h = harness(true, false);
    let id = create_session(&h.app).await;
    let (status, body) =
        send_json(&h.app, json_request("POST", &format!("/api/sessions/{id}/updates"), json!({}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["updates"].as_array().unwrap().len(), 3);
    assert_eq!(body["headlines"], json!([]));
    assert_eq!(body["stored"]["stored"], 3);
    assert_eq!(h.sink.rows.lock().unwrap().len(), 3);

    let (_, session) = send_json(&h.app, get(&format!("/api/sessions/{id}"))).await;
    assert_eq!(session["updates"][0]["title"], "Recital 1");
}

#[tokio::test]
async fn test_update_fetch_failure_is_bad_gateway() {
    let h = harness(true, true);
    let id = create_session(&h.app).await;
    let (status, body) =
        send_json(&h.app, json_request("POST", &format!("/api/sessions/{id}/updates"), json!({}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("503"));
    assert!(h.sink.rows.lock().unwrap().is_empty());
}
