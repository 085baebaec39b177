//! Shared fixtures: a fake OpenAI-compatible API and a temporary workspace.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const ANSWER: &str = "Refunds are accepted within 30 days of purchase.";

/// Knobs and counters for the fake API.
#[derive(Clone, Default)]
pub struct FakeApi {
    /// Answer every embeddings call with a 429 `insufficient_quota`.
    pub quota_exhausted: bool,
    /// Number of embeddings calls to fail with a 500 before succeeding.
    pub failures_before_success: usize,
    /// Hold every embeddings call open for 30 seconds.
    pub stall_embeddings: bool,
    pub embedding_calls: Arc<AtomicUsize>,
    pub chat_calls: Arc<AtomicUsize>,
}

impl FakeApi {
    pub fn embedding_calls(&self) -> usize {
        self.embedding_calls.load(Ordering::SeqCst)
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }
}

/// Two-dimensional "embedding": occurrences of "refund" and "shipping".
fn keyword_vector(text: &str) -> Vec<f32> {
    let text = text.to_lowercase();
    vec![
        text.matches("refund").count() as f32 + 0.1,
        text.matches("shipping").count() as f32 + 0.1,
    ]
}

async fn embeddings(State(api): State<FakeApi>, Json(body): Json<Value>) -> Response {
    let call = api.embedding_calls.fetch_add(1, Ordering::SeqCst);
    if api.quota_exhausted {
        let error = json!({
            "error": {
                "message": "You exceeded your current quota, please check your plan and billing details.",
                "type": "insufficient_quota",
                "code": "insufficient_quota"
            }
        });
        return (StatusCode::TOO_MANY_REQUESTS, Json(error)).into_response();
    }
    if api.stall_embeddings {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    }
    if call < api.failures_before_success {
        return (StatusCode::INTERNAL_SERVER_ERROR, "upstream hiccup").into_response();
    }

    let inputs: Vec<String> = body["input"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .map(|(i, text)| json!({"object": "embedding", "index": i, "embedding": keyword_vector(text)}))
        .collect();
    Json(json!({"object": "list", "data": data})).into_response()
}

async fn chat(State(api): State<FakeApi>, Json(_body): Json<Value>) -> Json<Value> {
    api.chat_calls.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": ANSWER}}
        ]
    }))
}

/// Serve `api` on an ephemeral port; returns the base URL (`.../v1`).
pub async fn spawn_fake_api(api: FakeApi) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/v1/embeddings", post(embeddings))
        .route("/v1/chat/completions", post(chat))
        .with_state(api);
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}/v1", addr)
}

/// A temporary workspace with `config/config.toml` and an empty `kb/`.
pub struct Workspace {
    pub tmp: TempDir,
    pub config_path: PathBuf,
}

impl Workspace {
    pub fn new(api_base: &str, max_retries: u32) -> Self {
        let tmp = TempDir::new().unwrap();
        let config_dir = tmp.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();

        let config = format!(
            r#"[FILE]
input_kb_folder = "../kb"
log_folder = "../logs"
main_log_file = "app.log"

[AI]
api_key = "sk-test"
model = "gpt-test"
embedding_model = "embed-test"
api_base = "{}"
timeout_secs = 5
max_retries = {}

[LOG]
level = "debug"
"#,
            api_base, max_retries
        );
        let config_path = config_dir.join("config.toml");
        fs::write(&config_path, config).unwrap();

        Self { tmp, config_path }
    }

    pub fn kb(&self) -> PathBuf {
        self.tmp.path().join("kb")
    }

    pub fn log_file(&self) -> PathBuf {
        self.tmp.path().join("logs").join("app.log")
    }

    pub fn add_document(&self, name: &str, content: &str) {
        fs::create_dir_all(self.kb()).unwrap();
        fs::write(self.kb().join(name), content).unwrap();
    }

    pub fn add_file(&self, name: &str, bytes: &[u8]) {
        fs::create_dir_all(self.kb()).unwrap();
        fs::write(self.kb().join(name), bytes).unwrap();
    }

    pub fn log(&self) -> String {
        read_or_empty(&self.log_file())
    }
}

fn read_or_empty(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

/// A one-page PDF whose content stream selects a font the page never
/// defines; `pdf-extract` panics on it.
pub fn pdf_with_undefined_font() -> Vec<u8> {
    let content = "BT /F9 12 Tf 72 712 Td (Refund policy) Tj ET";
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> /Contents 4 0 R >>"
            .to_string(),
        format!("<< /Length {} >>\nstream\n{}\nendstream", content.len(), content),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }
    let xref_at = pdf.len();
    let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        tail.push_str(&format!("{:010} 00000 n \n", offset));
    }
    tail.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    pdf.extend_from_slice(tail.as_bytes());
    pdf
}
