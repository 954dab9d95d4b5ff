//! Shared fixtures for the HTTP-level tests: deterministic model doubles, an
//! in-memory database and request helpers.

#![allow(dead_code)]

use api_lib::{
    adapters::DbAdapter,
    config::Config,
    web::{build_router, AppState},
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use docchat_core::{
    EmbeddingService, ExtractedText, GenerationService, PortError, PortResult, Prompt,
    TextExtractor,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tower::ServiceExt;

//=========================================================================================
// Model Doubles
//=========================================================================================

const VOCABULARY: &[&str] = &[
    "cholesterol",
    "glucose",
    "hemoglobin",
    "pressure",
    "thyroid",
    "vitamin",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmbedderMode {
    #[default]
    Working,
    Failing,
}

/// Embeds text as keyword counts plus a constant bias dimension, so related texts
/// score higher and no vector is ever zero.
#[derive(Default)]
pub struct KeywordEmbedder {
    calls: AtomicUsize,
    mode: Mutex<EmbedderMode>,
}

impl KeywordEmbedder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_mode(&self, mode: EmbedderMode) {
        *self.mode.lock().unwrap() = mode;
    }
}

#[async_trait]
impl EmbeddingService for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> PortResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.mode.lock().unwrap() == EmbedderMode::Failing {
            return Err(PortError::EmbeddingUnavailable(
                "embedding endpoint returned 503".to_string(),
            ));
        }
        Ok(texts
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                let mut vector: Vec<f32> = VOCABULARY
                    .iter()
                    .map(|word| lower.matches(word).count() as f32)
                    .collect();
                vector.push(0.1);
                vector
            })
            .collect())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorMode {
    Reply,
    Fail,
    Hang,
}

/// Records every prompt and answers according to its mode.
pub struct ScriptedGenerator {
    mode: Mutex<GeneratorMode>,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedGenerator {
    pub fn new(mode: GeneratorMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_mode(&self, mode: GeneratorMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> Prompt {
        self.prompts().pop().expect("no prompt was generated")
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn generate(&self, prompt: &Prompt) -> PortResult<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let mode = *self.mode.lock().unwrap();
        match mode {
            GeneratorMode::Reply => Ok(format!("Reply #{}", self.prompts.lock().unwrap().len())),
            GeneratorMode::Fail => Err(PortError::LlmUnavailable("upstream returned 500".to_string())),
            GeneratorMode::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok("too late".to_string())
            }
        }
    }
}

/// Treats everything after the first line of a `%PDF-` file as its text layer.
pub struct PlainTextPdfExtractor;

impl TextExtractor for PlainTextPdfExtractor {
    fn extract(&self, pdf_bytes: &[u8]) -> PortResult<ExtractedText> {
        if !pdf_bytes.starts_with(b"%PDF-") {
            return Err(PortError::UnreadablePdf("not a PDF".to_string()));
        }
        let body = String::from_utf8_lossy(pdf_bytes);
        let text = body.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
        if text.trim().is_empty() {
            return Err(PortError::UnreadablePdf("no extractable text layer".to_string()));
        }
        Ok(ExtractedText {
            text: text.to_string(),
            page_count: 1,
            empty_pages: 0,
        })
    }
}

/// The bytes of a fake PDF whose text layer is `text`.
pub fn fake_pdf(text: &str) -> Vec<u8> {
    format!("%PDF-1.4\n{}", text).into_bytes()
}

/// Exactly `len` characters of lab-report text.
pub fn report_text(len: usize) -> String {
    "Total cholesterol 190 mg/dL, glucose 92 mg/dL. "
        .chars()
        .cycle()
        .take(len)
        .collect()
}

//=========================================================================================
// Test Application
//=========================================================================================

pub struct TestApp {
    pub router: Router,
    pub embedder: Arc<KeywordEmbedder>,
    pub generator: Arc<ScriptedGenerator>,
}

pub fn test_config() -> Config {
    let mut config = Config::from_lookup(|_| None).expect("defaults are valid");
    config.llm_timeout = Duration::from_millis(200);
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(config: Config) -> TestApp {
    let db = DbAdapter::connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    db.run_migrations().await.expect("migrations");

    let embedder = Arc::new(KeywordEmbedder::default());
    let generator = Arc::new(ScriptedGenerator::new(GeneratorMode::Reply));
    let state = AppState::new(
        Arc::new(config),
        Arc::new(db),
        embedder.clone(),
        generator.clone(),
        Arc::new(PlainTextPdfExtractor),
    );

    TestApp {
        router: build_router(Arc::new(state)),
        embedder,
        generator,
    }
}

//=========================================================================================
// Request Helpers
//=========================================================================================

const BOUNDARY: &str = "docchat-test-boundary";

/// A file part of an upload: file name, content type and raw bytes.
pub struct Part<'a> {
    pub filename: &'a str,
    pub content_type: &'a str,
    pub bytes: Vec<u8>,
}

impl<'a> Part<'a> {
    pub fn pdf(filename: &'a str, text: &str) -> Self {
        Self {
            filename,
            content_type: "application/pdf",
            bytes: fake_pdf(text),
        }
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method(Method::DELETE)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn create_session(&self) -> String {
        let (status, body) = self
            .send(Request::post("/create_session").body(Body::empty()).unwrap())
            .await;
        assert_eq!(status, StatusCode::OK);
        body["session_id"].as_str().unwrap().to_string()
    }

    pub async fn upload(&self, session_id: Option<&str>, parts: &[Part<'_>]) -> (StatusCode, Value) {
        let mut body = Vec::new();
        if let Some(session_id) = session_id {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"session_id\"\r\n\r\n{session_id}\r\n"
                )
                .as_bytes(),
            );
        }
        for part in parts {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    part.filename, part.content_type
                )
                .as_bytes(),
            );
            body.extend_from_slice(&part.bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        self.send(
            Request::post("/upload_pdf")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }

    pub async fn chat(&self, session_id: &str, message: &str) -> (StatusCode, Value) {
        self.post_json(
            "/chat",
            serde_json::json!({ "session_id": session_id, "message": message }),
        )
        .await
    }
}
