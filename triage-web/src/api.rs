//! Rotas HTTP e WebSocket do serviço de triagem.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use triage_core::{
    knowledge, InputKind, PipelineEvent, Screener, Severity, TriageError, TriagePipeline,
};

/// Tamanho máximo aceito para uploads de imagem.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Estado compartilhado da aplicação
pub struct AppState {
    pub pipeline: TriagePipeline,
    pub screener: Screener,
}

pub type SharedState = Arc<AppState>;

/// Falha de uma requisição, convertida em `{"detail": ...}` com o status adequado.
#[derive(Debug)]
pub enum ApiError {
    Triage(TriageError),
    /// Requisição malformada (campo obrigatório ausente, multipart inválido)
    Unprocessable(String),
    Internal(String),
}

impl From<TriageError> for ApiError {
    fn from(e: TriageError) -> Self {
        ApiError::Triage(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Triage(e) => {
                let status = match &e {
                    TriageError::EmptyText
                    | TriageError::MissingInput
                    | TriageError::InvalidImage(_)
                    | TriageError::UnsupportedInput(_) => StatusCode::BAD_REQUEST,
                    TriageError::ImageModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                    TriageError::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        if status.is_server_error() {
            warn!(status = status.as_u16(), detail = %detail, "requisição falhou");
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

#[derive(Deserialize)]
struct TextInput {
    text: String,
}

#[derive(Deserialize)]
struct CombinedQuery {
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    input: String,
}

/// Mensagem WebSocket recebida do cliente
#[derive(Deserialize)]
struct WsRequest {
    text: String,
}

/// Monta o router com todas as rotas, CORS aberto e trace das requisições.
pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/predict_text", post(predict_text_handler))
        .route("/predict_image", post(predict_image_handler))
        .route("/predict_combined", post(predict_combined_handler))
        .route("/symptoms", get(symptoms_handler))
        .route("/diseases", get(diseases_handler))
        .route("/severity_levels", get(severity_levels_handler))
        .route("/analyze", post(analyze_handler))
        .route("/ws", get(ws_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Executa uma análise do pipeline fora do runtime assíncrono.
async fn run_blocking<T, F>(state: &SharedState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&TriagePipeline) -> triage_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state.pipeline))
        .await
        .map_err(|e| ApiError::Internal(format!("Analysis task failed: {e}")))?
        .map_err(ApiError::from)
}

/// Campos lidos de um corpo multipart.
#[derive(Default)]
struct UploadForm {
    file: Option<Vec<u8>>,
    text: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Unprocessable(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Unprocessable(format!("Cannot read file: {e}")))?;
                form.file = Some(bytes.to_vec());
            }
            Some("text") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Unprocessable(format!("Cannot read text: {e}")))?;
                form.text = Some(text);
            }
            _ => {}
        }
    }
    Ok(form)
}

async fn root_handler(State(state): State<SharedState>) -> Json<Value> {
    let image_status = if state.pipeline.image_model().is_some() {
        "loaded ✓"
    } else {
        "not loaded ✗"
    };
    Json(json!({
        "status": "healthy",
        "service": "Medical Symptom & Disease Predictor API",
        "version": env!("CARGO_PKG_VERSION"),
        "models": {
            "text": "loaded ✓",
            "image": image_status,
        },
        "endpoints": {
            "text_prediction": "/predict_text",
            "image_prediction": "/predict_image",
            "combined_prediction": "/predict_combined",
            "quick_screening": "/analyze",
            "streaming": "/ws",
            "health_check": "/health",
        },
        "features": [
            "Hybrid symptom extraction (Model + Rules)",
            "Disease prediction with confidence scores",
            "Severity assessment",
            "Care recommendations",
            "Image-based diagnosis",
            "Combined text + image analysis",
        ],
    }))
}

async fn health_handler(State(state): State<SharedState>) -> Json<Value> {
    let text = state.pipeline.text_model().info();
    let image = state.pipeline.image_model().map(|m| m.info());

    Json(json!({
        "status": "healthy",
        "models": {
            "text_model": {
                "loaded": true,
                "path": text.path,
                "type": text.kind,
            },
            "image_model": {
                "loaded": image.is_some(),
                "path": image.as_ref().map(|i| &i.path),
                "input_shape": image.as_ref().and_then(|i| i.input_shape.clone()),
                "classes": image.as_ref().map(|i| i.classes).unwrap_or(0),
            },
        },
        "knowledge_base": {
            "primary_symptoms": knowledge::SYMPTOM_TO_DISEASE.len(),
            "fallback_rules": knowledge::FALLBACK_RULES.len(),
            "severity_levels": knowledge::SEVERITY_RULES.len(),
            "total_disease_mappings": knowledge::total_disease_mappings(),
        },
    }))
}

/// Triagem por texto via HTTP POST
async fn predict_text_handler(
    State(state): State<SharedState>,
    payload: Result<Json<TextInput>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(input) = payload.map_err(|e| ApiError::Unprocessable(e.body_text()))?;
    let report = run_blocking(&state, move |p| p.analyze_text(&input.text)).await?;
    Ok(Json(report).into_response())
}

/// Triagem de uma foto enviada no campo multipart `file`
async fn predict_image_handler(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_form(multipart).await?;
    let bytes = form
        .file
        .ok_or_else(|| ApiError::Unprocessable("Field required: file".to_string()))?;

    let report = run_blocking(&state, move |p| p.analyze_image(&bytes)).await?;
    Ok(Json(report).into_response())
}

/// Triagem combinada: texto na query (ou no formulário) e imagem opcional
async fn predict_combined_handler(
    State(state): State<SharedState>,
    Query(query): Query<CombinedQuery>,
    multipart: Option<Multipart>,
) -> Result<Response, ApiError> {
    let form = match multipart {
        Some(m) => read_form(m).await?,
        None => UploadForm::default(),
    };
    let text = query.text.or(form.text);
    let image = form.file;

    let report = run_blocking(&state, move |p| {
        p.analyze_combined(text.as_deref(), image.as_deref())
    })
    .await?;
    Ok(Json(report).into_response())
}

async fn symptoms_handler() -> Json<Value> {
    let symptoms = knowledge::known_symptoms();
    Json(json!({ "count": symptoms.len(), "symptoms": symptoms }))
}

async fn diseases_handler() -> Json<Value> {
    let diseases = knowledge::known_diseases();
    Json(json!({ "count": diseases.len(), "diseases": diseases }))
}

async fn severity_levels_handler() -> Json<Value> {
    let levels: Vec<Severity> = knowledge::SEVERITY_RULES.iter().map(|(s, _)| *s).collect();
    let descriptions: serde_json::Map<String, Value> = levels
        .iter()
        .map(|s| (s.name().to_string(), json!(s.description())))
        .collect();
    let keywords_per_level: serde_json::Map<String, Value> = knowledge::SEVERITY_RULES
        .iter()
        .map(|(s, keywords)| (s.name().to_string(), json!(keywords.len())))
        .collect();

    Json(json!({
        "levels": levels,
        "descriptions": descriptions,
        "keywords_per_level": keywords_per_level,
    }))
}

/// Triagem rápida por padrões: `{"type": "text", "input": "..."}`
async fn analyze_handler(
    State(state): State<SharedState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let result = payload.map_err(|e| e.body_text()).and_then(|Json(req)| {
        if req.kind.is_empty() || req.input.is_empty() {
            return Err("Type and input are required".to_string());
        }
        let kind: InputKind = req.kind.parse().map_err(|e: TriageError| e.to_string())?;
        state
            .screener
            .screen_input(kind, &req.input)
            .map_err(|e| e.to_string())
    });

    match result {
        Ok(analysis) => {
            info!(
                severity = ?analysis.severity,
                urgency = analysis.urgency,
                symptoms = analysis.symptoms.len(),
                "triagem rápida concluída"
            );
            Json(json!({ "analysis": analysis })).into_response()
        }
        Err(message) => {
            warn!(error = %message, "triagem rápida rejeitada");
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
    }
}

/// Upgrade HTTP → WebSocket
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Aceita `{"text": "..."}` ou o texto puro.
fn parse_ws_request(raw: &str) -> String {
    serde_json::from_str::<WsRequest>(raw)
        .map(|req| req.text)
        .unwrap_or_else(|_| raw.to_string())
        .trim()
        .to_string()
}

/// Recebe textos e devolve os eventos da triagem, um por mensagem
async fn handle_websocket(mut socket: WebSocket, state: SharedState) {
    info!("WebSocket conectado");

    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            Message::Text(raw) => {
                let text = parse_ws_request(&raw);
                if text.is_empty() {
                    continue;
                }
                info!(chars = text.len(), "analisando via WebSocket");

                let (tx, rx) = std::sync::mpsc::channel::<PipelineEvent>();
                let worker = Arc::clone(&state);
                let handle = tokio::task::spawn_blocking(move || {
                    worker.pipeline.analyze_text_streaming(&text, tx);
                });
                if let Err(e) = handle.await {
                    warn!(error = %e, "tarefa de análise falhou");
                    continue;
                }

                // `rx` não é Send: os eventos são coletados antes do próximo await
                let events: Vec<PipelineEvent> = rx.try_iter().collect();
                for event in &events {
                    let Ok(json) = serde_json::to_string(event) else {
                        continue;
                    };
                    if socket.send(Message::Text(json)).await.is_err() {
                        return;
                    }
                }
            }
            Message::Close(_) => {
                info!("WebSocket desconectado");
                return;
            }
            Message::Ping(payload) => {
                let _ = socket.send(Message::Pong(payload)).await;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use image::DynamicImage;
    use std::path::PathBuf;
    use tower::ServiceExt;
    use triage_core::{
        error::ModelResult, ImageClassifier, ImagePrediction, ModelInfo, PipelineSettings,
        RuleEngine, Tag, TaggedToken, Token, TokenClassifier,
    };

    /// Marca como B-SYMPTOM as palavras da lista.
    struct KeywordNer(&'static [&'static str]);

    impl TokenClassifier for KeywordNer {
        fn classify(&self, text: &str) -> ModelResult<Vec<TaggedToken>> {
            Ok(text
                .split_whitespace()
                .enumerate()
                .map(|(i, word)| {
                    let word = word.to_lowercase();
                    let tag = if self.0.contains(&word.as_str()) {
                        Tag::Begin("SYMPTOM".into())
                    } else {
                        Tag::Outside
                    };
                    TaggedToken {
                        token: Token::new(word, 0, 0, i),
                        tag,
                        confidence: 0.9,
                    }
                })
                .collect())
        }

        fn info(&self) -> ModelInfo {
            ModelInfo {
                kind: "Token Classification (NER)".into(),
                path: PathBuf::from("ml/text_model"),
                input_shape: None,
                classes: 3,
            }
        }
    }

    struct FixedSkin;

    impl ImageClassifier for FixedSkin {
        fn classify(&self, _image: &DynamicImage, _top_k: usize) -> ModelResult<Vec<ImagePrediction>> {
            Ok(vec![
                ImagePrediction::new("Eczema", 0.6),
                ImagePrediction::new("Acne", 0.3),
            ])
        }

        fn info(&self) -> ModelInfo {
            ModelInfo {
                kind: "Image Classification (EfficientNet)".into(),
                path: PathBuf::from("ml/image_model/model.onnx"),
                input_shape: Some("256x256x3".into()),
                classes: 2,
            }
        }
    }

    fn app(with_image: bool) -> Router {
        let image: Option<Arc<dyn ImageClassifier>> = if with_image {
            Some(Arc::new(FixedSkin))
        } else {
            None
        };
        let pipeline = TriagePipeline::new(
            Arc::new(KeywordNer(&["headache", "cough"])),
            image,
            RuleEngine::new(),
            PipelineSettings::default(),
        );
        router(Arc::new(AppState {
            pipeline,
            screener: Screener::new(),
        }))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_multipart(uri: &str, parts: &[(&str, &[u8])]) -> Request<Body> {
        let boundary = "triageboundary";
        let mut body = Vec::new();
        for (name, data) in parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            if *name == "file" {
                body.extend_from_slice(
                    b"Content-Disposition: form-data; name=\"file\"; filename=\"skin.png\"\r\n\
                      Content-Type: image/png\r\n\r\n",
                );
            } else {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn png() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(4, 4, image::Rgb([120, 60, 60])));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn test_root_reports_model_status() {
        let (status, body) = send(app(false), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["models"]["text"], "loaded ✓");
        assert_eq!(body["models"]["image"], "not loaded ✗");
    }

    #[tokio::test]
    async fn test_health_knowledge_stats() {
        let (_, body) = send(app(true), get("/health")).await;
        assert_eq!(body["knowledge_base"]["primary_symptoms"], 33);
        assert_eq!(body["knowledge_base"]["fallback_rules"], 5);
        assert_eq!(body["knowledge_base"]["severity_levels"], 4);
        assert_eq!(body["models"]["image_model"]["input_shape"], "256x256x3");
        assert_eq!(body["models"]["image_model"]["classes"], 2);
    }

    #[tokio::test]
    async fn test_predict_text() {
        let (status, body) = send(
            app(false),
            post_json("/predict_text", json!({"text": "headache and high fever"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symptoms"], json!(["headache", "fever"]));
        assert_eq!(body["severity"], "urgent");
        assert_eq!(body["extraction_stats"]["rule_enhanced"], 1);
        assert_eq!(body["symptoms_with_confidence"][1]["source"], "rule");
    }

    #[tokio::test]
    async fn test_predict_text_empty() {
        let (status, body) = send(app(false), post_json("/predict_text", json!({"text": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Empty text");
    }

    #[tokio::test]
    async fn test_predict_text_malformed_body_is_json() {
        let (status, body) = send(app(false), post_json("/predict_text", json!({"txt": 1}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("text"));

        let request = Request::builder()
            .method("POST")
            .uri("/predict_text")
            .body(Body::from(r#"{"text": "fever"}"#))
            .unwrap();
        let (status, body) = send(app(false), request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_predict_image_without_model() {
        let bytes = png();
        let (status, body) = send(app(false), post_multipart("/predict_image", &[("file", bytes.as_slice())])).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["detail"], "Image model not available");
    }

    #[tokio::test]
    async fn test_predict_image() {
        let bytes = png();
        let (status, body) = send(app(true), post_multipart("/predict_image", &[("file", bytes.as_slice())])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["diseases"][0]["name"], "Eczema");
        assert_eq!(body["diseases"][0]["confidence_percentage"], "60.0%");
        assert_eq!(body["severity"], "moderate");
        assert_eq!(body["analysis_type"], "image_based");
    }

    #[tokio::test]
    async fn test_predict_image_invalid_bytes() {
        let (status, body) = send(
            app(true),
            post_multipart("/predict_image", &[("file", &b"not an image"[..])]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().starts_with("Cannot process image"));
    }

    #[tokio::test]
    async fn test_predict_combined_query_text_only() {
        let request = Request::builder()
            .method("POST")
            .uri("/predict_combined?text=cough")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(false), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symptoms"], json!(["cough"]));
        assert_eq!(body["analysis_sources"]["text_analysis"], true);
        assert_eq!(body["analysis_sources"]["image_analysis"], false);
    }

    #[tokio::test]
    async fn test_predict_combined_form_text_and_image() {
        let bytes = png();
        let (status, body) = send(
            app(true),
            post_multipart("/predict_combined", &[("text", &b"itchy rash"[..]), ("file", bytes.as_slice())]),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["analysis_sources"]["image_analysis"], true);
        // 2 × 0.6 da imagem supera o 1 de cada doença vinda do texto
        assert_eq!(body["diseases"][0]["name"], "Eczema");
    }

    #[tokio::test]
    async fn test_predict_combined_empty_upload_uses_defaults() {
        let (status, body) = send(app(true), post_multipart("/predict_combined", &[("file", &b""[..])])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["severity"], "moderate");
        assert_eq!(body["analysis_sources"]["image_analysis"], false);
        assert_eq!(body["diseases"], json!([]));
    }

    #[tokio::test]
    async fn test_predict_combined_without_input() {
        let request = Request::builder()
            .method("POST")
            .uri("/predict_combined")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(true), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Provide either text or image or both");
    }

    #[tokio::test]
    async fn test_listings() {
        let (_, body) = send(app(false), get("/symptoms")).await;
        assert_eq!(body["count"], 38);
        assert_eq!(body["symptoms"][0], "back pain");

        let (_, body) = send(app(false), get("/diseases")).await;
        assert_eq!(
            body["count"].as_u64().unwrap() as usize,
            knowledge::known_diseases().len()
        );

        let (_, body) = send(app(false), get("/severity_levels")).await;
        assert_eq!(body["levels"], json!(["emergency", "urgent", "moderate", "mild"]));
        assert_eq!(body["keywords_per_level"]["urgent"], 10);
    }

    #[tokio::test]
    async fn test_quick_screening() {
        let (status, body) = send(
            app(false),
            post_json("/analyze", json!({"type": "text", "input": "severe bleeding after a fall"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["analysis"]["urgency"], true);
        assert_eq!(body["analysis"]["severity"], "high");
    }

    #[tokio::test]
    async fn test_quick_screening_errors() {
        let (status, body) = send(app(false), post_json("/analyze", json!({"type": "text"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Type and input are required");

        let (status, body) = send(
            app(false),
            post_json("/analyze", json!({"type": "video", "input": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid input type: video");
    }

    #[test]
    fn test_ws_request_parsing() {
        assert_eq!(parse_ws_request(r#"{"text": " fever "}"#), "fever");
        assert_eq!(parse_ws_request("  plain text "), "plain text");
    }
}
