//! # API REST
//!
//! REST API implementation for the EHR backend.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI documentation, served as JSON at `/api-docs/openapi.json`
//! - REST-specific concerns (JSON and multipart bodies, base64 payloads, CORS)
//!
//! Uses `api-shared` for wire types and `ehr-core` for all business logic. The caller builds an
//! [`AppState`] from its resolved configuration and mounts [`router`].

#![warn(rust_2018_idioms)]

use api_shared::{
    ClinicalRecord, EnhanceImageRes, GenerateNoteReq, GenerateNoteRes, HealthRes, HealthService,
    Icd10Code, MessageRes, NoteSourceKind,
};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ehr_core::{EhrError, NoteOutcome, NoteService, NoteSource, PatientContext, RecordStore};
use ehr_imaging::ImageEnhancer;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};

/// Largest accepted upload for `/enhance-image`.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application state for the REST API server
///
/// Holds the services shared by all request handlers. Everything here is immutable after
/// startup, so cloning the state only bumps reference counts.
#[derive(Clone)]
pub struct AppState {
    pub notes: Arc<NoteService>,
    pub records: Arc<RecordStore>,
    pub enhancer: Arc<ImageEnhancer>,
}

impl AppState {
    pub fn new(notes: NoteService, records: RecordStore) -> Self {
        Self {
            notes: Arc::new(notes),
            records: Arc::new(records),
            enhancer: Arc::new(ImageEnhancer::default()),
        }
    }
}

/// Multipart form accepted by `/enhance-image`.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct EnhanceImageForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, enhance_image, generate_note, list_records),
    components(schemas(
        HealthRes,
        EnhanceImageForm,
        EnhanceImageRes,
        GenerateNoteReq,
        GenerateNoteRes,
        Icd10Code,
        NoteSourceKind,
        ClinicalRecord,
        MessageRes,
    ))
)]
pub struct ApiDoc;

/// Build the full REST router for `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/enhance-image",
            post(enhance_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/generate-note", post(generate_note))
        .route("/records", get(list_records))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used by monitoring and load balancer health checks.
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/enhance-image",
    request_body(content = EnhanceImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Enhanced image as base64 PNG", body = EnhanceImageRes),
        (status = 400, description = "Missing or unreadable `file` field", body = MessageRes)
    )
)]
/// Enhance an uploaded scan
///
/// Reads the multipart field `file`, runs contrast and sharpness enhancement and returns the
/// result base64-encoded. Enhancement is best-effort: an image that cannot be decoded is
/// returned unchanged.
///
/// # Errors
/// Returns `400 Bad Request` if:
/// - the multipart body cannot be read, or
/// - no `file` field is present.
async fn enhance_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<EnhanceImageRes>, (StatusCode, Json<MessageRes>)> {
    let mut upload = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Multipart read error: {:?}", e);
                return Err(message(StatusCode::BAD_REQUEST, "Invalid multipart body"));
            }
        };

        if field.name() == Some("file") {
            match field.bytes().await {
                Ok(bytes) => {
                    upload = Some(bytes);
                    break;
                }
                Err(e) => {
                    tracing::error!("Upload read error: {:?}", e);
                    return Err(message(StatusCode::BAD_REQUEST, "Invalid file upload"));
                }
            }
        }
    }

    let Some(bytes) = upload else {
        return Err(message(StatusCode::BAD_REQUEST, "Missing file field"));
    };

    // CLAHE over a large scan is CPU-bound; keep it off the async workers.
    let enhancer = state.enhancer.clone();
    let enhanced = match tokio::task::spawn_blocking(move || enhancer.enhance(&bytes)).await {
        Ok(png) => png,
        Err(e) => {
            tracing::error!("Enhancement task error: {:?}", e);
            return Err(message(StatusCode::INTERNAL_SERVER_ERROR, "Internal error"));
        }
    };

    Ok(Json(EnhanceImageRes {
        enhanced_image_base64: STANDARD.encode(enhanced),
    }))
}

#[utoipa::path(
    post,
    path = "/generate-note",
    request_body = GenerateNoteReq,
    responses(
        (status = 200, description = "Clinical note with one ICD-10 code", body = GenerateNoteRes)
    )
)]
/// Generate a clinical note
///
/// Always answers with a note. When the text generator is unavailable or its reply is unusable
/// the note is the deterministic fallback, `source` is `fallback` and `fallback_reason` says why.
async fn generate_note(
    State(state): State<AppState>,
    Json(req): Json<GenerateNoteReq>,
) -> Json<GenerateNoteRes> {
    let ctx = patient_context(&req);
    let outcome = state.notes.generate_note(&ctx).await;

    if let Some(reason) = outcome.fallback_reason() {
        tracing::warn!("Serving fallback note for {}: {}", req.patient_id, reason);
    }

    Json(note_response(req.patient_id, outcome))
}

#[utoipa::path(
    get,
    path = "/records",
    responses(
        (status = 200, description = "Stored clinical records", body = [ClinicalRecord]),
        (status = 404, description = "Records file not found", body = MessageRes),
        (status = 500, description = "Records file could not be read", body = MessageRes)
    )
)]
/// List stored clinical records
///
/// Records are returned exactly as stored, including keys the service does not model.
///
/// # Errors
/// Returns `404 Not Found` if the records file does not exist, and `500 Internal Server Error`
/// if it cannot be read or parsed.
async fn list_records(
    State(state): State<AppState>,
) -> Result<Json<Vec<serde_json::Value>>, (StatusCode, Json<MessageRes>)> {
    match state.records.list_raw() {
        Ok(records) => Ok(Json(records)),
        Err(EhrError::RecordsNotFound(path)) => {
            tracing::warn!("Records file not found: {}", path.display());
            Err(message(StatusCode::NOT_FOUND, "Records file not found"))
        }
        Err(e) => {
            tracing::error!("List records error: {:?}", e);
            Err(message(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

fn message(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<MessageRes>) {
    (
        status,
        Json(MessageRes {
            message: message.into(),
        }),
    )
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Map the request body onto the note context.
///
/// The history, when present, is appended to the chief complaint.
pub fn patient_context(req: &GenerateNoteReq) -> PatientContext {
    let history = req.history.trim();
    let symptoms = if history.is_empty() {
        req.chief_complaint.clone()
    } else {
        format!("{} {}", req.chief_complaint, history)
    };

    PatientContext::new()
        .with_name(&req.patient_id)
        .with_age(req.age)
        .with_gender(&req.gender)
        .with_symptoms(symptoms)
        .with_findings(&req.observations)
        .with_provisional_diagnosis(&req.prelim_diagnosis)
}

fn note_response(patient_id: String, outcome: NoteOutcome) -> GenerateNoteRes {
    let icd10 = outcome
        .result
        .codes()
        .iter()
        .map(|c| Icd10Code {
            code: c.code.clone(),
            description: c.description.clone(),
        })
        .collect();

    let (source, fallback_reason) = match &outcome.source {
        NoteSource::Generated => (NoteSourceKind::Generated, None),
        NoteSource::Repaired => (NoteSourceKind::Repaired, None),
        NoteSource::Fallback(reason) => (NoteSourceKind::Fallback, Some(reason.code().to_string())),
    };

    GenerateNoteRes {
        patient_id,
        note: outcome.result.note().to_string(),
        icd10,
        source,
        fallback_reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use base64::Engine as _;
    use ehr_core::constants::DEMO_MODE_MARKER;
    use ehr_core::LlmConfig;
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "ehr-test-boundary";

    fn state_in(dir: &TempDir) -> AppState {
        AppState::new(
            NoteService::new(None, &LlmConfig::default()),
            RecordStore::new(dir.path().join("FINAL_CLINICAL_NOTES.json")),
        )
    }

    fn multipart_body(field: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"scan.png\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload(field: &str, bytes: &[u8]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/enhance-image")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(field, bytes)))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn note_req(history: &str) -> GenerateNoteReq {
        GenerateNoteReq {
            patient_id: "P-1024".into(),
            age: 41,
            gender: "Female".into(),
            chief_complaint: "Throbbing headache".into(),
            history: history.into(),
            observations: "No focal deficit".into(),
            prelim_diagnosis: "Migraine".into(),
        }
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = TempDir::new().unwrap();
        let response = router(state_in(&dir))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn generate_note_without_credentials_returns_fallback() {
        let dir = TempDir::new().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/generate-note")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::to_vec(&note_req("three days, worse in the morning")).unwrap(),
            ))
            .unwrap();

        let response = router(state_in(&dir)).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: GenerateNoteRes = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(body.patient_id, "P-1024");
        assert_eq!(body.source, NoteSourceKind::Fallback);
        assert_eq!(body.fallback_reason.as_deref(), Some("credential_missing"));
        assert!(body.note.starts_with(DEMO_MODE_MARKER));
        assert!(body
            .note
            .contains("presented with Throbbing headache three days, worse in the morning."));
        assert_eq!(
            body.icd10,
            vec![Icd10Code {
                code: "R51.9".into(),
                description: "Headache, unspecified (Fallback Code)".into(),
            }]
        );
    }

    #[test]
    fn empty_history_leaves_chief_complaint_alone() {
        let ctx = patient_context(&note_req("  "));

        assert_eq!(
            ctx.symptoms.as_ref().map(|s| s.as_str()),
            Some("Throbbing headache")
        );
        assert_eq!(ctx.name.as_ref().map(|s| s.as_str()), Some("P-1024"));
        assert_eq!(
            ctx.findings.as_ref().map(|s| s.as_str()),
            Some("No focal deficit")
        );
        assert_eq!(ctx.age, Some(41));
    }

    #[tokio::test]
    async fn records_missing_file_is_404() {
        let dir = TempDir::new().unwrap();
        let response = router(state_in(&dir))
            .oneshot(Request::builder().uri("/records").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"message": "Records file not found"})
        );
    }

    #[tokio::test]
    async fn records_lists_seeded_file() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);
        state.records.seed().unwrap();

        let response = router(state)
            .oneshot(Request::builder().uri("/records").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let records: Vec<ClinicalRecord> =
            serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].patient_name, "Vikram Malhotra");
    }

    #[tokio::test]
    async fn records_are_returned_as_stored() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);
        std::fs::write(
            state.records.path(),
            r#"[{"patient_id": 12, "age": null, "mri_image": "scans/12.png"}]"#,
        )
        .unwrap();

        let response = router(state)
            .oneshot(Request::builder().uri("/records").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            serde_json::json!([{"patient_id": 12, "age": null, "mri_image": "scans/12.png"}])
        );
    }

    #[tokio::test]
    async fn records_unreadable_file_is_500() {
        let dir = TempDir::new().unwrap();
        let state = state_in(&dir);
        std::fs::write(state.records.path(), "not json").unwrap();

        let response = router(state)
            .oneshot(Request::builder().uri("/records").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json_body(response).await["message"].is_string());
    }

    #[tokio::test]
    async fn enhance_image_returns_png() {
        let dir = TempDir::new().unwrap();
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(16, 12, |x, y| {
            image::Rgb([(x * 10) as u8, (y * 10) as u8, 128])
        }))
        .write_to(
            &mut std::io::Cursor::new(&mut png),
            image::ImageOutputFormat::Png,
        )
        .unwrap();

        let response = router(state_in(&dir))
            .oneshot(upload("file", &png))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: EnhanceImageRes = serde_json::from_value(json_body(response).await).unwrap();
        let decoded = STANDARD.decode(body.enhanced_image_base64).unwrap();
        let enhanced = image::load_from_memory(&decoded).unwrap();
        assert_eq!((enhanced.width(), enhanced.height()), (16, 12));
    }

    #[tokio::test]
    async fn enhance_image_echoes_undecodable_upload() {
        let dir = TempDir::new().unwrap();
        let garbage = b"definitely not an image";

        let response = router(state_in(&dir))
            .oneshot(upload("file", garbage))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: EnhanceImageRes = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(STANDARD.decode(body.enhanced_image_base64).unwrap(), garbage);
    }

    #[tokio::test]
    async fn enhance_image_without_file_field_is_400() {
        let dir = TempDir::new().unwrap();

        let response = router(state_in(&dir))
            .oneshot(upload("attachment", b"bytes"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["message"], "Missing file field");
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let dir = TempDir::new().unwrap();
        let response = router(state_in(&dir))
            .oneshot(
                Request::builder()
                    .uri("/api-docs/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let doc = json_body(response).await;
        for path in ["/health", "/enhance-image", "/generate-note", "/records"] {
            assert!(doc["paths"].get(path).is_some(), "missing {path}");
        }
    }
}
