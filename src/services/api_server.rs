// src/services/api_server.rs
//! HTTP API for certificate issuance and verification.
//!
//! Built on Axum. Endpoints:
//! - `GET  /`                              health check
//! - `POST /api/certificate/upload`        register a certificate (multipart)
//! - `POST /api/certificate/verify/id`     verify by certificate ID
//! - `POST /api/certificate/verify/hash`   verify by content hash
//! - `POST /api/certificate/verify/file`   verify by re-uploading the document
//! - `POST /api/zkp/generate`              proof artifact for a stored certificate
//! - `GET  /api/certificates/list`         every stored certificate
//! - `GET  /api/certificates/:id`          one certificate
//! - `GET  /api/blockchain/info`           storage backend status
//! - `GET  /api/stats`                     dashboard figures
//!
//! Verification misses answer `200 {verified: false}`; malformed requests get
//! `400 {error}`. Ledger failures map to 502/504.

use crate::config::UploadConfig;
use crate::error::CertError;
use crate::models::certificate::IssueDate;
use crate::models::proof::{ProofArtifact, PublicInputs};
use crate::services::issuer::{CertificateIssuer, IssueRequest};
use crate::services::verifier::{VerificationQuery, VerificationResult, Verifier};
use crate::storage::CertificateStore;
use crate::utils::id::IdGenerator;
use crate::utils::serialization::{format_duration, to_base64, to_prefixed_hex};
use crate::zkp::proof_generation::ProofGenerator;
use axum::{
    extract::{DefaultBodyLimit, Json, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;

/// Room for the non-file form fields on top of the document size limit.
const FORM_OVERHEAD: usize = 64 * 1024;

// =====================
// Errors
// =====================

/// Error type returned by every handler.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Cert(#[from] CertError),

    /// The multipart body itself could not be read.
    #[error("{1}")]
    Multipart(StatusCode, String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Cert(err) => match err {
                CertError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                CertError::DuplicateId(_) => StatusCode::CONFLICT,
                CertError::NotFound(_) | CertError::TamperedContent => StatusCode::NOT_FOUND,
                CertError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                CertError::Upstream(_) => StatusCode::BAD_GATEWAY,
                CertError::Config(_) | CertError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Multipart(status, _) => *status,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed with {}: {}", status, self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::Multipart(err.status(), err.body_text())
    }
}

type ApiResult<T> = Result<T, AppError>;

// =====================
// Request / response bodies
// =====================

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct CertificateIdRequest {
    certificate_id: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct CertificateHashRequest {
    certificate_hash: String,
}

/// Proof artifact as returned to clients.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ZkProofView {
    proof: String,
    proof_base64: String,
    proof_size: usize,
    generation_time: String,
    generation_time_micros: u64,
    public_inputs: PublicInputs,
    proof_system: &'static str,
}

impl From<ProofArtifact> for ZkProofView {
    fn from(artifact: ProofArtifact) -> Self {
        ZkProofView {
            proof: to_prefixed_hex(&artifact.proof),
            proof_base64: to_base64(&artifact.proof),
            proof_size: artifact.proof_size(),
            generation_time: format_duration(artifact.generation_time),
            generation_time_micros: artifact.generation_time.as_micros() as u64,
            public_inputs: artifact.public_inputs,
            proof_system: artifact.proof_system,
        }
    }
}

/// A multipart form split into its uploaded document and text fields.
#[derive(Default)]
struct UploadForm {
    file_name: Option<String>,
    content: Option<Bytes>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                form.file_name = Some(field.file_name().unwrap_or_default().to_string());
                form.content = Some(field.bytes().await?);
            } else {
                let value = field.text().await?;
                form.fields.insert(name, value);
            }
        }
        Ok(form)
    }

    /// The uploaded document, checked the way every upload endpoint requires.
    fn document(&self) -> Result<(&str, &Bytes), CertError> {
        let content = self
            .content
            .as_ref()
            .ok_or_else(|| CertError::invalid("No file provided"))?;
        let file_name = self.file_name.as_deref().map(str::trim).unwrap_or_default();
        if file_name.is_empty() {
            return Err(CertError::invalid("No file selected"));
        }
        Ok((file_name, content))
    }

    /// A trimmed, non-empty text field.
    fn field(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// Reduces a client-supplied file name to `[A-Za-z0-9._-]`, without leading dots.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned.to_string()
    }
}

// =====================
// Server
// =====================

/// Main API server structure holding the shared services.
#[derive(Clone)]
pub struct ApiServer {
    store: Arc<dyn CertificateStore>,
    issuer: Arc<CertificateIssuer>,
    verifier: Arc<Verifier>,
    proofs: ProofGenerator,
    upload: Arc<UploadConfig>,
}

impl ApiServer {
    /// Wires the services around the configured store.
    pub fn new(store: Arc<dyn CertificateStore>, upload: UploadConfig) -> Self {
        let ids = Arc::new(IdGenerator::new());
        ApiServer {
            issuer: Arc::new(CertificateIssuer::new(store.clone(), ids)),
            verifier: Arc::new(Verifier::new(store.clone())),
            proofs: ProofGenerator::new(),
            upload: Arc::new(upload),
            store,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(Self::index_handler))
            .route("/api/certificate/upload", post(Self::upload_handler))
            .route("/api/certificate/verify/id", post(Self::verify_id_handler))
            .route("/api/certificate/verify/hash", post(Self::verify_hash_handler))
            .route("/api/certificate/verify/file", post(Self::verify_file_handler))
            .route("/api/zkp/generate", post(Self::generate_proof_handler))
            .route("/api/certificates/list", get(Self::list_handler))
            .route("/api/certificates/:id", get(Self::get_certificate_handler))
            .route("/api/blockchain/info", get(Self::backend_info_handler))
            .route("/api/stats", get(Self::stats_handler))
            .layer(DefaultBodyLimit::max(self.upload.max_file_size + FORM_OVERHEAD))
            .layer(CorsLayer::permissive())
            .with_state(Arc::new(self.clone()))
    }

    /// Binds `addr` and serves until Ctrl-C.
    pub async fn run(&self, addr: SocketAddr) -> Result<(), CertError> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server listening on http://{}", listener.local_addr()?);
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        info!("API server stopped");
        Ok(())
    }

    // =====================
    // Handlers
    // =====================

    async fn index_handler(State(state): State<Arc<ApiServer>>) -> Json<Value> {
        let (backend, connected) = match state.store.backend_info().await {
            Ok(info) => (info.backend, info.connected),
            Err(err) => {
                warn!("backend status unavailable: {}", err);
                ("unknown", false)
            }
        };
        Json(json!({
            "status": "ok",
            "message": "Certificate Verifier API is running",
            "backend": backend,
            "ledgerConnected": connected,
        }))
    }

    /// Registers an uploaded certificate.
    ///
    /// # Form fields
    /// `file` (required), `holderName`, `certificateType`, `issueDate`
    /// (required), `certificateId`, `institution` (optional)
    async fn upload_handler(
        State(state): State<Arc<ApiServer>>,
        multipart: Multipart,
    ) -> ApiResult<Json<Value>> {
        let form = UploadForm::read(multipart).await?;
        let (file_name, content) = form.document()?;
        if !state.upload.is_allowed(file_name) {
            return Err(CertError::invalid("File type not allowed").into());
        }

        let (holder_name, certificate_type, issue_date) = match (
            form.field("holderName"),
            form.field("certificateType"),
            form.field("issueDate"),
        ) {
            (Some(holder), Some(kind), Some(date)) => (holder, kind, date),
            _ => return Err(CertError::invalid("Missing required fields").into()),
        };
        let issue_date = IssueDate::parse(&issue_date)
            .map_err(|_| CertError::invalid("Invalid date format"))?;

        let issued = state
            .issuer
            .issue(IssueRequest {
                certificate_id: form.field("certificateId"),
                holder_name,
                certificate_type,
                institution: form.field("institution"),
                issue_date,
                content: content.to_vec(),
            })
            .await?;

        state.keep_document(&issued.record.certificate_id, file_name, content).await;

        Ok(Json(json!({
            "success": true,
            "message": "Certificate stored successfully",
            "certificateId": issued.record.certificate_id,
            "certificateHash": issued.record.content_hash.to_prefixed(),
            "transactionHash": issued.receipt.transaction_hash,
            "blockNumber": issued.receipt.block_number,
            "gasUsed": issued.receipt.gas_used,
        })))
    }

    async fn verify_id_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CertificateIdRequest>,
    ) -> ApiResult<Json<Value>> {
        let result = state
            .verifier
            .verify(VerificationQuery::ById(payload.certificate_id))
            .await?;
        verification_response(result, None, None)
    }

    async fn verify_hash_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CertificateHashRequest>,
    ) -> ApiResult<Json<Value>> {
        let result = state
            .verifier
            .verify(VerificationQuery::ByHash(payload.certificate_hash))
            .await?;
        verification_response(result, None, None)
    }

    async fn verify_file_handler(
        State(state): State<Arc<ApiServer>>,
        multipart: Multipart,
    ) -> ApiResult<Json<Value>> {
        let form = UploadForm::read(multipart).await?;
        let (_, content) = form.document()?;
        let hash = crate::utils::crypto::compute_hash(content);

        let result = state
            .verifier
            .verify(VerificationQuery::ByFile(content.to_vec()))
            .await?;
        verification_response(
            result,
            Some(hash.to_prefixed()),
            Some("Certificate is authentic and unmodified"),
        )
    }

    async fn generate_proof_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<CertificateIdRequest>,
    ) -> ApiResult<Json<Value>> {
        let record = state.verifier.lookup(&payload.certificate_id).await?;
        let proof = ZkProofView::from(state.proofs.generate(&record));
        Ok(Json(json!({
            "success": true,
            "message": "Zero-knowledge proof generated successfully",
            "zkProof": proof,
        })))
    }

    async fn list_handler(State(state): State<Arc<ApiServer>>) -> ApiResult<Json<Value>> {
        let certificates = state.store.list().await?;
        Ok(Json(json!({
            "count": certificates.len(),
            "certificates": certificates,
        })))
    }

    async fn get_certificate_handler(
        Path(certificate_id): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> ApiResult<Response> {
        let record = state.verifier.lookup(&certificate_id).await?;
        Ok(Json(record).into_response())
    }

    async fn backend_info_handler(State(state): State<Arc<ApiServer>>) -> ApiResult<Response> {
        let info = state.store.backend_info().await?;
        Ok(Json(info).into_response())
    }

    async fn stats_handler(State(state): State<Arc<ApiServer>>) -> ApiResult<Json<Value>> {
        let total_certificates = state.store.count().await?;
        let stats = state.verifier.stats();
        Ok(Json(json!({
            "totalCertificates": total_certificates,
            "totalVerifications": stats.total_verifications,
            "successfulVerifications": stats.successful_verifications,
            "failedVerifications": stats.failed_verifications,
            "invalidRequests": stats.invalid_requests,
            "successRate": stats.success_rate(),
        })))
    }

    /// Saves the uploaded document as `{certificateId}_{file name}` when an
    /// upload directory is configured. The certificate is already stored, so
    /// failures are only logged.
    async fn keep_document(&self, certificate_id: &str, file_name: &str, content: &Bytes) {
        let Some(dir) = self.upload.dir.as_ref() else {
            return;
        };
        let path: PathBuf = dir.join(format!(
            "{}_{}",
            sanitize_file_name(certificate_id),
            sanitize_file_name(file_name)
        ));
        let saved = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, content).await
        }
        .await;
        match saved {
            Ok(()) => info!("Saved uploaded document to {}", path.display()),
            Err(err) => warn!("could not save uploaded document {}: {}", path.display(), err),
        }
    }
}

/// Shapes a verification outcome into the response body.
fn verification_response(
    result: VerificationResult,
    certificate_hash: Option<String>,
    verified_message: Option<&str>,
) -> ApiResult<Json<Value>> {
    let message = match (&result, verified_message) {
        (VerificationResult::Verified(_), Some(message)) => message.to_string(),
        _ => result.message(),
    };
    let mut body = match result {
        VerificationResult::InvalidInput(reason) => {
            return Err(CertError::InvalidInput(reason).into());
        }
        VerificationResult::Verified(record) => json!({
            "verified": true,
            "message": message,
            "certificate": record,
        }),
        VerificationResult::NotVerified(_) => json!({
            "verified": false,
            "message": message,
        }),
    };
    if let Some(hash) = certificate_hash {
        body["certificateHash"] = Value::String(hash);
    }
    Ok(Json(body))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::certificate::{CertificateRecord, ContentHash};
    use crate::storage::memory::InMemoryStore;
    use crate::storage::{BackendInfo, InsertReceipt};
    use crate::utils::crypto::compute_hash;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    const BOUNDARY: &str = "cert-verifier-test-boundary";
    const DOCUMENT: &[u8] = b"%PDF-1.4 John Doe, Bachelor of Computer Science";

    fn app() -> (Router, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let server = ApiServer::new(store.clone(), UploadConfig::default());
        (server.router(), store)
    }

    fn sample(store: &InMemoryStore) -> CertificateRecord {
        let record = CertificateRecord::new(
            "CERT-2024-001",
            compute_hash(DOCUMENT),
            "John Doe",
            "Bachelor of Computer Science",
            Some("MIT".into()),
            IssueDate::from_unix(1_718_409_600),
        );
        store.insert(record.clone()).unwrap();
        record
    }

    fn json_request(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn multipart_request(uri: &str, fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, content)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    BOUNDARY, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_index() {
        let (app, _) = app();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["backend"], "memory");
    }

    #[tokio::test]
    async fn test_upload_then_verify_by_file() {
        let (app, store) = app();
        let fields = [
            ("certificateId", "CERT-2024-001"),
            ("holderName", "John Doe"),
            ("certificateType", "Bachelor of Computer Science"),
            ("institution", "MIT"),
            ("issueDate", "2024-06-15"),
        ];
        let (status, body) = send(
            app.clone(),
            multipart_request("/api/certificate/upload", &fields, Some(("diploma.pdf", DOCUMENT))),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["success"], true);
        assert_eq!(body["certificateId"], "CERT-2024-001");
        assert_eq!(body["certificateHash"], compute_hash(DOCUMENT).to_prefixed());
        assert_eq!(store.find_by_id("CERT-2024-001").unwrap().issue_date.as_unix(), 1_718_409_600);

        let (status, body) = send(
            app.clone(),
            multipart_request("/api/certificate/verify/file", &[], Some(("copy.pdf", DOCUMENT))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verified"], true);
        assert_eq!(body["message"], "Certificate is authentic and unmodified");
        assert_eq!(body["certificate"]["holderName"], "John Doe");

        let mut altered = DOCUMENT.to_vec();
        altered[0] ^= 0x20;
        let (status, body) = send(
            app,
            multipart_request("/api/certificate/verify/file", &[], Some(("copy.pdf", altered.as_slice()))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verified"], false);
        assert_eq!(body["message"], "Certificate not found or has been tampered with");
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let (app, store) = app();
        let complete = [
            ("holderName", "John Doe"),
            ("certificateType", "Bachelor"),
            ("issueDate", "2024-06-15"),
        ];

        let cases: Vec<(Request<Body>, &str)> = vec![
            (multipart_request("/api/certificate/upload", &complete, None), "No file provided"),
            (
                multipart_request("/api/certificate/upload", &complete, Some(("", DOCUMENT))),
                "No file selected",
            ),
            (
                multipart_request("/api/certificate/upload", &complete, Some(("run.exe", DOCUMENT))),
                "File type not allowed",
            ),
            (
                multipart_request("/api/certificate/upload", &complete[..2], Some(("a.pdf", DOCUMENT))),
                "Missing required fields",
            ),
            (
                multipart_request(
                    "/api/certificate/upload",
                    &[("holderName", "John Doe"), ("certificateType", "Bachelor"), ("issueDate", "15/06/2024")],
                    Some(("a.pdf", DOCUMENT)),
                ),
                "Invalid date format",
            ),
        ];

        for (request, expected) in cases {
            let (status, body) = send(app.clone(), request).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], expected);
        }
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_upload_conflicts() {
        let (app, store) = app();
        sample(&store);
        let fields = [
            ("certificateId", "CERT-2024-001"),
            ("holderName", "Mallory"),
            ("certificateType", "Bachelor"),
            ("issueDate", "2024-06-15"),
        ];
        let (status, body) = send(
            app,
            multipart_request("/api/certificate/upload", &fields, Some(("a.pdf", &b"other"[..]))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "Certificate with ID CERT-2024-001 already exists");
        assert_eq!(store.find_by_id("CERT-2024-001").unwrap().holder_name, "John Doe");
    }

    #[tokio::test]
    async fn test_upload_keeps_document_under_sanitized_name() {
        let dir = std::env::temp_dir().join(format!("cert-verifier-uploads-{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        let store = Arc::new(InMemoryStore::new());
        let upload = UploadConfig {
            dir: Some(dir.clone()),
            ..UploadConfig::default()
        };
        let app = ApiServer::new(store.clone(), upload).router();

        let fields = [
            ("certificateId", "CERT-2024-001"),
            ("holderName", "John Doe"),
            ("certificateType", "Bachelor of Computer Science"),
            ("issueDate", "2024-06-15"),
        ];
        let (status, body) = send(
            app.clone(),
            multipart_request("/api/certificate/upload", &fields, Some(("my diploma (final).pdf", DOCUMENT))),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let kept = dir.join("CERT-2024-001_my_diploma__final_.pdf");
        assert_eq!(std::fs::read(&kept).unwrap(), DOCUMENT);

        let (status, _) = send(
            app,
            multipart_request("/api/certificate/upload", &fields, Some(("second.pdf", &b"other"[..]))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(!dir.join("CERT-2024-001_second.pdf").exists());
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_verify_by_id_and_hash() {
        let (app, store) = app();
        let record = sample(&store);

        let (status, body) = send(
            app.clone(),
            json_request("/api/certificate/verify/id", json!({ "certificateId": "CERT-2024-001" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verified"], true);
        assert_eq!(body["certificate"]["institution"], "MIT");

        let (status, body) = send(
            app.clone(),
            json_request("/api/certificate/verify/id", json!({ "certificateId": "CERT-2024-002" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verified"], false);
        assert_eq!(body["message"], "Certificate not found");

        let upper = record.content_hash.as_str().to_uppercase();
        let (_, body) = send(
            app.clone(),
            json_request("/api/certificate/verify/hash", json!({ "certificateHash": upper })),
        )
        .await;
        assert_eq!(body["verified"], true);

        let (status, body) = send(app, json_request("/api/certificate/verify/id", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Certificate ID is required");
    }

    #[tokio::test]
    async fn test_generate_proof() {
        let (app, store) = app();
        sample(&store);

        let (status, body) = send(
            app.clone(),
            json_request("/api/zkp/generate", json!({ "certificateId": "CERT-2024-001" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let proof = &body["zkProof"];
        assert_eq!(proof["proofSize"], 96);
        assert_eq!(proof["proof"].as_str().unwrap().len(), 2 + 96 * 2);
        assert_eq!(proof["publicInputs"]["certificateId"], "CERT-2024-001");
        assert_eq!(proof["proofSystem"], "sha256-commitment");

        let (status, _) = send(
            app,
            json_request("/api/zkp/generate", json!({ "certificateId": "CERT-2024-404" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_get_and_stats() {
        let (app, store) = app();
        sample(&store);

        let request = Request::builder().uri("/api/certificates/list").body(Body::empty()).unwrap();
        let (_, body) = send(app.clone(), request).await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["certificates"][0]["certificateId"], "CERT-2024-001");

        let request = Request::builder().uri("/api/certificates/CERT-2024-001").body(Body::empty()).unwrap();
        let (status, body) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["holderName"], "John Doe");

        let request = Request::builder().uri("/api/certificates/missing").body(Body::empty()).unwrap();
        let (status, _) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        send(
            app.clone(),
            json_request("/api/certificate/verify/id", json!({ "certificateId": "CERT-2024-001" })),
        )
        .await;
        let request = Request::builder().uri("/api/stats").body(Body::empty()).unwrap();
        let (_, body) = send(app, request).await;
        assert_eq!(body["totalCertificates"], 1);
        assert_eq!(body["totalVerifications"], 1);
        assert_eq!(body["successfulVerifications"], 1);
    }

    struct StalledStore;

    #[async_trait]
    impl CertificateStore for StalledStore {
        async fn put(&self, _: CertificateRecord) -> Result<InsertReceipt, CertError> {
            Err(CertError::Upstream("execution reverted".into()))
        }
        async fn get_by_id(&self, _: &str) -> Result<Option<CertificateRecord>, CertError> {
            Err(CertError::UpstreamTimeout(Duration::from_secs(30)))
        }
        async fn get_by_hash(&self, _: &ContentHash) -> Result<Option<CertificateRecord>, CertError> {
            Err(CertError::UpstreamTimeout(Duration::from_secs(30)))
        }
        async fn list(&self) -> Result<Vec<CertificateRecord>, CertError> {
            Ok(Vec::new())
        }
        async fn count(&self) -> Result<usize, CertError> {
            Ok(0)
        }
        async fn backend_info(&self) -> Result<BackendInfo, CertError> {
            Err(CertError::Upstream("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_upstream_failures_map_to_gateway_errors() {
        let app = ApiServer::new(Arc::new(StalledStore), UploadConfig::default()).router();

        let (status, _) = send(
            app.clone(),
            json_request("/api/certificate/verify/id", json!({ "certificateId": "CERT-2024-001" })),
        )
        .await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);

        let fields = [("holderName", "A"), ("certificateType", "B"), ("issueDate", "2024-01-01")];
        let (status, _) = send(
            app.clone(),
            multipart_request("/api/certificate/upload", &fields, Some(("a.pdf", &b"doc"[..]))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ledgerConnected"], false);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("CERT-1_diploma.pdf"), "CERT-1_diploma.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("my diploma (final).pdf"), "my_diploma__final_.pdf");
        assert_eq!(sanitize_file_name("..."), "document");
    }
}
