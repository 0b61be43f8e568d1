// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the append upload service.
//!
//! Responses are plain text and match the legacy endpoint byte for byte;
//! only the status codes are more specific.

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{StartupError, SubmissionError};
use crate::limiter::RateLimiter;
use crate::metrics::UploadMetrics;
use crate::pipeline::{Stage, Submission, UploadPipeline};
use crate::store::AppendStore;
use crate::validator::UploadValidator;
use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, FailedToBufferBody},
        DefaultBodyLimit, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shared application state.
pub struct AppState {
    pub pipeline: UploadPipeline,
    pub metrics: Option<UploadMetrics>,
    pub config: Config,
}

impl AppState {
    /// Validate `config` and assemble the pipeline it describes.
    pub async fn from_config(config: Config, clock: Arc<dyn Clock>) -> Result<Self, StartupError> {
        config.validate()?;

        let validator = UploadValidator::new(config.validation.clone())?;
        let limiter = RateLimiter::with_file_state(config.rate_limit.clone());
        let store = AppendStore::open(&config.storage.root).await?;
        let metrics = if config.metrics.enabled {
            Some(UploadMetrics::new()?)
        } else {
            None
        };

        Ok(Self {
            pipeline: UploadPipeline::new(validator, limiter, store, clock),
            metrics,
            config,
        })
    }
}

/// Form-encoded upload body. Missing fields are empty.
///
/// `data` is kept as raw bytes; `key` and `fname` are decoded lossily, which
/// can only make them fail validation.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UploadForm {
    pub key: String,
    pub data: Vec<u8>,
    pub fname: String,
}

impl UploadForm {
    /// Parse an `application/x-www-form-urlencoded` body.
    ///
    /// Unknown fields are ignored and the last occurrence of a field wins.
    pub fn parse(body: &[u8]) -> Self {
        let mut form = Self::default();
        for pair in body.split(|b| *b == b'&').filter(|p| !p.is_empty()) {
            let (name, value) = match pair.iter().position(|b| *b == b'=') {
                Some(i) => (&pair[..i], &pair[i + 1..]),
                None => (pair, &[][..]),
            };
            match form_decode(name).as_slice() {
                b"key" => form.key = String::from_utf8_lossy(&form_decode(value)).into_owned(),
                b"data" => form.data = form_decode(value),
                b"fname" => form.fname = String::from_utf8_lossy(&form_decode(value)).into_owned(),
                _ => {}
            }
        }
        form
    }
}

/// Decode one form component: `+` is a space, `%XX` is a raw byte.
fn form_decode(raw: &[u8]) -> Vec<u8> {
    let spaced: Vec<u8> = raw
        .iter()
        .map(|b| if *b == b'+' { b' ' } else { *b })
        .collect();
    urlencoding::decode_binary(&spaced).into_owned()
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.validation.body_limit();
    let mut app = Router::new()
        .route("/", post(upload))
        .route("/upload", post(upload))
        .route("/health", get(health))
        .route("/healthz", get(health));

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.layer(DefaultBodyLimit::max(body_limit)).with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "append-upload-service",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Accept an upload submission.
///
/// The body is read without a `Content-Type` requirement. A body over the
/// framing cap is answered as too big before the key can be read.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_))) => {
            let limit = state.config.validation.body_limit();
            info!(limit, code = "payload_too_large", "Upload body over framing cap");
            if let Some(metrics) = &state.metrics {
                metrics.rejected("payload_too_large");
            }
            return SubmissionError::PayloadTooLarge {
                size: limit,
                max: state.config.validation.max_data_bytes,
            }
            .into_response();
        }
        Err(rejection) => return rejection.into_response(),
    };

    let form = UploadForm::parse(&body);
    let submission = Submission::new(form.key, form.data, form.fname);
    debug!(?submission, "Processing upload");

    match state.pipeline.submit(&submission).await {
        Ok(receipt) => {
            info!(
                fname = %receipt.fname,
                bytes = receipt.bytes,
                accepted_at = receipt.accepted_at,
                stage = %Stage::Responded,
                "Upload accepted"
            );
            if let Some(metrics) = &state.metrics {
                metrics.accepted(receipt.bytes);
            }
            (StatusCode::OK, "OK.").into_response()
        }
        Err(rejection) => {
            if rejection.error.is_client_error() {
                info!(
                    fname = ?submission.fname,
                    code = rejection.error.code(),
                    stage = %rejection.stage,
                    "Upload rejected"
                );
            } else {
                error!(
                    fname = ?submission.fname,
                    code = rejection.error.code(),
                    stage = %rejection.stage,
                    error = ?rejection.error,
                    "Upload failed"
                );
            }
            if let Some(metrics) = &state.metrics {
                metrics.rejected(rejection.error.code());
            }
            rejection.error.into_response()
        }
    }
}

/// Prometheus metrics endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let Some(metrics) = &state.metrics else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match metrics.render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

impl IntoResponse for SubmissionError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.to_string();
        match self {
            SubmissionError::RateLimited { retry_after } => (
                status,
                [(header::RETRY_AFTER, retry_after.as_secs().to_string())],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}
