//! REST API endpoints for the ingestion service
//!
//! All endpoints are under /api/v1/ and return JSON. Session faults are
//! returned as `{"error": <kind>, "reason": <text>}`.

use crate::{AppState, ServiceError};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use smartgrid_core::session::SessionSnapshot;
use smartgrid_core::{Sample, SessionError};

/// Fault body returned for rejected requests
#[derive(Serialize, Deserialize, Debug)]
pub struct FaultResponse {
    pub error: String,
    pub reason: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            ServiceError::Session(SessionError::InvalidArgument(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_argument")
            }
            ServiceError::Session(SessionError::ValidationFailed(_)) => {
                (StatusCode::BAD_REQUEST, "validation_failed")
            }
            ServiceError::Session(SessionError::InvalidState(_)) => {
                (StatusCode::CONFLICT, "invalid_state")
            }
            ServiceError::Session(SessionError::PersistenceFailed(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "persistence_failed")
            }
            ServiceError::Session(_) | ServiceError::SessionThreadDied => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        let reason = match &self {
            ServiceError::Session(e) => e.reason(),
            other => other.to_string(),
        };
        (
            status,
            Json(FaultResponse {
                error: kind.to_string(),
                reason,
            }),
        )
            .into_response()
    }
}

/// Thresholds as reported by the status endpoint
#[derive(Serialize, Deserialize, Debug)]
pub struct ThresholdsResponse {
    pub fft_threshold: f64,
    pub frequency_threshold: f64,
}

/// Service status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub thresholds: ThresholdsResponse,
    pub session: SessionSnapshot,
}

/// Session start request
///
/// A missing `meta` decodes as empty so the session rejects it as an
/// invalid argument instead of axum failing the body.
#[derive(Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub meta: String,
}

/// Sample as sent over the wire
///
/// JSON has no NaN, so a `null` spectral band is decoded as NaN and rejected
/// by validation like any other invalid reading.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SampleBody {
    pub timestamp: NaiveDateTime,
    pub frequency: f64,
    pub power_usage: f64,
    pub fft1: Option<f64>,
    pub fft2: Option<f64>,
    pub fft3: Option<f64>,
    pub fft4: Option<f64>,
}

impl From<SampleBody> for Sample {
    fn from(body: SampleBody) -> Self {
        Sample::new(
            body.timestamp,
            body.frequency,
            body.power_usage,
            [
                body.fft1.unwrap_or(f64::NAN),
                body.fft2.unwrap_or(f64::NAN),
                body.fft3.unwrap_or(f64::NAN),
                body.fft4.unwrap_or(f64::NAN),
            ],
        )
    }
}

impl From<&Sample> for SampleBody {
    fn from(sample: &Sample) -> Self {
        let band = |v: f64| (!v.is_nan()).then_some(v);
        Self {
            timestamp: sample.timestamp,
            frequency: sample.frequency,
            power_usage: sample.power_usage,
            fft1: band(sample.fft1),
            fft2: band(sample.fft2),
            fft3: band(sample.fft3),
            fft4: band(sample.fft4),
        }
    }
}

/// Sample push request; a missing or null `sample` is a null sample
#[derive(Deserialize, Serialize, Debug, Default)]
pub struct PushRequest {
    #[serde(default)]
    pub sample: Option<SampleBody>,
}

/// Session end response
#[derive(Serialize, Deserialize, Debug)]
pub struct EndResponse {
    pub total_accepted: u64,
}

/// GET /api/v1/status
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, ServiceError> {
    let session = state.session.snapshot().await?;
    let thresholds = state.session.thresholds();

    Ok(Json(StatusResponse {
        version: smartgrid_core::VERSION.to_string(),
        thresholds: ThresholdsResponse {
            fft_threshold: thresholds.fft_threshold(),
            frequency_threshold: thresholds.frequency_threshold(),
        },
        session,
    }))
}

/// POST /api/v1/session/start
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<SessionSnapshot>, ServiceError> {
    let snapshot = state.session.start(req.meta).await?;
    Ok(Json(snapshot))
}

/// POST /api/v1/session/sample
pub async fn push_sample(
    State(state): State<AppState>,
    Json(req): Json<PushRequest>,
) -> Result<Json<SessionSnapshot>, ServiceError> {
    let snapshot = state.session.push(req.sample.map(Sample::from)).await?;
    Ok(Json(snapshot))
}

/// POST /api/v1/session/end
pub async fn end_session(
    State(state): State<AppState>,
) -> Result<Json<EndResponse>, ServiceError> {
    let total_accepted = state.session.end().await?;
    Ok(Json(EndResponse { total_accepted }))
}
