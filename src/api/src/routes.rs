//! API route handlers.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::XgError;
use crate::heatmap::{GridError, HeatmapData};
use crate::service::PredictionService;
use crate::types::{
    ErrorResponse, GridQuery, GridResponse, HealthResponse, ModelInfoResponse, ModelSummary,
    PredictResponse, ShotInput, ShotType, Situation,
};

/// Application state shared across handlers.
pub struct AppState {
    pub service: PredictionService,
    pub heatmaps: Option<HeatmapData>,
    pub config: AppConfig,
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal", msg)
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[cfg(test)]
    pub fn code(&self) -> &str {
        &self.error
    }
}

impl From<XgError> for ApiError {
    fn from(err: XgError) -> Self {
        let status = match err {
            _ if err.is_client_error() => StatusCode::BAD_REQUEST,
            XgError::ModelNotAvailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.code(), err.to_string())
    }
}

impl From<GridError> for ApiError {
    fn from(err: GridError) -> Self {
        let (status, code) = match err {
            GridError::NotFound => (StatusCode::NOT_FOUND, "NotFound"),
            GridError::PenaltyUnavailable => (StatusCode::BAD_REQUEST, "PenaltyUnavailable"),
            GridError::InvalidSituation(_) => (StatusCode::BAD_REQUEST, "InvalidSituation"),
            GridError::InvalidShotType(_) => (StatusCode::BAD_REQUEST, "InvalidShotType"),
            GridError::InvalidDimensions => (StatusCode::BAD_REQUEST, "InvalidPitchDimensions"),
        };
        Self::new(status, code, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "InvalidJson", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), "InvalidQuery", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{}: {}", self.error, self.message);
        }
        let body = Json(ErrorResponse {
            error: self.error,
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Model info endpoint.
pub async fn model_info(State(state): State<Arc<AppState>>) -> Json<ModelInfoResponse> {
    let registry = state.service.registry();
    Json(ModelInfoResponse {
        models_dir: registry.dir().display().to_string(),
        models: registry
            .iter()
            .map(|(name, entry)| ModelSummary {
                name: name.to_string(),
                kind: entry.model.kind().to_string(),
                num_features: entry.schema.len(),
                feature_names: entry.schema.names().to_vec(),
            })
            .collect(),
    })
}

/// Prediction endpoint.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ShotInput>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(req) = payload?;

    // Fast reject before touching the pipeline
    Situation::from_json(req.situation.as_ref())?;
    ShotType::from_json(req.shot_type.as_ref())?;

    let outcome = state.service.predict(&req)?;
    let normalisation = req
        .normalisation
        .clone()
        .unwrap_or_else(|| Value::Object(Default::default()));

    tracing::debug!(
        "xG {:.2} from {} at ({:.3}, {:.3})",
        outcome.xg,
        outcome.choice.name(),
        outcome.coordinate.x,
        outcome.coordinate.y
    );

    Ok(Json(outcome.into_response(normalisation)))
}

/// Heatmap grid endpoint.
pub async fn predict_grid(
    State(state): State<Arc<AppState>>,
    query: Result<Query<GridQuery>, QueryRejection>,
) -> Result<Json<GridResponse>, ApiError> {
    let Query(query) = query?;
    let heatmaps = state.heatmaps.as_ref().ok_or_else(|| {
        ApiError::internal(format!(
            "Heatmap data file not found at {}",
            state.config.heatmaps.path
        ))
    })?;

    Ok(Json(heatmaps.lookup(&query)?))
}
