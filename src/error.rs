use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::ValidationError;
use crate::services::{chain_session::ConnectivityError, qr_generator::QrGenerationError};

pub const CHAIN_FETCH_FAILED: &str = "Failed to fetch certificates from the blockchain";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Chain error: {0}")]
    Connectivity(#[from] ConnectivityError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("QR code error: {0}")]
    QrGeneration(#[from] QrGenerationError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_debug = format!("{:?}", self);

        let (status, error_message) = match &self {
            AppError::Connectivity(e) => {
                tracing::error!(error = %e, "Chain request failed");
                (StatusCode::BAD_GATEWAY, CHAIN_FETCH_FAILED.to_string())
            }
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::QrGeneration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_debug,
            "message": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
