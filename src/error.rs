use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;
use crate::timezone::TimezoneError;

/// Failures surfaced by the class lifecycle and booking workflow.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Capacity(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("storage failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::ClassNotFound(id) => {
                ServiceError::NotFound(format!("Class with ID {id} not found"))
            }
            StoreError::BookingNotFound(id) => {
                ServiceError::NotFound(format!("Booking with ID {id} not found"))
            }
            StoreError::SlotsOutOfRange { delta, .. } if delta < 0 => {
                ServiceError::Capacity("Not enough available slots".into())
            }
            StoreError::SlotsOutOfRange { .. } => {
                ServiceError::Capacity("Slot release would exceed class capacity".into())
            }
            StoreError::DuplicateBooking { .. } => {
                ServiceError::Conflict("You have already booked this class.".into())
            }
            StoreError::OverlappingClass { .. } => ServiceError::Conflict(
                "A class with the same name and overlapping time already exists.".into(),
            ),
            StoreError::ClassInUse { class_id, confirmed } => ServiceError::Conflict(format!(
                "Class {class_id} still has {confirmed} confirmed booking(s)"
            )),
            err @ StoreError::Backend(_) => ServiceError::Store(err),
        }
    }
}

impl From<TimezoneError> for ServiceError {
    fn from(value: TimezoneError) -> Self {
        ServiceError::Validation(value.to_string())
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::NotFound(msg) => ApiError::NotFound(msg),
            ServiceError::Validation(msg)
            | ServiceError::Capacity(msg)
            | ServiceError::InvalidState(msg) => ApiError::BadRequest(msg),
            ServiceError::Conflict(msg) => ApiError::Conflict(msg),
            ServiceError::Store(err) => {
                error!("Storage error: {err}");
                ApiError::Internal("Database error occurred".into())
            }
        }
    }
}
