//! The uniform JSON response envelope.
//!
//! Every response carries `{success, data, message}`, with an `errors` map
//! added on validation failures. Emitting a response terminates the request.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::validation::FieldErrors;

/// A 200 envelope wrapping `data`.
pub fn success<T: Serialize>(data: T, message: &str) -> Response {
    with_status(StatusCode::OK, data, message)
}

/// A 201 envelope wrapping the newly created `data`.
pub fn created<T: Serialize>(data: T, message: &str) -> Response {
    with_status(StatusCode::CREATED, data, message)
}

/// A success envelope with an explicit status code.
pub fn with_status<T: Serialize>(status: StatusCode, data: T, message: &str) -> Response {
    (
        status,
        Json(json!({
            "success": true,
            "data": data,
            "message": message,
        })),
    )
        .into_response()
}

/// An error envelope with a null `data` field.
pub fn error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "data": null,
            "message": message,
        })),
    )
        .into_response()
}

/// The 422 envelope carrying the full per-field error map.
pub fn validation_failed(errors: &FieldErrors) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
            "success": false,
            "data": null,
            "message": "Validation failed",
            "errors": errors,
        })),
    )
        .into_response()
}
