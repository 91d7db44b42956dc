//! Defines the app level error type and its translation to the JSON envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{response, validation::FieldErrors};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested user does not exist.
    #[error("User not found")]
    UserNotFound,

    /// The requested transaction does not exist.
    #[error("Transaction not found")]
    TransactionNotFound,

    /// One or more request fields failed validation.
    ///
    /// Carries the full per-field error map, never just the first violation.
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// The request body could not be parsed as JSON.
    #[error("Invalid JSON data")]
    MalformedJson,

    /// The email UNIQUE constraint fired on insert or update.
    ///
    /// The validator checks uniqueness up front, so this only occurs when a
    /// conflicting write lands between the check and the insert.
    #[error("the email address is already in use")]
    DuplicateEmail,

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLock,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    Sql(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("users.email") =>
            {
                Error::DuplicateEmail
            }
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::Sql(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::UserNotFound | Error::TransactionNotFound => {
                response::error(StatusCode::NOT_FOUND, &self.to_string())
            }
            Error::Validation(errors) => response::validation_failed(&errors),
            Error::MalformedJson => response::error(StatusCode::BAD_REQUEST, "Invalid JSON data"),
            Error::DuplicateEmail => {
                let mut errors = FieldErrors::new();
                errors.insert(
                    "email",
                    vec!["This email address is already in use".to_owned()],
                );
                response::validation_failed(&errors)
            }
            // Internal errors are logged but not shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                response::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}
