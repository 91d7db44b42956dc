//! User management for the expense tracking API.
//!
//! This module contains everything related to users:
//! - The `User` model and the `UserWithTotals` read model
//! - The field validator producing the per-field error map
//! - Database functions for storing and querying users
//! - The service functions called by the route handlers, including the
//!   transactional cascade delete
//! - Route handlers for the `/api/users` endpoints

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    Json,
    response::Response,
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    database_id::DatabaseID,
    response,
    routing::parse_id,
    transaction::delete_transactions_by_user,
    validation::{self, FieldErrors},
};

// ============================================================================
// MODELS
// ============================================================================

/// A user of the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: DatabaseID,
    /// The user's display name.
    pub name: String,
    /// The user's email address, stored trimmed and lowercased.
    pub email: String,
    /// When the user was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the user was last updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A user together with their transaction totals.
///
/// The totals are derived by summing the user's transactions at query time;
/// they are not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserWithTotals {
    /// The user's ID in the application database.
    pub id: DatabaseID,
    /// The user's display name.
    pub name: String,
    /// The user's email address.
    pub email: String,
    /// When the user was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the user was last updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// The sum of the user's income transactions, 0 when there are none.
    pub total_income: f64,
    /// The sum of the user's expense transactions, 0 when there are none.
    pub total_expense: f64,
}

/// The validated, normalized fields that may be written to the users table.
///
/// Only the validator produces this type, so unvalidated input cannot reach
/// the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    /// The trimmed display name.
    pub name: String,
    /// The trimmed, lowercased email address.
    pub email: String,
}

/// The raw request body for creating or updating a user.
///
/// Fields are optional so that missing fields surface as validation errors
/// rather than deserialization failures.
#[derive(Debug, Default, Deserialize)]
pub struct UserPayload {
    /// The user's display name.
    pub name: Option<String>,
    /// The user's email address.
    pub email: Option<String>,
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Validate a user payload and produce the normalized fields.
///
/// Checks accumulate per field; each field stops at its first failure.
/// `exclude_user_id` exempts that user's own email from the uniqueness
/// check so that updates which keep the email are valid.
///
/// # Errors
/// Returns [Error::Validation] with the full field-error map if any check
/// fails, or a database error if the email uniqueness lookup fails.
pub fn validate_user(
    payload: &UserPayload,
    exclude_user_id: Option<DatabaseID>,
    connection: &Connection,
) -> Result<NewUser, Error> {
    let mut errors = FieldErrors::new();

    if !validation::required(payload.name.as_deref()) {
        errors
            .entry("name")
            .or_default()
            .push("Name is required".to_owned());
    } else {
        let name = payload.name.as_deref().unwrap_or_default();

        if !validation::min_length(name, 2) {
            errors
                .entry("name")
                .or_default()
                .push("Name must be at least 2 characters long".to_owned());
        }

        if !validation::max_length(name, 100) {
            errors
                .entry("name")
                .or_default()
                .push("Name must be no more than 100 characters long".to_owned());
        }
    }

    let email = payload
        .email
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_lowercase();

    if !validation::required(payload.email.as_deref()) {
        errors
            .entry("email")
            .or_default()
            .push("Email is required".to_owned());
    } else if !validation::is_valid_email(&email) {
        errors
            .entry("email")
            .or_default()
            .push("Please enter a valid email address".to_owned());
    } else if email_exists(&email, exclude_user_id, connection)? {
        errors
            .entry("email")
            .or_default()
            .push("This email address is already in use".to_owned());
    }

    if !errors.is_empty() {
        return Err(Error::Validation(errors));
    }

    Ok(NewUser {
        name: payload.name.as_deref().unwrap_or_default().trim().to_owned(),
        email,
    })
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the users table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Insert a new user and return the persisted record.
///
/// Stamps `created_at` and `updated_at` server-side.
///
/// # Errors
/// Returns [Error::DuplicateEmail] if the email UNIQUE constraint fires, or
/// [Error::Sql] for any other SQL error.
pub fn insert_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    let now = OffsetDateTime::now_utc();

    let user = connection
        .prepare(
            "INSERT INTO users (name, email, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id, name, email, created_at, updated_at",
        )?
        .query_row((new_user.name, new_user.email, now, now), map_user_row)?;

    Ok(user)
}

/// Update a user's fields and return the persisted record.
///
/// Stamps `updated_at` server-side; `created_at` is left alone.
///
/// # Errors
/// Returns [Error::UserNotFound] if `id` does not refer to a user.
pub fn update_user_row(
    id: DatabaseID,
    new_user: NewUser,
    connection: &Connection,
) -> Result<User, Error> {
    connection
        .prepare(
            "UPDATE users SET name = ?1, email = ?2, updated_at = ?3 WHERE id = ?4
             RETURNING id, name, email, created_at, updated_at",
        )?
        .query_row(
            (new_user.name, new_user.email, OffsetDateTime::now_utc(), id),
            map_user_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UserNotFound,
            error => error.into(),
        })
}

/// Delete a user row.
///
/// # Errors
/// Returns [Error::UserNotFound] if `id` does not refer to a user.
pub fn delete_user_row(id: DatabaseID, connection: &Connection) -> Result<(), Error> {
    let rows_deleted = connection.execute("DELETE FROM users WHERE id = ?1", (id,))?;

    if rows_deleted == 0 {
        return Err(Error::UserNotFound);
    }

    Ok(())
}

/// Whether a user with `id` exists.
pub fn user_exists(id: DatabaseID, connection: &Connection) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM users WHERE id = ?1)",
            (id,),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Whether `email` is already used by a user other than `exclude_user_id`.
///
/// `email` must already be normalized (trimmed and lowercased); the lookup
/// is an exact match against the stored value.
pub fn email_exists(
    email: &str,
    exclude_user_id: Option<DatabaseID>,
    connection: &Connection,
) -> Result<bool, Error> {
    let exists = match exclude_user_id {
        Some(user_id) => connection.query_row(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = ?1 AND id != ?2)",
            (email, user_id),
            |row| row.get(0),
        )?,
        None => connection.query_row(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = ?1)",
            (email,),
            |row| row.get(0),
        )?,
    };

    Ok(exists)
}

/// Get the user with `email`, if any.
///
/// `email` must already be normalized (trimmed and lowercased); the lookup
/// is an exact match against the stored value.
///
/// # Errors
/// Returns [Error::UserNotFound] if no user has `email`.
pub fn find_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare("SELECT id, name, email, created_at, updated_at FROM users WHERE email = :email")?
        .query_row(&[(":email", &email)], map_user_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UserNotFound,
            error => error.into(),
        })
}

const USER_WITH_TOTALS_QUERY: &str = "SELECT
        u.id, u.name, u.email, u.created_at, u.updated_at,
        COALESCE(SUM(CASE WHEN t.type = 'income' THEN t.amount END), 0) AS total_income,
        COALESCE(SUM(CASE WHEN t.type = 'expense' THEN t.amount END), 0) AS total_expense
    FROM users u
    LEFT JOIN transactions t ON t.user_id = u.id";

/// Retrieve a user with their income and expense totals.
///
/// # Errors
/// Returns [Error::UserNotFound] if `id` does not refer to a user.
pub fn find_user_with_totals(
    id: DatabaseID,
    connection: &Connection,
) -> Result<UserWithTotals, Error> {
    connection
        .prepare(&format!(
            "{USER_WITH_TOTALS_QUERY} WHERE u.id = :id GROUP BY u.id"
        ))?
        .query_row(&[(":id", &id)], map_user_with_totals_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::UserNotFound,
            error => error.into(),
        })
}

/// Retrieve all users with their totals, newest first.
pub fn find_all_users_with_totals(connection: &Connection) -> Result<Vec<UserWithTotals>, Error> {
    connection
        .prepare(&format!(
            "{USER_WITH_TOTALS_QUERY} GROUP BY u.id ORDER BY u.created_at DESC, u.id DESC"
        ))?
        .query_map([], map_user_with_totals_row)?
        .map(|user_result| user_result.map_err(Error::Sql))
        .collect()
}

/// Map a database row to a [User].
fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Map a database row to a [UserWithTotals].
fn map_user_with_totals_row(row: &Row) -> Result<UserWithTotals, rusqlite::Error> {
    Ok(UserWithTotals {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        total_income: row.get(5)?,
        total_expense: row.get(6)?,
    })
}

// ============================================================================
// SERVICE FUNCTIONS
// ============================================================================

/// List all users with their transaction totals.
pub fn list_users(connection: &Connection) -> Result<Vec<UserWithTotals>, Error> {
    find_all_users_with_totals(connection)
}

/// Get a single user with their transaction totals.
///
/// # Errors
/// Returns [Error::UserNotFound] if `id` does not refer to a user.
pub fn get_user(id: DatabaseID, connection: &Connection) -> Result<UserWithTotals, Error> {
    find_user_with_totals(id, connection)
}

/// Validate and create a user.
///
/// # Errors
/// Returns [Error::Validation] if the payload fails validation; the store is
/// not touched in that case.
pub fn create_user(payload: &UserPayload, connection: &Connection) -> Result<User, Error> {
    let new_user = validate_user(payload, None, connection)?;

    insert_user(new_user, connection)
}

/// Validate and update an existing user.
///
/// # Errors
/// Returns [Error::UserNotFound] if `id` does not refer to a user (checked
/// before validation), or [Error::Validation] if the payload is invalid.
pub fn update_user(
    id: DatabaseID,
    payload: &UserPayload,
    connection: &Connection,
) -> Result<User, Error> {
    if !user_exists(id, connection)? {
        return Err(Error::UserNotFound);
    }

    let new_user = validate_user(payload, Some(id), connection)?;

    update_user_row(id, new_user, connection)
}

/// Delete a user and all of their transactions.
///
/// The two deletes run in one SQL transaction: a failure in either leaves
/// both tables untouched, so a user can never be removed while orphaned
/// transactions remain.
///
/// # Errors
/// Returns [Error::UserNotFound] if `id` does not refer to a user.
pub fn delete_user(id: DatabaseID, connection: &Connection) -> Result<(), Error> {
    if !user_exists(id, connection)? {
        return Err(Error::UserNotFound);
    }

    let transaction = connection.unchecked_transaction()?;

    delete_transactions_by_user(id, &transaction)?;
    delete_user_row(id, &transaction)?;

    transaction.commit()?;

    Ok(())
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// A route handler for listing all users with their totals.
pub async fn list_users_endpoint(State(state): State<AppState>) -> Result<Response, Error> {
    let connection = state.connection()?;
    let users = list_users(&connection)?;

    Ok(response::success(users, "Users retrieved successfully"))
}

/// A route handler for getting a user with their totals by ID.
pub async fn get_user_endpoint(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, Error> {
    let user_id = parse_id(&user_id).ok_or(Error::UserNotFound)?;
    let connection = state.connection()?;
    let user = get_user(user_id, &connection)?;

    Ok(response::success(user, "User retrieved successfully"))
}

/// A route handler for creating a new user.
pub async fn create_user_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> Result<Response, Error> {
    let Json(payload) = payload.map_err(|_| Error::MalformedJson)?;
    let connection = state.connection()?;
    let user = create_user(&payload, &connection)?;

    Ok(response::created(user, "User created successfully"))
}

/// A route handler for updating an existing user.
pub async fn update_user_endpoint(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> Result<Response, Error> {
    let user_id = parse_id(&user_id).ok_or(Error::UserNotFound)?;
    let Json(payload) = payload.map_err(|_| Error::MalformedJson)?;
    let connection = state.connection()?;
    let user = update_user(user_id, &payload, &connection)?;

    Ok(response::success(user, "User updated successfully"))
}

/// A route handler for deleting a user and their transactions.
pub async fn delete_user_endpoint(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, Error> {
    let user_id = parse_id(&user_id).ok_or(Error::UserNotFound)?;
    let connection = state.connection()?;
    delete_user(user_id, &connection)?;

    Ok(response::success(
        serde_json::Value::Null,
        "User deleted successfully",
    ))
}

// ============================================================================
// TESTS
// ============================================================================
