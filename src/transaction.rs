//! Transaction management for the expense tracking API.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and its income/expense type
//! - The field validator producing the per-field error map
//! - Database functions for storing and querying transactions
//! - The service functions called by the route handlers
//! - Route handlers for the transaction endpoints

use std::{fmt::Display, str::FromStr};

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    Json,
    response::Response,
};
use rusqlite::{Connection, Row, types::Type};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Date, OffsetDateTime};

use crate::{
    AppState, Error,
    category::Category,
    database_id::DatabaseID,
    response,
    routing::parse_id,
    user::user_exists,
    validation::{self, FieldErrors},
};

// ============================================================================
// MODELS
// ============================================================================

/// The error returned when a string is neither `income` nor `expense`.
#[derive(thiserror::Error, Debug, PartialEq)]
#[error("{0} is not a valid transaction type")]
pub struct ParseTransactionTypeError(pub String);

/// Whether a transaction records money earned or money spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money earned. Always categorized as [Category::Income].
    Income,
    /// Money spent. Never categorized as [Category::Income].
    Expense,
}

impl TransactionType {
    /// The lowercase name used in the API and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl FromStr for TransactionType {
    type Err = ParseTransactionTypeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(ParseTransactionTypeError(other.to_owned())),
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: DatabaseID,
    /// The ID of the user that owns the transaction.
    pub user_id: DatabaseID,
    /// Whether the transaction is income or an expense.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// The amount of money spent or earned in this transaction.
    pub amount: f64,
    /// The category the transaction belongs to.
    pub category: Category,
    /// A text description of what the transaction was for. May be empty.
    pub description: String,
    /// When the transaction happened.
    pub date: Date,
    /// When the transaction was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When the transaction was last updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The validated, normalized fields that may be written to the transactions
/// table.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// Whether the transaction is income or an expense.
    pub transaction_type: TransactionType,
    /// The amount of money spent or earned.
    pub amount: f64,
    /// The category the transaction belongs to.
    pub category: Category,
    /// The trimmed description, empty when none was given.
    pub description: String,
    /// When the transaction happened. No later than today.
    pub date: Date,
}

/// The raw request body for creating or updating a transaction.
///
/// Fields are optional so that missing fields surface as validation errors
/// rather than deserialization failures, and `amount` is a raw JSON value so
/// that both numbers and numeric strings are accepted.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionPayload {
    /// `income` or `expense`.
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    /// The transaction amount, as a JSON number or numeric string.
    pub amount: Option<Value>,
    /// The category name.
    pub category: Option<String>,
    /// An optional description.
    pub description: Option<String>,
    /// The transaction date as `YYYY-MM-DD`.
    pub date: Option<String>,
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Whether an amount value is present.
///
/// JSON null and blank strings count as absent, matching the string fields.
fn amount_is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(_) => true,
    }
}

/// Validate a transaction payload and produce the normalized fields.
///
/// Checks accumulate per field. The amount range checks each report their
/// own message, and the category is checked against the raw `type` string so
/// that the type/category invariant is reported even while the type field
/// itself is under validation.
///
/// # Errors
/// Returns [Error::Validation] with the full field-error map if any check
/// fails.
pub fn validate_transaction(payload: &TransactionPayload) -> Result<NewTransaction, Error> {
    let mut errors = FieldErrors::new();

    let raw_type = payload.transaction_type.as_deref().unwrap_or_default();
    let mut transaction_type = None;
    if !validation::required(payload.transaction_type.as_deref()) {
        errors
            .entry("type")
            .or_default()
            .push("Type is required".to_owned());
    } else {
        match raw_type.parse() {
            Ok(parsed) => transaction_type = Some(parsed),
            Err(ParseTransactionTypeError(_)) => {
                errors
                    .entry("type")
                    .or_default()
                    .push("Type must be either income or expense".to_owned());
            }
        }
    }

    let mut amount = None;
    if !amount_is_present(payload.amount.as_ref()) {
        errors
            .entry("amount")
            .or_default()
            .push("Amount is required".to_owned());
    } else {
        match payload.amount.as_ref().and_then(validation::parse_amount) {
            None => {
                errors
                    .entry("amount")
                    .or_default()
                    .push("Amount must be a valid number".to_owned());
            }
            Some(value) => {
                if value <= 0.0 {
                    errors
                        .entry("amount")
                        .or_default()
                        .push("Amount must be greater than 0".to_owned());
                }

                if value < 0.01 {
                    errors
                        .entry("amount")
                        .or_default()
                        .push("Amount must be at least $0.01".to_owned());
                }

                if value > 999_999.99 {
                    errors
                        .entry("amount")
                        .or_default()
                        .push("Amount must be no more than $999,999.99".to_owned());
                }

                amount = Some(value);
            }
        }
    }

    let mut category = None;
    if !validation::required(payload.category.as_deref()) {
        errors
            .entry("category")
            .or_default()
            .push("Category is required".to_owned());
    } else {
        match payload.category.as_deref().unwrap_or_default().parse() {
            Err(_) => {
                errors
                    .entry("category")
                    .or_default()
                    .push("Invalid category selected".to_owned());
            }
            Ok(parsed) => {
                // Income transactions must use the income category, and only them.
                if raw_type == "income" && parsed != Category::Income {
                    errors
                        .entry("category")
                        .or_default()
                        .push("Income transactions must use the income category".to_owned());
                }

                if raw_type == "expense" && parsed == Category::Income {
                    errors
                        .entry("category")
                        .or_default()
                        .push("Expense transactions cannot use the income category".to_owned());
                }

                category = Some(parsed);
            }
        }
    }

    let description = payload.description.as_deref().unwrap_or_default().trim();
    if !validation::max_length(description, 500) {
        errors
            .entry("description")
            .or_default()
            .push("Description must be no more than 500 characters long".to_owned());
    }

    let mut date = None;
    if !validation::required(payload.date.as_deref()) {
        errors
            .entry("date")
            .or_default()
            .push("Date is required".to_owned());
    } else {
        match validation::parse_date(payload.date.as_deref().unwrap_or_default()) {
            None => {
                errors
                    .entry("date")
                    .or_default()
                    .push("Please enter a valid date in YYYY-MM-DD format".to_owned());
            }
            Some(parsed) if !validation::is_past_or_today(parsed) => {
                errors
                    .entry("date")
                    .or_default()
                    .push("Date cannot be in the future".to_owned());
            }
            Some(parsed) => date = Some(parsed),
        }
    }

    match (transaction_type, amount, category, date) {
        (Some(transaction_type), Some(amount), Some(category), Some(date))
            if errors.is_empty() =>
        {
            Ok(NewTransaction {
                transaction_type,
                amount,
                category,
                description: description.to_owned(),
                date,
            })
        }
        _ => Err(Error::Validation(errors)),
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transactions table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id),
                type TEXT NOT NULL,
                amount REAL NOT NULL,
                category TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                date TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

const TRANSACTION_COLUMNS: &str =
    "id, user_id, type, amount, category, description, date, created_at, updated_at";

/// Insert a new transaction for `user_id` and return the persisted record.
///
/// Stamps `created_at` and `updated_at` server-side. The caller is
/// responsible for checking that the user exists.
pub fn insert_transaction(
    user_id: DatabaseID,
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let now = OffsetDateTime::now_utc();

    let transaction = connection
        .prepare(&format!(
            "INSERT INTO transactions (user_id, type, amount, category, description, date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                user_id,
                new_transaction.transaction_type.as_str(),
                new_transaction.amount,
                new_transaction.category.as_str(),
                new_transaction.description,
                new_transaction.date,
                now,
                now,
            ),
            map_transaction_row,
        )?;

    Ok(transaction)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// Returns [Error::TransactionNotFound] if `id` does not refer to a
/// transaction.
pub fn find_transaction(id: DatabaseID, connection: &Connection) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::TransactionNotFound,
            error => error.into(),
        })
}

/// Update a transaction's fields and return the persisted record.
///
/// Stamps `updated_at` server-side; `user_id` and `created_at` are left
/// alone.
///
/// # Errors
/// Returns [Error::TransactionNotFound] if `id` does not refer to a
/// transaction.
pub fn update_transaction_row(
    id: DatabaseID,
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "UPDATE transactions
             SET type = ?1, amount = ?2, category = ?3, description = ?4, date = ?5, updated_at = ?6
             WHERE id = ?7
             RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                new_transaction.transaction_type.as_str(),
                new_transaction.amount,
                new_transaction.category.as_str(),
                new_transaction.description,
                new_transaction.date,
                OffsetDateTime::now_utc(),
                id,
            ),
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::TransactionNotFound,
            error => error.into(),
        })
}

/// Delete a transaction row.
///
/// # Errors
/// Returns [Error::TransactionNotFound] if `id` does not refer to a
/// transaction.
pub fn delete_transaction_row(id: DatabaseID, connection: &Connection) -> Result<(), Error> {
    let rows_deleted = connection.execute("DELETE FROM transactions WHERE id = ?1", (id,))?;

    if rows_deleted == 0 {
        return Err(Error::TransactionNotFound);
    }

    Ok(())
}

/// Whether a transaction with `id` exists.
pub fn transaction_exists(id: DatabaseID, connection: &Connection) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM transactions WHERE id = ?1)",
            (id,),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Retrieve all of a user's transactions, most recent date first.
///
/// Same-day entries are ordered by creation time descending, with the row ID
/// as a stable tiebreaker.
pub fn find_transactions_by_user(
    user_id: DatabaseID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions
             WHERE user_id = :user_id
             ORDER BY date DESC, created_at DESC, id DESC"
        ))?
        .query_map(&[(":user_id", &user_id)], map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::Sql))
        .collect()
}

/// Delete all transactions owned by `user_id`.
///
/// Used only by the cascading user deletion; deleting zero rows is not an
/// error.
pub fn delete_transactions_by_user(
    user_id: DatabaseID,
    connection: &Connection,
) -> Result<usize, Error> {
    connection
        .execute("DELETE FROM transactions WHERE user_id = ?1", (user_id,))
        .map_err(|error| error.into())
}

/// Map a database row to a [Transaction].
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let type_name: String = row.get(2)?;
    let transaction_type = type_name.parse().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(error))
    })?;

    let category_name: String = row.get(4)?;
    let category = category_name.parse().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(error))
    })?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        transaction_type,
        amount: row.get(3)?,
        category,
        description: row.get(5)?,
        date: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

// ============================================================================
// SERVICE FUNCTIONS
// ============================================================================

/// List a user's transactions, most recent first.
///
/// # Errors
/// Returns [Error::UserNotFound] if `user_id` does not refer to a user.
pub fn list_user_transactions(
    user_id: DatabaseID,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    if !user_exists(user_id, connection)? {
        return Err(Error::UserNotFound);
    }

    find_transactions_by_user(user_id, connection)
}

/// Validate and create a transaction for `user_id`.
///
/// # Errors
/// Returns [Error::UserNotFound] if `user_id` does not refer to a user
/// (checked before validation), or [Error::Validation] if the payload is
/// invalid; the store is not touched in either case.
pub fn create_transaction(
    user_id: DatabaseID,
    payload: &TransactionPayload,
    connection: &Connection,
) -> Result<Transaction, Error> {
    if !user_exists(user_id, connection)? {
        return Err(Error::UserNotFound);
    }

    let new_transaction = validate_transaction(payload)?;

    insert_transaction(user_id, new_transaction, connection)
}

/// Validate and update an existing transaction.
///
/// # Errors
/// Returns [Error::TransactionNotFound] if `id` does not refer to a
/// transaction (checked before validation), or [Error::Validation] if the
/// payload is invalid.
pub fn update_transaction(
    id: DatabaseID,
    payload: &TransactionPayload,
    connection: &Connection,
) -> Result<Transaction, Error> {
    if !transaction_exists(id, connection)? {
        return Err(Error::TransactionNotFound);
    }

    let new_transaction = validate_transaction(payload)?;

    update_transaction_row(id, new_transaction, connection)
}

/// Delete a transaction.
///
/// # Errors
/// Returns [Error::TransactionNotFound] if `id` does not refer to a
/// transaction.
pub fn delete_transaction(id: DatabaseID, connection: &Connection) -> Result<(), Error> {
    if !transaction_exists(id, connection)? {
        return Err(Error::TransactionNotFound);
    }

    delete_transaction_row(id, connection)
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// A route handler for listing a user's transactions.
pub async fn list_user_transactions_endpoint(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Response, Error> {
    let user_id = parse_id(&user_id).ok_or(Error::UserNotFound)?;
    let connection = state.connection()?;
    let transactions = list_user_transactions(user_id, &connection)?;

    Ok(response::success(
        transactions,
        "Transactions retrieved successfully",
    ))
}

/// A route handler for creating a transaction under a user.
pub async fn create_transaction_endpoint(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    payload: Result<Json<TransactionPayload>, JsonRejection>,
) -> Result<Response, Error> {
    let user_id = parse_id(&user_id).ok_or(Error::UserNotFound)?;
    let Json(payload) = payload.map_err(|_| Error::MalformedJson)?;
    let connection = state.connection()?;
    let transaction = create_transaction(user_id, &payload, &connection)?;

    Ok(response::created(
        transaction,
        "Transaction created successfully",
    ))
}

/// A route handler for updating an existing transaction.
pub async fn update_transaction_endpoint(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    payload: Result<Json<TransactionPayload>, JsonRejection>,
) -> Result<Response, Error> {
    let transaction_id = parse_id(&transaction_id).ok_or(Error::TransactionNotFound)?;
    let Json(payload) = payload.map_err(|_| Error::MalformedJson)?;
    let connection = state.connection()?;
    let transaction = update_transaction(transaction_id, &payload, &connection)?;

    Ok(response::success(
        transaction,
        "Transaction updated successfully",
    ))
}

/// A route handler for deleting a transaction.
pub async fn delete_transaction_endpoint(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Response, Error> {
    let transaction_id = parse_id(&transaction_id).ok_or(Error::TransactionNotFound)?;
    let connection = state.connection()?;
    delete_transaction(transaction_id, &connection)?;

    Ok(response::success(
        serde_json::Value::Null,
        "Transaction deleted successfully",
    ))
}

// ============================================================================
// TESTS
// ============================================================================
