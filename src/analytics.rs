//! The expenses-by-category aggregate view that feeds the dashboard pie
//! chart.

use axum::{extract::State, response::Response};
use rusqlite::Connection;
use serde::Serialize;

use crate::{AppState, Error, category::Category, response};

// ============================================================================
// MODELS
// ============================================================================

/// One slice of the expenses pie chart. Derived at query time, not stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseByCategory {
    /// The expense category.
    pub category: Category,
    /// The sum of expense amounts in this category.
    pub amount: f64,
    /// This category's share of all expenses, as a percentage rounded to one
    /// decimal place. 0 when there are no expenses at all.
    pub percentage: f64,
    /// The display color for this category.
    pub color: &'static str,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Sum expense amounts per category.
///
/// Categories whose summed amount is not greater than zero are excluded, and
/// the result is ordered by summed amount descending.
pub fn sum_expenses_by_category(connection: &Connection) -> Result<Vec<(Category, f64)>, Error> {
    connection
        .prepare(
            "SELECT category, SUM(amount) AS total_amount
             FROM transactions
             WHERE type = 'expense'
             GROUP BY category
             HAVING SUM(amount) > 0
             ORDER BY total_amount DESC",
        )?
        .query_map([], |row| {
            let category_name: String = row.get(0)?;
            let category = category_name.parse().map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(error),
                )
            })?;

            Ok((category, row.get(1)?))
        })?
        .map(|row_result| row_result.map_err(Error::Sql))
        .collect()
}

// ============================================================================
// SERVICE FUNCTIONS
// ============================================================================

/// Round to one decimal place, the pinned precision for chart percentages.
fn round_percentage(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Build the expenses-by-category view: per-category totals with each
/// category's percentage share and display color attached.
pub fn expenses_by_category(connection: &Connection) -> Result<Vec<ExpenseByCategory>, Error> {
    let totals = sum_expenses_by_category(connection)?;

    let grand_total: f64 = totals.iter().map(|(_, amount)| amount).sum();

    let view = totals
        .into_iter()
        .map(|(category, amount)| ExpenseByCategory {
            category,
            amount,
            percentage: if grand_total > 0.0 {
                round_percentage(amount / grand_total * 100.0)
            } else {
                0.0
            },
            color: category.color(),
        })
        .collect();

    Ok(view)
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// A route handler for the expenses-by-category aggregate view.
pub async fn expenses_by_category_endpoint(
    State(state): State<AppState>,
) -> Result<Response, Error> {
    let connection = state.connection()?;
    let view = expenses_by_category(&connection)?;

    Ok(response::success(
        view,
        "Expenses by category retrieved successfully",
    ))
}

// ============================================================================
// TESTS
// ============================================================================
