//! Spendtrack is a small multi-user expense tracking web service.
//!
//! This library provides a JSON REST API over a SQLite database: users,
//! their income and expense transactions, and an expenses-by-category
//! analytics view for the dashboard pie chart. The `server` binary wires the
//! router to an HTTP listener.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod analytics;
mod app_state;
mod category;
mod database_id;
mod db;
mod endpoints;
mod error;
mod response;
mod routing;
mod transaction;
mod user;
mod validation;

pub use app_state::AppState;
pub use category::Category;
pub use database_id::DatabaseID;
pub use db::initialize as initialize_db;
pub use error::Error;
pub use routing::build_router;
pub use transaction::{Transaction, TransactionType};
pub use user::{User, UserWithTotals, find_user_by_email};

/// An async task that waits for either the ctrl+c or terminate signal,
/// whichever comes first, and then signals the server to shut down
/// gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
