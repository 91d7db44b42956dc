//! Application router configuration.
//!
//! The route table maps each method and path under the `/api` prefix to its
//! handler; unmatched paths fall through to the 404 envelope and matched
//! paths with an unsupported verb to the 405 envelope.

use axum::{
    Router,
    http::{Method, StatusCode},
    response::Response,
    routing::{get, put},
};
use tower_http::cors::{Any, CorsLayer};

use crate::{
    AppState,
    analytics::expenses_by_category_endpoint,
    database_id::DatabaseID,
    endpoints, response,
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint,
        list_user_transactions_endpoint, update_transaction_endpoint,
    },
    user::{
        create_user_endpoint, delete_user_endpoint, get_user_endpoint, list_users_endpoint,
        update_user_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    // The dashboard is served from another origin, so the API is open to all.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route(
            endpoints::USERS,
            get(list_users_endpoint).post(create_user_endpoint),
        )
        .route(
            endpoints::USER,
            get(get_user_endpoint)
                .put(update_user_endpoint)
                .delete(delete_user_endpoint),
        )
        .route(
            endpoints::USER_TRANSACTIONS,
            get(list_user_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            put(update_transaction_endpoint).delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::EXPENSES_BY_CATEGORY,
            get(expenses_by_category_endpoint),
        )
        .fallback(endpoint_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(cors)
        .with_state(state)
}

/// Parse a path segment as a database ID.
///
/// Only positive integers are accepted; anything else is treated the same as
/// a route that did not match.
pub fn parse_id(segment: &str) -> Option<DatabaseID> {
    segment.parse().ok().filter(|id| *id > 0)
}

/// The fallback for paths that match no route.
async fn endpoint_not_found() -> Response {
    response::error(StatusCode::NOT_FOUND, "API endpoint not found")
}

/// The fallback for known paths requested with an unsupported verb.
async fn method_not_allowed() -> Response {
    response::error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod route_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::AppState;

    use super::build_router;

    fn new_test_server() -> TestServer {
        let conn = Connection::open_in_memory().expect("Could not open database in memory.");
        let state = AppState::new(conn).expect("Could not create app state.");

        TestServer::new(build_router(state))
    }

    async fn create_user(server: &TestServer, name: &str, email: &str) -> Value {
        let response = server
            .post("/api/users")
            .json(&json!({"name": name, "email": email}))
            .await;

        response.assert_status(StatusCode::CREATED);

        response.json::<Value>()["data"].clone()
    }

    async fn create_transaction(server: &TestServer, user_id: &Value, body: Value) -> Value {
        let response = server
            .post(&format!("/api/users/{user_id}/transactions"))
            .json(&body)
            .await;

        response.assert_status(StatusCode::CREATED);

        response.json::<Value>()["data"].clone()
    }

    #[tokio::test]
    async fn create_user_returns_201_and_the_normalized_record() {
        let server = new_test_server();

        let response = server
            .post("/api/users")
            .json(&json!({"name": "  Alice  ", "email": "Alice@Example.COM"}))
            .await;

        response.assert_status(StatusCode::CREATED);

        let body = response.json::<Value>();
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["message"], json!("User created successfully"));
        assert_eq!(body["data"]["name"], json!("Alice"));
        assert_eq!(body["data"]["email"], json!("alice@example.com"));
        assert!(body["data"]["id"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn create_user_with_invalid_payload_returns_422() {
        let server = new_test_server();

        let response = server
            .post("/api/users")
            .json(&json!({"name": "A", "email": "nope"}))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        let body = response.json::<Value>();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("Validation failed"));
        assert_eq!(
            body["errors"]["name"],
            json!(["Name must be at least 2 characters long"])
        );
        assert_eq!(
            body["errors"]["email"],
            json!(["Please enter a valid email address"])
        );
    }

    #[tokio::test]
    async fn duplicate_email_returns_422_with_the_email_error() {
        let server = new_test_server();
        create_user(&server, "Alice", "alice@example.com").await;

        let response = server
            .post("/api/users")
            .json(&json!({"name": "Imposter", "email": "ALICE@example.com"}))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        let body = response.json::<Value>();
        assert_eq!(
            body["errors"]["email"],
            json!(["This email address is already in use"])
        );
    }

    #[tokio::test]
    async fn malformed_json_returns_400() {
        let server = new_test_server();

        let response = server
            .post("/api/users")
            .content_type("application/json")
            .text("{not json")
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);

        let body = response.json::<Value>();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("Invalid JSON data"));
    }

    #[tokio::test]
    async fn list_users_includes_the_derived_totals() {
        let server = new_test_server();
        let user = create_user(&server, "Alice", "alice@example.com").await;
        let user_id = user["id"].clone();

        create_transaction(
            &server,
            &user_id,
            json!({"type": "income", "amount": 1000, "category": "income", "date": "2025-01-15"}),
        )
        .await;
        create_transaction(
            &server,
            &user_id,
            json!({"type": "expense", "amount": 250.5, "category": "housing", "date": "2025-01-16"}),
        )
        .await;

        let response = server.get("/api/users").await;

        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["message"], json!("Users retrieved successfully"));
        assert_eq!(body["data"][0]["total_income"], json!(1000.0));
        assert_eq!(body["data"][0]["total_expense"], json!(250.5));
    }

    #[tokio::test]
    async fn get_user_returns_the_user_with_totals() {
        let server = new_test_server();
        let user = create_user(&server, "Alice", "alice@example.com").await;

        let response = server.get(&format!("/api/users/{}", user["id"])).await;

        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["message"], json!("User retrieved successfully"));
        assert_eq!(body["data"]["email"], json!("alice@example.com"));
        assert_eq!(body["data"]["total_income"], json!(0.0));
        assert_eq!(body["data"]["total_expense"], json!(0.0));
    }

    #[tokio::test]
    async fn get_missing_user_returns_404() {
        let server = new_test_server();

        let response = server.get("/api/users/42").await;

        response.assert_status_not_found();

        let body = response.json::<Value>();
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["message"], json!("User not found"));
    }

    #[tokio::test]
    async fn non_numeric_user_id_is_treated_as_not_found() {
        let server = new_test_server();

        server.get("/api/users/abc").await.assert_status_not_found();
        server.get("/api/users/0").await.assert_status_not_found();
        server.get("/api/users/-3").await.assert_status_not_found();
    }

    #[tokio::test]
    async fn unknown_route_returns_the_404_envelope() {
        let server = new_test_server();

        let response = server.get("/api/widgets").await;

        response.assert_status_not_found();

        let body = response.json::<Value>();
        assert_eq!(body["message"], json!("API endpoint not found"));
    }

    #[tokio::test]
    async fn unsupported_verb_returns_405() {
        let server = new_test_server();
        create_user(&server, "Alice", "alice@example.com").await;

        let response = server.patch("/api/users/1").json(&json!({})).await;

        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);

        let body = response.json::<Value>();
        assert_eq!(body["message"], json!("Method not allowed"));
    }

    #[tokio::test]
    async fn transactions_support_only_put_and_delete() {
        let server = new_test_server();

        let response = server.get("/api/transactions/1").await;

        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn update_user_returns_the_updated_record() {
        let server = new_test_server();
        let user = create_user(&server, "Alice", "alice@example.com").await;

        let response = server
            .put(&format!("/api/users/{}", user["id"]))
            .json(&json!({"name": "Alice Smith", "email": "alice@example.com"}))
            .await;

        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["message"], json!("User updated successfully"));
        assert_eq!(body["data"]["name"], json!("Alice Smith"));
    }

    #[tokio::test]
    async fn delete_user_cascades_to_their_transactions() {
        let server = new_test_server();
        let user = create_user(&server, "Alice", "alice@example.com").await;
        let user_id = user["id"].clone();

        for amount in [10, 20] {
            create_transaction(
                &server,
                &user_id,
                json!({"type": "expense", "amount": amount, "category": "food", "date": "2025-01-15"}),
            )
            .await;
        }

        let response = server.delete(&format!("/api/users/{user_id}")).await;

        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["message"], json!("User deleted successfully"));
        assert_eq!(body["data"], json!(null));

        server
            .get(&format!("/api/users/{user_id}"))
            .await
            .assert_status_not_found();

        // The deleted user's expenses no longer feed the analytics view.
        let analytics = server.get("/api/analytics/expenses-by-category").await;
        assert_eq!(analytics.json::<Value>()["data"], json!([]));
    }

    #[tokio::test]
    async fn create_transaction_returns_201_and_the_normalized_record() {
        let server = new_test_server();
        let user = create_user(&server, "Alice", "alice@example.com").await;

        let response = server
            .post(&format!("/api/users/{}/transactions", user["id"]))
            .json(&json!({
                "type": "expense",
                "amount": "19.99",
                "category": "shopping",
                "description": "  New shoes  ",
                "date": "2025-01-15",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);

        let body = response.json::<Value>();
        assert_eq!(body["message"], json!("Transaction created successfully"));
        assert_eq!(body["data"]["type"], json!("expense"));
        assert_eq!(body["data"]["amount"], json!(19.99));
        assert_eq!(body["data"]["category"], json!("shopping"));
        assert_eq!(body["data"]["description"], json!("New shoes"));
        assert_eq!(body["data"]["date"], json!("2025-01-15"));
        assert_eq!(body["data"]["user_id"], user["id"]);
    }

    #[tokio::test]
    async fn create_transaction_for_missing_user_returns_404() {
        let server = new_test_server();

        let response = server
            .post("/api/users/42/transactions")
            .json(&json!({"type": "expense", "amount": 5, "category": "food", "date": "2025-01-15"}))
            .await;

        response.assert_status_not_found();

        let body = response.json::<Value>();
        assert_eq!(body["message"], json!("User not found"));
    }

    #[tokio::test]
    async fn create_transaction_with_mismatched_category_returns_422() {
        let server = new_test_server();
        let user = create_user(&server, "Alice", "alice@example.com").await;

        let response = server
            .post(&format!("/api/users/{}/transactions", user["id"]))
            .json(&json!({"type": "income", "amount": 5, "category": "food", "date": "2025-01-15"}))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        let body = response.json::<Value>();
        assert_eq!(
            body["errors"]["category"],
            json!(["Income transactions must use the income category"])
        );
    }

    #[tokio::test]
    async fn list_user_transactions_returns_newest_date_first() {
        let server = new_test_server();
        let user = create_user(&server, "Alice", "alice@example.com").await;
        let user_id = user["id"].clone();

        create_transaction(
            &server,
            &user_id,
            json!({"type": "expense", "amount": 1, "category": "food", "date": "2025-01-10"}),
        )
        .await;
        create_transaction(
            &server,
            &user_id,
            json!({"type": "expense", "amount": 2, "category": "food", "date": "2025-01-20"}),
        )
        .await;

        let response = server
            .get(&format!("/api/users/{user_id}/transactions"))
            .await;

        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["message"], json!("Transactions retrieved successfully"));
        assert_eq!(body["data"][0]["date"], json!("2025-01-20"));
        assert_eq!(body["data"][1]["date"], json!("2025-01-10"));
    }

    #[tokio::test]
    async fn update_transaction_returns_the_updated_record() {
        let server = new_test_server();
        let user = create_user(&server, "Alice", "alice@example.com").await;
        let transaction = create_transaction(
            &server,
            &user["id"],
            json!({"type": "expense", "amount": 5, "category": "food", "date": "2025-01-15"}),
        )
        .await;

        let response = server
            .put(&format!("/api/transactions/{}", transaction["id"]))
            .json(&json!({"type": "expense", "amount": 7.5, "category": "travel", "date": "2025-01-15"}))
            .await;

        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["message"], json!("Transaction updated successfully"));
        assert_eq!(body["data"]["amount"], json!(7.5));
        assert_eq!(body["data"]["category"], json!("travel"));
    }

    #[tokio::test]
    async fn update_missing_transaction_returns_404() {
        let server = new_test_server();

        let response = server
            .put("/api/transactions/42")
            .json(&json!({"type": "expense", "amount": 5, "category": "food", "date": "2025-01-15"}))
            .await;

        response.assert_status_not_found();

        let body = response.json::<Value>();
        assert_eq!(body["message"], json!("Transaction not found"));
    }

    #[tokio::test]
    async fn delete_transaction_removes_it() {
        let server = new_test_server();
        let user = create_user(&server, "Alice", "alice@example.com").await;
        let transaction = create_transaction(
            &server,
            &user["id"],
            json!({"type": "expense", "amount": 5, "category": "food", "date": "2025-01-15"}),
        )
        .await;

        let response = server
            .delete(&format!("/api/transactions/{}", transaction["id"]))
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.json::<Value>()["message"],
            json!("Transaction deleted successfully")
        );

        server
            .delete(&format!("/api/transactions/{}", transaction["id"]))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn analytics_view_reports_sums_percentages_and_colors() {
        let server = new_test_server();
        let user = create_user(&server, "Alice", "alice@example.com").await;
        let user_id = user["id"].clone();

        for (amount, category) in [(100.0, "food"), (50.0, "food"), (50.0, "travel")] {
            create_transaction(
                &server,
                &user_id,
                json!({"type": "expense", "amount": amount, "category": category, "date": "2025-01-15"}),
            )
            .await;
        }

        let response = server.get("/api/analytics/expenses-by-category").await;

        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(
            body["message"],
            json!("Expenses by category retrieved successfully")
        );
        assert_eq!(
            body["data"],
            json!([
                {"category": "food", "amount": 150.0, "percentage": 75.0, "color": "#FF6B6B"},
                {"category": "travel", "amount": 50.0, "percentage": 25.0, "color": "#BB8FCE"},
            ])
        );
    }
}
