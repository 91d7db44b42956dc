//! The API endpoint URIs.

/// The route to list users and create a user.
pub const USERS: &str = "/api/users";
/// The route to get, update, or delete a single user.
pub const USER: &str = "/api/users/{user_id}";
/// The route to list or create transactions belonging to a user.
pub const USER_TRANSACTIONS: &str = "/api/users/{user_id}/transactions";
/// The route to update or delete a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route for the expenses-by-category aggregate view.
pub const EXPENSES_BY_CATEGORY: &str = "/api/analytics/expenses-by-category";
