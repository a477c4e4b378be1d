pub mod auth;
pub mod employees;
pub mod feedback;
pub mod goals;
pub mod session;
pub mod users;

use crate::state::SharedState;
use axum::{routing::get, Router};

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .nest("/users", users::router(state.clone()))
        .nest("/employees", employees::router(state.clone()))
        .merge(goals::router(state.clone()))
        .merge(feedback::router(state))
}
