pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod extract;
pub mod issue_types;
pub mod issues;
pub mod middleware;
pub mod social;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
};
use serde_json::{Value, json};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// Every endpoint, without transport layers (CORS, tracing) which the binary adds.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/tipos", get(issue_types::list_issue_types))
        .route("/auth/cadastro", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/facebook", post(social::facebook_login))
        .route("/problemas", get(issues::list_issues))
        .route("/problemas/{id}", get(issues::get_issue));

    let protected_routes = Router::new()
        .route("/auth/verificar/{id}", get(auth::verify_account))
        .route("/admin/tipos", post(issue_types::create_issue_type))
        .route("/admin/tipos/{id}", delete(issue_types::delete_issue_type))
        .route("/problemas", post(issues::create_issue))
        .route("/problemas/{id}", delete(issues::delete_issue))
        .route("/problemas/{id}/fotos", post(issues::add_photo))
        .route("/problemas/{id}/votar", post(issues::vote))
        .route("/problemas/{id}/validar", post(issues::validate))
        .route("/problemas/{id}/status", patch(issues::update_status))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
