use axum::{
    Json, Router,
    routing::{get, post},
};
use serde_json::{Value, json};

pub mod audit;
pub mod auth;
pub mod boards;
pub mod error;
pub mod invites;
pub mod middleware;

use auth::AppState;
use middleware::require_auth;

/// The full REST surface. Everything except health, auth, and invite
/// validation requires a bearer token.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/invites/validate", get(invites::validate_invite));

    let protected_routes = Router::new()
        .route("/boards", post(boards::create_board).get(boards::list_boards))
        .route("/boards/{board_id}", get(boards::get_board))
        .route("/boards/{board_id}/members", get(boards::list_members))
        .route(
            "/boards/{board_id}/invites",
            post(invites::create_invite).get(invites::list_invites),
        )
        .route(
            "/boards/{board_id}/invites/{invite_id}/cancel",
            post(invites::cancel_invite),
        )
        .route(
            "/boards/{board_id}/invites/{invite_id}/resend",
            post(invites::resend_invite),
        )
        .route("/boards/{board_id}/audit", get(audit::list_audit))
        .route("/invites/accept", post(invites::accept_invite))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
