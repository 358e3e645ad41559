pub mod auth;
pub mod chat;
pub mod config;
pub mod middleware;
pub mod state;

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use forum_gateway::session;

use crate::state::AppState;

/// Assemble the full application router over shared state.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(root))
        .route("/register", post(auth::register))
        .route("/token", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/users/me", get(auth::me))
        .route("/chat/history", get(chat::get_chat_history))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws/chat", get(ws_upgrade))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Forum API is running" }))
}

/// Upgrade into the chat session protocol. Authentication happens in-band
/// on the first frame, not here.
async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        session::handle_socket(
            socket,
            state.registry.clone(),
            state.auth.clone(),
            state.store.clone(),
        )
    })
}
