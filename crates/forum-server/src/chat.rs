use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::error;

use forum_store::history;
use forum_types::api::{ChatMessageResponse, Claims};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// Chat history in chronological order. `limit` is capped at 200, same as
/// the in-session `/history` command.
pub async fn get_chat_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<Vec<ChatMessageResponse>>, StatusCode> {
    let limit = query.limit.min(200);

    let store = state.store.clone();
    let messages =
        tokio::task::spawn_blocking(move || history::recent_chronological(store.as_ref(), limit))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            })?;

    Ok(Json(messages.into_iter().map(Into::into).collect()))
}
