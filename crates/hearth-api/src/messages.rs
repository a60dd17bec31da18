use axum::{
    Extension, Json,
    extract::{Path, State},
};

use hearth_gateway::ChatError;
use hearth_types::api::MessageListResponse;
use hearth_types::models::Identity;

use crate::auth::AppState;

/// GET /api/messages/{channel_id}: full history, oldest first, each message
/// with its reactions.
pub async fn get_messages(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Extension(_identity): Extension<Identity>,
) -> Result<Json<MessageListResponse>, ChatError> {
    let messages = state.service.list_messages(channel_id).await?;
    Ok(Json(MessageListResponse { messages }))
}
