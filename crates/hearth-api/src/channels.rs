use axum::{Extension, Json, extract::State};

use hearth_gateway::ChatError;
use hearth_types::api::{ChannelListResponse, ChannelResponse, CreateChannelRequest};
use hearth_types::models::Identity;

use crate::auth::AppState;

/// GET /api/channels
pub async fn list_channels(
    State(state): State<AppState>,
    Extension(_identity): Extension<Identity>,
) -> Result<Json<ChannelListResponse>, ChatError> {
    let channels = state.service.list_channels().await?;
    Ok(Json(ChannelListResponse { channels }))
}

/// POST /api/channels. Also announces `channel_created` to every connection.
pub async fn create_channel(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<Json<ChannelResponse>, ChatError> {
    let channel = state.service.create_channel(&identity, req.name).await?;
    Ok(Json(ChannelResponse { channel }))
}
