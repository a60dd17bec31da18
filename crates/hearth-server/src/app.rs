use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    http::HeaderMap,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use hearth_api::auth::{self, AppState, AppStateInner};
use hearth_api::middleware::{bearer_token, require_auth};
use hearth_api::session::SessionKeys;
use hearth_api::{channels, messages};
use hearth_db::Database;
use hearth_gateway::{ChatService, connection, identity};

use crate::config::Config;

/// Wire the store, chat service and session keys described by `config`.
pub fn build_state(config: &Config, db: Database) -> AppState {
    let service = ChatService::new(db, config.chat_settings());
    Arc::new(AppStateInner {
        service,
        sessions: SessionKeys::new(&config.session_secret, config.session_ttl()),
        passcode: config.passcode.clone(),
    })
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/api/session", get(auth::session))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/channels", get(channels::list_channels).post(channels::create_channel))
        .route("/api/messages/{channel_id}", get(messages::get_messages))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Default, Deserialize)]
struct GatewayQuery {
    token: Option<String>,
}

/// Browsers cannot set headers on a WebSocket handshake, so `?token=` is
/// accepted alongside the Authorization header.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let credential = bearer_token(&headers).or(query.token);
    let identity = match identity::bind_credential(&state.sessions, credential.as_deref()) {
        Ok(identity) => identity,
        Err(e) => {
            warn!("Gateway handshake rejected: {}", e);
            return e.into_response();
        }
    };

    info!("Gateway upgrade for {} ({})", identity.username(), identity.user_id());
    let service = state.service.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, service, identity))
        .into_response()
}
