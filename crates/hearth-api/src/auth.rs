use std::sync::Arc;

use axum::{Json, extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse};
use tracing::{error, info, warn};
use uuid::Uuid;

use hearth_gateway::ChatService;
use hearth_gateway::identity::SessionResolver;
use hearth_types::api::{LoginRequest, LoginResponse, SessionResponse};

use crate::middleware::bearer_token;
use crate::session::SessionKeys;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub service: ChatService,
    pub sessions: SessionKeys,
    pub passcode: String,
}

/// POST /login: exchange the shared passcode for a session token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let rejected = || (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "ok": false })));

    let passcode = req.passcode.unwrap_or_default();
    if passcode.is_empty() || passcode != state.passcode {
        warn!("Login rejected: bad passcode");
        return Err(rejected());
    }

    let user_id = new_user_id();
    let username = req
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(default_username);

    let token = state.sessions.issue(&user_id, &username).map_err(|e| {
        error!("Failed to issue session token: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({ "ok": false })))
    })?;

    info!("{} ({}) logged in", username, user_id);
    Ok(Json(LoginResponse {
        ok: true,
        user_id,
        username,
        token,
    }))
}

/// GET /api/session: report the caller's session without rejecting.
pub async fn session(State(state): State<AppState>, headers: HeaderMap) -> Json<SessionResponse> {
    let session = state.sessions.resolve(bearer_token(&headers).as_deref());
    if session.authenticated {
        Json(SessionResponse {
            authenticated: true,
            user_id: Some(session.user_id),
            username: Some(session.username),
        })
    } else {
        Json(SessionResponse {
            authenticated: false,
            user_id: None,
            username: None,
        })
    }
}

/// `u_` followed by 8 lowercase hex characters.
fn new_user_id() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("u_{}", &simple[..8])
}

/// `User` followed by a number in 1000..=9999.
fn default_username() -> String {
    let n = 1000 + (Uuid::new_v4().as_u128() % 9000) as u32;
    format!("User{}", n)
}
