use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use hearth_gateway::ChatError;
use hearth_gateway::identity;

use crate::auth::AppState;

/// Bearer token from the Authorization header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

/// Resolve the bearer token into a session and bind it to this request.
/// Handlers behind this layer receive an `Extension<Identity>`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ChatError> {
    let token = bearer_token(req.headers());
    let identity = identity::bind_credential(&state.sessions, token.as_deref())?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
