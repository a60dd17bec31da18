use hearth_types::models::{Identity, Session};

use crate::error::ChatError;

/// Looks up the externally validated session behind a handshake credential.
/// Implemented by the login collaborator; an unknown or expired credential
/// must resolve to an unauthenticated session, not an error.
pub trait SessionResolver: Send + Sync {
    fn resolve(&self, credential: Option<&str>) -> Session;
}

/// Turn a session into the identity snapshot a connection keeps for its
/// whole lifetime.
pub fn bind(session: &Session) -> Result<Identity, ChatError> {
    if !session.authenticated || session.user_id.is_empty() {
        return Err(ChatError::Unauthenticated);
    }
    Ok(Identity::new(session.user_id.clone(), session.username.clone()))
}

/// Resolve a handshake credential and bind it in one step.
pub fn bind_credential(resolver: &dyn SessionResolver, credential: Option<&str>) -> Result<Identity, ChatError> {
    bind(&resolver.resolve(credential))
}
