use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;

use hearth_gateway::identity::SessionResolver;
use hearth_types::api::Claims;
use hearth_types::models::Session;

/// Issues and verifies signed session tokens (HS256).
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl: chrono::Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, user_id: &str, username: &str) -> anyhow::Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            exp: (chrono::Utc::now() + self.ttl).timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }
}

impl SessionResolver for SessionKeys {
    fn resolve(&self, credential: Option<&str>) -> Session {
        let Some(token) = credential.filter(|t| !t.is_empty()) else {
            return Session::anonymous();
        };

        match decode::<Claims>(token, &self.decoding, &Validation::default()) {
            Ok(data) => Session::authenticated(data.claims.sub, data.claims.username),
            Err(e) => {
                debug!("Rejected session token: {}", e);
                Session::anonymous()
            }
        }
    }
}
