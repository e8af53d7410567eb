//! Ephemeral session tokens with a fixed lifetime.

use crate::error::{DbError, DbResult};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

/// Lifetime of every token.
pub const TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct SessionToken {
    pub user_id: String,
    pub created: Instant,
    pub expires: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub active_session_tokens: usize,
}

/// In-memory token registry. Expired entries are removed when validated or swept.
#[derive(Debug)]
pub struct SessionTokenStore {
    ttl: Duration,
    tokens: RwLock<HashMap<String, SessionToken>>,
}

impl Default for SessionTokenStore {
    fn default() -> Self {
        Self::new(TOKEN_TTL)
    }
}

impl SessionTokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Issue a new opaque token for `user_id`.
    pub async fn generate(&self, user_id: &str) -> String {
        let bytes: [u8; 32] = rand::random();
        let token = URL_SAFE_NO_PAD.encode(bytes);
        let created = Instant::now();

        self.tokens.write().await.insert(
            token.clone(),
            SessionToken {
                user_id: user_id.to_string(),
                created,
                expires: created + self.ttl,
            },
        );
        info!(user_id, "Generated session token");
        token
    }

    /// Return the owning user id, or why the token is rejected.
    pub async fn validate(&self, token: &str) -> DbResult<String> {
        if token.is_empty() {
            return Err(DbError::TokenInvalid);
        }

        let mut tokens = self.tokens.write().await;
        let Some(entry) = tokens.get(token) else {
            return Err(DbError::TokenInvalid);
        };

        if Instant::now() > entry.expires {
            tokens.remove(token);
            debug!("Removed expired session token during validation");
            return Err(DbError::TokenExpired);
        }
        Ok(entry.user_id.clone())
    }

    /// Remove every expired token. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, entry| now <= entry.expires);
        let removed = before - tokens.len();
        if removed > 0 {
            info!(removed, "Cleaned up expired session tokens");
        }
        removed
    }

    pub async fn stats(&self) -> SessionStats {
        SessionStats {
            active_session_tokens: self.tokens.read().await.len(),
        }
    }
}
