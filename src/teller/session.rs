//! Cookie sessions.
//!
//! The raw token only ever lives in the client's cookie. The registry keys
//! records by an HMAC of the token so a dump of server memory cannot be
//! replayed as cookies.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::{
    collections::HashMap,
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::sync::RwLock;
use tracing::debug;

use super::error::{Error, Result};

pub const SESSION_COOKIE_NAME: &str = "teller_session";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub user_key: String,
    pub csrf_token: String,
    pub created_at_unix: u64,
}

pub struct SessionRegistry {
    secret_key: SecretString,
    sessions: RwLock<HashMap<Vec<u8>, SessionRecord>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(secret_key: SecretString) -> Self {
        Self {
            secret_key,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a session bound to `user_key` and return the raw token.
    ///
    /// # Errors
    /// Returns [`Error::Internal`] if the OS random source fails.
    pub async fn establish(&self, user_key: &str) -> Result<(String, SessionRecord)> {
        let token = generate_token()?;
        let record = SessionRecord {
            user_key: user_key.to_string(),
            csrf_token: generate_token()?,
            created_at_unix: unix_now(),
        };
        let signature = self.sign(&token)?;
        // Records only leave on logout; there is no expiry sweep.
        let active = {
            let mut sessions = self.sessions.write().await;
            sessions.insert(signature, record.clone());
            sessions.len()
        };

        debug!("session established for {user_key} ({active} active)");

        Ok((token, record))
    }

    pub async fn lookup(&self, token: &str) -> Option<SessionRecord> {
        let signature = self.sign(token).ok()?;
        self.sessions.read().await.get(&signature).cloned()
    }

    /// Drop the session for `token`; unknown tokens are ignored.
    pub async fn terminate(&self, token: &str) {
        let Ok(signature) = self.sign(token) else {
            return;
        };
        if let Some(record) = self.sessions.write().await.remove(&signature) {
            let age = unix_now().saturating_sub(record.created_at_unix);
            debug!("session for {} terminated after {age}s", record.user_key);
        }
    }

    fn sign(&self, token: &str) -> Result<Vec<u8>> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.expose_secret().as_bytes())
            .map_err(|err| Error::Internal(format!("invalid session key: {err}")))?;
        mac.update(token.as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

/// 32 random bytes, base64url without padding.
pub(crate) fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| Error::Internal(format!("failed to generate token: {err}")))?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

pub(crate) fn session_cookie(token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax"
    ))
}

pub(crate) fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("teller_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    extract_cookie(headers, SESSION_COOKIE_NAME)
}

/// First non-empty value of the cookie called `name`.
pub(crate) fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == name && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}
