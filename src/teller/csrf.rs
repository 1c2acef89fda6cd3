//! CSRF checks for mutating requests.
//!
//! Each session carries its own random token, rendered into forms as the
//! `csrf_token` hidden field. Before a session exists, the login form gets a
//! signed token that is also set as the `teller_csrf` cookie; a login is only
//! accepted when the submitted field matches that cookie and the signature
//! verifies. Requests authenticated without a session have no ambient
//! credentials to abuse and are not checked.

use axum::http::{header::InvalidHeaderValue, HeaderValue};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{
    error::{Error, Result},
    session::{generate_token, unix_now, SessionRecord},
};

pub const CSRF_FIELD: &str = "csrf_token";
pub const LOGIN_CSRF_COOKIE_NAME: &str = "teller_csrf";

/// Lifetime of a login form token, in seconds.
pub const LOGIN_TOKEN_TTL_SECS: u64 = 600;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CsrfDecision {
    Allowed,
    Rejected,
}

pub trait CsrfGuard: Send + Sync {
    fn check(&self, session: Option<&SessionRecord>, submitted: Option<&str>) -> CsrfDecision;

    /// Token to embed in rendered forms, if this guard wants one.
    fn form_token<'a>(&self, session: Option<&'a SessionRecord>) -> Option<&'a str>;

    /// Token for the anonymous login form, sent back as the login cookie too.
    ///
    /// # Errors
    /// Returns [`Error::Internal`] if a token cannot be generated or signed.
    fn issue_login_token(&self) -> Result<Option<String>>;

    fn check_login(&self, cookie: Option<&str>, submitted: Option<&str>) -> CsrfDecision;
}

#[derive(Clone, Debug)]
pub struct NoopCsrfGuard;

impl CsrfGuard for NoopCsrfGuard {
    fn check(&self, _session: Option<&SessionRecord>, _submitted: Option<&str>) -> CsrfDecision {
        CsrfDecision::Allowed
    }

    fn form_token<'a>(&self, _session: Option<&'a SessionRecord>) -> Option<&'a str> {
        None
    }

    fn issue_login_token(&self) -> Result<Option<String>> {
        Ok(None)
    }

    fn check_login(&self, _cookie: Option<&str>, _submitted: Option<&str>) -> CsrfDecision {
        CsrfDecision::Allowed
    }
}

#[derive(Clone, Debug)]
pub struct SessionCsrfGuard {
    secret_key: SecretString,
}

impl SessionCsrfGuard {
    #[must_use]
    pub fn new(secret_key: SecretString) -> Self {
        Self { secret_key }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.secret_key.expose_secret().as_bytes())
            .map_err(|err| Error::Internal(format!("invalid csrf key: {err}")))
    }

    /// `<issued_at>.<nonce>.<signature>`, signed over `<issued_at>.<nonce>`.
    fn login_token_at(&self, issued_at: u64) -> Result<String> {
        let payload = format!("{issued_at}.{}", generate_token()?);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    fn login_token_valid_at(&self, token: &str, now: u64) -> bool {
        let Some((payload, signature)) = token.rsplit_once('.') else {
            return false;
        };
        let Some(issued_at) = payload
            .split_once('.')
            .and_then(|(issued_at, _)| issued_at.parse::<u64>().ok())
        else {
            return false;
        };
        if issued_at > now || now - issued_at > LOGIN_TOKEN_TTL_SECS {
            return false;
        }
        let Ok(signature) = Base64UrlUnpadded::decode_vec(signature) else {
            return false;
        };
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).is_ok()
    }
}

impl CsrfGuard for SessionCsrfGuard {
    fn check(&self, session: Option<&SessionRecord>, submitted: Option<&str>) -> CsrfDecision {
        let Some(session) = session else {
            return CsrfDecision::Allowed;
        };
        match submitted {
            Some(token) if tokens_match(&session.csrf_token, token) => CsrfDecision::Allowed,
            _ => CsrfDecision::Rejected,
        }
    }

    fn form_token<'a>(&self, session: Option<&'a SessionRecord>) -> Option<&'a str> {
        session.map(|record| record.csrf_token.as_str())
    }

    fn issue_login_token(&self) -> Result<Option<String>> {
        self.login_token_at(unix_now()).map(Some)
    }

    fn check_login(&self, cookie: Option<&str>, submitted: Option<&str>) -> CsrfDecision {
        match (cookie, submitted) {
            (Some(cookie), Some(submitted))
                if tokens_match(cookie, submitted)
                    && self.login_token_valid_at(cookie, unix_now()) =>
            {
                CsrfDecision::Allowed
            }
            _ => CsrfDecision::Rejected,
        }
    }
}

fn tokens_match(expected: &str, submitted: &str) -> bool {
    expected.as_bytes().ct_eq(submitted.as_bytes()).into()
}

pub(crate) fn login_csrf_cookie(token: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{LOGIN_CSRF_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={LOGIN_TOKEN_TTL_SECS}"
    ))
}

pub(crate) fn clear_login_csrf_cookie() -> HeaderValue {
    HeaderValue::from_static("teller_csrf=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SessionRecord {
        SessionRecord {
            user_key: "test".to_string(),
            csrf_token: "expected-token".to_string(),
            created_at_unix: 0,
        }
    }

    fn guard() -> SessionCsrfGuard {
        SessionCsrfGuard::new(SecretString::from("secret_sauce"))
    }

    #[test]
    fn noop_guard_allows_everything() {
        let guard = NoopCsrfGuard;
        let session = record();
        assert_eq!(guard.check(Some(&session), None), CsrfDecision::Allowed);
        assert_eq!(guard.form_token(Some(&session)), None);
        assert_eq!(guard.issue_login_token().expect("no token"), None);
        assert_eq!(guard.check_login(None, None), CsrfDecision::Allowed);
    }

    #[test]
    fn session_guard_requires_matching_token() {
        let guard = guard();
        let session = record();
        assert_eq!(
            guard.check(Some(&session), Some("expected-token")),
            CsrfDecision::Allowed
        );
        assert_eq!(
            guard.check(Some(&session), Some("expected-tokem")),
            CsrfDecision::Rejected
        );
        assert_eq!(
            guard.check(Some(&session), Some("short")),
            CsrfDecision::Rejected
        );
        assert_eq!(guard.check(Some(&session), None), CsrfDecision::Rejected);
        assert_eq!(guard.form_token(Some(&session)), Some("expected-token"));
    }

    #[test]
    fn session_guard_skips_sessionless_requests() {
        let guard = guard();
        assert_eq!(guard.check(None, None), CsrfDecision::Allowed);
        assert_eq!(guard.form_token(None), None);
    }

    #[test]
    fn login_token_must_match_cookie() {
        let guard = guard();
        let token = guard
            .issue_login_token()
            .expect("token")
            .expect("csrf guard issues login tokens");
        let other = guard
            .issue_login_token()
            .expect("token")
            .expect("csrf guard issues login tokens");

        assert_eq!(
            guard.check_login(Some(&token), Some(&token)),
            CsrfDecision::Allowed
        );
        assert_eq!(
            guard.check_login(Some(&token), Some(&other)),
            CsrfDecision::Rejected
        );
        assert_eq!(guard.check_login(Some(&token), None), CsrfDecision::Rejected);
        assert_eq!(guard.check_login(None, Some(&token)), CsrfDecision::Rejected);
    }

    #[test]
    fn login_token_signed_with_another_key_is_rejected() {
        let token = SessionCsrfGuard::new(SecretString::from("another key"))
            .login_token_at(unix_now())
            .expect("token");
        assert_eq!(
            guard().check_login(Some(&token), Some(&token)),
            CsrfDecision::Rejected
        );
        assert_eq!(
            guard().check_login(Some("1.abc.def"), Some("1.abc.def")),
            CsrfDecision::Rejected
        );
    }

    #[test]
    fn login_token_expires() {
        let guard = guard();
        let token = guard.login_token_at(1_000).expect("token");
        assert!(guard.login_token_valid_at(&token, 1_000));
        assert!(guard.login_token_valid_at(&token, 1_000 + LOGIN_TOKEN_TTL_SECS));
        assert!(!guard.login_token_valid_at(&token, 1_001 + LOGIN_TOKEN_TTL_SECS));
        assert!(!guard.login_token_valid_at(&token, 999));
    }

    #[test]
    fn login_cookie_attributes() {
        let cookie = login_csrf_cookie("tok").expect("valid header");
        let cookie = cookie.to_str().expect("ascii");
        assert!(cookie.starts_with("teller_csrf=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(clear_login_csrf_cookie()
            .to_str()
            .expect("ascii")
            .contains("Max-Age=0"));
    }
}
