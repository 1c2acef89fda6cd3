//! Credential checks and caller resolution.
//!
//! Flow Overview: a login form is checked against the store and, on success,
//! a session is established. Later requests are resolved by the strategies in
//! order: the session cookie first, then (when enabled) the `username` and
//! `password` fields of the request form itself.

use axum::http::HeaderMap;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info, warn};

use super::{
    error::{Error, Result},
    session::{extract_session_token, SessionRecord, SessionRegistry},
    store::{UserRecord, UserStore},
    user::{self, CurrentUser, SessionUser},
};

/// How the caller of a request was recognised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Session,
    RequestForm,
}

#[derive(Clone, Debug)]
pub struct Authenticated {
    pub user: CurrentUser,
    pub channel: Channel,
    /// Present when the caller came in through a session cookie.
    pub session: Option<SessionRecord>,
}

/// What a strategy may look at when resolving the caller.
#[derive(Clone, Copy, Debug)]
pub struct RequestCredentials<'a> {
    pub session_token: Option<&'a str>,
    pub form: &'a HashMap<String, String>,
}

#[allow(async_fn_in_trait)]
pub trait AuthStrategy {
    fn channel(&self) -> Channel;

    async fn resolve(
        &self,
        request: &RequestCredentials<'_>,
        store: &UserStore,
    ) -> Option<Authenticated>;
}

pub struct SessionLoader {
    sessions: Arc<SessionRegistry>,
}

impl SessionLoader {
    #[must_use]
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self { sessions }
    }
}

impl AuthStrategy for SessionLoader {
    fn channel(&self) -> Channel {
        Channel::Session
    }

    async fn resolve(
        &self,
        request: &RequestCredentials<'_>,
        store: &UserStore,
    ) -> Option<Authenticated> {
        let token = request.session_token?;
        let record = self.sessions.lookup(token).await?;
        // Sessions pointing at a vanished user are anonymous.
        let Some(stored) = store.find(&record.user_key).await else {
            debug!("session refers to unknown user {}", record.user_key);
            return None;
        };
        Some(Authenticated {
            user: user::from_record(store.key_kind(), &stored),
            channel: self.channel(),
            session: Some(record),
        })
    }
}

pub struct RequestLoader {
    inverted_password_check: bool,
}

impl RequestLoader {
    #[must_use]
    pub fn new(inverted_password_check: bool) -> Self {
        Self {
            inverted_password_check,
        }
    }

    fn password_accepted(&self, stored: &str, submitted: &str) -> bool {
        if self.inverted_password_check {
            stored != submitted
        } else {
            stored == submitted
        }
    }
}

impl AuthStrategy for RequestLoader {
    fn channel(&self) -> Channel {
        Channel::RequestForm
    }

    async fn resolve(
        &self,
        request: &RequestCredentials<'_>,
        store: &UserStore,
    ) -> Option<Authenticated> {
        let username = request.form.get("username")?;
        let password = request.form.get("password")?;
        let stored = store.find_by_username(username).await?;
        if !self.password_accepted(&stored.password, password) {
            return None;
        }
        Some(Authenticated {
            user: user::from_record(store.key_kind(), &stored),
            channel: self.channel(),
            session: None,
        })
    }
}

pub struct Authenticator {
    store: Arc<UserStore>,
    sessions: Arc<SessionRegistry>,
    session_loader: SessionLoader,
    request_loader: Option<RequestLoader>,
}

impl Authenticator {
    #[must_use]
    pub fn new(
        store: Arc<UserStore>,
        sessions: Arc<SessionRegistry>,
        request_loader: bool,
        legacy_quirks: bool,
    ) -> Self {
        Self {
            store,
            session_loader: SessionLoader::new(sessions.clone()),
            sessions,
            request_loader: request_loader.then(|| RequestLoader::new(legacy_quirks)),
        }
    }

    /// Check a login form against the store.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCredentials`] unless the username exists and the
    /// password is exactly equal to the stored one.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<UserRecord> {
        match self.store.find_by_username(username).await {
            Some(record) if record.password == password => {
                info!("login succeeded for {username}");
                Ok(record)
            }
            _ => {
                warn!("login failed for {username}");
                Err(Error::InvalidCredentials)
            }
        }
    }

    /// Bind a new session to `user` and return the raw token for the cookie.
    ///
    /// # Errors
    /// Returns an error if a token cannot be generated.
    pub async fn establish_session(&self, user: &dyn SessionUser) -> Result<String> {
        let (token, _) = self.sessions.establish(&user.id()).await?;
        Ok(token)
    }

    pub async fn terminate_session(&self, token: &str) {
        self.sessions.terminate(token).await;
    }

    /// Resolve the caller, trying the session before the request form.
    pub async fn load_current_user(
        &self,
        headers: &HeaderMap,
        form: &HashMap<String, String>,
    ) -> Option<Authenticated> {
        let token = extract_session_token(headers);
        let request = RequestCredentials {
            session_token: token.as_deref(),
            form,
        };

        if let Some(found) = self.session_loader.resolve(&request, &self.store).await {
            return Some(found);
        }

        match &self.request_loader {
            Some(loader) => loader.resolve(&request, &self.store).await,
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teller::{state::Variant, store::KeyKind};
    use axum::http::{header::COOKIE, HeaderValue};
    use secrecy::SecretString;

    fn authenticator(variant: Variant, legacy_quirks: bool) -> Authenticator {
        let store = Arc::new(
            UserStore::new(variant.key_kind(), UserStore::seed(variant)).expect("seed is valid"),
        );
        let sessions = Arc::new(SessionRegistry::new(SecretString::from("secret_sauce")));
        Authenticator::new(store, sessions, variant.request_loader(), legacy_quirks)
    }

    fn cookie_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("teller_session={token}")).expect("valid cookie"),
        );
        headers
    }

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn authenticate_requires_exact_match() {
        let auth = authenticator(Variant::Basic, false);
        assert!(auth.authenticate("test", "test").await.is_ok());
        assert!(matches!(
            auth.authenticate("test", "Test").await,
            Err(Error::InvalidCredentials)
        ));
        assert!(matches!(
            auth.authenticate("nobody", "test").await,
            Err(Error::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn session_round_trip_resolves_user() {
        let auth = authenticator(Variant::Basic, false);
        let record = auth.authenticate("test", "test").await.expect("valid");
        let user = user::from_record(KeyKind::Username, &record);
        let token = auth.establish_session(user.as_ref()).await.expect("token");

        let found = auth
            .load_current_user(&cookie_headers(&token), &HashMap::new())
            .await
            .expect("authenticated");
        assert_eq!(found.channel, Channel::Session);
        assert_eq!(found.user.username(), "test");
        assert!(found.session.is_some());

        auth.terminate_session(&token).await;
        assert!(auth
            .load_current_user(&cookie_headers(&token), &HashMap::new())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn basic_variant_ignores_form_credentials() {
        let auth = authenticator(Variant::Basic, false);
        let fields = form(&[("username", "test"), ("password", "test")]);
        assert!(auth
            .load_current_user(&HeaderMap::new(), &fields)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn loader_variant_falls_back_to_form() {
        let auth = authenticator(Variant::Loader, false);
        let fields = form(&[("username", "alice"), ("password", "alice")]);
        let found = auth
            .load_current_user(&HeaderMap::new(), &fields)
            .await
            .expect("form credentials accepted");
        assert_eq!(found.channel, Channel::RequestForm);
        assert_eq!(found.user.id(), "2");
        assert!(found.session.is_none());

        let wrong = form(&[("username", "alice"), ("password", "nope")]);
        assert!(auth
            .load_current_user(&HeaderMap::new(), &wrong)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn session_wins_over_form() {
        let auth = authenticator(Variant::Loader, false);
        let record = auth.authenticate("test", "test").await.expect("valid");
        let user = user::from_record(KeyKind::Id, &record);
        let token = auth.establish_session(user.as_ref()).await.expect("token");
        let fields = form(&[("username", "alice"), ("password", "alice")]);

        let found = auth
            .load_current_user(&cookie_headers(&token), &fields)
            .await
            .expect("authenticated");
        assert_eq!(found.channel, Channel::Session);
        assert_eq!(found.user.username(), "test");
    }

    #[tokio::test]
    async fn legacy_loader_accepts_wrong_passwords_only() {
        let auth = authenticator(Variant::Loader, true);
        let wrong = form(&[("username", "alice"), ("password", "nope")]);
        let right = form(&[("username", "alice"), ("password", "alice")]);
        assert!(auth
            .load_current_user(&HeaderMap::new(), &wrong)
            .await
            .is_some());
        assert!(auth
            .load_current_user(&HeaderMap::new(), &right)
            .await
            .is_none());
    }
}
