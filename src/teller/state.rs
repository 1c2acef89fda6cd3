//! Application configuration and shared request state.

use secrecy::SecretString;
use std::{fmt, str::FromStr, sync::Arc};

use super::{
    account::FundsGuard,
    auth::Authenticator,
    csrf::{CsrfGuard, NoopCsrfGuard, SessionCsrfGuard},
    session::SessionRegistry,
    store::{KeyKind, UserStore},
};

/// Behavioural flavour of the application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Variant {
    #[default]
    Basic,
    Csrf,
    Loader,
}

impl Variant {
    pub const ALL: [&'static str; 3] = ["basic", "csrf", "loader"];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Csrf => "csrf",
            Self::Loader => "loader",
        }
    }

    /// Which field of a user record identifies it inside a session.
    #[must_use]
    pub const fn key_kind(self) -> KeyKind {
        match self {
            Self::Basic | Self::Csrf => KeyKind::Username,
            Self::Loader => KeyKind::Id,
        }
    }

    #[must_use]
    pub const fn csrf_protected(self) -> bool {
        matches!(self, Self::Csrf)
    }

    /// Whether requests without a session may authenticate from form fields.
    #[must_use]
    pub const fn request_loader(self) -> bool {
        matches!(self, Self::Loader)
    }

    /// Account page moves money to another user instead of withdrawing.
    #[must_use]
    pub const fn transfers(self) -> bool {
        matches!(self, Self::Loader)
    }

    /// Auth failures render the not-found page instead of `401`.
    #[must_use]
    pub const fn not_found_errors(self) -> bool {
        matches!(self, Self::Loader)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "csrf" => Ok(Self::Csrf),
            "loader" => Ok(Self::Loader),
            other => Err(format!(
                "unknown variant '{other}', expected one of: {}",
                Self::ALL.join(", ")
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TellerConfig {
    variant: Variant,
    secret_key: SecretString,
    legacy_quirks: bool,
}

impl TellerConfig {
    #[must_use]
    pub fn new(secret_key: SecretString) -> Self {
        Self {
            variant: Variant::default(),
            secret_key,
            legacy_quirks: false,
        }
    }

    #[must_use]
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    /// Reproduce the inverted funds guard and the inverted request-loader
    /// password check of the `loader` variant.
    #[must_use]
    pub fn with_legacy_quirks(mut self, enabled: bool) -> Self {
        self.legacy_quirks = enabled;
        self
    }

    #[must_use]
    pub fn variant(&self) -> Variant {
        self.variant
    }

    #[must_use]
    pub fn legacy_quirks(&self) -> bool {
        self.legacy_quirks
    }

    pub(crate) fn secret_key(&self) -> &SecretString {
        &self.secret_key
    }

    /// Only the transfer flavour ever shipped the inverted guard.
    #[must_use]
    pub fn funds_guard(&self) -> FundsGuard {
        if self.legacy_quirks && self.variant == Variant::Loader {
            FundsGuard::Inverted
        } else {
            FundsGuard::Sufficient
        }
    }
}

/// Everything a handler needs, shared behind an `Arc` extension.
pub struct AppState {
    config: TellerConfig,
    store: Arc<UserStore>,
    authenticator: Authenticator,
    csrf: Arc<dyn CsrfGuard>,
}

impl AppState {
    #[must_use]
    pub fn new(config: TellerConfig, store: UserStore) -> Self {
        let store = Arc::new(store);
        let sessions = Arc::new(SessionRegistry::new(config.secret_key().clone()));
        let authenticator = Authenticator::new(
            store.clone(),
            sessions,
            config.variant().request_loader(),
            config.legacy_quirks(),
        );
        let csrf: Arc<dyn CsrfGuard> = if config.variant().csrf_protected() {
            Arc::new(SessionCsrfGuard::new(config.secret_key().clone()))
        } else {
            Arc::new(NoopCsrfGuard)
        };

        Self {
            config,
            store,
            authenticator,
            csrf,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TellerConfig {
        &self.config
    }

    #[must_use]
    pub fn variant(&self) -> Variant {
        self.config.variant()
    }

    #[must_use]
    pub fn store(&self) -> &UserStore {
        &self.store
    }

    #[must_use]
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub(crate) fn csrf(&self) -> &dyn CsrfGuard {
        self.csrf.as_ref()
    }
}
