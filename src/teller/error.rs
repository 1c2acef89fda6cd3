use thiserror::Error;

/// Failures surfaced by the authentication and account flows.
///
/// Insufficient funds and unknown recipients are not errors: they leave the
/// balances untouched and are reported through [`super::account::Outcome`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("csrf token missing or invalid")]
    CsrfMismatch,
    #[error("invalid user seed: {0}")]
    InvalidSeed(String),
    #[error("invalid user seed json")]
    SeedJson(#[from] serde_json::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
