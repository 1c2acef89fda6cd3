//! # Teller (login and balance demo)
//!
//! `teller` is a small server-rendered banking demo: a login form, a balance
//! page and a way to move money out of the account. Users live in an
//! in-memory store seeded at start-up; nothing is persisted.
//!
//! ## Variants
//!
//! The same application ships in three flavours selected with `--variant`:
//!
//! - **`basic`:** username-keyed users, withdrawals, `401 Not authorized` on
//!   failure.
//! - **`csrf`:** like `basic`, but every mutating `POST` must carry a CSRF
//!   token: the session's token on `/accounts`, and a signed login token
//!   (mirrored in the `teller_csrf` cookie) on the login form.
//! - **`loader`:** id-keyed users, transfers between accounts, a rendered
//!   not-found page on failure, and a second authentication channel that reads
//!   `username`/`password` from the request form when no session is present.
//!
//! ## Sessions
//!
//! Session tokens are random and only their HMAC (keyed with `--secret-key`)
//! is kept server side. Logging out drops the record, so replaying an old
//! cookie does not authenticate.

pub mod cli;
pub mod teller;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
