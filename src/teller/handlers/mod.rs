pub mod accounts;
pub use self::accounts::{accounts, update_accounts};

pub mod health;
pub use self::health::health;

pub mod homepage;
pub use self::homepage::{homepage, login};

pub mod logout;
pub use self::logout::logout;

pub mod not_found;
pub use self::not_found::not_found;

// common functions for the handlers
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use super::{error::Error, state::Variant, views};

/// Map a flow error to the response style of the running variant.
pub(crate) fn error_response(variant: Variant, err: &Error) -> Response {
    match err {
        Error::Unauthenticated | Error::InvalidCredentials => {
            if variant.not_found_errors() {
                (StatusCode::NOT_FOUND, Html(views::not_found_page())).into_response()
            } else {
                (StatusCode::UNAUTHORIZED, "Not authorized").into_response()
            }
        }
        Error::MalformedInput(reason) => {
            (StatusCode::BAD_REQUEST, format!("Bad Request: {reason}")).into_response()
        }
        Error::CsrfMismatch => (
            StatusCode::BAD_REQUEST,
            "The CSRF token is missing or invalid.",
        )
            .into_response(),
        Error::InvalidSeed(_) | Error::SeedJson(_) | Error::Internal(_) => {
            error!("request failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}
