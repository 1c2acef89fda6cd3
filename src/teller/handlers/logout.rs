use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use std::{collections::HashMap, sync::Arc};

use super::error_response;
use crate::teller::{
    error::Error,
    session::{clear_session_cookie, extract_session_token},
    state::AppState,
};

pub async fn logout(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Response {
    let authenticator = state.authenticator();
    if authenticator
        .load_current_user(&headers, &HashMap::new())
        .await
        .is_none()
    {
        return error_response(state.variant(), &Error::Unauthenticated);
    }

    if let Some(token) = extract_session_token(&headers) {
        authenticator.terminate_session(&token).await;
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, clear_session_cookie());

    (response_headers, Redirect::to("/")).into_response()
}
