//! Login form and credential submission.

use axum::{
    extract::{Extension, Form},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
};
use std::{collections::HashMap, sync::Arc};
use tracing::{error, instrument, warn};

use super::error_response;
use crate::teller::{
    csrf::{
        clear_login_csrf_cookie, login_csrf_cookie, CsrfDecision, CSRF_FIELD,
        LOGIN_CSRF_COOKIE_NAME,
    },
    error::Error,
    session::{extract_cookie, extract_session_token, session_cookie},
    state::AppState,
    user, views,
};

pub async fn homepage(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Response {
    let authenticated = state
        .authenticator()
        .load_current_user(&headers, &HashMap::new())
        .await
        .is_some();

    if authenticated {
        return Redirect::to("/accounts").into_response();
    }

    let token = match state.csrf().issue_login_token() {
        Ok(token) => token,
        Err(err) => return error_response(state.variant(), &err),
    };
    let page = Html(views::login_page(token.as_deref()));

    let Some(token) = token else {
        return page.into_response();
    };
    match login_csrf_cookie(&token) {
        Ok(cookie) => ([(SET_COOKIE, cookie)], page).into_response(),
        Err(err) => {
            error!("Failed to build login CSRF cookie: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[instrument(skip_all)]
pub async fn login(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let variant = state.variant();

    let login_cookie = extract_cookie(&headers, LOGIN_CSRF_COOKIE_NAME);
    let submitted = fields.get(CSRF_FIELD).map(String::as_str);
    if state.csrf().check_login(login_cookie.as_deref(), submitted) == CsrfDecision::Rejected {
        warn!("Login rejected: CSRF token missing or invalid");
        return error_response(variant, &Error::CsrfMismatch);
    }

    let (Some(username), Some(password)) = (fields.get("username"), fields.get("password")) else {
        return error_response(variant, &Error::InvalidCredentials);
    };

    let authenticator = state.authenticator();
    let record = match authenticator.authenticate(username, password).await {
        Ok(record) => record,
        Err(err) => return error_response(variant, &err),
    };

    // A fresh login replaces whatever session the browser still carried.
    if let Some(previous) = extract_session_token(&headers) {
        authenticator.terminate_session(&previous).await;
    }

    let user = user::from_record(state.store().key_kind(), &record);
    let token = match authenticator.establish_session(user.as_ref()).await {
        Ok(token) => token,
        Err(err) => return error_response(variant, &err),
    };

    let mut response_headers = HeaderMap::new();
    match session_cookie(&token) {
        Ok(cookie) => {
            response_headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => {
            error!("Failed to build session cookie: {err}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }
    if login_cookie.is_some() {
        response_headers.append(SET_COOKIE, clear_login_csrf_cookie());
    }

    (response_headers, Redirect::to("/accounts")).into_response()
}
