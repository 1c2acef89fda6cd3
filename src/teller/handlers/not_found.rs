use axum::{
    extract::Extension,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::sync::Arc;

use crate::teller::{state::AppState, views};

pub async fn not_found(state: Extension<Arc<AppState>>) -> Response {
    if state.variant().not_found_errors() {
        (StatusCode::NOT_FOUND, Html(views::not_found_page())).into_response()
    } else {
        (StatusCode::NOT_FOUND, "Not Found").into_response()
    }
}
