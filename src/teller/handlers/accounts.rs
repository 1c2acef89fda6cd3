//! Balance page and balance mutations.

use axum::{
    extract::{Extension, Form},
    http::HeaderMap,
    response::{Html, IntoResponse, Response},
};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, instrument};

use super::error_response;
use crate::teller::{
    account::{self, Receipt},
    auth::Authenticated,
    csrf::{CsrfDecision, CSRF_FIELD},
    error::{Error, Result},
    state::AppState,
    views::{self, AccountsPage},
};

pub async fn accounts(headers: HeaderMap, state: Extension<Arc<AppState>>) -> Response {
    let Some(caller) = state
        .authenticator()
        .load_current_user(&headers, &HashMap::new())
        .await
    else {
        return error_response(state.variant(), &Error::Unauthenticated);
    };

    render(&state, &caller).await
}

#[instrument(skip_all)]
pub async fn update_accounts(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let variant = state.variant();
    let Some(caller) = state
        .authenticator()
        .load_current_user(&headers, &fields)
        .await
    else {
        return error_response(variant, &Error::Unauthenticated);
    };

    let submitted = fields.get(CSRF_FIELD).map(String::as_str);
    if state.csrf().check(caller.session.as_ref(), submitted) == CsrfDecision::Rejected {
        return error_response(variant, &Error::CsrfMismatch);
    }

    match apply(&state, &caller, &fields).await {
        Ok(receipt) => {
            debug!("account update outcome: {:?}", receipt.outcome);
            render(&state, &caller).await
        }
        Err(err) => error_response(variant, &err),
    }
}

async fn apply(
    state: &AppState,
    caller: &Authenticated,
    fields: &HashMap<String, String>,
) -> Result<Receipt> {
    let amount = account::parse_integer("amount", fields.get("amount").map(String::as_str))?;
    let guard = state.config().funds_guard();

    if state.variant().transfers() {
        let recipient =
            account::parse_integer("account", fields.get("account").map(String::as_str))?;
        account::transfer(
            state.store(),
            caller.user.as_ref(),
            &recipient.to_string(),
            amount,
            guard,
        )
        .await
    } else {
        account::withdraw(state.store(), caller.user.as_ref(), amount, guard).await
    }
}

async fn render(state: &AppState, caller: &Authenticated) -> Response {
    let balance = match account::view_balance(state.store(), caller.user.as_ref()).await {
        Ok(balance) => balance,
        Err(err) => return error_response(state.variant(), &err),
    };

    let page = AccountsPage {
        username: caller.user.username(),
        balance,
        transfers: state.variant().transfers(),
        csrf_token: state.csrf().form_token(caller.session.as_ref()),
    };

    Html(views::accounts_page(&page)).into_response()
}
