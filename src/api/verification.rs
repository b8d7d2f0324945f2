use askama::Template;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;

use crate::api::AppState;
use crate::error::{AppError, CHAIN_FETCH_FAILED};
use crate::models::{AccountId, BlockNumber};
use crate::services::presentation::{self, EntryView};
use crate::services::qr_generator;

// Templates
#[derive(Template)]
#[template(path = "verify/home.html")]
struct VerifyHomeTemplate {
    account: String,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "verify/account.html")]
struct AccountTemplate {
    account: String,
    short_account: String,
    block_height: Option<BlockNumber>,
    entries: Vec<EntryView>,
    error: Option<String>,
    qr_data_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyForm {
    pub account: String,
}

/// Account entry form
async fn verify_home() -> VerifyHomeTemplate {
    VerifyHomeTemplate {
        account: String::new(),
        error: None,
    }
}

/// Validates the submitted address and redirects to its verification page
async fn submit_account(Form(form): Form<VerifyForm>) -> Response {
    match AccountId::parse(&form.account) {
        Ok(account) => Redirect::to(&format!("/verify/{}", account)).into_response(),
        Err(e) => {
            tracing::debug!(error = %e, "Rejected account submission");
            (
                StatusCode::BAD_REQUEST,
                VerifyHomeTemplate {
                    account: form.account,
                    error: Some(e.to_string()),
                },
            )
                .into_response()
        }
    }
}

/// Verification page listing every certificate of an account
async fn account_page(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Response, AppError> {
    let account = AccountId::parse(&account)?;

    // QR failures are logged and the page renders without it
    let qr_data_uri = qr_generator::generate_qr_data_uri(&state.config.verify_base_url, &account)
        .map_err(|e| tracing::warn!(error = %e, "Failed to render verification QR code"))
        .ok();

    let (status, template) = match state.resolver.resolve_all(&account).await {
        Ok(outcome) => (
            StatusCode::OK,
            AccountTemplate {
                account: account.to_string(),
                short_account: account.short(),
                block_height: Some(outcome.block_height),
                entries: presentation::entry_views(&outcome),
                error: None,
                qr_data_uri,
            },
        ),
        Err(e) => {
            tracing::error!(account = %account, error = %e, "Error loading certificates");
            (
                StatusCode::BAD_GATEWAY,
                AccountTemplate {
                    account: account.to_string(),
                    short_account: account.short(),
                    block_height: None,
                    entries: Vec::new(),
                    error: Some(CHAIN_FETCH_FAILED.to_string()),
                    qr_data_uri,
                },
            )
        }
    };

    Ok((status, template).into_response())
}

/// SVG QR code pointing at the account's verification page
async fn account_qr(
    State(state): State<AppState>,
    Path(account): Path<String>,
) -> Result<Response, AppError> {
    let account = AccountId::parse(&account)?;
    let svg = qr_generator::generate_qr_svg(&state.config.verify_base_url, &account)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/svg+xml")],
        svg,
    )
        .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/verify", get(verify_home).post(submit_account))
        .route("/verify/:account", get(account_page))
        .route("/verify/:account/qr", get(account_qr))
}
