use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::models::cafeteria;
use crate::models::user::{AccountResponse, Preferences, RegisterRequest};
use crate::routes::{api_error, ApiError};
use crate::services::accounts::AccountError;
use crate::services::email::EmailService;
use crate::AppState;

fn account_error(e: AccountError) -> ApiError {
    match e {
        AccountError::InvalidEmail(_) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        AccountError::NotFound(_) => api_error(StatusCode::NOT_FOUND, "Unknown account"),
        AccountError::Unauthorized => api_error(StatusCode::UNAUTHORIZED, "Invalid link"),
        AccountError::Store(e) => {
            error!("Account store error: {e}");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process request")
        }
    }
}

fn email_service(state: &AppState) -> Result<&EmailService, ApiError> {
    state
        .email
        .as_deref()
        .ok_or_else(|| api_error(StatusCode::SERVICE_UNAVAILABLE, "Email service unavailable"))
}

fn send_failed(e: anyhow::Error) -> ApiError {
    error!("Failed to send account email: {e:#}");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to send email")
}

/// POST /register: mails the login link.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = email_service(&state)?;
    let address = payload.email.trim();
    let key = state.accounts.register(address).map_err(account_error)?;
    email.send_login(address, &key).await.map_err(send_failed)?;
    Ok(Json(json!({ "success": true })))
}

/// GET /login/{email}/{key}: preferences plus the current matches.
pub async fn login(
    State(state): State<AppState>,
    Path((email, key)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let preferences = state.accounts.login(&email, &key).map_err(account_error)?;
    let results = match state
        .search
        .search_many(Some(preferences.queries.as_slice()), &preferences.cafeterias)
        .await
    {
        Ok(results) => Some(results),
        Err(e) => {
            warn!("Login for {email}: menu data unavailable: {e}");
            None
        }
    };
    let codes = cafeteria::encode_list(&preferences.cafeterias);
    let account = AccountResponse { email, preferences };
    Ok(Json(json!({
        "account": account,
        "cafeteria_codes": codes,
        "results": results,
    })))
}

/// PUT /edit/{email}/{key}
pub async fn edit(
    State(state): State<AppState>,
    Path((email, key)): Path<(String, String)>,
    Json(payload): Json<Preferences>,
) -> Result<Json<AccountResponse>, ApiError> {
    let preferences = state
        .accounts
        .update_preferences(&email, &key, &payload.queries, &payload.cafeterias)
        .map_err(account_error)?;
    Ok(Json(AccountResponse { email, preferences }))
}

/// POST /del/{email}/{key}: mails the deletion link.
pub async fn request_deletion(
    State(state): State<AppState>,
    Path((email, key)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let mailer = email_service(&state)?;
    let del_key = state
        .accounts
        .request_deletion(&email, &key)
        .map_err(account_error)?;
    mailer.send_delete(&email, &del_key).await.map_err(send_failed)?;
    Ok(Json(json!({ "success": true })))
}

/// GET /del/{email}/{del_key}
pub async fn confirm_deletion(
    State(state): State<AppState>,
    Path((email, del_key)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    state
        .accounts
        .confirm_deletion(&email, &del_key)
        .map_err(account_error)?;
    Ok(Json(json!({ "success": true })))
}
