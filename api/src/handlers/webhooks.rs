//! Webhook handlers
//!
//! The CI system reports finished runs here.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::domain::entities::SoftwarePkgId;
use crate::error::{AppError, DomainError};
use crate::AppState;

pub const SIGNATURE_HEADER: &str = "X-Signature";

/// CI completion payload
#[derive(Debug, Deserialize)]
pub struct CiWebhookPayload {
    pub pkg_id: Uuid,
    /// Run id the result belongs to
    pub ci_id: i64,
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct CiWebhookResponse {
    pub status: &'static str,
}

/// Verify HMAC-SHA256 signature
fn verify_signature(payload: &[u8], signature: Option<&str>, secret: &Option<String>) -> bool {
    let Some(secret) = secret else {
        // No secret configured, skip verification (development mode)
        tracing::warn!("Webhook secret not configured, skipping signature verification");
        return true;
    };

    let Some(sig_header) = signature else {
        tracing::warn!("No signature provided in webhook request");
        return false;
    };

    // "sha256=<hex>" or bare hex
    let expected_hex = sig_header.strip_prefix("sha256=").unwrap_or(sig_header);

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => {
            tracing::error!("Invalid webhook secret key");
            return false;
        }
    };

    mac.update(payload);

    let expected_bytes = match hex::decode(expected_hex) {
        Ok(bytes) => bytes,
        Err(_) => {
            tracing::warn!("Invalid signature format");
            return false;
        }
    };

    mac.verify_slice(&expected_bytes).is_ok()
}

/// POST /webhooks/ci
///
/// Record a finished CI run. Results for superseded runs are acknowledged
/// and ignored.
pub async fn ci_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<CiWebhookResponse>), AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok());

    if !verify_signature(&body, signature, &state.config.webhook_secret) {
        tracing::warn!("Webhook signature verification failed");
        return Err(AppError::Unauthorized);
    }

    let payload: CiWebhookPayload = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Failed to parse webhook payload");
        AppError::BadRequest(format!("Invalid JSON: {}", e))
    })?;

    tracing::info!(
        pkg_id = %payload.pkg_id,
        ci_id = payload.ci_id,
        success = payload.success,
        "Received CI result"
    );

    let status = match state
        .ci_service
        .done(&SoftwarePkgId(payload.pkg_id), payload.ci_id, payload.success)
        .await
    {
        Ok(()) => "recorded",
        Err(DomainError::CiIsUnmatched) => {
            tracing::info!(
                pkg_id = %payload.pkg_id,
                ci_id = payload.ci_id,
                "Ignoring result of a superseded CI run"
            );
            "ignored"
        }
        Err(e) => return Err(e.into()),
    };

    Ok((StatusCode::OK, Json(CiWebhookResponse { status })))
}
