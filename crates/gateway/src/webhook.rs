//! Messaging-platform webhook: subscription handshake and signed event
//! delivery.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use tracing::{info, warn};

use crate::SharedState;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

/// Check an `X-Hub-Signature-256` value against the raw request body.
///
/// The value is lowercase hex, optionally prefixed with `sha256=`. The
/// comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let hex_sig = signature.trim();
    let hex_sig = hex_sig.strip_prefix("sha256=").unwrap_or(hex_sig);
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// `GET /webhook` subscription handshake.
pub async fn verify_handler(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token");
    let challenge = params.get("hub.challenge").cloned().unwrap_or_default();

    match (&state.verify_token, mode, token) {
        (Some(expected), Some("subscribe"), Some(token)) if token == expected => {
            info!("Webhook verified");
            (StatusCode::OK, challenge).into_response()
        }
        _ => {
            warn!(mode = ?mode, "Webhook verification failed");
            (StatusCode::FORBIDDEN, "Verification failed").into_response()
        }
    }
}

/// `POST /webhook` event delivery.
///
/// When an app secret is configured every event must carry a valid
/// signature. Events are acknowledged, not processed.
pub async fn receive_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    if let Some(secret) = &state.app_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(secret, &body, signature) {
            warn!("Invalid webhook signature");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "success": false, "error": "Invalid signature" })),
            );
        }
    }

    let event: Value = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Webhook body is not JSON");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": "Invalid JSON" })),
            );
        }
    };

    let entries = event
        .get("entry")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    info!(
        object = event.get("object").and_then(serde_json::Value::as_str).unwrap_or("unknown"),
        entries,
        "Webhook event received"
    );

    (StatusCode::OK, Json(json!({ "success": true })))
}
