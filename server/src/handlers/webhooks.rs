use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;

use crate::payment::webhook::SIGNATURE_HEADER;
use crate::utils::error::AppResult;
use crate::utils::response::success;
use crate::AppState;

/// Takes the raw body: the signature covers the exact bytes sent.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state.orders.handle_webhook(&body, signature).await?;
    Ok(success(outcome, "Webhook processed"))
}
