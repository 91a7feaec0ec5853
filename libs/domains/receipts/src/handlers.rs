use axum::{
    Json, Router,
    body::Bytes,
    extract::{Request, State},
    http::{Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{ReceiptError, ReceiptResult};
use crate::service::ReceiptService;
use crate::wire::ReceiptRequest;

#[derive(Debug, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub receipt_id: Uuid,
    pub message: String,
}

/// Create the intake router
pub fn router(service: Arc<ReceiptService>) -> Router {
    Router::new()
        .route("/v1/receipt", post(create_receipt))
        .route_layer(middleware::from_fn(require_json))
        .with_state(service)
}

/// Reject anything but `application/json` before the body is read. Other methods
/// pass through so they get the router's 405.
async fn require_json(request: Request, next: Next) -> Response {
    if request.method() != Method::POST {
        return next.run(request).await;
    }

    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"));

    if !is_json {
        info!(method = %request.method(), uri = %request.uri(), "invalid media type");
        return ReceiptError::UnsupportedMediaType.into_response();
    }
    next.run(request).await
}

async fn create_receipt(
    State(service): State<Arc<ReceiptService>>,
    body: Bytes,
) -> ReceiptResult<impl IntoResponse> {
    let request: ReceiptRequest = serde_json::from_slice(&body).map_err(|e| {
        info!(error = %e, "invalid json");
        ReceiptError::InvalidJson(e.to_string())
    })?;

    let receipt_id = service.accept(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(AcceptedResponse {
            receipt_id,
            message: "Accept".to_string(),
        }),
    ))
}
