//! Mock mail API
//!
//! `POST /v1/email` accepts `{sender, to, subject, textContent}`, logs the message
//! and answers `201 {"messageId"}`. Requests over the configured rate get `429`
//! with `Retry-After`, which exercises the sender's throttling path.

pub mod config;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use config::NotifierConfig;
use core_config::FromEnv;
use core_config::tracing::{init_tracing, install_color_eyre};
use eyre::WrapErr;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

const BANNER: &str = r"
  __  __            _      _   _       _   _  __ _
 |  \/  | ___   ___| | __ | \ | | ___ | |_(_)/ _(_) ___ _ __
 | |\/| |/ _ \ / __| |/ / |  \| |/ _ \| __| | |_| |/ _ \ '__|
 | |  | | (_) | (__|   <  | |\  | (_) | |_| |  _| |  __/ |
 |_|  |_|\___/ \___|_|\_\ |_| \_|\___/ \__|_|_| |_|\___|_|
";

#[derive(Debug, Serialize, Deserialize)]
pub struct Address {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendEmail {
    #[serde(default)]
    pub sender: Option<Address>,
    #[serde(default)]
    pub to: Vec<Address>,
    #[serde(default)]
    pub subject: String,
    #[serde(rename = "textContent", default)]
    pub text_content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageCreated {
    #[serde(rename = "messageId")]
    pub message_id: Uuid,
}

/// Per-second limit with a burst of one; `None` lets everything through.
#[derive(Clone)]
pub struct Limiter {
    inner: Option<Arc<DefaultDirectRateLimiter>>,
    limit: u32,
}

impl Limiter {
    pub fn new(per_second: i64) -> Self {
        let limit = u32::try_from(per_second).ok().and_then(NonZeroU32::new);
        Self {
            inner: limit.map(|l| Arc::new(RateLimiter::direct(Quota::per_second(l).allow_burst(NonZeroU32::MIN)))),
            limit: limit.map_or(0, NonZeroU32::get),
        }
    }

    fn allow(&self) -> bool {
        self.inner.as_ref().is_none_or(|limiter| limiter.check().is_ok())
    }
}

fn too_many_requests(limit: u32) -> Response {
    let mut response = (StatusCode::TOO_MANY_REQUESTS, "too many requests").into_response();
    let headers = response.headers_mut();
    headers.insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
    response
}

async fn send_email(State(limiter): State<Limiter>, body: Bytes) -> Response {
    if !limiter.allow() {
        info!("Request limited");
        return too_many_requests(limiter.limit);
    }

    let message: SendEmail = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            info!(error = %e, "invalid JSON");
            return (StatusCode::BAD_REQUEST, "invalid JSON").into_response();
        }
    };

    let Some(to) = message.to.first() else {
        info!("empty field: 'to'");
        return (StatusCode::BAD_REQUEST, "empty field: 'to'").into_response();
    };

    let message_id = Uuid::new_v4();
    debug!(
        message_id = %message_id,
        from = message.sender.as_ref().map_or("", |s| s.email.as_str()),
        to = %to.email,
        subject = %message.subject,
        bytes = message.text_content.len(),
        "Send message"
    );

    (StatusCode::CREATED, Json(MessageCreated { message_id })).into_response()
}

pub fn router(rate_limit: i64) -> Router {
    Router::new()
        .route("/v1/email", post(send_email))
        .with_state(Limiter::new(rate_limit))
        .layer(TraceLayer::new_for_http())
}

pub async fn run() -> eyre::Result<()> {
    install_color_eyre();

    let config = NotifierConfig::from_env().wrap_err("failed to load configuration")?;
    init_tracing(&config.environment, &config.log_level);

    println!("{BANNER}");
    info!(config = ?config, "Configuration loaded");

    let bind = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .wrap_err_with(|| format!("failed to bind {bind}"))?;
    info!(addr = %listener.local_addr()?, rate_limit = config.rate_limit, "Mock notifier listening");

    axum::serve(listener, router(config.rate_limit))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("HTTP server error")?;

    info!("Mock notifier stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C signal, shutting down gracefully");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn request(body: &str) -> Request<Body> {
        Request::post("/v1/email")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    const VALID: &str =
        r#"{"sender":{"email":"receipts@example.com"},"to":[{"email":"user@example.com"}],"subject":"s","textContent":"t"}"#;

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_message_is_created() {
        let response = router(0).oneshot(request(VALID)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let created: MessageCreated = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(!created.message_id.is_nil());
    }

    #[tokio::test]
    async fn test_invalid_json_is_rejected() {
        let response = router(0).oneshot(request("{not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "invalid JSON");
    }

    #[tokio::test]
    async fn test_missing_recipient_is_rejected() {
        let response = router(0)
            .oneshot(request(r#"{"sender":{"email":"a@b.c"},"to":[],"subject":"s","textContent":"t"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "empty field: 'to'");
    }

    #[tokio::test]
    async fn test_over_limit_request_gets_429() {
        let app = router(1);

        let first = app.clone().oneshot(request(VALID)).await.unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app.oneshot(request(VALID)).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()[header::RETRY_AFTER], "1");
        assert_eq!(second.headers()["x-ratelimit-limit"], "1");
        assert_eq!(body_text(second).await, "too many requests");
    }

    #[test]
    fn test_non_positive_limit_disables_limiting() {
        let limiter = Limiter::new(-5);
        assert!((0..100).all(|_| limiter.allow()));
    }
}
