pub mod config;

use axum::{
    extract::State,
    http::{header, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use vocanvas_engine::Engine;
use vocanvas_protocol::{WebhookRequest, WebhookResponse};

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    /// Replaces the request `Host` header when rendering the canvas page URL.
    pub public_host: Option<String>,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            public_host: None,
        }
    }
}

pub fn build_router(state: AppState, allow_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .with_state(Arc::new(state))
        // The canvas page is served from elsewhere; only it and local dev servers
        // may call in from a browser.
        .layer(canvas_cors(allow_origins.to_vec()))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "sources": state.engine.config().sources(),
    }))
}

async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<WebhookRequest>,
) -> Json<WebhookResponse> {
    let hostname = state
        .public_host
        .clone()
        .or_else(|| request_host(&headers));
    tracing::info!(
        action = %req.action,
        locale = %req.locale,
        consecutive = req.consecutive,
        "webhook turn"
    );
    Json(state.engine.respond(&req, hostname.as_deref()))
}

fn request_host(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}

pub async fn serve(addr: SocketAddr, state: AppState, allow_origins: &[String]) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_listener(listener, state, allow_origins, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    })
    .await?;
    Ok(())
}

pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    state: AppState,
    allow_origins: &[String],
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<SocketAddr> {
    let app = build_router(state, allow_origins);
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "webhook listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(addr)
}

fn canvas_cors(allow_origins: Vec<String>) -> CorsLayer {
    use axum::http::HeaderValue;
    use axum::http::Method;

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _req| {
            is_allowed_origin(origin, &allow_origins)
        }))
}

fn is_allowed_origin(origin: &axum::http::HeaderValue, allow_origins: &[String]) -> bool {
    let Ok(s) = origin.to_str() else {
        return false;
    };

    if allow_origins.iter().any(|o| o.trim_end_matches('/') == s) {
        return true;
    }

    // Dev server and local reverse proxies.
    is_http_origin_for_host(s, "localhost") || is_http_origin_for_host(s, "127.0.0.1")
}

fn is_http_origin_for_host(origin: &str, host: &str) -> bool {
    for scheme in ["http://", "https://"] {
        if let Some(rest) = origin.strip_prefix(scheme) {
            if let Some(after) = rest.strip_prefix(host) {
                // Origin is just scheme://host[:port]
                return after.is_empty() || after.starts_with(':');
            }
        }
    }
    false
}

#[cfg(test)]
mod tests;
