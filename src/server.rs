//! HTTP front end for reverse-proxy auth subrequests.
//!
//! Provides two endpoints:
//! - `/` - liveness greeting
//! - `/allowbycountry/:country/:ip` - 200 or 403 with a `{code, text}` JSON body

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::decision::DecisionEngine;
use crate::{Error, Result};

/// Shared state for the handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
}

/// JSON reply for `/allowbycountry`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: String,
}

/// Build the router.
pub fn router(engine: Arc<DecisionEngine>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/allowbycountry/:country/:ip", get(allow_by_country_handler))
        .layer(middleware::from_fn(access_log))
        .with_state(AppState { engine })
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: &str, engine: Arc<DecisionEngine>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        Error::Config(format!("failed to bind listener to {}: {}", addr, e))
    })?;

    log::info!("Listening on {}", addr);

    axum::serve(listener, router(engine)).await?;
    Ok(())
}

async fn index_handler() -> &'static str {
    "Welcome!\n"
}

async fn allow_by_country_handler(
    State(state): State<AppState>,
    Path((country, ip)): Path<(String, String)>,
) -> Response {
    let verdict = state.engine.evaluate(&country, &ip);
    let status = if verdict.allowed() {
        StatusCode::OK
    } else {
        StatusCode::FORBIDDEN
    };
    let reply = Reply {
        code: status.as_u16(),
        text: verdict.text(),
    };
    (status, Json(reply)).into_response()
}

/// Log the request URI and the proxy-supplied client address.
async fn access_log(request: Request, next: Next) -> Response {
    let real_ip = request
        .headers()
        .get("X-Real-IP")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    log::info!("RequestURI={} X-Real-IP={}", request.uri(), real_ip);
    next.run(request).await
}
