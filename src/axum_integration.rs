//! HTTP surface for the authorizer
//!
//! - `POST /authorize` takes a TOKEN authorizer event and returns the decision
//!   document. A deny is a normal `200` response.
//! - `GET /health` returns `ok`.
//!
//! # Example
//!
//! ```rust,ignore
//! use scope_authorizer::axum_integration::router;
//!
//! let app = router(Arc::new(authorizer));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthorizationDecision, Authorizer, TokenAuthorizerEvent};

/// Raw `Authorization` header value, if present and valid UTF-8
pub fn authorization_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

/// Build the router serving `/authorize` and `/health`
pub fn router(authorizer: Arc<Authorizer>) -> Router {
    Router::new()
        .route("/authorize", post(authorize))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(authorizer)
}

/// Events without `authorizationToken` fall back to the request's own header
async fn authorize(
    State(authorizer): State<Arc<Authorizer>>,
    headers: HeaderMap,
    Json(mut event): Json<TokenAuthorizerEvent>,
) -> Json<AuthorizationDecision> {
    if event.authorization_token.is_empty() {
        if let Some(header) = authorization_header(&headers) {
            event.authorization_token = header;
        }
    }
    Json(authorizer.authorize(&event).await)
}

async fn health() -> &'static str {
    "ok"
}
