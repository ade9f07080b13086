//! Bearer-token middleware backed by the session store.
//!
//! The bearer value is a session id; it is validated through the store's
//! constant-time scan. Every rejection looks identical to callers: 401 with
//! a `WWW-Authenticate` challenge pointing at the protected-resource
//! metadata document.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::counter;

use relay_core::ids::SessionId;
use relay_core::rpc::{REQUEST_REJECTED, error_body};
use relay_session::SessionStore;

/// State for [`require_bearer`].
#[derive(Clone)]
pub struct BearerAuth {
    store: Arc<SessionStore>,
    public_origin: String,
}

impl BearerAuth {
    /// `public_origin` is this server's externally visible origin, used to
    /// build the `resource_metadata` URL in the 401 challenge.
    pub fn new(store: Arc<SessionStore>, public_origin: impl Into<String>) -> Self {
        Self {
            store,
            public_origin: public_origin.into(),
        }
    }
}

/// Axum middleware requiring a live session id as the bearer token.
///
/// A successful check also refreshes the session's idle timer, so an
/// actively polling client stays authenticated up to the hard TTL.
pub async fn require_bearer(
    State(auth): State<BearerAuth>,
    request: Request,
    next: Next,
) -> Response {
    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    let Some(token) = bearer else {
        counter!("relay_auth_rejections_total", "kind" => "missing").increment(1);
        return unauthorized(&auth.public_origin);
    };

    let id = SessionId::from_raw(token);
    if auth.store.validate_session(&id).is_err() {
        counter!("relay_auth_rejections_total", "kind" => "invalid").increment(1);
        tracing::debug!(session_id = %id.redacted(), "bearer token rejected");
        return unauthorized(&auth.public_origin);
    }

    next.run(request).await
}

fn unauthorized(public_origin: &str) -> Response {
    let challenge = format!(
        "Bearer resource_metadata=\"{public_origin}/.well-known/oauth-protected-resource\""
    );
    let body = error_body(REQUEST_REJECTED, "Unauthorized");
    let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&challenge) {
        let _ = response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
    }
    response
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
