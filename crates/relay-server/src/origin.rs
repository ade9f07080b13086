//! Origin / DNS-rebinding gate.
//!
//! A pure decision over the `Host` and `Origin` headers, consulted before
//! any RPC dispatch, plus the axum middleware that turns a rejection into
//! an HTTP 403 carrying a JSON-RPC error body.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use serde::{Deserialize, Serialize};
use url::Url;

use relay_core::errors::GateRejection;
use relay_core::rpc::{REQUEST_REJECTED, error_body};

/// Admission policy for cross-origin and rebound-host requests.
///
/// Immutable once built; construct via the presets or a struct literal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OriginConfig {
    /// Master switch. When false every request is admitted.
    pub enabled: bool,
    /// Exact-match allowlist; the single entry `"*"` admits any origin.
    pub allowed_origins: Vec<String>,
    /// Admit origins whose hostname is in the localhost family.
    pub allow_localhost: bool,
    /// Reject requests that carry no `Origin` header at all.
    pub strict: bool,
    /// Check the `Host` header hostname against `allowed_hosts`.
    pub dns_rebinding_protection: bool,
    /// Hostnames this server may be addressed as (no ports).
    pub allowed_hosts: Vec<String>,
}

impl OriginConfig {
    /// Permissive preset for local development: any origin, any host.
    pub fn development() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allow_localhost: true,
            strict: false,
            dns_rebinding_protection: false,
            allowed_hosts: Vec::new(),
        }
    }

    /// Strict preset: rejects everything until `allowed_origins` and
    /// `allowed_hosts` are populated by the operator.
    pub fn production() -> Self {
        Self {
            enabled: true,
            allowed_origins: Vec::new(),
            allow_localhost: false,
            strict: true,
            dns_rebinding_protection: true,
            allowed_hosts: Vec::new(),
        }
    }
}

/// Decide whether a request may proceed, first match wins.
///
/// The `Host` check runs before any Origin logic and independently of it: a
/// validated Origin on a rebound Host is still an attack. A malformed
/// `Origin` value never parses a hostname, so it falls through to rejection
/// rather than matching the localhost family.
pub fn validate_origin(headers: &HeaderMap, config: &OriginConfig) -> Result<(), GateRejection> {
    if !config.enabled {
        return Ok(());
    }

    if config.dns_rebinding_protection {
        if let Some(host) = header_str(headers, &header::HOST) {
            let hostname = host_without_port(host);
            if !config
                .allowed_hosts
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(hostname))
            {
                return Err(GateRejection::HostNotAllowed {
                    hostname: hostname.to_owned(),
                });
            }
        }
    }

    let Some(origin) = header_str(headers, &header::ORIGIN) else {
        if config.strict {
            return Err(GateRejection::OriginRequired);
        }
        return Ok(());
    };

    if config.allowed_origins.iter().any(|o| o == "*") {
        return Ok(());
    }
    if config.allowed_origins.iter().any(|o| o == origin) {
        return Ok(());
    }

    if config.allow_localhost {
        if let Some(hostname) = origin_hostname(origin) {
            if is_localhost(&hostname) {
                return Ok(());
            }
        }
    }

    Err(GateRejection::OriginNotAllowed {
        origin: origin.to_owned(),
    })
}

/// Axum middleware wrapping [`validate_origin`].
///
/// Rejections answer with HTTP 403 and a JSON-RPC error body; the reason
/// string is for operator logs, not for clients to branch on.
pub async fn origin_gate(
    State(config): State<Arc<OriginConfig>>,
    request: Request,
    next: Next,
) -> Response {
    match validate_origin(request.headers(), &config) {
        Ok(()) => next.run(request).await,
        Err(rejection) => {
            counter!("relay_gate_rejections_total", "kind" => rejection.error_kind())
                .increment(1);
            tracing::warn!(
                kind = rejection.error_kind(),
                reason = %rejection,
                "request rejected at the origin gate"
            );
            let body = error_body(REQUEST_REJECTED, &rejection.to_string());
            (StatusCode::FORBIDDEN, Json(body)).into_response()
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Hostname portion of a `Host` header value.
///
/// `example.com:8080` → `example.com`; `[::1]:8080` → `::1`.
fn host_without_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return &rest[..end];
        }
    }
    host.split_once(':').map_or(host, |(name, _)| name)
}

/// Lowercased hostname of an Origin value, `None` when it does not parse.
fn origin_hostname(origin: &str) -> Option<String> {
    let url = Url::parse(origin).ok()?;
    let host = url.host_str()?;
    Some(
        host.trim_start_matches('[')
            .trim_end_matches(']')
            .to_ascii_lowercase(),
    )
}

fn is_localhost(hostname: &str) -> bool {
    hostname == "localhost"
        || hostname == "127.0.0.1"
        || hostname == "::1"
        || hostname.ends_with(".localhost")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
