//! Typed error hierarchies for the relay transport, session, and gate layers.

/// Errors surfaced by the streaming transport and RPC extraction path.
///
/// Malformed frames never appear here: an event whose payload is not a
/// JSON-RPC envelope is silently skipped during extraction, not reported.
#[derive(Clone, Debug, thiserror::Error)]
pub enum TransportError {
    // Terminal — the stream completed but carried no answer
    #[error("no result found in stream")]
    NoResult,
    /// The server answered the request with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    // Retryable
    #[error("stream interrupted: {0}")]
    Stream(String),
    #[error("network error: {0}")]
    Network(String),

    // Fatal
    #[error("unexpected response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Whether the caller may reasonably retry the whole request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Stream(_) | Self::Network(_))
    }

    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::NoResult => "no_result",
            Self::Rpc { .. } => "rpc_error",
            Self::Stream(_) => "stream_interrupted",
            Self::Network(_) => "network_error",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Session store lookup failure.
///
/// Deliberately a single variant: unknown, TTL-expired, and idle-expired
/// sessions are indistinguishable to callers so responses leak nothing about
/// why a given id was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
}

/// Request admission failure from the origin / DNS-rebinding gate.
///
/// The `Display` strings are the operator-facing rejection reasons carried
/// in the 403 response body.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GateRejection {
    #[error("Host not allowed: {hostname}")]
    HostNotAllowed { hostname: String },
    #[error("Origin header required in strict mode")]
    OriginRequired,
    #[error("Origin not allowed: {origin}")]
    OriginNotAllowed { origin: String },
}

impl GateRejection {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::HostNotAllowed { .. } => "host_not_allowed",
            Self::OriginRequired => "origin_required",
            Self::OriginNotAllowed { .. } => "origin_not_allowed",
        }
    }
}
