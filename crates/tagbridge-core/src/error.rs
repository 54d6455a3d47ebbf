// ── Core error types ──
//
// Domain errors from tagbridge-core. Consumers never see HTTP status codes
// or JSON parse failures directly: the `From<tagbridge_api::Error>` impl
// translates transport-layer errors into connector-level variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Link errors ──────────────────────────────────────────────────
    #[error("Cannot connect to controller at {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Controller link is not connected")]
    NotConnected,

    #[error("Controller link fault: {reason}")]
    LinkFault { reason: String },

    #[error("Controller link event stream closed")]
    LinkClosed,

    #[error("Gave up connecting to {address} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        address: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Supervisor is shutting down")]
    Cancelled,

    // ── Collaborator errors ──────────────────────────────────────────
    #[error("Sink write failed: {message}")]
    Sink { message: String },

    #[error("Status indicator failed: {message}")]
    Indicator { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tagbridge_api::Error> for CoreError {
    fn from(err: tagbridge_api::Error) -> Self {
        match err {
            tagbridge_api::Error::Transport(ref e) if e.is_connect() || e.is_timeout() => {
                CoreError::ConnectionFailed {
                    address: e
                        .url()
                        .map_or_else(|| "<unknown>".into(), ToString::to_string),
                    reason: e.to_string(),
                }
            }
            tagbridge_api::Error::Transport(e) => CoreError::LinkFault {
                reason: e.to_string(),
            },
            tagbridge_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            tagbridge_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                address: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            tagbridge_api::Error::InvalidHeader(field) => CoreError::Config {
                message: format!("credential is not a valid {field} header"),
            },
            tagbridge_api::Error::Gateway { status, message } => CoreError::LinkFault {
                reason: format!("gateway returned HTTP {status}: {message}"),
            },
            tagbridge_api::Error::TagRead { tag, reason } => CoreError::LinkFault {
                reason: format!("read of '{tag}' failed: {reason}"),
            },
            tagbridge_api::Error::Store { status, message } => CoreError::Sink {
                message: format!("HTTP {status}: {message}"),
            },
            tagbridge_api::Error::Deserialization { message, body: _ } => CoreError::LinkFault {
                reason: format!("unreadable response: {message}"),
            },
        }
    }
}
