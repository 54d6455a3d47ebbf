use thiserror::Error;

/// Top-level error type for the `tagbridge-api` crate.
///
/// Covers every failure mode of the HTTP collaborators: transport, the
/// tag gateway, and the row store. `tagbridge-core` maps these into
/// domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// A credential could not be encoded as an HTTP header value.
    #[error("Invalid header value for {0}")]
    InvalidHeader(&'static str),

    // ── Tag gateway ─────────────────────────────────────────────────
    /// Non-success HTTP status from the tag gateway.
    #[error("Gateway error (HTTP {status}): {message}")]
    Gateway { status: u16, message: String },

    /// The gateway answered but reported a per-tag read failure.
    #[error("Read of tag '{tag}' failed: {reason}")]
    TagRead { tag: String, reason: String },

    // ── Row store ───────────────────────────────────────────────────
    /// Non-success HTTP status from the row store.
    #[error("Store error (HTTP {status}): {message}")]
    Store { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}
