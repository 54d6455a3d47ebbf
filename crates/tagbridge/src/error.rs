//! Binary error types with miette diagnostics.
//!
//! Maps configuration and core failures into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use tagbridge_config::ConfigError;
use tagbridge_core::CoreError;

/// Process exit codes. `0` follows a requested shutdown; clap exits with
/// `2` on usage errors.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 3;
    pub const CREDENTIALS: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum AppError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(tagbridge::no_config),
        help("Pass an existing file with --config, or omit it to use {default}")
    )]
    ConfigNotFound { path: String, default: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(
        code(tagbridge::validation),
        help("Run: tagbridge check-config --print to see the effective configuration")
    )]
    Validation { field: String, reason: String },

    #[error("No API key for sink table '{table}'")]
    #[diagnostic(
        code(tagbridge::no_credentials),
        help(
            "Set sink.api_key_env to the name of an environment variable holding the key,\n\
             or TAGBRIDGE_SINK__API_KEY. Use --dry-run to run without a store."
        )
    )]
    NoCredentials { table: String },

    #[error("Configuration could not be loaded")]
    #[diagnostic(code(tagbridge::config))]
    Config(#[source] ConfigError),

    // ── Controller ───────────────────────────────────────────────────
    #[error("Gave up connecting to controller at {address} after {attempts} attempts")]
    #[diagnostic(
        code(tagbridge::retries_exhausted),
        help(
            "Last error: {last_error}\n\
             Check the controller address and network path, or raise retry.max_attempts."
        )
    )]
    RetriesExhausted {
        address: String,
        attempts: u32,
        last_error: String,
    },

    #[error(transparent)]
    #[diagnostic(code(tagbridge::core))]
    Core(CoreError),

    #[error("I/O error: {0}")]
    #[diagnostic(code(tagbridge::io))]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigNotFound { .. } | Self::Validation { .. } | Self::Config(_) => {
                exit_code::CONFIG
            }
            Self::NoCredentials { .. } => exit_code::CREDENTIALS,
            Self::RetriesExhausted { .. } => exit_code::CONNECTION,
            Self::Core(CoreError::Config { .. }) => exit_code::CONFIG,
            Self::Core(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { path } => AppError::ConfigNotFound {
                path: path.display().to_string(),
                default: tagbridge_config::config_path().display().to_string(),
            },
            ConfigError::Validation { field, reason } => AppError::Validation { field, reason },
            ConfigError::NoCredentials { table } => AppError::NoCredentials { table },
            other => AppError::Config(other),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::RetriesExhausted {
                address,
                attempts,
                last_error,
            } => AppError::RetriesExhausted {
                address,
                attempts,
                last_error,
            },
            other => AppError::Core(other),
        }
    }
}
