// ── Reading sinks ──
//
// Durable destinations for readings. Sinks are shared by the change
// pipeline and the sweep and must accept concurrent callers.

use std::future::Future;

use secrecy::SecretString;
use tracing::info;
use url::Url;

use tagbridge_api::{StoreClient, TransportConfig};

use crate::error::CoreError;
use crate::model::Reading;

/// Records a [`Reading`].
pub trait ReadingSink: Send + Sync + 'static {
    fn insert(&self, reading: &Reading) -> impl Future<Output = Result<(), CoreError>> + Send;
}

// ── RestSink ─────────────────────────────────────────────────────────

/// Inserts readings as rows of a REST row store table.
#[derive(Debug, Clone)]
pub struct RestSink {
    client: StoreClient,
}

impl RestSink {
    pub fn new(
        url: &Url,
        table: &str,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            client: StoreClient::new(url, table, api_key, transport)?,
        })
    }
}

impl ReadingSink for RestSink {
    async fn insert(&self, reading: &Reading) -> Result<(), CoreError> {
        self.client.insert(reading).await.map_err(CoreError::from)
    }
}

// ── LogSink ──────────────────────────────────────────────────────────

/// Emits each reading as a JSON log line. Used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ReadingSink for LogSink {
    async fn insert(&self, reading: &Reading) -> Result<(), CoreError> {
        let row = serde_json::to_string(reading).map_err(|e| CoreError::Sink {
            message: e.to_string(),
        })?;
        info!(cause = %reading.cause(), %row, "reading");
        Ok(())
    }
}

// ── AnySink ──────────────────────────────────────────────────────────

/// Sink selected at runtime from configuration.
#[derive(Debug, Clone)]
pub enum AnySink {
    Rest(RestSink),
    Log(LogSink),
}

impl ReadingSink for AnySink {
    async fn insert(&self, reading: &Reading) -> Result<(), CoreError> {
        match self {
            Self::Rest(s) => s.insert(reading).await,
            Self::Log(s) => s.insert(reading).await,
        }
    }
}

