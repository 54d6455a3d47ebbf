// Tag gateway HTTP client
//
// Speaks the read/browse surface of an IoT-gateway style REST server that
// fronts the controller. The gateway owns the device protocol; this client
// only asks it for current tag values.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const BROWSE_PATH: &str = "iotgateway/browse";
const READ_PATH: &str = "iotgateway/read";

// ── Wire types ───────────────────────────────────────────────────────

/// One entry of a `browse` response.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowseEntry {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct BrowseResponse {
    #[serde(rename = "browseResults", default)]
    browse_results: Vec<BrowseEntry>,
    #[serde(default = "default_true")]
    succeeded: bool,
    #[serde(default)]
    reason: String,
}

fn default_true() -> bool {
    true
}

/// One entry of a `read` response.
///
/// Field names follow the gateway's compact encoding: `s` success flag,
/// `r` failure reason, `v` value, `t` sample time in epoch milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadResult {
    pub id: String,
    #[serde(rename = "s")]
    pub success: bool,
    #[serde(rename = "r", default)]
    pub reason: String,
    #[serde(rename = "v", default)]
    pub value: serde_json::Value,
    #[serde(rename = "t", default)]
    pub sampled_at_ms: Option<i64>,
}

impl ReadResult {
    /// Unwrap the value, turning a per-tag failure into an [`Error::TagRead`].
    pub fn into_value(self) -> Result<serde_json::Value, Error> {
        if self.success {
            Ok(self.value)
        } else {
            Err(Error::TagRead {
                tag: self.id,
                reason: if self.reason.is_empty() {
                    "gateway reported failure".into()
                } else {
                    self.reason
                },
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReadResponse {
    #[serde(rename = "readResults")]
    read_results: Vec<ReadResult>,
}

// ── GatewayClient ────────────────────────────────────────────────────

/// Raw HTTP client for a tag gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GatewayClient {
    /// Create a client for the gateway rooted at `base_url`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: ensure_trailing_slash(base_url),
        }
    }

    /// The gateway base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// List the tag ids the gateway exposes.
    ///
    /// Doubles as a reachability probe: any transport failure or an
    /// unsuccessful browse means the gateway cannot serve reads.
    pub async fn browse(&self) -> Result<Vec<BrowseEntry>, Error> {
        let url = self.base_url.join(BROWSE_PATH)?;
        debug!(url = %url, "browsing gateway");
        let resp: BrowseResponse = self.get_json(self.http.get(url)).await?;
        if !resp.succeeded {
            return Err(Error::Gateway {
                status: 200,
                message: if resp.reason.is_empty() {
                    "browse unsuccessful".into()
                } else {
                    resp.reason
                },
            });
        }
        Ok(resp.browse_results)
    }

    /// Read the current values of `ids`. Results come back in gateway
    /// order, which callers should not assume matches `ids`.
    pub async fn read(&self, ids: &[String]) -> Result<Vec<ReadResult>, Error> {
        let url = self.base_url.join(READ_PATH)?;
        let query: Vec<(&str, &str)> = ids.iter().map(|id| ("ids", id.as_str())).collect();
        trace!(url = %url, count = ids.len(), "reading tags");
        let resp: ReadResponse = self.get_json(self.http.get(url).query(&query)).await?;
        Ok(resp.read_results)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, Error> {
        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(Error::Gateway {
                status: status.as_u16(),
                message: body,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
