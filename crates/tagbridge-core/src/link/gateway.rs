// ── HTTP tag-gateway driver ──
//
// The gateway speaks the controller's protocol; this driver only asks it
// for values. `address` is the gateway base URL; a bare host such as
// `192.168.1.10` means `http://192.168.1.10/`. The gateway routes to the CPU
// itself, so `slot` is only recorded for diagnostics.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::{debug, info, warn};
use url::Url;

use tagbridge_api::{GatewayClient, TransportConfig};

use crate::error::CoreError;
use crate::link::TagDriver;
use crate::model::TagValue;

/// [`TagDriver`] backed by a [`GatewayClient`].
#[derive(Debug)]
pub struct GatewayDriver {
    transport: TransportConfig,
    client: ArcSwapOption<GatewayClient>,
}

impl GatewayDriver {
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            client: ArcSwapOption::empty(),
        }
    }

    fn base_url(address: &str) -> Result<Url, CoreError> {
        let parsed = if address.contains("://") {
            Url::parse(address)
        } else {
            Url::parse(&format!("http://{address}/"))
        };
        parsed.map_err(|e| CoreError::Config {
            message: format!("gateway address '{address}' is not a URL: {e}"),
        })
    }

    fn client(&self) -> Result<Arc<GatewayClient>, CoreError> {
        self.client.load_full().ok_or(CoreError::NotConnected)
    }
}

impl TagDriver for GatewayDriver {
    async fn connect(&self, address: &str, slot: u8) -> Result<(), CoreError> {
        let url = Self::base_url(address)?;
        let client = GatewayClient::new(url, &self.transport)?;

        let exposed = client
            .browse()
            .await
            .map_err(|e| CoreError::ConnectionFailed {
                address: address.to_owned(),
                reason: e.to_string(),
            })?;
        info!(
            gateway = %client.base_url(),
            slot,
            tags = exposed.len(),
            "tag gateway reachable"
        );

        self.client.store(Some(Arc::new(client)));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), CoreError> {
        // Stateless HTTP: dropping the client is the whole teardown.
        if self.client.swap(None).is_some() {
            debug!("gateway client released");
        }
        Ok(())
    }

    async fn read(&self, tags: &[String]) -> Result<Vec<Option<TagValue>>, CoreError> {
        let client = self.client()?;
        let results = client.read(tags).await?;

        let mut by_id: HashMap<String, tagbridge_api::ReadResult> =
            results.into_iter().map(|r| (r.id.clone(), r)).collect();

        let values = tags
            .iter()
            .map(|name| {
                let Some(result) = by_id.remove(name) else {
                    warn!(tag = %name, "gateway omitted tag from read");
                    return None;
                };
                match result.into_value() {
                    Ok(raw) => {
                        let value = TagValue::from_json(&raw);
                        if value.is_none() {
                            warn!(tag = %name, raw = %raw, "unsupported tag value");
                        }
                        value
                    }
                    Err(e) => {
                        warn!(tag = %name, error = %e, "tag read failed");
                        None
                    }
                }
            })
            .collect();

        Ok(values)
    }
}
