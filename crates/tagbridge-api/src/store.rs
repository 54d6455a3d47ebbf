// Row store HTTP client
//
// Inserts JSON rows into a PostgREST-style endpoint (`/rest/v1/{table}`).
// The store's schema and query language are its own business; this client
// only ever appends rows.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::trace;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const REST_PREFIX: &str = "rest/v1/";

/// Append-only client for one table of a REST row store.
#[derive(Debug, Clone)]
pub struct StoreClient {
    http: reqwest::Client,
    table_url: Url,
}

impl StoreClient {
    /// Create a client writing to `table` under `base_url`.
    ///
    /// The API key is sent both as `apikey` and as a bearer token, which
    /// is what PostgREST gateways in front of hosted Postgres expect.
    pub fn new(
        base_url: &Url,
        table: &str,
        api_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();

        let mut key = HeaderValue::from_str(api_key.expose_secret())
            .map_err(|_| Error::InvalidHeader("apikey"))?;
        key.set_sensitive(true);
        headers.insert(HeaderName::from_static("apikey"), key);

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
            .map_err(|_| Error::InvalidHeader("authorization"))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let http = transport.build_client_with_headers(headers)?;
        Self::with_client(http, base_url, table)
    }

    /// Create a client with a pre-built `reqwest::Client` (headers already set).
    pub fn with_client(http: reqwest::Client, base_url: &Url, table: &str) -> Result<Self, Error> {
        let mut root = base_url.clone();
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        let table_url = root.join(REST_PREFIX)?.join(table)?;
        Ok(Self { http, table_url })
    }

    /// Full URL rows are posted to.
    pub fn table_url(&self) -> &Url {
        &self.table_url
    }

    /// Insert a single row.
    pub async fn insert<T: Serialize + ?Sized>(&self, row: &T) -> Result<(), Error> {
        trace!(url = %self.table_url, "inserting row");
        let resp = self
            .http
            .post(self.table_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let message = resp.text().await.unwrap_or_default();
        Err(Error::Store {
            status: status.as_u16(),
            message,
        })
    }
}
