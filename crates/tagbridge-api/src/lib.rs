//! HTTP collaborators for the tagbridge connector.
//!
//! - [`GatewayClient`] reads current tag values from a REST tag gateway
//!   that fronts the controller.
//! - [`StoreClient`] appends JSON rows to a PostgREST-style table.
//!
//! Both share [`TransportConfig`] for TLS and timeouts and report failures
//! through [`Error`]. Neither client retries; retry policy belongs to the
//! caller.

pub mod error;
pub mod gateway;
pub mod store;
pub mod transport;

pub use error::Error;
pub use gateway::{BrowseEntry, GatewayClient, ReadResult};
pub use store::StoreClient;
pub use transport::{TlsMode, TransportConfig};
