//! Controller link abstraction.
//!
//! [`ControllerLink`] is the session the supervisor manages: connect,
//! disconnect, subscribe, scan, and per-tag current values. Notifications
//! travel as typed [`LinkEvent`]s over an mpsc channel handed out when the
//! link is built.
//!
//! [`ScanLink`] implements the link once on top of any [`TagDriver`], which
//! is the wire-protocol seam. Two drivers ship with the crate: the HTTP
//! [`GatewayDriver`] and the synthetic [`SimulatedDriver`].

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::catalog::Tag;
use crate::error::CoreError;
use crate::model::TagValue;

pub mod gateway;
pub mod scan;
pub mod simulated;

pub use gateway::GatewayDriver;
pub use scan::ScanLink;
pub use simulated::SimulatedDriver;

/// Notifications emitted by a link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// First value of `tag` since the current session connected.
    Initialized { tag: String, value: TagValue },
    /// `tag` moved from `previous` to `value`.
    Changed {
        tag: String,
        previous: TagValue,
        value: TagValue,
    },
    /// The session identified by `session` can no longer communicate.
    Fault { session: u64, reason: String },
}

/// Receiving end of a link's event stream.
pub type LinkEvents = mpsc::UnboundedReceiver<LinkEvent>;

/// A live session to one controller.
///
/// Implementations must be shareable across tasks: the supervisor drives
/// connect/disconnect while the sweep reads values concurrently.
pub trait ControllerLink: Send + Sync + 'static {
    /// Open a session. Bumps [`session`](Self::session) on success.
    fn connect(&self, address: &str, slot: u8)
    -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Close the session and stop scanning.
    fn disconnect(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Add `tag` to the set polled by [`scan`](Self::scan).
    fn subscribe(&self, tag: &Tag);

    /// Poll period used by the next [`scan`](Self::scan).
    fn set_scan_rate(&self, rate: Duration);

    /// Start polling subscribed tags. Requires a connected session.
    fn scan(&self) -> Result<(), CoreError>;

    /// Most recent value of `tag`, if one is known in this session.
    fn value(&self, tag: &str) -> Option<TagValue>;

    /// Identifier of the current session. `0` before the first connect.
    fn session(&self) -> u64;
}

/// Wire-protocol seam: how a [`ScanLink`] talks to the device.
pub trait TagDriver: Send + Sync + 'static {
    fn connect(&self, address: &str, slot: u8)
    -> impl Future<Output = Result<(), CoreError>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Read `tags`, returning one slot per tag in the same order. `None`
    /// marks a tag with no usable value this cycle; an `Err` means the
    /// session itself is broken.
    fn read(
        &self,
        tags: &[String],
    ) -> impl Future<Output = Result<Vec<Option<TagValue>>, CoreError>> + Send;
}

/// Driver selected at runtime from configuration.
#[derive(Debug)]
pub enum AnyDriver {
    Gateway(GatewayDriver),
    Simulated(SimulatedDriver),
}

impl TagDriver for AnyDriver {
    async fn connect(&self, address: &str, slot: u8) -> Result<(), CoreError> {
        match self {
            Self::Gateway(d) => d.connect(address, slot).await,
            Self::Simulated(d) => d.connect(address, slot).await,
        }
    }

    async fn disconnect(&self) -> Result<(), CoreError> {
        match self {
            Self::Gateway(d) => d.disconnect().await,
            Self::Simulated(d) => d.disconnect().await,
        }
    }

    async fn read(&self, tags: &[String]) -> Result<Vec<Option<TagValue>>, CoreError> {
        match self {
            Self::Gateway(d) => d.read(tags).await,
            Self::Simulated(d) => d.read(tags).await,
        }
    }
}
