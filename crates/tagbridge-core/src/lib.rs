//! Connection supervision and tag-change forwarding for one controller.
//!
//! - **[`Supervisor`]** owns the controller session: bounded connect retries
//!   with exponential backoff, scan start, and single-flight recovery after
//!   runtime faults. Lifecycle states are mirrored to a [`StatusIndicator`].
//!
//! - **[`ControllerLink`]** is the session seam. [`ScanLink`] implements it
//!   over any [`TagDriver`] (the wire-protocol seam), polling subscribed tags
//!   and emitting typed [`LinkEvent`]s.
//!
//! - **[`ChangePipeline`]** turns value events into [`Reading`]s on
//!   per-tag ordered lanes; **[`SweepScheduler`]** pushes every tag's
//!   current value after the first scan and then periodically.
//!
//! - **[`Bridge`]** wires the pieces together and runs the event loop.
//!
//! Configuration arrives as a [`BridgeConfig`] value; this crate never reads
//! files or the environment.

use std::time::Duration;

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod error;
pub mod indicator;
pub mod link;
pub mod model;
pub mod pipeline;
pub mod sink;
pub mod supervisor;
pub mod sweep;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::Bridge;
pub use catalog::{Tag, TagCatalog};
pub use config::{BridgeConfig, FlapGuard, RetryPolicy};
pub use error::CoreError;
pub use indicator::{
    AnyIndicator, CommandIndicator, IndicatorState, LogIndicator, Signal, StatusIndicator,
};
pub use link::{
    AnyDriver, ControllerLink, GatewayDriver, LinkEvent, LinkEvents, ScanLink, SimulatedDriver,
    TagDriver,
};
pub use model::{Reading, ReadingCause, TagValue};
pub use pipeline::ChangePipeline;
pub use sink::{AnySink, LogSink, ReadingSink, RestSink};
pub use supervisor::{ConnectionState, Recovery, Supervisor};
pub use sweep::{SweepReport, SweepScheduler};

/// Whole milliseconds in `d`, saturating, for log fields.
pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
