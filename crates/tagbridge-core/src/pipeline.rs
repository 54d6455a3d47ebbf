// ── Change pipeline ──
//
// Turns `Initialized` / `Changed` link events into readings and hands them
// to the sink. Every catalog tag owns a lane (queue + worker task): a tag's
// readings are pushed in arrival order, and a slow push for one tag never
// holds up another.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::catalog::TagCatalog;
use crate::link::LinkEvent;
use crate::model::{Reading, ReadingCause};
use crate::sink::ReadingSink;

/// Routes value events to per-tag sink lanes.
pub struct ChangePipeline {
    catalog: Arc<TagCatalog>,
    lanes: HashMap<String, mpsc::UnboundedSender<Reading>>,
}

impl ChangePipeline {
    /// Spawn one lane per catalog tag. Must be called inside a Tokio runtime.
    pub fn new<S: ReadingSink>(catalog: Arc<TagCatalog>, sink: Arc<S>) -> Self {
        let lanes = catalog
            .iter()
            .map(|tag| {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(lane_task(Arc::clone(&sink), rx));
                (tag.name().to_owned(), tx)
            })
            .collect();
        Self { catalog, lanes }
    }

    /// Build a reading for a value event and queue it on the tag's lane.
    ///
    /// Returns `false` when nothing was queued: faults, tags outside the
    /// catalog, or a lane that has shut down.
    pub fn dispatch(&self, event: &LinkEvent) -> bool {
        let (name, value, cause) = match event {
            LinkEvent::Initialized { tag, value } => (tag, *value, ReadingCause::Initialized),
            LinkEvent::Changed { tag, value, .. } => (tag, *value, ReadingCause::Changed),
            LinkEvent::Fault { .. } => return false,
        };

        let (Some(tag), Some(lane)) = (self.catalog.get(name), self.lanes.get(name)) else {
            warn!(tag = %name, "event for tag outside the catalog, dropped");
            return false;
        };

        let reading = Reading::now(tag, value, cause);
        debug!(tag = %name, %value, %cause, "queueing reading");
        lane.send(reading).is_ok()
    }
}

async fn lane_task<S: ReadingSink>(sink: Arc<S>, mut rx: mpsc::UnboundedReceiver<Reading>) {
    while let Some(reading) = rx.recv().await {
        push(sink.as_ref(), &reading).await;
    }
}

/// Insert one reading, logging and discarding any failure.
pub(crate) async fn push<S: ReadingSink>(sink: &S, reading: &Reading) -> bool {
    match sink.insert(reading).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                tag = %reading.tag_name(),
                cause = %reading.cause(),
                error = %e,
                "failed to record reading, dropped"
            );
            false
        }
    }
}
