// ── Synthetic driver ──
//
// Produces slowly stepping integer values without any device. Used by the
// binary's `--simulate` mode and as a fault-injection stand-in.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use tracing::debug;

use crate::error::CoreError;
use crate::link::TagDriver;
use crate::model::TagValue;

/// Scans between value steps.
const STEP_EVERY: u64 = 25;

/// A [`TagDriver`] that fabricates values.
#[derive(Debug, Default)]
pub struct SimulatedDriver {
    connected: AtomicBool,
    reads: AtomicU64,
    pending_connect_failures: AtomicU32,
    fail_next_read: AtomicBool,
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` connect attempts fail.
    pub fn fail_connects(&self, count: u32) {
        self.pending_connect_failures.store(count, Ordering::SeqCst);
    }

    /// Make the next read fail as if the session had dropped.
    pub fn fail_next_read(&self) {
        self.fail_next_read.store(true, Ordering::SeqCst);
    }

    fn value_for(read: u64, index: usize) -> TagValue {
        let offset = u64::try_from(index).unwrap_or_default().wrapping_mul(13);
        let raw = (read / STEP_EVERY).wrapping_add(offset) % 50;
        TagValue::Int(i64::try_from(raw).unwrap_or_default())
    }
}

impl TagDriver for SimulatedDriver {
    async fn connect(&self, address: &str, slot: u8) -> Result<(), CoreError> {
        let pending = self.pending_connect_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.pending_connect_failures
                .store(pending - 1, Ordering::SeqCst);
            return Err(CoreError::ConnectionFailed {
                address: address.to_owned(),
                reason: "simulated connect failure".into(),
            });
        }
        debug!(address, slot, "simulated controller connected");
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), CoreError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, tags: &[String]) -> Result<Vec<Option<TagValue>>, CoreError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(CoreError::NotConnected);
        }
        if self.fail_next_read.swap(false, Ordering::SeqCst) {
            self.connected.store(false, Ordering::SeqCst);
            return Err(CoreError::LinkFault {
                reason: "simulated session reset".into(),
            });
        }
        let read = self.reads.fetch_add(1, Ordering::SeqCst);
        Ok((0..tags.len())
            .map(|idx| Some(Self::value_for(read, idx)))
            .collect())
    }
}
