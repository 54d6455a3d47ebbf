// Shared fakes for tagbridge-core integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use tagbridge_core::{
    ControllerLink, CoreError, IndicatorState, Reading, ReadingSink, StatusIndicator, Tag,
    TagDriver, TagValue,
};

// ── ScriptedDriver ──────────────────────────────────────────────────

/// Driver whose values and connect failures are set by the test.
#[derive(Default)]
pub struct ScriptedDriver {
    values: Mutex<HashMap<String, TagValue>>,
    connect_failures: AtomicU32,
    connects: AtomicU32,
    connect_times: Mutex<Vec<Instant>>,
    fail_next_read: AtomicBool,
}

impl ScriptedDriver {
    pub fn with_values(values: &[(&str, i64)]) -> Self {
        let driver = Self::default();
        for (name, value) in values {
            driver.set(name, *value);
        }
        driver
    }

    pub fn set(&self, name: &str, value: i64) {
        self.values
            .lock()
            .unwrap()
            .insert(name.to_owned(), TagValue::Int(value));
    }

    pub fn fail_connects(&self, count: u32) {
        self.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Make the next read fail as if the session dropped.
    pub fn fail_next_read(&self) {
        self.fail_next_read.store(true, Ordering::SeqCst);
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    /// Time between consecutive connect calls.
    pub fn connect_gaps(&self) -> Vec<Duration> {
        let times = self.connect_times.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

impl TagDriver for ScriptedDriver {
    async fn connect(&self, address: &str, _slot: u8) -> Result<(), CoreError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.connect_times.lock().unwrap().push(Instant::now());
        let pending = self.connect_failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.connect_failures.store(pending - 1, Ordering::SeqCst);
            return Err(CoreError::ConnectionFailed {
                address: address.to_owned(),
                reason: "connection refused".into(),
            });
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn read(&self, tags: &[String]) -> Result<Vec<Option<TagValue>>, CoreError> {
        if self.fail_next_read.swap(false, Ordering::SeqCst) {
            return Err(CoreError::LinkFault {
                reason: "session reset by peer".into(),
            });
        }
        let values = self.values.lock().unwrap();
        Ok(tags.iter().map(|t| values.get(t).copied()).collect())
    }
}

// ── MockLink ────────────────────────────────────────────────────────

/// `ControllerLink` that records connect attempts and their overlap.
pub struct MockLink {
    connect_delay: Duration,
    failures_left: AtomicU32,
    attempts: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
    scans: AtomicU32,
    disconnects: AtomicU32,
    session: AtomicU64,
    attempt_times: Mutex<Vec<Instant>>,
    values: Mutex<HashMap<String, TagValue>>,
    fail_disconnect: bool,
}

impl MockLink {
    pub fn new(failures: u32) -> Self {
        Self {
            connect_delay: Duration::from_millis(10),
            failures_left: AtomicU32::new(failures),
            attempts: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            max_in_flight: AtomicU32::new(0),
            scans: AtomicU32::new(0),
            disconnects: AtomicU32::new(0),
            session: AtomicU64::new(0),
            attempt_times: Mutex::new(Vec::new()),
            values: Mutex::new(HashMap::new()),
            fail_disconnect: false,
        }
    }

    pub fn failing_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn set_value(&self, tag: &str, value: i64) {
        self.values
            .lock()
            .unwrap()
            .insert(tag.to_owned(), TagValue::Int(value));
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn scans(&self) -> u32 {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Gaps between consecutive connect attempts.
    pub fn gaps(&self) -> Vec<Duration> {
        let times = self.attempt_times.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

impl ControllerLink for MockLink {
    async fn connect(&self, address: &str, _slot: u8) -> Result<(), CoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempt_times.lock().unwrap().push(Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.connect_delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(CoreError::ConnectionFailed {
                address: address.to_owned(),
                reason: "timed out".into(),
            });
        }
        self.session.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), CoreError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.fail_disconnect {
            return Err(CoreError::NotConnected);
        }
        Ok(())
    }

    fn subscribe(&self, _tag: &Tag) {}

    fn set_scan_rate(&self, _rate: Duration) {}

    fn scan(&self) -> Result<(), CoreError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn value(&self, tag: &str) -> Option<TagValue> {
        self.values.lock().unwrap().get(tag).copied()
    }

    fn session(&self) -> u64 {
        self.session.load(Ordering::SeqCst)
    }
}

// ── RecordingSink ───────────────────────────────────────────────────

/// Sink that keeps every accepted reading, with per-tag failure and delay
/// injection.
#[derive(Clone, Default)]
pub struct RecordingSink {
    readings: Arc<Mutex<Vec<Reading>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    slow: Arc<Mutex<HashMap<String, Duration>>>,
    attempts: Arc<AtomicU32>,
}

impl RecordingSink {
    pub fn fail_tag(&self, tag: &str) {
        self.failing.lock().unwrap().insert(tag.to_owned());
    }

    pub fn heal_tag(&self, tag: &str) {
        self.failing.lock().unwrap().remove(tag);
    }

    pub fn slow_tag(&self, tag: &str, delay: Duration) {
        self.slow.lock().unwrap().insert(tag.to_owned(), delay);
    }

    pub fn readings(&self) -> Vec<Reading> {
        self.readings.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// `(tag, value, cause)` triples, easier to compare than full readings.
    pub fn summary(&self) -> Vec<(String, TagValue, String)> {
        self.readings()
            .iter()
            .map(|r| (r.tag_name().to_owned(), r.value(), r.cause().to_string()))
            .collect()
    }
}

impl ReadingSink for RecordingSink {
    async fn insert(&self, reading: &Reading) -> Result<(), CoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = self.slow.lock().unwrap().get(reading.tag_name()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(reading.tag_name()) {
            return Err(CoreError::Sink {
                message: "row store unavailable".into(),
            });
        }
        self.readings.lock().unwrap().push(reading.clone());
        Ok(())
    }
}

// ── RecordingIndicator ──────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingIndicator {
    states: Arc<Mutex<Vec<IndicatorState>>>,
}

impl RecordingIndicator {
    pub fn states(&self) -> Vec<IndicatorState> {
        self.states.lock().unwrap().clone()
    }
}

impl StatusIndicator for RecordingIndicator {
    async fn set(&self, state: IndicatorState) -> Result<(), CoreError> {
        self.states.lock().unwrap().push(state);
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

pub fn triple(tag: &str, value: i64, cause: &str) -> (String, TagValue, String) {
    (tag.to_owned(), TagValue::Int(value), cause.to_owned())
}

/// Let spawned tasks run without moving the paused clock.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
