// ── Polling link ──
//
// Implements `ControllerLink` over any `TagDriver`: keeps the subscription
// list and the per-tag value table, runs the scan task, and turns value
// transitions into `Initialized` / `Changed` events.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::catalog::Tag;
use crate::error::CoreError;
use crate::link::{ControllerLink, LinkEvent, LinkEvents, TagDriver};
use crate::model::TagValue;

/// A [`ControllerLink`] that polls a [`TagDriver`] at a fixed rate.
///
/// Cheaply cloneable; clones share the same session.
pub struct ScanLink<D: TagDriver> {
    inner: Arc<ScanLinkInner<D>>,
}

impl<D: TagDriver> Clone for ScanLink<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ScanLinkInner<D> {
    driver: D,
    subscriptions: ArcSwap<Vec<String>>,
    values: DashMap<String, TagValue>,
    scan_rate: ArcSwap<Duration>,
    session: AtomicU64,
    connected: AtomicBool,
    /// Token of the running scan task; cancelled on disconnect or rescan.
    scan_cancel: Mutex<Option<CancellationToken>>,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl<D: TagDriver> ScanLink<D> {
    /// Build a link over `driver` and return it with its event stream.
    pub fn new(driver: D, scan_rate: Duration) -> (Self, LinkEvents) {
        let (events, rx) = mpsc::unbounded_channel();
        let link = Self {
            inner: Arc::new(ScanLinkInner {
                driver,
                subscriptions: ArcSwap::from_pointee(Vec::new()),
                values: DashMap::new(),
                scan_rate: ArcSwap::from_pointee(scan_rate),
                session: AtomicU64::new(0),
                connected: AtomicBool::new(false),
                scan_cancel: Mutex::new(None),
                events,
            }),
        };
        (link, rx)
    }

    /// Access the underlying driver.
    pub fn driver(&self) -> &D {
        &self.inner.driver
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub fn scan_rate(&self) -> Duration {
        **self.inner.scan_rate.load()
    }

    fn replace_scan_token(&self, token: Option<CancellationToken>) {
        let mut guard = self
            .inner
            .scan_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = guard.take() {
            old.cancel();
        }
        *guard = token;
    }
}

impl<D: TagDriver> ControllerLink for ScanLink<D> {
    async fn connect(&self, address: &str, slot: u8) -> Result<(), CoreError> {
        self.replace_scan_token(None);
        self.inner.connected.store(false, Ordering::SeqCst);

        self.inner.driver.connect(address, slot).await?;

        // A fresh session re-announces every tag through `Initialized`.
        self.inner.values.clear();
        let session = self.inner.session.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.connected.store(true, Ordering::SeqCst);
        debug!(session, address, slot, "link session opened");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), CoreError> {
        self.replace_scan_token(None);
        self.inner.connected.store(false, Ordering::SeqCst);
        debug!(session = self.session(), "link session closing");
        self.inner.driver.disconnect().await
    }

    fn subscribe(&self, tag: &Tag) {
        let name = tag.name();
        self.inner.subscriptions.rcu(|current| {
            let mut next = Vec::clone(current);
            if !next.iter().any(|n| n == name) {
                next.push(name.to_owned());
            }
            next
        });
    }

    fn set_scan_rate(&self, rate: Duration) {
        self.inner.scan_rate.store(Arc::new(rate));
    }

    fn scan(&self) -> Result<(), CoreError> {
        if !self.is_connected() {
            return Err(CoreError::NotConnected);
        }
        let rate = self.scan_rate();
        if rate.is_zero() {
            return Err(CoreError::Config {
                message: "scan rate must be greater than zero".into(),
            });
        }
        let token = CancellationToken::new();
        self.replace_scan_token(Some(token.clone()));

        let inner = Arc::clone(&self.inner);
        let session = self.session();
        debug!(session, rate_ms = crate::millis(rate), "scan started");
        tokio::spawn(scan_task(inner, session, rate, token));
        Ok(())
    }

    fn value(&self, tag: &str) -> Option<TagValue> {
        self.inner.values.get(tag).map(|v| *v)
    }

    fn session(&self) -> u64 {
        self.inner.session.load(Ordering::SeqCst)
    }
}

// ── Scan task ────────────────────────────────────────────────────────

async fn scan_task<D: TagDriver>(
    inner: Arc<ScanLinkInner<D>>,
    session: u64,
    rate: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(rate);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let names = inner.subscriptions.load_full();
                if names.is_empty() {
                    continue;
                }
                match inner.driver.read(&names).await {
                    Ok(values) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        inner.apply(&names, values);
                    }
                    Err(e) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        warn!(session, error = %e, "scan read failed");
                        if inner.session.load(Ordering::SeqCst) == session {
                            inner.connected.store(false, Ordering::SeqCst);
                        }
                        let _ = inner.events.send(LinkEvent::Fault {
                            session,
                            reason: e.to_string(),
                        });
                        break;
                    }
                }
            }
        }
    }
    trace!(session, "scan task exiting");
}

impl<D> ScanLinkInner<D> {
    /// Store fresh values and emit an event for every transition.
    fn apply(&self, names: &[String], values: Vec<Option<TagValue>>) {
        if names.len() != values.len() {
            warn!(
                expected = names.len(),
                got = values.len(),
                "driver returned a mismatched value count"
            );
        }
        for (name, value) in names.iter().zip(values) {
            let Some(value) = value else {
                continue;
            };
            let event = match self.values.insert(name.clone(), value) {
                None => Some(LinkEvent::Initialized {
                    tag: name.clone(),
                    value,
                }),
                Some(previous) if previous != value => Some(LinkEvent::Changed {
                    tag: name.clone(),
                    previous,
                    value,
                }),
                Some(_) => None,
            };
            if let Some(event) = event {
                trace!(?event, "tag event");
                // Ignore send errors -- no one is listening during shutdown.
                let _ = self.events.send(event);
            }
        }
    }
}
