// ── Connection supervisor ──
//
// Owns the lifecycle of the controller link: bounded connect retries with
// exponential backoff, scan start, and single-flight recovery after runtime
// faults. Either the link is connected and scanning, or `establish` reports
// `RetriesExhausted` and the caller terminates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::indicator::{IndicatorState, StatusIndicator};
use crate::link::ControllerLink;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting { attempt: u32 },
    Connected { session: u64 },
    Recovering { reason: String },
}

/// Outcome of [`Supervisor::on_link_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The link was rebuilt and is scanning again.
    Restored { attempts: u32 },
    /// Another recovery was already running; this fault was folded into it.
    Coalesced,
    /// The fault belonged to a session that has already been replaced.
    Stale,
}

type IndicatorRequest = (IndicatorState, Option<oneshot::Sender<()>>);

// ── Supervisor ───────────────────────────────────────────────────

/// Drives one [`ControllerLink`].
///
/// Cheaply cloneable via `Arc<SupervisorInner>`; recovery tasks hold clones.
pub struct Supervisor<L: ControllerLink> {
    inner: Arc<SupervisorInner<L>>,
}

impl<L: ControllerLink> Clone for Supervisor<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SupervisorInner<L> {
    link: Arc<L>,
    config: BridgeConfig,
    state: watch::Sender<ConnectionState>,
    /// Flips to `true` the first time scanning starts and stays there.
    scanning: watch::Sender<bool>,
    /// Serializes connect cycles: at most one attempt is ever in flight.
    connect_lock: tokio::sync::Mutex<()>,
    /// Single-flight flag for recovery.
    recovering: AtomicBool,
    connected_at: Mutex<Option<Instant>>,
    /// Cancelled by [`Supervisor::shutdown`]; aborts any connect cycle.
    stop: CancellationToken,
    /// Ordered, fire-and-forget queue to the indicator worker.
    indicator_tx: mpsc::UnboundedSender<IndicatorRequest>,
}

impl<L: ControllerLink> Supervisor<L> {
    /// Create a supervisor. Spawns the indicator worker, so this must be
    /// called inside a Tokio runtime.
    pub fn new<I: StatusIndicator>(link: Arc<L>, indicator: I, config: BridgeConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (scanning, _) = watch::channel(false);
        let (indicator_tx, indicator_rx) = mpsc::unbounded_channel();
        tokio::spawn(indicator_task(indicator, indicator_rx));

        Self {
            inner: Arc::new(SupervisorInner {
                link,
                config,
                state,
                scanning,
                connect_lock: tokio::sync::Mutex::new(()),
                recovering: AtomicBool::new(false),
                connected_at: Mutex::new(None),
                stop: CancellationToken::new(),
                indicator_tx,
            }),
        }
    }

    pub fn link(&self) -> &Arc<L> {
        &self.inner.link
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Subscribe to connection state transitions.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Receiver that becomes `true` once scanning has started for the first time.
    pub fn first_scan(&self) -> watch::Receiver<bool> {
        self.inner.scanning.subscribe()
    }

    pub fn is_recovering(&self) -> bool {
        self.inner.recovering.load(Ordering::SeqCst)
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Connect with the configured retry policy.
    ///
    /// Returns the number of attempts used. On exhaustion the indicator has
    /// already rendered the terminal signal when this returns
    /// [`CoreError::RetriesExhausted`]. After [`shutdown`](Self::shutdown)
    /// the cycle stops at the next connect or backoff wait and returns
    /// [`CoreError::Cancelled`] without signalling exhaustion.
    pub async fn establish(&self) -> Result<u32, CoreError> {
        let stop = &self.inner.stop;
        let _cycle = tokio::select! {
            biased;
            () = stop.cancelled() => return Err(self.cancelled()),
            guard = self.inner.connect_lock.lock() => guard,
        };
        let config = &self.inner.config;
        let policy = config.retry;

        self.signal(IndicatorState::Connecting);

        let mut last_error = String::new();
        for attempt in 1..=policy.max_attempts {
            self.set_state(ConnectionState::Connecting { attempt });
            debug!(
                address = %config.address,
                slot = config.slot,
                attempt,
                "connecting to controller"
            );

            let outcome = tokio::select! {
                biased;
                () = stop.cancelled() => return Err(self.cancelled()),
                res = self.inner.link.connect(&config.address, config.slot) => res,
            };
            match outcome {
                Ok(()) => {
                    let session = self.inner.link.session();
                    *self
                        .inner
                        .connected_at
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
                    self.set_state(ConnectionState::Connected { session });
                    self.signal(IndicatorState::Connected);
                    info!(address = %config.address, session, attempt, "connected to controller");
                    return Ok(attempt);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        "connect attempt failed"
                    );
                    last_error = e.to_string();

                    if attempt < policy.max_attempts {
                        let delay = policy.delay_after(attempt);
                        info!(
                            delay_ms = crate::millis(delay),
                            attempt,
                            "waiting before reconnect"
                        );
                        tokio::select! {
                            biased;
                            () = stop.cancelled() => return Err(self.cancelled()),
                            () = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        error!(
            address = %config.address,
            attempts = policy.max_attempts,
            "controller connect retries exhausted, giving up"
        );
        self.signal_and_wait(IndicatorState::Exhausted).await;

        Err(CoreError::RetriesExhausted {
            address: config.address.clone(),
            attempts: policy.max_attempts,
            last_error,
        })
    }

    /// Apply the configured scan rate and start polling.
    pub fn start_scanning(&self) -> Result<(), CoreError> {
        let link = &self.inner.link;
        link.set_scan_rate(self.inner.config.scan_interval);
        link.scan()?;
        self.inner.scanning.send_replace(true);
        info!(
            session = link.session(),
            scan_ms = crate::millis(self.inner.config.scan_interval),
            "scanning controller tags"
        );
        Ok(())
    }

    /// React to a runtime fault reported by the link.
    ///
    /// Tears the session down (ignoring disconnect failures), re-runs
    /// [`establish`](Self::establish), and restarts scanning. Faults that
    /// arrive while a recovery is running are coalesced; faults from an
    /// already-replaced session are ignored.
    pub async fn on_link_error(&self, session: u64, reason: &str) -> Result<Recovery, CoreError> {
        let Some(_guard) = RecoveryGuard::try_acquire(&self.inner.recovering) else {
            debug!(session, reason, "recovery already in flight, coalescing fault");
            return Ok(Recovery::Coalesced);
        };

        let link = &self.inner.link;
        let current = link.session();
        if session != current {
            debug!(session, current, "ignoring fault from a previous session");
            return Ok(Recovery::Stale);
        }

        warn!(session, reason, "controller link fault, reconnecting");
        self.set_state(ConnectionState::Recovering {
            reason: reason.to_owned(),
        });

        if let Err(e) = link.disconnect().await {
            debug!(error = %e, "disconnect during recovery failed (ignored)");
        }

        tokio::select! {
            biased;
            () = self.inner.stop.cancelled() => return Err(self.cancelled()),
            () = self.cool_down_if_flapping() => {}
        }

        let attempts = self.establish().await?;
        self.start_scanning()?;
        Ok(Recovery::Restored { attempts })
    }

    /// Best-effort disconnect for process shutdown.
    ///
    /// Aborts any connect cycle in flight, including one run by a recovery
    /// task. The supervisor does not connect again afterwards.
    pub async fn shutdown(&self) {
        self.inner.stop.cancel();
        let _cycle = self.inner.connect_lock.lock().await;
        if let Err(e) = self.inner.link.disconnect().await {
            debug!(error = %e, "disconnect on shutdown failed (ignored)");
        }
        self.set_state(ConnectionState::Disconnected);
        debug!("supervisor shut down");
    }

    // ── Internals ────────────────────────────────────────────────

    async fn cool_down_if_flapping(&self) {
        let Some(guard) = self.inner.config.flap_guard else {
            return;
        };
        if guard.cooldown.is_zero() {
            return;
        }
        let connected_at = *self
            .inner
            .connected_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(connected_at) = connected_at else {
            return;
        };
        let uptime = connected_at.elapsed();
        if uptime < guard.min_uptime {
            warn!(
                uptime_ms = crate::millis(uptime),
                cooldown_ms = crate::millis(guard.cooldown),
                "link is flapping, cooling down before reconnect"
            );
            tokio::time::sleep(guard.cooldown).await;
        }
    }

    fn cancelled(&self) -> CoreError {
        self.set_state(ConnectionState::Disconnected);
        debug!("connect cycle cancelled by shutdown");
        CoreError::Cancelled
    }

    fn set_state(&self, state: ConnectionState) {
        self.inner.state.send_replace(state);
    }

    fn signal(&self, state: IndicatorState) {
        let _ = self.inner.indicator_tx.send((state, None));
    }

    async fn signal_and_wait(&self, state: IndicatorState) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.inner.indicator_tx.send((state, Some(ack_tx))).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

// ── Single-flight guard ──────────────────────────────────────────

struct RecoveryGuard<'a>(&'a AtomicBool);

impl<'a> RecoveryGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RecoveryGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ── Indicator worker ─────────────────────────────────────────────

/// Applies indicator updates in order. Failures are logged, never raised.
async fn indicator_task<I: StatusIndicator>(
    indicator: I,
    mut rx: mpsc::UnboundedReceiver<IndicatorRequest>,
) {
    while let Some((state, ack)) = rx.recv().await {
        if let Err(e) = indicator.set(state).await {
            warn!(%state, error = %e, "status indicator update failed");
        }
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_guard_is_single_flight() {
        let flag = AtomicBool::new(false);
        let first = RecoveryGuard::try_acquire(&flag);
        assert!(first.is_some());
        assert!(RecoveryGuard::try_acquire(&flag).is_none());
        drop(first);
        assert!(RecoveryGuard::try_acquire(&flag).is_some());
    }
}
