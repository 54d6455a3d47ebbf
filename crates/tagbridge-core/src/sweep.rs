// ── Sweep scheduler ──
//
// Pushes the current value of every catalog tag regardless of change: once
// shortly after the first scan starts, then on a fixed period for the life
// of the process.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::catalog::TagCatalog;
use crate::link::ControllerLink;
use crate::model::{Reading, ReadingCause};
use crate::pipeline::push;
use crate::sink::ReadingSink;

/// Tally of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub pushed: usize,
    pub failed: usize,
    /// Tags with no value yet in the current session.
    pub skipped: usize,
}

/// Full-catalog sweeps over a shared link and sink.
pub struct SweepScheduler<L: ControllerLink, S: ReadingSink> {
    inner: Arc<SweepInner<L, S>>,
}

impl<L: ControllerLink, S: ReadingSink> Clone for SweepScheduler<L, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SweepInner<L, S> {
    link: Arc<L>,
    catalog: Arc<TagCatalog>,
    sink: Arc<S>,
    period: Duration,
}

impl<L: ControllerLink, S: ReadingSink> SweepScheduler<L, S> {
    pub fn new(link: Arc<L>, catalog: Arc<TagCatalog>, sink: Arc<S>, period: Duration) -> Self {
        Self {
            inner: Arc::new(SweepInner {
                link,
                catalog,
                sink,
                period,
            }),
        }
    }

    /// Push one reading per catalog tag, in catalog order, from the values
    /// the link holds right now. A failed push is logged and the sweep
    /// moves on.
    pub async fn sweep(&self) -> SweepReport {
        let inner = &self.inner;
        let mut report = SweepReport::default();

        for tag in inner.catalog.iter() {
            let Some(value) = inner.link.value(tag.name()) else {
                debug!(tag = %tag.name(), "no value yet, skipped in sweep");
                report.skipped += 1;
                continue;
            };
            let reading = Reading::now(tag, value, ReadingCause::Sweep);
            if push(inner.sink.as_ref(), &reading).await {
                report.pushed += 1;
            } else {
                report.failed += 1;
            }
        }

        info!(
            pushed = report.pushed,
            failed = report.failed,
            skipped = report.skipped,
            "sweep complete"
        );
        report
    }

    /// One sweep, `delay` after `first_scan` turns `true`.
    pub fn spawn_after_first_scan(
        &self,
        mut first_scan: watch::Receiver<bool>,
        delay: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let started = tokio::select! {
                biased;
                () = cancel.cancelled() => false,
                res = first_scan.wait_for(|started| *started) => res.is_ok(),
            };
            if !started {
                return;
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    debug!("initial sweep");
                    this.sweep().await;
                }
            }
        })
    }

    /// Sweep every period until `cancel` fires.
    pub fn spawn_periodic(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(this.inner.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the initial sweep covers it.
            interval.tick().await;

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        this.sweep().await;
                    }
                }
            }
        })
    }
}
