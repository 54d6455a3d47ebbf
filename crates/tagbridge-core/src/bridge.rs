// ── Bridge ──
//
// Wires the supervisor, the change pipeline and the sweep around one link
// and dispatches the link's event stream until shutdown or a fatal error.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::catalog::TagCatalog;
use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::indicator::StatusIndicator;
use crate::link::{ControllerLink, LinkEvent, LinkEvents};
use crate::pipeline::ChangePipeline;
use crate::sink::ReadingSink;
use crate::supervisor::{Recovery, Supervisor};
use crate::sweep::SweepScheduler;

/// A controller-to-sink connector.
pub struct Bridge<L: ControllerLink, S: ReadingSink> {
    supervisor: Supervisor<L>,
    pipeline: ChangePipeline,
    sweep: SweepScheduler<L, S>,
}

impl<L: ControllerLink, S: ReadingSink> Bridge<L, S> {
    /// Validate `config`, subscribe every catalog tag on `link` and
    /// assemble the components. Must be called inside a Tokio runtime.
    pub fn new<I: StatusIndicator>(
        link: Arc<L>,
        catalog: TagCatalog,
        sink: S,
        indicator: I,
        config: BridgeConfig,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        for tag in &catalog {
            link.subscribe(tag);
        }
        let catalog = Arc::new(catalog);
        let sink = Arc::new(sink);

        let sweep = SweepScheduler::new(
            Arc::clone(&link),
            Arc::clone(&catalog),
            Arc::clone(&sink),
            config.sweep_interval,
        );
        let pipeline = ChangePipeline::new(catalog, sink);
        let supervisor = Supervisor::new(link, indicator, config);

        Ok(Self {
            supervisor,
            pipeline,
            sweep,
        })
    }

    pub fn supervisor(&self) -> &Supervisor<L> {
        &self.supervisor
    }

    pub fn sweep(&self) -> &SweepScheduler<L, S> {
        &self.sweep
    }

    /// Connect, start scanning, and process link events.
    ///
    /// Returns `Ok` after `shutdown` fires and `Err` when the controller
    /// cannot be (re)connected within the retry budget or the event stream
    /// ends.
    pub async fn run(
        self,
        mut events: LinkEvents,
        shutdown: CancellationToken,
    ) -> Result<(), CoreError> {
        let established = tokio::select! {
            biased;
            () = shutdown.cancelled() => None,
            res = self.supervisor.establish() => Some(res),
        };
        let Some(established) = established else {
            info!("shutdown requested before the controller connected");
            self.supervisor.shutdown().await;
            return Ok(());
        };
        established?;
        self.supervisor.start_scanning()?;

        let tasks = shutdown.child_token();
        let scan_interval = self.supervisor.config().scan_interval;
        self.sweep
            .spawn_after_first_scan(self.supervisor.first_scan(), scan_interval, tasks.clone());
        self.sweep.spawn_periodic(tasks.clone());

        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<CoreError>();

        let result = loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("shutdown requested");
                    break Ok(());
                }
                Some(err) = fatal_rx.recv() => {
                    error!(error = %err, "controller link lost");
                    break Err(err);
                }
                event = events.recv() => match event {
                    None => break Err(CoreError::LinkClosed),
                    Some(LinkEvent::Fault { session, reason }) => {
                        self.spawn_recovery(session, reason, fatal_tx.clone());
                    }
                    Some(event) => {
                        self.pipeline.dispatch(&event);
                    }
                },
            }
        };

        tasks.cancel();
        self.supervisor.shutdown().await;
        result
    }

    fn spawn_recovery(
        &self,
        session: u64,
        reason: String,
        fatal: mpsc::UnboundedSender<CoreError>,
    ) {
        let supervisor = self.supervisor.clone();
        tokio::spawn(async move {
            match supervisor.on_link_error(session, &reason).await {
                Ok(Recovery::Restored { attempts }) => {
                    info!(session, attempts, "controller link restored");
                }
                Ok(outcome) => debug!(session, ?outcome, "fault needed no recovery"),
                Err(CoreError::Cancelled) => debug!(session, "recovery abandoned for shutdown"),
                Err(e) => {
                    let _ = fatal.send(e);
                }
            }
        });
    }
}
