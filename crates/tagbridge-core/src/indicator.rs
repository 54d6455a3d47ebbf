// ── Status indicator ──
//
// Renders supervisor lifecycle states as a physical or visual signal.
// Diagnostic only: failures are logged by the caller and never escalate.

use std::future::Future;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::CoreError;

/// Lifecycle states the supervisor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum IndicatorState {
    Connecting,
    Connected,
    Exhausted,
}

/// How a state should look on the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    pub color: &'static str,
    /// `0` means steady; otherwise the number of blink pulses.
    pub pulses: u8,
}

impl IndicatorState {
    pub fn signal(self) -> Signal {
        match self {
            Self::Connecting => Signal {
                color: "amber",
                pulses: 0,
            },
            Self::Connected => Signal {
                color: "green",
                pulses: 0,
            },
            Self::Exhausted => Signal {
                color: "red",
                pulses: 6,
            },
        }
    }
}

/// Receives supervisor lifecycle states.
pub trait StatusIndicator: Send + Sync + 'static {
    fn set(&self, state: IndicatorState) -> impl Future<Output = Result<(), CoreError>> + Send;
}

// ── LogIndicator ─────────────────────────────────────────────────────

/// Indicator that only logs. Used when no hardware is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogIndicator;

impl StatusIndicator for LogIndicator {
    async fn set(&self, state: IndicatorState) -> Result<(), CoreError> {
        let signal = state.signal();
        info!(%state, color = signal.color, pulses = signal.pulses, "status indicator");
        Ok(())
    }
}

// ── CommandIndicator ─────────────────────────────────────────────────

/// Indicator that runs an external program per state change.
///
/// Arguments may contain `{state}`, `{color}` and `{pulses}` placeholders,
/// e.g. `led-ctl --color {color} --blink {pulses}`.
#[derive(Debug, Clone)]
pub struct CommandIndicator {
    program: String,
    args: Vec<String>,
}

impl CommandIndicator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// The argument vector for `state`, placeholders substituted.
    pub fn render_args(&self, state: IndicatorState) -> Vec<String> {
        let signal = state.signal();
        let pulses = signal.pulses.to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{state}", state.as_ref())
                    .replace("{color}", signal.color)
                    .replace("{pulses}", &pulses)
            })
            .collect()
    }
}

impl StatusIndicator for CommandIndicator {
    async fn set(&self, state: IndicatorState) -> Result<(), CoreError> {
        let args = self.render_args(state);
        debug!(program = %self.program, ?args, "running indicator command");

        let status = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| CoreError::Indicator {
                message: format!("cannot run '{}': {e}", self.program),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(CoreError::Indicator {
                message: format!("'{}' exited with {status}", self.program),
            })
        }
    }
}

// ── AnyIndicator ─────────────────────────────────────────────────────

/// Indicator selected at runtime from configuration.
#[derive(Debug, Clone)]
pub enum AnyIndicator {
    Log(LogIndicator),
    Command(CommandIndicator),
}

impl StatusIndicator for AnyIndicator {
    async fn set(&self, state: IndicatorState) -> Result<(), CoreError> {
        match self {
            Self::Log(i) => i.set(state).await,
            Self::Command(i) => i.set(state).await,
        }
    }
}
