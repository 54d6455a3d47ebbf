// ── Runtime connector configuration ──
//
// These types describe *how* to reach the controller and how hard to try.
// They never touch disk: the binary builds a `BridgeConfig` (via
// tagbridge-config) and hands it in.

use std::time::Duration;

use crate::error::CoreError;

/// Bounded exponential backoff for connect attempts.
///
/// The delay after failed attempt `n` (1-based) is
/// `initial_delay × multiplier^(n-1)`, uncapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total connect attempts per establish cycle. Always `>= 1`.
    pub max_attempts: u32,
    /// Wait after the first failed attempt.
    pub initial_delay: Duration,
    /// Growth factor between consecutive waits.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Result<Self, CoreError> {
        let policy = Self {
            max_attempts,
            initial_delay,
            ..Self::default()
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_attempts == 0 {
            return Err(CoreError::Config {
                message: "retry.max_attempts must be at least 1".into(),
            });
        }
        if self.multiplier == 0 {
            return Err(CoreError::Config {
                message: "retry.multiplier must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Delay to wait after failed attempt `attempt` (1-based) before the
    /// next one. Saturates instead of overflowing for absurd attempt counts.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.saturating_pow(exponent);
        self.initial_delay.saturating_mul(factor)
    }
}

/// Optional cooldown applied when a fault follows a reconnect too closely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlapGuard {
    /// A session shorter than this counts as flapping.
    pub min_uptime: Duration,
    /// Extra wait before re-establishing a flapping session.
    pub cooldown: Duration,
}

/// Configuration for one controller connection.
///
/// Built by the binary and passed to the `Supervisor`; core never reads
/// environment or files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Controller address as understood by the link's driver.
    pub address: String,
    /// CPU slot of the controller.
    pub slot: u8,
    /// Poll period of the link's scan.
    pub scan_interval: Duration,
    /// Connect retry protocol, shared by startup and recovery.
    pub retry: RetryPolicy,
    /// Period of the unconditional full sweep.
    pub sweep_interval: Duration,
    /// Flapping protection for recovery; `None` reconnects immediately.
    pub flap_guard: Option<FlapGuard>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            address: "192.168.1.10".into(),
            slot: 0,
            scan_interval: Duration::from_millis(200),
            retry: RetryPolicy::default(),
            sweep_interval: Duration::from_secs(60),
            flap_guard: None,
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        self.retry.validate()?;
        if self.address.trim().is_empty() {
            return Err(CoreError::Config {
                message: "controller.address must not be empty".into(),
            });
        }
        if self.scan_interval.is_zero() {
            return Err(CoreError::Config {
                message: "controller.scan_interval must be greater than zero".into(),
            });
        }
        if self.sweep_interval.is_zero() {
            return Err(CoreError::Config {
                message: "sweep.interval must be greater than zero".into(),
            });
        }
        Ok(())
    }
}
