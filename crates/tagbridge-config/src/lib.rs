//! Configuration for the tagbridge connector.
//!
//! TOML file + `TAGBRIDGE_*` environment layering, sink credential
//! resolution (env var, then plaintext), and translation into the
//! `tagbridge_core` values the bridge is built from. Core never reads files
//! or the environment itself.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use tagbridge_api::{TlsMode, TransportConfig};
use tagbridge_core::{BridgeConfig, FlapGuard, RetryPolicy, Tag, TagCatalog};

/// Prefix of environment overrides, e.g. `TAGBRIDGE_CONTROLLER__ADDRESS`.
pub const ENV_PREFIX: &str = "TAGBRIDGE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API key configured for sink table '{table}'")]
    NoCredentials { table: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerSection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub sweep: SweepSection,

    #[serde(default)]
    pub recovery: RecoverySection,

    #[serde(default)]
    pub sink: SinkSection,

    #[serde(default)]
    pub indicator: IndicatorSection,

    /// Tag catalog. Defaults to the 12-word input assembly of the reference
    /// deployment.
    #[serde(default = "default_tags")]
    pub tags: Vec<TagEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            controller: ControllerSection::default(),
            retry: RetrySection::default(),
            sweep: SweepSection::default(),
            recovery: RecoverySection::default(),
            sink: SinkSection::default(),
            indicator: IndicatorSection::default(),
            tags: default_tags(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// HTTP tag gateway in front of the controller.
    #[default]
    Gateway,
    /// Synthetic values, no device needed.
    Simulated,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerSection {
    /// Controller (gateway) address.
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default)]
    pub slot: u8,

    /// Poll period, e.g. "200ms".
    #[serde(default = "default_scan_interval")]
    pub scan_interval: String,

    #[serde(default)]
    pub driver: DriverKind,

    /// HTTP request timeout for the gateway and the sink.
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// Accept self-signed certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            address: default_address(),
            slot: 0,
            scan_interval: default_scan_interval(),
            driver: DriverKind::default(),
            timeout: default_timeout(),
            insecure: false,
            ca_cert: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay: String,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepSection {
    #[serde(default = "default_sweep_interval")]
    pub interval: String,
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            interval: default_sweep_interval(),
        }
    }
}

/// Flap protection. A zero `cooldown` disables it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecoverySection {
    #[serde(default = "default_zero")]
    pub min_uptime: String,

    #[serde(default = "default_zero")]
    pub cooldown: String,
}

impl Default for RecoverySection {
    fn default() -> Self {
        Self {
            min_uptime: default_zero(),
            cooldown: default_zero(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// PostgREST-style row store.
    #[default]
    Rest,
    /// Log each reading; nothing is stored.
    Log,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkSection {
    #[serde(default)]
    pub kind: SinkKind,

    /// Row store base URL (e.g., "https://project.example.co").
    pub url: Option<String>,

    #[serde(default = "default_table")]
    pub table: String,

    /// API key in plaintext. Prefer `api_key_env`.
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,
}

impl Default for SinkSection {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            url: None,
            table: default_table(),
            api_key: None,
            api_key_env: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    #[default]
    Log,
    Command,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IndicatorSection {
    #[serde(default)]
    pub kind: IndicatorKind,

    /// Program run on each state change (`kind = "command"`).
    pub program: Option<String>,

    /// Arguments; `{state}`, `{color}` and `{pulses}` are substituted.
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TagEntry {
    pub name: String,
    pub label: Option<String>,
}

fn default_address() -> String {
    "192.168.1.10".into()
}
fn default_scan_interval() -> String {
    "200ms".into()
}
fn default_timeout() -> String {
    "10s".into()
}
fn default_max_attempts() -> u32 {
    5
}
fn default_initial_delay() -> String {
    "1s".into()
}
fn default_sweep_interval() -> String {
    "60s".into()
}
fn default_zero() -> String {
    "0s".into()
}
fn default_table() -> String {
    "plc_readings".into()
}
fn default_tags() -> Vec<TagEntry> {
    TagCatalog::reference()
        .iter()
        .map(|tag| TagEntry {
            name: tag.name().to_owned(),
            label: tag.label().map(str::to_owned),
        })
        .collect()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "tagbridge", "tagbridge").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("tagbridge");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load configuration from defaults, the TOML file and the environment.
///
/// An explicit `path` must exist; the platform default path is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) if !p.exists() => {
            return Err(ConfigError::NotFound { path: p.to_owned() });
        }
        Some(p) => p.to_owned(),
        None => config_path(),
    };

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

impl Config {
    /// Pretty TOML with the plaintext API key masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        if shown.sink.api_key.is_some() {
            shown.sink.api_key = Some("********".into());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }

    /// Validate and translate into runtime settings.
    pub fn resolve(&self) -> Result<Settings, ConfigError> {
        let bridge = self.bridge_config()?;
        let catalog = self.catalog()?;
        let transport = self.transport()?;
        let sink = self.sink_settings()?;
        let indicator = self.indicator_settings()?;

        Ok(Settings {
            bridge,
            catalog,
            driver: self.controller.driver,
            transport,
            sink,
            indicator,
        })
    }

    fn bridge_config(&self) -> Result<BridgeConfig, ConfigError> {
        let retry = RetryPolicy::new(
            self.retry.max_attempts,
            parse_duration("retry.initial_delay", &self.retry.initial_delay)?,
        )
        .map_err(|e| invalid("retry", e.to_string()))?;

        let cooldown = parse_duration("recovery.cooldown", &self.recovery.cooldown)?;
        let min_uptime = parse_duration("recovery.min_uptime", &self.recovery.min_uptime)?;
        let flap_guard = (!cooldown.is_zero()).then_some(FlapGuard {
            min_uptime,
            cooldown,
        });

        let config = BridgeConfig {
            address: self.controller.address.clone(),
            slot: self.controller.slot,
            scan_interval: parse_duration("controller.scan_interval", &self.controller.scan_interval)?,
            retry,
            sweep_interval: parse_duration("sweep.interval", &self.sweep.interval)?,
            flap_guard,
        };
        config
            .validate()
            .map_err(|e| invalid("controller", e.to_string()))?;
        Ok(config)
    }

    fn catalog(&self) -> Result<TagCatalog, ConfigError> {
        let tags = self
            .tags
            .iter()
            .map(|t| Tag::new(t.name.clone(), t.label.clone()))
            .collect();
        TagCatalog::new(tags).map_err(|e| invalid("tags", e.to_string()))
    }

    fn transport(&self) -> Result<TransportConfig, ConfigError> {
        let tls = if self.controller.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.controller.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };
        Ok(TransportConfig {
            tls,
            timeout: parse_duration("controller.timeout", &self.controller.timeout)?,
        })
    }

    fn sink_settings(&self) -> Result<SinkSettings, ConfigError> {
        match self.sink.kind {
            SinkKind::Log => Ok(SinkSettings::Log),
            SinkKind::Rest => {
                let raw = self
                    .sink
                    .url
                    .as_deref()
                    .ok_or_else(|| invalid("sink.url", "required for a rest sink"))?;
                let url = Url::parse(raw).map_err(|e| invalid("sink.url", format!("{raw}: {e}")))?;
                if self.sink.table.trim().is_empty() {
                    return Err(invalid("sink.table", "must not be empty"));
                }
                let api_key = resolve_api_key(&self.sink)?;
                Ok(SinkSettings::Rest {
                    url,
                    table: self.sink.table.clone(),
                    api_key,
                })
            }
        }
    }

    fn indicator_settings(&self) -> Result<IndicatorSettings, ConfigError> {
        match self.indicator.kind {
            IndicatorKind::Log => Ok(IndicatorSettings::Log),
            IndicatorKind::Command => {
                let program = self
                    .indicator
                    .program
                    .clone()
                    .filter(|p| !p.trim().is_empty())
                    .ok_or_else(|| invalid("indicator.program", "required for a command indicator"))?;
                Ok(IndicatorSettings::Command {
                    program,
                    args: self.indicator.args.clone(),
                })
            }
        }
    }
}

fn parse_duration(field: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|e| invalid(field, format!("'{raw}': {e}")))
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the sink API key: `api_key_env` first, then plaintext `api_key`.
pub fn resolve_api_key(sink: &SinkSection) -> Result<SecretString, ConfigError> {
    // 1. Named env var
    if let Some(ref env_name) = sink.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            if !val.is_empty() {
                return Ok(SecretString::from(val));
            }
        }
    }

    // 2. Plaintext in config
    if let Some(ref key) = sink.api_key {
        if !key.is_empty() {
            return Ok(SecretString::from(key.clone()));
        }
    }

    Err(ConfigError::NoCredentials {
        table: sink.table.clone(),
    })
}

// ── Resolved settings ───────────────────────────────────────────────

/// Validated runtime settings.
#[derive(Debug)]
pub struct Settings {
    pub bridge: BridgeConfig,
    pub catalog: TagCatalog,
    pub driver: DriverKind,
    pub transport: TransportConfig,
    pub sink: SinkSettings,
    pub indicator: IndicatorSettings,
}

#[derive(Debug)]
pub enum SinkSettings {
    Rest {
        url: Url,
        table: String,
        api_key: SecretString,
    },
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndicatorSettings {
    Log,
    Command { program: String, args: Vec<String> },
}
