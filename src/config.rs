use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Timing defaults for the demo routes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub interval_ms: u64,
    pub initial_delay_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    /// Heartbeat byte, given as a one-character string.
    pub heartbeat: char,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            initial_delay_ms: None,
            timeout_ms: Some(30_000),
            heartbeat: ' ',
        }
    }
}

impl DelayConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn initial_delay(&self) -> Option<Duration> {
        self.initial_delay_ms.map(Duration::from_millis)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// The heartbeat as a single byte; non-ASCII falls back to a space.
    pub fn heartbeat_byte(&self) -> u8 {
        if self.heartbeat.is_ascii() {
            self.heartbeat as u8
        } else {
            b' '
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    pub delay: DelayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            delay: DelayConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration.
    ///
    /// `HOLDFAST_CONFIG` names an optional YAML file; `LISTEN`,
    /// `HOLDFAST_INTERVAL_MS` and `HOLDFAST_TIMEOUT_MS` override it.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("HOLDFAST_CONFIG") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config {path}"))?;
                Self::from_yaml(&raw)?
            }
            Err(_) => Self::default(),
        };

        if let Ok(addr) = std::env::var("LISTEN") {
            cfg.listen_addr = addr;
        }
        if let Ok(ms) = std::env::var("HOLDFAST_INTERVAL_MS") {
            cfg.delay.interval_ms = ms.parse().context("HOLDFAST_INTERVAL_MS")?;
        }
        if let Ok(ms) = std::env::var("HOLDFAST_TIMEOUT_MS") {
            cfg.delay.timeout_ms = Some(ms.parse().context("HOLDFAST_TIMEOUT_MS")?);
        }
        Ok(cfg)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(raw).context("invalid YAML config")?;
        if cfg.delay.interval_ms == 0 {
            anyhow::bail!("delay.interval_ms must be positive");
        }
        Ok(cfg)
    }
}
