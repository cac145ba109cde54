use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Longest acknowledgment deadline the subsystem schedules.
pub const MAX_ACK_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What happens to the complication backlog when a new transfer is admitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplicationPolicy {
    /// Evict the oldest pending complication transfer only when at capacity.
    #[default]
    DropOldest,
    /// Every admission supersedes all pending complication transfers.
    NewestWins,
}

/// Whether inbound user-info delivered to a live subscriber is also queued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissedItemPolicy {
    /// Queue only items no subscriber consumed.
    #[default]
    RetainWhileUnsubscribed,
    /// Queue every arrival, even when a subscriber received it.
    AlwaysRetain,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubsystemConfig {
    /// Deadline, fixed at submit time, for a transfer's acknowledgment.
    #[serde(with = "humantime_serde")]
    pub ack_timeout: Duration,
    /// Max pending complication transfers.
    pub complication_capacity: usize,
    /// Eviction policy for the complication backlog.
    pub complication_policy: ComplicationPolicy,
    /// Routing of inbound user-info when a subscriber is active.
    pub missed_item_policy: MissedItemPolicy,
    /// Optional bound on the missed-item queue; oldest items drop first.
    pub missed_item_capacity: Option<usize>,
    /// Hand the queued backlog to a new user-info subscriber right away.
    pub flush_missed_on_subscribe: bool,
    /// Runtime cadence for polling the transport.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for SubsystemConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(10),
            complication_capacity: 1,
            complication_policy: ComplicationPolicy::DropOldest,
            missed_item_policy: MissedItemPolicy::RetainWhileUnsubscribed,
            missed_item_capacity: None,
            flush_missed_on_subscribe: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SubsystemConfig {
    /// Layers defaults, an optional config file, and `TANDEM_*` env vars.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with_env_prefix(config_path, "TANDEM")
    }

    fn load_with_env_prefix(
        config_path: Option<PathBuf>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("ack_timeout", "10s")?
            .set_default("complication_capacity", 1)?
            .set_default("complication_policy", "drop_oldest")?
            .set_default("missed_item_policy", "retain_while_unsubscribed")?
            .set_default("flush_missed_on_subscribe", false)?
            .set_default("poll_interval", "50ms")?;

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(Environment::with_prefix(env_prefix).try_parsing(true));

        let cfg: SubsystemConfig = builder.build()?.try_deserialize()?;
        Ok(cfg.normalized())
    }

    /// Clamps values the subsystem cannot honor.
    pub fn normalized(mut self) -> Self {
        if self.complication_capacity == 0 {
            tracing::warn!("complication_capacity of 0 is not supported; using 1");
            self.complication_capacity = 1;
        }
        if self.missed_item_capacity == Some(0) {
            tracing::warn!("missed_item_capacity of 0 is not supported; queue is unbounded");
            self.missed_item_capacity = None;
        }
        if self.poll_interval.is_zero() {
            tracing::warn!(
                default = ?DEFAULT_POLL_INTERVAL,
                "poll_interval of 0 is not supported; using default"
            );
            self.poll_interval = DEFAULT_POLL_INTERVAL;
        }
        if self.ack_timeout > MAX_ACK_TIMEOUT {
            tracing::warn!(max = ?MAX_ACK_TIMEOUT, "ack_timeout too large; capping");
            self.ack_timeout = MAX_ACK_TIMEOUT;
        }
        self
    }
}
