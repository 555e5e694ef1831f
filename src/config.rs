use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_LEASE: Duration = Duration::from_secs(60);
/// Upper bound for `poll_interval` and `lease`: one year.
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Settings for an [`Outbox`](crate::Outbox) engine.
///
/// Durations are expressed in milliseconds when deserialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    /// Time between dispatch ticks.
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,
    /// Maximum number of messages claimed per cycle.
    pub batch_size: usize,
    /// How long claimed messages stay reserved for this worker.
    ///
    /// Must outlast one full claim, publish and mark-sent cycle, otherwise a
    /// second dispatcher may pick up the same rows while they are in flight.
    #[serde(rename = "lease_ms", with = "millis")]
    pub lease: Duration,
    /// Identity stamped on claimed rows.
    pub worker_id: String,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        OutboxConfig {
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            lease: DEFAULT_LEASE,
            worker_id: format!("outbox-{}", std::process::id()),
        }
    }
}

impl OutboxConfig {
    pub const ENV_POLL_INTERVAL_MS: &'static str = "OUTBOX_POLL_INTERVAL_MS";
    pub const ENV_BATCH_SIZE: &'static str = "OUTBOX_BATCH_SIZE";
    pub const ENV_LEASE_MS: &'static str = "OUTBOX_LEASE_MS";
    pub const ENV_WORKER_ID: &'static str = "OUTBOX_WORKER_ID";

    pub fn new(poll_interval: Duration) -> Self {
        OutboxConfig {
            poll_interval,
            ..Self::default()
        }
    }

    /// Set the interval between dispatch ticks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the batch size (max messages claimed per cycle).
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the lease duration for claimed messages.
    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    /// Set the worker ID (used for lease tracking).
    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    /// Build a config from `OUTBOX_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(Self::ENV_POLL_INTERVAL_MS) {
            config.poll_interval =
                Duration::from_millis(parse_number(Self::ENV_POLL_INTERVAL_MS, &raw)?);
        }
        if let Some(raw) = lookup(Self::ENV_BATCH_SIZE) {
            config.batch_size = parse_number(Self::ENV_BATCH_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(Self::ENV_LEASE_MS) {
            config.lease = Duration::from_millis(parse_number(Self::ENV_LEASE_MS, &raw)?);
        }
        if let Some(worker_id) = lookup(Self::ENV_WORKER_ID) {
            let worker_id = worker_id.trim();
            if worker_id.is_empty() {
                return Err(ConfigError::Invalid {
                    key: Self::ENV_WORKER_ID,
                    reason: "must not be empty".into(),
                });
            }
            config.worker_id = worker_id.to_string();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_duration("poll_interval", self.poll_interval)?;
        if self.batch_size == 0 {
            return Err(ConfigError::Zero("batch_size"));
        }
        check_duration("lease", self.lease)?;
        if self.worker_id.is_empty() {
            return Err(ConfigError::Invalid {
                key: "worker_id",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

fn check_duration(key: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::Zero(key));
    }
    if value > MAX_DURATION {
        return Err(ConfigError::TooLarge {
            key,
            max: MAX_DURATION,
        });
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: format!("{:?}: {}", raw, e),
    })
}

mod millis {
    use std::time::Duration;

    use serde::ser::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).map_err(|_| {
            S::Error::custom(format!("{:?} does not fit in u64 milliseconds", duration))
        })?;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
