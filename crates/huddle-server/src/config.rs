//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Configuration for the Huddle relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `5000`; `0` auto-assigns).
    pub port: u16,
    /// Per-connection outbound queue length, in messages.
    pub send_queue_capacity: usize,
    /// Seconds between server pings.
    pub heartbeat_interval_secs: u64,
    /// Seconds of silence before a client is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Seconds a single socket write may take.
    pub write_timeout_secs: u64,
    /// Largest inbound chat message in bytes. A client that sends more is
    /// disconnected.
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            send_queue_capacity: 256,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            write_timeout_secs: 10,
            max_message_size: 1024 * 1024, // 1 MiB
        }
    }
}

impl ServerConfig {
    /// Interval between pings. Never zero.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }

    /// Silence allowed before disconnecting.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs.max(1))
    }

    /// Upper bound on a single socket write.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs.max(1))
    }

    /// Apply `HUDDLE_*` tuning overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply `HUDDLE_*` tuning overrides from `lookup`.
    ///
    /// Unparseable or zero values are logged and ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        override_from(&lookup, "HUDDLE_SEND_QUEUE", &mut self.send_queue_capacity);
        override_from(&lookup, "HUDDLE_HEARTBEAT_INTERVAL", &mut self.heartbeat_interval_secs);
        override_from(&lookup, "HUDDLE_HEARTBEAT_TIMEOUT", &mut self.heartbeat_timeout_secs);
        override_from(&lookup, "HUDDLE_WRITE_TIMEOUT", &mut self.write_timeout_secs);
        override_from(&lookup, "HUDDLE_MAX_MESSAGE_SIZE", &mut self.max_message_size);
    }
}

fn override_from<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T)
where
    T: std::str::FromStr + PartialEq + Default,
{
    let Some(raw) = lookup(key) else { return };
    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => *slot = value,
        _ => warn!(key, value = %raw, "ignoring invalid config override"),
    }
}
