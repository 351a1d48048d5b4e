//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Missing or unparsable numeric values
//! fall back to their defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Event store settings.
    pub database: DatabaseConfig,

    /// Hardware agent supervision settings.
    pub link: LinkConfig,

    /// Number of sequential classification workers.
    pub classifier_workers: usize,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,

    /// Default page size for `GET /api/v1/events`.
    pub recent_events_limit: u32,

    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,

    /// Optional directory of frontend assets served at `/`.
    pub static_dir: Option<PathBuf>,

    /// Emit logs as JSON instead of human-readable text.
    pub json_logs: bool,
}

/// Event store connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// SQLite connection string, e.g. `sqlite://database/main.db`.
    pub url: String,

    /// Maximum number of pooled connections.
    pub max_connections: u32,

    /// Timeout in seconds for acquiring a connection.
    pub connect_timeout_secs: u64,
}

/// Hardware agent process and supervision settings.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Program to spawn.
    pub program: String,

    /// Arguments passed to the program.
    pub args: Vec<String>,

    /// Delay between an exit and the next spawn.
    pub restart: RestartPolicy,

    /// Consecutive failures after which health reports `degraded`.
    pub degraded_threshold: u32,

    /// Longest inbound line accepted, in bytes.
    pub max_line_bytes: usize,

    /// Outbound command buffer while the process is running.
    pub outbound_capacity: usize,

    /// How long to wait for buffered stdout after the process exits.
    pub drain_timeout: Duration,
}

/// Restart delay policy: exponential backoff from `base_delay`, capped at
/// `max_delay`. Equal values give a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Upper bound for the delay.
    pub max_delay: Duration,
}

/// Smallest base restart delay accepted from the environment.
pub const MIN_RESTART_DELAY: Duration = Duration::from_millis(100);

impl RestartPolicy {
    /// Builds a policy from configured milliseconds. The base delay is raised
    /// to [`MIN_RESTART_DELAY`] and the cap to at least the base.
    #[must_use]
    pub fn from_millis(base_ms: u64, max_ms: u64) -> Self {
        let base_delay = Duration::from_millis(base_ms).max(MIN_RESTART_DELAY);
        Self {
            base_delay,
            max_delay: Duration::from_millis(max_ms).max(base_delay),
        }
    }

    /// Fixed delay, no backoff.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            base_delay: delay,
            max_delay: delay,
        }
    }

    /// Delay before the restart that follows the `consecutive_failures`-th
    /// failure in a row (1-based).
    #[must_use]
    pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
        let doublings = consecutive_failures.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1_u32 << doublings)
            .min(self.max_delay.max(self.base_delay))
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl LinkConfig {
    /// Builds a config for `program` with default supervision settings.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            restart: RestartPolicy::default(),
            degraded_threshold: 5,
            max_line_bytes: 64 * 1024,
            outbound_capacity: 64,
            drain_timeout: Duration::from_secs(1),
        }
    }
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()?;

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://database/main.db".to_string()),
            max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 5),
            connect_timeout_secs: parse_env("DATABASE_CONNECT_TIMEOUT_SECS", 5),
        };

        let program = std::env::var("HARDWARE_COMMAND").unwrap_or_else(|_| "python3".to_string());
        let args = std::env::var("HARDWARE_ARGS")
            .unwrap_or_else(|_| "hardware/main.py".to_string())
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let defaults = LinkConfig::new(program, args);
        let link = LinkConfig {
            restart: RestartPolicy::from_millis(
                parse_env("HARDWARE_RESTART_DELAY_MS", 1_000),
                parse_env("HARDWARE_MAX_RESTART_DELAY_MS", 30_000),
            ),
            degraded_threshold: parse_env("HARDWARE_DEGRADED_THRESHOLD", defaults.degraded_threshold),
            max_line_bytes: parse_env("HARDWARE_MAX_LINE_BYTES", defaults.max_line_bytes),
            outbound_capacity: parse_env("HARDWARE_OUTBOUND_CAPACITY", defaults.outbound_capacity),
            ..defaults
        };

        let static_dir = std::env::var("STATIC_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            listen_addr,
            database,
            link,
            classifier_workers: parse_env("CLASSIFIER_WORKERS", 4_usize).max(1),
            event_bus_capacity: parse_env("EVENT_BUS_CAPACITY", 1_024),
            recent_events_limit: parse_env("RECENT_EVENTS_LIMIT", 50_u32).clamp(1, 500),
            request_timeout: Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", 30)),
            static_dir,
            json_logs: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let policy = RestartPolicy {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
        assert_eq!(policy.delay_for(400), Duration::from_secs(5));
    }

    #[test]
    fn fixed_policy_never_grows() {
        let policy = RestartPolicy::fixed(Duration::from_millis(250));
        for failures in 0..10 {
            assert_eq!(policy.delay_for(failures), Duration::from_millis(250));
        }
    }

    #[test]
    fn zero_configured_delay_is_raised_to_minimum() {
        let policy = RestartPolicy::from_millis(0, 0);
        assert_eq!(policy.base_delay, MIN_RESTART_DELAY);
        assert_eq!(policy.max_delay, MIN_RESTART_DELAY);
        for failures in 1..5 {
            assert!(policy.delay_for(failures) >= MIN_RESTART_DELAY);
        }
    }

    #[test]
    fn configured_delays_above_minimum_are_kept() {
        let policy = RestartPolicy::from_millis(250, 4_000);
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(10), Duration::from_millis(4_000));
    }

    #[test]
    fn default_policy_starts_at_one_second() {
        assert_eq!(
            RestartPolicy::default().delay_for(1),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn parse_env_falls_back_on_missing_key() {
        let value: u32 = parse_env("ACCESS_GATEWAY_TEST_SURELY_UNSET", 7);
        assert_eq!(value, 7);
    }
}
