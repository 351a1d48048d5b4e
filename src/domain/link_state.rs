//! Supervision state of the hardware link.

use serde::Serialize;
use utoipa::ToSchema;

/// Lifecycle status of the hardware agent process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    /// Not started, or shut down.
    Stopped,
    /// Spawned, waiting for the first valid message.
    Starting,
    /// Spawned and has produced at least one valid message.
    Running,
    /// Exited; a restart is scheduled.
    Crashed,
}

impl LinkStatus {
    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "STOPPED",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Crashed => "CRASHED",
        }
    }
}

/// Process-wide supervision state.
///
/// Mutated only by the supervisor; everybody else reads snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkState {
    /// Current status.
    pub status: LinkStatus,
    /// Exits since the last valid message; reset to 0 by a healthy restart.
    pub consecutive_failures: u32,
    /// Exit code of the previous process, `None` if killed by a signal or
    /// never exited.
    pub last_exit_code: Option<i32>,
    /// Total number of restarts since the gateway started.
    pub restarts: u64,
}

impl LinkState {
    /// Initial state before [`crate::link::HardwareLink::start`].
    #[must_use]
    pub const fn stopped() -> Self {
        Self {
            status: LinkStatus::Stopped,
            consecutive_failures: 0,
            last_exit_code: None,
            restarts: 0,
        }
    }

    /// Whether crash recovery has failed often enough to report degraded
    /// health.
    #[must_use]
    pub const fn is_degraded(&self, threshold: u32) -> bool {
        self.consecutive_failures >= threshold
    }
}

impl Default for LinkState {
    fn default() -> Self {
        Self::stopped()
    }
}
