//! Hardware link status and command relay types.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::LinkState;
use crate::link::LinkDiagnostics;
use crate::service::ClassifierStats;

/// Response body for `GET /api/v1/link`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkStatusResponse {
    /// Supervision state.
    pub state: LinkState,
    /// Whether consecutive failures reached the threshold.
    pub degraded: bool,
    /// Consecutive failures that make the link degraded.
    pub degraded_threshold: u32,
    /// Inbound line tallies.
    pub diagnostics: LinkDiagnostics,
    /// Classification tallies.
    pub classifier: ClassifierStats,
    /// Connected real-time subscribers.
    pub subscribers: usize,
}

/// Response body for an accepted remote command.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommandAccepted {
    /// The relayed action.
    pub action: String,
    /// Always `true`: the command was written to the agent's queue.
    pub forwarded: bool,
}
