//! Hardware agent supervisor.
//!
//! [`HardwareLink`] keeps exactly one agent process alive and exchanges
//! newline-delimited JSON with it over stdio. The supervision loop is an
//! explicit state machine:
//!
//! ```text
//!  STOPPED ──start──▶ STARTING ──first valid line──▶ RUNNING
//!                        ▲   │                         │
//!                 delay  │   └──────exit/spawn error───┤
//!                        │                             ▼
//!                        └──────────────────────── CRASHED
//!  any state ──shutdown──▶ STOPPED (no further restarts)
//! ```
//!
//! Each child runs three tasks: a stdout reader that decodes lines and
//! hands them to a [`MessageSink`] without waiting on classification, a
//! stdin writer fed by a bounded channel, and a stderr logger.

use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead, FramedWrite};
use utoipa::ToSchema;

use super::codec::{InboundFrame, IpcCodec};
use crate::config::LinkConfig;
use crate::domain::{EventBus, HardwareMessage, HubEvent, LinkState, LinkStatus, RemoteCommand};
use crate::error::GatewayError;

/// Receiver of parsed inbound messages.
///
/// `dispatch` is called from the stdout read loop and must not block.
pub trait MessageSink: Send + Sync + 'static {
    /// Takes ownership of one inbound message.
    fn dispatch(&self, message: HardwareMessage);
}

/// Diagnostic tallies kept alongside [`LinkState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkDiagnostics {
    /// Inbound lines discarded as malformed since startup.
    pub malformed_lines: u64,
}

#[derive(Debug)]
struct Shared {
    config: LinkConfig,
    state: RwLock<LinkState>,
    /// Present only while a child is alive.
    outbound: RwLock<Option<mpsc::Sender<RemoteCommand>>>,
    malformed_lines: AtomicU64,
    bus: EventBus,
}

impl Shared {
    /// Applies `update` and publishes the resulting snapshot.
    async fn transition(&self, update: impl FnOnce(&mut LinkState)) -> LinkState {
        let mut state = self.state.write().await;
        update(&mut state);
        let snapshot = state.clone();
        // Published under the lock so subscribers see transitions in order.
        self.bus.publish(HubEvent::LinkStatus {
            state: snapshot.clone(),
            timestamp: Utc::now(),
        });
        snapshot
    }

    /// STARTING → RUNNING on the first valid message of a child.
    async fn mark_healthy(&self) {
        if self.state.read().await.status != LinkStatus::Starting {
            return;
        }
        let mut promoted = false;
        let snapshot = self
            .transition(|s| {
                if s.status == LinkStatus::Starting {
                    s.status = LinkStatus::Running;
                    s.consecutive_failures = 0;
                    promoted = true;
                }
            })
            .await;
        if promoted {
            tracing::info!(restarts = snapshot.restarts, "hardware link running");
        }
    }
}

/// Supervised connection to the hardware agent process.
#[derive(Debug)]
pub struct HardwareLink {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl HardwareLink {
    /// Creates a stopped link. Status transitions are published on `bus`.
    #[must_use]
    pub fn new(config: LinkConfig, bus: EventBus) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                config,
                state: RwLock::new(LinkState::stopped()),
                outbound: RwLock::new(None),
                malformed_lines: AtomicU64::new(0),
                bus,
            }),
            shutdown,
            supervisor: Mutex::new(None),
        }
    }

    /// Spawns the agent and starts supervising it; inbound messages go to
    /// `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the link was already started
    /// or has been shut down.
    pub async fn start(&self, sink: Arc<dyn MessageSink>) -> Result<(), GatewayError> {
        let mut slot = self.supervisor.lock().await;
        if slot.is_some() || *self.shutdown.borrow() {
            return Err(GatewayError::Internal(
                "hardware link already started".to_string(),
            ));
        }
        tracing::info!(
            program = %self.shared.config.program,
            args = ?self.shared.config.args,
            "starting hardware link"
        );
        *slot = Some(tokio::spawn(supervise(
            Arc::clone(&self.shared),
            sink,
            self.shutdown.subscribe(),
        )));
        Ok(())
    }

    /// Stops restarting, kills the child, and waits for the supervisor to
    /// finish. Idempotent.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let handle = self.supervisor.lock().await.take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "hardware link supervisor panicked");
        }
    }

    /// Serializes `command` to one line on the agent's stdin.
    ///
    /// Commands are never queued for a process that is not running.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::LinkUnavailable`] unless the link is
    /// RUNNING with room in its outbound buffer.
    pub async fn send(&self, command: RemoteCommand) -> Result<(), GatewayError> {
        let status = self.shared.state.read().await.status;
        if status != LinkStatus::Running {
            return Err(GatewayError::LinkUnavailable(format!(
                "hardware agent is {}",
                status.as_str()
            )));
        }
        let sender = self.shared.outbound.read().await.clone().ok_or_else(|| {
            GatewayError::LinkUnavailable("hardware agent has exited".to_string())
        })?;
        let action = command.action();
        sender.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                GatewayError::LinkUnavailable("outbound buffer full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                GatewayError::LinkUnavailable("hardware agent has exited".to_string())
            }
        })?;
        tracing::debug!(action = action.as_str(), "command queued for hardware agent");
        Ok(())
    }

    /// Snapshot of the supervision state.
    pub async fn state(&self) -> LinkState {
        self.shared.state.read().await.clone()
    }

    /// Diagnostic tallies.
    #[must_use]
    pub fn diagnostics(&self) -> LinkDiagnostics {
        LinkDiagnostics {
            malformed_lines: self.shared.malformed_lines.load(Ordering::Relaxed),
        }
    }

    /// Consecutive failures at which health reports `degraded`.
    #[must_use]
    pub fn degraded_threshold(&self) -> u32 {
        self.shared.config.degraded_threshold
    }

    /// Whether repeated crashes have degraded the link.
    pub async fn is_degraded(&self) -> bool {
        self.state().await.is_degraded(self.degraded_threshold())
    }
}

enum AgentExit {
    /// The process exited on its own with this code (`None` for a signal).
    Exited(Option<i32>),
    /// Shutdown was requested; the process has been killed.
    Shutdown,
}

struct Agent {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    stderr: ChildStderr,
}

/// Resolves once shutdown is requested or the link handle is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn supervise(
    shared: Arc<Shared>,
    sink: Arc<dyn MessageSink>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut first_spawn = true;
    loop {
        if *shutdown.borrow() {
            break;
        }
        let restart = !first_spawn;
        first_spawn = false;
        shared
            .transition(|s| {
                s.status = LinkStatus::Starting;
                if restart {
                    s.restarts = s.restarts.saturating_add(1);
                }
            })
            .await;

        let exit_code = match spawn_agent(&shared.config) {
            Ok(agent) => match run_agent(&shared, agent, &sink, &mut shutdown).await {
                AgentExit::Exited(code) => code,
                AgentExit::Shutdown => break,
            },
            Err(e) => {
                tracing::error!(error = %e, program = %shared.config.program, "failed to spawn hardware agent");
                None
            }
        };

        let state = shared
            .transition(|s| {
                s.status = LinkStatus::Crashed;
                s.consecutive_failures = s.consecutive_failures.saturating_add(1);
                s.last_exit_code = exit_code;
            })
            .await;
        let delay = shared.config.restart.delay_for(state.consecutive_failures);
        if state.is_degraded(shared.config.degraded_threshold) {
            tracing::error!(
                consecutive_failures = state.consecutive_failures,
                "hardware link degraded"
            );
        }
        tracing::warn!(
            exit_code = ?exit_code,
            consecutive_failures = state.consecutive_failures,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "hardware agent down, restart scheduled"
        );

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = stop_requested(&mut shutdown) => break,
        }
    }

    shared.outbound.write().await.take();
    shared.transition(|s| s.status = LinkStatus::Stopped).await;
    tracing::info!("hardware link stopped");
}

fn spawn_agent(config: &LinkConfig) -> Result<Agent, GatewayError> {
    let mut child = Command::new(&config.program)
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| GatewayError::LinkUnavailable(format!("spawn failed: {e}")))?;

    let missing = |pipe: &str| GatewayError::Internal(format!("agent {pipe} not captured"));
    let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

    Ok(Agent {
        child,
        stdin,
        stdout,
        stderr,
    })
}

async fn run_agent(
    shared: &Arc<Shared>,
    agent: Agent,
    sink: &Arc<dyn MessageSink>,
    shutdown: &mut watch::Receiver<bool>,
) -> AgentExit {
    let Agent {
        mut child,
        stdin,
        stdout,
        stderr,
    } = agent;
    tracing::info!(pid = ?child.id(), "hardware agent spawned");

    let (tx, rx) = mpsc::channel(shared.config.outbound_capacity.max(1));
    let writer = tokio::spawn(write_commands(stdin, rx, shared.config.max_line_bytes));
    *shared.outbound.write().await = Some(tx);
    let mut reader = tokio::spawn(read_messages(
        Arc::clone(shared),
        stdout,
        Arc::clone(sink),
    ));
    let mut diagnostics = tokio::spawn(log_stderr(stderr, shared.config.max_line_bytes));

    let exit = tokio::select! {
        status = child.wait() => Some(status),
        () = stop_requested(shutdown) => None,
    };

    // Nothing may be written to a process that is gone or going.
    shared.outbound.write().await.take();
    writer.abort();

    let Some(status) = exit else {
        if let Err(e) = child.kill().await {
            tracing::warn!(error = %e, "failed to kill hardware agent");
        }
        reader.abort();
        diagnostics.abort();
        tracing::info!("hardware agent terminated for shutdown");
        return AgentExit::Shutdown;
    };

    // Deliver whatever the agent printed before it exited, exactly once.
    let drain = shared.config.drain_timeout;
    if tokio::time::timeout(drain, &mut reader).await.is_err() {
        reader.abort();
    }
    if tokio::time::timeout(drain, &mut diagnostics).await.is_err() {
        diagnostics.abort();
    }

    match status {
        Ok(status) => {
            tracing::warn!(%status, "hardware agent exited");
            AgentExit::Exited(status.code())
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to wait on hardware agent");
            AgentExit::Exited(None)
        }
    }
}

async fn read_messages(shared: Arc<Shared>, stdout: ChildStdout, sink: Arc<dyn MessageSink>) {
    let mut frames = FramedRead::new(stdout, IpcCodec::new(shared.config.max_line_bytes));
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(InboundFrame::Message(message)) => {
                shared.mark_healthy().await;
                sink.dispatch(message);
            }
            Ok(InboundFrame::Malformed(reason)) => {
                let total = shared
                    .malformed_lines
                    .fetch_add(1, Ordering::Relaxed)
                    .saturating_add(1);
                tracing::debug!(%reason, malformed_lines = total, "discarded line from hardware agent");
            }
            Err(e) => {
                tracing::warn!(error = %e, "hardware agent stdout closed with error");
                break;
            }
        }
    }
}

async fn write_commands(
    stdin: ChildStdin,
    mut commands: mpsc::Receiver<RemoteCommand>,
    max_line_bytes: usize,
) {
    let mut lines = FramedWrite::new(stdin, IpcCodec::new(max_line_bytes));
    while let Some(command) = commands.recv().await {
        let action = command.action();
        if let Err(e) = lines.send(command).await {
            tracing::warn!(error = %e, action = action.as_str(), "failed to write command to hardware agent");
            break;
        }
        tracing::debug!(action = action.as_str(), "command written to hardware agent");
    }
}

async fn log_stderr(stderr: ChildStderr, max_line_bytes: usize) {
    let codec = AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), Vec::new(), max_line_bytes);
    let mut lines = FramedRead::new(stderr, codec);
    while let Some(Ok(line)) = lines.next().await {
        let line = String::from_utf8_lossy(&line);
        let line = line.trim_end();
        if !line.is_empty() {
            tracing::warn!(target: "hardware_agent", "{line}");
        }
    }
}
