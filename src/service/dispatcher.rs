//! Hand-off from the link's read loop to the classifier.
//!
//! Messages are hashed by credential onto a fixed set of sequential
//! workers. Reads of one credential always land on the same worker and are
//! classified in arrival order; different credentials proceed in parallel.
//! `dispatch` only enqueues, so a slow store never stalls the read loop.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::EventClassifier;
use crate::domain::HardwareMessage;
use crate::link::MessageSink;
use crate::persistence::EventStore;

/// Credential-sharded classification workers.
#[derive(Debug)]
pub struct ShardedDispatcher {
    shards: Vec<mpsc::UnboundedSender<HardwareMessage>>,
}

impl ShardedDispatcher {
    /// Spawns `workers` (at least one) classification tasks.
    ///
    /// Workers exit once the dispatcher is dropped and their queues drain.
    #[must_use]
    pub fn spawn<S: EventStore>(classifier: Arc<EventClassifier<S>>, workers: usize) -> Self {
        let shards = (0..workers.max(1))
            .map(|index| {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(run_worker(index, Arc::clone(&classifier), rx));
                tx
            })
            .collect();
        Self { shards }
    }

    /// Number of workers.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.shards.len()
    }

    fn shard_for(&self, credential: Option<&str>) -> usize {
        let Some(credential) = credential else {
            return 0;
        };
        let mut hasher = DefaultHasher::new();
        credential.hash(&mut hasher);
        let count = u64::try_from(self.shards.len()).unwrap_or(1).max(1);
        usize::try_from(hasher.finish() % count).unwrap_or(0)
    }
}

impl MessageSink for ShardedDispatcher {
    fn dispatch(&self, message: HardwareMessage) {
        let shard = self.shard_for(message.credential_id());
        let Some(queue) = self.shards.get(shard) else {
            return;
        };
        if queue.send(message).is_err() {
            tracing::error!(shard, "classification worker gone, message dropped");
        }
    }
}

async fn run_worker<S: EventStore>(
    index: usize,
    classifier: Arc<EventClassifier<S>>,
    mut queue: mpsc::UnboundedReceiver<HardwareMessage>,
) {
    tracing::debug!(worker = index, "classification worker started");
    while let Some(message) = queue.recv().await {
        // Failures are logged and counted by the classifier.
        if let Ok(event) = classifier.classify(message).await {
            tracing::trace!(worker = index, event_id = %event.id, "classified");
        }
    }
    tracing::debug!(worker = index, "classification worker stopped");
}
