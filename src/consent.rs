//! Bounded tracking of file consent prompts awaiting cleanup.
//!
//! Once the platform calls back about a consent prompt, the prompt message is
//! stale and should be removed from the chat. Message handlers only enqueue
//! the prompt here; a single background reclaimer deletes it later so the
//! handler never waits on the connector.
//!
//! The store holds at most [`CONSENT_BUFFER_SIZE`] entries. Tracking into a
//! full store evicts the oldest entry, so `track` never blocks and never
//! fails. An evicted prompt simply stays visible in the chat.

use crate::messaging::TransportDyn;
use crate::ConversationReference;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;

/// Maximum number of prompts tracked at once.
pub const CONSENT_BUFFER_SIZE: usize = 100;

/// A consent prompt whose message should be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConsent {
    pub prompt_id: String,
    pub destination: ConversationReference,
}

/// Reclaimer worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimerState {
    Waiting,
    Deleting,
    Stopped,
}

struct Inner {
    queue: Mutex<VecDeque<PendingConsent>>,
    capacity: usize,
    notify: Notify,
}

/// FIFO store of pending consents, cheap to clone and share between handlers.
#[derive(Clone)]
pub struct ConsentTracker {
    inner: Arc<Inner>,
}

impl Default for ConsentTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsentTracker {
    pub fn new() -> Self {
        Self::with_capacity(CONSENT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                notify: Notify::new(),
            }),
        }
    }

    /// Track a prompt for deletion. Returns the entry evicted to make room, if any.
    pub fn track(
        &self,
        prompt_id: impl Into<String>,
        destination: ConversationReference,
    ) -> Option<PendingConsent> {
        let consent = PendingConsent {
            prompt_id: prompt_id.into(),
            destination,
        };

        let evicted = {
            let mut queue = self.inner.queue.lock();
            let evicted = if queue.len() >= self.inner.capacity {
                queue.pop_front()
            } else {
                None
            };
            queue.push_back(consent);
            evicted
        };

        if let Some(evicted) = &evicted {
            tracing::debug!(prompt_id = %evicted.prompt_id, "consent store full, dropped oldest prompt");
        }
        self.inner.notify.notify_one();
        evicted
    }

    pub fn len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.queue.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Snapshot of tracked prompts, oldest first.
    pub fn pending(&self) -> Vec<PendingConsent> {
        self.inner.queue.lock().iter().cloned().collect()
    }

    fn pop(&self) -> Option<PendingConsent> {
        self.inner.queue.lock().pop_front()
    }

    /// Spawn the background worker that deletes tracked prompts until
    /// `shutdown` is cancelled.
    pub fn spawn_reclaimer(
        &self,
        transport: Arc<dyn TransportDyn>,
        shutdown: CancellationToken,
    ) -> Reclaimer {
        let (state_tx, state_rx) = watch::channel(ReclaimerState::Waiting);
        let tracker = self.clone();
        let handle = tokio::spawn(async move {
            tracker.reclaim(transport, shutdown, state_tx).await;
        });
        Reclaimer {
            handle,
            state: state_rx,
        }
    }

    async fn reclaim(
        &self,
        transport: Arc<dyn TransportDyn>,
        shutdown: CancellationToken,
        state: watch::Sender<ReclaimerState>,
    ) {
        tracing::debug!("consent reclaimer started");
        loop {
            state.send_replace(ReclaimerState::Waiting);
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = self.inner.notify.notified() => {}
            }

            while let Some(consent) = self.pop() {
                if shutdown.is_cancelled() {
                    break;
                }
                state.send_replace(ReclaimerState::Deleting);
                tracing::debug!(prompt_id = %consent.prompt_id, "deleting consent prompt");
                if let Err(error) = transport
                    .delete_activity(&consent.prompt_id, &consent.destination)
                    .await
                {
                    tracing::warn!(
                        %error,
                        prompt_id = %consent.prompt_id,
                        "failed to delete consent prompt"
                    );
                }
            }
        }
        state.send_replace(ReclaimerState::Stopped);
        tracing::debug!("consent reclaimer stopped");
    }
}

/// Handle to the running reclaimer.
pub struct Reclaimer {
    handle: tokio::task::JoinHandle<()>,
    state: watch::Receiver<ReclaimerState>,
}

impl Reclaimer {
    pub fn state(&self) -> ReclaimerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReclaimerState> {
        self.state.clone()
    }

    /// Wait for the worker to finish after its shutdown token was cancelled.
    pub async fn join(self) {
        if let Err(error) = self.handle.await {
            tracing::error!(%error, "consent reclaimer panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingTransport, activity};
    use std::time::Duration;

    fn destination() -> ConversationReference {
        activity("", "personal").conversation_reference()
    }

    #[test]
    fn evicts_oldest_when_full() {
        let tracker = ConsentTracker::new();
        for index in 0..CONSENT_BUFFER_SIZE {
            assert!(tracker.track(format!("prompt-{index}"), destination()).is_none());
        }

        let evicted = tracker
            .track("prompt-100", destination())
            .expect("oldest entry should be evicted");

        assert_eq!(evicted.prompt_id, "prompt-0");
        assert_eq!(tracker.len(), CONSENT_BUFFER_SIZE);
        let pending = tracker.pending();
        assert_eq!(pending.first().map(|c| c.prompt_id.as_str()), Some("prompt-1"));
        assert_eq!(pending.last().map(|c| c.prompt_id.as_str()), Some("prompt-100"));
    }

    #[test]
    fn eviction_follows_insertion_order() {
        let tracker = ConsentTracker::with_capacity(3);
        for id in ["a", "b", "c"] {
            tracker.track(id, destination());
        }

        let evicted: Vec<String> = ["d", "e"]
            .into_iter()
            .filter_map(|id| tracker.track(id, destination()))
            .map(|consent| consent.prompt_id)
            .collect();

        assert_eq!(evicted, vec!["a", "b"]);
        let remaining: Vec<String> = tracker.pending().into_iter().map(|c| c.prompt_id).collect();
        assert_eq!(remaining, vec!["c", "d", "e"]);
    }

    #[test]
    fn concurrent_tracking_never_exceeds_capacity() {
        let tracker = ConsentTracker::with_capacity(10);
        let threads: Vec<_> = (0..8)
            .map(|thread| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for index in 0..50 {
                        tracker.track(format!("{thread}-{index}"), destination());
                        assert!(tracker.len() <= 10);
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().expect("tracking thread panicked");
        }

        assert_eq!(tracker.len(), 10);
    }

    #[tokio::test]
    async fn reclaimer_deletes_tracked_prompts_in_order() {
        let tracker = ConsentTracker::new();
        let transport = Arc::new(RecordingTransport::new());
        let shutdown = CancellationToken::new();
        let reclaimer = tracker.spawn_reclaimer(transport.clone(), shutdown.clone());

        tracker.track("prompt-1", destination());
        tracker.track("prompt-2", destination());
        transport.wait_for_deletions(2).await;

        assert_eq!(transport.deleted_ids(), vec!["prompt-1", "prompt-2"]);
        assert!(tracker.is_empty());

        shutdown.cancel();
        let mut state = reclaimer.subscribe();
        reclaimer.join().await;
        assert_eq!(*state.borrow_and_update(), ReclaimerState::Stopped);
    }

    #[tokio::test]
    async fn deletion_failure_does_not_stop_the_worker() {
        let tracker = ConsentTracker::new();
        let transport = Arc::new(RecordingTransport::failing_deletes());
        let shutdown = CancellationToken::new();
        let reclaimer = tracker.spawn_reclaimer(transport.clone(), shutdown.clone());

        tracker.track("prompt-1", destination());
        transport.wait_for_deletions(1).await;
        tracker.track("prompt-2", destination());
        transport.wait_for_deletions(2).await;

        let mut state = reclaimer.subscribe();
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|state| *state == ReclaimerState::Waiting),
        )
        .await
        .expect("worker should return to waiting")
        .expect("state channel open");

        shutdown.cancel();
        reclaimer.join().await;
    }

    #[tokio::test]
    async fn shutdown_while_waiting_stops_worker() {
        let tracker = ConsentTracker::new();
        let transport = Arc::new(RecordingTransport::new());
        let shutdown = CancellationToken::new();
        let reclaimer = tracker.spawn_reclaimer(transport.clone(), shutdown.clone());
        assert_ne!(reclaimer.state(), ReclaimerState::Stopped);

        shutdown.cancel();
        let state = reclaimer.subscribe();
        tokio::time::timeout(Duration::from_secs(5), reclaimer.join())
            .await
            .expect("reclaimer should stop promptly");

        assert_eq!(*state.borrow(), ReclaimerState::Stopped);
        assert!(transport.calls().is_empty());
    }
}
