//! Throttled, serialized edits to a remote editable message
//!
//! Progress updates are delivered by repeatedly replacing the text of one
//! remote message. The endpoint is flaky: edits can be rate limited, the
//! message can be deleted out from under us, and concurrent edits to the same
//! message race on the wire. [`NotifyThrottle`] serializes edits per target,
//! retries transient failures exactly once, and permanently suppresses edits
//! to targets that no longer resolve.
//!
//! Dispatch is fire-and-forget: scheduling an edit never blocks the producing
//! pipeline. The throttle keeps handles to in-flight dispatches so an owner
//! can drain them at shutdown.

use crate::config::NotifyConfig;
use crate::error::NotifyError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;

/// Stable identity of an editable notification message: (container id, message id)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId {
    /// Identifier of the container (chat, channel, room) holding the message
    pub container: i64,
    /// Identifier of the message within the container
    pub message: i64,
}

impl TargetId {
    /// Create a target identity from container and message ids
    pub fn new(container: i64, message: i64) -> Self {
        Self { container, message }
    }
}

/// A remote, editable message that progress text can be written to
///
/// Implemented by an adapter over the real transport's message type.
#[async_trait]
pub trait Notifiable: Send + Sync {
    /// The stable identity key for this message
    fn target_id(&self) -> TargetId;

    /// Replace the displayed text of the message
    async fn edit_text(&self, text: &str) -> Result<(), NotifyError>;

    /// Remove the message. Best-effort; failures are ignored by callers.
    async fn delete(&self) {}
}

/// Outcome of one edit dispatch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    /// The edit landed on the remote endpoint
    Applied,
    /// The target is dead; no network call was made
    Skipped,
    /// The edit failed after the single retry (or permanently)
    Failed,
}

/// Serializes and rate-bounds edits to editable-message targets
///
/// One instance is constructed per process (owned by the downloader facade)
/// and shared by reference with every job. All three registries are keyed by
/// [`TargetId`] and created lazily on first use.
pub struct NotifyThrottle {
    locks: Mutex<HashMap<TargetId, Arc<tokio::sync::Mutex<()>>>>,
    last_edit: Mutex<HashMap<TargetId, Instant>>,
    dead: Mutex<HashSet<TargetId>>,
    pending: Mutex<Vec<JoinHandle<EditOutcome>>>,
    config: NotifyConfig,
}

impl NotifyThrottle {
    /// Create a throttle with the given notification settings
    pub fn new(config: NotifyConfig) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            last_edit: Mutex::new(HashMap::new()),
            dead: Mutex::new(HashSet::new()),
            pending: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Returns true if the target has been marked permanently dead
    pub fn is_dead(&self, id: TargetId) -> bool {
        self.dead.lock().map(|d| d.contains(&id)).unwrap_or(false)
    }

    /// Timestamp of the last successful edit for the target, if any
    pub fn last_edit(&self, id: TargetId) -> Option<Instant> {
        self.last_edit.lock().ok().and_then(|m| m.get(&id).copied())
    }

    fn mark_dead(&self, id: TargetId) {
        if let Ok(mut dead) = self.dead.lock() {
            dead.insert(id);
        }
        tracing::warn!(container = id.container, message = id.message, "notification target marked dead");
    }

    fn record_edit(&self, id: TargetId) {
        if let Ok(mut last) = self.last_edit.lock() {
            last.insert(id, Instant::now());
        }
    }

    fn lock_for(&self, id: TargetId) -> Arc<tokio::sync::Mutex<()>> {
        match self.locks.lock() {
            Ok(mut locks) => Arc::clone(locks.entry(id).or_default()),
            // A poisoned registry only happens if a holder panicked while
            // inserting; fall back to a throwaway lock rather than propagate.
            Err(poisoned) => Arc::clone(poisoned.into_inner().entry(id).or_default()),
        }
    }

    /// Perform one locked, retried edit against the target.
    ///
    /// Callers for the same identity queue behind the per-target lock; at most
    /// one edit is in flight per target at any time. Transient failures get a
    /// single retry after the configured backoff. Permanent failures mark the
    /// target dead so all subsequent dispatches short-circuit.
    pub async fn edit(&self, target: &dyn Notifiable, text: &str) -> EditOutcome {
        let id = target.target_id();
        if self.is_dead(id) {
            return EditOutcome::Skipped;
        }

        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        // The target may have died while this edit was queued behind the lock.
        if self.is_dead(id) {
            return EditOutcome::Skipped;
        }

        match target.edit_text(text).await {
            Ok(()) => {
                self.record_edit(id);
                EditOutcome::Applied
            }
            Err(e) if e.is_permanent() => {
                self.mark_dead(id);
                EditOutcome::Failed
            }
            Err(e) => {
                tracing::debug!(
                    container = id.container,
                    message = id.message,
                    error = %e,
                    "edit failed, retrying once"
                );
                tokio::time::sleep(self.config.retry_backoff).await;
                match target.edit_text(text).await {
                    Ok(()) => {
                        self.record_edit(id);
                        EditOutcome::Applied
                    }
                    Err(e2) => {
                        if e2.is_permanent() {
                            self.mark_dead(id);
                        } else {
                            tracing::debug!(
                                container = id.container,
                                message = id.message,
                                error = %e2,
                                "edit failed twice, giving up"
                            );
                        }
                        EditOutcome::Failed
                    }
                }
            }
        }
    }

    /// Schedule an edit as a background task (fire and forget).
    ///
    /// Never blocks the caller beyond spawning; a slow or contended edit never
    /// backpressures the producing pipeline. The join handle is retained for
    /// [`drain`](Self::drain).
    pub fn dispatch(self: &Arc<Self>, target: Arc<dyn Notifiable>, text: String) {
        let throttle = Arc::clone(self);
        let handle = tokio::spawn(async move { throttle.edit(target.as_ref(), &text).await });
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|h| !h.is_finished());
            pending.push(handle);
        }
    }

    /// Await all outstanding dispatched edits.
    ///
    /// Optional graceful drain at shutdown; edits are best-effort, so simply
    /// dropping the throttle (cancelling the tasks) is also acceptable.
    pub async fn drain(&self) {
        let handles = match self.pending.lock() {
            Ok(mut pending) => pending.drain(..).collect::<Vec<_>>(),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Returns true if enough time has passed since the last successful edit
    /// for another rendered panel to be worthwhile.
    ///
    /// Used by byte-progress callbacks to self-throttle without taking the
    /// per-target lock.
    pub fn should_render(&self, id: TargetId, min_interval: std::time::Duration) -> bool {
        if self.is_dead(id) {
            return false;
        }
        match self.last_edit(id) {
            Some(ts) => ts.elapsed() >= min_interval,
            None => true,
        }
    }
}
