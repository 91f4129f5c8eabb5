//! Coalesced visual refreshes.
//!
//! Several components may ask for a desktop repaint after one switch. Requests
//! are merged into a single pending refresh: the strongest kind wins and the
//! deadline is pushed out if a later request needs a longer delay.

use crate::collaborators::VisualRefresher;
use crate::model::RefreshType;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub source: String,
    pub kind: RefreshType,
    pub delay: Duration,
}

#[derive(Debug)]
struct PendingRefresh {
    deadline: Instant,
    kind: RefreshType,
    sources: Vec<String>,
}

pub struct RefreshCoordinator {
    pending: Mutex<Option<PendingRefresh>>,
    wake: Notify,
    refresher: Arc<dyn VisualRefresher>,
    completed: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(refresher: Arc<dyn VisualRefresher>) -> Self {
        Self {
            pending: Mutex::new(None),
            wake: Notify::new(),
            refresher,
            completed: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<PendingRefresh>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a refresh. Returns false if it was merged into one already pending.
    pub fn enqueue(&self, request: RefreshRequest) -> bool {
        if request.kind == RefreshType::None {
            return false;
        }

        let deadline = Instant::now() + request.delay;
        let created = {
            let mut pending = self.lock();
            match pending.as_mut() {
                Some(existing) => {
                    existing.kind = existing.kind.max(request.kind);
                    if deadline > existing.deadline {
                        existing.deadline = deadline;
                    }
                    existing.sources.push(request.source);
                    false
                }
                None => {
                    *pending = Some(PendingRefresh {
                        deadline,
                        kind: request.kind,
                        sources: vec![request.source],
                    });
                    true
                }
            }
        };

        self.wake.notify_one();
        created
    }

    pub fn has_pending(&self) -> bool {
        self.lock().is_some()
    }

    /// Number of refreshes actually performed.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Perform the pending refresh if its deadline has passed.
    pub async fn flush_due(&self) -> bool {
        let due = {
            let mut pending = self.lock();
            match pending.as_ref() {
                Some(p) if p.deadline <= Instant::now() => pending.take(),
                _ => None,
            }
        };

        let Some(refresh) = due else {
            return false;
        };

        match self.refresher.refresh(refresh.kind).await {
            Ok(()) => log::info!(
                "Performed {} visual refresh, requested by: {}",
                refresh.kind,
                refresh.sources.join(", ")
            ),
            Err(e) => log::warn!("Visual refresh failed: {e}"),
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Worker loop. Sleeps until the pending deadline, re-checking whenever a
    /// request moves it.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let deadline = self.lock().as_ref().map(|p| p.deadline);
            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(deadline) => {
                            self.flush_due().await;
                        }
                        _ = self.wake.notified() => {}
                        _ = cancel.cancelled() => break,
                    }
                }
                None => {
                    tokio::select! {
                        _ = self.wake.notified() => {}
                        _ = cancel.cancelled() => break,
                    }
                }
            }
        }
        log::debug!("Refresh worker stopped");
    }
}
