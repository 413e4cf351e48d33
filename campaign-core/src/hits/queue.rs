// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Durable hit queue
//!
//! Hits are appended to a [`HitStore`] and drained by one worker task. The
//! worker only removes the head record once its outcome is terminal, so the
//! store is the sole source of truth across restarts.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

use super::{Hit, HitOutcome, HitProcessor};
use crate::state::PrivacyStatus;
use crate::storage::{HitStore, StorageError};

#[derive(Debug, Clone, Copy)]
struct Control {
    suspended: bool,
    closed: bool,
}

struct Shared {
    store: Arc<dyn HitStore>,
    processor: HitProcessor,
    control: Mutex<Control>,
    wake: Notify,
}

/// FIFO of pending hits with a single background delivery worker.
pub struct HitQueue {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl HitQueue {
    /// Creates the queue and spawns its worker on the current tokio runtime.
    ///
    /// The queue starts suspended; delivery begins with
    /// [`HitQueue::begin_processing`] or an opt-in privacy change.
    pub fn new(store: Arc<dyn HitStore>, processor: HitProcessor) -> Self {
        let shared = Arc::new(Shared {
            store,
            processor,
            control: Mutex::new(Control {
                suspended: true,
                closed: false,
            }),
            wake: Notify::new(),
        });
        let worker = tokio::spawn(run(shared.clone()));
        HitQueue {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Persists a hit and wakes the worker. Never waits on the network.
    pub fn queue(&self, hit: &Hit) -> Result<i64, StorageError> {
        let data = serde_json::to_string(hit)?;
        let id = self.shared.store.append(&data)?;
        trace!("Queued hit {id} for ({})", hit.url);
        self.shared.wake.notify_one();
        Ok(id)
    }

    /// Resumes delivery of pending hits.
    pub fn begin_processing(&self) {
        self.set_suspended(false);
    }

    /// Stops delivery; pending hits are kept.
    pub fn suspend(&self) {
        self.set_suspended(true);
    }

    /// Discards every pending hit.
    pub fn clear(&self) -> Result<usize, StorageError> {
        let removed = self.shared.store.clear()?;
        debug!("Cleared {removed} pending hits");
        Ok(removed)
    }

    /// Number of pending hits.
    pub fn count(&self) -> Result<usize, StorageError> {
        self.shared.store.count()
    }

    pub fn is_suspended(&self) -> bool {
        self.shared.control.lock().suspended
    }

    /// Applies a privacy status change.
    ///
    /// Opt-in resumes delivery, opt-out suspends and purges, unknown suspends.
    pub fn handle_privacy_change(&self, privacy: PrivacyStatus) -> Result<(), StorageError> {
        match privacy {
            PrivacyStatus::OptIn => self.begin_processing(),
            PrivacyStatus::OptOut => {
                self.suspend();
                self.clear()?;
            }
            PrivacyStatus::Unknown => self.suspend(),
        }
        Ok(())
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// An attempt already in flight completes first; pending hits stay in
    /// the store.
    pub async fn close(&self) {
        self.shared.control.lock().closed = true;
        self.shared.wake.notify_one();
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                warn!("Hit queue worker ended abnormally: {e}");
            }
        }
    }

    fn set_suspended(&self, suspended: bool) {
        self.shared.control.lock().suspended = suspended;
        self.shared.wake.notify_one();
    }
}

impl Drop for HitQueue {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
    }
}

/// Wait imposed on the record that just failed.
#[derive(Debug, Clone, Copy)]
struct Backoff {
    /// Head record the wait applies to; `None` after a store failure.
    record_id: Option<i64>,
    until: Instant,
}

impl Backoff {
    fn new(shared: &Shared, record_id: Option<i64>) -> Self {
        Backoff {
            record_id,
            until: Instant::now() + shared.processor.retry_interval(),
        }
    }
}

async fn run(shared: Arc<Shared>) {
    let mut backoff: Option<Backoff> = None;
    // Delivered head whose removal from the store is still outstanding.
    let mut delivered: Option<i64> = None;

    loop {
        // Registered before the checks below so a wake-up in between is kept.
        let notified = shared.wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let control = *shared.control.lock();
        if control.closed {
            debug!("Hit queue worker stopped");
            return;
        }
        if control.suspended {
            notified.await;
            continue;
        }

        if let Some(wait) = backoff.filter(|b| b.record_id.is_none()) {
            if Instant::now() < wait.until {
                tokio::select! {
                    _ = tokio::time::sleep_until(wait.until) => {}
                    _ = &mut notified => {}
                }
                continue;
            }
            backoff = None;
        }

        let record = match shared.store.peek() {
            Ok(Some(record)) => record,
            Ok(None) => {
                backoff = None;
                notified.await;
                continue;
            }
            Err(e) => {
                error!("Failed to read the hit queue: {e}");
                backoff = Some(Backoff::new(&shared, None));
                continue;
            }
        };

        // A wait belongs to the record that failed; a purged head drops it.
        if let Some(wait) = backoff {
            if wait.record_id == Some(record.id) && Instant::now() < wait.until {
                tokio::select! {
                    _ = tokio::time::sleep_until(wait.until) => {}
                    _ = &mut notified => {}
                }
                continue;
            }
            backoff = None;
        }

        if delivered == Some(record.id) {
            if remove_record(&shared, record.id) {
                delivered = None;
            } else {
                backoff = Some(Backoff::new(&shared, Some(record.id)));
            }
            continue;
        }

        let hit: Hit = match serde_json::from_str(&record.data) {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Discarding unreadable hit {}: {e}", record.id);
                if !remove_record(&shared, record.id) {
                    delivered = Some(record.id);
                    backoff = Some(Backoff::new(&shared, Some(record.id)));
                }
                continue;
            }
        };

        match shared.processor.process(&hit).await {
            HitOutcome::Completed { .. } => {
                if !remove_record(&shared, record.id) {
                    delivered = Some(record.id);
                    backoff = Some(Backoff::new(&shared, Some(record.id)));
                }
            }
            HitOutcome::Retry => {
                backoff = Some(Backoff::new(&shared, Some(record.id)));
            }
        }
    }
}

/// Removes a finished record. Returns false if the store failed.
fn remove_record(shared: &Shared, id: i64) -> bool {
    match shared.store.remove(id) {
        Ok(true) => {
            trace!("Removed hit {id}");
            true
        }
        Ok(false) => {
            trace!("Hit {id} was already removed");
            true
        }
        Err(e) => {
            error!("Failed to remove hit {id}, will retry the removal: {e}");
            false
        }
    }
}
