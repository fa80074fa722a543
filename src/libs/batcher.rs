//! Persistence batcher: accumulates activity records and commits them to the
//! local store in transactional batches.
//!
//! ## Triggers
//!
//! A flush starts when either
//! - the batch interval elapses (timer task), or
//! - the pending count reaches the batch size (dispatched to the blocking
//!   pool so the enqueuing thread never waits on storage).
//!
//! A single-slot gate keeps flushes mutually exclusive. A trigger that finds
//! the gate taken is skipped; the running flush keeps draining full batches
//! and the timer picks up whatever is left.
//!
//! ## Failure handling
//!
//! A batch that fails to commit goes into a retry slot that the next flush
//! takes before any newer record, so order is preserved. After
//! `flush_retries` further failures the batch is discarded and its size is
//! added to the lost-record counter.

use super::activity::ActivityRecord;
use super::error::StoreError;
use super::messages::Message;
use crate::{msg_error, msg_info, msg_warning};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Atomic sink for committed batches.
pub trait LocalStore: Send + Sync {
    /// Writes all `records` or none of them.
    fn write_batch(&self, records: &[ActivityRecord]) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct BatcherConfig {
    pub batch_size: usize,
    pub interval: Duration,
    pub flush_retries: u32,
    pub shutdown_grace: Duration,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            interval: Duration::from_secs(10),
            flush_retries: 3,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatcherStats {
    /// Every record handed to `enqueue`, including those refused after shutdown.
    pub received: u64,
    pub pending: usize,
    pub committed: u64,
    pub lost: u64,
    pub batches_written: u64,
    pub write_failures: u64,
    pub last_flush_time: Option<DateTime<Utc>>,
}

/// Outcome of a shutdown drain. Every record ever received is in exactly one
/// of the two counters; a write still running when the grace period ends
/// counts as lost.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub committed: u64,
    pub lost: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Another flush held the gate.
    Skipped,
    Completed { batches: usize, records: usize },
    /// Stopped on a write failure; the batch is waiting in the retry slot or
    /// was discarded.
    Failed { batches: usize, records: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushMode {
    /// Size trigger: keep going only while a full batch is pending.
    FullBatches,
    /// Timer or explicit flush: drain everything pending.
    All,
    /// Shutdown: drain everything, retrying failures until discarded or the
    /// deadline passes.
    Final(Instant),
}

struct FailedBatch {
    records: Vec<ActivityRecord>,
    failures: u32,
}

struct BatcherInner {
    config: BatcherConfig,
    store: Arc<dyn LocalStore>,
    pending: Mutex<VecDeque<ActivityRecord>>,
    retry: Mutex<Option<FailedBatch>>,
    flush_gate: Mutex<()>,
    flush_scheduled: AtomicBool,
    closed: AtomicBool,
    /// Set once the drain report is final. Later writes leave the stats alone.
    sealed: AtomicBool,
    stats: Mutex<BatcherStats>,
}

pub struct PersistenceBatcher {
    inner: Arc<BatcherInner>,
    runtime: Handle,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl PersistenceBatcher {
    /// Creates the batcher and starts its interval timer on the current
    /// tokio runtime.
    pub fn start(store: Arc<dyn LocalStore>, config: BatcherConfig) -> Self {
        let runtime = Handle::current();
        let inner = Arc::new(BatcherInner {
            config: BatcherConfig {
                batch_size: config.batch_size.max(1),
                ..config
            },
            store,
            pending: Mutex::new(VecDeque::new()),
            retry: Mutex::new(None),
            flush_gate: Mutex::new(()),
            flush_scheduled: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            sealed: AtomicBool::new(false),
            stats: Mutex::new(BatcherStats::default()),
        });

        let timer = runtime.spawn(Self::interval_loop(inner.clone()));

        Self {
            inner,
            runtime,
            timer: Mutex::new(Some(timer)),
        }
    }

    async fn interval_loop(inner: Arc<BatcherInner>) {
        let mut interval = tokio::time::interval(inner.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            if inner.closed.load(Ordering::Acquire) {
                break;
            }
            let worker = inner.clone();
            if let Err(e) = tokio::task::spawn_blocking(move || worker.flush_cycle(FlushMode::All, None)).await {
                tracing::error!(error = %e, "interval flush task failed");
            }
        }
    }

    /// Accepts a record without waiting on storage.
    pub fn enqueue(&self, record: ActivityRecord) {
        if self.inner.closed.load(Ordering::Acquire) {
            let mut stats = self.inner.stats.lock();
            stats.received += 1;
            stats.lost += 1;
            drop(stats);
            msg_warning!(Message::RecordRejectedAfterShutdown(record.id.to_string()));
            return;
        }

        self.inner.stats.lock().received += 1;
        let pending = {
            let mut queue = self.inner.pending.lock();
            queue.push_back(record);
            queue.len()
        };

        if pending >= self.inner.config.batch_size && !self.inner.flush_scheduled.swap(true, Ordering::AcqRel) {
            let worker = self.inner.clone();
            self.runtime.spawn_blocking(move || {
                worker.flush_scheduled.store(false, Ordering::Release);
                worker.flush_cycle(FlushMode::FullBatches, None)
            });
        }
    }

    /// Drains everything pending now, waiting for a running flush to finish.
    /// Blocks on storage I/O.
    pub fn flush_now(&self) -> FlushOutcome {
        self.inner.flush_cycle(FlushMode::All, Some(self.inner.config.shutdown_grace))
    }

    /// Stops the timer and drains all pending records within the configured
    /// grace period. Records that cannot be committed in time are counted as
    /// lost.
    pub async fn shutdown(&self) -> DrainReport {
        self.inner.closed.store(true, Ordering::Release);
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }

        let grace = self.inner.config.shutdown_grace;
        let deadline = Instant::now() + grace;
        let worker = self.inner.clone();
        let drain = tokio::task::spawn_blocking(move || worker.flush_cycle(FlushMode::Final(deadline), Some(grace)));

        match tokio::time::timeout(grace, drain).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "final flush task failed"),
            Err(_) => msg_warning!(Message::BatcherDrainTimedOut(grace.as_secs())),
        }

        let undrained = self.inner.take_all_pending();
        if undrained > 0 {
            msg_error!(Message::RecordsLostAtShutdown(undrained));
        }
        let mut stats = self.inner.stats.lock();
        stats.lost = stats.received.saturating_sub(stats.committed);
        self.inner.sealed.store(true, Ordering::Release);
        let report = DrainReport {
            committed: stats.committed,
            lost: stats.lost,
        };
        drop(stats);
        msg_info!(Message::BatcherDrained(report.committed, report.lost));
        report
    }

    pub fn pending(&self) -> usize {
        self.inner.pending_len()
    }

    pub fn stats(&self) -> BatcherStats {
        let mut stats = self.inner.stats.lock().clone();
        stats.pending = self.inner.pending_len();
        stats
    }
}

impl Drop for PersistenceBatcher {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
    }
}

impl BatcherInner {
    fn pending_len(&self) -> usize {
        let retry = self.retry.lock().as_ref().map_or(0, |batch| batch.records.len());
        retry + self.pending.lock().len()
    }

    /// Removes everything still queued, returning how many records that was.
    fn take_all_pending(&self) -> usize {
        let retry = self.retry.lock().take().map_or(0, |batch| batch.records.len());
        let mut pending = self.pending.lock();
        let count = retry + pending.len();
        pending.clear();
        count
    }

    /// Next batch to write: the retry slot first, then up to `batch_size`
    /// pending records in enqueue order.
    fn take_batch(&self) -> Option<FailedBatch> {
        if let Some(batch) = self.retry.lock().take() {
            return Some(batch);
        }
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return None;
        }
        let take = pending.len().min(self.config.batch_size);
        Some(FailedBatch {
            records: pending.drain(..take).collect(),
            failures: 0,
        })
    }

    fn has_full_batch(&self) -> bool {
        self.pending.lock().len() >= self.config.batch_size
    }

    fn flush_cycle(&self, mode: FlushMode, wait: Option<Duration>) -> FlushOutcome {
        loop {
            let outcome = {
                let gate = match wait {
                    None => self.flush_gate.try_lock(),
                    Some(timeout) => self.flush_gate.try_lock_for(timeout),
                };
                let Some(_gate) = gate else {
                    return FlushOutcome::Skipped;
                };
                self.drain(mode)
            };

            // A size trigger that was skipped while the gate was held is
            // picked up here.
            if mode == FlushMode::FullBatches && matches!(outcome, FlushOutcome::Completed { .. }) && self.has_full_batch() {
                continue;
            }
            return outcome;
        }
    }

    /// Writes batches until the mode's stop condition. Caller holds the gate.
    fn drain(&self, mode: FlushMode) -> FlushOutcome {
        let mut batches = 0;
        let mut records = 0;
        loop {
            if let FlushMode::Final(deadline) = mode {
                if Instant::now() >= deadline {
                    return FlushOutcome::Failed { batches, records };
                }
            }
            if self.sealed.load(Ordering::Acquire) {
                break;
            }
            if mode == FlushMode::FullBatches && self.retry.lock().is_none() && !self.has_full_batch() {
                break;
            }

            let Some(mut batch) = self.take_batch() else {
                break;
            };

            let result = self.store.write_batch(&batch.records);
            let mut stats = self.stats.lock();
            if self.sealed.load(Ordering::Acquire) {
                // Already reported as lost; the drain report stays as published.
                tracing::warn!(records = batch.records.len(), ok = result.is_ok(), "batch write finished after the drain report");
                break;
            }
            match result {
                Ok(()) => {
                    stats.committed += batch.records.len() as u64;
                    stats.batches_written += 1;
                    stats.last_flush_time = Some(Utc::now());
                    batches += 1;
                    records += batch.records.len();
                    tracing::debug!(records = batch.records.len(), "batch committed");
                }
                Err(e) => {
                    batch.failures += 1;
                    stats.write_failures += 1;
                    if batch.failures > self.config.flush_retries {
                        stats.lost += batch.records.len() as u64;
                        msg_error!(Message::BatchDiscarded(batch.records.len(), e.to_string()));
                    } else {
                        msg_warning!(Message::BatchWriteFailed(batch.records.len(), batch.failures, e.to_string()));
                        *self.retry.lock() = Some(batch);
                    }
                    if matches!(mode, FlushMode::Final(_)) {
                        continue;
                    }
                    return FlushOutcome::Failed { batches, records };
                }
            }
        }

        FlushOutcome::Completed { batches, records }
    }
}
