//! Submission dispatcher: bounded-concurrency delivery of activity records to
//! the remote collector.
//!
//! ## Flow
//!
//! ```text
//! submit() ──▶ shared queue ──▶ worker pool (N) ──▶ semaphore(N) ──▶ collector
//!                  ▲                                      │
//!                  └──── delayed re-enqueue (backoff) ◀───┘ on failure
//! ```
//!
//! - Attempt *n* that fails is retried after `base_delay * 2^(n-1)` until
//!   `max_attempts` is reached, then the record is dropped and logged.
//! - Consecutive failures open the circuit breaker. While it is open workers
//!   hold their task until the cool-down ends; no attempt is consumed.
//! - The local store holds the durable copy, so the number of pending
//!   submissions is capped and overflow is counted, not queued.

use super::activity::ActivityRecord;
use super::breaker::{BreakerPhase, CircuitBreaker, Permit};
use super::messages::Message;
use crate::api::RemoteCollector;
use crate::{msg_error, msg_info, msg_warning};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub breaker_threshold: u32,
    pub breaker_cooldown: Duration,
    pub max_pending: usize,
    pub shutdown_grace: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            breaker_threshold: super::breaker::DEFAULT_FAILURE_THRESHOLD,
            breaker_cooldown: super::breaker::DEFAULT_COOLDOWN,
            max_pending: 1000,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl DispatcherConfig {
    /// Delay before retrying after the given number of failed attempts.
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionOutcome {
    Delivered,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatcherStats {
    pub pending: usize,
    pub in_flight: usize,
    pub delivered: u64,
    pub failed_attempts: u64,
    /// Dropped after exhausting all attempts.
    pub dropped: u64,
    /// Refused at submit time: pending bound reached or dispatcher stopped.
    pub rejected: u64,
    pub abandoned: u64,
    pub last_outcome: Option<SubmissionOutcome>,
    pub last_success: Option<DateTime<Utc>>,
    pub breaker: BreakerPhase,
    pub breaker_trips: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub delivered: u64,
    pub dropped: u64,
    pub abandoned: u64,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: u64,
    failed_attempts: u64,
    dropped: u64,
    rejected: u64,
    abandoned: u64,
    last_outcome: Option<SubmissionOutcome>,
    last_success: Option<DateTime<Utc>>,
}

struct SubmissionTask {
    record: ActivityRecord,
    attempts: u32,
}

struct Shared<C> {
    collector: C,
    config: DispatcherConfig,
    sender: mpsc::UnboundedSender<SubmissionTask>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<SubmissionTask>>,
    gate: Semaphore,
    breaker: Mutex<CircuitBreaker>,
    /// Accepted tasks not yet delivered or dropped.
    pending: AtomicUsize,
    in_flight: AtomicUsize,
    accepting: AtomicBool,
    cancel: CancellationToken,
    counters: Mutex<Counters>,
}

pub struct SubmissionDispatcher<C: RemoteCollector> {
    shared: Arc<Shared<C>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<C: RemoteCollector> SubmissionDispatcher<C> {
    /// Creates the dispatcher and spawns its worker pool on the current
    /// tokio runtime.
    pub fn start(collector: C, config: DispatcherConfig) -> Self {
        let concurrency = config.concurrency.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            collector,
            breaker: Mutex::new(CircuitBreaker::new(config.breaker_threshold, config.breaker_cooldown)),
            config: DispatcherConfig { concurrency, ..config },
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
            gate: Semaphore::new(concurrency),
            pending: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            accepting: AtomicBool::new(true),
            cancel: CancellationToken::new(),
            counters: Mutex::new(Counters::default()),
        });

        let workers = (0..concurrency)
            .map(|worker| tokio::spawn(Self::worker_loop(shared.clone(), worker)))
            .collect();

        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Queues `record` for delivery. Never waits; returns whether the record
    /// was accepted.
    pub fn submit(&self, record: ActivityRecord) -> bool {
        let shared = &self.shared;
        if !shared.accepting.load(Ordering::Acquire) {
            shared.counters.lock().rejected += 1;
            return false;
        }
        if shared.pending.fetch_add(1, Ordering::AcqRel) >= shared.config.max_pending {
            shared.pending.fetch_sub(1, Ordering::AcqRel);
            shared.counters.lock().rejected += 1;
            tracing::debug!(record = %record.id, "submission backlog full, record left to local store");
            return false;
        }
        if shared.sender.send(SubmissionTask { record, attempts: 0 }).is_err() {
            shared.pending.fetch_sub(1, Ordering::AcqRel);
            shared.counters.lock().rejected += 1;
            return false;
        }
        true
    }

    async fn worker_loop(shared: Arc<Shared<C>>, worker: usize) {
        tracing::debug!(worker, "submission worker started");
        loop {
            let next = tokio::select! {
                _ = shared.cancel.cancelled() => None,
                task = async { shared.receiver.lock().await.recv().await } => task,
            };
            let Some(task) = next else {
                break;
            };
            if !Self::deliver(&shared, task).await {
                break;
            }
        }
        tracing::debug!(worker, "submission worker stopped");
    }

    /// Runs one attempt for `task`. Returns `false` when cancelled.
    async fn deliver(shared: &Arc<Shared<C>>, mut task: SubmissionTask) -> bool {
        let probe = loop {
            let permit = shared.breaker.lock().try_acquire(Instant::now());
            match permit {
                Permit::Allowed => break false,
                Permit::Probe => break true,
                Permit::Rejected(wait) => {
                    tokio::select! {
                        _ = shared.cancel.cancelled() => return false,
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        };

        let Ok(_slot) = shared.gate.acquire().await else {
            return false;
        };

        shared.in_flight.fetch_add(1, Ordering::AcqRel);
        let result = tokio::select! {
            _ = shared.cancel.cancelled() => None,
            result = shared.collector.submit(&task.record) => Some(result),
        };
        shared.in_flight.fetch_sub(1, Ordering::AcqRel);

        let Some(result) = result else {
            if probe {
                shared.breaker.lock().release_probe();
            }
            return false;
        };

        task.attempts += 1;
        match result {
            Ok(()) => {
                shared.breaker.lock().record_success();
                shared.pending.fetch_sub(1, Ordering::AcqRel);
                let mut counters = shared.counters.lock();
                counters.delivered += 1;
                counters.last_outcome = Some(SubmissionOutcome::Delivered);
                counters.last_success = Some(Utc::now());
                tracing::trace!(record = %task.record.id, attempts = task.attempts, "record delivered");
            }
            Err(e) => {
                let opened = shared.breaker.lock().record_failure(Instant::now());
                if opened {
                    msg_warning!(Message::CircuitBreakerOpened(shared.config.breaker_cooldown.as_secs()));
                }
                {
                    let mut counters = shared.counters.lock();
                    counters.failed_attempts += 1;
                    counters.last_outcome = Some(SubmissionOutcome::Failed);
                }

                if task.attempts >= shared.config.max_attempts {
                    shared.pending.fetch_sub(1, Ordering::AcqRel);
                    shared.counters.lock().dropped += 1;
                    msg_error!(Message::SubmissionDropped(
                        task.record.id.to_string(),
                        task.record.timestamp.to_rfc3339(),
                        task.record.process_name.clone(),
                        task.attempts,
                        e.to_string()
                    ));
                } else {
                    let delay = shared.config.backoff(task.attempts);
                    tracing::debug!(record = %task.record.id, attempts = task.attempts, delay = ?delay, error = %e, "submission failed, retrying");
                    Self::schedule_retry(shared, task, delay);
                }
            }
        }
        true
    }

    fn schedule_retry(shared: &Arc<Shared<C>>, task: SubmissionTask, delay: Duration) {
        let sender = shared.sender.clone();
        let cancel = shared.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    // A closed channel means the dispatcher is gone; the task
                    // is already counted as pending and ends up abandoned.
                    let _ = sender.send(task);
                }
            }
        });
    }

    /// Stops accepting records, waits up to the grace period for pending
    /// submissions to finish, then cancels the rest.
    pub async fn shutdown(&self) -> DispatchReport {
        let shared = &self.shared;
        shared.accepting.store(false, Ordering::Release);

        let grace = shared.config.shutdown_grace;
        let drained = tokio::time::timeout(grace, async {
            while shared.pending.load(Ordering::Acquire) > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .is_ok();
        if !drained {
            msg_warning!(Message::DispatcherGraceExpired(grace.as_secs(), shared.pending.load(Ordering::Acquire)));
        }

        shared.cancel.cancel();
        shared.gate.close();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "submission worker failed");
            }
        }

        let abandoned = shared.pending.swap(0, Ordering::AcqRel) as u64;
        let mut counters = shared.counters.lock();
        counters.abandoned += abandoned;
        let report = DispatchReport {
            delivered: counters.delivered,
            dropped: counters.dropped,
            abandoned: counters.abandoned,
        };
        msg_info!(Message::DispatcherStopped(report.delivered, report.dropped, report.abandoned));
        report
    }

    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> DispatcherStats {
        let shared = &self.shared;
        let (breaker, breaker_trips) = {
            let breaker = shared.breaker.lock();
            (breaker.phase(), breaker.trips())
        };
        let counters = shared.counters.lock();
        DispatcherStats {
            pending: shared.pending.load(Ordering::Acquire),
            in_flight: shared.in_flight.load(Ordering::Acquire),
            delivered: counters.delivered,
            failed_attempts: counters.failed_attempts,
            dropped: counters.dropped,
            rejected: counters.rejected,
            abandoned: counters.abandoned,
            last_outcome: counters.last_outcome,
            last_success: counters.last_success,
            breaker,
            breaker_trips,
        }
    }
}

impl<C: RemoteCollector> Drop for SubmissionDispatcher<C> {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}
