//! Agent orchestration: wires the event source, queue, processor and both
//! sinks together and owns their lifecycle.
//!
//! ## Startup
//!
//! 1. validate the pipeline configuration
//! 2. create the queue, the persistence batcher and (with a collector) the
//!    submission dispatcher
//! 3. spawn the processor thread
//! 4. register the event source with a callback that only pushes to the queue
//! 5. start the idle ticker and, when a data directory is given, the status
//!    publisher
//!
//! A failure in steps 1-4 is returned to the caller and leaves nothing
//! running.
//!
//! ## Shutdown
//!
//! [`Agent::stop`] detaches the source, closes the queue, waits for the
//! processor to drain it, then drains the batcher and finally the dispatcher.

use super::activity::ActivityStatus;
use super::batcher::{DrainReport, LocalStore, PersistenceBatcher};
use super::config::PipelineConfig;
use super::data_storage::DataStorage;
use super::dispatcher::{DispatchReport, SubmissionDispatcher};
use super::error::AgentError;
use super::messages::Message;
use super::processor::{run_processor, EventProcessor, ProcessorStats, ProcessorView, SignificanceFn};
use super::queue::EventQueue;
use super::source::{EventCallback, EventSource, WindowResolver};
use super::status::AgentStatus;
use crate::api::{HttpCollector, RemoteCollector};
use crate::{msg_error, msg_info};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::thread;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const PROCESSOR_THREAD_NAME: &str = "actrail-processor";

/// What [`Agent::stop`] managed to drain.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownReport {
    pub processor: ProcessorStats,
    pub persistence: DrainReport,
    pub submission: Option<DispatchReport>,
    pub dropped_events: u64,
}

pub struct AgentBuilder<C: RemoteCollector = HttpCollector> {
    pipeline: PipelineConfig,
    user_identity: String,
    source: Box<dyn EventSource>,
    resolver: Box<dyn WindowResolver>,
    store: Arc<dyn LocalStore>,
    collector: Option<C>,
    significance: Option<SignificanceFn>,
    status_storage: Option<DataStorage>,
}

impl AgentBuilder<HttpCollector> {
    pub fn new(
        pipeline: PipelineConfig,
        source: impl EventSource + 'static,
        resolver: impl WindowResolver + 'static,
        store: Arc<dyn LocalStore>,
    ) -> Self {
        Self {
            pipeline,
            user_identity: String::new(),
            source: Box::new(source),
            resolver: Box::new(resolver),
            store,
            collector: None,
            significance: None,
            status_storage: None,
        }
    }
}

impl<C: RemoteCollector> AgentBuilder<C> {
    pub fn user_identity(mut self, user_identity: impl Into<String>) -> Self {
        self.user_identity = user_identity.into();
        self
    }

    /// Enables remote submission through `collector`.
    pub fn collector<R: RemoteCollector>(self, collector: R) -> AgentBuilder<R> {
        AgentBuilder {
            pipeline: self.pipeline,
            user_identity: self.user_identity,
            source: self.source,
            resolver: self.resolver,
            store: self.store,
            collector: Some(collector),
            significance: self.significance,
            status_storage: self.status_storage,
        }
    }

    pub fn significance(mut self, significance: SignificanceFn) -> Self {
        self.significance = Some(significance);
        self
    }

    /// Publishes the status snapshot into `storage` while running.
    pub fn publish_status(mut self, storage: DataStorage) -> Self {
        self.status_storage = Some(storage);
        self
    }

    /// Starts the agent on the current tokio runtime.
    pub fn start(self) -> Result<Agent<C>, AgentError> {
        Agent::start(self)
    }
}

/// Shared handles needed to assemble a status snapshot.
struct Probe<C: RemoteCollector> {
    queue: Arc<EventQueue>,
    view: Arc<RwLock<ProcessorView>>,
    batcher: Arc<PersistenceBatcher>,
    dispatcher: Option<Arc<SubmissionDispatcher<C>>>,
    started_at: DateTime<Utc>,
}

impl<C: RemoteCollector> Probe<C> {
    fn snapshot(&self) -> AgentStatus {
        let view = *self.view.read();
        let persistence = self.batcher.stats();
        let submission = self.dispatcher.as_ref().map(|dispatcher| dispatcher.stats());

        AgentStatus {
            activity_status: view.status,
            queue_depth: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            dropped_event_count: self.queue.dropped(),
            last_flush_time: persistence.last_flush_time,
            last_submission_outcome: submission.as_ref().and_then(|stats| stats.last_outcome),
            last_successful_submission: submission.as_ref().and_then(|stats| stats.last_success),
            processor: view.stats,
            persistence,
            submission,
            pid: std::process::id(),
            started_at: self.started_at,
            updated_at: Utc::now(),
        }
    }
}

impl<C: RemoteCollector> Clone for Probe<C> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            view: self.view.clone(),
            batcher: self.batcher.clone(),
            dispatcher: self.dispatcher.clone(),
            started_at: self.started_at,
        }
    }
}

pub struct Agent<C: RemoteCollector = HttpCollector> {
    probe: Probe<C>,
    source: Box<dyn EventSource>,
    processor: Option<thread::JoinHandle<ProcessorStats>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    status_storage: Option<DataStorage>,
}

impl<C: RemoteCollector> Agent<C> {
    fn start(builder: AgentBuilder<C>) -> Result<Self, AgentError> {
        let AgentBuilder {
            pipeline,
            user_identity,
            mut source,
            resolver,
            store,
            collector,
            significance,
            status_storage,
        } = builder;

        pipeline.validate()?;

        let queue = Arc::new(EventQueue::new(pipeline.queue_capacity));
        let batcher = Arc::new(PersistenceBatcher::start(store, pipeline.batcher_config()));
        let dispatcher = collector.map(|collector| Arc::new(SubmissionDispatcher::start(collector, pipeline.dispatcher_config())));
        let view = Arc::new(RwLock::new(ProcessorView::default()));

        let mut processor = EventProcessor::with_boxed_resolver(pipeline.processor_config(user_identity), resolver);
        if let Some(significance) = significance {
            processor = processor.with_significance(significance);
        }

        let processor_thread = {
            let queue = queue.clone();
            let view = view.clone();
            let batcher = batcher.clone();
            let dispatcher = dispatcher.clone();
            thread::Builder::new().name(PROCESSOR_THREAD_NAME.to_string()).spawn(move || {
                run_processor(queue, processor, view, |record| {
                    if let Some(dispatcher) = &dispatcher {
                        dispatcher.submit(record.clone());
                    }
                    batcher.enqueue(record);
                })
            })?
        };

        let callback: EventCallback = {
            let queue = queue.clone();
            Arc::new(move |event| {
                queue.push(event);
            })
        };
        if let Err(e) = source.register(callback) {
            queue.shutdown();
            if processor_thread.join().is_err() {
                tracing::error!("processor thread panicked during aborted start");
            }
            return Err(e.into());
        }

        let probe = Probe {
            queue: queue.clone(),
            view,
            batcher,
            dispatcher,
            started_at: Utc::now(),
        };

        let cancel = CancellationToken::new();
        let mut tasks = vec![tokio::spawn(idle_ticker(queue, pipeline.idle_check_interval(), cancel.clone()))];
        if let Some(storage) = status_storage.clone() {
            tasks.push(tokio::spawn(status_publisher(probe.clone(), storage, pipeline.status_interval(), cancel.clone())));
        }

        msg_info!(Message::AgentStarted(source.name().to_string()));

        Ok(Self {
            probe,
            source,
            processor: Some(processor_thread),
            cancel,
            tasks,
            status_storage,
        })
    }

    pub fn status(&self) -> AgentStatus {
        self.probe.snapshot()
    }

    pub fn activity_status(&self) -> ActivityStatus {
        self.probe.view.read().status
    }

    /// Stops capture and drains every stage in pipeline order.
    pub async fn stop(mut self) -> ShutdownReport {
        self.source.unregister();
        self.cancel.cancel();
        self.probe.queue.shutdown();

        let processor = match self.processor.take() {
            Some(handle) => match tokio::task::spawn_blocking(move || handle.join()).await {
                Ok(Ok(stats)) => stats,
                Ok(Err(_)) => {
                    msg_error!(Message::ProcessorPanicked);
                    self.probe.view.read().stats
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to join processor thread");
                    self.probe.view.read().stats
                }
            },
            None => self.probe.view.read().stats,
        };

        let persistence = self.probe.batcher.shutdown().await;
        let submission = match &self.probe.dispatcher {
            Some(dispatcher) => Some(dispatcher.shutdown().await),
            None => None,
        };

        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }
        if let Some(storage) = &self.status_storage {
            if let Err(e) = AgentStatus::remove(storage) {
                tracing::warn!(error = %e, "failed to remove status file");
            }
        }

        let report = ShutdownReport {
            processor,
            persistence,
            submission,
            dropped_events: self.probe.queue.dropped(),
        };
        msg_info!(Message::AgentStopped(report.persistence.committed, report.persistence.lost, report.dropped_events));
        report
    }
}

impl<C: RemoteCollector> Drop for Agent<C> {
    fn drop(&mut self) {
        // No-op after a completed stop.
        self.source.unregister();
        self.cancel.cancel();
        self.probe.queue.shutdown();
    }
}

/// Raises the queue's idle tick on a fixed cadence so the processor can apply
/// the idle timeout without a second writer of activity state.
async fn idle_ticker(queue: Arc<EventQueue>, cadence: std::time::Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(cadence);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => queue.tick(),
        }
    }
}

async fn status_publisher<C: RemoteCollector>(probe: Probe<C>, storage: DataStorage, cadence: std::time::Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(cadence);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if let Err(e) = probe.snapshot().publish(&storage) {
                    tracing::warn!(error = %e, "failed to publish agent status");
                }
            }
        }
    }
}
