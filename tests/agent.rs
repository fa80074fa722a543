#[cfg(test)]
mod tests {
    use actrail::api::RemoteCollector;
    use actrail::db::records::ActivityRecords;
    use actrail::libs::activity::{ActivityRecord, ActivityStatus, RecordTrigger, WindowSnapshot};
    use actrail::libs::agent::AgentBuilder;
    use actrail::libs::config::PipelineConfig;
    use actrail::libs::data_storage::DataStorage;
    use actrail::libs::error::{AgentError, ConfigError, ResolveError, SourceError, SubmitError};
    use actrail::libs::event::{RawEvent, WindowHandle};
    use actrail::libs::source::{EventCallback, EventSource, ManualSource};
    use actrail::libs::status::{AgentStatus, STATUS_FILE_NAME};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;
    use test_context::{test_context, AsyncTestContext};

    struct AgentTestContext {
        temp_dir: TempDir,
        store: Arc<ActivityRecords>,
    }

    impl AsyncTestContext for AgentTestContext {
        async fn setup() -> Self {
            AgentTestContext {
                temp_dir: tempfile::tempdir().unwrap(),
                store: Arc::new(ActivityRecords::in_memory().unwrap()),
            }
        }
    }

    impl AgentTestContext {
        fn storage(&self) -> DataStorage {
            DataStorage::at(self.temp_dir.path())
        }
    }

    /// Collector double that keeps every delivered record.
    #[derive(Clone, Default)]
    struct CapturingCollector {
        received: Arc<Mutex<Vec<ActivityRecord>>>,
    }

    impl RemoteCollector for CapturingCollector {
        async fn submit(&self, record: &ActivityRecord) -> Result<(), SubmitError> {
            self.received.lock().push(record.clone());
            Ok(())
        }
    }

    struct BrokenSource;

    impl EventSource for BrokenSource {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn register(&mut self, _callback: EventCallback) -> Result<(), SourceError> {
            Err(SourceError::StartFailed {
                name: "broken",
                reason: "no input permission".to_string(),
            })
        }

        fn unregister(&mut self) {}
    }

    fn resolver(handle: &WindowHandle) -> Result<Option<WindowSnapshot>, ResolveError> {
        match handle.id.split_once(':') {
            Some((process, title)) => Ok(Some(WindowSnapshot::new(title, process))),
            None => Err(ResolveError::Lookup(handle.id.clone())),
        }
    }

    fn window(process: &str, title: &str) -> Option<WindowHandle> {
        Some(WindowHandle::new(format!("{}:{}", process, title), 1))
    }

    fn pipeline() -> PipelineConfig {
        PipelineConfig {
            debounce_ms: 0,
            idle_timeout_secs: 1,
            idle_check_interval_secs: 1,
            batch_size: 2,
            batch_interval_secs: 1,
            retry_base_delay_ms: 10,
            status_interval_secs: 1,
            ..PipelineConfig::default()
        }
    }

    async fn wait_for(condition: impl Fn() -> bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        condition()
    }

    #[test_context(AgentTestContext)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_records_reach_both_sinks(ctx: &mut AgentTestContext) {
        let source = ManualSource::new();
        let emitter = source.emitter();
        let collector = CapturingCollector::default();

        let agent = AgentBuilder::new(pipeline(), source, resolver, ctx.store.clone())
            .user_identity("tester")
            .collector(collector.clone())
            .start()
            .unwrap();

        assert!(emitter.emit(RawEvent::focus(window("editor", "main.rs"))));
        assert!(emitter.emit(RawEvent::input()));
        assert!(wait_for(|| agent.activity_status() == ActivityStatus::Active, Duration::from_secs(2)).await);

        let report = agent.stop().await;

        // Window change, activation, and the closing deactivation.
        assert_eq!(report.processor.records_emitted, 3);
        assert_eq!(report.persistence.committed, 3);
        assert_eq!(report.persistence.lost, 0);
        let submission = report.submission.expect("collector configured");
        assert_eq!(submission.delivered, 3);
        assert_eq!(submission.abandoned, 0);

        let stored = ctx.store.fetch_recent(10).unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored.iter().all(|record| record.user_identity == "tester"));

        let mut stored_ids: Vec<_> = stored.iter().map(|record| record.id).collect();
        let mut delivered_ids: Vec<_> = collector.received.lock().iter().map(|record| record.id).collect();
        stored_ids.sort();
        delivered_ids.sort();
        assert_eq!(stored_ids, delivered_ids);

        let triggers: Vec<RecordTrigger> = collector.received.lock().iter().map(|record| record.trigger).collect();
        assert!(triggers.contains(&RecordTrigger::WindowChanged));
        assert!(triggers.contains(&RecordTrigger::Activated));
        assert!(triggers.contains(&RecordTrigger::Deactivated));
    }

    #[test_context(AgentTestContext)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_local_only_agent(ctx: &mut AgentTestContext) {
        let source = ManualSource::new();
        let emitter = source.emitter();

        let agent = AgentBuilder::new(pipeline(), source, resolver, ctx.store.clone()).start().unwrap();
        emitter.emit(RawEvent::focus(None));

        assert!(wait_for(|| agent.status().processor.window_changes == 1, Duration::from_secs(2)).await);
        assert!(agent.status().submission.is_none());

        let report = agent.stop().await;
        assert!(report.submission.is_none());
        assert_eq!(report.persistence.committed, 1);
        assert!(!emitter.emit(RawEvent::input()));
    }

    #[test_context(AgentTestContext)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_idle_timeout_deactivates(ctx: &mut AgentTestContext) {
        let source = ManualSource::new();
        let emitter = source.emitter();

        let agent = AgentBuilder::new(pipeline(), source, resolver, ctx.store.clone()).start().unwrap();
        emitter.emit(RawEvent::input());
        assert!(wait_for(|| agent.activity_status() == ActivityStatus::Active, Duration::from_secs(2)).await);

        assert!(wait_for(|| agent.activity_status() == ActivityStatus::Inactive, Duration::from_secs(4)).await);

        let report = agent.stop().await;
        // Already inactive, so stopping adds nothing.
        assert_eq!(report.processor.records_emitted, 2);
        let stored = ctx.store.fetch_recent(10).unwrap();
        assert_eq!(stored[0].trigger, RecordTrigger::Deactivated);
    }

    #[test_context(AgentTestContext)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_status_file_lifecycle(ctx: &mut AgentTestContext) {
        let source = ManualSource::new();
        let emitter = source.emitter();
        let status_path = ctx.temp_dir.path().join(STATUS_FILE_NAME);

        let agent = AgentBuilder::new(pipeline(), source, resolver, ctx.store.clone())
            .publish_status(ctx.storage())
            .start()
            .unwrap();
        emitter.emit(RawEvent::input());

        assert!(wait_for(|| status_path.exists(), Duration::from_secs(2)).await);
        assert!(
            wait_for(
                || matches!(AgentStatus::load(&ctx.storage()), Ok(Some(status)) if status.activity_status == ActivityStatus::Active),
                Duration::from_secs(3)
            )
            .await
        );

        let status = AgentStatus::load(&ctx.storage()).unwrap().unwrap();
        assert_eq!(status.pid, std::process::id());
        assert_eq!(status.queue_capacity, 200);

        agent.stop().await;
        assert!(!status_path.exists());
    }

    #[test_context(AgentTestContext)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_status_snapshot_counts(ctx: &mut AgentTestContext) {
        let source = ManualSource::new();
        let emitter = source.emitter();

        let agent = AgentBuilder::new(pipeline(), source, resolver, ctx.store.clone()).start().unwrap();
        emitter.emit(RawEvent::focus(window("editor", "main.rs")));
        emitter.emit(RawEvent::focus(Some(WindowHandle::new("garbage", 3))));

        assert!(wait_for(|| agent.status().processor.resolution_failures == 1, Duration::from_secs(2)).await);
        let status = agent.status();
        assert_eq!(status.activity_status, ActivityStatus::Inactive);
        assert_eq!(status.processor.window_changes, 1);
        assert_eq!(status.dropped_event_count, 0);

        agent.stop().await;
    }

    #[test_context(AgentTestContext)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_source_failure_aborts_start(ctx: &mut AgentTestContext) {
        let result = AgentBuilder::new(pipeline(), BrokenSource, resolver, ctx.store.clone()).start();

        assert!(matches!(result.err(), Some(AgentError::Source(SourceError::StartFailed { name: "broken", .. }))));
    }

    #[test_context(AgentTestContext)]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_invalid_config_aborts_start(ctx: &mut AgentTestContext) {
        let pipeline = PipelineConfig {
            queue_capacity: 0,
            ..pipeline()
        };

        let result = AgentBuilder::new(pipeline, ManualSource::new(), resolver, ctx.store.clone()).start();

        assert!(matches!(result.err(), Some(AgentError::Config(ConfigError::Zero("queue_capacity")))));
    }
}
