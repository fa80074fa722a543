#[cfg(test)]
mod tests {
    use actrail::db::db::Db;
    use actrail::db::migrations::MigrationManager;
    use actrail::db::records::ActivityRecords;
    use actrail::libs::activity::{ActivityRecord, ActivityStatus, RecordTrigger, WindowSnapshot};
    use actrail::libs::batcher::LocalStore;
    use chrono::{Duration, TimeZone, Utc};
    use rusqlite::Connection;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    struct StoreTestContext {
        temp_dir: TempDir,
    }

    impl TestContext for StoreTestContext {
        fn setup() -> Self {
            StoreTestContext {
                temp_dir: tempfile::tempdir().unwrap(),
            }
        }
    }

    fn record_at(seconds: i64, process: &str) -> ActivityRecord {
        let timestamp = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap() + Duration::seconds(seconds);
        ActivityRecord::new(
            timestamp,
            &WindowSnapshot::new(format!("{} window", process), process),
            "tester",
            ActivityStatus::Active,
            RecordTrigger::WindowChanged,
        )
    }

    #[test]
    fn test_write_and_fetch_round_trip() {
        let store = ActivityRecords::in_memory().unwrap();
        let activated = record_at(0, "editor").with_idle_seconds(Some(42));
        let mut deactivated = record_at(5, "editor");
        deactivated.activity_status = ActivityStatus::Inactive;
        deactivated.trigger = RecordTrigger::Deactivated;

        store.write_batch(&[activated.clone(), deactivated.clone()]).unwrap();

        let fetched = store.fetch_recent(10).unwrap();
        assert_eq!(fetched, vec![deactivated, activated]);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_fetch_recent_is_newest_first_and_limited() {
        let store = ActivityRecords::in_memory().unwrap();
        let records: Vec<ActivityRecord> = (0..5).map(|n| record_at(n * 60, "shell")).collect();
        store.write_batch(&records).unwrap();

        let fetched = store.fetch_recent(2).unwrap();

        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].id, records[4].id);
        assert_eq!(fetched[1].id, records[3].id);
    }

    #[test]
    fn test_failed_batch_leaves_nothing_behind() {
        let store = ActivityRecords::in_memory().unwrap();
        store
            .conn
            .lock()
            .execute_batch(
                "CREATE TRIGGER reject_poison BEFORE INSERT ON activity_records
                 WHEN NEW.process_name = 'poison'
                 BEGIN SELECT RAISE(ABORT, 'poisoned record'); END;",
            )
            .unwrap();

        let batch = vec![record_at(0, "editor"), record_at(1, "poison"), record_at(2, "browser")];
        let result = store.write_batch(&batch);

        assert!(result.is_err());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_rewriting_a_batch_is_idempotent() {
        let store = ActivityRecords::in_memory().unwrap();
        let batch = vec![record_at(0, "editor"), record_at(1, "browser")];

        store.write_batch(&batch).unwrap();
        store.write_batch(&batch).unwrap();

        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_empty_batch() {
        let store = ActivityRecords::in_memory().unwrap();

        store.write_batch(&[]).unwrap();

        assert_eq!(store.count().unwrap(), 0);
    }

    #[test_context(StoreTestContext)]
    #[test]
    fn test_records_survive_reopen(ctx: &mut StoreTestContext) {
        let path = ctx.temp_dir.path().join("actrail.db");
        let batch = vec![record_at(0, "editor")];

        {
            let store = ActivityRecords::from_db(Db::open(&path).unwrap());
            store.write_batch(&batch).unwrap();
        }

        let store = ActivityRecords::from_db(Db::open(&path).unwrap());
        assert_eq!(store.fetch_recent(10).unwrap(), batch);
    }

    #[test_context(StoreTestContext)]
    #[test]
    fn test_migrations_applied_once(ctx: &mut StoreTestContext) {
        let path = ctx.temp_dir.path().join("actrail.db");
        let manager = MigrationManager::new();

        let mut conn = Connection::open(&path).unwrap();
        assert_eq!(manager.get_current_version(&conn).ok(), None);

        manager.run_migrations(&mut conn).unwrap();
        assert_eq!(manager.get_current_version(&conn).unwrap(), manager.latest_version());

        manager.run_migrations(&mut conn).unwrap();
        let applied: i64 = conn.query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0)).unwrap();
        assert_eq!(applied as u32, manager.latest_version());
    }

    #[test]
    fn test_activity_table_exists_after_migration() {
        let db = Db::in_memory().unwrap();

        let exists: bool = db
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'activity_records'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert!(exists);
    }
}
