mod connection;
pub mod helpers;
mod migrations;
pub mod models;
pub mod repositories;

pub use connection::Database;
pub use migrations::CURRENT_SCHEMA_VERSION;
pub use models::{ActivityRecord, StreakData};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ritual::{CompletionRecord, MiniGameKind, PhaseKind, SessionRecorder};
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::TempDir;

    fn open() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("nested").join("mokuso.db")).unwrap();
        (dir, db)
    }

    fn record(id: &str, day: u32, hour: u32) -> CompletionRecord {
        CompletionRecord {
            session_id: id.to_string(),
            completed_at: Utc.with_ymd_and_hms(2026, 6, day, hour, 0, 0).unwrap(),
            local_day: NaiveDate::from_ymd_opt(2026, 6, day).unwrap(),
            duration_minutes: 3,
            phase_order: [PhaseKind::Focus, PhaseKind::Breathe, PhaseKind::Activate],
            mini_game: MiniGameKind::PatternMemory,
        }
    }

    #[tokio::test]
    async fn fresh_database_has_empty_streak() {
        let (_dir, db) = open();
        assert_eq!(db.get_streak().await.unwrap(), StreakData::default());
        assert!(db.list_activity(10).await.unwrap().is_empty());
        assert!(db.path().ends_with("mokuso.db"));
    }

    #[tokio::test]
    async fn completions_update_log_and_streak_together() {
        let (_dir, db) = open();
        db.record_completion(record("a", 1, 8)).await.unwrap();
        db.record_completion(record("b", 2, 8)).await.unwrap();
        db.record_completion(record("c", 2, 20)).await.unwrap();

        let streak = db.get_streak().await.unwrap();
        assert_eq!(streak.current_streak, 2);
        assert_eq!(streak.longest_streak, 2);
        assert_eq!(streak.total_sessions, 3);
        assert_eq!(streak.total_minutes, 9);
        assert_eq!(
            streak.last_session_date,
            NaiveDate::from_ymd_opt(2026, 6, 2)
        );

        let log = db.list_activity(2).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].id, "c");
        assert_eq!(log[1].id, "b");
        assert_eq!(
            log[0].phase_order,
            vec![PhaseKind::Focus, PhaseKind::Breathe, PhaseKind::Activate]
        );
        assert_eq!(log[0].mini_game, MiniGameKind::PatternMemory);
    }

    #[tokio::test]
    async fn duplicate_session_rolls_back_streak() {
        let db = Database::in_memory().unwrap();
        db.record_completion(record("a", 1, 8)).await.unwrap();
        assert!(db.record_completion(record("a", 2, 8)).await.is_err());

        let streak = db.get_streak().await.unwrap();
        assert_eq!(streak.total_sessions, 1);
        assert_eq!(streak.current_streak, 1);
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mokuso.db");
        {
            let db = Database::new(path.clone()).unwrap();
            db.record_completion(record("a", 5, 8)).await.unwrap();
        }
        let db = Database::new(path).unwrap();
        assert_eq!(db.get_streak().await.unwrap().total_sessions, 1);
        assert_eq!(db.list_activity(5).await.unwrap().len(), 1);
    }

    fn wal_path(path: &std::path::Path) -> std::path::PathBuf {
        let mut wal = path.as_os_str().to_owned();
        wal.push("-wal");
        wal.into()
    }

    #[test]
    fn last_drop_outside_a_runtime_closes_the_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mokuso.db");
        let db = Database::new(path.clone()).unwrap();

        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime
            .block_on(db.record_completion(record("a", 3, 8)))
            .unwrap();
        drop(runtime);
        assert!(wal_path(&path).exists());

        drop(db);
        assert!(!wal_path(&path).exists());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn last_drop_inside_a_runtime_closes_the_connection_off_the_executor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mokuso.db");
        let db = Database::new(path.clone()).unwrap();
        db.record_completion(record("a", 3, 8)).await.unwrap();

        let clone = db.clone();
        drop(db);
        assert_eq!(clone.get_streak().await.unwrap().total_sessions, 1);
        drop(clone);

        for _ in 0..200 {
            if !wal_path(&path).exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!wal_path(&path).exists());
    }
}
