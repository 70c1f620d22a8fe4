use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{
        format_day, format_phase_order, parse_datetime, parse_day, parse_mini_game,
        parse_phase_order, to_i64, to_u32,
    },
    models::{ActivityRecord, StreakData},
};
use crate::ritual::{CompletionRecord, RecordFuture, SessionRecorder};

use super::streak::{load_streak, store_streak};

fn row_to_activity(row: &Row) -> Result<ActivityRecord> {
    let completed_at: String = row.get("completed_at")?;
    let local_day: String = row.get("local_day")?;
    let duration_minutes: i64 = row.get("duration_minutes")?;
    let phase_order: String = row.get("phase_order")?;
    let mini_game: String = row.get("mini_game")?;

    Ok(ActivityRecord {
        id: row.get("id")?,
        completed_at: parse_datetime(&completed_at, "completed_at")?,
        local_day: parse_day(&local_day, "local_day")?,
        duration_minutes: to_u32(duration_minutes, "duration_minutes")?,
        phase_order: parse_phase_order(&phase_order)?,
        mini_game: parse_mini_game(&mini_game)?,
    })
}

impl Database {
    /// Appends the activity row and folds it into the streak in one
    /// transaction. Returns the updated streak.
    pub async fn insert_completion(&self, record: &CompletionRecord) -> Result<StreakData> {
        let record = record.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO activity_log (id, completed_at, local_day, duration_minutes, phase_order, mini_game)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.session_id,
                    record.completed_at.to_rfc3339(),
                    format_day(record.local_day),
                    record.duration_minutes,
                    format_phase_order(&record.phase_order),
                    record.mini_game.as_str(),
                ],
            )
            .context("failed to insert activity record")?;

            let mut streak = load_streak(&tx)?;
            streak.apply_completion(record.local_day, record.duration_minutes);
            streak.updated_at = Some(record.completed_at);
            store_streak(&tx, &streak)?;

            tx.commit().context("failed to commit completion")?;
            Ok(streak)
        })
        .await
    }

    /// Most recent activity first.
    pub async fn list_activity(&self, limit: u64) -> Result<Vec<ActivityRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, completed_at, local_day, duration_minutes, phase_order, mini_game
                 FROM activity_log
                 ORDER BY completed_at DESC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![to_i64(limit)?])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_activity(row)?);
            }
            Ok(records)
        })
        .await
    }
}

impl SessionRecorder for Database {
    fn record_completion(&self, record: CompletionRecord) -> RecordFuture<'_> {
        Box::pin(async move {
            let streak = self.insert_completion(&record).await?;
            log::info!(
                "Streak now {} (longest {}, {} sessions)",
                streak.current_streak,
                streak.longest_streak,
                streak.total_sessions
            );
            Ok(())
        })
    }
}
