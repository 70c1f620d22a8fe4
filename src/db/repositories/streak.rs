use anyhow::Result;
use rusqlite::{params, Connection};

use crate::db::{
    connection::Database,
    helpers::{format_day, parse_datetime, parse_optional_day, to_u32},
    models::StreakData,
};

pub(crate) fn load_streak(conn: &Connection) -> Result<StreakData> {
    let (current, longest, sessions, minutes, last_day, updated_at) = conn.query_row(
        "SELECT current_streak, longest_streak, total_sessions, total_minutes, last_session_date, updated_at
         FROM streak
         WHERE id = 1",
        [],
        |row| {
            Ok((
                row.get::<_, i64>("current_streak")?,
                row.get::<_, i64>("longest_streak")?,
                row.get::<_, i64>("total_sessions")?,
                row.get::<_, i64>("total_minutes")?,
                row.get::<_, Option<String>>("last_session_date")?,
                row.get::<_, Option<String>>("updated_at")?,
            ))
        },
    )?;

    Ok(StreakData {
        current_streak: to_u32(current, "current_streak")?,
        longest_streak: to_u32(longest, "longest_streak")?,
        total_sessions: to_u32(sessions, "total_sessions")?,
        total_minutes: to_u32(minutes, "total_minutes")?,
        last_session_date: parse_optional_day(last_day, "last_session_date")?,
        updated_at: updated_at
            .map(|raw| parse_datetime(&raw, "updated_at"))
            .transpose()?,
    })
}

pub(crate) fn store_streak(conn: &Connection, streak: &StreakData) -> Result<()> {
    conn.execute(
        "UPDATE streak
         SET current_streak = ?1,
             longest_streak = ?2,
             total_sessions = ?3,
             total_minutes = ?4,
             last_session_date = ?5,
             updated_at = ?6
         WHERE id = 1",
        params![
            streak.current_streak,
            streak.longest_streak,
            streak.total_sessions,
            streak.total_minutes,
            streak.last_session_date.map(format_day),
            streak.updated_at.map(|dt| dt.to_rfc3339()),
        ],
    )?;
    Ok(())
}

impl Database {
    pub async fn get_streak(&self) -> Result<StreakData> {
        self.execute(|conn| load_streak(conn)).await
    }
}
