use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Consecutive-day counters kept in the single `streak` row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakData {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_sessions: u32,
    pub total_minutes: u32,
    pub last_session_date: Option<NaiveDate>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StreakData {
    /// Folds one completed ritual on `day` into the counters.
    ///
    /// A second ritual on the same day only adds to the totals. A ritual on
    /// the day after the last one extends the streak; any other gap, or a
    /// clock that went backwards, starts over at one.
    pub fn apply_completion(&mut self, day: NaiveDate, minutes: u32) {
        self.total_sessions = self.total_sessions.saturating_add(1);
        self.total_minutes = self.total_minutes.saturating_add(minutes);

        self.current_streak = match self.last_session_date {
            Some(last) if last == day => self.current_streak.max(1),
            Some(last) if last.succ_opt() == Some(day) => self.current_streak.saturating_add(1),
            _ => 1,
        };
        self.longest_streak = self.longest_streak.max(self.current_streak);

        if self.last_session_date.map_or(true, |last| day >= last) {
            self.last_session_date = Some(day);
        }
    }

    /// Streak as the athlete would see it on `today`: a streak whose last
    /// session is older than yesterday has already lapsed.
    pub fn current_on(&self, today: NaiveDate) -> u32 {
        match self.last_session_date {
            Some(last) if last == today || last.succ_opt() == Some(today) => self.current_streak,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    #[test]
    fn first_session_starts_a_streak() {
        let mut streak = StreakData::default();
        streak.apply_completion(day(1), 3);
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.longest_streak, 1);
        assert_eq!(streak.total_sessions, 1);
        assert_eq!(streak.total_minutes, 3);
        assert_eq!(streak.last_session_date, Some(day(1)));
    }

    #[test]
    fn same_day_only_adds_totals() {
        let mut streak = StreakData::default();
        streak.apply_completion(day(1), 3);
        streak.apply_completion(day(1), 3);
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.total_sessions, 2);
        assert_eq!(streak.total_minutes, 6);
    }

    #[test]
    fn consecutive_days_extend_and_gaps_reset() {
        let mut streak = StreakData::default();
        for d in 1..=4 {
            streak.apply_completion(day(d), 3);
        }
        assert_eq!(streak.current_streak, 4);

        streak.apply_completion(day(7), 3);
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.longest_streak, 4);
        assert_eq!(streak.total_sessions, 5);
    }

    #[test]
    fn streak_lapses_when_viewed_late() {
        let mut streak = StreakData::default();
        streak.apply_completion(day(1), 3);
        streak.apply_completion(day(2), 3);
        assert_eq!(streak.current_on(day(2)), 2);
        assert_eq!(streak.current_on(day(3)), 2);
        assert_eq!(streak.current_on(day(4)), 0);
    }
}
