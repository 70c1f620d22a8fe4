pub mod activity;
pub mod streak;

pub use activity::ActivityRecord;
pub use streak::StreakData;
