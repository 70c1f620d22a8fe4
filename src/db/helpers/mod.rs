use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

use crate::ritual::{MiniGameKind, PhaseKind};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} holds out-of-range value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_day(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_day(value: Option<String>, field: &str) -> Result<Option<NaiveDate>> {
    match value {
        Some(raw) => parse_day(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn format_day(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Phase order is stored as a comma separated list, e.g. `breathe,focus,activate`.
pub fn format_phase_order(order: &[PhaseKind]) -> String {
    order
        .iter()
        .map(PhaseKind::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

pub fn parse_phase_order(value: &str) -> Result<Vec<PhaseKind>> {
    value
        .split(',')
        .map(|raw| {
            PhaseKind::parse(raw.trim()).ok_or_else(|| anyhow!("unknown phase kind {raw}"))
        })
        .collect()
}

pub fn parse_mini_game(value: &str) -> Result<MiniGameKind> {
    MiniGameKind::parse(value).ok_or_else(|| anyhow!("unknown mini-game {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_order_survives_storage_format() {
        let order = [PhaseKind::Focus, PhaseKind::Breathe, PhaseKind::Activate];
        let stored = format_phase_order(&order);
        assert_eq!(stored, "focus,breathe,activate");
        assert_eq!(parse_phase_order(&stored).unwrap(), order.to_vec());
        assert!(parse_phase_order("focus,nap").is_err());
    }

    #[test]
    fn days_use_iso_format() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(format_day(day), "2026-03-09");
        assert_eq!(parse_day("2026-03-09", "day").unwrap(), day);
        assert_eq!(parse_optional_day(None, "day").unwrap(), None);
    }
}
