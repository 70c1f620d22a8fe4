//! Line-oriented stand-in for the presentation layer: reads gestures from
//! stdin and prints what the engine reports back.

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;

use crate::db::{ActivityRecord, StreakData};
use crate::ritual::{MiniGameKind, PhaseKind, PhaseState, RampStep, RitualSnapshot};

const DEFAULT_HISTORY: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Skip,
    Hold,
    Release,
    Ignite,
    Done,
    Abandon,
    Status,
    Streak,
    History(u64),
    Order(Vec<PhaseKind>),
    Game(MiniGameKind),
    Sound(bool),
    Settings,
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let command = match verb.to_ascii_lowercase().as_str() {
            "start" | "s" => ConsoleCommand::Start,
            "skip" | "n" => ConsoleCommand::Skip,
            "hold" | "h" => ConsoleCommand::Hold,
            "release" | "r" => ConsoleCommand::Release,
            "ignite" | "i" => ConsoleCommand::Ignite,
            "done" | "d" => ConsoleCommand::Done,
            "abandon" | "x" => ConsoleCommand::Abandon,
            "status" | "?" => ConsoleCommand::Status,
            "streak" => ConsoleCommand::Streak,
            "history" => match rest.first() {
                Some(raw) => ConsoleCommand::History(
                    raw.parse()
                        .map_err(|_| anyhow!("history expects a number, got {raw}"))?,
                ),
                None => ConsoleCommand::History(DEFAULT_HISTORY),
            },
            "order" => {
                let joined = rest.join(",");
                let order = joined
                    .split(',')
                    .filter(|part| !part.is_empty())
                    .map(|part| {
                        PhaseKind::parse(part).ok_or_else(|| anyhow!("unknown phase {part}"))
                    })
                    .collect::<Result<Vec<_>>>()?;
                ConsoleCommand::Order(order)
            }
            "game" => {
                let raw = rest.first().ok_or_else(|| anyhow!("game expects a name"))?;
                ConsoleCommand::Game(
                    MiniGameKind::parse(raw).ok_or_else(|| anyhow!("unknown mini-game {raw}"))?,
                )
            }
            "sound" => match rest.first().copied() {
                Some("on") => ConsoleCommand::Sound(true),
                Some("off") => ConsoleCommand::Sound(false),
                _ => bail!("sound expects on or off"),
            },
            "settings" => ConsoleCommand::Settings,
            "help" => ConsoleCommand::Help,
            "quit" | "exit" | "q" => ConsoleCommand::Quit,
            other => bail!("unknown command {other}, try help"),
        };

        Ok(Some(command))
    }
}

pub const HELP: &str = "\
start | skip | hold | release | ignite | done | abandon | status
streak | history [n] | settings
order breathe,focus,activate | game numberTap|reactionLights|patternMemory | sound on|off
quit";

pub fn describe(snapshot: &RitualSnapshot) -> String {
    let detail = match &snapshot.state {
        PhaseState::Intro { step } => format!("intro step {step}"),
        PhaseState::Countdown { number } => format!("countdown {number}"),
        PhaseState::Breathing(breath) => format!(
            "breathing cycle {} {} {}s left",
            breath.cycle,
            breath.phase.label(),
            breath.seconds_remaining
        ),
        PhaseState::Transition { target, .. } => format!("transition to {}", target.as_str()),
        PhaseState::Focus(focus) => format!(
            "focus ({}) {}s left",
            focus.game.as_str(),
            focus.remaining_secs
        ),
        PhaseState::Activate(ramp) => match ramp.step {
            RampStep::ReadyToTrigger => "activate: ready, ignite when set".to_string(),
            RampStep::Igniting(beat) => format!("activate: igniting {beat:?}"),
            _ => format!(
                "activate stage {}/{} \"{}\" {:.0}%{}",
                ramp.stage_index + 1,
                ramp.stage_count,
                ramp.cue_text,
                ramp.overall_progress * 100.0,
                if ramp.holding { " holding" } else { " released" }
            ),
        },
        PhaseState::Done { via_ignition } => {
            if *via_ignition {
                "done, confirm to finish".to_string()
            } else {
                "done (skipped), confirm to finish".to_string()
            }
        }
    };
    format!("[{:?}] {detail}", snapshot.status)
}

/// A streak whose last session is older than yesterday reads as zero.
pub fn describe_streak(streak: &StreakData, today: NaiveDate) -> String {
    format!(
        "streak {} (longest {}), {} sessions, {} minutes",
        streak.current_on(today),
        streak.longest_streak,
        streak.total_sessions,
        streak.total_minutes
    )
}

pub fn describe_activity(record: &ActivityRecord) -> String {
    let order: Vec<&str> = record.phase_order.iter().map(PhaseKind::as_str).collect();
    format!(
        "{} {} min [{}] {}",
        record.local_day,
        record.duration_minutes,
        order.join(" > "),
        record.mini_game.as_str()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gestures_and_aliases() {
        assert_eq!(ConsoleCommand::parse("").unwrap(), None);
        assert_eq!(
            ConsoleCommand::parse("  SKIP ").unwrap(),
            Some(ConsoleCommand::Skip)
        );
        assert_eq!(ConsoleCommand::parse("h").unwrap(), Some(ConsoleCommand::Hold));
        assert_eq!(
            ConsoleCommand::parse("history").unwrap(),
            Some(ConsoleCommand::History(DEFAULT_HISTORY))
        );
        assert_eq!(
            ConsoleCommand::parse("history 3").unwrap(),
            Some(ConsoleCommand::History(3))
        );
        assert!(ConsoleCommand::parse("history many").is_err());
        assert!(ConsoleCommand::parse("dance").is_err());
    }

    #[test]
    fn parses_settings_commands() {
        assert_eq!(
            ConsoleCommand::parse("order activate, breathe focus").unwrap(),
            Some(ConsoleCommand::Order(vec![
                PhaseKind::Activate,
                PhaseKind::Breathe,
                PhaseKind::Focus
            ]))
        );
        assert_eq!(
            ConsoleCommand::parse("game reaction-lights").unwrap(),
            Some(ConsoleCommand::Game(MiniGameKind::ReactionLights))
        );
        assert_eq!(
            ConsoleCommand::parse("sound off").unwrap(),
            Some(ConsoleCommand::Sound(false))
        );
        assert!(ConsoleCommand::parse("sound loud").is_err());
        assert!(ConsoleCommand::parse("order breathe,nap").is_err());
    }

    #[test]
    fn lapsed_streak_reads_as_zero() {
        let day = |d| NaiveDate::from_ymd_opt(2026, 4, d).unwrap();
        let mut streak = StreakData::default();
        streak.apply_completion(day(1), 3);
        streak.apply_completion(day(2), 3);

        assert_eq!(
            describe_streak(&streak, day(3)),
            "streak 2 (longest 2), 2 sessions, 6 minutes"
        );
        assert_eq!(
            describe_streak(&streak, day(9)),
            "streak 0 (longest 2), 2 sessions, 6 minutes"
        );
    }
}
