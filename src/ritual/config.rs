use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::state::MacroPhase;

/// One of the three user-orderable content phases of a ritual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PhaseKind {
    Breathe,
    Focus,
    Activate,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 3] = [PhaseKind::Breathe, PhaseKind::Focus, PhaseKind::Activate];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Breathe => "breathe",
            PhaseKind::Focus => "focus",
            PhaseKind::Activate => "activate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "breathe" | "breathing" => Some(PhaseKind::Breathe),
            "focus" => Some(PhaseKind::Focus),
            "activate" | "activation" => Some(PhaseKind::Activate),
            _ => None,
        }
    }

    pub fn macro_phase(&self) -> MacroPhase {
        match self {
            PhaseKind::Breathe => MacroPhase::Breathing,
            PhaseKind::Focus => MacroPhase::Focus,
            PhaseKind::Activate => MacroPhase::Activate,
        }
    }
}

/// Mini-game presented during the Focus phase. The engine only uses it to
/// tell the presentation layer which game to mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum MiniGameKind {
    #[default]
    NumberTap,
    ReactionLights,
    PatternMemory,
}

impl MiniGameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MiniGameKind::NumberTap => "numberTap",
            MiniGameKind::ReactionLights => "reactionLights",
            MiniGameKind::PatternMemory => "patternMemory",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "numbertap" => Some(MiniGameKind::NumberTap),
            "reactionlights" => Some(MiniGameKind::ReactionLights),
            "patternmemory" => Some(MiniGameKind::PatternMemory),
            _ => None,
        }
    }
}

/// Per-session input, read once at start and never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RitualConfiguration {
    order: [PhaseKind; 3],
    mini_game: MiniGameKind,
    sound_enabled: bool,
}

impl RitualConfiguration {
    pub fn new(order: &[PhaseKind], mini_game: MiniGameKind, sound_enabled: bool) -> Result<Self> {
        let order: [PhaseKind; 3] = match order {
            [a, b, c] => [*a, *b, *c],
            _ => bail!("phase order must name exactly 3 phases, got {}", order.len()),
        };

        for (i, kind) in order.iter().enumerate() {
            if order[..i].contains(kind) {
                bail!("phase {} appears more than once in the order", kind.as_str());
            }
        }

        Ok(Self {
            order,
            mini_game,
            sound_enabled,
        })
    }

    pub fn order(&self) -> &[PhaseKind; 3] {
        &self.order
    }

    pub fn phase_at(&self, index: usize) -> Option<PhaseKind> {
        self.order.get(index).copied()
    }

    pub fn mini_game(&self) -> MiniGameKind {
        self.mini_game
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled
    }
}

impl Default for RitualConfiguration {
    fn default() -> Self {
        Self {
            order: PhaseKind::ALL,
            mini_game: MiniGameKind::default(),
            sound_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_any_permutation() {
        let config = RitualConfiguration::new(
            &[PhaseKind::Activate, PhaseKind::Breathe, PhaseKind::Focus],
            MiniGameKind::PatternMemory,
            false,
        )
        .unwrap();

        assert_eq!(config.phase_at(0), Some(PhaseKind::Activate));
        assert_eq!(config.phase_at(3), None);
        assert!(!config.sound_enabled());
    }

    #[test]
    fn rejects_duplicates_and_wrong_length() {
        assert!(RitualConfiguration::new(
            &[PhaseKind::Focus, PhaseKind::Focus, PhaseKind::Breathe],
            MiniGameKind::NumberTap,
            true,
        )
        .is_err());
        assert!(RitualConfiguration::new(
            &[PhaseKind::Focus, PhaseKind::Breathe],
            MiniGameKind::NumberTap,
            true,
        )
        .is_err());
    }

    #[test]
    fn parses_user_facing_names() {
        assert_eq!(PhaseKind::parse(" Breathing "), Some(PhaseKind::Breathe));
        assert_eq!(MiniGameKind::parse("reaction-lights"), Some(MiniGameKind::ReactionLights));
        assert_eq!(MiniGameKind::parse("chess"), None);
    }
}
