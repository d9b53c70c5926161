//! Boundary events exchanged with the in-page collaborator.
//!
//! Both directions are JSON objects tagged by `"type"`.

use serde::{Deserialize, Serialize};
use shakmaty::Color;

use crate::error::SettingsError;
use crate::policy::Reason;
use crate::stats::StatsSummary;

/// Longest countdown the settings panel offers.
pub const MAX_DURATION_SECS: u32 = 20;

/// Countdown used until the collaborator applies its own settings.
pub const DEFAULT_DURATION_SECS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerColor {
    White,
    Black,
}

impl From<PlayerColor> for Color {
    fn from(color: PlayerColor) -> Self {
        match color {
            PlayerColor::White => Color::White,
            PlayerColor::Black => Color::Black,
        }
    }
}

/// Session-scoped settings. Changing them never touches a running countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub duration_seconds: u32,
    pub muted: bool,
}

impl Settings {
    pub fn new(duration_seconds: u32, muted: bool) -> Result<Self, SettingsError> {
        if duration_seconds > MAX_DURATION_SECS {
            return Err(SettingsError::DurationOutOfRange(duration_seconds));
        }
        Ok(Self {
            duration_seconds,
            muted,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            duration_seconds: DEFAULT_DURATION_SECS,
            muted: false,
        }
    }
}

/// Events consumed by the engine, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InputEvent {
    OpponentMove { notation: String },
    ControlledMove { notation: String },
    MoveAttempt { from: String, to: String },
    SettingsApply { duration_seconds: u32, muted: bool },
    GameEnded { result: String },
}

/// Widget state shown next to the stats panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Ended,
    Waiting,
    Calculating,
    Timer,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnStatus {
    pub is_controlled_turn: bool,
    pub engine_is_thinking: bool,
    pub still_book_moves: bool,
    pub game_end_status: Option<String>,
    pub phase: Phase,
}

/// Events produced by the engine for the UI collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutputEvent {
    TurnStatus(TurnStatus),
    TimerTick { seconds_remaining: u32 },
    TimerArmed,
    StatsUpdate(StatsSummary),
    BlockDecision {
        allowed: bool,
        reason: Reason,
        sound: bool,
    },
    SettingsApplied(Settings),
    TrackingLost { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_event_wire_format() {
        let ev: InputEvent =
            serde_json::from_str(r#"{"type":"move-attempt","from":"e2","to":"e4"}"#).unwrap();
        assert_eq!(
            ev,
            InputEvent::MoveAttempt {
                from: "e2".into(),
                to: "e4".into()
            }
        );

        let ev: InputEvent = serde_json::from_str(
            r#"{"type":"settings-apply","duration_seconds":5,"muted":true}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            InputEvent::SettingsApply {
                duration_seconds: 5,
                muted: true
            }
        );
    }

    #[test]
    fn test_output_event_wire_format() {
        let json = serde_json::to_value(OutputEvent::BlockDecision {
            allowed: false,
            reason: Reason::Blocked,
            sound: true,
        })
        .unwrap();
        assert_eq!(json["type"], "block-decision");
        assert_eq!(json["reason"], "blocked");

        let json = serde_json::to_value(OutputEvent::BlockDecision {
            allowed: true,
            reason: Reason::InvalidAttempt,
            sound: false,
        })
        .unwrap();
        assert_eq!(json["reason"], "invalid_attempt");

        let json = serde_json::to_value(OutputEvent::TimerTick {
            seconds_remaining: 2,
        })
        .unwrap();
        assert_eq!(json["type"], "timer-tick");
        assert_eq!(json["seconds_remaining"], 2);

        let json = serde_json::to_value(OutputEvent::TimerArmed).unwrap();
        assert_eq!(json["type"], "timer-armed");
    }

    #[test]
    fn test_settings_range() {
        assert!(Settings::new(0, false).is_ok());
        assert!(Settings::new(20, true).is_ok());
        assert_eq!(
            Settings::new(21, false),
            Err(SettingsError::DurationOutOfRange(21))
        );
        assert_eq!(Settings::default().duration_seconds, 3);
    }
}
