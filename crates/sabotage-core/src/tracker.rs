//! Authoritative replica of the observed game.
//!
//! Moves arrive as the notation shown in the host's move list (SAN, with UCI
//! accepted as a fallback) and are replayed with shakmaty. The tracker never
//! guesses: a move that does not replay leaves the state untouched and the
//! caller is expected to stop tracking.

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position};

use crate::error::TrackerError;
use crate::events::PlayerColor;

/// Which side of the board a move belongs to, relative to the controlled player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Controlled,
    Opponent,
}

/// One observed move. `uci` is derived from the position that preceded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub index: usize,
    pub notation: String,
    pub side: Side,
    pub uci: String,
}

pub struct PositionTracker {
    position: Chess,
    controlled: Color,
    history: Vec<MoveRecord>,
}

impl PositionTracker {
    pub fn new(controlled: PlayerColor) -> Self {
        Self {
            position: Chess::default(),
            controlled: controlled.into(),
            history: Vec::new(),
        }
    }

    /// Replay `notation` for whichever side is to move.
    pub fn apply(&mut self, notation: &str) -> Result<&MoveRecord, TrackerError> {
        let side = self.side_to_move();
        self.apply_as(notation, side)
    }

    /// Replay `notation`, checking that it belongs to `side`.
    ///
    /// On error nothing changes. On success the position is replaced and the
    /// new record is returned; `side_to_move` then reports whose turn it is.
    pub fn apply_as(&mut self, notation: &str, side: Side) -> Result<&MoveRecord, TrackerError> {
        let notation = notation.trim();
        if side != self.side_to_move() {
            return Err(TrackerError::WrongSide {
                notation: notation.to_string(),
            });
        }

        let mv = self.parse_move(notation)?;
        let uci = mv.to_uci(CastlingMode::Standard).to_string();
        let next = self
            .position
            .clone()
            .play(mv)
            .map_err(|_| TrackerError::IllegalMove {
                notation: notation.to_string(),
                fen: self.fen(),
            })?;

        self.position = next;
        self.history.push(MoveRecord {
            index: self.history.len(),
            notation: notation.to_string(),
            side,
            uci,
        });

        Ok(&self.history[self.history.len() - 1])
    }

    fn parse_move(&self, notation: &str) -> Result<Move, TrackerError> {
        if let Ok(san_plus) = notation.parse::<SanPlus>() {
            if let Ok(mv) = san_plus.san.to_move(&self.position) {
                return Ok(mv);
            }
        }

        // Some feeds report coordinates instead of SAN
        if let Ok(uci) = UciMove::from_ascii(notation.as_bytes()) {
            return uci
                .to_move(&self.position)
                .map_err(|_| TrackerError::IllegalMove {
                    notation: notation.to_string(),
                    fen: self.fen(),
                });
        }

        if notation.parse::<SanPlus>().is_ok() {
            Err(TrackerError::IllegalMove {
                notation: notation.to_string(),
                fen: self.fen(),
            })
        } else {
            Err(TrackerError::InvalidNotation(notation.to_string()))
        }
    }

    /// Index the next observed move will receive.
    pub fn next_index(&self) -> usize {
        self.history.len()
    }

    pub fn side_to_move(&self) -> Side {
        if self.position.turn() == self.controlled {
            Side::Controlled
        } else {
            Side::Opponent
        }
    }

    pub fn is_controlled_turn(&self) -> bool {
        self.side_to_move() == Side::Controlled
    }

    pub fn fen(&self) -> String {
        Fen::from_position(&self.position, EnPassantMode::Legal).to_string()
    }

    pub fn legal_move_count(&self) -> usize {
        self.position.legal_moves().len()
    }

    pub fn record(&self, index: usize) -> Option<&MoveRecord> {
        self.history.get(index)
    }

    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }
}
