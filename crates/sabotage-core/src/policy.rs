//! Allow/block decision for a single move attempt. Pure; performs no I/O.

use serde::Serialize;
use shakmaty::Square;

use crate::resolver::{Recommendation, RecommendationKind};

/// A pending move from the host board, before the host commits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveAttempt {
    pub from: Square,
    pub to: Square,
}

impl MoveAttempt {
    /// Parse two algebraic squares ("e2", "e4").
    pub fn parse(from: &str, to: &str) -> Option<Self> {
        Some(Self {
            from: from.trim().parse().ok()?,
            to: to.trim().parse().ok()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    OnlyMove,
    BookMove,
    Unresolved,
    NotBestMove,
    SavedByTimer,
    Blocked,
    /// No controlled turn is being tracked (opponent's turn, game over, desync).
    NotTracking,
    /// The attempt's squares could not be read.
    InvalidAttempt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    pub reason: Reason,
}

impl Decision {
    pub fn allow(reason: Reason) -> Self {
        Self {
            verdict: Verdict::Allow,
            reason,
        }
    }

    pub fn block() -> Self {
        Self {
            verdict: Verdict::Block,
            reason: Reason::Blocked,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.verdict == Verdict::Allow
    }
}

/// Squares of a coordinate move, ignoring any promotion suffix.
pub fn uci_squares(uci: &str) -> Option<(Square, Square)> {
    let from = uci.get(0..2)?.parse().ok()?;
    let to = uci.get(2..4)?.parse().ok()?;
    Some((from, to))
}

/// First matching rule wins:
/// forced move, book phase, nothing resolved, different move, countdown, block.
pub fn decide(
    attempt: &MoveAttempt,
    recommendation: Option<&Recommendation>,
    timer_armed: bool,
    legal_move_count: usize,
) -> Decision {
    if legal_move_count <= 1 {
        return Decision::allow(Reason::OnlyMove);
    }

    let Some(recommendation) = recommendation else {
        return Decision::allow(Reason::Unresolved);
    };

    if recommendation.kind == RecommendationKind::Book {
        return Decision::allow(Reason::BookMove);
    }

    let Some((from, to)) = recommendation.uci.as_deref().and_then(uci_squares) else {
        return Decision::allow(Reason::Unresolved);
    };

    if attempt.from != from || attempt.to != to {
        return Decision::allow(Reason::NotBestMove);
    }

    if timer_armed {
        Decision::block()
    } else {
        Decision::allow(Reason::SavedByTimer)
    }
}
