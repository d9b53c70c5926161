//! Per-game statistics, deduplicated by move index.
//!
//! Every category is a set of move indices. An index lands in at most one
//! category; the first category recorded for it sticks. `best_moves_found`
//! is always recomputed as the union, never summed.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::policy::Reason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatCategory {
    Blocked,
    BeforeEngine,
    AllowedByTimer,
    OnlyMoveAllowed,
    BookMove,
}

impl StatCategory {
    /// Category a policy decision counts towards, if any.
    pub fn from_reason(reason: Reason) -> Option<Self> {
        match reason {
            Reason::Blocked => Some(Self::Blocked),
            Reason::SavedByTimer => Some(Self::AllowedByTimer),
            Reason::OnlyMove => Some(Self::OnlyMoveAllowed),
            Reason::BookMove => Some(Self::BookMove),
            Reason::Unresolved
            | Reason::NotBestMove
            | Reason::NotTracking
            | Reason::InvalidAttempt => None,
        }
    }
}

/// Cumulative summary sent after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    pub total_moves: usize,
    pub best_moves_found: usize,
    pub blocked: usize,
    pub before_engine: usize,
    pub allowed_by_timer: usize,
    pub only_move_allowed: usize,
    pub book_moves: usize,
    /// Best moves that actually reached the board.
    pub best_moves_made: usize,
    pub best_moves_found_pct: f64,
    pub blocked_pct: f64,
    pub best_moves_made_pct: f64,
}

#[derive(Debug, Default)]
pub struct StatsAggregator {
    blocked: BTreeSet<usize>,
    before_engine: BTreeSet<usize>,
    allowed_by_timer: BTreeSet<usize>,
    only_move_allowed: BTreeSet<usize>,
    book_move: BTreeSet<usize>,
    committed: BTreeSet<usize>,
    last_blocked: Option<usize>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, category: StatCategory) -> &BTreeSet<usize> {
        match category {
            StatCategory::Blocked => &self.blocked,
            StatCategory::BeforeEngine => &self.before_engine,
            StatCategory::AllowedByTimer => &self.allowed_by_timer,
            StatCategory::OnlyMoveAllowed => &self.only_move_allowed,
            StatCategory::BookMove => &self.book_move,
        }
    }

    fn set_mut(&mut self, category: StatCategory) -> &mut BTreeSet<usize> {
        match category {
            StatCategory::Blocked => &mut self.blocked,
            StatCategory::BeforeEngine => &mut self.before_engine,
            StatCategory::AllowedByTimer => &mut self.allowed_by_timer,
            StatCategory::OnlyMoveAllowed => &mut self.only_move_allowed,
            StatCategory::BookMove => &mut self.book_move,
        }
    }

    pub fn category_of(&self, move_index: usize) -> Option<StatCategory> {
        [
            StatCategory::Blocked,
            StatCategory::BeforeEngine,
            StatCategory::AllowedByTimer,
            StatCategory::OnlyMoveAllowed,
            StatCategory::BookMove,
        ]
        .into_iter()
        .find(|c| self.set(*c).contains(&move_index))
    }

    /// Put `move_index` in `category`. Returns false when nothing changed,
    /// including when the index already belongs to any category.
    pub fn record(&mut self, move_index: usize, category: StatCategory) -> bool {
        if self.category_of(move_index).is_some() {
            return false;
        }
        self.set_mut(category).insert(move_index);
        if category == StatCategory::Blocked && !self.committed.contains(&move_index) {
            self.last_blocked = Some(move_index);
        }
        true
    }

    /// Count a controlled move that reached the board.
    pub fn record_committed(&mut self, move_index: usize) -> bool {
        if self.last_blocked == Some(move_index) {
            self.last_blocked = None;
        }
        self.committed.insert(move_index)
    }

    pub fn best_moves_found(&self) -> BTreeSet<usize> {
        self.blocked
            .iter()
            .chain(&self.before_engine)
            .chain(&self.allowed_by_timer)
            .chain(&self.only_move_allowed)
            .chain(&self.book_move)
            .copied()
            .collect()
    }

    pub fn summary(&self) -> StatsSummary {
        let best_moves_found = self.best_moves_found().len();
        let best_moves_made =
            self.before_engine.len() + self.allowed_by_timer.len() + self.only_move_allowed.len();

        // A block leaves the turn open; count it until a move replaces it
        let denominator = self.committed.len() + usize::from(self.last_blocked.is_some());

        StatsSummary {
            total_moves: self.committed.len(),
            best_moves_found,
            blocked: self.blocked.len(),
            before_engine: self.before_engine.len(),
            allowed_by_timer: self.allowed_by_timer.len(),
            only_move_allowed: self.only_move_allowed.len(),
            book_moves: self.book_move.len(),
            best_moves_made,
            best_moves_found_pct: percentage(best_moves_found, denominator),
            blocked_pct: percentage(self.blocked.len(), denominator),
            best_moves_made_pct: percentage(best_moves_made, denominator),
        }
    }
}

/// One decimal place, 0.0 for an empty denominator.
fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 1000.0).round() / 10.0
}
