//! Composition root: sequences tracker, resolver, timer, policy and stats per turn.
//!
//! The engine is synchronous. Every entry point takes the caller's `now` and
//! returns the [`Effect`]s it produced, in order. Network work is requested
//! through [`Effect::Resolve`]; the caller runs it and reports back through
//! [`SabotageEngine::on_resolution`].

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::error::TrackerError;
use crate::events::{InputEvent, OutputEvent, Phase, PlayerColor, Settings, TurnStatus};
use crate::policy::{self, uci_squares, Decision, MoveAttempt, Reason, Verdict};
use crate::resolver::{
    Acceptance, Recommendation, RecommendationKind, RecommendationResolver, ResolutionOutcome,
    ResolutionRequest,
};
use crate::stats::{StatCategory, StatsAggregator, StatsSummary};
use crate::timer::{TimerUpdate, TurnTimer};
use crate::tracker::{PositionTracker, Side};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Emit(OutputEvent),
    Resolve(ResolutionRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TurnRecommendation {
    Pending,
    Ready(Recommendation),
    Unavailable,
}

#[derive(Debug)]
struct Turn {
    index: usize,
    recommendation: TurnRecommendation,
    /// An attempt was let through before anything was resolved.
    attempted_unresolved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tracking {
    Active,
    Desynced,
    Ended,
}

pub struct SabotageEngine {
    tracker: PositionTracker,
    resolver: RecommendationResolver,
    timer: TurnTimer,
    stats: StatsAggregator,
    settings: Settings,
    turn: Option<Turn>,
    tracking: Tracking,
    end_status: Option<String>,
    started: bool,
}

impl SabotageEngine {
    pub fn new(side: PlayerColor, settings: Settings, engine_depth: u8) -> Self {
        Self {
            tracker: PositionTracker::new(side),
            resolver: RecommendationResolver::new(engine_depth),
            timer: TurnTimer::new(),
            stats: StatsAggregator::new(),
            settings,
            turn: None,
            tracking: Tracking::Active,
            end_status: None,
            started: false,
        }
    }

    /// Publish the initial state and open the first turn if it is ours.
    pub fn start(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.started {
            return effects;
        }
        self.started = true;

        if self.tracker.is_controlled_turn() {
            self.begin_turn(now, &mut effects);
        }
        effects.push(Effect::Emit(OutputEvent::TurnStatus(self.status())));
        effects.push(Effect::Emit(OutputEvent::StatsUpdate(self.stats.summary())));
        effects
    }

    pub fn handle(&mut self, event: InputEvent, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        match event {
            InputEvent::OpponentMove { notation } => {
                self.on_move(&notation, Side::Opponent, now, &mut effects)
            }
            InputEvent::ControlledMove { notation } => {
                self.on_move(&notation, Side::Controlled, now, &mut effects)
            }
            InputEvent::MoveAttempt { from, to } => match MoveAttempt::parse(&from, &to) {
                Some(attempt) => {
                    self.on_attempt(attempt, now, &mut effects);
                }
                None => {
                    warn!(%from, %to, "Unreadable move attempt");
                    self.emit_decision(Decision::allow(Reason::InvalidAttempt), &mut effects);
                }
            },
            InputEvent::SettingsApply {
                duration_seconds,
                muted,
            } => match Settings::new(duration_seconds, muted) {
                Ok(settings) => {
                    info!(duration_seconds, muted, "Settings applied");
                    self.settings = settings;
                    effects.push(Effect::Emit(OutputEvent::SettingsApplied(settings)));
                }
                Err(e) => {
                    warn!(error = %e, "Rejected settings");
                    effects.push(Effect::Emit(OutputEvent::SettingsApplied(self.settings)));
                }
            },
            InputEvent::GameEnded { result } => {
                info!(%result, "Game ended");
                self.stop(Tracking::Ended, Some(result));
                effects.push(Effect::Emit(OutputEvent::TurnStatus(self.status())));
            }
        }
        effects
    }

    /// Answer a move attempt. The caller suppresses the move on `Block`.
    pub fn attempt(&mut self, attempt: MoveAttempt, now: Instant) -> (Decision, Vec<Effect>) {
        let mut effects = Vec::new();
        let decision = self.on_attempt(attempt, now, &mut effects);
        (decision, effects)
    }

    /// Feed back the outcome of an [`Effect::Resolve`] request.
    pub fn on_resolution(
        &mut self,
        request: &ResolutionRequest,
        outcome: ResolutionOutcome,
        now: Instant,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.tracking != Tracking::Active {
            debug!(move_index = request.for_move_index, "Resolution after tracking stopped");
            return effects;
        }

        let current_index = self.tracker.next_index();
        match self.resolver.accept(request, outcome, current_index) {
            Acceptance::Current(rec) => {
                if let Some(turn) = self.turn.as_mut().filter(|t| t.index == rec.for_move_index) {
                    info!(
                        move_index = rec.for_move_index,
                        kind = ?rec.kind,
                        uci = rec.uci.as_deref().unwrap_or("-"),
                        "Recommendation ready"
                    );
                    turn.recommendation = TurnRecommendation::Ready(rec);
                    self.poll_timer(now, &mut effects);
                    effects.push(Effect::Emit(OutputEvent::TurnStatus(self.status())));
                }
            }
            Acceptance::Stale(rec) => self.credit_before_engine(&rec, &mut effects),
            Acceptance::Unavailable => {
                if let Some(turn) = self.turn.as_mut().filter(|t| t.index == request.for_move_index) {
                    turn.recommendation = TurnRecommendation::Unavailable;
                    effects.push(Effect::Emit(OutputEvent::TurnStatus(self.status())));
                }
            }
            Acceptance::Dropped => {}
        }
        effects
    }

    /// Advance the countdown.
    pub fn tick(&mut self, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.tracking == Tracking::Active && self.turn.is_some() {
            self.poll_timer(now, &mut effects);
        }
        effects
    }

    pub fn status(&self) -> TurnStatus {
        let engine_is_thinking = matches!(
            self.turn,
            Some(Turn {
                recommendation: TurnRecommendation::Pending,
                ..
            })
        );
        let phase = if self.tracking != Tracking::Active {
            Phase::Ended
        } else if self.turn.is_none() {
            Phase::Waiting
        } else if engine_is_thinking {
            Phase::Calculating
        } else if self.timer.is_armed() {
            Phase::Ready
        } else {
            Phase::Timer
        };

        TurnStatus {
            is_controlled_turn: self.tracking == Tracking::Active && self.turn.is_some(),
            engine_is_thinking,
            still_book_moves: self.resolver.in_book(),
            game_end_status: self.end_status.clone(),
            phase,
        }
    }

    pub fn stats(&self) -> StatsSummary {
        self.stats.summary()
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking == Tracking::Active
    }

    fn on_move(&mut self, notation: &str, side: Side, now: Instant, effects: &mut Vec<Effect>) {
        if self.tracking != Tracking::Active {
            debug!(notation, "Ignoring move, not tracking");
            return;
        }

        let record = match self.tracker.apply_as(notation, side) {
            Ok(record) => record.clone(),
            Err(e) => {
                self.desync(e, effects);
                return;
            }
        };
        debug!(
            move_index = record.index,
            notation = %record.notation,
            uci = %record.uci,
            "Move applied"
        );

        if record.side == Side::Controlled {
            let finished = self.turn.take();
            self.timer.cancel();
            self.resolver.cancel();
            if self.stats.record_committed(record.index) {
                effects.push(Effect::Emit(OutputEvent::StatsUpdate(self.stats.summary())));
            }

            // Resolved between the attempt and the commit
            if let Some(Turn {
                index,
                recommendation: TurnRecommendation::Ready(rec),
                attempted_unresolved: true,
            }) = finished
            {
                if index == record.index {
                    self.credit_before_engine(&rec, effects);
                }
            }
        }

        if self.tracker.is_controlled_turn() {
            if self.tracker.legal_move_count() > 0 {
                self.begin_turn(now, effects);
            } else {
                debug!("No legal moves, not opening a turn");
            }
        }
        effects.push(Effect::Emit(OutputEvent::TurnStatus(self.status())));
    }

    fn begin_turn(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        let index = self.tracker.next_index();
        let duration = Duration::from_secs(u64::from(self.settings.duration_seconds));
        self.timer.start(now, duration);

        let request = self.resolver.begin(index, self.tracker.fen());
        debug!(move_index = index, seq = request.seq, mode = ?request.mode, "Turn started");
        self.turn = Some(Turn {
            index,
            recommendation: TurnRecommendation::Pending,
            attempted_unresolved: false,
        });
        effects.push(Effect::Resolve(request));
        self.poll_timer(now, effects);
    }

    fn on_attempt(&mut self, attempt: MoveAttempt, now: Instant, effects: &mut Vec<Effect>) -> Decision {
        if self.tracking != Tracking::Active || self.turn.is_none() {
            let decision = Decision::allow(Reason::NotTracking);
            self.emit_decision(decision, effects);
            return decision;
        }

        self.poll_timer(now, effects);

        let Some(turn) = self.turn.as_ref() else {
            return Decision::allow(Reason::NotTracking);
        };
        let recommendation = match &turn.recommendation {
            TurnRecommendation::Ready(rec) => Some(rec),
            TurnRecommendation::Pending | TurnRecommendation::Unavailable => None,
        };
        let decision = policy::decide(
            &attempt,
            recommendation,
            self.timer.is_armed(),
            self.tracker.legal_move_count(),
        );
        let index = turn.index;
        if decision.reason == Reason::Unresolved {
            if let Some(turn) = self.turn.as_mut() {
                turn.attempted_unresolved = true;
            }
        }

        if decision.verdict == Verdict::Block {
            info!(move_index = index, from = %attempt.from, to = %attempt.to, "Blocked best move");
        } else {
            debug!(move_index = index, reason = ?decision.reason, "Move allowed");
        }

        if let Some(category) = StatCategory::from_reason(decision.reason) {
            if self.stats.record(index, category) {
                effects.push(Effect::Emit(OutputEvent::StatsUpdate(self.stats.summary())));
            }
        }
        self.emit_decision(decision, effects);
        decision
    }

    fn emit_decision(&self, decision: Decision, effects: &mut Vec<Effect>) {
        let allowed = decision.is_allowed();
        effects.push(Effect::Emit(OutputEvent::BlockDecision {
            allowed,
            reason: decision.reason,
            sound: !allowed && !self.settings.muted,
        }));
    }

    /// An engine answer that matches a move played before it was known counts
    /// as found before the engine.
    fn credit_before_engine(&mut self, rec: &Recommendation, effects: &mut Vec<Effect>) {
        if rec.kind != RecommendationKind::Engine {
            return;
        }
        let Some(recommended) = rec.uci.as_deref().and_then(uci_squares) else {
            return;
        };
        let Some(record) = self.tracker.record(rec.for_move_index) else {
            return;
        };
        if record.side != Side::Controlled || uci_squares(&record.uci) != Some(recommended) {
            return;
        }

        if self.stats.record(record.index, StatCategory::BeforeEngine) {
            info!(move_index = record.index, "Best move found before engine");
            effects.push(Effect::Emit(OutputEvent::StatsUpdate(self.stats.summary())));
        }
    }

    fn poll_timer(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        match self.timer.poll(now) {
            Some(TimerUpdate::Tick(seconds_remaining)) => {
                effects.push(Effect::Emit(OutputEvent::TimerTick { seconds_remaining }));
            }
            Some(TimerUpdate::Armed) => {
                debug!("Interception armed");
                effects.push(Effect::Emit(OutputEvent::TimerArmed));
                effects.push(Effect::Emit(OutputEvent::TurnStatus(self.status())));
            }
            None => {}
        }
    }

    fn desync(&mut self, e: TrackerError, effects: &mut Vec<Effect>) {
        error!(error = %e, "Lost track of the game");
        self.stop(Tracking::Desynced, Some("Tracking lost".to_string()));
        effects.push(Effect::Emit(OutputEvent::TrackingLost {
            message: e.to_string(),
        }));
        effects.push(Effect::Emit(OutputEvent::TurnStatus(self.status())));
    }

    fn stop(&mut self, tracking: Tracking, end_status: Option<String>) {
        self.tracking = tracking;
        self.end_status = end_status;
        self.turn = None;
        self.timer.cancel();
        self.resolver.cancel();
    }
}
