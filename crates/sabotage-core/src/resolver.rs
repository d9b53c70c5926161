//! Best-move resolution: opening book first, engine search once out of book.
//!
//! Resolution is split in two so the engine stays synchronous. `begin` hands
//! out a [`ResolutionRequest`] tagged with the move index and a sequence
//! number; the caller runs [`fetch`] wherever it likes and brings the
//! [`ResolutionOutcome`] back to `accept`, which decides at arrival time
//! whether the result still applies.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ResolutionError;

/// Deepest search the engine service accepts.
pub const MAX_ENGINE_DEPTH: u8 = 15;

pub const DEFAULT_ENGINE_DEPTH: u8 = 12;

/// Book status for the game. Leaving the book is permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookMode {
    InBook,
    EngineMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Book,
    Engine,
}

/// The resolved best move for one controlled turn.
///
/// Book recommendations carry no move: being in book is the whole signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub for_move_index: usize,
    pub kind: RecommendationKind,
    pub uci: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub for_move_index: usize,
    pub seq: u64,
    pub fen: String,
    pub mode: BookMode,
    pub depth: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionOutcome {
    /// The book returned no continuations during this resolution.
    pub left_book: bool,
    pub result: Result<Recommendation, ResolutionError>,
}

/// What `accept` made of an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acceptance {
    /// Applies to the turn in progress.
    Current(Recommendation),
    /// Arrived after its turn ended. Only useful for after-the-fact stats.
    Stale(Recommendation),
    /// The current turn gets no recommendation.
    Unavailable,
    /// Nothing to do.
    Dropped,
}

/// Opening-book lookup keyed by position.
pub trait BookService {
    /// Known continuations for `fen`, as UCI strings. Empty means out of book.
    fn continuations(
        &self,
        fen: &str,
    ) -> impl Future<Output = Result<Vec<String>, ResolutionError>> + Send;
}

/// Depth-limited engine search keyed by position.
pub trait EngineService {
    /// Best move for `fen` in coordinate notation, `None` if the engine has none.
    fn best_move(
        &self,
        fen: &str,
        depth: u8,
    ) -> impl Future<Output = Result<Option<String>, ResolutionError>> + Send;
}

pub struct RecommendationResolver {
    mode: BookMode,
    depth: u8,
    next_seq: u64,
    in_flight: Option<u64>,
}

impl RecommendationResolver {
    pub fn new(depth: u8) -> Self {
        Self {
            mode: BookMode::InBook,
            depth: depth.clamp(1, MAX_ENGINE_DEPTH),
            next_seq: 0,
            in_flight: None,
        }
    }

    pub fn mode(&self) -> BookMode {
        self.mode
    }

    pub fn in_book(&self) -> bool {
        self.mode == BookMode::InBook
    }

    pub fn is_resolving(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start a resolution for `for_move_index`, superseding any in flight.
    pub fn begin(&mut self, for_move_index: usize, fen: String) -> ResolutionRequest {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight = Some(seq);
        ResolutionRequest {
            for_move_index,
            seq,
            fen,
            mode: self.mode,
            depth: self.depth,
        }
    }

    /// Forget the in-flight request; its outcome will arrive stale.
    pub fn cancel(&mut self) {
        self.in_flight = None;
    }

    /// Decide what an arriving outcome means, given the tracker's current
    /// move index at arrival time.
    pub fn accept(
        &mut self,
        request: &ResolutionRequest,
        outcome: ResolutionOutcome,
        current_index: usize,
    ) -> Acceptance {
        if outcome.left_book && self.mode == BookMode::InBook {
            debug!(move_index = request.for_move_index, "Out of book");
            self.mode = BookMode::EngineMode;
        }

        let is_current =
            self.in_flight == Some(request.seq) && request.for_move_index == current_index;
        if is_current {
            self.in_flight = None;
        }

        match outcome.result {
            Ok(rec) if rec.kind == RecommendationKind::Book && self.mode == BookMode::EngineMode => {
                debug!(
                    move_index = request.for_move_index,
                    "Ignoring book result after leaving book"
                );
                if is_current {
                    Acceptance::Unavailable
                } else {
                    Acceptance::Dropped
                }
            }
            Ok(rec) if is_current => Acceptance::Current(rec),
            Ok(rec) => {
                debug!(
                    move_index = request.for_move_index,
                    seq = request.seq,
                    current_index,
                    "Discarding stale resolution"
                );
                Acceptance::Stale(rec)
            }
            Err(e) if is_current => {
                warn!(move_index = request.for_move_index, error = %e, "Resolution failed");
                Acceptance::Unavailable
            }
            Err(e) => {
                debug!(move_index = request.for_move_index, error = %e, "Stale resolution failed");
                Acceptance::Dropped
            }
        }
    }
}

/// Run the two-stage lookup for `request`.
///
/// Service failures never escape: they come back inside the outcome.
pub async fn fetch<B, E>(book: &B, engine: &E, request: &ResolutionRequest) -> ResolutionOutcome
where
    B: BookService,
    E: EngineService,
{
    if request.mode == BookMode::InBook {
        match book.continuations(&request.fen).await {
            Ok(moves) if !moves.is_empty() => {
                return ResolutionOutcome {
                    left_book: false,
                    result: Ok(Recommendation {
                        for_move_index: request.for_move_index,
                        kind: RecommendationKind::Book,
                        uci: None,
                        resolved_at: Utc::now(),
                    }),
                };
            }
            Ok(_) => {
                let result = search(engine, request).await;
                return ResolutionOutcome {
                    left_book: true,
                    result,
                };
            }
            Err(e) => {
                return ResolutionOutcome {
                    left_book: false,
                    result: Err(e),
                };
            }
        }
    }

    ResolutionOutcome {
        left_book: false,
        result: search(engine, request).await,
    }
}

async fn search<E>(engine: &E, request: &ResolutionRequest) -> Result<Recommendation, ResolutionError>
where
    E: EngineService,
{
    let uci = engine.best_move(&request.fen, request.depth).await?;
    Ok(Recommendation {
        for_move_index: request.for_move_index,
        kind: RecommendationKind::Engine,
        uci,
        resolved_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedBook {
        moves: Vec<String>,
        calls: AtomicUsize,
    }

    impl FixedBook {
        fn new(moves: &[&str]) -> Self {
            Self {
                moves: moves.iter().map(|m| m.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl BookService for FixedBook {
        async fn continuations(&self, _fen: &str) -> Result<Vec<String>, ResolutionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.moves.clone())
        }
    }

    struct FixedEngine(Result<Option<String>, ResolutionError>);

    impl EngineService for FixedEngine {
        async fn best_move(&self, _fen: &str, _depth: u8) -> Result<Option<String>, ResolutionError> {
            self.0.clone()
        }
    }

    fn engine_ok(uci: &str) -> FixedEngine {
        FixedEngine(Ok(Some(uci.to_string())))
    }

    #[tokio::test]
    async fn test_book_hit_skips_engine() {
        let book = FixedBook::new(&["e2e4", "d2d4"]);
        let engine = FixedEngine(Err(ResolutionError::Timeout { service: "engine" }));
        let mut resolver = RecommendationResolver::new(12);

        let req = resolver.begin(0, "fen".into());
        let outcome = fetch(&book, &engine, &req).await;
        assert!(!outcome.left_book);

        match resolver.accept(&req, outcome, 0) {
            Acceptance::Current(rec) => {
                assert_eq!(rec.kind, RecommendationKind::Book);
                assert_eq!(rec.uci, None);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(resolver.in_book());
    }

    #[tokio::test]
    async fn test_empty_book_latches_engine_mode() {
        let empty = FixedBook::new(&[]);
        let engine = engine_ok("g1f3");
        let mut resolver = RecommendationResolver::new(12);

        let req = resolver.begin(6, "fen".into());
        let outcome = fetch(&empty, &engine, &req).await;
        assert!(outcome.left_book);
        let acc = resolver.accept(&req, outcome, 6);
        assert!(matches!(acc, Acceptance::Current(ref r) if r.uci.as_deref() == Some("g1f3")));
        assert_eq!(resolver.mode(), BookMode::EngineMode);

        // A later position that the book would know still goes to the engine
        let full = FixedBook::new(&["e2e4"]);
        let req = resolver.begin(8, "fen".into());
        assert_eq!(req.mode, BookMode::EngineMode);
        let outcome = fetch(&full, &engine, &req).await;
        assert_eq!(full.calls.load(Ordering::SeqCst), 0);
        let acc = resolver.accept(&req, outcome, 8);
        assert!(matches!(acc, Acceptance::Current(ref r) if r.kind == RecommendationKind::Engine));
    }

    #[tokio::test]
    async fn test_book_result_after_latch_is_not_accepted() {
        let mut resolver = RecommendationResolver::new(12);
        let early = resolver.begin(2, "fen".into());
        let late = resolver.begin(4, "fen".into());

        // The earlier request left the book; it is stale but the latch holds
        let acc = resolver.accept(
            &early,
            ResolutionOutcome {
                left_book: true,
                result: Ok(Recommendation {
                    for_move_index: 2,
                    kind: RecommendationKind::Engine,
                    uci: Some("e2e4".into()),
                    resolved_at: Utc::now(),
                }),
            },
            4,
        );
        assert!(matches!(acc, Acceptance::Stale(_)));
        assert_eq!(resolver.mode(), BookMode::EngineMode);

        let acc = resolver.accept(
            &late,
            ResolutionOutcome {
                left_book: false,
                result: Ok(Recommendation {
                    for_move_index: 4,
                    kind: RecommendationKind::Book,
                    uci: None,
                    resolved_at: Utc::now(),
                }),
            },
            4,
        );
        assert_eq!(acc, Acceptance::Unavailable);
    }

    #[tokio::test]
    async fn test_out_of_order_results_last_started_wins() {
        let book = FixedBook::new(&[]);
        let mut resolver = RecommendationResolver::new(12);

        let a = resolver.begin(3, "fen-a".into());
        let b = resolver.begin(4, "fen-b".into());

        let out_b = fetch(&book, &engine_ok("d2d4"), &b).await;
        let out_a = fetch(&book, &engine_ok("e2e4"), &a).await;

        let acc_b = resolver.accept(&b, out_b, 4);
        assert!(matches!(acc_b, Acceptance::Current(ref r) if r.uci.as_deref() == Some("d2d4")));

        let acc_a = resolver.accept(&a, out_a, 4);
        assert!(matches!(acc_a, Acceptance::Stale(ref r) if r.for_move_index == 3));
    }

    #[tokio::test]
    async fn test_superseded_request_is_stale_even_at_same_index() {
        let book = FixedBook::new(&["e2e4"]);
        let engine = engine_ok("e2e4");
        let mut resolver = RecommendationResolver::new(12);

        let first = resolver.begin(0, "fen".into());
        let second = resolver.begin(0, "fen".into());
        let out = fetch(&book, &engine, &first).await;
        assert!(matches!(resolver.accept(&first, out, 0), Acceptance::Stale(_)));
        let out = fetch(&book, &engine, &second).await;
        assert!(matches!(resolver.accept(&second, out, 0), Acceptance::Current(_)));
        assert!(!resolver.is_resolving());
    }

    #[tokio::test]
    async fn test_failure_degrades_to_unavailable() {
        let book = FixedBook::new(&[]);
        let engine = FixedEngine(Err(ResolutionError::Status {
            service: "engine",
            status: 500,
        }));
        let mut resolver = RecommendationResolver::new(12);

        let req = resolver.begin(0, "fen".into());
        let outcome = fetch(&book, &engine, &req).await;
        assert!(outcome.left_book);
        assert!(outcome.result.is_err());
        assert_eq!(resolver.accept(&req, outcome, 0), Acceptance::Unavailable);

        let req = resolver.begin(2, "fen".into());
        let outcome = fetch(&book, &engine, &req).await;
        assert_eq!(resolver.accept(&req, outcome, 4), Acceptance::Dropped);
    }

    #[test]
    fn test_depth_clamped() {
        let mut resolver = RecommendationResolver::new(40);
        assert_eq!(resolver.begin(0, String::new()).depth, MAX_ENGINE_DEPTH);
        let mut resolver = RecommendationResolver::new(0);
        assert_eq!(resolver.begin(0, String::new()).depth, 1);
    }
}
