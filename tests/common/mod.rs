#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sabotage_core::resolver::{self, BookService, EngineService, ResolutionRequest};
use sabotage_core::{Effect, InputEvent, OutputEvent, PlayerColor, ResolutionError, SabotageEngine, Settings};

/// Book whose answer depends only on how many plies were played.
pub struct ScriptedBook {
    in_book: Box<dyn Fn(usize) -> bool + Send + Sync>,
    calls: AtomicUsize,
}

impl ScriptedBook {
    /// In book for the first `book_plies` positions.
    pub fn new(book_plies: usize) -> Self {
        Self::with(move |ply| ply < book_plies)
    }

    pub fn with(in_book: impl Fn(usize) -> bool + Send + Sync + 'static) -> Self {
        Self {
            in_book: Box::new(in_book),
            calls: AtomicUsize::new(0),
        }
    }

    /// A book that knows every position.
    pub fn endless() -> Self {
        Self::with(|_| true)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BookService for ScriptedBook {
    async fn continuations(&self, fen: &str) -> Result<Vec<String>, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if (self.in_book)(fullmove_plies(fen)) {
            Ok(vec!["e2e4".to_string(), "d2d4".to_string()])
        } else {
            Ok(Vec::new())
        }
    }
}

/// Plies played before the position described by `fen`.
fn fullmove_plies(fen: &str) -> usize {
    let fields: Vec<&str> = fen.split_whitespace().collect();
    let fullmove: usize = fields.get(5).and_then(|f| f.parse().ok()).unwrap_or(1);
    let black_to_move = fields.get(1) == Some(&"b");
    (fullmove - 1) * 2 + usize::from(black_to_move)
}

/// Engine answering from a table keyed by FEN board field, or failing with HTTP 502.
pub struct ScriptedEngine {
    answers: Mutex<HashMap<String, String>>,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            answers: Mutex::new(HashMap::new()),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Answer `uci` for positions whose FEN board field equals `board`.
    pub fn answer(self, board: &str, uci: &str) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(board.to_string(), uci.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EngineService for ScriptedEngine {
    async fn best_move(&self, fen: &str, _depth: u8) -> Result<Option<String>, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ResolutionError::Status {
                service: "engine",
                status: 502,
            });
        }
        let board = fen.split_whitespace().next().unwrap_or_default();
        Ok(self.answers.lock().unwrap().get(board).cloned())
    }
}

/// Drives an engine on a manual clock, resolving requests through the
/// scripted services either immediately or on demand.
pub struct Harness {
    pub engine: SabotageEngine,
    pub book: ScriptedBook,
    pub service: ScriptedEngine,
    pub t0: Instant,
    pub elapsed: Duration,
    /// Requests held back while `defer` is set.
    pub pending: Vec<ResolutionRequest>,
    pub defer: bool,
    pub events: Vec<OutputEvent>,
}

impl Harness {
    pub fn new(side: PlayerColor, settings: Settings, book: ScriptedBook, service: ScriptedEngine) -> Self {
        Self {
            engine: SabotageEngine::new(side, settings, 12),
            book,
            service,
            t0: Instant::now(),
            elapsed: Duration::ZERO,
            pending: Vec::new(),
            defer: false,
            events: Vec::new(),
        }
    }

    pub fn now(&self) -> Instant {
        self.t0 + self.elapsed
    }

    pub fn advance(&mut self, secs: u64) {
        self.elapsed += Duration::from_secs(secs);
        let effects = self.engine.tick(self.now());
        self.collect(effects);
    }

    pub async fn start(&mut self) {
        let effects = self.engine.start(self.now());
        self.run(effects).await;
    }

    pub async fn send(&mut self, event: InputEvent) {
        let effects = self.engine.handle(event, self.now());
        self.run(effects).await;
    }

    pub async fn opponent(&mut self, notation: &str) {
        self.send(InputEvent::OpponentMove {
            notation: notation.to_string(),
        })
        .await;
    }

    pub async fn controlled(&mut self, notation: &str) {
        self.send(InputEvent::ControlledMove {
            notation: notation.to_string(),
        })
        .await;
    }

    /// Send a move attempt and return the emitted `block-decision`.
    pub async fn attempt(&mut self, from: &str, to: &str) -> OutputEvent {
        self.send(InputEvent::MoveAttempt {
            from: from.to_string(),
            to: to.to_string(),
        })
        .await;
        self.events
            .iter()
            .rev()
            .find(|e| matches!(e, OutputEvent::BlockDecision { .. }))
            .cloned()
            .expect("no block decision emitted")
    }

    /// Complete a held-back request.
    pub async fn resolve(&mut self, request: ResolutionRequest) {
        let outcome = resolver::fetch(&self.book, &self.service, &request).await;
        let effects = self.engine.on_resolution(&request, outcome, self.now());
        self.collect(effects);
    }

    pub fn take_pending(&mut self) -> ResolutionRequest {
        self.pending.remove(0)
    }

    async fn run(&mut self, effects: Vec<Effect>) {
        let mut requests = Vec::new();
        for effect in effects {
            match effect {
                Effect::Emit(event) => self.events.push(event),
                Effect::Resolve(request) => requests.push(request),
            }
        }
        for request in requests {
            if self.defer {
                self.pending.push(request);
            } else {
                self.resolve(request).await;
            }
        }
    }

    fn collect(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Emit(event) => self.events.push(event),
                Effect::Resolve(request) => self.pending.push(request),
            }
        }
    }
}

/// Shorthand for a `block-decision` event.
pub fn decision(allowed: bool, reason: sabotage_core::policy::Reason, sound: bool) -> OutputEvent {
    OutputEvent::BlockDecision {
        allowed,
        reason,
        sound,
    }
}
