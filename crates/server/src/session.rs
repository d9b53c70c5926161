//! Per-connection event loop around a [`SabotageEngine`].
//!
//! One task owns the engine. Input events arrive on a bounded queue and are
//! handled one at a time; resolution requests run as spawned tasks and come
//! back on an internal channel; a ticker drives the countdown.

use std::sync::Arc;
use std::time::Duration;

use sabotage_core::engine::Effect;
use sabotage_core::resolver::{self, BookService, EngineService, ResolutionOutcome, ResolutionRequest};
use sabotage_core::{InputEvent, OutputEvent, SabotageEngine};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

const TICK_INTERVAL: Duration = Duration::from_millis(250);

pub struct SessionHandle {
    pub events: mpsc::Sender<InputEvent>,
    pub output: mpsc::UnboundedReceiver<OutputEvent>,
}

/// Start the loop for `engine`. It runs until `events` is dropped or the
/// output receiver goes away.
pub fn spawn_session<B, E>(
    engine: SabotageEngine,
    book: Arc<B>,
    engine_service: Arc<E>,
    capacity: usize,
) -> SessionHandle
where
    B: BookService + Send + Sync + 'static,
    E: EngineService + Send + Sync + 'static,
{
    let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
    let (output_tx, output_rx) = mpsc::unbounded_channel();
    tokio::spawn(run(engine, book, engine_service, events_rx, output_tx));
    SessionHandle {
        events: events_tx,
        output: output_rx,
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

async fn run<B, E>(
    mut engine: SabotageEngine,
    book: Arc<B>,
    engine_service: Arc<E>,
    mut inbox: mpsc::Receiver<InputEvent>,
    output: mpsc::UnboundedSender<OutputEvent>,
) where
    B: BookService + Send + Sync + 'static,
    E: EngineService + Send + Sync + 'static,
{
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<(ResolutionRequest, ResolutionOutcome)>();
    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let effects = engine.start(now());
    if !dispatch(effects, &book, &engine_service, &done_tx, &output) {
        return;
    }

    loop {
        let effects = tokio::select! {
            event = inbox.recv() => match event {
                Some(event) => engine.handle(event, now()),
                None => break,
            },
            Some((request, outcome)) = done_rx.recv() => {
                engine.on_resolution(&request, outcome, now())
            }
            _ = ticker.tick() => engine.tick(now()),
        };

        if !dispatch(effects, &book, &engine_service, &done_tx, &output) {
            break;
        }
    }

    info!(
        moves = engine.tracker().history().len(),
        tracking = engine.is_tracking(),
        "Session closed"
    );
}

/// Deliver emitted events and launch requested resolutions. False once the
/// output side has gone away.
fn dispatch<B, E>(
    effects: Vec<Effect>,
    book: &Arc<B>,
    engine_service: &Arc<E>,
    done: &mpsc::UnboundedSender<(ResolutionRequest, ResolutionOutcome)>,
    output: &mpsc::UnboundedSender<OutputEvent>,
) -> bool
where
    B: BookService + Send + Sync + 'static,
    E: EngineService + Send + Sync + 'static,
{
    for effect in effects {
        match effect {
            Effect::Emit(event) => {
                if output.send(event).is_err() {
                    return false;
                }
            }
            Effect::Resolve(request) => {
                debug!(move_index = request.for_move_index, seq = request.seq, "Resolving");
                let book = Arc::clone(book);
                let engine_service = Arc::clone(engine_service);
                let done = done.clone();
                tokio::spawn(async move {
                    let outcome = resolver::fetch(&*book, &*engine_service, &request).await;
                    // Receiver is gone only when the session has ended
                    let _ = done.send((request, outcome));
                });
            }
        }
    }
    true
}
