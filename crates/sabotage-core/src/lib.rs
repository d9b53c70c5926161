//! Sabotage decision engine.
//!
//! Shadows a live game from externally observed moves, resolves the best move
//! for the controlled side through a book service and an engine service, and
//! decides whether an attempt to play that move should be let through.

pub use shakmaty;

pub mod engine;
pub mod error;
pub mod events;
pub mod policy;
pub mod resolver;
pub mod stats;
pub mod timer;
pub mod tracker;

pub use engine::{Effect, SabotageEngine};
pub use error::{ResolutionError, SettingsError, TrackerError};
pub use events::{InputEvent, OutputEvent, PlayerColor, Settings};
