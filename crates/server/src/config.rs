use std::env;
use std::time::Duration;

use sabotage_core::events::Settings;
use sabotage_core::resolver::{DEFAULT_ENGINE_DEPTH, MAX_ENGINE_DEPTH};

use crate::error::ServerError;

pub const DEFAULT_BOOK_URL: &str = "https://explorer.lichess.ovh/masters";
pub const DEFAULT_ENGINE_URL: &str = "https://stockfish.online/api/s/v2.php";

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Opening-book lookup endpoint, queried with `?fen=`
    pub book_url: String,
    /// Engine-search endpoint, queried with `?fen=&depth=`
    pub engine_url: String,
    pub engine_depth: u8,
    pub request_timeout: Duration,
    /// Defaults for new sessions until the page applies its own
    pub settings: Settings,
    /// Bound of each session's input queue
    pub event_queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ServerError> {
        let duration_seconds = env::var("TURN_DURATION_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Settings::default().duration_seconds);
        let muted = env::var("MUTED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let settings = Settings::new(duration_seconds, muted)
            .map_err(|e| ServerError::Config(e.to_string()))?;

        let engine_depth = env::var("ENGINE_DEPTH")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
            .unwrap_or(DEFAULT_ENGINE_DEPTH)
            .clamp(1, MAX_ENGINE_DEPTH);

        let event_queue_capacity = env::var("EVENT_QUEUE_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(64);

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            book_url: env::var("BOOK_URL").unwrap_or_else(|_| DEFAULT_BOOK_URL.to_string()),
            engine_url: env::var("ENGINE_URL").unwrap_or_else(|_| DEFAULT_ENGINE_URL.to_string()),
            engine_depth,
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),
            settings,
            event_queue_capacity,
        })
    }
}
