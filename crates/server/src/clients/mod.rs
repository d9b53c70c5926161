pub mod explorer;
pub mod stockfish_online;

use std::sync::Arc;

use crate::config::Config;
use crate::error::ServerError;

use explorer::ExplorerClient;
use stockfish_online::StockfishOnlineClient;

/// Shared HTTP clients, one pair per process.
#[derive(Clone)]
pub struct Services {
    pub book: Arc<ExplorerClient>,
    pub engine: Arc<StockfishOnlineClient>,
}

impl Services {
    pub fn from_config(config: &Config) -> Result<Self, ServerError> {
        Ok(Self {
            book: Arc::new(ExplorerClient::new(&config.book_url, config.request_timeout)?),
            engine: Arc::new(StockfishOnlineClient::new(
                &config.engine_url,
                config.request_timeout,
            )?),
        })
    }
}
