//! Depth-limited engine search over HTTP.
//!
//! The service answers with the engine's raw `bestmove` line, e.g.
//! `"bestmove e2e4 ponder e7e5"`.

use std::time::Duration;

use reqwest::Client;
use sabotage_core::resolver::EngineService;
use sabotage_core::ResolutionError;
use serde::Deserialize;

use crate::clients::explorer::request_error;
use crate::error::ServerError;

const SERVICE: &str = "engine";

#[derive(Deserialize)]
struct EngineResponse {
    success: bool,
    bestmove: Option<String>,
    data: Option<String>,
}

pub struct StockfishOnlineClient {
    client: Client,
    base_url: String,
}

impl StockfishOnlineClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServerError> {
        let client = Client::builder()
            .user_agent("Sabotage/1.0")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    pub async fn search(&self, fen: &str, depth: u8) -> Result<Option<String>, ResolutionError> {
        let depth = depth.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("fen", fen), ("depth", depth.as_str())])
            .send()
            .await
            .map_err(|e| request_error(SERVICE, e))?;

        if !resp.status().is_success() {
            return Err(ResolutionError::Status {
                service: SERVICE,
                status: resp.status().as_u16(),
            });
        }

        let text = resp.text().await.map_err(|e| request_error(SERVICE, e))?;
        parse_engine_body(&text)
    }
}

impl EngineService for StockfishOnlineClient {
    async fn best_move(&self, fen: &str, depth: u8) -> Result<Option<String>, ResolutionError> {
        self.search(fen, depth).await
    }
}

fn malformed(message: impl Into<String>) -> ResolutionError {
    ResolutionError::Malformed {
        service: SERVICE,
        message: message.into(),
    }
}

fn parse_engine_body(text: &str) -> Result<Option<String>, ResolutionError> {
    let body: EngineResponse = serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;

    if !body.success {
        return Err(malformed(
            body.data.unwrap_or_else(|| "request unsuccessful".to_string()),
        ));
    }

    let line = body.bestmove.ok_or_else(|| malformed("missing bestmove"))?;
    parse_bestmove(&line).ok_or_else(|| malformed(format!("unreadable bestmove '{line}'")))
}

/// Extract the move from a `bestmove` line. `Some(None)` when the engine has no move.
fn parse_bestmove(line: &str) -> Option<Option<String>> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "bestmove" {
        return None;
    }
    match parts.next()? {
        "(none)" => Some(None),
        mv if (4..=5).contains(&mv.len()) => Some(Some(mv.to_string())),
        _ => None,
    }
}
