//! Opening-book lookups against a Lichess-style explorer.

use std::time::Duration;

use reqwest::Client;
use sabotage_core::resolver::BookService;
use sabotage_core::ResolutionError;
use serde::Deserialize;

use crate::error::ServerError;

const SERVICE: &str = "book";

#[derive(Deserialize)]
struct ExplorerResponse {
    moves: Vec<ExplorerMove>,
}

#[derive(Deserialize)]
struct ExplorerMove {
    uci: String,
}

pub struct ExplorerClient {
    client: Client,
    base_url: String,
}

impl ExplorerClient {
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

    /// Known continuations for a position, as UCI moves.
    pub async fn fetch_moves(&self, fen: &str) -> Result<Vec<String>, ResolutionError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("fen", fen)])
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
        parse_explorer_body(&text)
    }
}

impl BookService for ExplorerClient {
    async fn continuations(&self, fen: &str) -> Result<Vec<String>, ResolutionError> {
        self.fetch_moves(fen).await
    }
}

pub(crate) fn request_error(service: &'static str, e: reqwest::Error) -> ResolutionError {
    if e.is_timeout() {
        ResolutionError::Timeout { service }
    } else {
        ResolutionError::Http {
            service,
            message: e.to_string(),
        }
    }
}

fn parse_explorer_body(text: &str) -> Result<Vec<String>, ResolutionError> {
    let body: ExplorerResponse =
        serde_json::from_str(text).map_err(|e| ResolutionError::Malformed {
            service: SERVICE,
            message: e.to_string(),
        })?;
    Ok(body.moves.into_iter().map(|m| m.uci).collect())
}
