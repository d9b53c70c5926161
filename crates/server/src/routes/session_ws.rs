//! WebSocket endpoint for the in-page collaborator.
//!
//! The client opens with a `start` message naming the side it plays, then
//! streams boundary events. Every output event of the session is forwarded
//! back as one JSON text frame.

use anyhow::Result;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use sabotage_core::{InputEvent, PlayerColor, SabotageEngine, Settings};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clients::Services;
use crate::config::Config;
use crate::session::{spawn_session, SessionHandle};

/// Control messages outside the boundary event set.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ClientMessage {
    Start {
        side: PlayerColor,
        duration_seconds: Option<u32>,
        muted: Option<bool>,
    },
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum ServerMessage {
    Error { message: String },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(config): Extension<Config>,
    Extension(services): Extension<Services>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, config, services))
}

async fn handle_socket(socket: WebSocket, config: Config, services: Services) {
    let (mut sender, mut receiver) = socket.split();

    let engine = match await_start(&mut sender, &mut receiver, &config).await {
        Ok(Some(engine)) => engine,
        Ok(None) => return,
        Err(e) => {
            warn!(error = %e, "Session handshake failed");
            return;
        }
    };

    let handle = spawn_session(
        engine,
        services.book,
        services.engine,
        config.event_queue_capacity,
    );
    if let Err(e) = forward(&mut sender, &mut receiver, handle).await {
        warn!(error = %e, "Session connection failed");
    }
}

/// Read messages until a valid `start` arrives. `None` when the socket closes first.
async fn await_start(
    sender: &mut SplitSink<WebSocket, Message>,
    receiver: &mut SplitStream<WebSocket>,
    config: &Config,
) -> Result<Option<SabotageEngine>> {
    while let Some(msg) = receiver.next().await {
        let text = match msg? {
            Message::Text(t) => t.to_string(),
            Message::Close(_) => return Ok(None),
            _ => continue,
        };

        let ClientMessage::Start {
            side,
            duration_seconds,
            muted,
        } = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                send_error(sender, format!("Expected start message: {e}")).await?;
                continue;
            }
        };

        let settings = match Settings::new(
            duration_seconds.unwrap_or(config.settings.duration_seconds),
            muted.unwrap_or(config.settings.muted),
        ) {
            Ok(s) => s,
            Err(e) => {
                send_error(sender, e.to_string()).await?;
                continue;
            }
        };

        info!(?side, duration_seconds = settings.duration_seconds, "Session started");
        return Ok(Some(SabotageEngine::new(side, settings, config.engine_depth)));
    }
    Ok(None)
}

async fn forward(
    sender: &mut SplitSink<WebSocket, Message>,
    receiver: &mut SplitStream<WebSocket>,
    mut handle: SessionHandle,
) -> Result<()> {
    loop {
        tokio::select! {
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(t))) => t.to_string(),
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                };
                match serde_json::from_str::<InputEvent>(&text) {
                    Ok(event) => {
                        if handle.events.send(event).await.is_err() {
                            return Ok(());
                        }
                    }
                    Err(e) => send_error(sender, format!("Invalid message: {e}")).await?,
                }
            }
            event = handle.output.recv() => {
                let Some(event) = event else {
                    return Ok(());
                };
                let json = serde_json::to_string(&event)?;
                sender.send(Message::Text(json.into())).await?;
            }
        }
    }
}

async fn send_error(sender: &mut SplitSink<WebSocket, Message>, message: String) -> Result<()> {
    let json = serde_json::to_string(&ServerMessage::Error { message })?;
    sender.send(Message::Text(json.into())).await?;
    Ok(())
}
