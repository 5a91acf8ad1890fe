//! WebSocket endpoint: a client opens one connection and subscribes to any
//! number of job ids, receiving `ServerEvent`s relayed through
//! `FanoutRegistry` as they're published by the worker pool (spec component
//! N, client half).

use crate::fanout::{FanoutRegistry, SUBSCRIBER_CHANNEL_CAPACITY};
use crate::state::SharedState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use clipforge_core::job::JobId;
use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    SubscribeJob { job_id: String },
    UnsubscribeJob { job_id: String },
    CancelJob { job_id: String },
    Ping,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Connected { client_id: String },
    Subscribed { job_id: String },
    Unsubscribed { job_id: String },
    Pong,
    Error { message: String },
}

pub async fn handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    ws.on_upgrade(move |socket| run(socket, state))
}

async fn run(socket: WebSocket, state: SharedState) {
    let client_id = Uuid::new_v4();
    let (mut outgoing, mut incoming) = socket.split();
    let (event_tx, mut event_rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
    let mut subscribed: HashSet<JobId> = HashSet::new();

    if send(&mut outgoing, &ServerMessage::Connected { client_id: client_id.to_string() })
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                if send(&mut outgoing, &event).await.is_err() {
                    break;
                }
            }
            message = incoming.next() => {
                let Some(message) = message else { break };
                match message {
                    Ok(Message::Text(text)) => {
                        if !handle_client_message(
                            &text,
                            &state,
                            &state.fanout,
                            client_id,
                            &event_tx,
                            &mut subscribed,
                            &mut outgoing,
                        )
                        .await
                        {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(%err, "websocket receive error");
                        break;
                    }
                }
            }
        }
    }

    for job_id in subscribed {
        state.fanout.unsubscribe(job_id, client_id).await;
    }
}

/// Returns `false` when the connection should be torn down (a send failure),
/// `true` otherwise — including when the client sent malformed JSON, which
/// only produces an `Error` reply and keeps the connection open.
#[allow(clippy::too_many_arguments)]
async fn handle_client_message(
    text: &str,
    state: &SharedState,
    fanout: &FanoutRegistry,
    client_id: Uuid,
    event_tx: &mpsc::Sender<crate::fanout::ServerEvent>,
    subscribed: &mut HashSet<JobId>,
    outgoing: &mut (impl Sink<Message, Error = axum::Error> + Unpin),
) -> bool {
    let parsed: Result<ClientMessage, _> = serde_json::from_str(text);
    let client_message = match parsed {
        Ok(message) => message,
        Err(err) => {
            return send(
                outgoing,
                &ServerMessage::Error {
                    message: format!("invalid message: {err}"),
                },
            )
            .await
            .is_ok();
        }
    };

    match client_message {
        ClientMessage::Ping => send(outgoing, &ServerMessage::Pong).await.is_ok(),
        ClientMessage::SubscribeJob { job_id } => match job_id.parse::<JobId>() {
            Ok(id) => {
                fanout.subscribe(id, client_id, event_tx.clone()).await;
                subscribed.insert(id);
                send(outgoing, &ServerMessage::Subscribed { job_id: id.to_string() })
                    .await
                    .is_ok()
            }
            Err(_) => send(
                outgoing,
                &ServerMessage::Error {
                    message: format!("invalid job id: {job_id}"),
                },
            )
            .await
            .is_ok(),
        },
        ClientMessage::UnsubscribeJob { job_id } => match job_id.parse::<JobId>() {
            Ok(id) => {
                fanout.unsubscribe(id, client_id).await;
                subscribed.remove(&id);
                send(outgoing, &ServerMessage::Unsubscribed { job_id: id.to_string() })
                    .await
                    .is_ok()
            }
            Err(_) => send(
                outgoing,
                &ServerMessage::Error {
                    message: format!("invalid job id: {job_id}"),
                },
            )
            .await
            .is_ok(),
        },
        ClientMessage::CancelJob { job_id } => match job_id.parse::<JobId>() {
            Ok(id) => {
                if let Err(err) = state.jobs.cancel(id).await {
                    debug!(job_id = %id, %err, "cancel request rejected");
                    return send(
                        outgoing,
                        &ServerMessage::Error {
                            message: err.to_string(),
                        },
                    )
                    .await
                    .is_ok();
                }
                true
            }
            Err(_) => send(
                outgoing,
                &ServerMessage::Error {
                    message: format!("invalid job id: {job_id}"),
                },
            )
            .await
            .is_ok(),
        },
    }
}

async fn send(
    outgoing: &mut (impl Sink<Message, Error = axum::Error> + Unpin),
    message: &impl Serialize,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string());
    outgoing.send(Message::Text(text)).await
}
