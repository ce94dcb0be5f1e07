//! Realtime change feed over the Phoenix websocket protocol.
//!
//! Every [`Realtime::subscribe`] call opens its own socket and joins the
//! channel `realtime:public:<table>` with a wildcard `postgres_changes`
//! binding. A pump task forwards decoded changes to the returned
//! [`Subscription`], sends a heartbeat every 30 seconds and leaves the
//! channel once the subscription is closed or dropped.

use std::time::Duration;

use elvora_core::backend::{BackendError, ChangeEvent, Realtime, Subscription};
use futures::{SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, interval_at, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::instrument;
use url::Url;

use super::SupabaseClient;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const JOIN_REF: &str = "1";

/// One frame of the Phoenix channel protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Frame {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
}

impl Frame {
    fn new(topic: &str, event: &str, payload: Value, reference: &str) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            reference: Some(reference.to_string()),
        }
    }

    fn join(table: &str, access_token: &str) -> Self {
        Self::new(
            &topic(table),
            "phx_join",
            json!({
                "config": {
                    "broadcast": {"self": false},
                    "presence": {"key": ""},
                    "postgres_changes": [
                        {"event": "*", "schema": "public", "table": table}
                    ]
                },
                "access_token": access_token
            }),
            JOIN_REF,
        )
    }

    fn heartbeat(reference: &str) -> Self {
        Self::new("phoenix", "heartbeat", json!({}), reference)
    }

    fn leave(table: &str, reference: &str) -> Self {
        Self::new(&topic(table), "phx_leave", json!({}), reference)
    }

    fn to_message(&self) -> Result<Message, BackendError> {
        Ok(Message::Text(serde_json::to_string(self)?))
    }
}

fn topic(table: &str) -> String {
    format!("realtime:public:{table}")
}

/// Websocket URL of the realtime service for `base`.
fn socket_url(base: &Url, api_key: &str) -> Result<Url, BackendError> {
    let mut url = base.clone();
    let scheme = if base.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|()| BackendError::Transport(format!("cannot derive websocket URL from {base}")))?;
    url.set_path("/realtime/v1/websocket");
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", api_key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

/// Decode a change pushed on `table`'s channel.
///
/// Accepts both the `postgres_changes` envelope (`payload.data`) and the
/// older per-kind events carrying the record at the payload root. Returns
/// `None` for control frames and unknown kinds.
fn decode_change(table: &str, frame: &Frame) -> Option<ChangeEvent> {
    let data = match frame.event.as_str() {
        "postgres_changes" => frame.payload.get("data")?,
        "INSERT" | "UPDATE" | "DELETE" => &frame.payload,
        _ => return None,
    };
    let kind = data
        .get("type")
        .or_else(|| data.get("eventType"))
        .and_then(Value::as_str)?;
    let record = || data.get("record").filter(|r| r.is_object()).cloned();
    match kind {
        "INSERT" => Some(ChangeEvent::insert(table, record()?)),
        "UPDATE" => Some(ChangeEvent::update(table, record()?)),
        "DELETE" => {
            let old = data.get("old_record").filter(|r| r.is_object()).cloned()?;
            Some(ChangeEvent::delete(table, old))
        }
        _ => None,
    }
}

/// Frame carried by a websocket message, if it is a text frame.
fn parse_frame(message: &Message) -> Option<Frame> {
    let Message::Text(text) = message else {
        return None;
    };
    match serde_json::from_str(text) {
        Ok(frame) => Some(frame),
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed realtime frame");
            None
        }
    }
}

/// Read frames until the reply to the join request arrives.
async fn await_join<S>(read: &mut S) -> Result<(), BackendError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(message) = read.next().await {
        let message = message.map_err(|e| BackendError::Transport(e.to_string()))?;
        let Some(frame) = parse_frame(&message) else {
            continue;
        };
        if frame.event != "phx_reply" || frame.reference.as_deref() != Some(JOIN_REF) {
            continue;
        }
        if frame.payload.get("status").and_then(Value::as_str) == Some("ok") {
            return Ok(());
        }
        return Err(BackendError::Rejected {
            status: 400,
            message: frame
                .payload
                .get("response")
                .map_or_else(String::new, Value::to_string),
        });
    }
    Err(BackendError::Transport(
        "realtime socket closed during join".to_string(),
    ))
}

impl Realtime for SupabaseClient {
    #[instrument(skip(self))]
    async fn subscribe(&self, table: &str) -> Result<Subscription, BackendError> {
        let url = socket_url(&self.inner.base, self.anon_key())?;
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| BackendError::Transport(format!("realtime connect failed: {e}")))?;
        let (mut write, mut read) = socket.split();

        let token = self.bearer().await;
        write
            .send(Frame::join(table, &token).to_message()?)
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        timeout(JOIN_TIMEOUT, await_join(&mut read))
            .await
            .map_err(|_| BackendError::Transport("realtime join timed out".to_string()))??;
        tracing::info!("Realtime channel joined");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let table_name = table.to_string();

        tokio::spawn(async move {
            let mut heartbeat = interval_at(Instant::now() + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);
            let mut next_ref: u64 = 2;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => {
                        if let Ok(message) = Frame::leave(&table_name, &next_ref.to_string()).to_message() {
                            let _ = write.send(message).await;
                        }
                        let _ = write.close().await;
                        tracing::debug!(table = %table_name, "Realtime channel left");
                        break;
                    }
                    _ = heartbeat.tick() => {
                        let sent = match Frame::heartbeat(&next_ref.to_string()).to_message() {
                            Ok(message) => write.send(message).await.is_ok(),
                            Err(_) => false,
                        };
                        next_ref += 1;
                        if !sent {
                            tracing::warn!(table = %table_name, "Realtime heartbeat failed");
                            break;
                        }
                    }
                    message = read.next() => {
                        match message {
                            Some(Ok(Message::Close(_))) | None => {
                                tracing::warn!(table = %table_name, "Realtime socket closed by server");
                                break;
                            }
                            Some(Err(e)) => {
                                tracing::warn!(table = %table_name, error = %e, "Realtime socket error");
                                break;
                            }
                            Some(Ok(message)) => {
                                let Some(change) = parse_frame(&message)
                                    .and_then(|frame| decode_change(&table_name, &frame))
                                else {
                                    continue;
                                };
                                if events_tx.send(change).is_err() {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
        });

        Ok(Subscription::new(table, events_rx).with_closer(stop_tx))
    }
}
