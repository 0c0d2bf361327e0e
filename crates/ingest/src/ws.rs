//! Live push channel: one WebSocket per subscriber, one text frame per
//! ingested record.

use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::broadcast::Subscription;
use crate::http::AppState;

pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = state.broadcaster.subscribe();
    let subscriber = subscription.id();
    info!(%subscriber, "live subscriber connected");

    let ping_interval = state.ws_ping_interval;
    let mut send_task = tokio::spawn(async move {
        forward_events(&mut sender, &mut subscription, ping_interval).await;
        subscription
    });
    let mut recv_task = tokio::spawn(async move {
        drain_incoming(&mut receiver).await;
    });

    let subscription = tokio::select! {
        res = &mut send_task => {
            recv_task.abort();
            res.ok()
        }
        _ = &mut recv_task => {
            send_task.abort();
            None
        }
    };

    if let Some(subscription) = subscription {
        state.broadcaster.unsubscribe(subscription);
    }
    info!(%subscriber, "live subscriber disconnected");
}

async fn forward_events(
    sender: &mut SplitSink<WebSocket, Message>,
    subscription: &mut Subscription,
    ping_interval: Duration,
) {
    let mut ping_timer = interval(ping_interval);
    ping_timer.tick().await;

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else {
                    break;
                };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "failed to serialize live event"),
                }
            }
            _ = ping_timer.tick() => {
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Clients have nothing to say; read until they close.
async fn drain_incoming(receiver: &mut SplitStream<WebSocket>) {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => {
                debug!("received close frame");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!(message = %text.as_str(), "ignoring client text message");
            }
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "websocket receive error");
                break;
            }
        }
    }
}
