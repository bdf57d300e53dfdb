use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use iotdash_core::OutboundCommand;
use prometheus::{Encoder, TextEncoder};
use tokio::select;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::device::{DeviceFrame, DeviceSim};

pub fn router(sim: DeviceSim) -> Router {
    Router::new()
        .route("/", get(ws_control))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .with_state(sim)
}

async fn healthz() -> &'static str { "ok" }

async fn metrics_handler(State(sim): State<DeviceSim>) -> Response {
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&sim.metrics().registry.gather(), &mut buf) {
        warn!(?e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    ([(axum::http::header::CONTENT_TYPE, encoder.format_type().to_string())], buf).into_response()
}

async fn ws_control(State(sim): State<DeviceSim>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| control_ws_loop(sim, socket))
}

async fn send_frame(socket: &mut WebSocket, frame: &DeviceFrame) -> bool {
    match frame.encode() {
        Ok(text) => socket.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            warn!(?e, "Failed to encode device frame");
            true
        }
    }
}

async fn control_ws_loop(sim: DeviceSim, mut socket: WebSocket) {
    sim.metrics().clients.inc();
    info!("Control client connected");

    let mut updates = sim.updates();

    loop {
        select! {
            ws_msg = socket.recv() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        let command = match serde_json::from_str::<OutboundCommand>(&text) {
                            Ok(command) => command,
                            Err(e) => {
                                warn!(?e, %text, "Ignoring malformed control frame");
                                continue;
                            }
                        };
                        if command == OutboundCommand::Hello {
                            sim.apply(command).await;
                            let snapshot = sim.snapshot().await.to_frame();
                            if !send_frame(&mut socket, &snapshot).await {
                                break;
                            }
                        } else {
                            // The resulting update reaches this client through the broadcast.
                            sim.apply(command).await;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Control client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(?e, "Control socket read error");
                        break;
                    }
                    _ => {}
                }
            }
            update = updates.recv() => {
                match update {
                    Ok(frame) => {
                        if !send_frame(&mut socket, &frame).await {
                            info!("Control client went away during send");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Control client lagging behind updates");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    let _ = socket.close().await;
    sim.metrics().clients.dec();
}
