use super::channel::WsChannel;
use crate::config::PaymentNotifierConfigRef;
use crate::monitor::{NotifyChannel, PaymentMonitorRef};
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};

// Clients ask to be notified with a text frame `id:<request_id>`
const WATCH_PREFIX: &str = "id:";

pub fn parse_watch_message(text: &str) -> Option<&str> {
    let request_id = text.trim().strip_prefix(WATCH_PREFIX)?.trim();
    if request_id.is_empty() {
        None
    } else {
        Some(request_id)
    }
}

#[derive(Clone)]
struct WsState {
    monitor: PaymentMonitorRef,
    next_channel_id: Arc<AtomicU64>,
}

pub struct WsServer {
    listen_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl WsServer {
    pub async fn start(
        config: PaymentNotifierConfigRef,
        monitor: PaymentMonitorRef,
    ) -> Result<Self, String> {
        let state = WsState {
            monitor,
            next_channel_id: Arc::new(AtomicU64::new(1)),
        };
        let app = Router::new()
            .route("/ws", get(ws_handler))
            .with_state(state);

        let addr = format!("127.0.0.1:{}", config.websocket.port);
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            let msg = format!("Failed to bind websocket server on {}: {}", addr, e);
            error!("{}", msg);
            msg
        })?;
        let listen_addr = listener.local_addr().map_err(|e| {
            let msg = format!("Failed to get websocket listen address: {}", e);
            error!("{}", msg);
            msg
        })?;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let ret = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await;
            if let Err(e) = ret {
                error!("Websocket server exited with error: module=ws, error={}", e);
            }
        });

        info!("Websocket server listening: module=ws, listen_addr={}", listen_addr);
        Ok(Self {
            listen_addr,
            shutdown_tx,
            handle,
        })
    }

    pub fn get_listen_url(&self) -> String {
        format!("ws://{}/ws", self.listen_addr)
    }

    // Open connections are left to their own tasks; channels that were not
    // notified are not closed here
    pub async fn close(self) {
        info!("Closing websocket server.");
        self.shutdown_tx.send_replace(true);
        if let Err(e) = self.handle.await {
            error!("Websocket server task failed: {}", e);
        }
        info!("Websocket server closed.");
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<WsState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, peer, state))
}

async fn handle_socket(socket: WebSocket, peer: SocketAddr, state: WsState) {
    let id = state.next_channel_id.fetch_add(1, Ordering::Relaxed);
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let channel = Arc::new(WsChannel::new(id, &peer.to_string(), tx));
    info!("Websocket connected: module=ws, channel={}, peer={}", id, peer);

    let writer = channel.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let is_close = matches!(msg, Message::Close(_));
            if let Err(e) = ws_sender.send(msg).await {
                warn!(
                    "Websocket send failed: module=ws, channel={}, error={}",
                    writer.id(),
                    e
                );
                break;
            }
            if is_close {
                break;
            }
        }
        writer.mark_closed();
    });

    let reader = channel.clone();
    let monitor = state.monitor.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match parse_watch_message(text.as_str()) {
                    Some(request_id) => {
                        if monitor.submit(reader.clone(), request_id).is_err() {
                            break;
                        }
                    }
                    None => {
                        warn!(
                            "Unexpected websocket message: module=ws, channel={}, message={:?}",
                            reader.id(),
                            text.as_str()
                        );
                    }
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        "Websocket receive failed: module=ws, channel={}, error={}",
                        reader.id(),
                        e
                    );
                    break;
                }
            }
        }
        reader.mark_closed();
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    channel.mark_closed();
    info!(
        "Websocket disconnected: module=ws, channel={}, peer={}",
        id,
        channel.peer()
    );
}
