use crate::monitor::NotifyChannel;
use axum::extract::ws::Message;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Handle to one websocket connection. Frames are queued to the connection's
/// writer task; the handle only tracks whether the connection is still usable.
pub struct WsChannel {
    id: u64,
    peer: String,
    sender: mpsc::UnboundedSender<Message>,
    closed: AtomicBool,
}

impl WsChannel {
    pub fn new(id: u64, peer: &str, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id,
            peer: peer.to_string(),
            sender,
            closed: AtomicBool::new(false),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    // Called by the connection tasks once the peer is gone
    pub fn mark_closed(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Websocket channel closed: channel={}, peer={}", self.id, self.peer);
        }
    }
}

#[async_trait::async_trait]
impl NotifyChannel for WsChannel {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.sender.is_closed()
    }

    async fn send(&self, payload: &str) -> Result<(), String> {
        if self.is_closed() {
            return Err(format!("Websocket channel {} is closed", self.id));
        }

        self.sender
            .send(Message::Text(payload.into()))
            .map_err(|e| {
                self.mark_closed();
                format!("Failed to queue message on websocket channel {}: {}", self.id, e)
            })
    }

    async fn close(&self) -> Result<(), String> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.sender.send(Message::Close(None)).map_err(|e| {
            format!("Failed to queue close on websocket channel {}: {}", self.id, e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_then_close() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let channel = WsChannel::new(7, "127.0.0.1:50000", tx);
        assert!(!channel.is_closed());

        channel.send("paid").await.unwrap();
        channel.close().await.unwrap();
        assert!(channel.is_closed());

        match rx.recv().await {
            Some(Message::Text(text)) => assert_eq!(text.as_str(), "paid"),
            other => panic!("Unexpected message: {:?}", other),
        }
        assert!(matches!(rx.recv().await, Some(Message::Close(None))));

        // A second close queues nothing
        channel.close().await.unwrap();
        assert!(channel.send("paid").await.is_err());
        drop(channel);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_writer_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let channel = WsChannel::new(8, "127.0.0.1:50001", tx);
        drop(rx);

        assert!(channel.is_closed());
        assert!(channel.send("paid").await.is_err());
    }
}
