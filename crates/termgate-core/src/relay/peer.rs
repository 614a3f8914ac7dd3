//! The remote end of a terminal session

use async_trait::async_trait;
use thiserror::Error;

/// Frame received from the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerFrame {
    /// Raw terminal input
    Binary(Vec<u8>),
    /// JSON control message
    Text(String),
}

/// The peer connection is gone
#[derive(Debug, Clone, Copy, Error)]
#[error("peer connection closed")]
pub struct PeerClosed;

/// Incoming half of a peer connection
#[async_trait]
pub trait PeerSource: Send {
    /// Next data frame, `None` once the peer has disconnected
    async fn next_frame(&mut self) -> Option<PeerFrame>;
}

/// Outgoing half of a peer connection
#[async_trait]
pub trait PeerSink: Send {
    /// Send raw terminal output
    async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), PeerClosed>;

    /// Send a JSON control message
    async fn send_text(&mut self, text: String) -> Result<(), PeerClosed>;

    /// Close the connection with a code and reason
    async fn close(&mut self, code: u16, reason: &str) -> Result<(), PeerClosed>;
}
