//! Terminal WebSocket handler
//!
//! `GET /ws/projects/:project_id/terminal`. The upgrade is always accepted;
//! every rejection is reported as a close code by the session orchestrator.

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Extension, Path,
    },
    http::{header, HeaderMap, Uri},
    response::IntoResponse,
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use std::borrow::Cow;
use std::sync::Arc;
use termgate_core::{
    close_code, ConnectRequest, PeerClosed, PeerFrame, PeerSink, PeerSource, SessionOrchestrator,
    ShutdownController,
};
use tracing::{debug, info};

use crate::middleware::auth::{extract_credential, AuthState};

/// Outgoing half of a terminal WebSocket
pub struct WsPeerSink(SplitSink<WebSocket, Message>);

#[async_trait::async_trait]
impl PeerSink for WsPeerSink {
    async fn send_binary(&mut self, data: Vec<u8>) -> Result<(), PeerClosed> {
        self.0.send(Message::Binary(data)).await.map_err(|_| PeerClosed)
    }

    async fn send_text(&mut self, text: String) -> Result<(), PeerClosed> {
        self.0.send(Message::Text(text)).await.map_err(|_| PeerClosed)
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), PeerClosed> {
        let frame = CloseFrame {
            code,
            reason: Cow::Owned(reason.to_string()),
        };
        self.0
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|_| PeerClosed)
    }
}

/// Incoming half of a terminal WebSocket
pub struct WsPeerSource(SplitStream<WebSocket>);

#[async_trait::async_trait]
impl PeerSource for WsPeerSource {
    async fn next_frame(&mut self) -> Option<PeerFrame> {
        loop {
            match self.0.next().await? {
                Ok(Message::Binary(data)) => return Some(PeerFrame::Binary(data)),
                Ok(Message::Text(text)) => return Some(PeerFrame::Text(text)),
                // protocol pings are answered by the websocket layer
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(frame)) => {
                    debug!(code = ?frame.map(|f| f.code), "Peer sent close");
                    return None;
                }
                Err(e) => {
                    debug!(error = %e, "WebSocket receive error");
                    return None;
                }
            }
        }
    }
}

/// Upgrade handler for terminal sessions
pub async fn terminal_handler(
    ws: WebSocketUpgrade,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
    Extension(auth): Extension<AuthState>,
    Extension(orchestrator): Extension<Arc<SessionOrchestrator>>,
    Extension(shutdown): Extension<Arc<ShutdownController>>,
) -> impl IntoResponse {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let request = ConnectRequest {
        project_id,
        origin: header_value(header::ORIGIN),
        host: header_value(header::HOST),
        credential: extract_credential(&headers, &uri, &auth.cookie_name),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, request, orchestrator, shutdown))
}

async fn handle_socket(
    socket: WebSocket,
    request: ConnectRequest,
    orchestrator: Arc<SessionOrchestrator>,
    shutdown: Arc<ShutdownController>,
) {
    let (sender, receiver) = socket.split();
    let mut sink = WsPeerSink(sender);

    let Some(_guard) = shutdown.try_register_session() else {
        info!(project_id = %request.project_id, "Rejecting terminal during shutdown");
        let _ = sink
            .close(close_code::GOING_AWAY, "server shutting down")
            .await;
        return;
    };

    let result = orchestrator
        .serve(
            request,
            Box::new(sink),
            Box::new(WsPeerSource(receiver)),
            shutdown.token(),
        )
        .await;

    match result {
        Ok(report) => debug!(reason = %report.end, exit_code = report.exit_code, "Terminal closed"),
        Err(e) => debug!(code = e.close_code(), "Terminal rejected"),
    }
}
