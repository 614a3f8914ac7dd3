//! Activity log WebSocket handler
//!
//! `GET /ws/projects/:project_id/logs`. Sends the last lines of the project's
//! activity log once, then every line appended while the socket is open.
//! Like the terminal socket, the upgrade is always accepted and rejections
//! are close codes.

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
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use termgate_core::{
    close_code, is_origin_allowed, FileActivityLog, IdentityVerifier, ProjectResolver,
    SessionOrchestrator, ShutdownController,
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::middleware::auth::{extract_credential, AuthState};

/// Lines sent when the socket opens
const INIT_LINES: usize = 200;

/// How often the log file is checked for new lines
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound for one outgoing frame; a viewer that stops reading is dropped
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages sent to the log viewer
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogEvent {
    /// Snapshot sent once after the socket opens
    Init {
        lines: Vec<String>,
        username: String,
    },
    /// One newly appended line
    Line { line: String },
}

/// Everything the log socket checks before streaming
struct LogsRequest {
    project_id: String,
    origin: Option<String>,
    host: Option<String>,
    credential: Option<String>,
}

/// Upgrade handler for activity log streams
#[allow(clippy::too_many_arguments)]
pub async fn logs_handler(
    ws: WebSocketUpgrade,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
    Extension(auth): Extension<AuthState>,
    Extension(orchestrator): Extension<Arc<SessionOrchestrator>>,
    Extension(projects): Extension<Arc<dyn ProjectResolver>>,
    Extension(activity_log): Extension<Arc<FileActivityLog>>,
    Extension(shutdown): Extension<Arc<ShutdownController>>,
) -> impl IntoResponse {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let request = LogsRequest {
        project_id,
        origin: header_value(header::ORIGIN),
        host: header_value(header::HOST),
        credential: extract_credential(&headers, &uri, &auth.cookie_name),
    };
    let allowed_origins = orchestrator.settings().allowed_origins.clone();

    ws.on_upgrade(move |socket| async move {
        let (mut sender, receiver) = socket.split();

        let Some(_guard) = shutdown.try_register_session() else {
            close(&mut sender, close_code::GOING_AWAY, "server shutting down").await;
            return;
        };

        if !is_origin_allowed(
            request.origin.as_deref(),
            request.host.as_deref(),
            &allowed_origins,
        ) {
            info!(origin = ?request.origin, "Rejecting log stream from foreign origin");
            close(&mut sender, close_code::FORBIDDEN, "origin not allowed").await;
            return;
        }

        let identity = match auth.store.verify(request.credential.as_deref()) {
            Ok(identity) => identity,
            Err(e) => {
                debug!(error = %e, "Rejecting unauthenticated log stream");
                close(&mut sender, close_code::UNAUTHENTICATED, "not authenticated").await;
                return;
            }
        };

        if projects.resolve(&request.project_id).is_none() {
            close(&mut sender, close_code::NOT_FOUND, "project not found").await;
            return;
        }

        stream_log(
            sender,
            receiver,
            &request.project_id,
            identity.username,
            &activity_log,
            &shutdown,
        )
        .await;
    })
}

async fn stream_log(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    project_id: &str,
    username: String,
    activity_log: &FileActivityLog,
    shutdown: &ShutdownController,
) {
    let (lines, mut follower) = match activity_log.tail_and_follow(project_id, INIT_LINES) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(project_id = %project_id, error = %e, "Failed to open activity log");
            close(&mut sender, close_code::INTERNAL_ERROR, "log unavailable").await;
            return;
        }
    };

    info!(project_id = %project_id, username = %username, "Log stream opened");
    if !send_event(&mut sender, &LogEvent::Init { lines, username }).await {
        return;
    }

    let cancel = shutdown.token();
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    'stream: loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                close(&mut sender, close_code::GOING_AWAY, "server shutting down").await;
                break;
            }
            frame = receiver.next() => match frame {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // the viewer is read-only; anything it sends is ignored
                Some(Ok(_)) => continue,
            },
            _ = ticker.tick() => {
                let lines = match follower.read_new_lines() {
                    Ok(lines) => lines,
                    Err(e) => {
                        warn!(project_id = %project_id, error = %e, "Failed to read activity log");
                        close(&mut sender, close_code::INTERNAL_ERROR, "log unavailable").await;
                        break;
                    }
                };
                for line in lines {
                    if !send_event(&mut sender, &LogEvent::Line { line }).await {
                        break 'stream;
                    }
                }
            }
        }
    }

    debug!(project_id = %project_id, "Log stream closed");
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &LogEvent) -> bool {
    let text = serde_json::to_string(event).unwrap_or_default();
    match tokio::time::timeout(SEND_TIMEOUT, sender.send(Message::Text(text))).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(error = %e, "Log viewer went away");
            false
        }
        Err(_) => {
            debug!("Log viewer stopped reading");
            false
        }
    }
}

async fn close(sender: &mut SplitSink<WebSocket, Message>, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: Cow::Borrowed(reason),
    };
    match tokio::time::timeout(SEND_TIMEOUT, sender.send(Message::Close(Some(frame)))).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(code, error = %e, "Peer gone before close"),
        Err(_) => debug!(code, "Timed out sending close frame"),
    }
}
