//! WebSocket session gateway.
//!
//! Each socket becomes one engine connection. Inbound text frames are full
//! documents handed to [`SyncEngine::apply`](padsync_core::SyncEngine::apply);
//! outbound pushes land in a latest-value mailbox drained by a writer
//! future, so a slow client only ever receives the newest state and never
//! holds up the engine.

use crate::error::{ServerError, ServerResult};
use crate::server::AppState;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use padsync_core::{ConnectionId, ConnectionSink, DocumentUpdate, SessionId, SinkError, SyncError};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Outbound mailbox of one socket.
///
/// Owned by the engine's registry; when the registry drops it the writer
/// sees the channel close and says goodbye to the client.
struct MailboxSink {
    tx: watch::Sender<Option<DocumentUpdate>>,
}

impl ConnectionSink for MailboxSink {
    fn deliver(&self, update: &DocumentUpdate) -> Result<(), SinkError> {
        self.tx
            .send(Some(update.clone()))
            .map_err(|_| SinkError::Closed)
    }
}

/// What to do with one inbound frame.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Inbound {
    /// A full document to apply.
    Document(String),
    /// Control traffic; nothing to do.
    Ignore,
    /// The client is leaving.
    Close,
}

/// Interprets a client frame.
///
/// Binary frames are accepted when they hold UTF-8 text. Oversized frames
/// and invalid UTF-8 are [`ServerError::MalformedFrame`].
pub(crate) fn classify(message: Message, max_frame_bytes: usize) -> ServerResult<Inbound> {
    let text = match message {
        Message::Text(text) => text,
        Message::Binary(bytes) => {
            if bytes.len() > max_frame_bytes {
                return Err(oversized(bytes.len(), max_frame_bytes));
            }
            String::from_utf8(bytes)
                .map_err(|e| ServerError::MalformedFrame(format!("binary frame is not UTF-8: {e}")))?
        }
        Message::Close(_) => return Ok(Inbound::Close),
        Message::Ping(_) | Message::Pong(_) => return Ok(Inbound::Ignore),
    };

    if text.len() > max_frame_bytes {
        return Err(oversized(text.len(), max_frame_bytes));
    }
    Ok(Inbound::Document(text))
}

fn oversized(len: usize, max: usize) -> ServerError {
    ServerError::MalformedFrame(format!("frame of {len} bytes exceeds limit of {max}"))
}

/// `GET /ws`: joins the default session.
pub(crate) async fn default_session(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    upgrade(ws, state, SessionId::default_session())
}

/// `GET /ws/:session_id`: joins the named session.
pub(crate) async fn named_session(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    upgrade(ws, state, SessionId::new(session_id))
}

fn upgrade(ws: WebSocketUpgrade, state: AppState, session_id: SessionId) -> Response {
    ws.on_upgrade(move |socket| run_connection(socket, state, session_id))
}

async fn run_connection(mut socket: WebSocket, state: AppState, session_id: SessionId) {
    let (tx, mailbox) = watch::channel(None);
    let sink = Arc::new(MailboxSink { tx });

    let connection = match state.engine.connect(&session_id, sink) {
        Ok(id) => id,
        Err(e) => {
            warn!(session = %session_id, error = %e, "rejecting connection");
            let _ = socket.send(Message::Close(Some(going_away(&e)))).await;
            return;
        }
    };

    let (sender, receiver) = socket.split();
    tokio::select! {
        _ = write_loop(sender, mailbox, connection) => {}
        _ = read_loop(receiver, &state, &session_id, connection) => {}
    }

    state.engine.disconnect(connection);
}

fn going_away(reason: &SyncError) -> CloseFrame<'static> {
    CloseFrame {
        code: close_code::AWAY,
        reason: reason.to_string().into(),
    }
}

async fn write_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut mailbox: watch::Receiver<Option<DocumentUpdate>>,
    connection: ConnectionId,
) {
    while mailbox.changed().await.is_ok() {
        let frame = mailbox
            .borrow_and_update()
            .as_ref()
            .map(|update| update.content.to_string());
        let Some(text) = frame else { continue };

        if let Err(e) = sender.send(Message::Text(text)).await {
            debug!(connection = %connection, error = %e, "write failed");
            return;
        }
    }

    // Mailbox dropped by the engine: unregistered or shutting down.
    info!(connection = %connection, "closing connection from server side");
    let _ = sender
        .send(Message::Close(Some(going_away(&SyncError::ShuttingDown))))
        .await;
}

async fn read_loop(
    mut receiver: SplitStream<WebSocket>,
    state: &AppState,
    session_id: &SessionId,
    connection: ConnectionId,
) {
    while let Some(message) = receiver.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!(connection = %connection, error = %e, "connection lost");
                return;
            }
        };

        match classify(message, state.config.max_frame_bytes) {
            Ok(Inbound::Document(text)) => {
                // On shutdown the writer sends the close frame; keep reading until then.
                if let Err(e) = state.engine.apply(session_id, connection, text) {
                    warn!(connection = %connection, error = %e, "update rejected");
                }
            }
            Ok(Inbound::Ignore) => {}
            Ok(Inbound::Close) => {
                debug!(connection = %connection, "client closed connection");
                return;
            }
            Err(e) => {
                warn!(connection = %connection, session = %session_id, error = %e, "skipping frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_frame_is_document() {
        assert_eq!(
            classify(Message::Text("hello".into()), 16).unwrap(),
            Inbound::Document("hello".into())
        );
    }

    #[test]
    fn empty_text_is_a_document() {
        assert_eq!(
            classify(Message::Text(String::new()), 16).unwrap(),
            Inbound::Document(String::new())
        );
    }

    #[test]
    fn utf8_binary_is_document() {
        assert_eq!(
            classify(Message::Binary("héllo".as_bytes().to_vec()), 16).unwrap(),
            Inbound::Document("héllo".into())
        );
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let err = classify(Message::Binary(vec![0xff, 0xfe]), 16).unwrap_err();
        assert!(matches!(err, ServerError::MalformedFrame(_)));
    }

    #[test]
    fn oversized_frames_are_malformed() {
        let err = classify(Message::Text("x".repeat(17)), 16).unwrap_err();
        assert!(err.to_string().contains("exceeds limit"));
        let err = classify(Message::Binary(vec![b'x'; 17]), 16).unwrap_err();
        assert!(matches!(err, ServerError::MalformedFrame(_)));
    }

    #[test]
    fn control_frames() {
        assert_eq!(classify(Message::Ping(vec![1]), 16).unwrap(), Inbound::Ignore);
        assert_eq!(classify(Message::Pong(vec![]), 16).unwrap(), Inbound::Ignore);
        assert_eq!(classify(Message::Close(None), 16).unwrap(), Inbound::Close);
    }

    #[test]
    fn mailbox_reports_closed_receiver() {
        let (tx, rx) = watch::channel(None);
        let sink = MailboxSink { tx };
        let update = DocumentUpdate::from_snapshot(
            SessionId::default(),
            &padsync_core::DocumentSnapshot::empty(),
        );
        assert!(sink.deliver(&update).is_ok());
        drop(rx);
        assert_eq!(sink.deliver(&update), Err(SinkError::Closed));
    }
}
