use std::{fmt::Display, sync::Arc, time::Duration};

use axum::{
    extract::{ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade}, Extension},
    http::HeaderValue,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::WsErr,
    ws::{Frame, Mux, Outbound, Outbox, Writer, WS_SUBPROTOCOL},
};

/// How long a closing connection gets to flush its close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

pub fn router() -> Router {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(mux): Extension<Arc<Mux>>,
    Extension(cancel): Extension<CancellationToken>,
) -> impl IntoResponse {
    ws.protocols([WS_SUBPROTOCOL])
        .on_upgrade(move |sock| user_ws(sock, mux, cancel.child_token()))
}

fn close_msg(e: WsErr) -> Message {
    Message::Close(Some(CloseFrame { code: e.code, reason: e.reason.into() }))
}

/// The upgrade only succeeds on a client that offered our subprotocol.
fn check_subprotocol(p: Option<&HeaderValue>) -> Result<(), WsErr> {
    match p.and_then(|p| p.to_str().ok()) {
        Some(WS_SUBPROTOCOL) => Ok(()),
        _ => Err(WsErr::policy("Invalid websocket subprotocol")),
    }
}

/* ---------------- per connection ---------------- */
async fn user_ws(mut sock: WebSocket, mux: Arc<Mux>, cancel: CancellationToken) {
    if let Err(e) = check_subprotocol(sock.protocol()) {
        debug!("rejecting ws connection without subprotocol {WS_SUBPROTOCOL}");
        let _ = sock.send(close_msg(e)).await;
        return;
    }
    let connid = Uuid::new_v4().simple().to_string();
    let (ws_tx, ws_rx) = sock.split();
    serve_conn(connid, ws_rx, ws_tx, &mux, &cancel).await;
}

/// Maps raw socket messages onto mux frames.
///
/// Ping/pong are answered by the ws layer and skipped; a close frame ends
/// the stream.
fn frames<St, E>(ws_rx: St) -> impl Stream<Item = Result<Frame, WsErr>>
where
    St: Stream<Item = Result<Message, E>>,
    E: Display,
{
    ws_rx
        .take_while(|m| future::ready(!matches!(m, Ok(Message::Close(_)))))
        .filter_map(|m| future::ready(match m {
            Ok(Message::Text(t))   => Some(Ok(Frame::Text(t))),
            Ok(Message::Binary(b)) => Some(Ok(Frame::Binary(b))),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "ws read failed");
                Some(Err(WsErr::protocol("Failed to read from ws connection")))
            }
        }))
}

/// Runs one accepted connection to the end and returns the close it sent.
#[instrument(skip_all, fields(conn = %connid))]
async fn serve_conn<St, Si, E>(
    connid: String,
    ws_rx: St,
    ws_tx: Si,
    mux: &Mux,
    cancel: &CancellationToken,
) -> WsErr
where
    St: Stream<Item = Result<Message, E>>,
    E: Display,
    Si: Sink<Message> + Send + Unpin + 'static,
    Si::Error: Display,
{
    info!("ws connection open");
    let (w, rx) = Writer::new();
    let mut writer = tokio::spawn(write_loop(ws_tx, rx));

    let close = match mux.serve(&connid, frames(ws_rx), &w, cancel).await {
        Ok(()) if cancel.is_cancelled() => WsErr::going_away(),
        Ok(()) => WsErr::normal(),
        Err(e) => {
            warn!(code = e.code, reason = %e.reason, "closing ws connection");
            e
        }
    };
    if let Err(e) = w.close(close.clone()) {
        debug!(error = %e, "ws close not queued");
    }
    drop(w);

    if tokio::time::timeout(CLOSE_TIMEOUT, &mut writer).await.is_err() {
        warn!("ws writer did not finish closing");
        writer.abort();
        let _ = writer.await;
    }
    info!("ws connection closed");
    close
}

/// Drains `rx` into the socket until a close goes out or the socket breaks.
async fn write_loop<S>(mut ws_tx: S, mut rx: Outbox)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(out) = rx.recv().await {
        match out {
            Outbound::Text(t) => {
                if let Err(e) = ws_tx.send(Message::Text(t)).await {
                    debug!(error = %e, "ws write failed");
                    break;
                }
            }
            Outbound::Close(e) => {
                if let Err(e) = ws_tx.send(close_msg(e)).await {
                    debug!(error = %e, "ws close failed");
                }
                break;
            }
        }
    }
}
