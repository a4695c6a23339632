//! WebSocket connection lifecycle, from upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tether_core::{ConnectionEndpoint, EndpointId, SessionRef};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::connection::ClientSession;
use crate::metrics::{CONNECTION_DURATION_SECONDS, CONNECTIONS_ACTIVE, CONNECTIONS_TOTAL};

/// Settings applied to every accepted socket.
#[derive(Clone, Copy, Debug)]
pub struct SocketOptions {
    /// Outbound channel capacity.
    pub outbound_buffer: usize,
    /// Read idle limit until the endpoint lifts it.
    pub idle_timeout: Option<Duration>,
}

/// What ended the read loop.
enum Inbound {
    Frame(Message),
    Failed(axum::Error),
    Ended,
    IdleTimeout,
}

/// Run one connection for `endpoint` until the peer leaves or the server
/// shuts down.
///
/// Outbound payloads flow through a bounded channel into a writer task so
/// that core sends never block. Text frames, and binary frames that are
/// valid UTF-8, are handed to [`ConnectionEndpoint::on_message`].
#[instrument(skip_all, fields(endpoint = %endpoint))]
pub async fn run_socket(
    ws: WebSocket,
    endpoint: EndpointId,
    connection: Arc<ConnectionEndpoint>,
    options: SocketOptions,
    shutdown: CancellationToken,
) {
    let (ws_tx, mut ws_rx) = ws.split();

    let (send_tx, send_rx) = mpsc::channel::<String>(options.outbound_buffer);
    let client = Arc::new(ClientSession::new(
        endpoint.clone(),
        send_tx,
        options.idle_timeout,
    ));
    let session: SessionRef = client.clone();

    let started = Instant::now();
    counter!(CONNECTIONS_TOTAL).increment(1);
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);

    // Writer must be running before on_open flushes the backlog into it
    let outbound = tokio::spawn(forward_outbound(
        ws_tx,
        send_rx,
        endpoint.clone(),
        connection.clone(),
    ));

    connection.on_open(session.clone(), endpoint.clone());

    let reason = loop {
        let limit = client.idle_timeout();
        let next = tokio::select! {
            () = shutdown.cancelled() => break "server shutdown".to_owned(),
            next = read_next(&mut ws_rx, limit) => next,
        };

        let text = match next {
            Inbound::Frame(Message::Text(text)) => text.as_str().to_owned(),
            Inbound::Frame(Message::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(text) => text.to_owned(),
                Err(_) => {
                    debug!(len = data.len(), "ignoring non-UTF-8 binary frame");
                    continue;
                }
            },
            Inbound::Frame(Message::Close(frame)) => {
                break frame
                    .map(|f| f.reason.as_str().to_owned())
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "client closed".to_owned());
            }
            Inbound::Frame(Message::Ping(_) | Message::Pong(_)) => continue,
            Inbound::Failed(error) => {
                connection.on_error(&error, &endpoint);
                break "transport error".to_owned();
            }
            Inbound::Ended => break "stream ended".to_owned(),
            Inbound::IdleTimeout => {
                info!(?limit, "idle timeout before registration");
                break "idle timeout".to_owned();
            }
        };

        if let Err(error) = connection.on_message(&text, &endpoint) {
            warn!(code = error.code(), %error, "rejected inbound message");
        }
    };

    client.close();
    outbound.abort();
    connection.on_session_close(&session, &reason, &endpoint);

    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    debug!(dropped = client.drop_count(), "socket closed");
}

/// Drain the outbound channel into the socket.
///
/// A backlog flush stops when the channel fills up. Each time the channel
/// runs dry the endpoint's queues are flushed again, so a backlog larger
/// than the channel still reaches the client.
pub(crate) async fn forward_outbound<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<String>,
    endpoint: EndpointId,
    connection: Arc<ConnectionEndpoint>,
) where
    S: Sink<Message> + Unpin,
{
    while let Some(text) = rx.recv().await {
        if sink.send(Message::Text(text.into())).await.is_err() {
            break;
        }
        if rx.is_empty() && connection.has_pending(&endpoint) {
            let resent = connection.resend(&endpoint);
            trace!(resent, "refilled outbound channel from backlog");
        }
    }
    let _ = sink.close().await;
}

async fn read_next<S>(rx: &mut S, limit: Option<Duration>) -> Inbound
where
    S: futures::Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let frame = match limit {
        Some(limit) => match tokio::time::timeout(limit, rx.next()).await {
            Ok(frame) => frame,
            Err(_) => return Inbound::IdleTimeout,
        },
        None => rx.next().await,
    };
    match frame {
        Some(Ok(msg)) => Inbound::Frame(msg),
        Some(Err(error)) => Inbound::Failed(error),
        None => Inbound::Ended,
    }
}
