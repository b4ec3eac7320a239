//! # Call Session Supervision
//!
//! One session per accepted `/call/{token}` connection. The supervisor opens
//! the per-token recording, then races two independent tasks that share only
//! the two halves of the connection:
//!
//! - the **inbound recorder** appends every binary frame to the recording
//!   until the caller goes away or the transport fails;
//! - the **outbound streamer** replays the canned payload on a fixed cadence
//!   until the connection closes (or immediately completes when no payload
//!   artifact exists).
//!
//! Whichever task finishes first ends the call: the supervisor cancels the
//! other through the session's `CancellationToken`, awaits its exit, closes
//! the connection if it is still open, and only then releases the recording.
//! Cancellation is cooperative: both loops observe the token at their
//! suspension points, so no frame is ever written after the sink is closed
//! and no payload transmission is ever cut in half.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::relay::payload::PayloadCache;
use crate::relay::sink::RecordingSink;
use crate::state::AppState;

type CallSocket = WebSocketStream<TcpStream>;
type CallReader = SplitStream<CallSocket>;
type CallWriter = SplitSink<CallSocket, Message>;

/// How one half of a call session came to a stop.
///
/// Disconnects and transport faults are modeled as values rather than errors
/// so the supervisor can pattern-match every exit the same way, no matter
/// which side finished or why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The peer ended the connection cleanly.
    Disconnected,

    /// A write hit a connection that was already closed.
    Closed,

    /// No outbound payload artifact exists; the streamer had nothing to do.
    NoPayload,

    /// The task observed the session's cancellation signal and unwound.
    Cancelled,

    /// A transport or storage fault ended the loop. Logged, never retried.
    Error,
}

/// Everything a call session needs beyond its own connection.
#[derive(Clone)]
pub struct RelayContext {
    /// Directory holding one recording per call token
    pub received_dir: PathBuf,

    /// Process-wide outbound payload
    pub payload: PayloadCache,

    /// Pause between outbound payload transmissions
    pub stream_interval: Duration,

    /// Shared metrics
    pub state: AppState,

    /// Process shutdown signal; sessions derive their own tokens from it
    pub shutdown: CancellationToken,
}

struct RecorderExit {
    outcome: TaskOutcome,
    sink: RecordingSink,
}

struct StreamerExit {
    outcome: TaskOutcome,
    transmissions: u64,
    writer: CallWriter,
}

/// Drive one call session from accepted connection to teardown.
///
/// ## Lifecycle:
/// 1. Open the per-token recording sink
/// 2. Spawn the recorder and the streamer against the split connection
/// 3. Wait for whichever finishes first
/// 4. Cancel the other and await its exit
/// 5. Close the connection if still open (already-closed is benign)
/// 6. Flush and release the sink
///
/// Nothing is reported back to the caller; outcomes are visible only through
/// logs, metrics, and the recording on disk.
pub async fn handle_call(socket: CallSocket, token: String, ctx: RelayContext) {
    ctx.state.call_started();

    let sink = match RecordingSink::create(&ctx.received_dir, &token).await {
        Ok(sink) => sink,
        Err(error) => {
            error!(%token, %error, "Could not open recording sink; dropping call");
            ctx.state.call_finished(0, 0, 0);
            return;
        }
    };

    let payload = ctx.payload.load().await;
    let (writer, reader) = socket.split();
    let cancel = ctx.shutdown.child_token();

    let mut recorder = tokio::spawn(record_inbound(reader, sink, cancel.clone()));
    let mut streamer = tokio::spawn(stream_outbound(
        writer,
        payload,
        ctx.stream_interval,
        cancel.clone(),
    ));

    // First completion wins; the loser is cancelled and then joined so that
    // teardown never proceeds while a task still holds the sink or the writer.
    let (recorder_result, streamer_result) = tokio::select! {
        recorder_result = &mut recorder => {
            cancel.cancel();
            (recorder_result, streamer.await)
        }
        streamer_result = &mut streamer => {
            cancel.cancel();
            (recorder.await, streamer_result)
        }
    };

    let (recorder_outcome, sink) = match recorder_result {
        Ok(exit) => (exit.outcome, Some(exit.sink)),
        Err(join_error) => {
            error!(%token, %join_error, "Inbound recorder aborted");
            (TaskOutcome::Error, None)
        }
    };

    let (streamer_outcome, transmissions, writer) = match streamer_result {
        Ok(exit) => (exit.outcome, exit.transmissions, Some(exit.writer)),
        Err(join_error) => {
            error!(%token, %join_error, "Outbound streamer aborted");
            (TaskOutcome::Error, 0, None)
        }
    };

    info!(
        %token,
        recorder = ?recorder_outcome,
        streamer = ?streamer_outcome,
        "Call finished; tearing down"
    );

    if let Some(mut writer) = writer {
        match writer.close().await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {}
            Err(error) => warn!(%token, %error, "Error while closing call connection"),
        }
    }

    let (frames, bytes) = match sink {
        Some(sink) => {
            let counts = (sink.frames_written(), sink.bytes_written());
            if let Err(error) = sink.finish().await {
                warn!(%token, %error, "Error while closing recording");
            }
            counts
        }
        None => (0, 0),
    };

    ctx.state.call_finished(frames, bytes, transmissions);
    info!(%token, frames, bytes, transmissions, "Call session closed");
}

/// Receive binary frames and append them to the recording, in arrival order,
/// until the caller disconnects, the transport fails, or the session is
/// cancelled.
async fn record_inbound(
    mut reader: CallReader,
    mut sink: RecordingSink,
    cancel: CancellationToken,
) -> RecorderExit {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => {
                return RecorderExit { outcome: TaskOutcome::Cancelled, sink };
            }
            frame = reader.next() => frame,
        };

        match frame {
            Some(Ok(Message::Binary(data))) => {
                if data.is_empty() {
                    debug!("Skipping empty audio frame");
                    continue;
                }
                if let Err(error) = sink.append(&data).await {
                    error!(%error, "Failed to persist audio frame");
                    return RecorderExit { outcome: TaskOutcome::Error, sink };
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                info!("Caller closed the inbound stream");
                return RecorderExit { outcome: TaskOutcome::Disconnected, sink };
            }
            // Text and control frames carry no audio
            Some(Ok(_)) => {}
            Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                info!("Connection closed while receiving audio");
                return RecorderExit { outcome: TaskOutcome::Disconnected, sink };
            }
            Some(Err(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake))) => {
                info!("Caller went away without a close handshake");
                return RecorderExit { outcome: TaskOutcome::Disconnected, sink };
            }
            Some(Err(error)) => {
                error!(%error, "Inbound stream failed");
                return RecorderExit { outcome: TaskOutcome::Error, sink };
            }
        }
    }
}

/// Replay the full payload on a fixed cadence until the connection closes or
/// the session is cancelled. Completes immediately when no payload exists,
/// which counts as a finished task and can end the whole session.
async fn stream_outbound(
    mut writer: CallWriter,
    payload: Option<Arc<Vec<u8>>>,
    interval: Duration,
    cancel: CancellationToken,
) -> StreamerExit {
    let Some(payload) = payload else {
        warn!("No outbound payload artifact; nothing to stream to the caller");
        return StreamerExit {
            outcome: TaskOutcome::NoPayload,
            transmissions: 0,
            writer,
        };
    };

    let mut transmissions = 0u64;
    loop {
        // The send is never raced against cancellation: a payload frame is
        // either fully transmitted or not sent at all.
        match writer.send(Message::Binary(payload.as_ref().clone())).await {
            Ok(()) => {
                transmissions += 1;
                debug!(bytes = payload.len(), transmissions, "Sent payload to caller");
            }
            Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {
                info!("Connection closed; stopping outbound stream");
                return StreamerExit {
                    outcome: TaskOutcome::Closed,
                    transmissions,
                    writer,
                };
            }
            Err(error) => {
                error!(%error, "Outbound send failed");
                return StreamerExit {
                    outcome: TaskOutcome::Error,
                    transmissions,
                    writer,
                };
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return StreamerExit {
                    outcome: TaskOutcome::Cancelled,
                    transmissions,
                    writer,
                };
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
