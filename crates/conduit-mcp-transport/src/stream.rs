//! Shared plumbing for long-lived SSE streams: byte pump, last-event-id
//! capture, and the inactivity supervisor that probes with pings and tears
//! the stream down when the server goes quiet.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, warn};

use conduit_mcp_core::protocol::constants::methods;
use conduit_mcp_core::JsonRpcMessage;

use crate::session::Session;
use crate::sse_codec::{SseEvent, SseParser};

/// Why a stream pump returned.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StreamEnd {
    /// The server closed the stream.
    Closed,
    /// No traffic for the close-after window; reconnect.
    Inactive,
    /// Read error on the wire.
    Failed(String),
}

/// Drive one established SSE response until it ends.
///
/// Every event's `id:` is recorded on the session for `Last-Event-ID`
/// resumption before `on_event` sees it. When the stream is silent for
/// `ping_interval`, a client ping is issued through the session's outbound
/// queue; silence past `close_after` ends the pump.
pub(crate) async fn pump_sse(
    response: reqwest::Response,
    session: &Arc<Session>,
    ping_interval: Duration,
    close_after: Duration,
    mut on_event: impl FnMut(SseEvent),
) -> StreamEnd {
    let mut stream = Box::pin(response.bytes_stream());
    let mut parser = SseParser::new();
    let mut last_activity = Instant::now();
    let mut next_probe = last_activity + ping_interval;

    loop {
        tokio::select! {
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    last_activity = Instant::now();
                    next_probe = last_activity + ping_interval;
                    for event in parser.push(&bytes) {
                        if let Some(id) = &event.id {
                            session.set_last_event_id(id);
                        }
                        on_event(event);
                    }
                }
                Some(Err(err)) => return StreamEnd::Failed(err.to_string()),
                None => return StreamEnd::Closed,
            },
            _ = tokio::time::sleep_until(next_probe) => {
                if last_activity.elapsed() >= close_after {
                    return StreamEnd::Inactive;
                }
                send_probe_ping(session);
                next_probe = Instant::now() + ping_interval;
            }
        }
    }
}

/// Issue a client-initiated ping without involving any caller. The reply
/// arrives over the stream like any other response and counts as activity.
pub(crate) fn send_probe_ping(session: &Arc<Session>) {
    let (request, id, rx) = session.register_request(methods::PING, None);
    if session
        .queue_outbound(JsonRpcMessage::Request(request))
        .is_err()
    {
        session.abandon(id);
        return;
    }
    let session = Arc::clone(session);
    tokio::spawn(async move {
        match session.await_response(id, rx).await {
            Ok(_) => session.record_ping_success(),
            Err(err) => {
                let failures = session.record_ping_failure();
                debug!(failures, error = %err, "keepalive ping failed");
            }
        }
    });
}

/// Parse an SSE `message` payload and hand it to the session.
pub(crate) fn dispatch_event_data(session: &Arc<Session>, data: &str) {
    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(value) => {
            if let Err(err) = session.dispatch(value) {
                warn!(error = %err, "failed to dispatch SSE message");
            }
        }
        Err(err) => warn!(error = %err, "SSE message event carried invalid JSON"),
    }
}
