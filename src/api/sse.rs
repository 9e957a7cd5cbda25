//! Server-Sent Events support

use crate::runtime::SseEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    init_event: SseEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<SseEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(event_stream(init_event, broadcast_rx)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Init event, then broadcasts until the client falls behind
fn event_stream(
    init_event: SseEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<SseEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let init = futures::stream::once(async move { Ok(sse_event_to_axum(&init_event)) });

    // A lagged client has lost reveal chunks; ending the stream makes the
    // browser reconnect and start over from a fresh init
    let broadcasts = BroadcastStream::new(broadcast_rx).map_while(|result| match result {
        Ok(event) => Some(Ok(sse_event_to_axum(&event))),
        Err(e) => {
            tracing::warn!(error = %e, "SSE client lagged, closing stream");
            None
        }
    });

    init.chain(broadcasts)
}

fn event_name(event: &SseEvent) -> &'static str {
    match event {
        SseEvent::Init { .. } => "init",
        SseEvent::Turn { .. } => "turn",
        SseEvent::Reveal { .. } => "reveal",
        SseEvent::TurnDone { .. } => "turn_done",
        SseEvent::StateChange { .. } => "state_change",
        SseEvent::Cue { .. } => "cue",
        SseEvent::Settings { .. } => "settings",
        SseEvent::Cleared => "cleared",
    }
}

fn sse_event_to_axum(event: &SseEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to serialize SSE event");
        "{}".to_string()
    });
    Event::default().event(event_name(event)).data(data)
}
