//! Live section stream (SSE)

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;

use crate::AppState;

/// One `data:` event per published message. The stream ends if the
/// listener falls behind and gets dropped by the notifier.
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.notifier.subscribe();
    tracing::info!(subscriber = subscription.id(), "Stream client connected");

    let events = subscription
        .into_stream()
        .map(|message| Ok(Event::default().data(message)));
    let heartbeat = Duration::from_secs(state.config.server.sse_keep_alive_secs);

    Sse::new(events).keep_alive(KeepAlive::new().interval(heartbeat))
}
