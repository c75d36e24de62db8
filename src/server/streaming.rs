//! SSE (Server-Sent Events) streaming of playback status.
//!
//! Each status change published by the tick driver becomes one `status`
//! event. Intermediate values are skipped if the client falls behind.

use axum::response::sse::Event;
use futures::stream::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

use crate::playback::{PlaybackState, PlaybackStatus};

/// Only frame changes, state changes and upload progress are sent.
#[derive(Debug, Clone, PartialEq)]
struct StatusKey {
    state: PlaybackState,
    frame_index: usize,
    displayed_frame: Option<usize>,
    upload_offset: Option<usize>,
}

impl StatusKey {
    fn of(status: &PlaybackStatus) -> Self {
        Self {
            state: status.state,
            frame_index: status.frame_index,
            displayed_frame: status.displayed_frame,
            upload_offset: status.upload.map(|u| u.offset),
        }
    }
}

/// Convert the status watch channel into an SSE stream.
pub fn status_to_sse_stream(
    rx: watch::Receiver<PlaybackStatus>,
) -> impl Stream<Item = Result<Event, std::convert::Infallible>> {
    let mut last: Option<StatusKey> = None;

    WatchStream::new(rx)
        .filter(move |status| {
            let key = StatusKey::of(status);
            let changed = last.as_ref() != Some(&key);
            last = Some(key);
            changed
        })
        .map(|status| {
            let data = serde_json::to_string(&status).unwrap_or_default();
            Ok(Event::default().event("status").data(data))
        })
}
