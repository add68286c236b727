//! Streaming progress API: follow a session's state as it changes.
//!
//! Built on the tracker's `watch` channel, so a slow consumer never blocks
//! the pipeline. Intermediate states may be coalesced; the consumer always
//! sees the latest one, and percent never goes backwards between items.
//! The stream ends right after the first terminal state it yields.

use crate::state::ProcessingState;
use futures::future;
use futures::stream::StreamExt;
use std::pin::Pin;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

/// A boxed stream of state snapshots.
pub type StateStream = Pin<Box<dyn Stream<Item = ProcessingState> + Send>>;

/// Wrap a tracker receiver. The current state is yielded first.
pub fn state_stream(rx: watch::Receiver<ProcessingState>) -> StateStream {
    Box::pin(WatchStream::new(rx).scan(false, |finished, state| {
        if *finished {
            return future::ready(None);
        }
        *finished = state.status.is_terminal();
        future::ready(Some(state))
    }))
}

/// Drain `stream` and return the terminal state, if one arrived.
pub async fn wait_terminal(mut stream: StateStream) -> Option<ProcessingState> {
    let mut last = None;
    while let Some(state) = stream.next().await {
        last = Some(state);
    }
    last.filter(|s| s.status.is_terminal())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SessionId;
    use crate::state::{Phase, ProgressTracker, Status};

    #[tokio::test]
    async fn ends_after_terminal_state() {
        let tracker = ProgressTracker::new(SessionId::new("s"));
        let stream = state_stream(tracker.subscribe());

        let producer = tracker.clone();
        tokio::spawn(async move {
            producer.start(2).unwrap();
            producer.set_phase(Phase::Generating).unwrap();
            producer.record_batch(true).unwrap();
            producer.record_batch(true).unwrap();
            producer.complete().unwrap();
        });

        let states: Vec<_> = stream.collect().await;
        let last = states.last().unwrap();
        assert_eq!(last.status, Status::Completed);
        assert_eq!(last.percent, 100);
        assert!(states.windows(2).all(|w| w[0].percent <= w[1].percent));
    }

    #[tokio::test]
    async fn already_terminal_yields_once() {
        let tracker = ProgressTracker::new(SessionId::new("s"));
        tracker.fail("boom").unwrap();
        let state = wait_terminal(state_stream(tracker.subscribe())).await.unwrap();
        assert_eq!(state.status, Status::Failed);
        assert_eq!(state.error_message.as_deref(), Some("boom"));
    }
}
