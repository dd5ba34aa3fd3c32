//! Frame dispatch into the mirrored state.
//!
//! The [`Dispatcher`] is the single writer of the mirror. It decodes each
//! inbound frame before taking the write lock, so a bad frame never blocks
//! readers, and every decode failure is counted and logged instead of
//! being surfaced to the caller's event loop.

use std::sync::Arc;

use pcapsync_protocol::{
    DecodeError, DecodeErrorKind, DecodeResult, Event, EventFamily, decode_frame,
};
use serde::Serialize;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, trace, warn};

use crate::state::{MirroredState, Snapshot};

/// Shared mirrored state.
pub type SharedState = Arc<RwLock<MirroredState>>;

/// Read-only view of the mirror, handed to UI collaborators.
#[derive(Debug, Clone)]
pub struct StateReader {
    state: SharedState,
}

impl StateReader {
    /// Locks the mirror for reading.
    pub async fn read(&self) -> RwLockReadGuard<'_, MirroredState> {
        self.state.read().await
    }

    /// Returns a copy of the current mirror.
    pub async fn snapshot(&self) -> MirroredState {
        self.state.read().await.clone()
    }
}

/// Counters for accepted and dropped frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameStats {
    pub accepted: u64,
    pub malformed_frame: u64,
    pub unknown_envelope: u64,
    pub unrecognized_variant: u64,
    pub invalid_payload: u64,
}

impl FrameStats {
    pub fn record_accepted(&mut self) {
        self.accepted += 1;
    }

    pub fn record_drop(&mut self, kind: DecodeErrorKind) {
        *self.counter_mut(kind) += 1;
    }

    /// Returns the number of frames dropped for the given reason.
    pub fn dropped(&self, kind: DecodeErrorKind) -> u64 {
        match kind {
            DecodeErrorKind::MalformedFrame => self.malformed_frame,
            DecodeErrorKind::UnknownEnvelope => self.unknown_envelope,
            DecodeErrorKind::UnrecognizedVariant => self.unrecognized_variant,
            DecodeErrorKind::InvalidPayload => self.invalid_payload,
        }
    }

    /// Returns the number of frames dropped for any reason.
    pub fn total_dropped(&self) -> u64 {
        DecodeErrorKind::ALL.iter().map(|kind| self.dropped(*kind)).sum()
    }

    fn counter_mut(&mut self, kind: DecodeErrorKind) -> &mut u64 {
        match kind {
            DecodeErrorKind::MalformedFrame => &mut self.malformed_frame,
            DecodeErrorKind::UnknownEnvelope => &mut self.unknown_envelope,
            DecodeErrorKind::UnrecognizedVariant => &mut self.unrecognized_variant,
            DecodeErrorKind::InvalidPayload => &mut self.invalid_payload,
        }
    }
}

/// Routes decoded events to the mirror.
#[derive(Debug, Default)]
pub struct Dispatcher {
    state: SharedState,
    stats: FrameStats,
}

impl Dispatcher {
    /// Creates a dispatcher over an empty, disconnected mirror.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher over an existing mirror.
    pub fn with_state(state: MirroredState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            stats: FrameStats::default(),
        }
    }

    /// Returns a read-only handle to the mirror.
    pub fn reader(&self) -> StateReader {
        StateReader {
            state: self.state.clone(),
        }
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Decodes one frame and applies it.
    ///
    /// A failed decode leaves the mirror untouched. The error is returned
    /// for inspection only; callers should keep reading frames.
    pub async fn handle_frame(&mut self, frame: &str) -> DecodeResult<()> {
        match decode_frame(frame) {
            Ok(event) => {
                self.stats.record_accepted();
                self.dispatch(event).await;
                Ok(())
            }
            Err(err) => {
                self.stats.record_drop(err.kind());
                log_drop(&err);
                Err(err)
            }
        }
    }

    /// Applies an already validated event and returns the region it touched.
    pub async fn dispatch(&self, event: Event) -> EventFamily {
        let kind = event.kind();
        let region = self.state.write().await.apply(event);
        trace!(event_type = %kind, region = %region, "event applied");
        region
    }

    /// Replaces the mirror with a freshly fetched snapshot.
    pub async fn bootstrap(&self, snapshot: Snapshot) {
        debug!(
            tags = snapshot.tags.len(),
            converters = snapshot.converters.len(),
            "applying bootstrap snapshot"
        );
        self.state.write().await.bootstrap(snapshot);
    }

    /// Clears the mirror after the connection is lost.
    pub async fn disconnect(&self) {
        self.state.write().await.reset();
    }
}

fn log_drop(err: &DecodeError) {
    match err {
        DecodeError::UnrecognizedVariant { event_type } => {
            debug!(event_type = %event_type, "ignoring event of unknown type");
        }
        other => {
            warn!(kind = %other.kind(), error = %other, "dropping frame");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcapsync_core::TagInfo;

    const TAG_ADDED: &str = r##"{"Type":"tagAdded","Tag":{"Name":"service/http","Definition":"dport:80","Color":"#ff0000","MatchingCount":3,"UncertainCount":0,"Referenced":false,"Converters":[]}}"##;

    #[tokio::test]
    async fn accepted_frame_updates_state() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.handle_frame(TAG_ADDED).await.unwrap();

        let reader = dispatcher.reader();
        let state = reader.read().await;
        assert_eq!(state.tag("service/http").unwrap().matching_count, 3);
        assert_eq!(dispatcher.stats().accepted, 1);
    }

    #[tokio::test]
    async fn dropped_frames_are_counted_and_leave_state_alone() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.handle_frame(TAG_ADDED).await.unwrap();
        let before = dispatcher.reader().snapshot().await;

        let frames = [
            "not json",
            "[]",
            r#"{"Type":"futureEventKind","Foo":1}"#,
            r#"{"Type":"tagAdded","Tag":{"Name":"x"}}"#,
        ];
        for frame in frames {
            assert!(dispatcher.handle_frame(frame).await.is_err());
        }

        assert_eq!(dispatcher.reader().snapshot().await, before);
        let stats = dispatcher.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.dropped(DecodeErrorKind::MalformedFrame), 1);
        assert_eq!(stats.dropped(DecodeErrorKind::UnknownEnvelope), 1);
        assert_eq!(stats.dropped(DecodeErrorKind::UnrecognizedVariant), 1);
        assert_eq!(stats.dropped(DecodeErrorKind::InvalidPayload), 1);
        assert_eq!(stats.total_dropped(), 4);
    }

    #[tokio::test]
    async fn dispatch_reports_region() {
        let dispatcher = Dispatcher::new();
        let region = dispatcher
            .dispatch(Event::WebhooksUpdated {
                webhooks: vec!["hook".into()],
            })
            .await;
        assert_eq!(region, EventFamily::Webhooks);
    }

    #[tokio::test]
    async fn bootstrap_then_disconnect() {
        let dispatcher = Dispatcher::new();
        dispatcher
            .bootstrap(Snapshot {
                tags: vec![TagInfo::new("a", "", "")],
                ..Snapshot::default()
            })
            .await;
        let reader = dispatcher.reader();
        assert!(reader.read().await.connected());

        dispatcher.disconnect().await;
        let state = reader.snapshot().await;
        assert!(!state.connected());
        assert!(state.tags().is_empty());
    }

    #[test]
    fn frame_stats_serialize() {
        let mut stats = FrameStats::default();
        stats.record_accepted();
        stats.record_drop(DecodeErrorKind::InvalidPayload);
        insta::assert_json_snapshot!(stats, @r#"
        {
          "accepted": 1,
          "malformed_frame": 0,
          "unknown_envelope": 0,
          "unrecognized_variant": 0,
          "invalid_payload": 1
        }
        "#);
    }
}
