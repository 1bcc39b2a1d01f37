//! Media stream handles and the capture seam
//!
//! A [`MediaStream`] is a cheap, shareable handle to a set of tracks. Clones
//! refer to the same tracks, so stopping a track through one clone stops it
//! for the local preview and the active call alike.

use crate::types::{MediaConstraints, MediaType};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Media-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// User or platform refused access to the devices
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Device not found
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Nothing to capture
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// One audio or video track
#[derive(Debug, Clone)]
pub struct MediaTrack {
    /// Track identifier
    pub id: String,
    /// Audio or video
    pub kind: MediaType,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    /// Create a live track
    pub fn new(kind: MediaType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether the track is still producing media
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Stop the track. Stopping an ended track is a no-op.
    pub fn stop(&self) {
        if self.live.swap(false, Ordering::AcqRel) {
            tracing::trace!(track_id = %self.id, kind = ?self.kind, "Track stopped");
        }
    }
}

/// A set of tracks captured locally or received from a peer
#[derive(Debug, Clone)]
pub struct MediaStream {
    /// Stream identifier
    pub id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    /// Create a stream over the given tracks
    pub fn new(tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tracks,
        }
    }

    /// Create a stream with one live track per requested media type
    pub fn from_constraints(constraints: &MediaConstraints) -> Self {
        Self::new(
            constraints
                .to_media_types()
                .into_iter()
                .map(MediaTrack::new)
                .collect(),
        )
    }

    /// All tracks, live or ended
    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    /// Number of tracks still live
    pub fn live_track_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }

    /// Stop every track
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    /// Whether two handles refer to the same underlying stream
    pub fn same_stream(&self, other: &MediaStream) -> bool {
        self.id == other.id
    }
}

/// Local device capture
///
/// Implement this over the platform's camera/microphone API.
#[async_trait]
pub trait MediaCapture: Send + Sync {
    /// Ask for a live stream matching the constraints
    async fn request_capture(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, MediaError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_from_constraints() {
        let stream = MediaStream::from_constraints(&MediaConstraints::video_call());
        assert_eq!(stream.tracks().len(), 2);
        assert_eq!(stream.live_track_count(), 2);
    }

    #[test]
    fn test_stop_is_shared_between_clones() {
        let stream = MediaStream::from_constraints(&MediaConstraints::video_call());
        let shared = stream.clone();
        assert!(shared.same_stream(&stream));

        stream.stop_all();
        assert_eq!(shared.live_track_count(), 0);

        // stopping twice is fine
        shared.stop_all();
        assert_eq!(stream.live_track_count(), 0);
    }

    #[test]
    fn test_media_error_display() {
        let err = MediaError::PermissionDenied("camera".to_string());
        assert_eq!(err.to_string(), "Permission denied: camera");
    }
}
