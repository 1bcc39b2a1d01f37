//! Call session types and data structures

use crate::identity::PeerIdentity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub Uuid);

impl CallId {
    /// Create a new random call ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Media constraints for local capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    /// Enable audio
    pub audio: bool,
    /// Enable video
    pub video: bool,
}

impl MediaConstraints {
    /// Audio-only capture
    pub fn audio_only() -> Self {
        Self {
            audio: true,
            video: false,
        }
    }

    /// Video capture with audio
    pub fn video_call() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }

    /// Check if audio is enabled
    pub fn has_audio(&self) -> bool {
        self.audio
    }

    /// Check if video is enabled
    pub fn has_video(&self) -> bool {
        self.video
    }

    /// Convert to media types
    pub fn to_media_types(&self) -> Vec<MediaType> {
        let mut types = Vec::new();
        if self.audio {
            types.push(MediaType::Audio);
        }
        if self.video {
            types.push(MediaType::Video);
        }
        types
    }
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self::video_call()
    }
}

/// Types of media in a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

/// Who placed the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    /// Answered an incoming call
    Inbound,
    /// Dialed by the local user
    Outbound,
}

/// Handle to one negotiated connection with a remote peer
///
/// The relay hands these out for incoming calls and returns one from a
/// successful dial. Per-call events carry the `id` so the session can tell
/// the current call apart from a superseded one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallHandle<I: PeerIdentity> {
    /// Call identifier
    pub id: CallId,
    /// The other party
    pub peer: I,
    /// Inbound or outbound
    pub direction: CallDirection,
}

impl<I: PeerIdentity> CallHandle<I> {
    /// Handle for a call the relay is delivering to us
    pub fn inbound(peer: I) -> Self {
        Self {
            id: CallId::new(),
            peer,
            direction: CallDirection::Inbound,
        }
    }

    /// Handle for a call we placed
    pub fn outbound(peer: I) -> Self {
        Self {
            id: CallId::new(),
            peer,
            direction: CallDirection::Outbound,
        }
    }
}

/// Session lifecycle phase
///
/// ```text
///  Unregistered ──register──► RegisteredNoMedia ──capture──► ReadyIdle
///       │                           │                     ▲     │
///       ▼                           ▼          close/error│     │ dial / answer
///     Failed ◄──────── signaling lost ────────────┐       │     ▼
///                                                 └── InCall ◄─ CallPending
///                                                    (stream)
///  any ──teardown──► TornDown
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Waiting for the relay to assign an identity
    Unregistered,
    /// Identity assigned, local capture pending
    RegisteredNoMedia,
    /// Ready to dial or answer
    ReadyIdle,
    /// Call dialed or answered, remote stream not yet received
    CallPending,
    /// Remote stream flowing
    InCall,
    /// Session unusable until reload
    Failed,
    /// Resources released
    TornDown,
}

impl SessionPhase {
    /// Whether inbound calls are accepted in this phase
    pub fn accepts_inbound(&self) -> bool {
        matches!(
            self,
            SessionPhase::ReadyIdle | SessionPhase::CallPending | SessionPhase::InCall
        )
    }

    /// Whether the session has a call slot occupied
    pub fn is_in_call(&self) -> bool {
        matches!(self, SessionPhase::CallPending | SessionPhase::InCall)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionPhase::Unregistered => "unregistered",
            SessionPhase::RegisteredNoMedia => "registered",
            SessionPhase::ReadyIdle => "ready",
            SessionPhase::CallPending => "call pending",
            SessionPhase::InCall => "in call",
            SessionPhase::Failed => "failed",
            SessionPhase::TornDown => "torn down",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::identity::PeerIdentityString;

    #[test]
    fn test_call_id_unique() {
        assert_ne!(CallId::new(), CallId::new());
    }

    #[test]
    fn test_media_constraints() {
        let c = MediaConstraints::default();
        assert!(c.has_audio());
        assert!(c.has_video());
        assert_eq!(c.to_media_types(), vec![MediaType::Audio, MediaType::Video]);
        assert_eq!(
            MediaConstraints::audio_only().to_media_types(),
            vec![MediaType::Audio]
        );
    }

    #[test]
    fn test_call_handle_direction() {
        let a = CallHandle::inbound(PeerIdentityString::new("P2"));
        let b = CallHandle::outbound(PeerIdentityString::new("P2"));
        assert_eq!(a.direction, CallDirection::Inbound);
        assert_eq!(b.direction, CallDirection::Outbound);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_phase_predicates() {
        assert!(!SessionPhase::RegisteredNoMedia.accepts_inbound());
        assert!(SessionPhase::ReadyIdle.accepts_inbound());
        assert!(!SessionPhase::Failed.accepts_inbound());
        assert!(SessionPhase::CallPending.is_in_call());
        assert!(!SessionPhase::ReadyIdle.is_in_call());
        assert_eq!(SessionPhase::InCall.to_string(), "in call");
    }
}
