//! Call session state machine
//!
//! [`SessionState`] owns every piece of mutable session data and performs
//! no I/O. Each transition takes the event payload, updates the state and
//! returns the [`Effect`]s the driver must carry out against the relay,
//! the capture device and the view.
//!
//! The remote peer is never stored on its own: it is read off the active
//! call handle, so the two can't disagree and clearing the call clears the
//! peer in the same step.
//!
//! Single-call exclusivity is enforced at both ends of a call's life:
//!
//! - entry points (`on_incoming`, `check_dial`, `on_dialed`) refuse to take
//!   the slot while another peer holds it
//! - exit points (`on_stream`, `on_call_closed`, `on_call_error`) only act on
//!   events whose call id and peer match the current call

use crate::identity::PeerIdentity;
use crate::media::{MediaError, MediaStream};
use crate::signaling::SignalingError;
use crate::types::{CallHandle, CallId, SessionPhase};
use crate::view::Notice;
use serde::Serialize;
use thiserror::Error;

/// Reasons a dial is refused
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialError {
    /// No identity from the relay yet, or it was lost
    #[error("not connected to the signaling server")]
    NotRegistered,

    /// Local capture not available
    #[error("no local camera/microphone stream")]
    NoLocalMedia,

    /// Target was empty after trimming
    #[error("enter the peer ID of the user you want to call")]
    EmptyTarget,

    /// Target could not be parsed as an identity
    #[error("invalid peer ID: {0}")]
    InvalidTarget(String),

    /// Target is our own identity
    #[error("cannot call yourself")]
    SelfCall,

    /// Slot already taken
    #[error("already in a call with {0}")]
    AlreadyInCall(String),

    /// Relay refused to start the call
    #[error("{0}")]
    Refused(String),

    /// An incoming call took the slot while the dial was in flight
    #[error("call superseded by incoming call from {0}")]
    Superseded(String),
}

/// Side effect requested by a transition
#[derive(Debug, Clone)]
pub enum Effect<I: PeerIdentity> {
    /// Ask the capture device for audio and video
    RequestCapture,
    /// Bind or clear the local preview
    ShowLocal(Option<MediaStream>),
    /// Bind or clear the remote preview
    ShowRemote(Option<MediaStream>),
    /// Answer an incoming call with the local stream
    Answer {
        /// Call to answer
        call: CallHandle<I>,
        /// Stream to send
        local: MediaStream,
    },
    /// Close a call at the relay
    HangUp(CallHandle<I>),
    /// Show a notice
    Notify(Notice),
    /// Release the relay connection
    ReleaseSignaling,
}

/// Read-only view of the session for display and tests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Current phase
    pub phase: SessionPhase,
    /// Identity from the relay
    pub local_identity: Option<String>,
    /// Other party of the active call
    pub remote_peer: Option<String>,
    /// Active call id
    pub call_id: Option<CallId>,
    /// Local capture held
    pub has_local_media: bool,
    /// Remote stream bound
    pub has_remote_media: bool,
}

/// All mutable state of one room session
#[derive(Debug)]
pub struct SessionState<I: PeerIdentity> {
    phase: SessionPhase,
    local_identity: Option<I>,
    active_call: Option<CallHandle<I>>,
    local_stream: Option<MediaStream>,
    remote_stream: Option<MediaStream>,
}

impl<I: PeerIdentity> Default for SessionState<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: PeerIdentity> SessionState<I> {
    /// Fresh, unregistered session
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Unregistered,
            local_identity: None,
            active_call: None,
            local_stream: None,
            remote_stream: None,
        }
    }

    /// Current phase
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Identity from the relay, if registered
    pub fn local_identity(&self) -> Option<&I> {
        self.local_identity.as_ref()
    }

    /// Other party of the active call
    pub fn remote_peer(&self) -> Option<&I> {
        self.active_call.as_ref().map(|call| &call.peer)
    }

    /// Active call handle
    pub fn active_call(&self) -> Option<&CallHandle<I>> {
        self.active_call.as_ref()
    }

    /// Local capture
    pub fn local_stream(&self) -> Option<&MediaStream> {
        self.local_stream.as_ref()
    }

    /// Remote stream of the active call
    pub fn remote_stream(&self) -> Option<&MediaStream> {
        self.remote_stream.as_ref()
    }

    /// Snapshot for display
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            local_identity: self.local_identity.as_ref().map(|i| i.to_string_repr()),
            remote_peer: self.remote_peer().map(|p| p.to_string_repr()),
            call_id: self.active_call.as_ref().map(|c| c.id),
            has_local_media: self.local_stream.is_some(),
            has_remote_media: self.remote_stream.is_some(),
        }
    }

    fn set_phase(&mut self, new_state: SessionPhase) {
        if self.phase != new_state {
            tracing::debug!(old_state = ?self.phase, new_state = ?new_state, "Session state transition");
            self.phase = new_state;
        }
    }

    fn is_current(&self, call_id: CallId, peer: &I) -> bool {
        self.active_call
            .as_ref()
            .is_some_and(|call| call.id == call_id && &call.peer == peer)
    }

    /// Phase to return to once the call slot is empty again
    fn idle_phase(&self) -> SessionPhase {
        match self.phase {
            SessionPhase::CallPending | SessionPhase::InCall => SessionPhase::ReadyIdle,
            other => other,
        }
    }

    fn clear_call(&mut self) {
        self.active_call = None;
        if let Some(remote) = self.remote_stream.take() {
            remote.stop_all();
        }
        let next = self.idle_phase();
        self.set_phase(next);
    }

    // ------------------------------------------------------------------
    // Registration and capture
    // ------------------------------------------------------------------

    /// Relay assigned an identity
    pub fn on_registered(&mut self, identity: I) -> Vec<Effect<I>> {
        if self.phase != SessionPhase::Unregistered {
            tracing::warn!(phase = ?self.phase, %identity, "Ignoring registration outside Unregistered");
            return Vec::new();
        }
        tracing::info!(%identity, "Registered with relay");
        self.local_identity = Some(identity);
        self.set_phase(SessionPhase::RegisteredNoMedia);
        vec![Effect::RequestCapture]
    }

    /// Relay refused or could not be reached
    pub fn on_registration_failed(&mut self, error: &SignalingError) -> Vec<Effect<I>> {
        if self.phase != SessionPhase::Unregistered {
            return Vec::new();
        }
        tracing::error!(%error, "Registration failed");
        self.local_identity = None;
        self.set_phase(SessionPhase::Failed);
        vec![Effect::Notify(Notice::RegistrationFailed(error.to_string()))]
    }

    /// Capture granted
    pub fn on_media(&mut self, stream: MediaStream) -> Vec<Effect<I>> {
        match self.phase {
            SessionPhase::RegisteredNoMedia => {
                tracing::info!(stream_id = %stream.id, tracks = stream.tracks().len(), "Local media acquired");
                self.local_stream = Some(stream.clone());
                self.set_phase(SessionPhase::ReadyIdle);
                vec![Effect::ShowLocal(Some(stream))]
            }
            SessionPhase::TornDown => {
                // granted after teardown: nobody will release it later
                stream.stop_all();
                Vec::new()
            }
            _ => {
                tracing::warn!(phase = ?self.phase, "Holding late local media for teardown");
                if let Some(previous) = self.local_stream.replace(stream) {
                    previous.stop_all();
                }
                Vec::new()
            }
        }
    }

    /// Capture refused or unavailable
    pub fn on_media_failed(&mut self, error: &MediaError) -> Vec<Effect<I>> {
        if self.phase != SessionPhase::RegisteredNoMedia {
            return Vec::new();
        }
        tracing::error!(%error, "Local media unavailable");
        self.set_phase(SessionPhase::Failed);
        vec![Effect::Notify(Notice::MediaAccessDenied(error.to_string()))]
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// A peer is calling
    pub fn on_incoming(&mut self, call: CallHandle<I>) -> Vec<Effect<I>> {
        if !self.phase.accepts_inbound() {
            tracing::warn!(phase = ?self.phase, caller = %call.peer, "Ignoring incoming call");
            return Vec::new();
        }
        if self.local_identity.as_ref() == Some(&call.peer) {
            tracing::warn!(caller = %call.peer, "Ignoring incoming call from own identity");
            return Vec::new();
        }
        let Some(local) = self.local_stream.clone() else {
            tracing::warn!(caller = %call.peer, "Ignoring incoming call without local media");
            return Vec::new();
        };

        let mut effects = Vec::new();
        if let Some(current) = self.active_call.take() {
            if current.peer != call.peer {
                tracing::warn!(
                    caller = %call.peer,
                    current_peer = %current.peer,
                    "Busy, ignoring incoming call"
                );
                self.active_call = Some(current);
                return Vec::new();
            }
            // same peer calling again replaces its old call
            tracing::info!(caller = %call.peer, old_call_id = %current.id, "Replacing call from same peer");
            if let Some(remote) = self.remote_stream.take() {
                remote.stop_all();
            }
            effects.push(Effect::ShowRemote(None));
            effects.push(Effect::HangUp(current));
        }

        tracing::info!(call_id = %call.id, caller = %call.peer, "Answering incoming call");
        self.active_call = Some(call.clone());
        self.set_phase(SessionPhase::CallPending);
        effects.push(Effect::Answer { call, local });
        effects
    }

    /// Validate a user-typed dial target without touching any state
    ///
    /// # Errors
    ///
    /// Returns the first failed precondition, in this order: registration,
    /// local media, empty target, unparseable target, self-call, busy.
    pub fn check_dial(&self, target: &str) -> Result<I, DialError> {
        let local = self
            .local_identity
            .as_ref()
            .ok_or(DialError::NotRegistered)?;
        if self.local_stream.is_none() {
            return Err(DialError::NoLocalMedia);
        }
        let target = target.trim();
        if target.is_empty() {
            return Err(DialError::EmptyTarget);
        }
        let target =
            I::from_string_repr(target).map_err(|e| DialError::InvalidTarget(e.to_string()))?;
        if &target == local {
            return Err(DialError::SelfCall);
        }
        if let Some(peer) = self.remote_peer() {
            return Err(DialError::AlreadyInCall(peer.to_string_repr()));
        }
        Ok(target)
    }

    /// Relay started an outbound call
    ///
    /// Re-validates the slot: an incoming call may have been answered while
    /// the dial was in flight, in which case the new handle is hung up.
    pub fn on_dialed(&mut self, call: CallHandle<I>) -> Vec<Effect<I>> {
        if self.phase != SessionPhase::ReadyIdle || self.active_call.is_some() {
            tracing::warn!(
                phase = ?self.phase,
                call_id = %call.id,
                target = %call.peer,
                "Dial completed after slot changed, hanging up"
            );
            let mut effects = Vec::new();
            if let Some(current) = self.remote_peer() {
                effects.push(Effect::Notify(Notice::Busy(
                    DialError::Superseded(current.to_string_repr()).to_string(),
                )));
            }
            effects.push(Effect::HangUp(call));
            return effects;
        }

        tracing::info!(call_id = %call.id, target = %call.peer, "Outbound call pending");
        self.active_call = Some(call);
        self.set_phase(SessionPhase::CallPending);
        Vec::new()
    }

    /// Relay refused to start the call
    pub fn on_dial_failed(&mut self, target: &I, reason: &str) -> Vec<Effect<I>> {
        tracing::warn!(%target, reason, "Dial failed");
        vec![Effect::Notify(Notice::DialFailed(format!(
            "{reason}. The peer ID {target} might be invalid or unreachable"
        )))]
    }

    /// Remote stream of a call arrived
    pub fn on_stream(&mut self, call_id: CallId, peer: &I, stream: MediaStream) -> Vec<Effect<I>> {
        if !self.is_current(call_id, peer) {
            tracing::warn!(%call_id, %peer, "Ignoring stream from stale call");
            stream.stop_all();
            return Vec::new();
        }
        tracing::info!(%call_id, %peer, "Remote stream received");
        if let Some(previous) = self.remote_stream.replace(stream.clone()) {
            if !previous.same_stream(&stream) {
                previous.stop_all();
            }
        }
        if self.phase == SessionPhase::CallPending {
            self.set_phase(SessionPhase::InCall);
        }
        vec![Effect::ShowRemote(Some(stream))]
    }

    /// A call ended
    pub fn on_call_closed(&mut self, call_id: CallId, peer: &I) -> Vec<Effect<I>> {
        if !self.is_current(call_id, peer) {
            tracing::debug!(%call_id, %peer, "Ignoring close of stale call");
            return Vec::new();
        }
        tracing::info!(%call_id, %peer, "Call closed");
        self.clear_call();
        vec![Effect::ShowRemote(None)]
    }

    /// A call failed
    pub fn on_call_error(&mut self, call_id: CallId, peer: &I, reason: &str) -> Vec<Effect<I>> {
        if !self.is_current(call_id, peer) {
            tracing::debug!(%call_id, %peer, reason, "Ignoring error of stale call");
            return Vec::new();
        }
        tracing::error!(%call_id, %peer, reason, "Call error");
        self.clear_call();
        vec![
            Effect::ShowRemote(None),
            Effect::Notify(Notice::CallFailed(reason.to_string())),
        ]
    }

    // ------------------------------------------------------------------
    // Session end
    // ------------------------------------------------------------------

    /// Relay connection lost or closed. No reconnection is attempted.
    pub fn on_signaling_lost(&mut self, reason: &str) -> Vec<Effect<I>> {
        if self.phase == SessionPhase::TornDown {
            return Vec::new();
        }
        if self.phase == SessionPhase::Failed && self.local_identity.is_none() {
            tracing::debug!(reason, "Signaling loss on already failed session");
            return Vec::new();
        }
        tracing::error!(reason, "Signaling connection lost");
        self.local_identity = None;
        self.set_phase(SessionPhase::Failed);
        vec![Effect::Notify(Notice::SignalingLost(reason.to_string()))]
    }

    /// Relay events were dropped before they reached the session
    ///
    /// A lost close or error would leave the call slot held forever, so
    /// the active call is hung up and cleared before the session fails.
    pub fn on_events_dropped(&mut self, skipped: u64) -> Vec<Effect<I>> {
        if self.phase == SessionPhase::TornDown {
            return Vec::new();
        }
        tracing::error!(skipped, "Relay events dropped");
        let mut effects = Vec::new();
        if let Some(call) = self.active_call.clone() {
            self.clear_call();
            effects.push(Effect::HangUp(call));
            effects.push(Effect::ShowRemote(None));
        }
        effects.extend(self.on_signaling_lost("relay events dropped"));
        effects
    }

    /// Release everything. A second call returns no effects.
    pub fn teardown(&mut self) -> Vec<Effect<I>> {
        if self.phase == SessionPhase::TornDown {
            return Vec::new();
        }
        tracing::info!(phase = ?self.phase, "Tearing down session");
        if let Some(local) = self.local_stream.take() {
            local.stop_all();
        }
        if let Some(remote) = self.remote_stream.take() {
            remote.stop_all();
        }
        self.active_call = None;
        self.local_identity = None;
        self.set_phase(SessionPhase::TornDown);
        vec![
            Effect::ShowRemote(None),
            Effect::ShowLocal(None),
            Effect::ReleaseSignaling,
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::identity::PeerIdentityString;
    use crate::types::MediaConstraints;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> PeerIdentityString {
        PeerIdentityString::new(s)
    }

    fn ready(identity: &str) -> SessionState<PeerIdentityString> {
        let mut state = SessionState::new();
        state.on_registered(id(identity));
        state.on_media(MediaStream::from_constraints(&MediaConstraints::video_call()));
        state
    }

    fn remote_stream() -> MediaStream {
        MediaStream::from_constraints(&MediaConstraints::video_call())
    }

    #[test]
    fn test_registration_requests_capture() {
        let mut state = SessionState::new();
        let effects = state.on_registered(id("P1"));
        assert!(matches!(effects.as_slice(), [Effect::RequestCapture]));
        assert_eq!(state.phase(), SessionPhase::RegisteredNoMedia);
    }

    #[test]
    fn test_registration_failure_is_fatal() {
        let mut state = SessionState::<PeerIdentityString>::new();
        let effects = state.on_registration_failed(&SignalingError::Unreachable("refused".into()));
        assert_eq!(state.phase(), SessionPhase::Failed);
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notify(Notice::RegistrationFailed(_))]
        ));
        assert_eq!(state.check_dial("P2"), Err(DialError::NotRegistered));
    }

    #[test]
    fn test_media_failure_is_fatal() {
        let mut state = SessionState::new();
        state.on_registered(id("P1"));
        let effects = state.on_media_failed(&MediaError::PermissionDenied("camera".into()));
        assert_eq!(state.phase(), SessionPhase::Failed);
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notify(Notice::MediaAccessDenied(_))]
        ));
        assert_eq!(state.check_dial("P2"), Err(DialError::NoLocalMedia));
    }

    #[test]
    fn test_ready_after_media() {
        let state = ready("P1");
        assert_eq!(state.phase(), SessionPhase::ReadyIdle);
        assert!(state.remote_peer().is_none());
        assert!(state.local_stream().is_some());
    }

    #[test]
    fn test_incoming_ignored_before_ready() {
        let mut state = SessionState::new();
        state.on_registered(id("P1"));
        let effects = state.on_incoming(CallHandle::inbound(id("P2")));
        assert!(effects.is_empty());
        assert!(state.remote_peer().is_none());
    }

    #[test]
    fn test_incoming_answered_when_idle() {
        let mut state = ready("P1");
        let call = CallHandle::inbound(id("P2"));
        let effects = state.on_incoming(call.clone());
        assert_eq!(state.phase(), SessionPhase::CallPending);
        assert_eq!(state.remote_peer(), Some(&id("P2")));
        assert!(matches!(effects.as_slice(), [Effect::Answer { call: c, .. }] if c.id == call.id));

        state.on_stream(call.id, &id("P2"), remote_stream());
        assert_eq!(state.phase(), SessionPhase::InCall);
    }

    #[test]
    fn test_incoming_from_other_peer_ignored_while_busy() {
        let mut state = ready("P1");
        let target = state.check_dial("P2").unwrap();
        state.on_dialed(CallHandle::outbound(target));
        let before = state.snapshot();

        let effects = state.on_incoming(CallHandle::inbound(id("P3")));
        assert!(effects.is_empty());
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn test_incoming_from_self_ignored() {
        let mut state = ready("P1");
        assert!(state.on_incoming(CallHandle::inbound(id("P1"))).is_empty());
        assert!(state.remote_peer().is_none());
    }

    #[test]
    fn test_incoming_from_same_peer_replaces_call() {
        let mut state = ready("P1");
        let first = CallHandle::inbound(id("P2"));
        state.on_incoming(first.clone());
        let second = CallHandle::inbound(id("P2"));
        let effects = state.on_incoming(second.clone());

        assert_eq!(state.active_call().map(|c| c.id), Some(second.id));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::HangUp(c) if c.id == first.id)));

        // late close of the replaced call changes nothing
        state.on_call_closed(first.id, &id("P2"));
        assert_eq!(state.active_call().map(|c| c.id), Some(second.id));
    }

    #[test]
    fn test_dial_preconditions() {
        let mut state = SessionState::<PeerIdentityString>::new();
        assert_eq!(state.check_dial("P2"), Err(DialError::NotRegistered));
        state.on_registered(id("P1"));
        assert_eq!(state.check_dial("P2"), Err(DialError::NoLocalMedia));
        state.on_media(remote_stream());
        assert_eq!(state.check_dial("   "), Err(DialError::EmptyTarget));
        assert_eq!(state.check_dial(" P1 "), Err(DialError::SelfCall));
        assert_eq!(state.check_dial(" P2 "), Ok(id("P2")));

        state.on_dialed(CallHandle::outbound(id("P2")));
        assert_eq!(
            state.check_dial("P3"),
            Err(DialError::AlreadyInCall("P2".into()))
        );
    }

    #[test]
    fn test_dial_flow_reaches_in_call() {
        let mut state = ready("P1");
        let call = CallHandle::outbound(state.check_dial("P2").unwrap());
        assert!(state.on_dialed(call.clone()).is_empty());
        assert_eq!(state.phase(), SessionPhase::CallPending);
        assert_eq!(state.remote_peer(), Some(&id("P2")));

        let effects = state.on_stream(call.id, &id("P2"), remote_stream());
        assert_eq!(state.phase(), SessionPhase::InCall);
        assert!(matches!(effects.as_slice(), [Effect::ShowRemote(Some(_))]));
    }

    #[test]
    fn test_late_dial_is_hung_up() {
        let mut state = ready("P1");
        let target = state.check_dial("P2").unwrap();
        // incoming call lands while the dial is in flight
        let inbound = CallHandle::inbound(id("P3"));
        state.on_incoming(inbound.clone());

        let outbound = CallHandle::outbound(target);
        let effects = state.on_dialed(outbound.clone());
        assert_eq!(state.active_call().map(|c| c.id), Some(inbound.id));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::HangUp(c) if c.id == outbound.id)));
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Notify(Notice::Busy(_)))));
    }

    #[test]
    fn test_close_returns_to_idle() {
        let mut state = ready("P1");
        let call = CallHandle::outbound(id("P2"));
        state.on_dialed(call.clone());
        let stream = remote_stream();
        state.on_stream(call.id, &id("P2"), stream.clone());

        let effects = state.on_call_closed(call.id, &id("P2"));
        assert!(matches!(effects.as_slice(), [Effect::ShowRemote(None)]));
        assert_eq!(state.phase(), SessionPhase::ReadyIdle);
        assert!(state.remote_peer().is_none());
        assert!(state.remote_stream().is_none());
        assert_eq!(stream.live_track_count(), 0);
    }

    #[test]
    fn test_error_returns_to_idle_with_notice() {
        let mut state = ready("P1");
        let call = CallHandle::outbound(id("P2"));
        state.on_dialed(call.clone());
        let effects = state.on_call_error(call.id, &id("P2"), "negotiation failed");
        assert_eq!(state.phase(), SessionPhase::ReadyIdle);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::Notify(Notice::CallFailed(r)) if r == "negotiation failed")));
    }

    #[test]
    fn test_stale_events_do_not_touch_current_call() {
        let mut state = ready("P1");
        let current = CallHandle::outbound(id("P2"));
        state.on_dialed(current.clone());
        let before = state.snapshot();

        let stale = CallId::new();
        assert!(state.on_call_closed(stale, &id("P2")).is_empty());
        assert!(state.on_call_error(stale, &id("P3"), "boom").is_empty());
        assert!(state.on_stream(stale, &id("P2"), remote_stream()).is_empty());
        // right id, wrong peer
        assert!(state.on_call_closed(current.id, &id("P3")).is_empty());
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn test_signaling_lost_clears_identity() {
        let mut state = ready("P1");
        let effects = state.on_signaling_lost("disconnected");
        assert_eq!(state.phase(), SessionPhase::Failed);
        assert!(state.local_identity().is_none());
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notify(Notice::SignalingLost(_))]
        ));
        // only one notice for a burst of disruption events
        assert!(state.on_signaling_lost("closed").is_empty());
        assert!(state.on_incoming(CallHandle::inbound(id("P2"))).is_empty());
    }

    #[test]
    fn test_call_close_after_signaling_loss_keeps_failed() {
        let mut state = ready("P1");
        let call = CallHandle::outbound(id("P2"));
        state.on_dialed(call.clone());
        state.on_signaling_lost("closed");
        state.on_call_closed(call.id, &id("P2"));
        assert_eq!(state.phase(), SessionPhase::Failed);
        assert!(state.remote_peer().is_none());
    }

    #[test]
    fn test_dropped_events_release_call_and_fail() {
        let mut state = ready("P1");
        let call = CallHandle::outbound(id("P2"));
        state.on_dialed(call.clone());
        let remote = remote_stream();
        state.on_stream(call.id, &id("P2"), remote.clone());

        let effects = state.on_events_dropped(3);
        assert_eq!(state.phase(), SessionPhase::Failed);
        assert!(state.remote_peer().is_none());
        assert_eq!(remote.live_track_count(), 0);
        assert!(matches!(
            effects.as_slice(),
            [
                Effect::HangUp(hung),
                Effect::ShowRemote(None),
                Effect::Notify(Notice::SignalingLost(_))
            ] if hung.id == call.id
        ));
        // later callers are not turned away as busy with a dead call
        assert!(state.on_incoming(CallHandle::inbound(id("P3"))).is_empty());
        assert!(state.remote_peer().is_none());
    }

    #[test]
    fn test_dropped_events_after_teardown_are_ignored() {
        let mut state = ready("P1");
        state.teardown();
        assert!(state.on_events_dropped(1).is_empty());
        assert_eq!(state.phase(), SessionPhase::TornDown);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut state = ready("P1");
        let local = state.local_stream().cloned().unwrap();
        let call = CallHandle::outbound(id("P2"));
        state.on_dialed(call.clone());
        let remote = remote_stream();
        state.on_stream(call.id, &id("P2"), remote.clone());

        let effects = state.teardown();
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::ReleaseSignaling)));
        assert_eq!(local.live_track_count(), 0);
        assert_eq!(remote.live_track_count(), 0);
        assert_eq!(state.phase(), SessionPhase::TornDown);

        assert!(state.teardown().is_empty());
    }

    #[test]
    fn test_teardown_with_nothing_acquired() {
        let mut state = SessionState::<PeerIdentityString>::new();
        assert_eq!(state.teardown().len(), 3);
        assert!(state.teardown().is_empty());
    }

    #[test]
    fn test_media_granted_after_teardown_is_stopped() {
        let mut state = SessionState::new();
        state.on_registered(id("P1"));
        state.teardown();
        let late = remote_stream();
        assert!(state.on_media(late.clone()).is_empty());
        assert_eq!(late.live_track_count(), 0);
    }
}
