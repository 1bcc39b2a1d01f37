//! In-process relay, synthetic capture and a recording view
//!
//! [`LoopbackRelay`] plays the external signaling service for any number of
//! clients living in the same process. Used by the CLI demo and the tests.

use crate::identity::PeerIdentityString;
use crate::media::{MediaCapture, MediaError, MediaStream, MediaTrack};
use crate::signaling::{SignalingError, SignalingEvent, SignalingService};
use crate::types::{CallDirection, CallHandle, CallId, MediaConstraints};
use crate::view::{Notice, SessionView};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

type Event = SignalingEvent<PeerIdentityString>;

struct CallRecord {
    caller: PeerIdentityString,
    callee: PeerIdentityString,
    caller_stream: MediaStream,
}

#[derive(Default)]
struct RelayInner {
    clients: HashMap<PeerIdentityString, broadcast::Sender<Event>>,
    calls: HashMap<CallId, CallRecord>,
    offline: bool,
}

impl RelayInner {
    fn send(&self, to: &PeerIdentityString, event: Event) {
        if let Some(tx) = self.clients.get(to) {
            // no receivers just means the client stopped listening
            let _ = tx.send(event);
        }
    }

    /// Remove a call and tell both ends it closed
    fn close_call(&mut self, call_id: CallId) -> bool {
        let Some(record) = self.calls.remove(&call_id) else {
            return false;
        };
        self.send(
            &record.caller,
            SignalingEvent::CallClosed {
                call_id,
                peer: record.callee.clone(),
            },
        );
        self.send(
            &record.callee,
            SignalingEvent::CallClosed {
                call_id,
                peer: record.caller.clone(),
            },
        );
        true
    }
}

/// A stream as seen by the receiving side: same kinds, independent tracks
fn received(stream: &MediaStream) -> MediaStream {
    MediaStream::new(
        stream
            .tracks()
            .iter()
            .filter(|t| t.is_live())
            .map(|t| MediaTrack::new(t.kind))
            .collect(),
    )
}

/// In-process signaling relay
#[derive(Clone, Default)]
pub struct LoopbackRelay {
    inner: Arc<Mutex<RelayInner>>,
}

impl LoopbackRelay {
    /// Empty relay
    pub fn new() -> Self {
        Self::default()
    }

    /// Client that gets a random identity on registration
    pub fn client(&self, event_capacity: usize) -> LoopbackSignaling {
        LoopbackSignaling::new(self.clone(), None, event_capacity)
    }

    /// Client that registers under a fixed identity
    pub fn client_with_id(&self, id: impl Into<String>, event_capacity: usize) -> LoopbackSignaling {
        LoopbackSignaling::new(
            self.clone(),
            Some(PeerIdentityString::new(id)),
            event_capacity,
        )
    }

    /// Make registrations fail with `Unreachable`
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Identities currently registered
    pub fn registered(&self) -> Vec<PeerIdentityString> {
        self.inner.lock().clients.keys().cloned().collect()
    }

    /// Number of calls the relay is carrying
    pub fn active_calls(&self) -> usize {
        self.inner.lock().calls.len()
    }

    /// Drop a client's connection without unregistering it
    pub fn disconnect(&self, id: &PeerIdentityString) {
        self.inner.lock().send(id, SignalingEvent::Disconnected);
    }

    /// Fail a call on both ends
    pub fn fail_call(&self, call_id: CallId, reason: &str) -> bool {
        let mut inner = self.inner.lock();
        let Some(record) = inner.calls.remove(&call_id) else {
            return false;
        };
        inner.send(
            &record.caller,
            SignalingEvent::CallError {
                call_id,
                peer: record.callee.clone(),
                reason: reason.to_string(),
            },
        );
        inner.send(
            &record.callee,
            SignalingEvent::CallError {
                call_id,
                peer: record.caller.clone(),
                reason: reason.to_string(),
            },
        );
        true
    }
}

/// One client's connection to a [`LoopbackRelay`]
pub struct LoopbackSignaling {
    relay: LoopbackRelay,
    requested_id: Option<PeerIdentityString>,
    identity: Mutex<Option<PeerIdentityString>>,
    events: broadcast::Sender<Event>,
}

impl LoopbackSignaling {
    fn new(
        relay: LoopbackRelay,
        requested_id: Option<PeerIdentityString>,
        event_capacity: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            relay,
            requested_id,
            identity: Mutex::new(None),
            events,
        }
    }

    /// Identity assigned on registration
    pub fn identity(&self) -> Option<PeerIdentityString> {
        self.identity.lock().clone()
    }

    fn registered_identity(&self) -> Result<PeerIdentityString, SignalingError> {
        self.identity().ok_or(SignalingError::NotRegistered)
    }
}

#[async_trait]
impl SignalingService for LoopbackSignaling {
    type PeerId = PeerIdentityString;

    async fn register(&self) -> Result<Self::PeerId, SignalingError> {
        let mut inner = self.relay.inner.lock();
        if inner.offline {
            return Err(SignalingError::Unreachable("relay offline".to_string()));
        }
        let id = self
            .requested_id
            .clone()
            .unwrap_or_else(|| PeerIdentityString::new(uuid::Uuid::new_v4().to_string()));
        if inner.clients.contains_key(&id) {
            return Err(SignalingError::TransportError(format!(
                "identity {id} is taken"
            )));
        }
        inner.clients.insert(id.clone(), self.events.clone());
        *self.identity.lock() = Some(id.clone());
        tracing::debug!(%id, "Loopback client registered");
        Ok(id)
    }

    fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    async fn answer(
        &self,
        call: &CallHandle<Self::PeerId>,
        local: &MediaStream,
    ) -> Result<(), SignalingError> {
        let me = self.registered_identity()?;
        let inner = self.relay.inner.lock();
        let record = inner
            .calls
            .get(&call.id)
            .ok_or(SignalingError::CallNotFound(call.id))?;
        if record.callee != me {
            return Err(SignalingError::CallNotFound(call.id));
        }
        inner.send(
            &record.caller,
            SignalingEvent::Stream {
                call_id: call.id,
                peer: record.callee.clone(),
                stream: received(local),
            },
        );
        inner.send(
            &record.callee,
            SignalingEvent::Stream {
                call_id: call.id,
                peer: record.caller.clone(),
                stream: received(&record.caller_stream),
            },
        );
        Ok(())
    }

    async fn dial(
        &self,
        target: &Self::PeerId,
        local: &MediaStream,
    ) -> Result<Option<CallHandle<Self::PeerId>>, SignalingError> {
        let me = self.registered_identity()?;
        let mut inner = self.relay.inner.lock();
        if !inner.clients.contains_key(target) {
            tracing::debug!(%target, "Loopback dial to unknown peer");
            return Ok(None);
        }
        let outbound = CallHandle::outbound(target.clone());
        let inbound = CallHandle {
            id: outbound.id,
            peer: me.clone(),
            direction: CallDirection::Inbound,
        };
        inner.calls.insert(
            outbound.id,
            CallRecord {
                caller: me,
                callee: target.clone(),
                caller_stream: local.clone(),
            },
        );
        inner.send(target, SignalingEvent::IncomingCall { call: inbound });
        Ok(Some(outbound))
    }

    async fn hang_up(&self, call: &CallHandle<Self::PeerId>) -> Result<(), SignalingError> {
        if self.relay.inner.lock().close_call(call.id) {
            Ok(())
        } else {
            Err(SignalingError::CallNotFound(call.id))
        }
    }

    async fn destroy(&self) {
        let Some(me) = self.identity.lock().take() else {
            return;
        };
        let mut inner = self.relay.inner.lock();
        let mine: Vec<CallId> = inner
            .calls
            .iter()
            .filter(|(_, r)| r.caller == me || r.callee == me)
            .map(|(id, _)| *id)
            .collect();
        for call_id in mine {
            inner.close_call(call_id);
        }
        inner.clients.remove(&me);
        tracing::debug!(id = %me, "Loopback client destroyed");
    }
}

/// Capture device that hands out synthetic live tracks
#[derive(Default)]
pub struct SyntheticCapture {
    deny: bool,
    issued: Mutex<Vec<MediaStream>>,
}

impl SyntheticCapture {
    /// Capture that always grants access
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture that always refuses access
    pub fn denied() -> Self {
        Self {
            deny: true,
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Live tracks across every stream handed out
    pub fn live_tracks(&self) -> usize {
        self.issued.lock().iter().map(|s| s.live_track_count()).sum()
    }
}

#[async_trait]
impl MediaCapture for SyntheticCapture {
    async fn request_capture(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, MediaError> {
        if self.deny {
            return Err(MediaError::PermissionDenied(
                "camera and microphone blocked".to_string(),
            ));
        }
        if constraints.to_media_types().is_empty() {
            return Err(MediaError::ConfigError("nothing to capture".to_string()));
        }
        let stream = MediaStream::from_constraints(constraints);
        self.issued.lock().push(stream.clone());
        Ok(stream)
    }
}

#[derive(Default)]
struct ViewRecord {
    local: Option<MediaStream>,
    remote: Option<MediaStream>,
    notices: Vec<Notice>,
}

/// View that remembers its bindings and notices
#[derive(Default)]
pub struct RecordingView {
    record: Mutex<ViewRecord>,
}

impl RecordingView {
    /// Empty view
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream bound to the local preview
    pub fn local(&self) -> Option<MediaStream> {
        self.record.lock().local.clone()
    }

    /// Stream bound to the remote preview
    pub fn remote(&self) -> Option<MediaStream> {
        self.record.lock().remote.clone()
    }

    /// Notices shown so far
    pub fn notices(&self) -> Vec<Notice> {
        self.record.lock().notices.clone()
    }
}

impl SessionView for RecordingView {
    fn show_local(&self, stream: Option<&MediaStream>) {
        self.record.lock().local = stream.cloned();
    }

    fn show_remote(&self, stream: Option<&MediaStream>) {
        self.record.lock().remote = stream.cloned();
    }

    fn notify(&self, notice: &Notice) {
        tracing::info!(%notice, "Notice");
        self.record.lock().notices.push(notice.clone());
    }
}

impl std::fmt::Debug for LoopbackRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LoopbackRelay")
            .field("clients", &inner.clients.len())
            .field("calls", &inner.calls.len())
            .field("offline", &inner.offline)
            .finish()
    }
}
