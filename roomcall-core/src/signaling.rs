//! Signaling relay seam
//!
//! The relay assigns identities, delivers incoming calls and reports the
//! lifecycle of each call. Call negotiation and media transport happen on
//! the other side of this trait.

use crate::identity::PeerIdentity;
use crate::media::MediaStream;
use crate::types::{CallHandle, CallId};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

/// Signaling errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignalingError {
    /// Relay could not be reached
    #[error("Relay unreachable: {0}")]
    Unreachable(String),

    /// Connection to the relay dropped
    #[error("Disconnected from relay")]
    Disconnected,

    /// Relay connection was permanently closed
    #[error("Relay connection closed")]
    Closed,

    /// Operation needs a registered identity
    #[error("Not registered")]
    NotRegistered,

    /// Call not known to the relay
    #[error("Call not found: {0}")]
    CallNotFound(CallId),

    /// Transport error
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Events delivered by the relay
///
/// Events for one call arrive in the order the transport emits them. No
/// ordering holds between different calls or between calls and dial results.
#[derive(Debug, Clone)]
pub enum SignalingEvent<I: PeerIdentity> {
    /// A peer is calling us
    IncomingCall {
        /// The call to answer
        call: CallHandle<I>,
    },
    /// The remote stream of a call is available
    Stream {
        /// Call identifier
        call_id: CallId,
        /// Remote peer
        peer: I,
        /// Received tracks
        stream: MediaStream,
    },
    /// A call ended
    CallClosed {
        /// Call identifier
        call_id: CallId,
        /// Remote peer
        peer: I,
    },
    /// A call failed during negotiation or transport
    CallError {
        /// Call identifier
        call_id: CallId,
        /// Remote peer
        peer: I,
        /// Error description
        reason: String,
    },
    /// Relay connection lost
    Disconnected,
    /// Relay connection closed for good
    Closed,
}

impl<I: PeerIdentity> SignalingEvent<I> {
    /// Short label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            SignalingEvent::IncomingCall { .. } => "incoming_call",
            SignalingEvent::Stream { .. } => "stream",
            SignalingEvent::CallClosed { .. } => "call_closed",
            SignalingEvent::CallError { .. } => "call_error",
            SignalingEvent::Disconnected => "disconnected",
            SignalingEvent::Closed => "closed",
        }
    }
}

/// Signaling relay client
///
/// Implement this for your specific relay (hosted peer server, gossip, etc.).
#[async_trait]
pub trait SignalingService: Send + Sync {
    /// Peer identifier type
    type PeerId: PeerIdentity;

    /// Register with the relay and obtain a local identity
    async fn register(&self) -> Result<Self::PeerId, SignalingError>;

    /// Subscribe to relay events
    ///
    /// Subscribe before `register` so no event is missed.
    fn subscribe(&self) -> broadcast::Receiver<SignalingEvent<Self::PeerId>>;

    /// Answer an incoming call, sending the local stream
    async fn answer(
        &self,
        call: &CallHandle<Self::PeerId>,
        local: &MediaStream,
    ) -> Result<(), SignalingError>;

    /// Place a call
    ///
    /// Returns `Ok(None)` when the relay refuses to start the call, for
    /// example because the target is unknown.
    async fn dial(
        &self,
        target: &Self::PeerId,
        local: &MediaStream,
    ) -> Result<Option<CallHandle<Self::PeerId>>, SignalingError>;

    /// Close a call
    async fn hang_up(&self, call: &CallHandle<Self::PeerId>) -> Result<(), SignalingError>;

    /// Release the relay connection and every call on it
    async fn destroy(&self);
}
