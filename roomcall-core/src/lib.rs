//! Roomcall - two-party call sessions over an external signaling relay
//!
//! This library models the client side of a minimal video-calling room:
//!
//! - **Room routing**: a landing activation creates a random room and
//!   navigates to it
//! - **Call session**: registers with a signaling relay, captures local
//!   media, and answers or places exactly one call at a time
//! - **Pluggable collaborators**: the relay, the capture device, navigation
//!   and the view are traits; negotiation and media transport stay outside
//!
//! The session core is a synchronous state machine ([`state::SessionState`])
//! driven by an async controller ([`session::CallSession`]).
//!
//! # Examples
//!
//! ```rust,no_run
//! use roomcall_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let relay = LoopbackRelay::new();
//! let config = SessionConfig::default();
//! let signaling = Arc::new(relay.client(config.event_capacity));
//!
//! let mut session = CallSession::new(
//!     signaling,
//!     Arc::new(SyntheticCapture::new()),
//!     Arc::new(TracingView),
//!     config,
//! );
//!
//! if session.activate().await == SessionPhase::ReadyIdle {
//!     let _ = session.dial("other-peer-id").await;
//! }
//! session.teardown().await;
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

/// Call session types and data structures
pub mod types;

/// Peer identity abstraction
pub mod identity;

/// Session configuration
pub mod config;

/// Media stream handles and capture
pub mod media;

/// Signaling relay seam
pub mod signaling;

/// Preview bindings and notices
pub mod view;

/// Room identifiers and routing
pub mod room;

/// Session state machine
pub mod state;

/// Session controller
pub mod session;

/// In-process relay for demos and tests
#[cfg(feature = "loopback")]
pub mod loopback;

// Re-export main types at crate root
pub use config::{SessionConfig, SignalingConfig};
pub use identity::{PeerIdentity, PeerIdentityString};
#[cfg(feature = "loopback")]
pub use loopback::{LoopbackRelay, LoopbackSignaling, RecordingView, SyntheticCapture};
pub use media::{MediaCapture, MediaError, MediaStream, MediaTrack};
pub use room::{Navigator, RoomError, RoomId, RoomRouter, Route};
pub use session::{CallSession, SessionCommand};
pub use signaling::{SignalingError, SignalingEvent, SignalingService};
pub use state::{DialError, Effect, SessionSnapshot, SessionState};
pub use types::*;
pub use view::{Notice, SessionView, TracingView};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{SessionConfig, SignalingConfig};
    pub use crate::identity::{PeerIdentity, PeerIdentityString};
    #[cfg(feature = "loopback")]
    pub use crate::loopback::{LoopbackRelay, LoopbackSignaling, RecordingView, SyntheticCapture};
    pub use crate::media::{MediaCapture, MediaStream};
    pub use crate::room::{Navigator, RoomId, RoomRouter, Route};
    pub use crate::session::{CallSession, SessionCommand};
    pub use crate::signaling::{SignalingEvent, SignalingService};
    pub use crate::state::{DialError, SessionSnapshot};
    pub use crate::types::{CallHandle, CallId, MediaConstraints, SessionPhase};
    pub use crate::view::{Notice, SessionView, TracingView};
}
