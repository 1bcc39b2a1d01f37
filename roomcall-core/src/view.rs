//! Presentation seam: preview bindings and user-facing notices

use crate::media::MediaStream;
use serde::{Deserialize, Serialize};
use std::fmt;

/// User-facing notice
///
/// Each notice carries a short human-readable cause. Fatal notices leave the
/// session unusable until the page is reloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    /// Camera/microphone capture refused or unavailable
    MediaAccessDenied(String),
    /// Relay did not hand out an identity
    RegistrationFailed(String),
    /// Relay connection lost or closed mid-session
    SignalingLost(String),
    /// Dial rejected before anything was sent
    DialRejected(String),
    /// Relay refused to start the call
    DialFailed(String),
    /// Another call took the slot while a dial was in flight
    Busy(String),
    /// Active or pending call failed
    CallFailed(String),
}

impl Notice {
    /// Whether the session needs a reload after this notice
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Notice::MediaAccessDenied(_) | Notice::RegistrationFailed(_) | Notice::SignalingLost(_)
        )
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::MediaAccessDenied(cause) => write!(
                f,
                "Failed to access camera/microphone ({cause}). Please allow access and reload."
            ),
            Notice::RegistrationFailed(cause) => write!(
                f,
                "Could not register with the signaling server ({cause}). Please reload."
            ),
            Notice::SignalingLost(cause) => write!(
                f,
                "Signaling connection lost ({cause}). Please reload to continue."
            ),
            Notice::DialRejected(cause) => write!(f, "Cannot call: {cause}"),
            Notice::DialFailed(cause) => write!(f, "Failed to initiate call: {cause}"),
            Notice::Busy(cause) => write!(f, "Line busy: {cause}"),
            Notice::CallFailed(cause) => write!(f, "Call failed: {cause}"),
        }
    }
}

/// Where the session shows its feeds and notices
pub trait SessionView: Send + Sync {
    /// Bind the local preview
    fn show_local(&self, stream: Option<&MediaStream>);

    /// Bind the remote preview. `None` clears it.
    fn show_remote(&self, stream: Option<&MediaStream>);

    /// Surface a notice to the user
    fn notify(&self, notice: &Notice);
}

/// View that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingView;

impl SessionView for TracingView {
    fn show_local(&self, stream: Option<&MediaStream>) {
        tracing::info!(stream = ?stream.map(|s| s.id.as_str()), "Local preview bound");
    }

    fn show_remote(&self, stream: Option<&MediaStream>) {
        tracing::info!(stream = ?stream.map(|s| s.id.as_str()), "Remote preview bound");
    }

    fn notify(&self, notice: &Notice) {
        if notice.is_fatal() {
            tracing::error!("{notice}");
        } else {
            tracing::warn!("{notice}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notice_fatality() {
        assert!(Notice::SignalingLost("closed".into()).is_fatal());
        assert!(Notice::MediaAccessDenied("denied".into()).is_fatal());
        assert!(!Notice::CallFailed("ice".into()).is_fatal());
        assert!(!Notice::DialRejected("busy".into()).is_fatal());
    }

    #[test]
    fn test_notice_display() {
        let n = Notice::DialRejected("cannot call yourself".into());
        assert_eq!(n.to_string(), "Cannot call: cannot call yourself");
    }
}
