//! Peer identity abstraction
//!
//! Identities are opaque strings handed out by the signaling relay. The
//! session is generic over the identity type so a relay with a richer
//! addressing scheme can plug in its own type.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Trait for peer identity in the call session
///
/// Implementations must be comparable (self-call and stale-event checks
/// depend on equality) and round-trip through their string form, since
/// dial targets arrive as user-typed text.
pub trait PeerIdentity:
    Clone + Debug + Display + PartialEq + Eq + Hash + Send + Sync + 'static
{
    /// Convert the identity to a string representation
    fn to_string_repr(&self) -> String;

    /// Try to create an identity from a string representation
    fn from_string_repr(s: &str) -> anyhow::Result<Self>
    where
        Self: Sized;

    /// Short form for display next to a video feed
    fn short(&self) -> String {
        self.to_string_repr().chars().take(6).collect()
    }
}

/// Simple string-based peer identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerIdentityString(pub String);

impl PeerIdentityString {
    /// Create a new string-based peer identity
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PeerIdentityString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PeerIdentity for PeerIdentityString {
    fn to_string_repr(&self) -> String {
        self.0.clone()
    }

    fn from_string_repr(s: &str) -> anyhow::Result<Self> {
        if s.is_empty() {
            anyhow::bail!("peer identity cannot be empty");
        }
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for PeerIdentityString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerIdentityString {
    fn from(s: String) -> Self {
        Self(s)
    }
}
