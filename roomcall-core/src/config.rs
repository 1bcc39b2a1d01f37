//! Session configuration

use crate::types::MediaConstraints;
use serde::{Deserialize, Serialize};

/// Where the signaling relay lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalingConfig {
    /// Relay host
    pub host: String,
    /// Relay port
    pub port: u16,
    /// Mount path of the relay
    pub path: String,
    /// Use TLS
    pub secure: bool,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9000,
            path: "/myapp".to_string(),
            secure: false,
        }
    }
}

impl SignalingConfig {
    /// Render the relay endpoint
    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{scheme}://{}:{}{path}", self.host, self.port)
    }
}

/// Call session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Relay endpoint
    pub signaling: SignalingConfig,
    /// What to capture locally
    pub constraints: MediaConstraints,
    /// Buffered relay events per client before the oldest are dropped
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            signaling: SignalingConfig::default(),
            constraints: MediaConstraints::video_call(),
            event_capacity: 256,
        }
    }
}

impl SessionConfig {
    /// Parse from JSON, filling missing fields with defaults
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_url() {
        assert_eq!(SignalingConfig::default().url(), "ws://localhost:9000/myapp");
    }

    #[test]
    fn test_secure_url_without_leading_slash() {
        let cfg = SignalingConfig {
            host: "0.peerjs.com".into(),
            port: 443,
            path: "peer".into(),
            secure: true,
        };
        assert_eq!(cfg.url(), "wss://0.peerjs.com:443/peer");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg = SessionConfig::from_json(r#"{"event_capacity": 8}"#).unwrap();
        assert_eq!(cfg.event_capacity, 8);
        assert_eq!(cfg.signaling, SignalingConfig::default());
        assert!(cfg.constraints.has_video());
    }
}
