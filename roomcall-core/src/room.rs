//! Room identifiers and routing
//!
//! A room is a client-side naming convention only: a random identifier in
//! the path, with no grouping on the relay.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Routing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// Room id is empty or spans more than one path segment
    #[error("Invalid room id: {0:?}")]
    InvalidRoomId(String),
}

/// Opaque room identifier
///
/// New rooms get a random UUID v4, but any single path segment names a
/// room, so hand-written links such as `/room/standup` work too.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Create a new random room ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The identifier as it appears in the path
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the room view
    pub fn path(&self) -> String {
        format!("/room/{}", self.0)
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RoomId {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.contains('/') {
            return Err(RoomError::InvalidRoomId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

/// Resolved view for a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/`: creates a room and redirects
    Landing,
    /// `/room/:roomId`
    Room(RoomId),
    /// Anything else
    NotFound,
}

impl Route {
    /// Resolve a path
    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return Route::Landing;
        }
        let mut segments = trimmed.trim_start_matches('/').split('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some("room"), Some(id), None) => id.parse().map_or(Route::NotFound, Route::Room),
            _ => Route::NotFound,
        }
    }
}

/// Navigation seam
pub trait Navigator: Send + Sync {
    /// Move to the given path
    fn navigate_to(&self, path: &str);
}

/// Landing view controller: creates a room once and redirects to it
pub struct RoomRouter<N: Navigator> {
    navigator: N,
    room: Option<RoomId>,
}

impl<N: Navigator> RoomRouter<N> {
    /// Create a router for one landing activation
    pub fn new(navigator: N) -> Self {
        Self {
            navigator,
            room: None,
        }
    }

    /// Generate the room and navigate to it
    ///
    /// Repeated calls return the same room without navigating again.
    pub fn activate(&mut self) -> RoomId {
        if let Some(room) = &self.room {
            return room.clone();
        }
        let room = RoomId::new();
        tracing::info!(room_id = %room, "Created room");
        self.navigator.navigate_to(&room.path());
        self.room = Some(room.clone());
        room
    }

    /// Room created by this activation, if any
    pub fn room(&self) -> Option<&RoomId> {
        self.room.as_ref()
    }

    /// The navigation collaborator
    pub fn navigator(&self) -> &N {
        &self.navigator
    }
}
