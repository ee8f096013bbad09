use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::state::room::{Room, RoomCode};

/// Versioned room record as persisted by every store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomRecord {
    /// Normalised room code, also the primary key.
    pub id: RoomCode,
    /// Monotonic write counter. A freshly created room is at version 1.
    pub version: u64,
    /// Full room aggregate.
    pub state_json: Room,
    /// Time of the last successful write.
    pub updated_at: SystemTime,
}

impl RoomRecord {
    /// Wrap a brand new room at version 1.
    pub fn new(room: Room) -> Self {
        Self {
            id: room.id.clone(),
            version: 1,
            state_json: room,
            updated_at: SystemTime::now(),
        }
    }
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// Write applied; the record now carries `version`.
    Committed {
        /// Version stamped on the stored record.
        version: u64,
    },
    /// Another writer got there first.
    Conflict {
        /// Version currently stored, when known.
        current_version: Option<u64>,
    },
}

/// Deck a player saved for future matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeckEntity {
    /// Owner of the deck.
    pub user_id: String,
    /// Character codes fielded at match start.
    pub characters: Vec<String>,
    /// Support and event codes forming the draw pile.
    pub cards: Vec<String>,
    /// Last time the deck was saved.
    pub updated_at: SystemTime,
}
