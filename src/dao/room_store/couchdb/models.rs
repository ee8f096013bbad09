use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::error::CouchDaoError;
use crate::{
    dao::models::{DeckEntity, RoomRecord},
    state::room::{Room, RoomCode},
};

pub const ROOM_PREFIX: &str = "room::";
pub const DECK_PREFIX: &str = "deck::";

pub fn room_doc_id(code: &RoomCode) -> String {
    format!("{ROOM_PREFIX}{code}")
}

pub fn deck_doc_id(user_id: &str) -> String {
    format!("{DECK_PREFIX}{user_id}")
}

/// Room record; `_rev` guards every write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchRoomDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub version: u64,
    pub state_json: Room,
    pub updated_at: SystemTime,
}

impl CouchRoomDocument {
    pub fn from_record(record: RoomRecord, rev: Option<String>) -> Self {
        Self {
            id: room_doc_id(&record.id),
            rev,
            version: record.version,
            state_json: record.state_json,
            updated_at: record.updated_at,
        }
    }

    pub fn try_into_record(self) -> Result<RoomRecord, CouchDaoError> {
        let code = self
            .id
            .strip_prefix(ROOM_PREFIX)
            .and_then(|raw| RoomCode::parse(raw).ok())
            .ok_or_else(|| CouchDaoError::InvalidDocId {
                doc_id: self.id.clone(),
            })?;
        Ok(RoomRecord {
            id: code,
            version: self.version,
            state_json: self.state_json,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDeckDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub user_id: String,
    pub characters: Vec<String>,
    pub cards: Vec<String>,
    pub updated_at: SystemTime,
}

impl CouchDeckDocument {
    pub fn from_entity(deck: DeckEntity, rev: Option<String>) -> Self {
        Self {
            id: deck_doc_id(&deck.user_id),
            rev,
            user_id: deck.user_id,
            characters: deck.characters,
            cards: deck.cards,
            updated_at: deck.updated_at,
        }
    }

    pub fn into_entity(self) -> DeckEntity {
        DeckEntity {
            user_id: self.user_id,
            characters: self.characters,
            cards: self.cards,
            updated_at: self.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_document_keeps_code_in_id() {
        let record = RoomRecord::new(Room::new(RoomCode::parse("couch7").unwrap()));
        let document = CouchRoomDocument::from_record(record.clone(), None);
        assert_eq!(document.id, "room::COUCH7");

        let json = serde_json::to_value(&document).unwrap();
        assert!(json.get("_rev").is_none());

        assert_eq!(document.try_into_record().unwrap(), record);
    }

    #[test]
    fn foreign_document_ids_are_rejected() {
        let record = RoomRecord::new(Room::new(RoomCode::parse("couch7").unwrap()));
        let mut document = CouchRoomDocument::from_record(record, Some("1-a".into()));
        document.id = "deck::someone".into();
        assert!(matches!(
            document.try_into_record(),
            Err(CouchDaoError::InvalidDocId { .. })
        ));
    }
}
