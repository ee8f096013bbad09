use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use super::error::{MongoDaoError, MongoResult};
use crate::{
    dao::models::{DeckEntity, RoomRecord},
    state::room::RoomCode,
};

/// Room record as stored in the `rooms` collection. The room aggregate is kept
/// as a JSON string so its shape can evolve without schema migrations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub version: i64,
    pub state_json: String,
    pub updated_at: DateTime,
}

impl TryFrom<&RoomRecord> for MongoRoomDocument {
    type Error = MongoDaoError;

    fn try_from(value: &RoomRecord) -> MongoResult<Self> {
        let state_json =
            serde_json::to_string(&value.state_json).map_err(|source| MongoDaoError::Encode {
                id: value.id.to_string(),
                source,
            })?;
        Ok(Self {
            id: value.id.to_string(),
            version: i64::try_from(value.version).unwrap_or(i64::MAX),
            state_json,
            updated_at: DateTime::from_system_time(value.updated_at),
        })
    }
}

impl TryFrom<MongoRoomDocument> for RoomRecord {
    type Error = MongoDaoError;

    fn try_from(value: MongoRoomDocument) -> MongoResult<Self> {
        let decode = |message: String| MongoDaoError::Decode {
            id: value.id.clone(),
            message,
        };
        let id = RoomCode::parse(&value.id).map_err(|err| decode(err.to_string()))?;
        let state_json = serde_json::from_str(&value.state_json)
            .map_err(|err| decode(err.to_string()))?;
        let version = u64::try_from(value.version).map_err(|err| decode(err.to_string()))?;
        Ok(Self {
            id,
            version,
            state_json,
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

/// Saved deck, one document per user in the `decks` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDeckDocument {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub characters: Vec<String>,
    pub cards: Vec<String>,
    pub updated_at: DateTime,
}

impl From<DeckEntity> for MongoDeckDocument {
    fn from(value: DeckEntity) -> Self {
        Self {
            user_id: value.user_id,
            characters: value.characters,
            cards: value.cards,
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoDeckDocument> for DeckEntity {
    fn from(value: MongoDeckDocument) -> Self {
        Self {
            user_id: value.user_id,
            characters: value.characters,
            cards: value.cards,
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::room::Room;

    #[test]
    fn room_document_round_trips() {
        let record = RoomRecord::new(Room::new(RoomCode::parse("MONGO1").unwrap()));
        let document = MongoRoomDocument::try_from(&record).unwrap();
        assert_eq!(document.id, "MONGO1");
        assert_eq!(document.version, 1);

        let back = RoomRecord::try_from(document).unwrap();
        assert_eq!(back.state_json, record.state_json);
        assert_eq!(back.version, 1);
    }

    #[test]
    fn garbage_state_is_a_decode_error() {
        let document = MongoRoomDocument {
            id: "MONGO1".into(),
            version: 3,
            state_json: "{not json".into(),
            updated_at: DateTime::now(),
        };
        assert!(matches!(
            RoomRecord::try_from(document),
            Err(MongoDaoError::Decode { .. })
        ));
    }
}
