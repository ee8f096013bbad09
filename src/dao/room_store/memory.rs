use std::{sync::Arc, time::SystemTime};

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::{
    dao::{
        models::{DeckEntity, RoomRecord, SwapOutcome},
        room_store::RoomStore,
        storage::StorageResult,
    },
    state::room::{Room, RoomCode},
};

/// Process-local store. Consistent within one process only.
#[derive(Clone, Default)]
pub struct InMemoryRoomStore {
    rooms: Arc<DashMap<RoomCode, RoomRecord>>,
    decks: Arc<DashMap<String, DeckEntity>>,
}

impl InMemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(&self, code: &RoomCode) -> Option<RoomRecord> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    fn create(&self, room: Room) -> RoomRecord {
        self.rooms
            .entry(room.id.clone())
            .or_insert_with(|| RoomRecord::new(room))
            .value()
            .clone()
    }

    /// The shard lock held by `get_mut` makes compare and write a single step.
    fn swap(&self, room: Room, expected_version: u64) -> SwapOutcome {
        let Some(mut entry) = self.rooms.get_mut(&room.id) else {
            return SwapOutcome::Conflict {
                current_version: None,
            };
        };
        if entry.version != expected_version {
            return SwapOutcome::Conflict {
                current_version: Some(entry.version),
            };
        }
        entry.version += 1;
        entry.state_json = room;
        entry.updated_at = SystemTime::now();
        SwapOutcome::Committed {
            version: entry.version,
        }
    }
}

impl RoomStore for InMemoryRoomStore {
    fn load_room(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<Option<RoomRecord>>> {
        let record = self.load(&code);
        Box::pin(async move { Ok(record) })
    }

    fn create_room(&self, room: Room) -> BoxFuture<'static, StorageResult<RoomRecord>> {
        let record = self.create(room);
        Box::pin(async move { Ok(record) })
    }

    fn compare_and_swap(
        &self,
        room: Room,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<SwapOutcome>> {
        let outcome = self.swap(room, expected_version);
        Box::pin(async move { Ok(outcome) })
    }

    fn find_deck(&self, user_id: String) -> BoxFuture<'static, StorageResult<Option<DeckEntity>>> {
        let deck = self.decks.get(&user_id).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(deck) })
    }

    fn save_deck(&self, deck: DeckEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.decks.insert(deck.user_id.clone(), deck);
        Box::pin(async { Ok(()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(code: &str) -> Room {
        Room::new(RoomCode::parse(code).unwrap())
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let store = InMemoryRoomStore::new();
        let first = store.create_room(room("abc123")).await.unwrap();
        assert_eq!(first.version, 1);

        let mut changed = room("ABC123");
        changed.ready.a = true;
        let second = store.create_room(changed).await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn swap_requires_matching_version() {
        let store = InMemoryRoomStore::new();
        let code = RoomCode::parse("ROOM1").unwrap();
        store.create_room(room("ROOM1")).await.unwrap();

        let mut next = room("ROOM1");
        next.ready.b = true;
        assert_eq!(
            store.compare_and_swap(next.clone(), 1).await.unwrap(),
            SwapOutcome::Committed { version: 2 }
        );
        assert_eq!(
            store.compare_and_swap(next.clone(), 1).await.unwrap(),
            SwapOutcome::Conflict {
                current_version: Some(2)
            }
        );

        let stored = store.load_room(code).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert!(stored.state_json.ready.b);
    }

    #[tokio::test]
    async fn swap_on_missing_room_conflicts() {
        let store = InMemoryRoomStore::new();
        assert_eq!(
            store.compare_and_swap(room("GHOST"), 1).await.unwrap(),
            SwapOutcome::Conflict {
                current_version: None
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_swaps_commit_once_per_version() {
        let store = InMemoryRoomStore::new();
        store.create_room(room("RACE")).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.compare_and_swap(room("RACE"), 1).await })
            })
            .collect();

        let mut committed = 0;
        for handle in handles {
            if let SwapOutcome::Committed { .. } = handle.await.unwrap().unwrap() {
                committed += 1;
            }
        }
        assert_eq!(committed, 1);
    }

    #[tokio::test]
    async fn decks_are_upserted_per_user() {
        let store = InMemoryRoomStore::new();
        assert!(store.find_deck("u1".into()).await.unwrap().is_none());
        let deck = DeckEntity {
            user_id: "u1".into(),
            characters: vec!["CH-EMBER".into()],
            cards: vec![],
            updated_at: SystemTime::now(),
        };
        store.save_deck(deck.clone()).await.unwrap();
        assert_eq!(store.find_deck("u1".into()).await.unwrap(), Some(deck));
    }
}
