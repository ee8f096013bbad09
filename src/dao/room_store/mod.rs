#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{DeckEntity, RoomRecord, SwapOutcome};
use crate::dao::storage::StorageResult;
use crate::state::room::{Room, RoomCode};
use futures::future::BoxFuture;

pub use memory::InMemoryRoomStore;

/// Abstraction over the persistence layer for room records and saved decks.
pub trait RoomStore: Send + Sync {
    fn load_room(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<Option<RoomRecord>>>;
    /// Insert `room` at version 1 unless a record already exists, in which case
    /// the stored record is returned untouched.
    fn create_room(&self, room: Room) -> BoxFuture<'static, StorageResult<RoomRecord>>;
    /// Replace the stored room only when its version still equals `expected_version`.
    fn compare_and_swap(
        &self,
        room: Room,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<SwapOutcome>>;
    fn find_deck(&self, user_id: String) -> BoxFuture<'static, StorageResult<Option<DeckEntity>>>;
    fn save_deck(&self, deck: DeckEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
