use std::{sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::doc,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoDeckDocument, MongoRoomDocument, doc_id},
};
use crate::{
    dao::{
        models::{DeckEntity, RoomRecord, SwapOutcome},
        room_store::RoomStore,
        storage::StorageResult,
    },
    state::room::{Room, RoomCode},
};

const ROOM_COLLECTION_NAME: &str = "rooms";
const DECK_COLLECTION_NAME: &str = "decks";
const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Owns the connection pool backing `database`.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = establish_connection(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = establish_connection(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.rooms().await;
        let index = IndexModel::builder()
            .keys(doc! {"updated_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("room_updated_at_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROOM_COLLECTION_NAME,
                index: "updated_at",
                source,
            })?;

        Ok(())
    }

    async fn rooms(&self) -> Collection<MongoRoomDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
    }

    async fn decks(&self) -> Collection<MongoDeckDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoDeckDocument>(DECK_COLLECTION_NAME)
    }

    async fn load_room(&self, code: &RoomCode) -> MongoResult<Option<RoomRecord>> {
        let collection = self.rooms().await;
        let document = collection
            .find_one(doc_id(code.as_str()))
            .await
            .map_err(|source| MongoDaoError::LoadRoom {
                id: code.to_string(),
                source,
            })?;

        document.map(RoomRecord::try_from).transpose()
    }

    async fn create_room(&self, room: Room) -> MongoResult<RoomRecord> {
        let record = RoomRecord::new(room);
        let document = MongoRoomDocument::try_from(&record)?;
        let collection = self.rooms().await;

        match collection.insert_one(&document).await {
            Ok(_) => Ok(record),
            Err(err) if is_duplicate_key(&err) => {
                debug!(room = %record.id, "room already exists, loading it");
                self.load_room(&record.id)
                    .await?
                    .ok_or_else(|| MongoDaoError::RoomVanished {
                        id: record.id.to_string(),
                    })
            }
            Err(source) => Err(MongoDaoError::CreateRoom {
                id: record.id.to_string(),
                source,
            }),
        }
    }

    async fn compare_and_swap(&self, room: Room, expected_version: u64) -> MongoResult<SwapOutcome> {
        let code = room.id.clone();
        let record = RoomRecord {
            id: code.clone(),
            version: expected_version + 1,
            state_json: room,
            updated_at: SystemTime::now(),
        };
        let document = MongoRoomDocument::try_from(&record)?;
        let expected = i64::try_from(expected_version).unwrap_or(i64::MAX);

        let collection = self.rooms().await;
        let result = collection
            .replace_one(doc! {"_id": code.as_str(), "version": expected}, &document)
            .await
            .map_err(|source| MongoDaoError::SaveRoom {
                id: code.to_string(),
                source,
            })?;

        if result.matched_count == 1 {
            return Ok(SwapOutcome::Committed {
                version: record.version,
            });
        }

        let current_version = self.load_room(&code).await?.map(|current| current.version);
        Ok(SwapOutcome::Conflict { current_version })
    }

    async fn find_deck(&self, user_id: String) -> MongoResult<Option<DeckEntity>> {
        let collection = self.decks().await;
        let document = collection
            .find_one(doc_id(&user_id))
            .await
            .map_err(|source| MongoDaoError::LoadDeck {
                user: user_id.clone(),
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn save_deck(&self, deck: DeckEntity) -> MongoResult<()> {
        let user = deck.user_id.clone();
        let document: MongoDeckDocument = deck.into();
        let collection = self.decks().await;
        collection
            .replace_one(doc_id(&user), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveDeck { user, source })?;
        Ok(())
    }
}

impl RoomStore for MongoRoomStore {
    fn load_room(&self, code: RoomCode) -> BoxFuture<'static, StorageResult<Option<RoomRecord>>> {
        let store = self.clone();
        Box::pin(async move { store.load_room(&code).await.map_err(Into::into) })
    }

    fn create_room(&self, room: Room) -> BoxFuture<'static, StorageResult<RoomRecord>> {
        let store = self.clone();
        Box::pin(async move { store.create_room(room).await.map_err(Into::into) })
    }

    fn compare_and_swap(
        &self,
        room: Room,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<SwapOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .compare_and_swap(room, expected_version)
                .await
                .map_err(Into::into)
        })
    }

    fn find_deck(&self, user_id: String) -> BoxFuture<'static, StorageResult<Option<DeckEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_deck(user_id).await.map_err(Into::into) })
    }

    fn save_deck(&self, deck: DeckEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_deck(deck).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
