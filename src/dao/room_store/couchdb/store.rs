use std::{sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    dao::{
        models::{DeckEntity, RoomRecord, SwapOutcome},
        room_store::RoomStore,
        storage::StorageResult,
    },
    state::room::{Room, RoomCode},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchDeckDocument, CouchRoomDocument, deck_doc_id, room_doc_id},
};

#[derive(Clone)]
pub struct CouchRoomStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchRoomStore {
    /// Connect to CouchDB and create the database when it is missing.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            database: Arc::from(config.database),
            auth: config
                .credentials
                .map(|(user, pass)| (Arc::<str>::from(user), Arc::<str>::from(pass))),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some((user, pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.database_url(), path);
        self.authorize(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                // 412: another instance created it first
                if create.status().is_success() || create.status() == StatusCode::PRECONDITION_FAILED
                {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    /// PUT a document. Returns `false` when CouchDB rejects the `_rev` (409).
    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<bool>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(false),
            status if status.is_success() => Ok(true),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn load_room(&self, code: &RoomCode) -> CouchResult<Option<RoomRecord>> {
        self.get_document::<CouchRoomDocument>(&room_doc_id(code))
            .await?
            .map(CouchRoomDocument::try_into_record)
            .transpose()
    }

    async fn create_room(&self, room: Room) -> CouchResult<RoomRecord> {
        let record = RoomRecord::new(room);
        let doc_id = room_doc_id(&record.id);
        let document = CouchRoomDocument::from_record(record.clone(), None);

        if self.put_document(&doc_id, &document).await? {
            return Ok(record);
        }
        debug!(room = %record.id, "room already exists, loading it");
        self.load_room(&record.id)
            .await?
            .ok_or(CouchDaoError::RoomVanished { doc_id })
    }

    async fn compare_and_swap(&self, room: Room, expected_version: u64) -> CouchResult<SwapOutcome> {
        let doc_id = room_doc_id(&room.id);
        let Some(current) = self.get_document::<CouchRoomDocument>(&doc_id).await? else {
            return Ok(SwapOutcome::Conflict {
                current_version: None,
            });
        };
        if current.version != expected_version {
            return Ok(SwapOutcome::Conflict {
                current_version: Some(current.version),
            });
        }

        let record = RoomRecord {
            id: room.id.clone(),
            version: expected_version + 1,
            state_json: room,
            updated_at: SystemTime::now(),
        };
        let version = record.version;
        let document = CouchRoomDocument::from_record(record, current.rev);
        if self.put_document(&doc_id, &document).await? {
            return Ok(SwapOutcome::Committed { version });
        }

        let current_version = self
            .get_document::<CouchRoomDocument>(&doc_id)
            .await?
            .map(|doc| doc.version);
        Ok(SwapOutcome::Conflict { current_version })
    }

    async fn save_deck(&self, deck: DeckEntity) -> CouchResult<()> {
        let doc_id = deck_doc_id(&deck.user_id);
        let rev = self
            .get_document::<CouchDeckDocument>(&doc_id)
            .await?
            .and_then(|existing| existing.rev);
        let document = CouchDeckDocument::from_entity(deck, rev);
        if self.put_document(&doc_id, &document).await? {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id,
                status: StatusCode::CONFLICT,
            })
        }
    }
}

impl RoomStore for CouchRoomStore {
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
        Box::pin(async move {
            let doc = store
                .get_document::<CouchDeckDocument>(&deck_doc_id(&user_id))
                .await?;
            Ok(doc.map(CouchDeckDocument::into_entity))
        })
    }

    fn save_deck(&self, deck: DeckEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_deck(deck).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authorize(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
