use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to load room `{id}`")]
    LoadRoom {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to create room `{id}`")]
    CreateRoom {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to save room `{id}`")]
    SaveRoom {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("room `{id}` vanished while resolving a duplicate insert")]
    RoomVanished { id: String },
    #[error("failed to load deck of `{user}`")]
    LoadDeck {
        user: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to save deck of `{user}`")]
    SaveDeck {
        user: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to encode room `{id}`")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("room document `{id}` is not a valid room: {message}")]
    Decode { id: String, message: String },
}
