/// Saved deck retrieval and validation.
pub mod deck_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Action dispatch onto the room state machine.
pub mod room_service;
/// Durable storage connection supervisor.
pub mod storage_supervisor;
