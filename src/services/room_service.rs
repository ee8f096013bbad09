use std::collections::HashMap;

use tracing::{info, warn};

use crate::{
    dao::{
        models::{DeckEntity, RoomRecord},
        room_store::RoomStore,
        storage::StorageError,
    },
    dto::{
        action::{ActionResponse, UserView},
        room::RoomView,
    },
    error::ServiceError,
    state::{
        SharedState,
        room::{PlayerIdentity, RoomCode},
        state_machine::{MatchContext, RoomAction},
        transitions::run_room_transition,
    },
};

/// Route one client action to the room state machine and project the result
/// for the caller.
pub async fn dispatch(
    state: &SharedState,
    user: &PlayerIdentity,
    action: RoomAction,
    code: Option<RoomCode>,
) -> Result<ActionResponse, ServiceError> {
    if action == RoomAction::Hello {
        return Ok(ActionResponse::with_user(UserView {
            id: user.id.clone(),
            name: user.name.clone(),
            avatar: user.avatar.clone(),
        }));
    }

    let code = code.ok_or_else(|| {
        ServiceError::InvalidInput(format!("`{}` requires a room code", action.name()))
    })?;
    let store = state.room_store().await?;

    let record = match apply_action(state, store.as_ref(), user, action, &code).await {
        Err(ServiceError::Unavailable(err @ StorageError::Unavailable { .. })) => {
            match state.degrade_to_memory() {
                Some(memory) => {
                    warn!(
                        room = %code,
                        error = %err,
                        "durable storage failed mid-request; serving from memory"
                    );
                    apply_action(state, memory.as_ref(), user, action, &code).await
                }
                None => Err(ServiceError::Unavailable(err)),
            }
        }
        other => other,
    }
    .inspect_err(|err| {
        info!(room = %code, action = action.name(), user = %user.id, error = %err, "action rejected");
    })?;

    info!(
        room = %code,
        action = action.name(),
        user = %user.id,
        version = record.version,
        "action applied"
    );
    Ok(ActionResponse::with_state(RoomView::project(
        &record, &user.id,
    )))
}

/// Run `action` against the room in `store`.
async fn apply_action(
    state: &SharedState,
    store: &dyn RoomStore,
    user: &PlayerIdentity,
    action: RoomAction,
    code: &RoomCode,
) -> Result<RoomRecord, ServiceError> {
    let decks = if action == RoomAction::Ready {
        prefetch_decks(store, code, user).await
    } else {
        HashMap::new()
    };
    let ctx = MatchContext {
        catalog: state.catalog(),
        rules: state.rules(),
        decks: &decks,
    };

    let (record, ()) = run_room_transition(
        store,
        state.retry_policy(),
        code,
        action.creates_room(),
        |room| room.apply(user, &action, &ctx, &mut rand::rng()),
    )
    .await?;
    Ok(record)
}

/// Saved decks of everyone who may be dealt in when `ready` starts the match.
/// Lookup failures fall back to random loadouts.
async fn prefetch_decks(
    store: &dyn RoomStore,
    code: &RoomCode,
    user: &PlayerIdentity,
) -> HashMap<String, DeckEntity> {
    let mut user_ids = vec![user.id.clone()];
    match store.load_room(code.clone()).await {
        Ok(Some(record)) => user_ids.extend(
            [&record.state_json.players.a, &record.state_json.players.b]
                .into_iter()
                .flatten()
                .map(|player| player.id.clone()),
        ),
        Ok(None) => {}
        Err(err) => warn!(room = %code, error = %err, "failed to read room before ready"),
    }
    user_ids.sort();
    user_ids.dedup();

    let mut decks = HashMap::new();
    for user_id in user_ids {
        match store.find_deck(user_id.clone()).await {
            Ok(Some(deck)) => {
                decks.insert(user_id, deck);
            }
            Ok(None) => {}
            Err(err) => warn!(
                user = %user_id,
                error = %err,
                "failed to load saved deck; using a random loadout"
            ),
        }
    }
    decks
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::SystemTime};

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::{AppConfig, StorageConfig, StorageMode},
        dao::{models::SwapOutcome, storage::StorageResult},
        state::{AppState, room::{Mode, Room, Side}},
    };

    /// Durable store whose backend went away after it was installed.
    struct Unreachable;

    fn down<T: Send + 'static>() -> BoxFuture<'static, StorageResult<T>> {
        Box::pin(async {
            Err(StorageError::unavailable(
                "couchdb request failed".into(),
                std::io::Error::other("connection refused"),
            ))
        })
    }

    impl RoomStore for Unreachable {
        fn load_room(&self, _code: RoomCode) -> BoxFuture<'static, StorageResult<Option<RoomRecord>>> {
            down()
        }
        fn create_room(&self, _room: Room) -> BoxFuture<'static, StorageResult<RoomRecord>> {
            down()
        }
        fn compare_and_swap(
            &self,
            _room: Room,
            _expected_version: u64,
        ) -> BoxFuture<'static, StorageResult<SwapOutcome>> {
            down()
        }
        fn find_deck(&self, _user_id: String) -> BoxFuture<'static, StorageResult<Option<DeckEntity>>> {
            down()
        }
        fn save_deck(&self, _deck: DeckEntity) -> BoxFuture<'static, StorageResult<()>> {
            down()
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            down()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            down()
        }
    }

    async fn couch_state(fallback_to_memory: bool) -> SharedState {
        let state = AppState::new(AppConfig {
            storage: StorageConfig {
                mode: StorageMode::Couch,
                fallback_to_memory,
            },
            ..AppConfig::default()
        });
        state.set_room_store(Arc::new(Unreachable)).await;
        state
    }

    fn player(id: &str) -> PlayerIdentity {
        PlayerIdentity {
            id: id.into(),
            name: id.into(),
            avatar: None,
        }
    }

    fn code() -> Option<RoomCode> {
        Some(RoomCode::parse("svc1").unwrap())
    }

    #[tokio::test]
    async fn hello_needs_no_room() {
        let state = AppState::new(AppConfig::default());
        let response = dispatch(&state, &player("u1"), RoomAction::Hello, None)
            .await
            .unwrap();
        assert!(response.ok);
        assert_eq!(response.user.map(|u| u.id), Some("u1".to_owned()));
        assert!(response.state.is_none());
    }

    #[tokio::test]
    async fn room_actions_need_a_code() {
        let state = AppState::new(AppConfig::default());
        let err = dispatch(&state, &player("u1"), RoomAction::GetState, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn play_actions_on_unknown_room_are_not_found() {
        let state = AppState::new(AppConfig::default());
        let err = dispatch(&state, &player("u1"), RoomAction::Ready, code())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn ready_up_starts_the_match_with_saved_decks() {
        let state = AppState::new(AppConfig::default());
        let store = state.room_store().await.unwrap();
        store
            .save_deck(DeckEntity {
                user_id: "alice".into(),
                characters: vec!["CH-FROST".into(), "CH-STONE".into(), "CH-TIDE".into()],
                cards: vec!["EV-RALLY".into(); 8],
                updated_at: SystemTime::now(),
            })
            .await
            .unwrap();

        let alice = player("alice");
        let bob = player("bob");
        dispatch(&state, &alice, RoomAction::CreateRoom, code()).await.unwrap();
        dispatch(&state, &bob, RoomAction::JoinRoom, code()).await.unwrap();
        dispatch(&state, &alice, RoomAction::Ready, code()).await.unwrap();
        let response = dispatch(&state, &bob, RoomAction::Ready, code()).await.unwrap();

        let view = response.state.unwrap();
        assert_eq!(view.mode, Mode::Play);
        assert_eq!(view.you, Some(Side::B));
        assert!(view.seats.b.hand.is_some());
        assert!(view.seats.a.hand.is_none());

        let codes: Vec<_> = view.seats.a.board.iter().map(|u| u.code.as_str()).collect();
        assert_eq!(codes, ["CH-FROST", "CH-STONE", "CH-TIDE"]);
    }

    #[tokio::test]
    async fn lost_durable_store_falls_back_to_memory_mid_request() {
        let state = couch_state(true).await;
        assert!(!state.is_degraded());

        let response = dispatch(&state, &player("alice"), RoomAction::CreateRoom, code())
            .await
            .unwrap();
        assert_eq!(response.state.unwrap().you, Some(Side::A));
        assert!(state.is_degraded());

        // later requests are routed to memory without touching the dead store
        let response = dispatch(&state, &player("bob"), RoomAction::JoinRoom, code())
            .await
            .unwrap();
        assert_eq!(response.state.unwrap().you, Some(Side::B));
    }

    #[tokio::test]
    async fn lost_durable_store_without_fallback_is_unavailable() {
        let state = couch_state(false).await;
        let err = dispatch(&state, &player("alice"), RoomAction::CreateRoom, code())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Unavailable(StorageError::Unavailable { .. })
        ));
        assert!(!state.is_degraded());
    }
}
