use std::time::{Duration, SystemTime};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::{RoomRecord, SwapOutcome},
        room_store::RoomStore,
    },
    error::ServiceError,
    state::{
        room::{Room, RoomCode},
        state_machine::MatchError,
    },
};

/// Bounded retry schedule for optimistic room writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total compute-and-write attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(25),
            max_backoff: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the `attempt`-th conflict (1-based), doubling each time.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1 << exponent)
            .min(self.max_backoff)
    }
}

/// Read the room, run `transition` on a copy and write it back only if nobody
/// else wrote in between. On conflict the transition is recomputed against the
/// fresh state, up to `policy.max_attempts` times.
///
/// A transition that leaves the room untouched is not written at all.
pub async fn run_room_transition<T, F>(
    store: &dyn RoomStore,
    policy: &RetryPolicy,
    code: &RoomCode,
    create_if_missing: bool,
    mut transition: F,
) -> Result<(RoomRecord, T), ServiceError>
where
    F: FnMut(&mut Room) -> Result<T, MatchError>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let record = match store.load_room(code.clone()).await? {
            Some(record) => record,
            None if create_if_missing => {
                let record = store.create_room(Room::new(code.clone())).await?;
                info!(room = %code, version = record.version, "room created");
                record
            }
            None => return Err(ServiceError::NotFound(format!("room `{code}`"))),
        };

        let mut next = record.state_json.clone();
        let value = transition(&mut next)?;
        if next == record.state_json {
            return Ok((record, value));
        }

        match store.compare_and_swap(next.clone(), record.version).await? {
            SwapOutcome::Committed { version } => {
                debug!(room = %code, version, attempt, "room transition committed");
                let committed = RoomRecord {
                    id: record.id,
                    version,
                    state_json: next,
                    updated_at: SystemTime::now(),
                };
                return Ok((committed, value));
            }
            SwapOutcome::Conflict { current_version } => {
                warn!(
                    room = %code,
                    attempt,
                    expected = record.version,
                    ?current_version,
                    "room changed concurrently"
                );
                if attempt >= policy.max_attempts {
                    return Err(ServiceError::Conflict {
                        room: code.to_string(),
                        attempts: attempt,
                    });
                }
                sleep(policy.backoff(attempt)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use futures::future::BoxFuture;

    use super::*;
    use crate::dao::{
        models::DeckEntity, room_store::InMemoryRoomStore, storage::StorageResult,
    };

    fn code() -> RoomCode {
        RoomCode::parse("TX1").unwrap()
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Lets another writer commit a fresh room right before each of the first
    /// `interfere` swaps.
    struct Interfering {
        inner: InMemoryRoomStore,
        interfere: u32,
        swaps: Arc<AtomicU32>,
    }

    impl RoomStore for Interfering {
        fn load_room(
            &self,
            code: RoomCode,
        ) -> BoxFuture<'static, StorageResult<Option<RoomRecord>>> {
            self.inner.load_room(code)
        }

        fn create_room(&self, room: Room) -> BoxFuture<'static, StorageResult<RoomRecord>> {
            self.inner.create_room(room)
        }

        fn compare_and_swap(
            &self,
            room: Room,
            expected_version: u64,
        ) -> BoxFuture<'static, StorageResult<SwapOutcome>> {
            let seen = self.swaps.fetch_add(1, Ordering::SeqCst);
            let inner = self.inner.clone();
            let interfere = seen < self.interfere;
            Box::pin(async move {
                if interfere {
                    let mut other = Room::new(room.id.clone());
                    other.hero.b -= 1;
                    inner.compare_and_swap(other, expected_version).await?;
                }
                inner.compare_and_swap(room, expected_version).await
            })
        }

        fn find_deck(
            &self,
            user_id: String,
        ) -> BoxFuture<'static, StorageResult<Option<DeckEntity>>> {
            self.inner.find_deck(user_id)
        }

        fn save_deck(&self, deck: DeckEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_deck(deck)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }

        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(25));
        assert_eq!(policy.backoff(2), Duration::from_millis(50));
        assert_eq!(policy.backoff(4), Duration::from_millis(200));
        assert_eq!(policy.backoff(40), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn missing_room_is_created_only_when_allowed() {
        let store = InMemoryRoomStore::new();
        let err = run_room_transition(&store, &fast_policy(), &code(), false, |_| Ok(()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let (record, ()) = run_room_transition(&store, &fast_policy(), &code(), true, |_| Ok(()))
            .await
            .unwrap();
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn unchanged_room_is_not_written() {
        let store = InMemoryRoomStore::new();
        store.create_room(Room::new(code())).await.unwrap();

        let (record, ()) = run_room_transition(&store, &fast_policy(), &code(), false, |_| Ok(()))
            .await
            .unwrap();
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn rejected_transition_leaves_store_untouched() {
        let store = InMemoryRoomStore::new();
        store.create_room(Room::new(code())).await.unwrap();

        let err = run_room_transition(&store, &fast_policy(), &code(), false, |room| {
            room.hero.a = 0;
            Err::<(), _>(MatchError::RoomFull)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::RoomFull));

        let stored = store.load_room(code()).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.state_json, Room::new(code()));
    }

    #[tokio::test]
    async fn conflict_recomputes_against_fresh_state() {
        let swaps = Arc::new(AtomicU32::new(0));
        let store = Interfering {
            inner: InMemoryRoomStore::new(),
            interfere: 1,
            swaps: swaps.clone(),
        };
        store.create_room(Room::new(code())).await.unwrap();

        let mut runs = 0;
        let (record, ()) = run_room_transition(&store, &fast_policy(), &code(), false, |room| {
            runs += 1;
            room.ready.a = true;
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(runs, 2);
        assert_eq!(record.version, 3);
        assert!(record.state_json.ready.a);
        // the interfering write survives
        assert_eq!(record.state_json.hero.b, crate::state::room::STARTING_HERO_HP - 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let swaps = Arc::new(AtomicU32::new(0));
        let store = Interfering {
            inner: InMemoryRoomStore::new(),
            interfere: u32::MAX,
            swaps: swaps.clone(),
        };
        store.create_room(Room::new(code())).await.unwrap();

        let err = run_room_transition(&store, &fast_policy(), &code(), false, |room| {
            room.ready.b = true;
            Ok(())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::Conflict { attempts: 3, .. }));
        assert_eq!(swaps.load(Ordering::SeqCst), 3);
    }
}
