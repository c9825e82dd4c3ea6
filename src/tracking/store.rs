use crate::telemetry::logging;
use crate::tracking::snapshot::{
    unix_millis, CharacterId, PositionSnapshot, PositionTracking, SessionId,
};
use crate::world::classify::{classify_detailed, Space};
use crate::world::levels::LevelCatalog;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    SessionNotFound(SessionId),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::SessionNotFound(session) => {
                write!(f, "session {} not initialized", session.0)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// The snapshot's timestamp did not advance past the stored one; the
    /// update was dropped without touching state.
    Stale,
}

#[derive(Debug)]
struct SessionSlot {
    character: CharacterId,
    state: Mutex<PositionTracking>,
}

/// In-memory source of truth for live sessions. The outer map lock is held
/// only for lookup and insert/remove; each session carries its own mutex so
/// mutations are single-writer per session without cross-session contention.
#[derive(Debug)]
pub struct PositionStore {
    catalog: Arc<LevelCatalog>,
    sessions: Mutex<HashMap<SessionId, Arc<SessionSlot>>>,
    stale_updates: AtomicU64,
}

impl PositionStore {
    pub fn new(catalog: Arc<LevelCatalog>) -> Self {
        Self {
            catalog,
            sessions: Mutex::new(HashMap::new()),
            stale_updates: AtomicU64::new(0),
        }
    }

    pub fn catalog(&self) -> &LevelCatalog {
        &self.catalog
    }

    /// Creates tracking state for a session. Re-initializing an existing
    /// session changes nothing and hands back the current state.
    pub fn initialize(
        &self,
        session: SessionId,
        character: CharacterId,
        initial: PositionTracking,
    ) -> PositionTracking {
        let mut sessions = lock_unpoisoned(&self.sessions);
        if let Some(slot) = sessions.get(&session) {
            return lock_unpoisoned(&slot.state).clone();
        }
        sessions.insert(
            session,
            Arc::new(SessionSlot {
                character,
                state: Mutex::new(initial.clone()),
            }),
        );
        initial
    }

    pub fn get(&self, session: SessionId) -> Result<PositionTracking, StoreError> {
        let slot = self.slot(session)?;
        let state = lock_unpoisoned(&slot.state);
        Ok(state.clone())
    }

    pub fn character_of(&self, session: SessionId) -> Result<CharacterId, StoreError> {
        Ok(self.slot(session)?.character)
    }

    pub fn update_position(
        &self,
        session: SessionId,
        x: f64,
        y: f64,
        z: f64,
        level: &str,
    ) -> Result<UpdateOutcome, StoreError> {
        self.update_position_at(session, x, y, z, level, unix_millis())
    }

    pub fn update_position_at(
        &self,
        session: SessionId,
        x: f64,
        y: f64,
        z: f64,
        level: &str,
        timestamp_ms: u64,
    ) -> Result<UpdateOutcome, StoreError> {
        let slot = self.slot(session)?;
        let mut state = lock_unpoisoned(&slot.state);
        if let Some(current) = state.current_position.as_ref() {
            if timestamp_ms <= current.timestamp_ms {
                self.stale_updates.fetch_add(1, Ordering::Relaxed);
                logging::log_game(&format!(
                    "stale position update dropped: session={} level={} ts={} <= {}",
                    session.0, level, timestamp_ms, current.timestamp_ms
                ));
                return Ok(UpdateOutcome::Stale);
            }
        }
        let classification = classify_detailed(level, &self.catalog);
        if classification.defaulted {
            logging::log_game(&format!(
                "level '{}' unknown to catalog, treating as world space",
                level
            ));
        }
        let snapshot = PositionSnapshot::new(x, y, z, level, timestamp_ms);
        if classification.space == Space::World {
            state.last_world_position = Some(snapshot.clone());
        }
        state.current_position = Some(snapshot);
        Ok(UpdateOutcome::Applied)
    }

    /// Runs `f` with the session's state under its mutex. Callers must not
    /// perform I/O inside `f`; clone what is needed and persist afterwards.
    pub fn with_state<R>(
        &self,
        session: SessionId,
        f: impl FnOnce(&mut PositionTracking) -> R,
    ) -> Result<R, StoreError> {
        let slot = self.slot(session)?;
        let mut state = lock_unpoisoned(&slot.state);
        Ok(f(&mut state))
    }

    /// Evicts a session and returns its final state. The caller is expected
    /// to have persisted it already.
    pub fn remove(&self, session: SessionId) -> Result<PositionTracking, StoreError> {
        let slot = {
            let mut sessions = lock_unpoisoned(&self.sessions);
            sessions
                .remove(&session)
                .ok_or(StoreError::SessionNotFound(session))?
        };
        let state = lock_unpoisoned(&slot.state);
        Ok(state.clone())
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stale_update_count(&self) -> u64 {
        self.stale_updates.load(Ordering::Relaxed)
    }

    fn slot(&self, session: SessionId) -> Result<Arc<SessionSlot>, StoreError> {
        let sessions = lock_unpoisoned(&self.sessions);
        sessions
            .get(&session)
            .cloned()
            .ok_or(StoreError::SessionNotFound(session))
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::snapshot::unix_millis;

    fn store() -> PositionStore {
        PositionStore::new(Arc::new(LevelCatalog::built_in()))
    }

    const SESSION: SessionId = SessionId(1);
    const CHARACTER: CharacterId = CharacterId(7);

    #[test]
    fn update_then_get_round_trips() {
        let store = store();
        store.initialize(SESSION, CHARACTER, PositionTracking::default());
        let before = unix_millis();
        let outcome = store
            .update_position(SESSION, 500.0, 200.0, 10.0, "BridgeTown")
            .expect("update");
        assert_eq!(outcome, UpdateOutcome::Applied);

        let state = store.get(SESSION).expect("get");
        let current = state.current_position.expect("current");
        assert_eq!(current.x, 500.0);
        assert_eq!(current.y, 200.0);
        assert_eq!(current.z, 10.0);
        assert_eq!(current.level, "BridgeTown");
        assert!(current.timestamp_ms >= before);
    }

    #[test]
    fn world_updates_also_set_last_world_position() {
        let store = store();
        store.initialize(SESSION, CHARACTER, PositionTracking::default());
        store
            .update_position_at(SESSION, 1.0, 2.0, 3.0, "BridgeTown", 1_000)
            .expect("world update");
        store
            .update_position_at(SESSION, 4.0, 5.0, 6.0, "BT_Mission1", 2_000)
            .expect("mission update");

        let state = store.get(SESSION).expect("get");
        let last_world = state.last_world_position.expect("last world");
        assert_eq!(last_world.level, "BridgeTown");
        assert_eq!(last_world.timestamp_ms, 1_000);
        let current = state.current_position.expect("current");
        assert_eq!(current.level, "BT_Mission1");
        assert_eq!(current.timestamp_ms, 2_000);
    }

    #[test]
    fn stale_updates_are_rejected_without_touching_state() {
        let store = store();
        store.initialize(SESSION, CHARACTER, PositionTracking::default());
        store
            .update_position_at(SESSION, 1.0, 1.0, 0.0, "BridgeTown", 2_000)
            .expect("update");

        let outcome = store
            .update_position_at(SESSION, 9.0, 9.0, 9.0, "BridgeTown", 1_500)
            .expect("stale update");
        assert_eq!(outcome, UpdateOutcome::Stale);
        let equal_ts = store
            .update_position_at(SESSION, 9.0, 9.0, 9.0, "BridgeTown", 2_000)
            .expect("equal-timestamp update");
        assert_eq!(equal_ts, UpdateOutcome::Stale);

        let state = store.get(SESSION).expect("get");
        let current = state.current_position.expect("current");
        assert_eq!(current.x, 1.0);
        assert_eq!(current.timestamp_ms, 2_000);
        assert_eq!(store.stale_update_count(), 2);
    }

    #[test]
    fn initialize_is_idempotent() {
        let store = store();
        store.initialize(SESSION, CHARACTER, PositionTracking::default());
        store
            .update_position_at(SESSION, 1.0, 1.0, 0.0, "BridgeTown", 1_000)
            .expect("update");

        let mut other = PositionTracking::default();
        other.logging_enabled = false;
        let state = store.initialize(SESSION, CHARACTER, other);
        assert!(state.logging_enabled);
        assert!(state.current_position.is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_sessions_surface_not_found() {
        let store = store();
        assert_eq!(
            store.get(SessionId(99)),
            Err(StoreError::SessionNotFound(SessionId(99)))
        );
        assert!(store
            .update_position(SessionId(99), 0.0, 0.0, 0.0, "BridgeTown")
            .is_err());
    }

    #[test]
    fn remove_evicts_and_returns_final_state() {
        let store = store();
        store.initialize(SESSION, CHARACTER, PositionTracking::default());
        store
            .update_position_at(SESSION, 1.0, 2.0, 3.0, "BridgeTown", 1_000)
            .expect("update");

        let final_state = store.remove(SESSION).expect("remove");
        assert!(final_state.current_position.is_some());
        assert!(store.is_empty());
        assert_eq!(
            store.get(SESSION),
            Err(StoreError::SessionNotFound(SESSION))
        );
    }
}
