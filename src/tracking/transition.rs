use crate::persistence::adapter::PersistenceAdapter;
use crate::telemetry::logging;
use crate::tracking::snapshot::{CharacterId, MissionAnchor, PositionTracking, SessionId};
use crate::tracking::store::PositionStore;
use crate::world::classify::{classify, Space};
use std::sync::Arc;

/// Where a session should be placed after leaving mission space.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    /// Same space on both sides, or nothing to do; the caller proceeds with
    /// the transfer it already planned.
    Unchanged,
    /// Crossing into mission space; the pre-mission position was anchored.
    EnteredMission,
    /// Crossing back to world space; place the session at this point.
    Restore(SpawnPoint),
    /// Crossing back to world space with nothing saved; the caller decides
    /// the default spawn.
    NoSavedPosition,
}

/// Watches door use and decides, per crossing, whether to anchor the current
/// position or restore a saved one. State changes go through the store and
/// are then persisted; a persistence failure never blocks the transfer.
pub struct TransitionCoordinator {
    store: Arc<PositionStore>,
    adapter: Arc<PersistenceAdapter>,
}

impl TransitionCoordinator {
    pub fn new(store: Arc<PositionStore>, adapter: Arc<PersistenceAdapter>) -> Self {
        Self { store, adapter }
    }

    /// Invoked before a level change is committed. The caller passes both
    /// endpoints; the spawn override in the outcome, if any, replaces the
    /// transfer destination.
    pub fn on_transition_attempt(
        &self,
        session: SessionId,
        current_level: &str,
        target_level: &str,
    ) -> Result<TransitionOutcome, String> {
        let catalog = self.store.catalog();
        let current_space = classify(current_level, catalog);
        let target_space = classify(target_level, catalog);

        let outcome = match (current_space, target_space) {
            (Space::World, Space::Mission) => self.anchor(session, target_level)?,
            (Space::Mission, Space::World) => self.restore(session)?,
            // World to world, or mission to mission with the anchor held.
            _ => TransitionOutcome::Unchanged,
        };
        Ok(outcome)
    }

    fn anchor(&self, session: SessionId, mission: &str) -> Result<TransitionOutcome, String> {
        let character = self
            .store
            .character_of(session)
            .map_err(|err| err.to_string())?;
        let anchored = self
            .store
            .with_state(session, |state| {
                let Some(current) = state.current_position.clone() else {
                    return None;
                };
                state.mission_entry = Some(MissionAnchor {
                    snapshot: current,
                    mission: mission.to_string(),
                });
                Some(state.clone())
            })
            .map_err(|err| err.to_string())?;

        let Some(state) = anchored else {
            logging::log_game(&format!(
                "session {} entered mission '{}' with no current position, nothing anchored",
                session.0, mission
            ));
            return Ok(TransitionOutcome::Unchanged);
        };

        logging::log_game(&format!(
            "session {} anchored at '{}' entering mission '{}'",
            session.0,
            state
                .mission_entry
                .as_ref()
                .map(|anchor| anchor.snapshot.level.as_str())
                .unwrap_or("?"),
            mission
        ));
        self.persist(session, character, &state);
        Ok(TransitionOutcome::EnteredMission)
    }

    fn restore(&self, session: SessionId) -> Result<TransitionOutcome, String> {
        let character = self
            .store
            .character_of(session)
            .map_err(|err| err.to_string())?;
        let (state, restore_point) = self
            .store
            .with_state(session, |state| {
                let anchor = state.mission_entry.take();
                let point = anchor
                    .map(|anchor| anchor.snapshot)
                    .or_else(|| state.last_world_position.clone());
                (state.clone(), point)
            })
            .map_err(|err| err.to_string())?;

        // The cleared anchor is persisted even when there is nothing to
        // restore to; the next login must not see mission state.
        self.persist(session, character, &state);

        match restore_point {
            Some(snapshot) => {
                logging::log_game(&format!(
                    "session {} restored to '{}' ({:.2}, {:.2}, {:.2})",
                    session.0, snapshot.level, snapshot.x, snapshot.y, snapshot.z
                ));
                Ok(TransitionOutcome::Restore(SpawnPoint {
                    x: snapshot.x,
                    y: snapshot.y,
                    z: snapshot.z,
                    level: snapshot.level,
                }))
            }
            None => {
                logging::log_game(&format!(
                    "session {} left mission space with no saved position",
                    session.0
                ));
                Ok(TransitionOutcome::NoSavedPosition)
            }
        }
    }

    fn persist(&self, session: SessionId, character: CharacterId, state: &PositionTracking) {
        if let Err(err) = self.adapter.save(character, state) {
            logging::log_error(&format!(
                "transition save failed for session {} (character {}): {}",
                session.0, character.0, err
            ));
            eprintln!(
                "blitz: transition save failed for character {}: {}",
                character.0, err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::snapshot::{CharacterId, PositionTracking};
    use crate::world::levels::LevelCatalog;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    const SESSION: SessionId = SessionId(1);
    const CHARACTER: CharacterId = CharacterId(7);

    fn setup() -> (Arc<PositionStore>, TransitionCoordinator, PathBuf) {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("blitz-transition-test-{}", suffix));
        std::fs::create_dir_all(&dir).expect("dir");
        let store = Arc::new(PositionStore::new(Arc::new(LevelCatalog::built_in())));
        let adapter = Arc::new(PersistenceAdapter::from_root(&dir));
        store.initialize(SESSION, CHARACTER, PositionTracking::default());
        let coordinator = TransitionCoordinator::new(store.clone(), adapter);
        (store, coordinator, dir)
    }

    #[test]
    fn world_to_mission_anchors_current_position() {
        let (store, coordinator, dir) = setup();
        store
            .update_position_at(SESSION, 360.0, 1458.99, 0.0, "BridgeTown", 1_000)
            .expect("update");

        let outcome = coordinator
            .on_transition_attempt(SESSION, "BridgeTown", "BT_Mission1")
            .expect("transition");
        assert_eq!(outcome, TransitionOutcome::EnteredMission);

        let anchor = store
            .get(SESSION)
            .expect("get")
            .mission_entry
            .expect("anchor");
        assert_eq!(anchor.snapshot.level, "BridgeTown");
        assert_eq!(anchor.snapshot.x, 360.0);
        assert_eq!(anchor.mission, "BT_Mission1");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn mission_to_mission_keeps_the_original_anchor() {
        let (store, coordinator, dir) = setup();
        store
            .update_position_at(SESSION, 360.0, 1458.99, 0.0, "BridgeTown", 1_000)
            .expect("update");
        coordinator
            .on_transition_attempt(SESSION, "BridgeTown", "BT_Mission1")
            .expect("enter");
        store
            .update_position_at(SESSION, 50.0, 60.0, 0.0, "BT_Mission1", 2_000)
            .expect("mission move");

        let outcome = coordinator
            .on_transition_attempt(SESSION, "BT_Mission1", "BT_Mission2")
            .expect("chain");
        assert_eq!(outcome, TransitionOutcome::Unchanged);

        let anchor = store
            .get(SESSION)
            .expect("get")
            .mission_entry
            .expect("anchor");
        assert_eq!(anchor.snapshot.level, "BridgeTown");
        assert_eq!(anchor.mission, "BT_Mission1");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn mission_to_world_restores_the_anchor_and_clears_it() {
        let (store, coordinator, dir) = setup();
        store
            .update_position_at(SESSION, 360.0, 1458.99, 0.0, "BridgeTown", 1_000)
            .expect("update");
        coordinator
            .on_transition_attempt(SESSION, "BridgeTown", "BT_Mission1")
            .expect("enter");
        store
            .update_position_at(SESSION, 50.0, 60.0, 0.0, "BT_Mission1", 2_000)
            .expect("mission move");

        let outcome = coordinator
            .on_transition_attempt(SESSION, "BT_Mission1", "BridgeTown")
            .expect("exit");
        assert_eq!(
            outcome,
            TransitionOutcome::Restore(SpawnPoint {
                x: 360.0,
                y: 1458.99,
                z: 0.0,
                level: "BridgeTown".to_string(),
            })
        );
        assert!(store.get(SESSION).expect("get").mission_entry.is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_anchor_falls_back_to_last_world_position() {
        let (store, coordinator, dir) = setup();
        // Session finds itself in mission space without a tracked entry,
        // e.g. after a login directly into an instance.
        store
            .update_position_at(SESSION, 360.0, 1458.99, 0.0, "BridgeTown", 1_000)
            .expect("world update");
        store
            .update_position_at(SESSION, 50.0, 60.0, 0.0, "BT_Mission1", 2_000)
            .expect("mission update");

        let outcome = coordinator
            .on_transition_attempt(SESSION, "BT_Mission1", "CraftTown")
            .expect("exit");
        assert_eq!(
            outcome,
            TransitionOutcome::Restore(SpawnPoint {
                x: 360.0,
                y: 1458.99,
                z: 0.0,
                level: "BridgeTown".to_string(),
            })
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn nothing_saved_yields_no_saved_position() {
        let (store, coordinator, dir) = setup();
        store
            .update_position_at(SESSION, 50.0, 60.0, 0.0, "BT_Mission1", 1_000)
            .expect("mission update");

        let outcome = coordinator
            .on_transition_attempt(SESSION, "BT_Mission1", "BridgeTown")
            .expect("exit");
        assert_eq!(outcome, TransitionOutcome::NoSavedPosition);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn world_to_world_is_unchanged() {
        let (store, coordinator, dir) = setup();
        store
            .update_position_at(SESSION, 360.0, 1458.99, 0.0, "BridgeTown", 1_000)
            .expect("update");

        let outcome = coordinator
            .on_transition_attempt(SESSION, "BridgeTown", "CraftTown")
            .expect("transition");
        assert_eq!(outcome, TransitionOutcome::Unchanged);
        assert!(store.get(SESSION).expect("get").mission_entry.is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn entering_mission_with_no_position_anchors_nothing() {
        let (store, coordinator, dir) = setup();
        let outcome = coordinator
            .on_transition_attempt(SESSION, "BridgeTown", "BT_Mission1")
            .expect("transition");
        assert_eq!(outcome, TransitionOutcome::Unchanged);
        assert!(store.get(SESSION).expect("get").mission_entry.is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
