use crate::persistence::adapter::PersistenceAdapter;
use crate::telemetry::logging;
use crate::tracking::reporter::PositionReporter;
use crate::tracking::snapshot::{CharacterId, PositionSnapshot, SessionId};
use crate::tracking::store::PositionStore;
use crate::tracking::transition::{TransitionCoordinator, TransitionOutcome};
use crate::world::classify::{classify, Space};
use std::sync::Arc;

/// The engine's only entry points for the connection layer. Each hook maps
/// one lifecycle event to the store, coordinator, reporter and persistence
/// work it implies.
pub struct SessionHooks {
    store: Arc<PositionStore>,
    adapter: Arc<PersistenceAdapter>,
    coordinator: TransitionCoordinator,
    reporter: Arc<PositionReporter>,
}

impl SessionHooks {
    pub fn new(
        store: Arc<PositionStore>,
        adapter: Arc<PersistenceAdapter>,
        reporter: Arc<PositionReporter>,
    ) -> Self {
        let coordinator = TransitionCoordinator::new(store.clone(), adapter.clone());
        Self {
            store,
            adapter,
            coordinator,
            reporter,
        }
    }

    /// Login: load the persisted record, seed the session with the spawn
    /// position, and start the sampler.
    pub fn on_world_entry(
        &self,
        session: SessionId,
        character: CharacterId,
        spawn: PositionSnapshot,
    ) -> Result<(), String> {
        let mut tracking = self
            .adapter
            .load(character)
            .unwrap_or_default();

        // An anchor left over from a session that ended inside a mission is
        // stale once the player spawns world-side.
        if tracking.mission_entry.is_some()
            && classify(&spawn.level, self.store.catalog()) == Space::World
        {
            tracking.mission_entry = None;
            if let Err(err) = self.adapter.clear_mission_entry(character) {
                logging::log_error(&format!(
                    "stale anchor clear failed for character {}: {}",
                    character.0, err
                ));
            }
            logging::log_game(&format!(
                "character {} logged in world-side, stale mission anchor dropped",
                character.0
            ));
        }

        let tracking = self.store.initialize(session, character, tracking);
        self.store
            .update_position(session, spawn.x, spawn.y, spawn.z, &spawn.level)
            .map_err(|err| err.to_string())?;
        logging::log_game(&format!(
            "session {} (character {}) entered world at '{}' ({:.2}, {:.2}, {:.2})",
            session.0, character.0, spawn.level, spawn.x, spawn.y, spawn.z
        ));

        if tracking.logging_enabled {
            self.reporter.start(session)?;
        }
        Ok(())
    }

    /// Door use before the level transfer is committed. The caller applies
    /// the returned outcome: proceed as planned, or respawn at the restore
    /// point.
    pub fn on_door_use(
        &self,
        session: SessionId,
        current_level: &str,
        target_level: &str,
    ) -> Result<TransitionOutcome, String> {
        self.coordinator
            .on_transition_attempt(session, current_level, target_level)
    }

    /// The transfer went through; record where the session actually landed.
    pub fn on_level_transfer_committed(
        &self,
        session: SessionId,
        level: &str,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<(), String> {
        self.store
            .update_position(session, x, y, z, level)
            .map_err(|err| err.to_string())?;
        Ok(())
    }

    /// Logout or disconnect: stop the sampler first so no report races the
    /// teardown, persist the final state, then evict the session. Eviction
    /// happens even when the save fails; the failure is surfaced after.
    pub fn on_session_end(&self, session: SessionId) -> Result<(), String> {
        self.reporter.stop(session);
        let character = self
            .store
            .character_of(session)
            .map_err(|err| err.to_string())?;
        let state = self.store.get(session).map_err(|err| err.to_string())?;

        let save_result = self.adapter.save(character, &state);
        self.store.remove(session).map_err(|err| err.to_string())?;
        logging::log_game(&format!(
            "session {} (character {}) ended",
            session.0, character.0
        ));
        save_result.map_err(|err| {
            logging::log_error(&format!(
                "final save failed for character {}: {}",
                character.0, err
            ));
            format!("final save failed for character {}: {}", character.0, err)
        })
    }
}
