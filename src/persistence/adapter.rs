use crate::persistence::backup::BackupStore;
use crate::persistence::store::{CharacterRecord, CharacterStore, SaveValidationReport};
use crate::telemetry::logging;
use crate::tracking::snapshot::{CharacterId, PositionTracking};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex;

const RECORD_CACHE_CAPACITY: usize = 256;

/// Single persistence surface for the tracking engine. The character store
/// is authoritative; the YAML backup is best effort and only consulted when
/// the primary has nothing. Recently touched records stay in an LRU cache so
/// login after a recent logout skips the disk.
pub struct PersistenceAdapter {
    characters: CharacterStore,
    backup: BackupStore,
    cache: Mutex<LruCache<CharacterId, PositionTracking>>,
}

impl PersistenceAdapter {
    pub fn from_root(root: &Path) -> Self {
        Self::new(
            CharacterStore::from_root(root),
            BackupStore::from_root(root),
        )
    }

    pub fn new(characters: CharacterStore, backup: BackupStore) -> Self {
        let capacity = NonZeroUsize::new(RECORD_CACHE_CAPACITY.max(1)).unwrap();
        Self {
            characters,
            backup,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Persists a character's tracking state. The primary write must succeed;
    /// a backup write failure is logged and swallowed.
    pub fn save(&self, id: CharacterId, tracking: &PositionTracking) -> Result<(), String> {
        let mut record = match self.characters.load(id) {
            Ok(Some(record)) => record,
            Ok(None) => CharacterRecord::new(id),
            Err(err) => {
                logging::log_error(&format!("character {} load before save failed: {}", id.0, err));
                CharacterRecord::new(id)
            }
        };
        record.tracking = tracking.clone();
        self.characters.save(&record)?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(id, tracking.clone());
        }

        if let Err(err) = self.backup.store(id, tracking) {
            logging::log_error(&format!("position backup failed for {}: {}", id.0, err));
            eprintln!("blitz: position backup failed for {}: {}", id.0, err);
        }
        Ok(())
    }

    /// Loads tracking state: cache, then character save, then backup. Errors
    /// along the chain are logged and treated as absence.
    pub fn load(&self, id: CharacterId) -> Option<PositionTracking> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(tracking) = cache.get(&id) {
                return Some(tracking.clone());
            }
        }

        match self.characters.load(id) {
            Ok(Some(record)) => {
                if let Ok(mut cache) = self.cache.lock() {
                    cache.put(id, record.tracking.clone());
                }
                return Some(record.tracking);
            }
            Ok(None) => {}
            Err(err) => {
                logging::log_error(&format!("character {} load failed: {}", id.0, err));
            }
        }

        match self.backup.load(id) {
            Ok(Some(tracking)) => {
                logging::log_game(&format!("character {} restored from position backup", id.0));
                if let Ok(mut cache) = self.cache.lock() {
                    cache.put(id, tracking.clone());
                }
                Some(tracking)
            }
            Ok(None) => None,
            Err(err) => {
                logging::log_error(&format!("position backup load failed for {}: {}", id.0, err));
                None
            }
        }
    }

    /// Drops a stale mission anchor from the persisted record, leaving the
    /// position fields alone.
    pub fn clear_mission_entry(&self, id: CharacterId) -> Result<(), String> {
        let Some(mut tracking) = self.load(id) else {
            return Ok(());
        };
        if tracking.mission_entry.take().is_none() {
            return Ok(());
        }
        self.save(id, &tracking)
    }

    pub fn validate_saves(&self) -> SaveValidationReport {
        self.characters.validate_saves()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::snapshot::{MissionAnchor, PositionSnapshot};
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_adapter() -> (PersistenceAdapter, PathBuf) {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("blitz-adapter-test-{}", suffix));
        std::fs::create_dir_all(&dir).expect("dir");
        (PersistenceAdapter::from_root(&dir), dir)
    }

    fn sample_tracking() -> PositionTracking {
        PositionTracking {
            last_world_position: Some(PositionSnapshot::new(
                360.0,
                1458.99,
                0.0,
                "BridgeTown",
                1_000,
            )),
            current_position: Some(PositionSnapshot::new(
                100.0,
                200.0,
                0.0,
                "BT_Mission1",
                2_000,
            )),
            mission_entry: Some(MissionAnchor {
                snapshot: PositionSnapshot::new(360.0, 1458.99, 0.0, "BridgeTown", 1_000),
                mission: "BT_Mission1".to_string(),
            }),
            logging_enabled: true,
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let (adapter, dir) = temp_adapter();
        adapter
            .save(CharacterId(1), &sample_tracking())
            .expect("save");
        let loaded = adapter.load(CharacterId(1)).expect("load");
        assert_eq!(loaded, sample_tracking());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn cache_serves_after_primary_is_deleted() {
        let (adapter, dir) = temp_adapter();
        adapter
            .save(CharacterId(2), &sample_tracking())
            .expect("save");
        std::fs::remove_dir_all(dir.join("save").join("characters")).expect("delete saves");

        assert!(adapter.load(CharacterId(2)).is_some());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn backup_serves_when_primary_and_cache_miss() {
        let (adapter, dir) = temp_adapter();
        adapter
            .save(CharacterId(3), &sample_tracking())
            .expect("save");
        std::fs::remove_dir_all(dir.join("save").join("characters")).expect("delete saves");

        // Fresh adapter over the same root has a cold cache.
        let adapter = PersistenceAdapter::from_root(&dir);
        let restored = adapter.load(CharacterId(3)).expect("restored");
        assert_eq!(restored, sample_tracking());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn clear_mission_entry_preserves_positions() {
        let (adapter, dir) = temp_adapter();
        adapter
            .save(CharacterId(4), &sample_tracking())
            .expect("save");
        adapter.clear_mission_entry(CharacterId(4)).expect("clear");

        let loaded = adapter.load(CharacterId(4)).expect("load");
        assert!(loaded.mission_entry.is_none());
        assert!(loaded.last_world_position.is_some());
        assert!(loaded.current_position.is_some());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unknown_character_loads_as_none() {
        let (adapter, dir) = temp_adapter();
        assert!(adapter.load(CharacterId(404)).is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
