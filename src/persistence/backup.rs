use crate::telemetry::logging;
use crate::tracking::snapshot::{unix_millis, CharacterId, PositionTracking};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Secondary best-effort store: one YAML document holding the last known
/// tracking state per character. Used for recovery when a character save is
/// lost; never consulted while the primary loads cleanly.
#[derive(Debug, Clone)]
pub struct BackupStore {
    path: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BackupDocument {
    #[serde(default)]
    positions: BTreeMap<CharacterId, PositionTracking>,
    #[serde(rename = "lastUpdated", default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<u64>,
}

impl BackupStore {
    pub fn from_root(root: &Path) -> Self {
        Self {
            path: root.join("save").join("positions.yaml"),
        }
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self, id: CharacterId) -> Result<Option<PositionTracking>, String> {
        let mut document = self.read_document()?;
        Ok(document.positions.remove(&id))
    }

    /// Rewrites the document with this character's entry replaced. A corrupt
    /// existing document is discarded and rebuilt rather than surfaced; this
    /// store is allowed to lose history, the primary is not.
    pub fn store(&self, id: CharacterId, tracking: &PositionTracking) -> Result<(), String> {
        let mut document = match self.read_document() {
            Ok(document) => document,
            Err(err) => {
                logging::log_error(&format!("position backup rebuilt: {}", err));
                BackupDocument::default()
            }
        };
        document.positions.insert(id, tracking.clone());
        document.last_updated = Some(unix_millis());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "position backup dir create failed for {}: {}",
                    parent.display(),
                    err
                )
            })?;
        }
        let data = serde_yaml::to_string(&document)
            .map_err(|err| format!("position backup serialize failed: {}", err))?;
        fs::write(&self.path, data).map_err(|err| {
            format!(
                "position backup write failed for {}: {}",
                self.path.display(),
                err
            )
        })
    }

    fn read_document(&self) -> Result<BackupDocument, String> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BackupDocument::default())
            }
            Err(err) => {
                return Err(format!(
                    "position backup read failed for {}: {}",
                    self.path.display(),
                    err
                ))
            }
        };
        serde_yaml::from_str(&data).map_err(|err| {
            format!(
                "position backup parse failed for {}: {}",
                self.path.display(),
                err
            )
        })
    }
}
