use crate::tracking::snapshot::{
    CharacterId, MissionAnchor, PositionSnapshot, PositionTracking,
};
use std::fs;
use std::path::{Path, PathBuf};

const SAVE_HEADER: &str = "# blitz character save v1";

const KEY_ID: &str = "Id                   = ";
const KEY_NAME: &str = "Name                 = ";
const KEY_LAST_WORLD: &str = "LastWorldPosition    = ";
const KEY_CURRENT: &str = "CurrentPosition      = ";
const KEY_MISSION_ENTRY: &str = "MissionEntryPosition = ";
const KEY_LOGGING: &str = "PositionLogging      = ";

/// The authoritative on-disk record for one character.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterRecord {
    pub id: CharacterId,
    pub name: Option<String>,
    pub tracking: PositionTracking,
}

impl CharacterRecord {
    pub fn new(id: CharacterId) -> Self {
        Self {
            id,
            name: None,
            tracking: PositionTracking::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SaveValidationReport {
    pub character_files: usize,
    pub parsed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    pub missing_dir: bool,
}

/// Line-oriented `.sav` files under `<root>/save/characters/`. Every write
/// first copies the previous file to `<id>.sav#`; loads fall back to that
/// backup when the primary is missing or fails to parse.
#[derive(Debug, Clone)]
pub struct CharacterStore {
    root: PathBuf,
}

impl CharacterStore {
    pub fn from_root(root: &Path) -> Self {
        Self {
            root: root.join("save"),
        }
    }

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn load(&self, id: CharacterId) -> Result<Option<CharacterRecord>, String> {
        let path = self.character_path(id);
        let backup_path = self.character_backup_path(id);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return self.load_from_backup(id, &backup_path);
            }
            Err(err) => {
                return Err(format!(
                    "character save read failed for {}: {}",
                    path.display(),
                    err
                ))
            }
        };
        match parse_record(id, &data) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                if let Some(fallback) = self.load_from_backup(id, &backup_path)? {
                    eprintln!(
                        "blitz: save parse failed for {}, using backup: {}",
                        path.display(),
                        err
                    );
                    return Ok(Some(fallback));
                }
                Err(err)
            }
        }
    }

    pub fn save(&self, record: &CharacterRecord) -> Result<(), String> {
        fs::create_dir_all(self.character_dir()).map_err(|err| {
            format!(
                "character save dir create failed for {}: {}",
                self.character_dir().display(),
                err
            )
        })?;
        let path = self.character_path(record.id);
        let backup_path = self.character_backup_path(record.id);
        if path.exists() {
            fs::copy(&path, &backup_path).map_err(|err| {
                format!(
                    "character save backup failed for {}: {}",
                    backup_path.display(),
                    err
                )
            })?;
        }
        fs::write(&path, serialize_record(record)).map_err(|err| {
            format!(
                "character save write failed for {}: {}",
                path.display(),
                err
            )
        })
    }

    /// Startup sweep over every `.sav` file; parse failures are reported but
    /// never abort the sweep.
    pub fn validate_saves(&self) -> SaveValidationReport {
        let dir = self.character_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return SaveValidationReport {
                    missing_dir: true,
                    ..SaveValidationReport::default()
                };
            }
            Err(err) => {
                return SaveValidationReport {
                    errors: vec![format!(
                        "character save dir read failed for {}: {}",
                        dir.display(),
                        err
                    )],
                    ..SaveValidationReport::default()
                };
            }
        };

        let mut report = SaveValidationReport::default();
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".sav") {
                continue;
            }
            report.character_files += 1;
            let Some(id) = name
                .strip_suffix(".sav")
                .and_then(|stem| stem.parse::<u32>().ok())
                .map(CharacterId)
            else {
                report.skipped += 1;
                report
                    .errors
                    .push(format!("unrecognized save file name: {}", name));
                continue;
            };
            match fs::read_to_string(&path) {
                Ok(data) => match parse_record(id, &data) {
                    Ok(_) => report.parsed += 1,
                    Err(err) => {
                        report.skipped += 1;
                        report.errors.push(err);
                    }
                },
                Err(err) => {
                    report.skipped += 1;
                    report
                        .errors
                        .push(format!("read failed for {}: {}", path.display(), err));
                }
            }
        }
        report
    }

    fn load_from_backup(
        &self,
        id: CharacterId,
        backup_path: &Path,
    ) -> Result<Option<CharacterRecord>, String> {
        let data = match fs::read_to_string(backup_path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(format!(
                    "character backup read failed for {}: {}",
                    backup_path.display(),
                    err
                ))
            }
        };
        parse_record(id, &data).map(Some)
    }

    fn character_dir(&self) -> PathBuf {
        self.root.join("characters")
    }

    fn character_path(&self, id: CharacterId) -> PathBuf {
        self.character_dir().join(format!("{}.sav", id.0))
    }

    fn character_backup_path(&self, id: CharacterId) -> PathBuf {
        self.character_dir().join(format!("{}.sav#", id.0))
    }
}

fn serialize_record(record: &CharacterRecord) -> String {
    let mut out = String::new();
    out.push_str(SAVE_HEADER);
    out.push('\n');
    out.push_str(KEY_ID);
    out.push_str(&record.id.0.to_string());
    out.push('\n');
    if let Some(name) = &record.name {
        out.push_str(KEY_NAME);
        out.push_str(&quote(name));
        out.push('\n');
    }
    if let Some(snapshot) = &record.tracking.last_world_position {
        out.push_str(KEY_LAST_WORLD);
        out.push_str(&serialize_snapshot(snapshot));
        out.push('\n');
    }
    if let Some(snapshot) = &record.tracking.current_position {
        out.push_str(KEY_CURRENT);
        out.push_str(&serialize_snapshot(snapshot));
        out.push('\n');
    }
    if let Some(anchor) = &record.tracking.mission_entry {
        out.push_str(KEY_MISSION_ENTRY);
        out.push_str(&serialize_anchor(anchor));
        out.push('\n');
    }
    out.push_str(KEY_LOGGING);
    out.push_str(if record.tracking.logging_enabled {
        "true"
    } else {
        "false"
    });
    out.push('\n');
    out
}

fn serialize_snapshot(snapshot: &PositionSnapshot) -> String {
    format!(
        "({}, {}, {}, {}, {})",
        snapshot.x,
        snapshot.y,
        snapshot.z,
        snapshot.timestamp_ms,
        quote(&snapshot.level)
    )
}

fn serialize_anchor(anchor: &MissionAnchor) -> String {
    format!(
        "({}, {}, {}, {}, {}, {})",
        anchor.snapshot.x,
        anchor.snapshot.y,
        anchor.snapshot.z,
        anchor.snapshot.timestamp_ms,
        quote(&anchor.snapshot.level),
        quote(&anchor.mission)
    )
}

fn parse_record(id: CharacterId, data: &str) -> Result<CharacterRecord, String> {
    let mut record = CharacterRecord::new(id);
    for (line_no, raw_line) in data.lines().enumerate() {
        let line = raw_line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = split_key_value(line) else {
            return Err(format!(
                "character save line {} malformed: '{}'",
                line_no + 1,
                line
            ));
        };
        match key {
            "Id" => {
                let saved: u32 = value
                    .parse()
                    .map_err(|_| format!("character save id parse failed: '{}'", value))?;
                if saved != id.0 {
                    return Err(format!(
                        "character save id mismatch: expected {}, got {}",
                        id.0, saved
                    ));
                }
            }
            "Name" => record.name = Some(unquote(value)?),
            "LastWorldPosition" => {
                record.tracking.last_world_position = Some(parse_snapshot(value)?)
            }
            "CurrentPosition" => record.tracking.current_position = Some(parse_snapshot(value)?),
            "MissionEntryPosition" => record.tracking.mission_entry = Some(parse_anchor(value)?),
            "PositionLogging" => {
                record.tracking.logging_enabled = match value {
                    "true" => true,
                    "false" => false,
                    other => {
                        return Err(format!(
                            "character save logging flag invalid: '{}'",
                            other
                        ))
                    }
                }
            }
            other => {
                return Err(format!("character save key unknown: '{}'", other));
            }
        }
    }
    Ok(record)
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    Some((key.trim(), value.trim()))
}

fn parse_snapshot(value: &str) -> Result<PositionSnapshot, String> {
    let fields = tuple_fields(value)?;
    if fields.len() != 5 {
        return Err(format!(
            "position tuple has {} fields, expected 5: '{}'",
            fields.len(),
            value
        ));
    }
    Ok(PositionSnapshot {
        x: parse_f64(&fields[0])?,
        y: parse_f64(&fields[1])?,
        z: parse_f64(&fields[2])?,
        timestamp_ms: parse_u64(&fields[3])?,
        level: unquote(&fields[4])?,
    })
}

fn parse_anchor(value: &str) -> Result<MissionAnchor, String> {
    let fields = tuple_fields(value)?;
    if fields.len() != 6 {
        return Err(format!(
            "mission entry tuple has {} fields, expected 6: '{}'",
            fields.len(),
            value
        ));
    }
    Ok(MissionAnchor {
        snapshot: PositionSnapshot {
            x: parse_f64(&fields[0])?,
            y: parse_f64(&fields[1])?,
            z: parse_f64(&fields[2])?,
            timestamp_ms: parse_u64(&fields[3])?,
            level: unquote(&fields[4])?,
        },
        mission: unquote(&fields[5])?,
    })
}

/// Splits `(a, b, "c, d")` on top-level commas, respecting quoted strings.
fn tuple_fields(value: &str) -> Result<Vec<String>, String> {
    let inner = value
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| format!("tuple missing parentheses: '{}'", value))?;
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    for ch in inner.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                current.push(ch);
                in_quotes = !in_quotes;
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if in_quotes {
        return Err(format!("tuple has unterminated string: '{}'", value));
    }
    fields.push(current.trim().to_string());
    Ok(fields)
}

fn parse_f64(value: &str) -> Result<f64, String> {
    value
        .parse::<f64>()
        .map_err(|_| format!("coordinate parse failed: '{}'", value))
}

fn parse_u64(value: &str) -> Result<u64, String> {
    value
        .parse::<u64>()
        .map_err(|_| format!("timestamp parse failed: '{}'", value))
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

fn unquote(value: &str) -> Result<String, String> {
    let inner = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or_else(|| format!("string missing quotes: '{}'", value))?;
    let mut out = String::with_capacity(inner.len());
    let mut escaped = false;
    for ch in inner.chars() {
        if escaped {
            out.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else {
            out.push(ch);
        }
    }
    if escaped {
        return Err(format!("string has dangling escape: '{}'", value));
    }
    Ok(out)
}
