use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Raw level table in the catalog's wire shape:
/// `"<asset> <enter> <exit> <instanced> [Hard]"`.
/// The shipped defaults cover the main world plus the mission chains that
/// hang off each town.
pub const RAW_LEVELS: &[(&str, &str)] = &[
    ("CraftTown", "LevelsHome.swf/a_Level_Home 1 1 true"),
    ("CraftTownTutorial", "LevelsHome.swf/a_Level_HomeTutorial 1 1 true"),
    ("TutorialBoat", "LevelsTut.swf/a_Level_TutorialBoat 1 1 true"),
    ("NewbieRoad", "LevelsNR.swf/a_Level_NewbieRoad 1 1 false"),
    ("NewbieRoadHard", "LevelsNR.swf/a_Level_NewbieRoad 36 1 false Hard"),
    ("TutorialDungeon", "LevelsNR.swf/a_Level_NRTutorial 2 2 true"),
    ("TutorialDungeonHard", "LevelsNR.swf/a_Level_GoblinBeachHard 37 2 true Hard"),
    ("GoblinRiverDungeon", "LevelsNR.swf/a_Level_GoblinRiver 3 3 true"),
    ("GhostBossDungeon", "LevelsNR.swf/a_Level_NRGhost 4 4 true"),
    ("DreamDragonDungeon", "LevelsNR.swf/a_Level_NRDragon 5 5 true"),
    ("SwampRoadNorth", "LevelsSRN.swf/a_Level_SwampRoadNorth 6 6 false"),
    ("SwampRoadNorthHard", "LevelsSRN.swf/a_Level_SwampRoadNorth 31 6 false Hard"),
    ("SRN_Mission1", "LevelsSRN.swf/a_Level_SRNMission1Castout 6 6 true"),
    ("SRN_Mission2", "LevelsSRN.swf/a_Level_SRNMission2Yornak 7 7 true"),
    ("SRN_Mission3", "LevelsSRN.swf/a_Level_SRNMission3Svar 8 8 true"),
    ("SwampRoadConnection", "LevelsSRN.swf/a_Level_SwampRoadConnection 10 10 false"),
    ("BridgeTown", "LevelsBT.swf/a_Level_BridgeTown 10 10 false"),
    ("BridgeTownHard", "LevelsBT.swf/a_Level_BridgeTown 25 10 false Hard"),
    ("BridgeTownEast", "LevelsBT.swf/a_Room_BTZ_BridgeTownEast 25 10 false"),
    ("BT_Mission1", "LevelsBT.swf/a_Level_BTMission1 11 11 true"),
    ("BT_Mission1Hard", "LevelsBT.swf/a_Level_BTMission1 26 11 true Hard"),
    ("BT_Mission2", "LevelsBT.swf/a_Level_BTMission2 12 12 true"),
    ("BT_Mission3", "LevelsBT.swf/a_Level_BTMission3 14 14 true"),
    ("BT_Mission4", "LevelsBT.swf/a_Level_BTMission4 15 15 true"),
    ("LDArena1", "LevelsLD.swf/a_Level_LDArena1 50 50 true"),
    ("CemeteryHill", "LevelsCH.swf/a_Level_CemeteryHill 11 11 false"),
    ("CemeteryHillHard", "LevelsCH.swf/a_Level_CemeteryHill 26 11 false Hard"),
    ("CH_Mission1", "LevelsCH.swf/a_Level_CHMission1 11 11 true"),
    ("CH_Mission2", "LevelsCH.swf/a_Level_CHMission2 11 11 true"),
    ("CH_Mission3", "LevelsCH.swf/a_Level_CHMission3 13 13 true"),
    ("CH_MiniMission1", "LevelsCH.swf/a_Level_CHMini1 11 11 true"),
    ("CH_MiniMission2", "LevelsCH.swf/a_Level_CHMini2 11 11 true"),
    ("OldMineMountain", "LevelsOMM.swf/a_Level_OldMineMountain 16 16 false"),
    ("OMM_Mission1", "LevelsOMM.swf/a_Level_OMMMission01GiveVoiceToStone 16 16 true"),
    ("OMM_Mission2", "LevelsOMM.swf/a_Level_OMMMission02RockHulkGarden 16 16 true"),
    ("Castle", "LevelsCastle.swf/a_Level_Castle 20 20 false"),
    ("CastleHard", "LevelsCastle.swf/a_Level_Castle 35 20 false Hard"),
    ("LavaLands", "LevelsLL.swf/a_Level_LavaLands 22 22 false"),
    ("LavaLandsHard", "LevelsLL.swf/a_Level_LavaLands 37 22 false Hard"),
    ("EmeraldGlades", "LevelsEG.swf/a_Level_EmeraldGlade 19 19 false"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelEntry {
    pub asset: String,
    pub enter_level: u16,
    pub exit_level: u16,
    pub instanced: bool,
    pub hard: bool,
}

impl LevelEntry {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut parts = raw.split_whitespace();
        let asset = parts
            .next()
            .ok_or_else(|| "level entry missing asset".to_string())?
            .to_string();
        let enter_level = parse_u16(parts.next(), "enter level")?;
        let exit_level = parse_u16(parts.next(), "exit level")?;
        let instanced = match parts.next() {
            Some("true") => true,
            Some("false") => false,
            Some(other) => {
                return Err(format!("level entry instanced flag invalid: '{}'", other))
            }
            None => return Err("level entry missing instanced flag".to_string()),
        };
        let hard = match parts.next() {
            Some("Hard") => true,
            Some(other) => {
                return Err(format!("level entry trailing token invalid: '{}'", other))
            }
            None => false,
        };
        Ok(Self {
            asset,
            enter_level,
            exit_level,
            instanced,
            hard,
        })
    }
}

fn parse_u16(value: Option<&str>, label: &str) -> Result<u16, String> {
    value
        .ok_or_else(|| format!("level entry missing {}", label))?
        .parse::<u16>()
        .map_err(|_| format!("level entry {} parse failed", label))
}

/// The level-configuration boundary. The tracking engine only consults the
/// `instanced` attribute; the rest of the entry is carried for operators
/// inspecting the catalog.
#[derive(Debug, Clone, Default)]
pub struct LevelCatalog {
    entries: HashMap<String, LevelEntry>,
}

impl LevelCatalog {
    /// Catalog of the shipped default levels.
    pub fn built_in() -> Self {
        let mut entries = HashMap::new();
        for (name, raw) in RAW_LEVELS {
            match LevelEntry::parse(raw) {
                Ok(entry) => {
                    entries.insert((*name).to_string(), entry);
                }
                Err(err) => {
                    eprintln!("blitz: built-in level '{}' invalid: {}", name, err);
                }
            }
        }
        Self { entries }
    }

    pub fn from_raw<I, K, V>(raw: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut entries = HashMap::new();
        for (name, value) in raw {
            let name = name.as_ref();
            let value = value.as_ref();
            // Section separators in the raw table carry no entry.
            if name.starts_with('-') || value.trim().is_empty() {
                continue;
            }
            let entry = LevelEntry::parse(value)
                .map_err(|err| format!("level '{}' invalid: {}", name, err))?;
            entries.insert(name.to_string(), entry);
        }
        Ok(Self { entries })
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, String> {
        let data = fs::read_to_string(path)
            .map_err(|err| format!("level catalog read failed for {}: {}", path.display(), err))?;
        let raw: BTreeMap<String, String> = serde_yaml::from_str(&data)
            .map_err(|err| format!("level catalog parse failed for {}: {}", path.display(), err))?;
        Self::from_raw(raw)
    }

    /// Loads `levels.yaml` under the data root when present, otherwise the
    /// built-in table. An explicit override path must parse or loading fails.
    pub fn load(root: &Path, override_file: Option<&Path>) -> Result<Self, String> {
        if let Some(path) = override_file {
            return Self::from_yaml_file(path);
        }
        let default_path = root.join("levels.yaml");
        if default_path.exists() {
            return Self::from_yaml_file(&default_path);
        }
        Ok(Self::built_in())
    }

    pub fn get(&self, name: &str) -> Option<&LevelEntry> {
        self.entries.get(name)
    }

    pub fn is_instanced(&self, name: &str) -> Option<bool> {
        self.entries.get(name).map(|entry| entry.instanced)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn parse_plain_entry() {
        let entry = LevelEntry::parse("LevelsBT.swf/a_Level_BridgeTown 10 10 false").expect("parse");
        assert_eq!(entry.asset, "LevelsBT.swf/a_Level_BridgeTown");
        assert_eq!(entry.enter_level, 10);
        assert_eq!(entry.exit_level, 10);
        assert!(!entry.instanced);
        assert!(!entry.hard);
    }

    #[test]
    fn parse_hard_variant() {
        let entry =
            LevelEntry::parse("LevelsBT.swf/a_Level_BTMission1 26 11 true Hard").expect("parse");
        assert!(entry.instanced);
        assert!(entry.hard);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(LevelEntry::parse("").is_err());
        assert!(LevelEntry::parse("asset ten 10 true").is_err());
        assert!(LevelEntry::parse("asset 10 10 maybe").is_err());
        assert!(LevelEntry::parse("asset 10 10 true Soft").is_err());
    }

    #[test]
    fn built_in_covers_towns_and_missions() {
        let catalog = LevelCatalog::built_in();
        assert_eq!(catalog.is_instanced("BridgeTown"), Some(false));
        assert_eq!(catalog.is_instanced("BT_Mission1"), Some(true));
        assert_eq!(catalog.is_instanced("TutorialBoat"), Some(true));
        assert_eq!(catalog.is_instanced("NoSuchLevel"), None);
    }

    #[test]
    fn yaml_catalog_overrides_built_in() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("blitz-levels-test-{}", suffix));
        std::fs::create_dir_all(&dir).expect("dir");
        let path = dir.join("levels.yaml");
        std::fs::write(
            &path,
            "TinyTown: \"LevelsTT.swf/a_Level_TinyTown 1 1 false\"\nTT_Mission1: \"LevelsTT.swf/a_Level_TTMission1 2 2 true\"\n",
        )
        .expect("write");

        let catalog = LevelCatalog::load(&dir, None).expect("load");
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.is_instanced("TT_Mission1"), Some(true));
        assert_eq!(catalog.is_instanced("BridgeTown"), None);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
