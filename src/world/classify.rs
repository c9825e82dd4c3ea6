use crate::world::levels::LevelCatalog;

/// Which kind of space a level belongs to. World space is the persistent
/// shared overworld; mission space is instanced content entered via a door.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    World,
    Mission,
}

/// Towns and overworld zones that never count as mission space, regardless of
/// their catalog `instanced` flag (the per-player home instances among them
/// still behave as world space for position tracking).
pub const WORLD_LEVELS: [&str; 12] = [
    "CraftTown",
    "CraftTownTutorial",
    "BridgeTown",
    "BridgeTownHard",
    "NewbieRoad",
    "NewbieRoadHard",
    "CemeteryHill",
    "CemeteryHillHard",
    "Castle",
    "CastleHard",
    "LavaLands",
    "LavaLandsHard",
];

const MISSION_KEYWORDS: [&str; 8] = [
    "mission",
    "dungeon",
    "arena",
    "boss",
    "elite",
    "challenge",
    "raid",
    "instance",
];

/// The starting-town tutorial is world space even though every other
/// tutorial level is a mission instance.
const STARTING_TOWN_TUTORIAL: &str = "CraftTownTutorial";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub space: Space,
    /// True when no rule matched and the fail-safe world default was taken.
    pub defaulted: bool,
}

pub fn classify(level: &str, catalog: &LevelCatalog) -> Space {
    classify_detailed(level, catalog).space
}

/// Total over all strings: unknown names classify as world so a bad catalog
/// never strands a player's saved position.
pub fn classify_detailed(level: &str, catalog: &LevelCatalog) -> Classification {
    if WORLD_LEVELS
        .iter()
        .any(|world| world.eq_ignore_ascii_case(level))
    {
        return Classification {
            space: Space::World,
            defaulted: false,
        };
    }

    let lowered = level.to_ascii_lowercase();
    if MISSION_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
    {
        return Classification {
            space: Space::Mission,
            defaulted: false,
        };
    }

    if lowered.contains("tutorial") && !level.eq_ignore_ascii_case(STARTING_TOWN_TUTORIAL) {
        return Classification {
            space: Space::Mission,
            defaulted: false,
        };
    }

    match catalog.is_instanced(level) {
        Some(true) => Classification {
            space: Space::Mission,
            defaulted: false,
        },
        Some(false) => Classification {
            space: Space::World,
            defaulted: false,
        },
        None => Classification {
            space: Space::World,
            defaulted: true,
        },
    }
}
