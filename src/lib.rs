mod config;
pub mod persistence;
pub mod session;
pub mod telemetry;
pub mod tracking;
pub mod world;

pub use persistence::adapter::PersistenceAdapter;
pub use session::hooks::SessionHooks;
pub use tracking::reporter::{
    LogSink, PositionReporter, ReportSink, DEFAULT_REPORT_INTERVAL,
};
pub use tracking::snapshot::{
    CharacterId, MissionAnchor, PositionSnapshot, PositionTracking, SessionId,
};
pub use tracking::store::{PositionStore, StoreError, UpdateOutcome};
pub use tracking::transition::{SpawnPoint, TransitionCoordinator, TransitionOutcome};
pub use world::classify::{classify, Space};
pub use world::levels::{LevelCatalog, LevelEntry};

use std::sync::Arc;
use std::time::Duration;

pub fn run(args: &[String]) -> Result<(), String> {
    let config = config::AppConfig::from_args(args)?;
    telemetry::logging::init(&config.root)?;

    let catalog = Arc::new(LevelCatalog::load(
        &config.root,
        config.levels_file.as_deref(),
    )?);
    let adapter = Arc::new(PersistenceAdapter::from_root(&config.root));

    let save_report = adapter.validate_saves();
    println!("blitz: startup");
    println!("- root: {}", config.root.display());
    println!("- levels: {}", catalog.len());
    println!(
        "- report interval: {}s",
        config.report_interval.as_secs()
    );
    if save_report.missing_dir {
        println!("- character saves: missing save/characters directory");
    } else {
        println!(
            "- character saves: files={}, parsed={}, errors={}, skipped={}",
            save_report.character_files,
            save_report.parsed,
            save_report.errors.len(),
            save_report.skipped
        );
    }
    for err in &save_report.errors {
        eprintln!("blitz: save validate {}", err);
    }
    telemetry::logging::log_game(&format!(
        "startup: levels={}, saves={}, save_errors={}",
        catalog.len(),
        save_report.character_files,
        save_report.errors.len()
    ));

    let store = Arc::new(PositionStore::new(catalog));
    let reporter = Arc::new(PositionReporter::with_interval(
        store.clone(),
        config.report_interval,
    ));
    let hooks = SessionHooks::new(store.clone(), adapter, reporter);

    walkthrough(&hooks, &store)?;
    println!("blitz: walkthrough complete, stale updates dropped: {}", store.stale_update_count());
    Ok(())
}

/// Scripted session exercising the full tracking lifecycle against the data
/// root: login, world movement, a mission round trip, logout.
fn walkthrough(hooks: &SessionHooks, store: &PositionStore) -> Result<(), String> {
    const SESSION: SessionId = SessionId(1);
    const CHARACTER: CharacterId = CharacterId(1);

    println!("blitz: walkthrough");
    hooks.on_world_entry(
        SESSION,
        CHARACTER,
        PositionSnapshot::now(360.0, 1458.99, 0.0, "BridgeTown"),
    )?;
    println!("- entered BridgeTown at (360.00, 1458.99)");

    for (x, y) in [(400.0, 1400.0), (450.0, 1350.0), (500.0, 1300.0)] {
        step();
        hooks.on_level_transfer_committed(SESSION, "BridgeTown", x, y, 0.0)?;
        println!("- moved to ({x:.2}, {y:.2})");
    }

    step();
    let outcome = hooks.on_door_use(SESSION, "BridgeTown", "BT_Mission1")?;
    println!("- door to BT_Mission1: {:?}", outcome);
    hooks.on_level_transfer_committed(SESSION, "BT_Mission1", 100.0, 200.0, 0.0)?;

    for (x, y) in [(150.0, 250.0), (200.0, 300.0)] {
        step();
        hooks.on_level_transfer_committed(SESSION, "BT_Mission1", x, y, 0.0)?;
        println!("- mission move to ({x:.2}, {y:.2})");
    }

    step();
    let outcome = hooks.on_door_use(SESSION, "BT_Mission1", "BridgeTown")?;
    match &outcome {
        TransitionOutcome::Restore(point) => {
            println!(
                "- returned to {} at ({:.2}, {:.2})",
                point.level, point.x, point.y
            );
            let point = point.clone();
            step();
            hooks.on_level_transfer_committed(SESSION, &point.level, point.x, point.y, point.z)?;
        }
        other => println!("- door back: {:?}", other),
    }

    step();
    hooks.on_session_end(SESSION)?;
    println!("- session ended, sessions live: {}", store.len());
    Ok(())
}

fn step() {
    // Consecutive updates within the same millisecond would be dropped as
    // stale; give the clock room to advance.
    std::thread::sleep(Duration::from_millis(5));
}
