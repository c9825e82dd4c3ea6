use crate::telemetry::logging;
use crate::tracking::snapshot::SessionId;
use crate::tracking::store::PositionStore;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Destination for sampled position lines.
pub trait ReportSink: Send + Sync {
    fn emit(&self, line: &str);
}

/// Default sink: the position log plus stdout, mirroring how the rest of the
/// server surfaces operator-facing events.
pub struct LogSink;

impl ReportSink for LogSink {
    fn emit(&self, line: &str) {
        logging::log_position(line);
        println!("blitz: {line}");
    }
}

struct StopSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl StopSignal {
    fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn signal(&self) {
        let mut stopped = match self.stopped.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *stopped = true;
        self.condvar.notify_all();
    }

    /// Sleeps for `interval` unless stopped first. Returns true when the
    /// worker should keep running.
    fn wait(&self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        let mut stopped = match self.stopped.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        loop {
            if *stopped {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            let (guard, _) = match self.condvar.wait_timeout(stopped, deadline - now) {
                Ok(result) => result,
                Err(poisoned) => poisoned.into_inner(),
            };
            stopped = guard;
        }
    }
}

struct Worker {
    signal: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

/// Samples each started session's position on a fixed interval from a
/// dedicated thread. `stop` joins the worker, so once it returns no further
/// line for that session is emitted.
pub struct PositionReporter {
    store: Arc<PositionStore>,
    sink: Arc<dyn ReportSink>,
    interval: Duration,
    workers: Mutex<HashMap<SessionId, Worker>>,
}

impl PositionReporter {
    pub fn new(store: Arc<PositionStore>) -> Self {
        Self::with_sink(store, DEFAULT_REPORT_INTERVAL, Arc::new(LogSink))
    }

    pub fn with_interval(store: Arc<PositionStore>, interval: Duration) -> Self {
        Self::with_sink(store, interval, Arc::new(LogSink))
    }

    pub fn with_sink(
        store: Arc<PositionStore>,
        interval: Duration,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            store,
            sink,
            interval,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Starts sampling a session. Starting an already-sampled session does
    /// nothing.
    pub fn start(&self, session: SessionId) -> Result<(), String> {
        let character = self
            .store
            .character_of(session)
            .map_err(|err| err.to_string())?;
        let mut workers = match self.workers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if workers.contains_key(&session) {
            return Ok(());
        }

        let signal = Arc::new(StopSignal::new());
        let worker_signal = signal.clone();
        let store = self.store.clone();
        let sink = self.sink.clone();
        let interval = self.interval;
        let handle = std::thread::spawn(move || {
            while worker_signal.wait(interval) {
                // Session eviction ends the worker on its next tick.
                let Ok(state) = store.get(session) else {
                    break;
                };
                if !state.logging_enabled {
                    continue;
                }
                let Some(current) = state.current_position else {
                    continue;
                };
                sink.emit(&format!(
                    "character={} level={} x={:.2} y={:.2} z={:.2}",
                    character.0, current.level, current.x, current.y, current.z
                ));
            }
        });
        workers.insert(session, Worker { signal, handle });
        Ok(())
    }

    /// Stops sampling a session and joins its worker. Stopping an unknown
    /// session is a no-op.
    pub fn stop(&self, session: SessionId) {
        let worker = {
            let mut workers = match self.workers.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            workers.remove(&session)
        };
        if let Some(worker) = worker {
            worker.signal.signal();
            let _ = worker.handle.join();
        }
    }

    pub fn stop_all(&self) {
        let drained: Vec<(SessionId, Worker)> = {
            let mut workers = match self.workers.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            workers.drain().collect()
        };
        for (_, worker) in drained {
            worker.signal.signal();
            let _ = worker.handle.join();
        }
    }

    pub fn active_sessions(&self) -> usize {
        match self.workers.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl Drop for PositionReporter {
    fn drop(&mut self) {
        self.stop_all();
    }
}
