//! The worker pool: `N` OS threads drain a bounded task queue of file
//! paths and run the per-file pipeline with full isolation — one file's
//! panic, timeout, or security rejection never affects another. The
//! bounded queue gives backpressure, so peak memory is independent of the
//! input list length.

use crate::config::EffectiveConfig;
use crate::engine::{self, Checkpoint, ErrorKind, FileOutcome, Mode};
use crate::rules::RuleRegistry;
use crate::security::SecurityGate;
use crossbeam_channel::{bounded, Sender};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Best-effort progress snapshot, rate-limited at the source.
#[derive(Debug, Clone)]
pub struct Progress {
    pub files_seen: usize,
    pub files_completed: usize,
    pub current_file: Option<PathBuf>,
}

/// Cooperative cancellation handle shared between the caller and the
/// workers.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn inner(&self) -> Arc<AtomicBool> {
        self.0.clone()
    }
}

#[derive(Debug)]
pub struct FileResult {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

/// Progress events are emitted at most once per this interval per worker.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(50);

struct ProgressReporter {
    sink: Option<Sender<Progress>>,
    seen: AtomicUsize,
    completed: AtomicUsize,
    last_emit: Mutex<Instant>,
}

impl ProgressReporter {
    fn new(sink: Option<Sender<Progress>>) -> Self {
        Self {
            sink,
            seen: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            last_emit: Mutex::new(Instant::now() - PROGRESS_INTERVAL),
        }
    }

    fn file_seen(&self) {
        self.seen.fetch_add(1, Ordering::Relaxed);
    }

    fn file_completed(&self, current: &PathBuf) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.maybe_emit(Some(current.clone()));
    }

    fn maybe_emit(&self, current: Option<PathBuf>) {
        let Some(sink) = &self.sink else { return };
        let mut last = match self.last_emit.lock() {
            Ok(last) => last,
            Err(_) => return,
        };
        if last.elapsed() < PROGRESS_INTERVAL {
            return;
        }
        *last = Instant::now();
        // Best effort: a full or closed sink never stalls the workers.
        let _ = sink.try_send(Progress {
            files_seen: self.seen.load(Ordering::Relaxed),
            files_completed: self.completed.load(Ordering::Relaxed),
            current_file: current,
        });
    }

    fn final_emit(&self) {
        let Some(sink) = &self.sink else { return };
        let _ = sink.try_send(Progress {
            files_seen: self.seen.load(Ordering::Relaxed),
            files_completed: self.completed.load(Ordering::Relaxed),
            current_file: None,
        });
    }
}

pub struct ParallelEngine {
    config: Arc<EffectiveConfig>,
    registry: Arc<RuleRegistry>,
    gate: Arc<SecurityGate>,
}

impl ParallelEngine {
    pub fn new(
        config: Arc<EffectiveConfig>,
        registry: Arc<RuleRegistry>,
        gate: Arc<SecurityGate>,
    ) -> Self {
        Self {
            config,
            registry,
            gate,
        }
    }

    fn worker_count(&self) -> usize {
        match self.config.processing.thread_pool_size {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            n => n,
        }
    }

    /// Processes every path and returns one result per input. Results
    /// arrive in completion order; the multiset is independent of the
    /// worker count.
    pub fn run(
        &self,
        paths: Vec<PathBuf>,
        mode: Mode,
        cancel: &CancelFlag,
        progress: Option<Sender<Progress>>,
    ) -> Vec<FileResult> {
        let workers = self.worker_count();
        let queue_depth = match self.config.processing.queue_depth {
            0 => workers * 4,
            n => n,
        };
        debug!(workers, queue_depth, files = paths.len(), "starting run");

        let (task_tx, task_rx) = bounded::<PathBuf>(queue_depth);
        let results: Mutex<Vec<FileResult>> = Mutex::new(Vec::with_capacity(paths.len()));
        let reporter = ProgressReporter::new(progress);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let task_rx = task_rx.clone();
                let results = &results;
                let reporter = &reporter;
                let config = &self.config;
                let registry = &self.registry;
                let gate = &self.gate;
                let cancel = cancel.clone();
                scope.spawn(move || {
                    while let Ok(path) = task_rx.recv() {
                        let outcome = if cancel.is_cancelled() {
                            FileOutcome::Error {
                                kind: ErrorKind::Cancelled,
                                message: "cancelled".into(),
                            }
                        } else {
                            run_one(&path, config, registry, gate, mode, &cancel)
                        };
                        reporter.file_completed(&path);
                        let mut results = results.lock().unwrap_or_else(|e| e.into_inner());
                        results.push(FileResult { path, outcome });
                    }
                });
            }

            // Feed the bounded queue; `send` blocks when it is full, which
            // is the backpressure bound on peak memory.
            for path in paths {
                reporter.file_seen();
                if task_tx.send(path).is_err() {
                    break;
                }
            }
            drop(task_tx);
        });

        reporter.final_emit();
        results.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

/// One file, fully isolated: panics inside the pipeline are caught and
/// reported as an internal error for that file only.
fn run_one(
    path: &PathBuf,
    config: &EffectiveConfig,
    registry: &RuleRegistry,
    gate: &SecurityGate,
    mode: Mode,
    cancel: &CancelFlag,
) -> FileOutcome {
    let checkpoint = Checkpoint::new(cancel.inner(), config.processing.per_file_timeout);
    let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
        engine::process_file(path, gate, config, registry, mode, &checkpoint)
    }));
    match result {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".to_owned());
            warn!(path = %path.display(), message, "file processing panicked");
            FileOutcome::Error {
                kind: ErrorKind::Internal,
                message,
            }
        }
    }
}
