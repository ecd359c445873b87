use crate::Mode;
use crate::store::Store;
use crate::workload::counters::Counters;
use crate::workload::reporter::StatsReporter;
use crate::workload::{Engine, RunConfig, RunSummary, WorkerStats, WorkloadError};
use anyhow::anyhow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{error, info};

/// Set by workers as they finish or fail, polled by the coordinator.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    finished: AtomicUsize,
    failed: AtomicBool,
}

impl CompletionSignal {
    fn finish(&self) {
        self.finished.fetch_add(1, Ordering::Release);
    }

    fn fail(&self) {
        self.failed.store(true, Ordering::Release);
    }

    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// True once any worker has finished its count or failed.
    pub fn is_set(&self) -> bool {
        self.finished.load(Ordering::Acquire) > 0 || self.failed()
    }
}

/// Marks the signal failed if the worker unwinds.
struct PanicGuard<'a>(&'a CompletionSignal);

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.fail();
        }
    }
}

pub fn target_path(prefix: &str, seq: u64) -> String {
    format!("{prefix}/{seq}")
}

fn worker_loop(
    engine: &mut Engine,
    thread: u32,
    config: &RunConfig,
    signal: &CompletionSignal,
) -> Result<(), WorkloadError> {
    let prefix = format!("/{thread}");
    let mut seq = 0u64;
    while config.count == 0 || seq != config.count {
        if signal.failed() {
            break;
        }
        let path = target_path(&prefix, seq);
        match config.mode {
            Mode::Put => engine.put(&path)?,
            Mode::Read => engine.read(&path)?,
        }
        seq += 1;
    }
    Ok(())
}

fn run_worker(
    store: Arc<dyn Store>,
    counters: Arc<Counters>,
    thread: u32,
    config: &RunConfig,
    signal: &CompletionSignal,
) -> Result<WorkerStats, WorkloadError> {
    let _guard = PanicGuard(signal);
    let result = Engine::new(store, counters, config.seed, thread, config.file_size).and_then(|mut e| {
        worker_loop(&mut e, thread, config, signal)?;
        Ok(e.into_stats())
    });
    match &result {
        Ok(_) => signal.finish(),
        Err(e) => {
            error!(thread, error = %e, "worker failed");
            signal.fail();
        }
    }
    result
}

/// Runs one worker per configured thread plus the stats reporter, and waits
/// until the first worker is done. Every worker is then joined; a failure in
/// any of them stops the others after their current operation and is
/// returned.
pub fn run(store: Arc<dyn Store>, config: &RunConfig) -> anyhow::Result<RunSummary> {
    config.validate()?;
    info!(
        mode = %config.mode,
        threads = config.threads,
        count = config.count,
        seed = config.seed,
        file_size = config.file_size,
        "starting run"
    );

    let counters = Arc::new(Counters::default());
    let signal = Arc::new(CompletionSignal::default());
    let reporter = StatsReporter::start(counters.clone(), config.report_interval)?;
    let start = Instant::now();

    let handles = (0..config.threads)
        .map(|i| {
            let store = store.clone();
            let counters = counters.clone();
            let signal = signal.clone();
            let config = config.clone();
            std::thread::Builder::new()
                .name(format!("worker-{i}"))
                .spawn(move || run_worker(store, counters, i, &config, &signal))
        })
        .collect::<std::io::Result<Vec<_>>>()?;

    while !signal.is_set() {
        std::thread::sleep(config.poll_interval);
    }

    let mut stats = WorkerStats::new()?;
    let mut first_err = None;
    for (i, h) in handles.into_iter().enumerate() {
        match h.join() {
            Ok(Ok(s)) => stats.merge(&s)?,
            Ok(Err(e)) => {
                first_err.get_or_insert(anyhow::Error::new(e).context(format!("worker {i} failed")));
            }
            Err(_) => {
                first_err.get_or_insert(anyhow!("worker {i} panicked"));
            }
        }
    }
    let elapsed = start.elapsed();
    reporter.stop();

    if let Some(e) = first_err {
        return Err(e);
    }
    info!(ops = stats.ops(), elapsed = ?elapsed, "run complete");
    Ok(RunSummary {
        mode: config.mode,
        total_ops: config.count * config.threads as u64,
        elapsed,
        stats,
    })
}
