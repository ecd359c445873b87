pub mod counters;
pub mod reporter;
pub mod runner;

use crate::Mode;
use crate::generator::{CONTENT_SIZE, RandomGenerator, random_string};
use crate::store::{FileHandle, FileOptions, Store, StoreError};
use crate::workload::counters::Counters;
use anyhow::ensure;
use hdrhistogram::Histogram;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thousands::Separable;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: Mode,
    /// Operations per worker, 0 runs forever.
    pub count: u64,
    pub threads: u32,
    pub seed: u32,
    /// Bytes per file.
    pub file_size: u64,
    pub report_interval: Duration,
    pub poll_interval: Duration,
}

impl RunConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.threads > 0, "Thread count must be at least 1");
        for i in 0..self.threads {
            let seed = self.seed.wrapping_add(i);
            ensure!(
                !RandomGenerator::is_degenerate_seed(seed),
                "Seed {} gives worker {} a degenerate generator state",
                self.seed,
                i
            );
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    #[error("open {path} failed: {source}")]
    Open { path: String, source: StoreError },
    #[error("write {path} failed: {source}")]
    Write { path: String, source: StoreError },
    #[error("short write on {path}: {written} of {requested} bytes")]
    ShortWrite { path: String, requested: usize, written: usize },
    #[error("close {path} failed: {source}")]
    Close { path: String, source: StoreError },
    #[error("read {path} failed: {source}")]
    Read { path: String, source: StoreError },
    #[error("content mismatch in {path} at offset {offset}")]
    Mismatch { path: String, offset: u64 },
    #[error("size mismatch on {path}: read {actual} bytes, expected {expected}")]
    SizeMismatch { path: String, expected: u64, actual: u64 },
    #[error("delete {path} failed: {source}")]
    Delete { path: String, source: StoreError },
    #[error(transparent)]
    Histogram(#[from] hdrhistogram::CreationError),
}

/// Latency and volume of the operations one worker completed.
#[derive(Debug)]
pub struct WorkerStats {
    ops: u64,
    bytes: u64,
    latency_micro_sec: Histogram<u64>,
}

impl WorkerStats {
    pub fn new() -> Result<Self, hdrhistogram::CreationError> {
        Ok(WorkerStats {
            ops: 0,
            bytes: 0,
            latency_micro_sec: Histogram::new_with_bounds(1, 600_000_000, 3)?,
        })
    }

    fn record(&mut self, elapsed: Duration, bytes: u64) {
        self.ops += 1;
        self.bytes += bytes;
        self.latency_micro_sec.saturating_record(elapsed.as_micros() as u64);
    }

    pub fn merge(&mut self, other: &WorkerStats) -> Result<(), hdrhistogram::AdditionError> {
        self.ops += other.ops;
        self.bytes += other.bytes;
        self.latency_micro_sec.add(&other.latency_micro_sec)
    }

    pub fn ops(&self) -> u64 {
        self.ops
    }
}

/// Drives put/read/delete for one worker. Owns the worker's generator, its
/// base content and the scratch buffer reads land in.
pub struct Engine {
    store: Arc<dyn Store>,
    counters: Arc<Counters>,
    rng: RandomGenerator,
    content: Vec<u8>,
    scratch: Vec<u8>,
    file_size: u64,
    thread: u32,
    stats: WorkerStats,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        counters: Arc<Counters>,
        seed: u32,
        thread: u32,
        file_size: u64,
    ) -> Result<Self, WorkloadError> {
        let mut rng = RandomGenerator::new(seed.wrapping_add(thread));
        let content = random_string(&mut rng, CONTENT_SIZE);
        Ok(Engine {
            store,
            counters,
            rng,
            content,
            scratch: vec![0u8; CONTENT_SIZE],
            file_size,
            thread,
            stats: WorkerStats::new()?,
        })
    }

    #[cfg(test)]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_stats(self) -> WorkerStats {
        self.stats
    }

    /// Writes `file_size` bytes to `path` in randomly sized chunks, each taken
    /// from the start of the content buffer.
    pub fn put(&mut self, path: &str) -> Result<(), WorkloadError> {
        let start = Instant::now();
        let mut f = self
            .store
            .open_file(path, FileOptions::write())
            .map_err(|source| WorkloadError::Open { path: path.to_owned(), source })?;

        let mut len = 0u64;
        while len < self.file_size {
            let w = self.rng.chunk_size();
            let remaining = self.file_size - len;
            let n = if remaining < w as u64 { remaining as usize } else { w };
            let written = f
                .write(&self.content[..n])
                .map_err(|source| WorkloadError::Write { path: path.to_owned(), source })?;
            if written != n {
                return Err(WorkloadError::ShortWrite {
                    path: path.to_owned(),
                    requested: n,
                    written,
                });
            }
            len += n as u64;
        }

        f.close()
            .map_err(|source| WorkloadError::Close { path: path.to_owned(), source })?;
        self.counters.inc_put();
        self.stats.record(start.elapsed(), len);
        debug!(thread = self.thread, path, bytes = len, "put");
        Ok(())
    }

    /// Reads `path` back in randomly sized chunks and checks every chunk
    /// against the prefix of the content buffer, then checks the total size.
    ///
    /// One chunk size is drawn per chunk, as in [`Engine::put`], so a read
    /// run replays the chunk layout of a put run with the same seed.
    pub fn read(&mut self, path: &str) -> Result<(), WorkloadError> {
        let start = Instant::now();
        let mut f = self
            .store
            .open_file(path, FileOptions::read())
            .map_err(|source| WorkloadError::Open { path: path.to_owned(), source })?;
        let read_err = |source: StoreError| WorkloadError::Read { path: path.to_owned(), source };

        let mut total = 0u64;
        loop {
            if total >= self.file_size {
                // end of stream must follow, probe without drawing a chunk size
                let extra = f.read(&mut self.scratch).map_err(read_err)?;
                if extra > 0 {
                    return Err(WorkloadError::SizeMismatch {
                        path: path.to_owned(),
                        expected: self.file_size,
                        actual: total + extra as u64,
                    });
                }
                break;
            }

            let r = self.rng.chunk_size();
            let n = fill(f.as_mut(), &mut self.scratch[..r]).map_err(read_err)?;
            if n == 0 {
                break;
            }
            if let Some(i) = first_mismatch(&self.content[..n], &self.scratch[..n]) {
                return Err(WorkloadError::Mismatch {
                    path: path.to_owned(),
                    offset: total + i as u64,
                });
            }
            total += n as u64;
            if n < r {
                break;
            }
        }

        if total != self.file_size {
            return Err(WorkloadError::SizeMismatch {
                path: path.to_owned(),
                expected: self.file_size,
                actual: total,
            });
        }
        f.close()
            .map_err(|source| WorkloadError::Close { path: path.to_owned(), source })?;
        self.counters.inc_read();
        self.stats.record(start.elapsed(), total);
        debug!(thread = self.thread, path, bytes = total, "read");
        Ok(())
    }

    // Not reachable from the put/read modes. The delete counter also moves
    // downwards while put and read move up; both are kept as they are.
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn delete(&mut self, path: &str) -> Result<(), WorkloadError> {
        self.store
            .delete_file(path)
            .map_err(|source| WorkloadError::Delete { path: path.to_owned(), source })?;
        self.counters.dec_delete();
        debug!(thread = self.thread, path, "delete");
        Ok(())
    }
}

/// Reads until `buf` is full or the stream ends.
fn fill(f: &mut dyn FileHandle, buf: &mut [u8]) -> Result<usize, StoreError> {
    let mut n = 0;
    while n < buf.len() {
        match f.read(&mut buf[n..])? {
            0 => break,
            k => n += k,
        }
    }
    Ok(n)
}

fn first_mismatch(expected: &[u8], actual: &[u8]) -> Option<usize> {
    expected.iter().zip(actual).position(|(e, a)| e != a)
}

/// Result of a bounded run.
#[derive(Debug)]
pub struct RunSummary {
    pub mode: Mode,
    pub total_ops: u64,
    pub elapsed: Duration,
    pub stats: WorkerStats,
}

impl Display for RunSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mib_per_sec = if self.elapsed.is_zero() {
            0.0
        } else {
            self.stats.bytes as f64 / (1 << 20) as f64 / self.elapsed.as_secs_f64()
        };
        let percentile = |q: f64| -> String {
            let h = &self.stats.latency_micro_sec;
            if h.is_empty() {
                "-".into()
            } else {
                h.value_at_quantile(q).separate_with_underscores()
            }
        };

        writeln!(f, "Total {} {}", self.mode, self.total_ops)?;
        write!(
            f,
            "time: {:.1?} | throughput: {:.1} MiB/s | p50: {} µs | p99: {} µs | max: {} µs",
            self.elapsed,
            mib_per_sec,
            percentile(0.50),
            percentile(0.99),
            percentile(1.0)
        )
    }
}
