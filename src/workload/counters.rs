use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};

/// Operation counters shared by the workers and the reporter.
///
/// Signed, because deletes count downwards.
#[derive(Debug, Default)]
pub struct Counters {
    put: AtomicI64,
    read: AtomicI64,
    delete: AtomicI64,
}

/// Values of all three counters at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub put: i64,
    pub delete: i64,
    pub read: i64,
}

impl Counters {
    pub fn inc_put(&self) {
        self.put.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_read(&self) {
        self.read.fetch_add(1, Ordering::Relaxed);
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn dec_delete(&self) {
        self.delete.fetch_sub(1, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub fn get(&self) -> CounterSnapshot {
        CounterSnapshot {
            put: self.put.load(Ordering::Relaxed),
            delete: self.delete.load(Ordering::Relaxed),
            read: self.read.load(Ordering::Relaxed),
        }
    }

    /// Returns the current values and resets each counter to zero. Every
    /// counter is swapped on its own, so an increment lands either in this
    /// snapshot or in the next one.
    pub fn take(&self) -> CounterSnapshot {
        CounterSnapshot {
            put: self.put.swap(0, Ordering::Relaxed),
            delete: self.delete.swap(0, Ordering::Relaxed),
            read: self.read.swap(0, Ordering::Relaxed),
        }
    }
}

impl Display for CounterSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Put\t{}\tDel\t{}\tRead\t{}", self.put, self.delete, self.read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn counts_and_resets() {
        let c = Counters::default();
        for _ in 0..5 {
            c.inc_put();
        }
        c.inc_read();
        c.dec_delete();
        c.dec_delete();
        assert_eq!(c.get(), CounterSnapshot { put: 5, delete: -2, read: 1 });
        assert_eq!(c.take(), CounterSnapshot { put: 5, delete: -2, read: 1 });
        assert_eq!(c.get(), CounterSnapshot::default());
    }

    #[test]
    fn status_line() {
        let s = CounterSnapshot { put: 3, delete: 0, read: 1 };
        assert_eq!(s.to_string(), "Put\t3\tDel\t0\tRead\t1");
    }

    #[test]
    fn no_update_lost_across_concurrent_resets() {
        let c = Arc::new(Counters::default());
        let done = Arc::new(AtomicBool::new(false));
        const THREADS: i64 = 4;
        const PER_THREAD: i64 = 50_000;

        let mut seen = 0i64;
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let c = c.clone();
                    s.spawn(move || {
                        for _ in 0..PER_THREAD {
                            c.inc_put();
                        }
                    })
                })
                .collect();

            let reporter = s.spawn(|| {
                let mut total = 0;
                while !done.load(Ordering::Acquire) {
                    total += c.take().put;
                }
                total
            });

            handles.into_iter().for_each(|h| h.join().unwrap());
            done.store(true, Ordering::Release);
            seen = reporter.join().unwrap();
        });
        seen += c.take().put;
        assert_eq!(seen, THREADS * PER_THREAD);
    }
}
