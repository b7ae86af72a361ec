//! Backends that run workers of a job

/* std use */

/* crate use */

/* project use */
use crate::error;

/// Run a fixed number of workers concurrently.
///
/// `feed` is run on calling thread while workers run, `run` return when feed and every worker
/// are finished. A panic of a worker is propagated to caller.
pub trait WorkerPool: Sync {
    /// Run `workers` instances of `worker`, each call receives its worker identifier
    fn run<W, F>(&self, workers: usize, worker: W, feed: F)
    where
        W: Fn(usize) + Sync,
        F: FnOnce();
}

/// Workers run in a dedicated rayon thread pool
pub struct RayonPool {
    pool: rayon::ThreadPool,
}

impl RayonPool {
    /// Build a pool with `threads` threads, 0 use all available cores
    pub fn new(threads: usize) -> error::JobResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("kman-worker-{}", index))
            .build()?;

        Ok(Self { pool })
    }

    /// Number of threads in pool
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl WorkerPool for RayonPool {
    fn run<W, F>(&self, workers: usize, worker: W, feed: F)
    where
        W: Fn(usize) + Sync,
        F: FnOnce(),
    {
        self.pool.in_place_scope(|scope| {
            let worker = &worker;
            for id in 0..workers {
                scope.spawn(move |_| worker(id));
            }

            feed();
        });
    }
}

/// Each worker run in its own scoped thread
#[derive(Copy, Clone, Debug, Default)]
pub struct ScopedThreads;

impl WorkerPool for ScopedThreads {
    fn run<W, F>(&self, workers: usize, worker: W, feed: F)
    where
        W: Fn(usize) + Sync,
        F: FnOnce(),
    {
        std::thread::scope(|scope| {
            let worker = &worker;
            for id in 0..workers {
                scope.spawn(move || worker(id));
            }

            feed();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_all<P>(pool: &P)
    where
        P: WorkerPool,
    {
        let (sender, receiver) = crossbeam_channel::bounded::<u64>(2);
        let total = std::sync::atomic::AtomicU64::new(0);
        let seen = std::sync::Mutex::new(Vec::new());

        pool.run(
            3,
            |id| {
                seen.lock().unwrap().push(id);
                for v in receiver.clone() {
                    total.fetch_add(v, std::sync::atomic::Ordering::SeqCst);
                }
            },
            move || {
                for v in 1..=100 {
                    sender.send(v).unwrap();
                }
            },
        );

        let mut seen = seen.into_inner().unwrap();
        seen.sort();

        assert_eq!(total.into_inner(), 5050);
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn rayon() -> error::Result<()> {
        let pool = RayonPool::new(2)?;
        assert_eq!(pool.threads(), 2);

        run_all(&pool);

        Ok(())
    }

    #[test]
    fn scoped() {
        run_all(&ScopedThreads);
    }
}
