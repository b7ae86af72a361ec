//! Chain extraction and merge of a counting job

/* std use */

/* crate use */

/* project use */
use crate::config::Config;
use crate::coordinator::{Cancel, Coordinator};
use crate::error;
use crate::kmer::KmerRepr;
use crate::merger::Merger;
use crate::pool::{RayonPool, WorkerPool};
use crate::sink::ResultSink;
use crate::store::BatchStore;
use crate::task::SeqRecord;

/// A counting job: extraction by workers, barrier, then merge of all batches
pub struct Job<P> {
    config: Config,
    pool: P,
}

impl Job<RayonPool> {
    /// Create a job run by a rayon pool with one thread per worker
    pub fn new(config: Config) -> error::JobResult<Self> {
        let pool = RayonPool::new(config.workers())?;
        log::debug!("Worker pool with {} threads", pool.threads());

        Ok(Self::with_pool(config, pool))
    }
}

impl<P> Job<P>
where
    P: WorkerPool,
{
    /// Create a job run by `pool`
    pub fn with_pool(config: Config, pool: P) -> Self {
        Self { config, pool }
    }

    /// Get configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run extraction on all records, and prepare merge of batches.
    ///
    /// Store must be empty, on failure it's left empty.
    pub fn run<'a, K, S, I>(&self, store: &'a S, records: I) -> error::JobResult<ResultSink<'a, K, S>>
    where
        K: KmerRepr,
        S: BatchStore<K>,
        I: IntoIterator<Item = std::io::Result<SeqRecord>>,
    {
        self.config.validate::<K>()?;
        if !store.is_empty() {
            return Err(error::Error::InvalidConfig(
                "batch store must be empty at job start",
            ));
        }
        if store
            .kmer_size()
            .map_or(false, |k| k != self.config.kmer_size())
        {
            return Err(error::Error::InvalidConfig(
                "batch store kmer size differs from job kmer size",
            ));
        }

        log::info!(
            "Start job k={} canonical={} mode={} encoding={}",
            self.config.kmer_size(),
            self.config.canonical(),
            self.config.mode(),
            K::NAME
        );

        let cancel = Cancel::new(self.config.deadline());

        let report = Coordinator::new(&self.config, &self.pool).run(store, records, &cancel)?;

        let stream = Merger::new(store, self.config.fan_in(), self.config.mode())
            .with_deadline(cancel.deadline())
            .merge()?;

        Ok(ResultSink::new(report, self.config.kmer_size(), stream))
    }

    /// Run job on anonymous sequences
    pub fn run_sequences<'a, K, S, I, Q>(
        &self,
        store: &'a S,
        sequences: I,
    ) -> error::JobResult<ResultSink<'a, K, S>>
    where
        K: KmerRepr,
        S: BatchStore<K>,
        I: IntoIterator<Item = Q>,
        Q: AsRef<[u8]>,
    {
        self.run(
            store,
            sequences
                .into_iter()
                .enumerate()
                .map(|(index, seq)| Ok(SeqRecord::new(index.to_string(), seq.as_ref()))),
        )
    }
}
