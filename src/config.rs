//! Job configuration

/* std use */

/* crate use */

/* project use */
use crate::error;
use crate::kmer::{Alphabet, KmerRepr};
use crate::tokenizer::AlphabetPolicy;

/// Output of a job
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum Mode {
    /// Each distinct kmer with its count
    #[default]
    Count,
    /// Only kmer seen exactly once
    Uniq,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Bound on buffered kmer before a batch is flushed
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BatchSize {
    /// Number of buffered kmer
    Records(usize),
    /// Approximate memory used by buffered kmer
    Bytes(usize),
}

impl BatchSize {
    /// Number of kmer a batch writer buffer before flush, never lower than one
    pub fn records<K>(&self, k: usize) -> usize
    where
        K: KmerRepr,
    {
        match self {
            BatchSize::Records(n) => (*n).max(1),
            BatchSize::Bytes(n) => (*n / K::footprint(k).max(1)).max(1),
        }
    }
}

/// Default number of buffered kmer by batch
pub const DEFAULT_BATCH_SIZE: usize = 1_000_000;

/// Default maximal number of batches open at same time during merge
pub const DEFAULT_FAN_IN: usize = 512;

/// Configuration of a counting job.
///
/// Strand and alphabet handling have no default value, they must be set at creation.
#[derive(Clone, Debug)]
pub struct Config {
    kmer_size: usize,
    canonical: bool,
    alphabet: Alphabet,
    policy: AlphabetPolicy,
    mode: Mode,
    batch_size: BatchSize,
    workers: usize,
    max_retries: usize,
    fan_in: usize,
    shard_size: usize,
    deadline: Option<std::time::Duration>,
}

impl Config {
    /// Create a configuration
    pub fn new(kmer_size: usize, canonical: bool, alphabet: Alphabet, policy: AlphabetPolicy) -> Self {
        Self {
            kmer_size,
            canonical,
            alphabet,
            policy,
            mode: Mode::default(),
            batch_size: BatchSize::Records(DEFAULT_BATCH_SIZE),
            workers: 1,
            max_retries: 0,
            fan_in: DEFAULT_FAN_IN,
            shard_size: 0,
            deadline: None,
        }
    }

    /// Set output mode
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set batch size
    pub fn with_batch_size(mut self, batch_size: BatchSize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set number of workers
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set number of retry of a failed batch flush
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set maximal number of batches merged at same time
    pub fn with_fan_in(mut self, fan_in: usize) -> Self {
        self.fan_in = fan_in;
        self
    }

    /// Set number of windows by task, 0 disable sharding
    pub fn with_shard_size(mut self, shard_size: usize) -> Self {
        self.shard_size = shard_size;
        self
    }

    /// Set a deadline to job
    pub fn with_deadline(mut self, deadline: std::time::Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Check configuration is usable with kmer representation K
    pub fn validate<K>(&self) -> error::JobResult<()>
    where
        K: KmerRepr,
    {
        if self.kmer_size == 0 {
            return Err(error::Error::InvalidConfig("kmer size must be positive"));
        }
        if matches!(self.batch_size, BatchSize::Records(0) | BatchSize::Bytes(0)) {
            return Err(error::Error::InvalidConfig("batch size must be positive"));
        }
        if self.workers == 0 {
            return Err(error::Error::InvalidConfig(
                "number of workers must be positive",
            ));
        }
        if self.fan_in < 2 {
            return Err(error::Error::InvalidConfig("fan-in must be at least 2"));
        }
        if !K::supports(self.alphabet, self.kmer_size) {
            return Err(error::Error::UnsupportedEncoding {
                encoding: K::NAME,
                kmer_size: self.kmer_size,
                alphabet: self.alphabet,
            });
        }

        Ok(())
    }

    /// Get kmer size
    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// Get canonical
    pub fn canonical(&self) -> bool {
        self.canonical
    }

    /// Get alphabet
    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    /// Get alphabet policy
    pub fn policy(&self) -> AlphabetPolicy {
        self.policy
    }

    /// Get mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Get batch size
    pub fn batch_size(&self) -> BatchSize {
        self.batch_size
    }

    /// Get number of workers
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Get maximal number of flush retry
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Get fan-in
    pub fn fan_in(&self) -> usize {
        self.fan_in
    }

    /// Get shard size
    pub fn shard_size(&self) -> usize {
        self.shard_size
    }

    /// Get deadline
    pub fn deadline(&self) -> Option<std::time::Duration> {
        self.deadline
    }
}
