//! Command Line Interface declaration of project kman

/* std use */

/* crate use */

/* project use */
use crate::config::{BatchSize, Config, Mode, DEFAULT_BATCH_SIZE, DEFAULT_FAN_IN};
use crate::error::Result;
use crate::kmer::{Alphabet, PackedKmer};
use crate::tokenizer::AlphabetPolicy;

/// Kmer produced by a window
#[derive(clap::ValueEnum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum Strand {
    /// Smallest of kmer and its reverse complement
    Canonical,
    /// Kmer as read
    Forward,
}

/// Valid symbols
#[derive(clap::ValueEnum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum Symbols {
    /// A, C, G, T
    Acgt,
    /// A, C, G, T and N as a regular symbol
    Acgtn,
}

/// Handling of windows with invalid symbols
#[derive(clap::ValueEnum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum Invalid {
    /// Window is ignored
    Skip,
    /// Sequence is rejected and job fail
    Reject,
}

/// Output of job
#[derive(clap::ValueEnum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum OutputMode {
    /// Each kmer with its count
    Count,
    /// Kmer seen exactly once
    Uniq,
}

/// In memory representation of kmer
#[derive(clap::ValueEnum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum Encoding {
    /// Packed when kmer size and alphabet allow it, else text
    Auto,
    /// One byte by symbol
    Text,
    /// Two bits by symbol, kmer size up to 32
    Packed,
}

/// Count or deduplicate kmer of large sequence set with an external sort
#[derive(clap::Parser, std::fmt::Debug)]
#[clap(
    name = "kman",
    version = "0.1",
    author = "Pierre Marijon <pierre@marijon.fr>"
)]
pub struct Command {
    /* Specifique option */
    /// Input fasta or fastq file, possibly compressed (default stdin)
    #[clap(short = 'i', long = "input")]
    input: Option<std::path::PathBuf>,

    /// Output csv file (default stdout), written only if job succeed
    #[clap(short = 'o', long = "output")]
    output: Option<std::path::PathBuf>,

    /// Size of the kmers
    #[clap(short = 'k', long = "kmer-size", default_value_t = 31)]
    kmer_size: usize,

    /// Output all kmers with their count, or only kmers seen once
    #[clap(short = 'm', long = "mode", value_enum, default_value_t = OutputMode::Count)]
    mode: OutputMode,

    /// Kmer strand
    #[clap(short = 's', long = "strand", value_enum)]
    strand: Strand,

    /// Valid symbols
    #[clap(short = 'a', long = "alphabet", value_enum)]
    alphabet: Symbols,

    /// What to do with windows that contain an invalid symbol
    #[clap(short = 'n', long = "invalid", value_enum)]
    invalid: Invalid,

    /// Number of kmers buffered by a worker before a batch is written
    #[clap(short = 'b', long = "batch-size", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Memory (in bytes) used by a worker buffer before a batch is written, override batch-size
    #[clap(short = 'B', long = "batch-bytes", conflicts_with = "batch_size")]
    batch_bytes: Option<usize>,

    /// Number of worker, 0 use all available core
    #[clap(short = 't', long = "threads", default_value_t = 0)]
    threads: usize,

    /// Number of retry of a failed batch write
    #[clap(short = 'r', long = "retries", default_value_t = 0)]
    retries: usize,

    /// Maximal number of batches merged at same time
    #[clap(short = 'f', long = "fan-in", default_value_t = DEFAULT_FAN_IN)]
    fan_in: usize,

    /// Split sequences in tasks of this number of kmers, 0 disable split
    #[clap(short = 'S', long = "shard-size", default_value_t = 0)]
    shard_size: usize,

    /// Kmer representation
    #[clap(short = 'e', long = "encoding", value_enum, default_value_t = Encoding::Auto)]
    encoding: Encoding,

    /// Directory where batches are written (default system temporary directory)
    #[clap(short = 'd', long = "tmp-dir")]
    tmp_dir: Option<std::path::PathBuf>,

    /// Keep batches in memory
    #[clap(long = "in-memory", conflicts_with = "tmp_dir")]
    in_memory: bool,

    /// Abort job after this number of seconds
    #[clap(long = "deadline")]
    deadline: Option<u64>,

    /// Directory where abundance vectors of each input sequence are written, require an input file
    #[clap(short = 'A', long = "abundance", requires = "input")]
    abundance: Option<std::path::PathBuf>,

    /* General option */
    /// Silence all output
    #[clap(short = 'q', long = "quiet")]
    quiet: bool,

    /// Verbose mode (-v, -vv, -vvv, etc)
    #[clap(short = 'v', long = "verbosity", action = clap::ArgAction::Count)]
    verbosity: u8,

    /// Timestamp (sec, ms, ns, none)
    #[clap(short = 'T', long = "timestamp")]
    ts: Option<stderrlog::Timestamp>,
}

impl Command {
    /// Get sequences reader
    pub fn input(&self) -> Result<Box<std::io::BufReader<dyn std::io::Read>>> {
        if let Some(path) = &self.input {
            Ok(Box::new(std::io::BufReader::new(
                niffler::get_reader(Box::new(std::fs::File::open(path)?))?.0,
            )))
        } else {
            Ok(Box::new(std::io::BufReader::new(std::io::stdin())))
        }
    }

    /// Get output path, none is stdout
    pub fn output(&self) -> Option<std::path::PathBuf> {
        self.output.clone()
    }

    /// Get kmer size
    pub fn kmer_size(&self) -> usize {
        self.kmer_size
    }

    /// Get mode
    pub fn mode(&self) -> Mode {
        match self.mode {
            OutputMode::Count => Mode::Count,
            OutputMode::Uniq => Mode::Uniq,
        }
    }

    /// Get canonical
    pub fn canonical(&self) -> bool {
        self.strand == Strand::Canonical
    }

    /// Get alphabet
    pub fn alphabet(&self) -> Alphabet {
        match self.alphabet {
            Symbols::Acgt => Alphabet::Acgt,
            Symbols::Acgtn => Alphabet::Acgtn,
        }
    }

    /// Get alphabet policy
    pub fn policy(&self) -> AlphabetPolicy {
        match self.invalid {
            Invalid::Skip => AlphabetPolicy::Skip,
            Invalid::Reject => AlphabetPolicy::Reject,
        }
    }

    /// Get batch size
    pub fn batch_size(&self) -> BatchSize {
        match self.batch_bytes {
            Some(bytes) => BatchSize::Bytes(bytes),
            None => BatchSize::Records(self.batch_size),
        }
    }

    /// Get number of threads, 0 is replaced by number of available core
    pub fn threads(&self) -> usize {
        if self.threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.threads
        }
    }

    /// Get number of retries
    pub fn retries(&self) -> usize {
        self.retries
    }

    /// Get fan-in
    pub fn fan_in(&self) -> usize {
        self.fan_in
    }

    /// Get shard size
    pub fn shard_size(&self) -> usize {
        self.shard_size
    }

    /// Get encoding, auto is resolved
    pub fn encoding(&self) -> Encoding {
        match self.encoding {
            Encoding::Auto
                if self.alphabet() == Alphabet::Acgt && self.kmer_size <= PackedKmer::MAX_K =>
            {
                Encoding::Packed
            }
            Encoding::Auto => Encoding::Text,
            encoding => encoding,
        }
    }

    /// Get batches directory
    pub fn tmp_dir(&self) -> Option<&std::path::Path> {
        self.tmp_dir.as_deref()
    }

    /// Get in memory
    pub fn in_memory(&self) -> bool {
        self.in_memory
    }

    /// Get deadline
    pub fn deadline(&self) -> Option<std::time::Duration> {
        self.deadline.map(std::time::Duration::from_secs)
    }

    /// Get abundance directory
    pub fn abundance(&self) -> Option<&std::path::Path> {
        self.abundance.as_deref()
    }

    /// Build job configuration
    pub fn config(&self) -> Config {
        let config = Config::new(
            self.kmer_size(),
            self.canonical(),
            self.alphabet(),
            self.policy(),
        )
        .with_mode(self.mode())
        .with_batch_size(self.batch_size())
        .with_workers(self.threads())
        .with_max_retries(self.retries())
        .with_fan_in(self.fan_in())
        .with_shard_size(self.shard_size());

        match self.deadline() {
            Some(deadline) => config.with_deadline(deadline),
            None => config,
        }
    }

    /// Get verbosity level
    pub fn verbosity(&self) -> usize {
        self.verbosity as usize
    }

    /// Get quiet
    pub fn quiet(&self) -> bool {
        self.quiet
    }

    /// Get timestamp granularity
    pub fn timestamp(&self) -> stderrlog::Timestamp {
        self.ts.unwrap_or(stderrlog::Timestamp::Off)
    }
}
