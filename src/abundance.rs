//! Abundance vectors: for each reference sequence and each strand, count of the kmer that start at
//! each position.
//!
//! Vectors are written in a directory, one gzip file `{reference}___{strand}.gz` by reference and
//! strand, with a header line `# k={kmer size}` followed by one count per line.

/* std use */
use std::io::Write as _;

/* crate use */
use anyhow::Context as _;

/* project use */
use crate::config::Config;
use crate::error;
use crate::kmer::{KmerRepr, COMP};
use crate::task::SeqRecord;

/// Strand of a reference sequence
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Strand {
    /// Sequence as read
    Forward,
    /// Reverse complement of sequence
    Reverse,
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}

/// Abundance vectors of a set of references
#[derive(Clone, Debug)]
pub struct AbundanceVector {
    kmer_size: usize,
    data: std::collections::BTreeMap<String, std::collections::BTreeMap<Strand, Vec<u64>>>,
}

impl AbundanceVector {
    /// Create empty vectors for kmer of size `kmer_size`
    pub fn new(kmer_size: usize) -> Self {
        Self {
            kmer_size,
            data: std::collections::BTreeMap::new(),
        }
    }

    /// Add a vector of `size` zero, or grow vector to `size` if it's shorter
    pub fn add_ref(&mut self, reference: &str, strand: Strand, size: usize) {
        let vector = self
            .data
            .entry(reference.to_string())
            .or_default()
            .entry(strand)
            .or_default();

        if vector.len() < size {
            vector.resize(size, 0);
        }
    }

    /// Set count of kmer at `position` of reference strand, a non-zero count can be overwritten
    /// only with `replace`
    pub fn add_count(
        &mut self,
        reference: &str,
        strand: Strand,
        position: usize,
        count: u64,
        replace: bool,
    ) -> error::JobResult<()> {
        self.add_ref(reference, strand, position + 1);

        let slot = self
            .data
            .get_mut(reference)
            .and_then(|strands| strands.get_mut(&strand))
            .and_then(|vector| vector.get_mut(position))
            .ok_or(error::Error::InvalidConfig("abundance vector isn't allocated"))?;

        if *slot != 0 && !replace {
            return Err(error::Error::AbundanceOverwrite {
                reference: reference.to_string(),
                strand,
                position,
            });
        }
        *slot = count;

        Ok(())
    }

    /// Get vector of a reference strand
    pub fn get(&self, reference: &str, strand: Strand) -> Option<&[u64]> {
        self.data
            .get(reference)
            .and_then(|strands| strands.get(&strand))
            .map(|vector| vector.as_slice())
    }

    /// Fill both strands of `record` with counts of `counts`.
    ///
    /// Windows are tokenized like a counting job with `config`: upper case, canonical form if
    /// required, windows with a symbol outside of alphabet get a zero count.
    pub fn add_record<K>(
        &mut self,
        record: &SeqRecord,
        counts: &ahash::AHashMap<K, u64>,
        config: &Config,
    ) -> error::JobResult<()>
    where
        K: KmerRepr,
    {
        if self.kmer_size == 0 || self.kmer_size != config.kmer_size() {
            return Err(error::Error::InvalidConfig(
                "abundance kmer size differs from job kmer size",
            ));
        }
        if self.data.contains_key(&record.name) {
            return Err(error::Error::DuplicateReference(record.name.clone()));
        }

        let forward = record.sequence.to_ascii_uppercase();
        let reverse = forward
            .iter()
            .rev()
            .map(|s| COMP[*s as usize])
            .collect::<Vec<u8>>();

        for (strand, sequence) in [(Strand::Forward, forward), (Strand::Reverse, reverse)] {
            let windows = (sequence.len() + 1).saturating_sub(self.kmer_size);
            self.add_ref(&record.name, strand, windows);

            for (position, window) in sequence.windows(self.kmer_size).enumerate() {
                if !window.iter().all(|s| config.alphabet().contains(*s)) {
                    continue;
                }

                let kmer = K::from_window(window);
                let kmer = if config.canonical() {
                    kmer.canonical(self.kmer_size)
                } else {
                    kmer
                };

                if let Some(count) = counts.get(&kmer) {
                    self.add_count(&record.name, strand, position, *count, false)?;
                }
            }
        }

        log::trace!("Abundance of {} computed", record.name);

        Ok(())
    }

    /// Write one gzip file by reference strand in directory `path`, directory is created if needed
    pub fn write_to<P>(&self, path: P) -> error::Result<()>
    where
        P: AsRef<std::path::Path>,
    {
        let path = path.as_ref();
        if path.is_file() {
            anyhow::bail!("Abundance output {} is a file", path.display());
        }
        std::fs::create_dir_all(path)
            .with_context(|| format!("Can't create abundance directory {}", path.display()))?;

        log::info!("Write abundance vectors in {}", path.display());
        for (reference, strands) in &self.data {
            for (strand, vector) in strands {
                let file = path.join(format!(
                    "{}___{}.gz",
                    reference.replace(std::path::MAIN_SEPARATOR, "_"),
                    strand
                ));

                let mut output = std::io::BufWriter::new(niffler::to_path(
                    &file,
                    niffler::compression::Format::Gzip,
                    niffler::Level::Six,
                )?);

                writeln!(output, "# k={}", self.kmer_size)?;
                for count in vector {
                    writeln!(output, "{}", count)?;
                }
                output.flush()?;
            }
        }

        Ok(())
    }
}
