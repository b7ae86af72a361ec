//! Define iterator over kmer of sequences

/* std use */

/* crate use */

/* project use */
use crate::error;
use crate::kmer::{Alphabet, KmerRepr};

/// What to do with a window that contains a symbol outside of alphabet
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AlphabetPolicy {
    /// Window is skipped, tokenization continue
    Skip,
    /// Whole sequence is rejected
    Reject,
}

/// Lazy iterator over kmer of a sequence, windows with invalid symbols are skipped.
///
/// Sequence is upper cased before tokenization.
pub struct Tokenizer<K> {
    seq: Vec<u8>,
    kmer_size: usize,
    canonical: bool,
    alphabet: Alphabet,
    position: usize,
    run: usize,
    valid: u64,
    _kmer: std::marker::PhantomData<K>,
}

impl<K> Tokenizer<K>
where
    K: KmerRepr,
{
    /// Create a new tokenizer, with [AlphabetPolicy::Reject] sequence is checked before any kmer production
    pub fn new(
        seq: &[u8],
        kmer_size: usize,
        canonical: bool,
        alphabet: Alphabet,
        policy: AlphabetPolicy,
    ) -> error::JobResult<Self> {
        let seq = seq.to_ascii_uppercase();

        if policy == AlphabetPolicy::Reject {
            if let Some(position) = seq.iter().position(|s| !alphabet.contains(*s)) {
                return Err(error::Error::InvalidSequence {
                    position,
                    symbol: seq[position],
                });
            }
        }

        Ok(Self {
            seq,
            kmer_size,
            canonical,
            alphabet,
            position: 0,
            run: 0,
            valid: 0,
            _kmer: std::marker::PhantomData,
        })
    }

    /// Number of kmer produced until now
    pub fn valid(&self) -> u64 {
        self.valid
    }

    /// Number of windows skipped until now, exact only when iterator is exhausted
    pub fn skipped(&self) -> u64 {
        let seen = (self.position + 1).saturating_sub(self.kmer_size) as u64;
        seen - self.valid
    }
}

impl<K> Iterator for Tokenizer<K>
where
    K: KmerRepr,
{
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        if self.kmer_size == 0 {
            return None;
        }

        while self.position < self.seq.len() {
            let symbol = self.seq[self.position];
            self.position += 1;

            if !self.alphabet.contains(symbol) {
                self.run = 0;
                continue;
            }

            self.run += 1;
            if self.run >= self.kmer_size {
                let window = &self.seq[self.position - self.kmer_size..self.position];
                let kmer = K::from_window(window);
                self.valid += 1;

                return Some(if self.canonical {
                    kmer.canonical(self.kmer_size)
                } else {
                    kmer
                });
            }
        }

        None
    }
}
