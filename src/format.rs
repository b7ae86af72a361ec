//! Detect format of sequence stream

/* std use */

/* crate use */

/* project use */
use crate::error;

/// List available reads format
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum ReadsFormat {
    /// Fasta format
    #[default]
    Fasta,
    /// Fastq format
    Fastq,
}

impl std::fmt::Display for ReadsFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl ReadsFormat {
    /// Detect format of stream by peek its first byte, nothing is consumed.
    ///
    /// Return `None` for an empty stream.
    pub fn detect<R>(input: &mut R) -> error::Result<Option<Self>>
    where
        R: std::io::BufRead,
    {
        match input.fill_buf()?.first() {
            None => Ok(None),
            Some(b'>') => Ok(Some(Self::Fasta)),
            Some(b'@') => Ok(Some(Self::Fastq)),
            Some(_) => Err(error::Error::NotFastaOrFastq.into()),
        }
    }
}
