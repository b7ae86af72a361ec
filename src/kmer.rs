//! Kmer representations: text kmer and 2-bit packed kmer

/* std use */

/* crate use */

/* project use */
use crate::Kmer;

const fn comp_lookup_table() -> [u8; 256] {
    const fn complement(nuc: u8) -> u8 {
        match nuc {
            b'A' => b'T',
            b'T' => b'A',
            b'C' => b'G',
            b'G' => b'C',
            b'a' => b'T',
            b't' => b'A',
            b'c' => b'G',
            b'g' => b'C',
            b'n' => b'N',
            n => n,
        }
    }

    let mut i = 0;
    let mut lookup = [0; 256];
    while i != 256 {
        lookup[i] = complement(i as u8);
        i += 1;
    }

    lookup
}

const fn valid_lookup_table(with_n: bool) -> [bool; 256] {
    let mut lookup = [false; 256];
    lookup[b'A' as usize] = true;
    lookup[b'C' as usize] = true;
    lookup[b'G' as usize] = true;
    lookup[b'T' as usize] = true;
    if with_n {
        lookup[b'N' as usize] = true;
    }

    lookup
}

const fn encode_lookup_table() -> [u8; 256] {
    let mut lookup = [0xFF; 256];
    lookup[b'A' as usize] = 0b00;
    lookup[b'C' as usize] = 0b01;
    lookup[b'G' as usize] = 0b10;
    lookup[b'T' as usize] = 0b11;

    lookup
}

/// Complement of each ascii nucleotide
pub const COMP: [u8; 256] = comp_lookup_table();

/// 2-bit code of upper case nucleotide, 0xFF for other symbol
pub const ENCODE: [u8; 256] = encode_lookup_table();

/// Upper case nucleotide of each 2-bit code
pub const DECODE: [u8; 4] = [b'A', b'C', b'G', b'T'];

const ACGT: [bool; 256] = valid_lookup_table(false);
const ACGTN: [bool; 256] = valid_lookup_table(true);

/// Symbols accepted in a kmer, symbols are compared after upper case conversion
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Alphabet {
    /// Only A, C, G, T
    Acgt,
    /// A, C, G, T and N, N is keep as a wildcard symbol
    Acgtn,
}

impl std::fmt::Display for Alphabet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl Alphabet {
    /// Return true if upper case `symbol` is part of alphabet
    #[inline]
    pub fn contains(&self, symbol: u8) -> bool {
        match self {
            Alphabet::Acgt => ACGT[symbol as usize],
            Alphabet::Acgtn => ACGTN[symbol as usize],
        }
    }
}

/// Capability required by engine on a kmer representation.
///
/// Order and equality must be consistent with canonicalization: canonical form of a kmer is the
/// smallest of kmer and its reverse complement under [Ord].
pub trait KmerRepr:
    Ord + Eq + std::hash::Hash + Clone + Send + Sync + std::fmt::Debug + 'static
{
    /// Name of representation
    const NAME: &'static str;

    /// Build kmer from a window of valid upper case symbols
    fn from_window(window: &[u8]) -> Self;

    /// Compute reverse complement of kmer
    fn reverse_complement(&self, k: usize) -> Self;

    /// Compute canonical form of kmer
    fn canonical(&self, k: usize) -> Self {
        let rc = self.reverse_complement(k);
        if rc < *self {
            rc
        } else {
            self.clone()
        }
    }

    /// Get upper case text of kmer
    fn to_text(&self, k: usize) -> Vec<u8>;

    /// Write binary form of kmer
    fn encode<W>(&self, k: usize, output: &mut W) -> std::io::Result<()>
    where
        W: std::io::Write;

    /// Read binary form of kmer
    fn decode<R>(k: usize, input: &mut R) -> std::io::Result<Self>
    where
        R: std::io::Read;

    /// Approximate number of bytes use by a buffered kmer
    fn footprint(k: usize) -> usize;

    /// Return true if representation can store kmer of size k on alphabet
    fn supports(alphabet: Alphabet, k: usize) -> bool;
}

impl KmerRepr for Kmer {
    const NAME: &'static str = "text";

    fn from_window(window: &[u8]) -> Self {
        window.to_vec()
    }

    fn reverse_complement(&self, _k: usize) -> Self {
        self.iter().rev().map(|x| COMP[*x as usize]).collect()
    }

    fn canonical(&self, _k: usize) -> Self {
        // compare without allocate reverse complement
        let forward = self.iter();
        let reverse = self.iter().rev().map(|x| COMP[*x as usize]);

        match forward.copied().cmp(reverse) {
            std::cmp::Ordering::Greater => self.reverse_complement(self.len()),
            _ => self.clone(),
        }
    }

    fn to_text(&self, _k: usize) -> Vec<u8> {
        self.clone()
    }

    fn encode<W>(&self, k: usize, output: &mut W) -> std::io::Result<()>
    where
        W: std::io::Write,
    {
        // decode read exactly k bytes
        if self.len() != k {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("kmer of length {} can't be encoded as a {}-mer", self.len(), k),
            ));
        }

        output.write_all(self)
    }

    fn decode<R>(k: usize, input: &mut R) -> std::io::Result<Self>
    where
        R: std::io::Read,
    {
        let mut kmer = vec![0; k];
        input.read_exact(&mut kmer)?;

        Ok(kmer)
    }

    fn footprint(k: usize) -> usize {
        std::mem::size_of::<Kmer>() + k
    }

    fn supports(_alphabet: Alphabet, k: usize) -> bool {
        k > 0
    }
}

/// Kmer encoded on 2 bits per nucleotide, first nucleotide in most significant bits
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct PackedKmer(pub u64);

impl PackedKmer {
    /// Larger kmer size storable
    pub const MAX_K: usize = 32;

    fn mask(k: usize) -> u64 {
        if k >= Self::MAX_K {
            u64::MAX
        } else {
            (1 << (2 * k)) - 1
        }
    }
}

impl KmerRepr for PackedKmer {
    const NAME: &'static str = "packed";

    fn from_window(window: &[u8]) -> Self {
        PackedKmer(
            window
                .iter()
                .fold(0, |acc, nuc| (acc << 2) | ENCODE[*nuc as usize] as u64),
        )
    }

    fn reverse_complement(&self, k: usize) -> Self {
        let mut forward = self.0;
        let mut rc = 0;
        for _ in 0..k {
            rc = (rc << 2) | (!forward & 0b11);
            forward >>= 2;
        }

        PackedKmer(rc & Self::mask(k))
    }

    fn to_text(&self, k: usize) -> Vec<u8> {
        (0..k)
            .rev()
            .map(|i| DECODE[((self.0 >> (2 * i)) & 0b11) as usize])
            .collect()
    }

    fn encode<W>(&self, _k: usize, output: &mut W) -> std::io::Result<()>
    where
        W: std::io::Write,
    {
        output.write_all(&self.0.to_le_bytes())
    }

    fn decode<R>(_k: usize, input: &mut R) -> std::io::Result<Self>
    where
        R: std::io::Read,
    {
        let mut buffer = [0; 8];
        input.read_exact(&mut buffer)?;

        Ok(PackedKmer(u64::from_le_bytes(buffer)))
    }

    fn footprint(_k: usize) -> usize {
        std::mem::size_of::<PackedKmer>()
    }

    fn supports(alphabet: Alphabet, k: usize) -> bool {
        alphabet == Alphabet::Acgt && k > 0 && k <= Self::MAX_K
    }
}
