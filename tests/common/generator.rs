//! Define function to generate sequence value use for test

/* std use */

/* crate use */
use rand::prelude::*;

/* project use */
use crate::common::constant;

/// Generate a RNG with constant::SEED
pub fn rng() -> rand::rngs::StdRng {
    rand::rngs::StdRng::from_seed(constant::SEED)
}

/// Generate a random DNA sequence with constant::SEQUENCE_ALPHABET
pub fn seq(rng: &mut rand::rngs::StdRng, seq_length: u64) -> Vec<u8> {
    (0..seq_length)
        .map(|_| *constant::SEQUENCE_ALPHABET.choose(rng).unwrap())
        .collect::<Vec<u8>>()
}

/// Generate a random quality string with constant::QUALITY_ALPHABET
pub fn quality(rng: &mut rand::rngs::StdRng, seq_length: u64) -> Vec<u8> {
    (0..seq_length)
        .map(|_| *constant::QUALITY_ALPHABET.choose(rng).unwrap())
        .collect::<Vec<u8>>()
}

/// Generate a random in ram fasta with RNG
pub fn fasta(rng: &mut rand::rngs::StdRng, seq_length: u64, seq_number: u64) -> Vec<u8> {
    let mut output = Vec::with_capacity(
        (
            seq_length * seq_number // sequence space
		+ seq_number * 3 // '>' and jump line space
		+ (seq_number.checked_ilog10().unwrap_or(0) as u64 + 1) * seq_number
            // sequence id space
        ) as usize,
    );

    for index in 0..seq_number {
        // Header
        output.extend(b">");
        output.extend(index.to_string().as_bytes());
        output.extend(b"\n");
        // Sequence
        output.extend(seq(rng, seq_length));
        output.extend(b"\n");
    }

    output
}

#[allow(dead_code)]
/// Generate a random in ram fastq with RNG
pub fn fastq(rng: &mut rand::rngs::StdRng, seq_length: u64, seq_number: u64) -> Vec<u8> {
    let mut output = Vec::with_capacity(
        (
            seq_length * seq_number // sequence space
            + seq_length * seq_number // quality space
            + seq_number * 6 // '@' '+' and jump line space
	+ (seq_number.checked_ilog10().unwrap_or(0) as u64 + 1) * seq_number
            // sequence id space
        ) as usize,
    );

    for index in 0..seq_number {
        // Header
        output.extend(b"@");
        output.extend(index.to_string().as_bytes());
        output.extend(b"\n");
        // Sequence
        output.extend(seq(rng, seq_length));
        output.extend(b"\n");
        // Plus
        output.extend(b"+\n");
        // Quality
        output.extend(quality(rng, seq_length));
        output.extend(b"\n");
    }

    output
}

#[allow(dead_code)]
/// Count kmer of a fasta buffer without external sort, result is sorted like kman output
pub fn naive_count(
    fasta: &[u8],
    kmer_size: usize,
    canonical: bool,
) -> std::collections::BTreeMap<Vec<u8>, u64> {
    let mut counts = std::collections::BTreeMap::new();

    for line in fasta.split(|c| *c == b'\n') {
        if line.is_empty() || line[0] == b'>' {
            continue;
        }

        let line = line.to_ascii_uppercase();
        for window in line.windows(kmer_size) {
            if !window.iter().all(|c| b"ACGT".contains(c)) {
                continue;
            }

            let kmer = if canonical {
                let rc = window
                    .iter()
                    .rev()
                    .map(|c| match c {
                        b'A' => b'T',
                        b'C' => b'G',
                        b'G' => b'C',
                        _ => b'A',
                    })
                    .collect::<Vec<u8>>();
                std::cmp::min(window.to_vec(), rc)
            } else {
                window.to_vec()
            };

            *counts.entry(kmer).or_insert(0) += 1;
        }
    }

    counts
}
