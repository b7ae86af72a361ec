//! Constant use by functional tests

/// Seed of random generator
pub const SEED: [u8; 32] = [
    42, 101, 7, 13, 255, 0, 3, 88, 19, 64, 128, 5, 73, 211, 9, 31, 42, 17, 66, 99, 150, 2, 8, 44,
    180, 23, 37, 12, 201, 77, 5, 1,
];

/// Symbols of generated sequences, soft masked bases included
pub const SEQUENCE_ALPHABET: [u8; 9] = [b'A', b'C', b'G', b'T', b'a', b'c', b'g', b't', b'N'];

/// Symbols of generated qualities
pub const QUALITY_ALPHABET: [u8; 41] = [
    b'!', b'"', b'#', b'$', b'%', b'&', b'\'', b'(', b')', b'*', b'+', b',', b'-', b'.', b'/', b'0',
    b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9', b':', b';', b'<', b'=', b'>', b'?', b'@',
    b'A', b'B', b'C', b'D', b'E', b'F', b'G', b'H', b'I',
];
