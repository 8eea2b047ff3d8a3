//! Short-Block Coding Submodules
//!
//! Reed-Muller-style `(32, K)` block coding for uplink control payloads of
//! up to 11 bits, as per TS 38.212 Section 5.3.3: basis-sequence encoder
//! with cyclic-repetition rate matching, and the matching maximum-likelihood
//! detector.

pub mod detector;
pub mod encoder;

// Re-export commonly used types
pub use detector::ShortBlockDetector;
pub use encoder::ShortBlockEncoder;

/// Maximum message length in bits.
pub const MAX_MSG_LENGTH: usize = 11;

/// Length of the full block code, in bits.
pub const BLOCK_LENGTH: usize = 32;

/// Placeholder for a bit fixed to one, resolved by the modulation mapper.
pub const PLACEHOLDER_ONE: u8 = 255;

/// Placeholder repeating the previous bit, resolved by the modulation
/// mapper.
pub const PLACEHOLDER_REPEAT: u8 = 254;

/// Minimum number of rate-matched bits carrying information for a message
/// of `nof_msg_bits`; detection is declared impossible below this count.
pub fn min_encoded_bits(nof_msg_bits: usize) -> usize {
    match nof_msg_bits {
        1 => 1,
        2 => 3,
        _ => BLOCK_LENGTH,
    }
}

/// Row-column interleaver over unpacked values: the input forms a
/// `Qm x (E / Qm)` matrix stored row-major and the output reads it column
/// by column. A tail shorter than one column is passed through unchanged.
pub(crate) fn interleave<T: Copy>(out: &mut [T], input: &[T], modulation_order: usize) {
    debug_assert_eq!(out.len(), input.len());
    let nof_symbols = out.len() / modulation_order;
    for i in 0..nof_symbols {
        for j in 0..modulation_order {
            out[i * modulation_order + j] = input[nof_symbols * j + i];
        }
    }
    let interleaved = nof_symbols * modulation_order;
    out[interleaved..].copy_from_slice(&input[interleaved..]);
}

/// Inverse of [`interleave`].
pub(crate) fn deinterleave<T: Copy>(out: &mut [T], input: &[T], modulation_order: usize) {
    debug_assert_eq!(out.len(), input.len());
    let nof_symbols = out.len() / modulation_order;
    for i in 0..nof_symbols {
        for j in 0..modulation_order {
            out[nof_symbols * j + i] = input[i * modulation_order + j];
        }
    }
    let interleaved = nof_symbols * modulation_order;
    out[interleaved..].copy_from_slice(&input[interleaved..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaver_involution() {
        for (length, modulation_order) in [(12, 4), (64, 6), (30, 2), (17, 1), (40, 8)] {
            let original: Vec<u8> = (0..length as u8).collect();
            let mut forward = vec![0u8; length];
            interleave(&mut forward, &original, modulation_order);
            let mut back = vec![0u8; length];
            deinterleave(&mut back, &forward, modulation_order);
            assert_eq!(back, original, "E={} Qm={}", length, modulation_order);
        }
    }
}
