//! Short-block encoder
//!
//! Encodes UCI payloads of 1 to 11 bits as per TS 38.212 Section 5.3.3:
//! basis-sequence combination for 3 bits and more, placeholder-based
//! encodings for 1- and 2-bit payloads, cyclic repetition to the
//! rate-matched length and modulation-order interleaving.

use super::{interleave, BLOCK_LENGTH, MAX_MSG_LENGTH, PLACEHOLDER_ONE, PLACEHOLDER_REPEAT};
use crate::CodingError;
use common::ModulationScheme;

/// Basis sequences of the (32, 11) block code, TS 38.212 Table 5.3.3.3-1.
pub(super) const BASIS_SEQUENCES: [[u8; BLOCK_LENGTH]; MAX_MSG_LENGTH] = [
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    [1, 1, 0, 0, 1, 1, 0, 0, 1, 0, 0, 1, 0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 0, 1, 1, 1, 0, 1, 0, 0, 1, 0],
    [0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 1, 1, 0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 1, 1, 0, 1, 1, 1, 1, 1, 0],
    [0, 0, 1, 1, 1, 0, 0, 1, 1, 1, 0, 0, 1, 1, 0, 0, 0, 1, 1, 0, 0, 1, 0, 0, 1, 0, 1, 1, 0, 1, 1, 0],
    [0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 0, 0, 0, 0, 1, 1, 1, 1, 1, 0, 0, 0, 1, 1, 1, 0, 0, 0, 1, 1, 1, 0],
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 0],
    [0, 0, 1, 0, 0, 1, 1, 0, 0, 1, 1, 1, 0, 0, 0, 1, 1, 0, 1, 1, 1, 0, 0, 0, 1, 1, 0, 0, 1, 1, 1, 0],
    [0, 0, 0, 0, 1, 1, 0, 1, 1, 0, 1, 0, 1, 1, 1, 1, 0, 0, 1, 0, 0, 0, 1, 0, 1, 1, 0, 1, 0, 1, 1, 0],
    [0, 0, 1, 1, 0, 1, 1, 1, 0, 0, 0, 1, 1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 1, 1, 0, 1, 1, 1, 1, 1, 0],
    [0, 1, 1, 0, 0, 0, 1, 0, 1, 1, 1, 0, 1, 1, 0, 1, 1, 0, 0, 0, 0, 1, 0, 1, 1, 0, 1, 1, 0, 0, 1, 0],
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 1, 1, 1, 1, 0, 1, 0, 0, 0, 0, 1, 0],
];

/// Short-block encoder
pub struct ShortBlockEncoder {
    /// Cyclically repeated bits, before interleaving.
    scratch: Vec<u8>,
}

impl ShortBlockEncoder {
    pub fn new() -> Self {
        Self { scratch: Vec::new() }
    }

    /// Encodes `input` (one byte per bit) into `output.len()` rate-matched,
    /// interleaved bits. The output may contain placeholder values for the
    /// 1- and 2-bit payloads.
    pub fn encode(
        &mut self,
        output: &mut [u8],
        input: &[u8],
        modulation: ModulationScheme,
    ) -> Result<(), CodingError> {
        let bits_per_symbol = modulation.bits_per_symbol();
        validate_spans(output.len(), input.len(), bits_per_symbol)?;

        let mut block = [0u8; BLOCK_LENGTH];
        let block = match input.len() {
            1 => {
                let block = &mut block[..bits_per_symbol];
                encode_1(block, input);
                block
            }
            2 => {
                let block = &mut block[..3 * bits_per_symbol];
                encode_2(block, input);
                block
            }
            _ => {
                encode_3_11(&mut block, input);
                &mut block[..]
            }
        };

        self.scratch.clear();
        self.scratch.resize(output.len(), 0);
        rate_match(&mut self.scratch, block);
        interleave(output, &self.scratch, bits_per_symbol);
        Ok(())
    }
}

impl Default for ShortBlockEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_spans(out_size: usize, in_size: usize, bits_per_symbol: usize) -> Result<(), CodingError> {
    if in_size == 0 || in_size > MAX_MSG_LENGTH {
        return Err(CodingError::InvalidInputSize(
            "The input length should be between 1 and 11 bits".into(),
        ));
    }
    let min_out_length = match in_size {
        1 => bits_per_symbol,
        2 => 3 * bits_per_symbol,
        _ => BLOCK_LENGTH,
    };
    if out_size < min_out_length {
        return Err(CodingError::InvalidOutputSize(format!(
            "Invalid output length {}, expected at least {}",
            out_size, min_out_length
        )));
    }
    Ok(())
}

// Encoder function for a single bit.
fn encode_1(output: &mut [u8], input: &[u8]) {
    output.fill(PLACEHOLDER_ONE);
    output[0] = input[0];
    if output.len() > 1 {
        output[1] = PLACEHOLDER_REPEAT;
    }
}

// Encoder function for sequences of 2 bits.
fn encode_2(output: &mut [u8], input: &[u8]) {
    output.fill(PLACEHOLDER_ONE);

    let c0 = input[0];
    let c1 = input[1];
    let c2 = c0 ^ c1;

    output[0] = c0;
    output[1] = c1;
    if output.len() == 3 {
        output[2] = c2;
    } else {
        let step = output.len() / 3;
        output[step] = c2;
        output[step + 1] = c0;
        output[2 * step] = c1;
        output[2 * step + 1] = c2;
    }
}

// Encoder function for sequences of length between 3 and 11 bits.
fn encode_3_11(output: &mut [u8], input: &[u8]) {
    output.fill(0);
    for (bit, basis) in input.iter().zip(BASIS_SEQUENCES.iter()) {
        if *bit == 1 {
            for (out, base) in output.iter_mut().zip(basis.iter()) {
                *out ^= base;
            }
        }
    }
}

// Cyclic repetition to the rate-matched length.
fn rate_match(output: &mut [u8], input: &[u8]) {
    for (index, out) in output.iter_mut().enumerate() {
        *out = input[index % input.len()];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basis_combination() {
        // Message 0b1010_1010_101 (bit 0 first) selects basis rows 0, 2, 4,
        // 6, 8 and 10.
        let input = [1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1];
        let mut expected = [0u8; BLOCK_LENGTH];
        for row in [0, 2, 4, 6, 8, 10] {
            for (out, base) in expected.iter_mut().zip(BASIS_SEQUENCES[row].iter()) {
                *out ^= base;
            }
        }

        let mut encoder = ShortBlockEncoder::new();
        let mut output = [0u8; BLOCK_LENGTH];
        encoder.encode(&mut output, &input, ModulationScheme::Bpsk).unwrap();
        assert_eq!(output, expected);
    }

    #[test]
    fn test_rate_matching_repeats_cyclically() {
        let input = [1, 1, 0];
        let mut encoder = ShortBlockEncoder::new();
        let mut output = [0u8; 64];
        encoder.encode(&mut output, &input, ModulationScheme::Bpsk).unwrap();
        for i in 0..32 {
            assert_eq!(output[i], output[i + 32]);
        }
    }

    #[test]
    fn test_one_bit_placeholders() {
        let mut encoder = ShortBlockEncoder::new();
        let mut output = [0u8; 4];
        encoder.encode(&mut output, &[1], ModulationScheme::Qam16).unwrap();
        assert_eq!(output[0], 1);
        assert_eq!(output[1], PLACEHOLDER_REPEAT);
        assert_eq!(output[2], PLACEHOLDER_ONE);
        assert_eq!(output[3], PLACEHOLDER_ONE);
    }

    #[test]
    fn test_two_bit_bpsk_has_no_placeholders() {
        let mut encoder = ShortBlockEncoder::new();
        let mut output = [0u8; 3];
        encoder.encode(&mut output, &[1, 0], ModulationScheme::Bpsk).unwrap();
        assert_eq!(output, [1, 0, 1]);
    }

    #[test]
    fn test_rejects_undersized_output() {
        let mut encoder = ShortBlockEncoder::new();
        let mut output = [0u8; 31];
        let input = [1, 0, 1];
        assert!(encoder.encode(&mut output, &input, ModulationScheme::Bpsk).is_err());
    }
}
