//! Short-block detector
//!
//! Maximum-likelihood detection of the (32, K) block code: the received
//! LLRs are deinterleaved, rate-dematched by combining repetitions and
//! correlated against the full codebook. A generalised likelihood-ratio
//! test decides whether the best match is trustworthy.

use super::encoder::ShortBlockEncoder;
use super::{deinterleave, min_encoded_bits, BLOCK_LENGTH, MAX_MSG_LENGTH};
use common::{dot_prod_sign, norm_squared, sum_llrs, Llr, ModulationScheme};
use std::sync::OnceLock;
use tracing::debug;

/// Codewords of all "even-valued" messages, in (+1, -1) representation.
const NOF_CODEWORDS_2: usize = 1 << (MAX_MSG_LENGTH - 1);

/// Detection thresholds per message length, from the generalised
/// likelihood-ratio test.
const THRESHOLDS: [f64; MAX_MSG_LENGTH] = [0.0, 0.0, 12.0, 14.0, 16.0, 18.0, 20.0, 22.0, 24.0, 26.0, 29.0];

static DETECT_TABLE: OnceLock<Vec<[i8; BLOCK_LENGTH]>> = OnceLock::new();

/// Builds the correlation codebook by encoding every even-valued message.
fn detect_table() -> &'static [[i8; BLOCK_LENGTH]] {
    DETECT_TABLE.get_or_init(|| {
        let mut encoder = ShortBlockEncoder::new();
        let mut table = Vec::with_capacity(NOF_CODEWORDS_2);
        for index in 0..NOF_CODEWORDS_2 {
            // Message bits, least significant first; bit 0 is always zero.
            let value = 2 * index;
            let mut bits = [0u8; MAX_MSG_LENGTH];
            for (i, bit) in bits.iter_mut().enumerate() {
                *bit = ((value >> i) & 1) as u8;
            }

            let mut codeword = [0u8; BLOCK_LENGTH];
            encoder
                .encode(&mut codeword, &bits, ModulationScheme::Bpsk)
                .expect("fixed-size codebook encoding cannot fail");

            let mut signs = [0i8; BLOCK_LENGTH];
            for (sign, &bit) in signs.iter_mut().zip(codeword.iter()) {
                *sign = 1 - 2 * (bit as i8);
            }
            table.push(signs);
        }
        table
    })
}

/// Short-block maximum-likelihood detector
pub struct ShortBlockDetector {
    /// Deinterleaved LLRs.
    scratch: Vec<Llr>,
}

impl ShortBlockDetector {
    pub fn new() -> Self {
        Self { scratch: Vec::new() }
    }

    /// Recovers `output.len()` message bits from the rate-matched LLRs.
    ///
    /// Returns `true` when the detection metric clears the threshold;
    /// otherwise the output is forced to all ones so a downstream CRC
    /// check fails.
    pub fn detect(&mut self, output: &mut [u8], input: &[Llr], modulation: ModulationScheme) -> bool {
        let bits_per_symbol = modulation.bits_per_symbol();
        if !validate_spans(output.len(), input, bits_per_symbol) {
            output.fill(1);
            return false;
        }

        self.scratch.clear();
        self.scratch.resize(input.len(), Llr::ZERO);
        deinterleave(&mut self.scratch, input, bits_per_symbol);

        let mut block = [Llr::ZERO; BLOCK_LENGTH];
        let max_metric = match output.len() {
            1 => {
                let block = &mut block[..bits_per_symbol];
                rate_dematch(block, &self.scratch);
                output[0] = u8::from(block[0].value() <= 0);
                1.0
            }
            2 => {
                let block = &mut block[..3 * bits_per_symbol];
                rate_dematch(block, &self.scratch);
                detect_2(output, block)
            }
            _ => {
                rate_dematch(&mut block, &self.scratch);
                detect_3_11(output, &block)
            }
        };

        let detected = max_metric > THRESHOLDS[output.len() - 1];
        if !detected {
            debug!(
                "Short-block detection failed: metric {:.2} below threshold for {} bits",
                max_metric,
                output.len()
            );
            output.fill(1);
        }
        detected
    }
}

impl Default for ShortBlockDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_spans(out_size: usize, input: &[Llr], bits_per_symbol: usize) -> bool {
    if out_size == 0 || out_size > MAX_MSG_LENGTH {
        return false;
    }

    // Enough observed (non-neutral) soft bits to tell codewords apart.
    let non_zero_count = input.iter().filter(|llr| **llr != Llr::ZERO).count();
    if non_zero_count < min_encoded_bits(out_size) {
        return false;
    }

    // The 1- and 2-bit encodings span one and three symbols respectively.
    if out_size <= 2 && input.len() < bits_per_symbol {
        return false;
    }
    true
}

/// Combines the cyclic repetitions of the codeblock back into one block.
fn rate_dematch(output: &mut [Llr], input: &[Llr]) {
    let nof_copy = input.len().min(output.len());
    output[..nof_copy].copy_from_slice(&input[..nof_copy]);
    output[nof_copy..].fill(Llr::ZERO);

    if input.len() <= output.len() {
        return;
    }

    let mut remaining = &input[output.len()..];
    while !remaining.is_empty() {
        let block_size = output.len().min(remaining.len());
        sum_llrs(&mut output[..block_size], &remaining[..block_size]);
        remaining = &remaining[block_size..];
    }
}

// ML detection for 2-bit messages.
fn detect_2(output: &mut [u8], input: &[Llr]) -> f64 {
    let mut llr_as_int = [0i64; 3];
    if input.len() == 3 {
        for (value, llr) in llr_as_int.iter_mut().zip(input.iter()) {
            *value = i64::from(llr.to_int());
        }
    } else {
        // Higher modulation orders spread the three coded bits over
        // placeholder positions; combine the two copies of each.
        let step = input.len() / 3 - 2;
        llr_as_int[0] = i64::from(input[0].to_int()) + i64::from(input[step + 3].to_int());
        llr_as_int[1] = i64::from(input[1].to_int()) + i64::from(input[2 * step + 4].to_int());
        llr_as_int[2] = i64::from(input[step + 2].to_int()) + i64::from(input[2 * step + 5].to_int());
    }

    // All possible 2-bit codewords, including the redundancy bit.
    const TABLE2: [[i64; 3]; 4] = [[1, 1, 1], [-1, 1, -1], [1, -1, -1], [-1, -1, 1]];

    let mut max_idx = 0;
    let mut max_metric = i64::MIN;
    for (cdwd_idx, codeword) in TABLE2.iter().enumerate() {
        let metric: i64 = llr_as_int.iter().zip(codeword.iter()).map(|(a, b)| a * b).sum();
        if metric > max_metric {
            max_metric = metric;
            max_idx = cdwd_idx;
        }
    }

    output[0] = (max_idx & 1) as u8;
    output[1] = ((max_idx >> 1) & 1) as u8;

    let max_sqr = (max_metric * max_metric) as f64;
    let in_norm_sqr: i64 = llr_as_int.iter().map(|v| v * v).sum();
    2.0 * max_sqr / (3.0 * in_norm_sqr as f64 - max_sqr)
}

// ML detection for (3-to-11)-bit messages.
fn detect_3_11(output: &mut [u8], input: &[Llr]) -> f64 {
    let nof_codewords = 1usize << (output.len() - 1);

    let mut max_idx = 0;
    let mut max_metric = i64::MIN;
    let mut bit0 = 0u8;
    // Brute-force ML detection: correlate all codewords with the LLRs and
    // pick the best one.
    for (cdwd_idx, codeword) in detect_table()[..nof_codewords].iter().enumerate() {
        let metric = dot_prod_sign(input, codeword);
        let metric_abs = metric.abs();
        if metric_abs > max_metric {
            max_metric = metric_abs;
            max_idx = cdwd_idx;
            bit0 = u8::from(metric < 0);
        }
    }

    // Only "even-valued" messages are correlated; a negative correlation
    // flips every bit through the all-ones basis row, which is exactly
    // bit 0.
    let value = 2 * max_idx + bit0 as usize;
    for (i, bit) in output.iter_mut().enumerate() {
        *bit = ((value >> i) & 1) as u8;
    }

    let max_sqr = (max_metric * max_metric) as f64;
    let in_norm_sqr = norm_squared(input) as f64;
    (BLOCK_LENGTH - 1) as f64 * max_sqr / (BLOCK_LENGTH as f64 * in_norm_sqr - max_sqr)
}
