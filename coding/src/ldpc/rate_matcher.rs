//! LDPC rate matcher
//!
//! Circular-buffer bit selection and modulation-order interleaving as per
//! TS 38.212 Section 5.4.2. Bits are pulled from the encoder buffer on
//! demand, so the full codeblock is never materialised.

use super::encoder::LdpcEncoderBuffer;
use super::{CodeblockMetadata, LdpcBaseGraph, MAX_CODEBLOCK_RM_SIZE};
use crate::CodingError;
use common::BitBuffer;
use tracing::debug;

/// Circular-buffer starting-position numerators, TS 38.212 Table 5.4.2.1-2.
const SHIFT_FACTOR_BG1: [usize; 4] = [0, 17, 33, 56];
const SHIFT_FACTOR_BG2: [usize; 4] = [0, 13, 25, 43];

/// Computes the `k0` starting position for the given metadata and circular
/// buffer length.
pub(super) fn compute_shift_k0(
    base_graph: LdpcBaseGraph,
    rv: u8,
    buffer_length: usize,
    block_length: usize,
    lifting_size: usize,
) -> usize {
    let shift_factor = match base_graph {
        LdpcBaseGraph::BaseGraph1 => SHIFT_FACTOR_BG1[rv as usize],
        LdpcBaseGraph::BaseGraph2 => SHIFT_FACTOR_BG2[rv as usize],
    };
    (shift_factor * buffer_length / block_length) * lifting_size
}

/// LDPC rate matcher
pub struct LdpcRateMatcher {
    /// Unpacked selected bits, before interleaving.
    auxiliary: Vec<u8>,
}

struct RateMatchParams {
    buffer_length: usize,
    nof_systematic_bits: usize,
    nof_filler_bits: usize,
    shift_k0: usize,
    modulation_order: usize,
}

impl LdpcRateMatcher {
    pub fn new() -> Self {
        Self {
            auxiliary: vec![0; MAX_CODEBLOCK_RM_SIZE],
        }
    }

    fn init(
        &self,
        cfg: &CodeblockMetadata,
        block_length: usize,
        rm_length: usize,
    ) -> Result<RateMatchParams, CodingError> {
        let rv = cfg.tb_common.rv;
        if rv > 3 {
            return Err(CodingError::InvalidConfiguration(format!(
                "RV should be an integer between 0 and 3, got {}",
                rv
            )));
        }

        let modulation_order = cfg.tb_common.modulation.bits_per_symbol();
        if rm_length % modulation_order != 0 {
            return Err(CodingError::InvalidOutputSize(format!(
                "The output length {} should be a multiple of the modulation order {}",
                rm_length, modulation_order
            )));
        }
        if rm_length > MAX_CODEBLOCK_RM_SIZE {
            return Err(CodingError::InvalidOutputSize(format!(
                "The rate-matched length {} exceeds the maximum {}",
                rm_length, MAX_CODEBLOCK_RM_SIZE
            )));
        }

        let base_graph = cfg.tb_common.base_graph;
        let lifting_size = cfg.tb_common.lifting_size;
        if block_length != base_graph.nof_var_nodes_short() * lifting_size {
            return Err(CodingError::InvalidInputSize(format!(
                "Codeblock length {} does not match base graph and lifting size {}",
                block_length, lifting_size
            )));
        }

        // Soft-buffer capacity; Nref = 0 means no limit.
        let buffer_length = if cfg.tb_common.nref > 0 {
            cfg.tb_common.nref.min(block_length)
        } else {
            block_length
        };

        // Two lifted nodes are shortened out of the systematic region.
        let nof_systematic_bits = (base_graph.nof_info_nodes() - 2) * lifting_size;
        let nof_filler_bits = cfg.cb_specific.nof_filler_bits;
        if nof_filler_bits >= nof_systematic_bits {
            return Err(CodingError::InvalidConfiguration(format!(
                "Invalid number of filler bits {}",
                nof_filler_bits
            )));
        }

        let shift_k0 = compute_shift_k0(base_graph, rv, buffer_length, block_length, lifting_size);

        Ok(RateMatchParams {
            buffer_length,
            nof_systematic_bits,
            nof_filler_bits,
            shift_k0,
            modulation_order,
        })
    }

    /// Rate matches one codeblock into `output.len()` packed bits.
    pub fn rate_match(
        &mut self,
        output: &mut BitBuffer,
        input: &LdpcEncoderBuffer,
        cfg: &CodeblockMetadata,
    ) -> Result<(), CodingError> {
        let params = self.init(cfg, input.codeblock_length(), output.len())?;

        debug!(
            "LDPC rate matching: E={}, Ncb={}, k0={}, Qm={}",
            output.len(),
            params.buffer_length,
            params.shift_k0,
            params.modulation_order
        );

        let (aux, _) = self.auxiliary.split_at_mut(output.len());
        select_bits(aux, input, &params);
        interleave_bits(output, aux, params.modulation_order);
        Ok(())
    }
}

impl Default for LdpcRateMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks the circular buffer starting at `k0`, skipping filler-bit
/// positions, until `out` is filled.
fn select_bits(out: &mut [u8], input: &LdpcEncoderBuffer, params: &RateMatchParams) {
    let filler_start = params.nof_systematic_bits - params.nof_filler_bits;
    let filler_end = params.nof_systematic_bits;

    let mut out_index = 0;
    let mut in_index = params.shift_k0 % params.buffer_length;

    while out_index < out.len() {
        // Skip over the filler-bit range.
        if (filler_start..filler_end).contains(&in_index) {
            in_index = filler_end % params.buffer_length;
        }

        // Read a contiguous chunk, stopping at the first filler bit or at
        // the end of the circular buffer.
        let mut chunk_end = params.buffer_length;
        if params.nof_filler_bits != 0 && (in_index..chunk_end).contains(&filler_start) {
            chunk_end = filler_start;
        }
        let count = (chunk_end - in_index).min(out.len() - out_index);

        input.write_codeblock(&mut out[out_index..out_index + count], in_index);
        out_index += count;
        in_index = (in_index + count) % params.buffer_length;
    }
}

/// Row-column interleaver: the selected bits form a `Qm x (E / Qm)` matrix
/// stored row-major; the output reads it column by column.
fn interleave_bits(out: &mut BitBuffer, input: &[u8], modulation_order: usize) {
    if modulation_order == 1 {
        out.pack(input);
        return;
    }

    let nof_symbols = out.len() / modulation_order;
    let mut out_index = 0;
    for i in 0..nof_symbols {
        let mut word = 0u64;
        for j in 0..modulation_order {
            word = (word << 1) | u64::from(input[nof_symbols * j + i]);
        }
        out.insert(word, out_index, modulation_order);
        out_index += modulation_order;
    }
}
