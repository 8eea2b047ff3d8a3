//! LDPC rate dematcher
//!
//! Inverse of the rate matcher on soft bits: modulation-order
//! deinterleaving followed by the circular-buffer inverse walk. Repeated
//! transmissions of the same codeblock are combined by saturating LLR
//! addition.

use super::rate_matcher::compute_shift_k0;
use super::{CodeblockMetadata, MAX_CODEBLOCK_RM_SIZE};
use crate::CodingError;
use common::{sum_llrs, Llr};
use tracing::debug;

/// LDPC rate dematcher
pub struct LdpcRateDematcher {
    /// Deinterleaved input LLRs.
    auxiliary: Vec<Llr>,
}

struct RateDematchParams {
    buffer_length: usize,
    nof_systematic_bits: usize,
    nof_filler_bits: usize,
    shift_k0: usize,
    modulation_order: usize,
}

impl LdpcRateDematcher {
    pub fn new() -> Self {
        Self {
            auxiliary: vec![Llr::ZERO; MAX_CODEBLOCK_RM_SIZE],
        }
    }

    fn init(
        &self,
        cfg: &CodeblockMetadata,
        block_length: usize,
        input_length: usize,
    ) -> Result<RateDematchParams, CodingError> {
        let rv = cfg.tb_common.rv;
        if rv > 3 {
            return Err(CodingError::InvalidConfiguration(format!(
                "RV should be an integer between 0 and 3, got {}",
                rv
            )));
        }

        let modulation_order = cfg.tb_common.modulation.bits_per_symbol();
        if input_length % modulation_order != 0 {
            return Err(CodingError::InvalidInputSize(format!(
                "The input length {} should be a multiple of the modulation order {}",
                input_length, modulation_order
            )));
        }
        if input_length > MAX_CODEBLOCK_RM_SIZE {
            return Err(CodingError::InvalidInputSize(format!(
                "The rate-matched length {} exceeds the maximum {}",
                input_length, MAX_CODEBLOCK_RM_SIZE
            )));
        }

        let base_graph = cfg.tb_common.base_graph;
        let lifting_size = cfg.tb_common.lifting_size;
        if block_length != base_graph.nof_var_nodes_short() * lifting_size {
            return Err(CodingError::InvalidOutputSize(format!(
                "Codeblock length {} does not match base graph and lifting size {}",
                block_length, lifting_size
            )));
        }

        let buffer_length = if cfg.tb_common.nref > 0 {
            cfg.tb_common.nref.min(block_length)
        } else {
            block_length
        };

        let nof_systematic_bits = (base_graph.nof_info_nodes() - 2) * lifting_size;
        let nof_filler_bits = cfg.cb_specific.nof_filler_bits;
        if nof_filler_bits >= nof_systematic_bits {
            return Err(CodingError::InvalidConfiguration(format!(
                "Invalid number of filler bits {}",
                nof_filler_bits
            )));
        }

        let shift_k0 = compute_shift_k0(base_graph, rv, buffer_length, block_length, lifting_size);

        Ok(RateDematchParams {
            buffer_length,
            nof_systematic_bits,
            nof_filler_bits,
            shift_k0,
            modulation_order,
        })
    }

    /// Reverses rate matching of `input` into the codeblock LLR buffer
    /// `output`.
    ///
    /// With `new_data` set, the buffer is reinitialised: filler positions
    /// become `+infinity` (fixed zeros for the decoder) and unobserved
    /// positions become neutral. Otherwise every received LLR is
    /// saturating-added to the stored value, combining HARQ transmissions.
    pub fn rate_dematch(
        &mut self,
        output: &mut [Llr],
        input: &[Llr],
        new_data: bool,
        cfg: &CodeblockMetadata,
    ) -> Result<(), CodingError> {
        let params = self.init(cfg, output.len(), input.len())?;

        debug!(
            "LDPC rate dematching: E={}, Ncb={}, k0={}, new_data={}",
            input.len(),
            params.buffer_length,
            params.shift_k0,
            new_data
        );

        if params.modulation_order == 1 {
            allot_llrs(output, input, new_data, &params);
        } else {
            let (aux, _) = self.auxiliary.split_at_mut(input.len());
            deinterleave_llrs(aux, input, params.modulation_order);
            allot_llrs(output, aux, new_data, &params);
        }
        Ok(())
    }
}

impl Default for LdpcRateDematcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Inverse of the row-column interleaver.
fn deinterleave_llrs(out: &mut [Llr], input: &[Llr], modulation_order: usize) {
    let nof_symbols = out.len() / modulation_order;
    let mut in_index = 0;
    for i in 0..nof_symbols {
        for j in 0..modulation_order {
            out[nof_symbols * j + i] = input[in_index];
            in_index += 1;
        }
    }
}

/// Inverse circular-buffer walk, copying or combining the received LLRs
/// into their codeblock positions.
fn allot_llrs(out: &mut [Llr], input: &[Llr], new_data: bool, params: &RateDematchParams) {
    let nof_info_bits = params.nof_systematic_bits - params.nof_filler_bits;
    let filler_start = nof_info_bits;
    let filler_end = params.nof_systematic_bits;

    if new_data {
        // Reset the whole soft buffer; filler bits are fixed, logical zeros
        // for the decoder, marked by an infinite LLR.
        out.fill(Llr::ZERO);
        out[filler_start..filler_end].fill(Llr::INFINITY);
    }

    let mut index = params.shift_k0 % params.buffer_length;
    let mut remaining = input;
    while !remaining.is_empty() {
        // Jump over the filler range; those positions are never transmitted.
        if (filler_start..filler_end).contains(&index) {
            index = filler_end % params.buffer_length;
        }

        let mut chunk_end = params.buffer_length;
        if params.nof_filler_bits != 0 && (index..chunk_end).contains(&filler_start) {
            chunk_end = filler_start;
        }
        let count = (chunk_end - index).min(remaining.len());

        sum_llrs(&mut out[index..index + count], &remaining[..count]);
        index = (index + count) % params.buffer_length;
        remaining = &remaining[count..];
    }
}
