//! LDPC decoder
//!
//! Layered normalised min-sum belief propagation on 8-bit LLRs, as per the
//! decoding counterpart of TS 38.212 Section 5.3.2. Check nodes are
//! processed in strict ascending order and soft bits are updated after each
//! layer; an optional CRC calculator enables early termination.

use super::graph::LdpcGraph;
use super::{LdpcBaseGraph, BG1_K, BG1_M, BG1_N_FULL, MAX_LIFTING_SIZE};
use crate::CodingError;
use common::{hard_decision, BitBuffer, CrcCalculator, Llr};
use tracing::debug;

/// Nodes of the high-rate region (information nodes plus the four parity
/// nodes), followed by one slot shared by all extension nodes.
const MAX_LAYER_NODES: usize = BG1_K + 5;

/// LDPC decoder configuration
#[derive(Debug, Clone, Copy)]
pub struct LdpcDecoderConfig {
    /// Base graph type
    pub base_graph: LdpcBaseGraph,
    /// Lifting size (Z)
    pub lifting_size: usize,
    /// Maximum number of decoding iterations
    pub max_iterations: usize,
    /// Normalised min-sum scaling factor, in (0, 1]
    pub scaling_factor: f32,
    /// Number of filler bits at the end of the information region
    pub nof_filler_bits: usize,
    /// Number of CRC bits protecting the codeblock, 16 or 24
    pub nof_crc_bits: usize,
}

/// LDPC decoder
///
/// Stateful and reusable across codeblocks; all scratch space is allocated
/// at construction for the largest supported graph.
pub struct LdpcDecoder {
    /// Current marginal LLR of every variable node.
    soft_bits: Vec<Llr>,
    /// Variable-to-check messages of the layer being processed.
    var_to_check: Vec<Llr>,
    /// Check-to-variable messages, per check node.
    check_to_var: Vec<Llr>,
    /// Marks check nodes whose messages carry values from a previous
    /// iteration.
    initialised: Vec<bool>,
}

impl LdpcDecoder {
    pub fn new() -> Self {
        Self {
            soft_bits: vec![Llr::ZERO; BG1_N_FULL * MAX_LIFTING_SIZE],
            var_to_check: vec![Llr::ZERO; MAX_LAYER_NODES * MAX_LIFTING_SIZE],
            check_to_var: vec![Llr::ZERO; BG1_M * MAX_LAYER_NODES * MAX_LIFTING_SIZE],
            initialised: vec![false; BG1_M],
        }
    }

    /// Decodes one codeblock.
    ///
    /// `input` holds the rate-dematched codeblock LLRs; `output` receives
    /// the `K * Z` hard-decided message bits. When a CRC calculator is
    /// given, decoding stops at the first iteration whose hard decision
    /// passes the checksum and the 1-based iteration count is returned;
    /// `None` means the message could not be validated.
    pub fn decode(
        &mut self,
        output: &mut BitBuffer,
        input: &[Llr],
        crc: Option<&CrcCalculator>,
        config: &LdpcDecoderConfig,
    ) -> Result<Option<usize>, CodingError> {
        let graph = LdpcGraph::get(config.base_graph, config.lifting_size).ok_or_else(|| {
            CodingError::InvalidConfiguration(format!(
                "Unsupported lifting size {}",
                config.lifting_size
            ))
        })?;
        let lifting_size = graph.lifting_size();
        let nof_info = graph.nof_info_nodes();
        let message_length = nof_info * lifting_size;

        if output.len() != message_length {
            return Err(CodingError::InvalidOutputSize(format!(
                "The output size {} is not equal to the message length {}",
                output.len(),
                message_length
            )));
        }
        let max_input_length = graph.nof_var_nodes_short() * lifting_size;
        if input.len() > max_input_length {
            return Err(CodingError::InvalidInputSize(format!(
                "The input size {} exceeds the maximum length {}",
                input.len(),
                max_input_length
            )));
        }
        // The codeblock must at least cover the systematic bits plus the
        // two punctured nodes they imply.
        let min_input_length = message_length + 2 * lifting_size;
        if input.len() < min_input_length {
            return Err(CodingError::InvalidInputSize(format!(
                "The input length {} does not reach the minimum {}",
                input.len(),
                min_input_length
            )));
        }
        if config.max_iterations == 0 {
            return Err(CodingError::InvalidConfiguration(
                "The number of iterations must be at least one".into(),
            ));
        }
        if !(config.scaling_factor > 0.0 && config.scaling_factor <= 1.0) {
            return Err(CodingError::InvalidConfiguration(format!(
                "Scaling factor {} is out of the interval (0, 1]",
                config.scaling_factor
            )));
        }
        if crc.is_some() && config.nof_crc_bits != 16 && config.nof_crc_bits != 24 {
            return Err(CodingError::InvalidConfiguration(format!(
                "Invalid number of CRC bits {}",
                config.nof_crc_bits
            )));
        }
        if config.nof_filler_bits >= message_length {
            return Err(CodingError::InvalidConfiguration(format!(
                "Invalid number of filler bits {}",
                config.nof_filler_bits
            )));
        }

        // A buffer with no soft information cannot be decoded: force the
        // output to all ones so any downstream CRC check fails.
        let last_soft = match input.iter().rposition(|llr| *llr != Llr::ZERO) {
            Some(position) => position + 1,
            None => {
                output.fill(1);
                return Ok(None);
            }
        };

        debug!(
            "LDPC decoding: base_graph={:?}, lifting_size={}, input={}, max_iterations={}",
            config.base_graph,
            lifting_size,
            input.len(),
            config.max_iterations
        );

        self.initialised[..graph.nof_check_nodes()].fill(false);
        self.load_soft_bits(input, graph);

        // The decoder operates on whole lifted nodes: round the codeblock
        // length up to a multiple of the lifting size, never below the
        // high-rate region.
        let min_codeblock_length = message_length + 4 * lifting_size;
        let mut codeblock_length = (last_soft + 2 * lifting_size).max(min_codeblock_length);
        codeblock_length = codeblock_length.div_ceil(lifting_size) * lifting_size;
        let nof_layers = codeblock_length / lifting_size - nof_info;

        let nof_significant_bits = message_length - config.nof_filler_bits;

        for i_iteration in 1..=config.max_iterations {
            for i_layer in 0..nof_layers {
                self.update_layer(i_layer, graph, config.scaling_factor);
            }

            if let Some(crc) = crc {
                hard_decision(output, &self.soft_bits[..message_length]);
                if crc.calculate_packed(output, nof_significant_bits) == 0 {
                    return Ok(Some(i_iteration));
                }
            }
        }

        if crc.is_none() {
            // Without early stopping, report whatever message the last
            // iteration settled on.
            hard_decision(output, &self.soft_bits[..message_length]);
        }
        Ok(None)
    }

    /// Organises the received LLRs by lifted node. The two punctured
    /// systematic nodes lead with neutral values and the tail beyond the
    /// received bits stays neutral as well.
    fn load_soft_bits(&mut self, input: &[Llr], graph: &LdpcGraph) {
        let lifting_size = graph.lifting_size();
        let lead = 2 * lifting_size;
        self.soft_bits[..lead].fill(Llr::ZERO);
        self.soft_bits[lead..lead + input.len()].copy_from_slice(input);
        let end = graph.nof_var_nodes_full() * lifting_size;
        self.soft_bits[lead + input.len()..end].fill(Llr::ZERO);
    }

    /// One layered update: variable-to-check messages, min-sum
    /// check-to-variable messages and the soft-bit refresh for one check
    /// node.
    fn update_layer(&mut self, check_node: usize, graph: &LdpcGraph, scaling_factor: f32) {
        let lifting_size = graph.lifting_size();
        let nof_info = graph.nof_info_nodes();
        let hr_nodes = nof_info + 4;
        let hr_length = hr_nodes * lifting_size;
        let layer_stride = (hr_nodes + 1) * lifting_size;
        let c2v = &mut self.check_to_var[check_node * layer_stride..(check_node + 1) * layer_stride];

        // Variable-to-check messages over the high-rate region.
        if self.initialised[check_node] {
            for i in 0..hr_length {
                self.var_to_check[i] = self.soft_bits[i].saturating_sub(c2v[i]);
            }
        } else {
            self.var_to_check[..hr_length].copy_from_slice(&self.soft_bits[..hr_length]);
        }

        // From the fifth layer onwards the check node also touches one
        // extension node, stored in the last slot.
        if check_node >= 4 {
            let soft_offset = (nof_info + check_node) * lifting_size;
            for j in 0..lifting_size {
                self.var_to_check[hr_length + j] = if self.initialised[check_node] {
                    self.soft_bits[soft_offset + j].saturating_sub(c2v[hr_length + j])
                } else {
                    self.soft_bits[soft_offset + j]
                };
            }
        }

        // Track the two smallest magnitudes, the position of the smallest
        // and the sign product for every lifted column.
        let mut min1 = [Llr::MAX; MAX_LIFTING_SIZE];
        let mut min2 = [Llr::MAX; MAX_LIFTING_SIZE];
        let mut min_index = [0u8; MAX_LIFTING_SIZE];
        let mut sign_product = [0u8; MAX_LIFTING_SIZE];

        for (i_edge, (col, shift)) in graph.edges(check_node).enumerate() {
            let slot = col.min(hr_nodes) * lifting_size;
            let messages = &self.var_to_check[slot..slot + lifting_size];
            let shift = shift as usize;
            for (j, message) in messages.iter().enumerate() {
                let magnitude = message.abs();
                let column = (j + lifting_size - shift) % lifting_size;
                let is_min = magnitude < min1[column];
                let new_second = if is_min { min1[column] } else { magnitude };
                if magnitude < min2[column] {
                    min2[column] = new_second;
                }
                if is_min {
                    min1[column] = magnitude;
                    min_index[column] = i_edge as u8;
                }
                sign_product[column] ^= u8::from(message.value() < 0);
            }
        }

        // Emit the scaled check-to-variable messages and refresh the soft
        // bits of every adjacent variable node.
        for (i_edge, (col, shift)) in graph.edges(check_node).enumerate() {
            let slot = col.min(hr_nodes) * lifting_size;
            let shift = shift as usize;
            for j in 0..lifting_size {
                let column = (j + lifting_size - shift) % lifting_size;
                let magnitude = if min_index[column] == i_edge as u8 {
                    min2[column]
                } else {
                    min1[column]
                };
                let magnitude = scale_llr(magnitude, scaling_factor);
                let negative = sign_product[column] ^ u8::from(self.var_to_check[slot + j].value() < 0);
                let message = magnitude.copysign(if negative != 0 { -1 } else { 1 });
                c2v[slot + j] = message;
                self.soft_bits[col * lifting_size + j] =
                    message.promotion_sum(self.var_to_check[slot + j]);
            }
        }

        self.initialised[check_node] = true;
    }
}

impl Default for LdpcDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Scales a message magnitude by the normalisation factor. Infinities pass
/// through untouched.
fn scale_llr(llr: Llr, scaling_factor: f32) -> Llr {
    if llr.is_inf() {
        return llr;
    }
    Llr::new((f32::from(llr.value() as i16) * scaling_factor).round() as i8)
}
