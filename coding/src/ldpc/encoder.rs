//! LDPC encoder
//!
//! Systematic quasi-cyclic encoder as per TS 38.212 Section 5.3.2. The
//! encoder stages one codeblock at a time; the result is exposed through
//! [`LdpcEncoderBuffer`], which materialises extended-region parity nodes
//! lazily when the rate matcher asks for them.

use super::graph::LdpcGraph;
use super::{LdpcBaseGraph, BG1_N_FULL, MAX_LIFTING_SIZE};
use crate::CodingError;
use common::BitBuffer;
use tracing::debug;

/// Number of parity nodes in the high-rate region.
const HIGH_RATE_PARITY_NODES: usize = 4;

/// LDPC encoder configuration
#[derive(Debug, Clone, Copy)]
pub struct LdpcEncoderConfig {
    /// Base graph type
    pub base_graph: LdpcBaseGraph,
    /// Lifting size (Z)
    pub lifting_size: usize,
}

/// LDPC encoder
///
/// Stateful and reusable across codeblocks; scratch buffers are sized for
/// the largest supported graph at construction.
pub struct LdpcEncoder {
    /// Working area holding one byte per bit: systematic nodes followed by
    /// the four high-rate parity nodes.
    codeblock: Vec<u8>,
    /// Accumulated systematic contributions to the four high-rate parity
    /// check equations.
    auxiliary: [Vec<u8>; HIGH_RATE_PARITY_NODES],
    graph: Option<&'static LdpcGraph>,
}

impl LdpcEncoder {
    pub fn new() -> Self {
        Self {
            codeblock: vec![0; BG1_N_FULL * MAX_LIFTING_SIZE],
            auxiliary: std::array::from_fn(|_| vec![0; MAX_LIFTING_SIZE]),
            graph: None,
        }
    }

    /// Encodes one codeblock of `K * Z` packed bits.
    ///
    /// The returned buffer borrows the encoder; its contents stay valid
    /// until the next `encode` call.
    pub fn encode(
        &mut self,
        input: &BitBuffer,
        config: &LdpcEncoderConfig,
    ) -> Result<LdpcEncoderBuffer<'_>, CodingError> {
        let graph = LdpcGraph::get(config.base_graph, config.lifting_size).ok_or_else(|| {
            CodingError::InvalidConfiguration(format!(
                "Unsupported lifting size {}",
                config.lifting_size
            ))
        })?;
        let lifting_size = graph.lifting_size();
        let nof_info = graph.nof_info_nodes();

        let message_length = nof_info * lifting_size;
        if input.len() != message_length {
            return Err(CodingError::InvalidInputSize(format!(
                "Input size {} must equal the message length {}",
                input.len(),
                message_length
            )));
        }

        debug!(
            "LDPC encoding: base_graph={:?}, lifting_size={}, K={}",
            config.base_graph, lifting_size, message_length
        );

        self.graph = Some(graph);

        // LDPC codes are systematic: the first bits of the codeblock
        // coincide with the message.
        input.unpack_to(&mut self.codeblock[..message_length]);
        let parity_region = message_length + HIGH_RATE_PARITY_NODES * lifting_size;
        self.codeblock[message_length..parity_region].fill(0);

        self.preprocess_systematic_bits(graph);

        match (graph.base_graph(), graph.lifting_set_index()) {
            (LdpcBaseGraph::BaseGraph1, 6) => self.high_rate_bg1_i6(graph),
            (LdpcBaseGraph::BaseGraph1, _) => self.high_rate_bg1_other(graph),
            (LdpcBaseGraph::BaseGraph2, 3) | (LdpcBaseGraph::BaseGraph2, 7) => {
                self.high_rate_bg2_i3_7(graph)
            }
            (LdpcBaseGraph::BaseGraph2, _) => self.high_rate_bg2_other(graph),
        }

        Ok(LdpcEncoderBuffer { encoder: self, graph })
    }

    /// Accumulates the cyclically shifted systematic nodes into the
    /// auxiliary area of the four high-rate parity check equations.
    fn preprocess_systematic_bits(&mut self, graph: &LdpcGraph) {
        let lifting_size = graph.lifting_size();
        let nof_info = graph.nof_info_nodes();

        for (row, auxiliary) in self.auxiliary.iter_mut().enumerate() {
            let auxiliary = &mut auxiliary[..lifting_size];
            auxiliary.fill(0);

            for (col, shift) in graph.edges(row) {
                if col >= nof_info {
                    break;
                }
                let shift = shift as usize;
                let chunk = &self.codeblock[col * lifting_size..(col + 1) * lifting_size];

                // Rotate the node backward by `shift` with a two-slice XOR.
                for l in 0..lifting_size - shift {
                    auxiliary[l] ^= chunk[shift + l];
                }
                for l in 0..shift {
                    auxiliary[lifting_size - shift + l] ^= chunk[l];
                }
            }
        }
    }

    fn high_rate_bg1_i6(&mut self, graph: &LdpcGraph) {
        let ls = graph.lifting_size();
        let aux = &self.auxiliary;
        let skip0 = graph.nof_info_nodes() * ls;
        let (skip1, skip2, skip3) = (skip0 + ls, skip0 + 2 * ls, skip0 + 3 * ls);
        let rotation = 105 % ls;

        for k in 0..ls {
            let i = (k + ls - rotation) % ls;
            // First chunk of parity bits, rotated forward.
            self.codeblock[skip0 + k] = aux[0][i] ^ aux[1][i] ^ aux[2][i] ^ aux[3][i];
        }
        for k in 0..ls {
            // Second chunk of parity bits.
            self.codeblock[skip1 + k] = aux[0][k] ^ self.codeblock[skip0 + k];
            // Fourth chunk of parity bits.
            self.codeblock[skip3 + k] = aux[3][k] ^ self.codeblock[skip0 + k];
            // Third chunk of parity bits.
            self.codeblock[skip2 + k] = aux[2][k] ^ self.codeblock[skip3 + k];
        }
    }

    fn high_rate_bg1_other(&mut self, graph: &LdpcGraph) {
        let ls = graph.lifting_size();
        let aux = &self.auxiliary;
        let skip0 = graph.nof_info_nodes() * ls;
        let (skip1, skip2, skip3) = (skip0 + ls, skip0 + 2 * ls, skip0 + 3 * ls);

        for k in 0..ls {
            // First chunk of parity bits.
            self.codeblock[skip0 + k] = aux[0][k] ^ aux[1][k] ^ aux[2][k] ^ aux[3][k];
        }
        for k in 0..ls {
            // Second chunk of parity bits.
            self.codeblock[skip1 + k] = aux[0][k] ^ self.codeblock[skip0 + (k + 1) % ls];
            // Fourth chunk of parity bits.
            self.codeblock[skip3 + k] = aux[3][k] ^ self.codeblock[skip0 + (k + 1) % ls];
            // Third chunk of parity bits.
            self.codeblock[skip2 + k] = aux[2][k] ^ self.codeblock[skip3 + k];
        }
    }

    fn high_rate_bg2_i3_7(&mut self, graph: &LdpcGraph) {
        let ls = graph.lifting_size();
        let aux = &self.auxiliary;
        let skip0 = graph.nof_info_nodes() * ls;
        let (skip1, skip2, skip3) = (skip0 + ls, skip0 + 2 * ls, skip0 + 3 * ls);

        for k in 0..ls {
            // First chunk of parity bits.
            self.codeblock[skip0 + k] = aux[0][k] ^ aux[1][k] ^ aux[2][k] ^ aux[3][k];
        }
        for k in 0..ls {
            // Second chunk of parity bits.
            self.codeblock[skip1 + k] = aux[0][k] ^ self.codeblock[skip0 + (k + 1) % ls];
            // Third chunk of parity bits.
            self.codeblock[skip2 + k] = aux[1][k] ^ self.codeblock[skip1 + k];
            // Fourth chunk of parity bits.
            self.codeblock[skip3 + k] = aux[3][k] ^ self.codeblock[skip0 + (k + 1) % ls];
        }
    }

    fn high_rate_bg2_other(&mut self, graph: &LdpcGraph) {
        let ls = graph.lifting_size();
        let aux = &self.auxiliary;
        let skip0 = graph.nof_info_nodes() * ls;
        let (skip1, skip2, skip3) = (skip0 + ls, skip0 + 2 * ls, skip0 + 3 * ls);

        for k in 0..ls {
            let i = (k + ls - 1) % ls;
            // First chunk of parity bits, rotated forward.
            self.codeblock[skip0 + k] = aux[0][i] ^ aux[1][i] ^ aux[2][i] ^ aux[3][i];
            // Second chunk of parity bits.
            self.codeblock[skip1 + k] = aux[0][k] ^ self.codeblock[skip0 + k];
            // Third chunk of parity bits.
            self.codeblock[skip2 + k] = aux[1][k] ^ self.codeblock[skip1 + k];
            // Fourth chunk of parity bits.
            self.codeblock[skip3 + k] = aux[3][k] ^ self.codeblock[skip0 + k];
        }
    }

    /// Computes one extended-region parity node into `out`.
    ///
    /// The systematic and high-rate nodes stored in the working area fully
    /// determine every extended parity node, so each one can be produced on
    /// demand.
    fn ext_region_inner(&self, out: &mut [u8], check_node: usize) {
        let graph = match self.graph {
            Some(graph) => graph,
            None => return,
        };
        let lifting_size = graph.lifting_size();
        let nof_info = graph.nof_info_nodes();

        out.fill(0);

        for (col, shift) in graph.edges(check_node) {
            // The node on the extension diagonal is the output itself.
            if col >= nof_info + HIGH_RATE_PARITY_NODES {
                break;
            }
            let shift = shift as usize;
            let chunk = &self.codeblock[col * lifting_size..(col + 1) * lifting_size];
            for l in 0..lifting_size - shift {
                out[l] ^= chunk[shift + l];
            }
            for l in 0..shift {
                out[lifting_size - shift + l] ^= chunk[l];
            }
        }
    }
}

impl Default for LdpcEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Streaming view over an encoded codeblock.
///
/// Offset zero addresses the first bit after the two shortened systematic
/// nodes; reads are position-stable, that is any partitioning into
/// offset/length windows yields the same bits.
pub struct LdpcEncoderBuffer<'a> {
    encoder: &'a LdpcEncoder,
    graph: &'static LdpcGraph,
}

impl LdpcEncoderBuffer<'_> {
    /// Length of the encoded codeblock in bits, `(N_full - 2) * Z`.
    pub fn codeblock_length(&self) -> usize {
        self.graph.nof_var_nodes_short() * self.graph.lifting_size()
    }

    /// Reads `out.len()` codeblock bits starting at bit `offset`, one byte
    /// per bit.
    pub fn write_codeblock(&self, out: &mut [u8], offset: usize) {
        assert!(
            out.len() + offset <= self.codeblock_length(),
            "Read of {} bits at offset {} exceeds the codeblock length {}",
            out.len(),
            offset,
            self.codeblock_length()
        );

        let lifting_size = self.graph.lifting_size();
        let hr_region_end = self.graph.nof_info_nodes() + HIGH_RATE_PARITY_NODES;

        // The first two nodes are shortened and never emitted.
        let mut node = 2 + offset / lifting_size;
        let mut offset_in_node = offset % lifting_size;
        let mut out_pos = 0;
        let mut ext_node = [0u8; MAX_LIFTING_SIZE];

        while out_pos < out.len() {
            let count = (lifting_size - offset_in_node).min(out.len() - out_pos);
            if node < hr_region_end {
                let start = node * lifting_size + offset_in_node;
                out[out_pos..out_pos + count].copy_from_slice(&self.encoder.codeblock[start..start + count]);
            } else {
                self.encoder
                    .ext_region_inner(&mut ext_node[..lifting_size], node - self.graph.nof_info_nodes());
                out[out_pos..out_pos + count]
                    .copy_from_slice(&ext_node[offset_in_node..offset_in_node + count]);
            }
            out_pos += count;
            node += 1;
            offset_in_node = 0;
        }
    }

    /// Reads codeblock bits starting at bit `offset` into a packed buffer.
    pub fn write_codeblock_packed(&self, out: &mut BitBuffer, offset: usize) {
        let mut chunk = [0u8; MAX_LIFTING_SIZE];
        let mut written = 0;
        while written < out.len() {
            let count = MAX_LIFTING_SIZE.min(out.len() - written);
            self.write_codeblock(&mut chunk[..count], offset + written);
            for (i, &bit) in chunk[..count].iter().enumerate() {
                out.set(written + i, bit);
            }
            written += count;
        }
    }
}
