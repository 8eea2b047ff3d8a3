//! LDPC Coding Submodules
//!
//! Quasi-cyclic LDPC coding as per 3GPP TS 38.212 Section 5.3.2: base-graph
//! structure, encoder, rate matcher/dematcher, layered min-sum decoder and
//! transport-block segmentation.

pub mod decoder;
pub mod encoder;
pub mod graph;
pub mod rate_dematcher;
pub mod rate_matcher;
mod segmenter;
pub mod segmenter_rx;
pub mod segmenter_tx;
mod tables;

// Re-export commonly used types
pub use decoder::{LdpcDecoder, LdpcDecoderConfig};
pub use encoder::{LdpcEncoder, LdpcEncoderBuffer, LdpcEncoderConfig};
pub use graph::LdpcGraph;
pub use rate_dematcher::LdpcRateDematcher;
pub use rate_matcher::LdpcRateMatcher;
pub use segmenter_rx::{RxCodeblock, RxSegmenter};
pub use segmenter_tx::{TxSegmenter, TxSegmenterBuffer};

use crate::CodingError;
use common::ModulationScheme;
use serde::{Deserialize, Serialize};

/// LDPC lifting size set as per Table 5.3.2-1
pub const LIFTING_SIZE_SET: [usize; 51] = [
    2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 18, 20, 22, 24,
    26, 28, 30, 32, 36, 40, 44, 48, 52, 56, 60, 64, 72, 80, 88, 96, 104,
    112, 120, 128, 144, 160, 176, 192, 208, 224, 240, 256, 288, 320, 352, 384,
];

/// Number of supported lifting sizes
pub const NOF_LIFTING_SIZES: usize = 51;

/// Largest supported lifting size
pub const MAX_LIFTING_SIZE: usize = 384;

/// Number of check nodes in base graph 1
pub const BG1_M: usize = 46;
/// Number of variable nodes in base graph 1, before shortening
pub const BG1_N_FULL: usize = 68;
/// Number of variable nodes in base graph 1, after shortening
pub const BG1_N_SHORT: usize = 66;
/// Number of information nodes in base graph 1
pub const BG1_K: usize = 22;

/// Number of check nodes in base graph 2
pub const BG2_M: usize = 42;
/// Number of variable nodes in base graph 2, before shortening
pub const BG2_N_FULL: usize = 52;
/// Number of variable nodes in base graph 2, after shortening
pub const BG2_N_SHORT: usize = 50;
/// Number of information nodes in base graph 2
pub const BG2_K: usize = 10;

/// Maximum number of variable nodes connected to a single check node
pub const MAX_CHECK_NODE_DEGREE: usize = 20;

/// Sentinel marking a missing edge in graph adjacency rows
pub const NO_EDGE: u16 = u16::MAX;

/// Maximum code block size for each base graph
pub const MAX_CB_SIZE_BG1: usize = 8448;
pub const MAX_CB_SIZE_BG2: usize = 3840;

/// Length of the CRC checksum added to the segments of a multi-segment TB
pub const SEG_CRC_LENGTH: usize = 24;

/// Maximum number of segments a transport block may split into
pub const MAX_NOF_SEGMENTS: usize = 52;

/// Maximum transport block size in bits, including its CRC
pub const MAX_TBS_BITS: usize = 1_277_992;

/// Largest shortened codeblock length, in bits
pub const MAX_CODEBLOCK_SIZE: usize = BG1_N_SHORT * MAX_LIFTING_SIZE;

/// Largest rate-matched codeblock length, in bits
pub const MAX_CODEBLOCK_RM_SIZE: usize = 40_320;

/// LDPC base graph types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LdpcBaseGraph {
    /// Base graph 1 - for larger transport blocks
    BaseGraph1,
    /// Base graph 2 - for smaller transport blocks
    BaseGraph2,
}

impl LdpcBaseGraph {
    /// Number of parity check nodes `M`.
    pub fn nof_check_nodes(&self) -> usize {
        match self {
            LdpcBaseGraph::BaseGraph1 => BG1_M,
            LdpcBaseGraph::BaseGraph2 => BG2_M,
        }
    }

    /// Number of variable nodes before shortening.
    pub fn nof_var_nodes_full(&self) -> usize {
        match self {
            LdpcBaseGraph::BaseGraph1 => BG1_N_FULL,
            LdpcBaseGraph::BaseGraph2 => BG2_N_FULL,
        }
    }

    /// Number of variable nodes after shortening the two leading systematic
    /// nodes.
    pub fn nof_var_nodes_short(&self) -> usize {
        match self {
            LdpcBaseGraph::BaseGraph1 => BG1_N_SHORT,
            LdpcBaseGraph::BaseGraph2 => BG2_N_SHORT,
        }
    }

    /// Number of systematic information nodes `K`.
    pub fn nof_info_nodes(&self) -> usize {
        match self {
            LdpcBaseGraph::BaseGraph1 => BG1_K,
            LdpcBaseGraph::BaseGraph2 => BG2_K,
        }
    }

    /// Maximum number of information bits per codeblock.
    pub fn max_codeblock_size(&self) -> usize {
        match self {
            LdpcBaseGraph::BaseGraph1 => MAX_CB_SIZE_BG1,
            LdpcBaseGraph::BaseGraph2 => MAX_CB_SIZE_BG2,
        }
    }
}

/// Position of a lifting size in [`LIFTING_SIZE_SET`].
pub fn lifting_size_position(lifting_size: usize) -> Option<usize> {
    LIFTING_SIZE_SET.iter().position(|&z| z == lifting_size)
}

/// Lifting set index of a lifting size, as per Table 5.3.2-1.
///
/// Every lifting size factors as `a * 2^j` with `a` odd; the set index is
/// determined by `a` (sizes with `a = 1` share the set of `a = 2`).
pub fn lifting_set_index(lifting_size: usize) -> Option<u8> {
    lifting_size_position(lifting_size)?;
    let mut odd = lifting_size;
    while odd % 2 == 0 {
        odd /= 2;
    }
    match odd {
        1 | 2 => Some(0),
        3 => Some(1),
        5 => Some(2),
        7 => Some(3),
        9 => Some(4),
        11 => Some(5),
        13 => Some(6),
        15 => Some(7),
        _ => None,
    }
}

/// Length of the transport-block CRC in bits, as per TS 38.212 Section 7.2.1.
pub fn compute_tb_crc_size(nof_tb_bits: usize) -> usize {
    if nof_tb_bits <= 3824 {
        16
    } else {
        24
    }
}

/// Number of codeblocks a transport block segments into.
pub fn compute_nof_codeblocks(nof_tb_bits: usize, base_graph: LdpcBaseGraph) -> usize {
    let max_cb_size = base_graph.max_codeblock_size();
    let nof_bits = nof_tb_bits + compute_tb_crc_size(nof_tb_bits);
    if nof_bits <= max_cb_size {
        1
    } else {
        nof_bits.div_ceil(max_cb_size - SEG_CRC_LENGTH)
    }
}

/// Smallest lifting size that accommodates the segmented transport block.
pub fn compute_lifting_size(
    nof_tb_bits: usize,
    base_graph: LdpcBaseGraph,
    nof_segments: usize,
) -> Result<usize, CodingError> {
    let mut nof_bits = nof_tb_bits + compute_tb_crc_size(nof_tb_bits);
    if nof_segments > 1 {
        nof_bits += nof_segments * SEG_CRC_LENGTH;
    }
    // Number of information bits per codeblock.
    let cb_bits = nof_bits.div_ceil(nof_segments);

    // Effective number of information nodes, as per TS 38.212 Section 5.2.2.
    let kb = match base_graph {
        LdpcBaseGraph::BaseGraph1 => 22,
        LdpcBaseGraph::BaseGraph2 => {
            if nof_tb_bits > 640 {
                10
            } else if nof_tb_bits > 560 {
                9
            } else if nof_tb_bits > 192 {
                8
            } else {
                6
            }
        }
    };

    LIFTING_SIZE_SET
        .iter()
        .copied()
        .find(|z| kb * z >= cb_bits)
        .ok_or_else(|| {
            CodingError::InvalidConfiguration(format!(
                "No lifting size accommodates {} bits per codeblock",
                cb_bits
            ))
        })
}

/// Codeblock length `K * Z` for the given base graph and lifting size.
pub fn compute_codeblock_size(base_graph: LdpcBaseGraph, lifting_size: usize) -> usize {
    base_graph.nof_info_nodes() * lifting_size
}

/// Shortened codeblock length `(N_full - 2) * Z`, the length the encoder
/// emits before rate matching.
pub fn compute_full_codeblock_size(base_graph: LdpcBaseGraph, lifting_size: usize) -> usize {
    base_graph.nof_var_nodes_short() * lifting_size
}

/// Codeblock configuration shared by all segments of a transport block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TbCommonMetadata {
    /// Base graph used by the transport block
    pub base_graph: LdpcBaseGraph,
    /// Lifting size (Z)
    pub lifting_size: usize,
    /// Redundancy version, 0 to 3
    pub rv: u8,
    /// Modulation scheme of the codeword
    pub modulation: ModulationScheme,
    /// Limited-buffer rate-matching length; 0 means unlimited
    pub nref: usize,
    /// Codeword length in bits
    pub cw_length: usize,
}

/// Codeblock configuration specific to one segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CbSpecificMetadata {
    /// Codeblock length before rate matching, in bits
    pub full_length: usize,
    /// Number of filler bits at the end of the information region
    pub nof_filler_bits: usize,
    /// Rate-matched length in bits
    pub rm_length: usize,
    /// Number of CRC bits carried inside the codeblock (TB CRC if a single
    /// segment, segment CRC otherwise)
    pub nof_crc_bits: usize,
    /// Starting bit position of the codeblock within the codeword
    pub cw_offset: usize,
}

/// Full per-codeblock metadata.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CodeblockMetadata {
    /// Transport-block common configuration
    pub tb_common: TbCommonMetadata,
    /// Codeblock-specific configuration
    pub cb_specific: CbSpecificMetadata,
}

/// Transport-block segmentation configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Base graph selected for the transport block
    pub base_graph: LdpcBaseGraph,
    /// Redundancy version, 0 to 3
    pub rv: u8,
    /// Modulation scheme of the codeword
    pub modulation: ModulationScheme,
    /// Limited-buffer rate-matching length; 0 means unlimited
    pub nref: usize,
    /// Number of transmission layers
    pub nof_layers: usize,
    /// Number of channel symbols assigned to the codeword
    pub nof_ch_symbols: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifting_set_index() {
        assert_eq!(lifting_set_index(2), Some(0));
        assert_eq!(lifting_set_index(256), Some(0));
        assert_eq!(lifting_set_index(384), Some(1));
        assert_eq!(lifting_set_index(320), Some(2));
        assert_eq!(lifting_set_index(224), Some(3));
        assert_eq!(lifting_set_index(288), Some(4));
        assert_eq!(lifting_set_index(352), Some(5));
        assert_eq!(lifting_set_index(208), Some(6));
        assert_eq!(lifting_set_index(240), Some(7));
        assert_eq!(lifting_set_index(17), None);
    }

    #[test]
    fn test_nof_codeblocks() {
        // 96 bits plus CRC16 fit a single BG1 codeblock.
        assert_eq!(compute_nof_codeblocks(96, LdpcBaseGraph::BaseGraph1), 1);
        // 12000 bits plus CRC24 exceed 8448 and split in two.
        assert_eq!(compute_nof_codeblocks(12_000, LdpcBaseGraph::BaseGraph1), 2);
        // 40000 bits split in five.
        assert_eq!(compute_nof_codeblocks(40_000, LdpcBaseGraph::BaseGraph1), 5);
    }

    #[test]
    fn test_lifting_size_selection() {
        // TBS 96: B' = 112, 22 * 6 = 132 >= 112 while 22 * 5 = 110 < 112.
        let z = compute_lifting_size(96, LdpcBaseGraph::BaseGraph1, 1).unwrap();
        assert_eq!(z, 6);

        // TBS 12000: two segments with CRC24B each, K' = 6036.
        let z = compute_lifting_size(12_000, LdpcBaseGraph::BaseGraph1, 2).unwrap();
        assert_eq!(z, 288);

        // TBS 320 on BG2: Kb = 8, B' = 336, 8 * 44 = 352 >= 336.
        let z = compute_lifting_size(320, LdpcBaseGraph::BaseGraph2, 1).unwrap();
        assert_eq!(z, 44);
    }

    #[test]
    fn test_codeblock_sizes() {
        assert_eq!(compute_codeblock_size(LdpcBaseGraph::BaseGraph1, 6), 132);
        assert_eq!(compute_codeblock_size(LdpcBaseGraph::BaseGraph2, 44), 440);
        assert_eq!(compute_full_codeblock_size(LdpcBaseGraph::BaseGraph1, 384), 25_344);
    }
}
