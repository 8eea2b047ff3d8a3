//! Transport-block segmentation parameters
//!
//! Shared parameter derivation for the Tx and Rx segmenters, as per
//! TS 38.212 Sections 5.2.2 and 5.4.2.1.

use super::{
    compute_full_codeblock_size, compute_lifting_size, compute_nof_codeblocks,
    compute_tb_crc_size, CbSpecificMetadata, CodeblockMetadata, LdpcBaseGraph, SegmenterConfig,
    TbCommonMetadata, MAX_NOF_SEGMENTS, MAX_TBS_BITS, SEG_CRC_LENGTH,
};
use crate::CodingError;
use tracing::debug;

/// Derived segmentation parameters of one transport block.
#[derive(Debug, Clone)]
pub(super) struct SegmentParams {
    /// Base graph used by every segment
    pub base_graph: LdpcBaseGraph,
    /// Transport-block CRC length (16 or 24 bits)
    pub nof_tb_crc_bits: usize,
    /// Transport block plus its CRC (`B + L`)
    pub nof_tb_bits_in: usize,
    /// Number of segments (`C`)
    pub nof_segments: usize,
    /// Lifting size (`Z`)
    pub lifting_size: usize,
    /// Segment length `K * Z`
    pub segment_length: usize,
    /// Segment CRC length (24 bits when `C > 1`, otherwise 0)
    pub nof_crc_bits: usize,
    /// Information bits assigned to a segment, excluding the segment CRC
    pub cb_info_bits: usize,
    /// Transport-block bits consumed by the last segment
    pub cb_info_bits_last: usize,
    /// Zero-padding bits added to the last segment
    pub zero_pad: usize,
    /// Filler bits per segment
    pub nof_filler_bits: usize,
    /// Segments with the shorter rate-matched length
    pub nof_short_segments: usize,
    /// Channel symbols per transmission layer
    pub nof_symbols_per_layer: usize,
    /// Codeword length in bits
    pub cw_length: usize,
    /// Starting bit of each segment within the codeword
    pub cw_offset: Vec<usize>,
    /// Starting bit of each segment within the transport block
    pub tb_offset: Vec<usize>,
    /// Metadata of each segment
    pub cb_metadata: Vec<CodeblockMetadata>,
}

fn check_config(nof_tb_bits: usize, cfg: &SegmenterConfig) -> Result<(), CodingError> {
    if nof_tb_bits == 0 {
        return Err(CodingError::InvalidInputSize(
            "The transport block should not be empty".into(),
        ));
    }
    if nof_tb_bits + compute_tb_crc_size(nof_tb_bits) > MAX_TBS_BITS {
        return Err(CodingError::InvalidConfiguration(format!(
            "Transport block of {} bits is too long; the admissible size, including CRC, is {}",
            nof_tb_bits, MAX_TBS_BITS
        )));
    }
    if cfg.rv > 3 {
        return Err(CodingError::InvalidConfiguration(format!(
            "Invalid redundancy version {}",
            cfg.rv
        )));
    }
    if !(1..=4).contains(&cfg.nof_layers) {
        return Err(CodingError::InvalidConfiguration(format!(
            "Invalid number of layers {}",
            cfg.nof_layers
        )));
    }
    if cfg.nof_ch_symbols % cfg.nof_layers != 0 {
        return Err(CodingError::InvalidConfiguration(format!(
            "The number of channel symbols {} should be a multiple of the number of layers {}",
            cfg.nof_ch_symbols, cfg.nof_layers
        )));
    }
    Ok(())
}

impl SegmentParams {
    /// Derives all segmentation parameters for a transport block of
    /// `nof_tb_bits` bits.
    pub fn compute(nof_tb_bits: usize, cfg: &SegmenterConfig) -> Result<Self, CodingError> {
        check_config(nof_tb_bits, cfg)?;

        let base_graph = cfg.base_graph;
        let nof_tb_crc_bits = compute_tb_crc_size(nof_tb_bits);
        let nof_tb_bits_in = nof_tb_bits + nof_tb_crc_bits;

        let nof_segments = compute_nof_codeblocks(nof_tb_bits, base_graph);
        if nof_segments > MAX_NOF_SEGMENTS {
            return Err(CodingError::InvalidConfiguration(format!(
                "Transport block segments into {} codeblocks, more than the maximum {}",
                nof_segments, MAX_NOF_SEGMENTS
            )));
        }
        let mut nof_tb_bits_out = nof_tb_bits_in;
        if nof_segments > 1 {
            nof_tb_bits_out += nof_segments * SEG_CRC_LENGTH;
        }

        let lifting_size = compute_lifting_size(nof_tb_bits, base_graph, nof_segments)?;
        let segment_length = base_graph.nof_info_nodes() * lifting_size;
        let nof_crc_bits = if nof_segments > 1 { SEG_CRC_LENGTH } else { 0 };

        // Information bits per segment; the last segment absorbs the TB CRC
        // and the zero padding.
        let cb_info_bits = nof_tb_bits_out.div_ceil(nof_segments) - nof_crc_bits;
        let zero_pad = (cb_info_bits + nof_crc_bits) * nof_segments - nof_tb_bits_out;
        let nof_filler_bits = segment_length - cb_info_bits - nof_crc_bits;

        let nof_symbols_per_layer = cfg.nof_ch_symbols / cfg.nof_layers;
        // Segments whose rate-matched length is rounded down; the remaining
        // ones are rounded up.
        let nof_short_segments = nof_segments - (nof_symbols_per_layer % nof_segments);
        let cw_length = cfg.nof_ch_symbols * cfg.modulation.bits_per_symbol();

        let mut params = Self {
            base_graph,
            nof_tb_crc_bits,
            nof_tb_bits_in,
            nof_segments,
            lifting_size,
            segment_length,
            nof_crc_bits,
            cb_info_bits,
            cb_info_bits_last: cb_info_bits - nof_tb_crc_bits - zero_pad,
            zero_pad,
            nof_filler_bits,
            nof_short_segments,
            nof_symbols_per_layer,
            cw_length,
            cw_offset: Vec::with_capacity(nof_segments),
            tb_offset: Vec::with_capacity(nof_segments),
            cb_metadata: Vec::with_capacity(nof_segments),
        };

        let mut cw_offset = 0;
        let mut tb_offset = 0;
        for i_segment in 0..nof_segments {
            let last_cb = i_segment == nof_segments - 1;

            params.cw_offset.push(cw_offset);
            params.tb_offset.push(tb_offset);
            let metadata = params.generate_cb_metadata(cfg, i_segment, cw_offset);
            params.cb_metadata.push(metadata);

            let mut nof_used_bits = params.cb_info_bits;
            if last_cb {
                nof_used_bits -= params.nof_tb_crc_bits + params.zero_pad;
                tb_offset += params.nof_tb_crc_bits;
            }
            tb_offset += nof_used_bits;
            cw_offset += params.rm_length(cfg, i_segment);
        }

        // After segmenting, no bits may be left over on either side.
        if tb_offset != params.nof_tb_bits_in {
            return Err(CodingError::InvalidConfiguration(format!(
                "Transport block offset {} must equal the transport block size including CRC {}",
                tb_offset, params.nof_tb_bits_in
            )));
        }
        if cw_offset != params.cw_length {
            return Err(CodingError::InvalidConfiguration(format!(
                "Codeblock offset {} must equal the codeword size {}",
                cw_offset, params.cw_length
            )));
        }

        debug!(
            "TB segmentation: B={}, C={}, Z={}, K={}, filler={}, G={}",
            nof_tb_bits,
            params.nof_segments,
            params.lifting_size,
            params.segment_length,
            params.nof_filler_bits,
            params.cw_length
        );

        Ok(params)
    }

    /// Rate-matched length of segment `i_segment`, TS 38.212 Section 5.4.2.1.
    pub fn rm_length(&self, cfg: &SegmenterConfig, i_segment: usize) -> usize {
        let tmp = if i_segment < self.nof_short_segments {
            self.nof_symbols_per_layer / self.nof_segments
        } else {
            self.nof_symbols_per_layer.div_ceil(self.nof_segments)
        };
        tmp * cfg.nof_layers * cfg.modulation.bits_per_symbol()
    }

    /// Number of transport-block information bits carried by a segment.
    pub fn cb_info_bits(&self, i_segment: usize) -> usize {
        if i_segment == self.nof_segments - 1 {
            self.cb_info_bits_last
        } else {
            self.cb_info_bits
        }
    }

    fn generate_cb_metadata(
        &self,
        cfg: &SegmenterConfig,
        i_segment: usize,
        cw_offset: usize,
    ) -> CodeblockMetadata {
        CodeblockMetadata {
            tb_common: TbCommonMetadata {
                base_graph: self.base_graph,
                lifting_size: self.lifting_size,
                rv: cfg.rv,
                modulation: cfg.modulation,
                nref: cfg.nref,
                cw_length: self.cw_length,
            },
            cb_specific: CbSpecificMetadata {
                full_length: compute_full_codeblock_size(self.base_graph, self.lifting_size),
                nof_filler_bits: self.nof_filler_bits,
                rm_length: self.rm_length(cfg, i_segment),
                nof_crc_bits: if self.nof_segments == 1 {
                    self.nof_tb_crc_bits
                } else {
                    self.nof_crc_bits
                },
                cw_offset,
            },
        }
    }
}
