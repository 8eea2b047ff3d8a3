//! Receive-side transport-block segmentation
//!
//! Computes the same segmentation parameters as the Tx side, without
//! needing the transport block itself, and slices the codeword LLRs into
//! per-codeblock views.

use super::segmenter::SegmentParams;
use super::{CodeblockMetadata, SegmenterConfig};
use crate::CodingError;
use common::Llr;
use tracing::debug;

/// One received codeblock: a view into the codeword LLRs plus its
/// metadata. The view shares the lifetime of the input codeword.
pub struct RxCodeblock<'a> {
    /// Rate-matched LLRs of this codeblock
    pub llrs: &'a [Llr],
    /// Codeblock metadata
    pub metadata: CodeblockMetadata,
}

/// Rx-side transport-block segmenter.
pub struct RxSegmenter;

impl RxSegmenter {
    pub fn new() -> Self {
        Self
    }

    /// Splits a codeword-length LLR span into per-codeblock slices.
    pub fn segment<'a>(
        &self,
        codeword_llrs: &'a [Llr],
        tbs: usize,
        cfg: &SegmenterConfig,
    ) -> Result<Vec<RxCodeblock<'a>>, CodingError> {
        let expected = cfg.nof_ch_symbols * cfg.modulation.bits_per_symbol();
        if codeword_llrs.len() != expected {
            return Err(CodingError::InvalidInputSize(format!(
                "Wrong number of LLRs {}, expected {}",
                codeword_llrs.len(),
                expected
            )));
        }

        let params = SegmentParams::compute(tbs, cfg)?;

        debug!(
            "Rx segmentation: TBS {} into {} codeblocks of {} rate-matched bits total",
            tbs, params.nof_segments, params.cw_length
        );

        let mut codeblocks = Vec::with_capacity(params.nof_segments);
        for i_segment in 0..params.nof_segments {
            let metadata = params.cb_metadata[i_segment];
            let cw_offset = metadata.cb_specific.cw_offset;
            let rm_length = metadata.cb_specific.rm_length;
            codeblocks.push(RxCodeblock {
                llrs: &codeword_llrs[cw_offset..cw_offset + rm_length],
                metadata,
            });
        }
        Ok(codeblocks)
    }
}

impl Default for RxSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldpc::LdpcBaseGraph;
    use common::ModulationScheme;

    fn config(nof_ch_symbols: usize) -> SegmenterConfig {
        SegmenterConfig {
            base_graph: LdpcBaseGraph::BaseGraph1,
            rv: 0,
            modulation: ModulationScheme::Qpsk,
            nref: 0,
            nof_layers: 1,
            nof_ch_symbols,
        }
    }

    #[test]
    fn test_views_partition_the_codeword() {
        let codeword = vec![Llr::new(9); 16000];
        let segmenter = RxSegmenter::new();
        let codeblocks = segmenter.segment(&codeword, 12_000, &config(8000)).unwrap();
        assert_eq!(codeblocks.len(), 2);

        let mut offset = 0;
        for codeblock in &codeblocks {
            assert_eq!(codeblock.metadata.cb_specific.cw_offset, offset);
            offset += codeblock.llrs.len();
            assert_eq!(codeblock.llrs.len(), codeblock.metadata.cb_specific.rm_length);
        }
        assert_eq!(offset, codeword.len());
    }

    #[test]
    fn test_metadata_matches_tx_side() {
        let codeword = vec![Llr::ZERO; 132];
        let segmenter = RxSegmenter::new();
        let codeblocks = segmenter.segment(&codeword, 96, &config(66)).unwrap();
        assert_eq!(codeblocks.len(), 1);
        let metadata = &codeblocks[0].metadata;
        assert_eq!(metadata.tb_common.lifting_size, 6);
        assert_eq!(metadata.cb_specific.nof_filler_bits, 20);
        assert_eq!(metadata.cb_specific.nof_crc_bits, 16);
        assert_eq!(metadata.cb_specific.full_length, 66 * 6);
    }

    #[test]
    fn test_wrong_llr_count() {
        let codeword = vec![Llr::ZERO; 100];
        let segmenter = RxSegmenter::new();
        assert!(segmenter.segment(&codeword, 96, &config(66)).is_err());
    }
}
