//! Transmit-side transport-block segmentation
//!
//! Bufferless Tx segmentation: parameters and the TB checksum are computed
//! once per transport block, and codeblocks are materialised one at a time,
//! on demand, into a caller-supplied buffer. This lets the caller process
//! segments in whatever order suits its cache.

use super::segmenter::SegmentParams;
use super::{CodeblockMetadata, SegmenterConfig};
use crate::CodingError;
use common::{BitBuffer, CrcCalculator, CrcPoly};
use tracing::debug;

/// Transport blocks longer than this many bits use CRC24A; shorter ones
/// use CRC16.
const MAX_BITS_CRC16: usize = 3824;

/// Tx-side transport-block segmenter.
///
/// The three CRC calculators are injected at construction and owned by the
/// segmenter.
pub struct TxSegmenter {
    crc16: CrcCalculator,
    crc24a: CrcCalculator,
    crc24b: CrcCalculator,
    params: Option<SegmentParams>,
    tb_checksum: u32,
}

impl TxSegmenter {
    /// Creates a segmenter from its CRC dependencies.
    pub fn new(
        crc16: CrcCalculator,
        crc24a: CrcCalculator,
        crc24b: CrcCalculator,
    ) -> Result<Self, CodingError> {
        if crc16.poly() != CrcPoly::Crc16
            || crc24a.poly() != CrcPoly::Crc24A
            || crc24b.poly() != CrcPoly::Crc24B
        {
            return Err(CodingError::InvalidConfiguration(
                "Segmenter CRC calculators must be CRC16, CRC24A and CRC24B".into(),
            ));
        }
        Ok(Self {
            crc16,
            crc24a,
            crc24b,
            params: None,
            tb_checksum: 0,
        })
    }

    /// Computes the segmentation parameters and the TB checksum for a new
    /// transport block, returning a handle for reading its codeblocks.
    pub fn new_transmission<'a>(
        &'a mut self,
        transport_block: &'a [u8],
        cfg: &SegmenterConfig,
    ) -> Result<TxSegmenterBuffer<'a>, CodingError> {
        let params = SegmentParams::compute(transport_block.len() * 8, cfg)?;

        let tb_crc = if transport_block.len() * 8 <= MAX_BITS_CRC16 {
            &self.crc16
        } else {
            &self.crc24a
        };
        self.tb_checksum = tb_crc.calculate_bytes(transport_block);

        debug!(
            "Tx segmentation: {} bytes into {} codeblocks, TB CRC {:#x}",
            transport_block.len(),
            params.nof_segments,
            self.tb_checksum
        );

        let params = self.params.insert(params);
        Ok(TxSegmenterBuffer {
            params,
            crc24b: &self.crc24b,
            tb_checksum: self.tb_checksum,
            transport_block,
        })
    }
}

/// Handle over a prepared transport block, materialising codeblocks on
/// demand.
pub struct TxSegmenterBuffer<'a> {
    params: &'a SegmentParams,
    crc24b: &'a CrcCalculator,
    tb_checksum: u32,
    transport_block: &'a [u8],
}

impl TxSegmenterBuffer<'_> {
    fn params(&self) -> &SegmentParams {
        self.params
    }

    /// Number of codeblocks the transport block segments into.
    pub fn nof_segments(&self) -> usize {
        self.params().nof_segments
    }

    /// Segment length `K * Z`, identical for every codeblock.
    pub fn segment_length(&self) -> usize {
        self.params().segment_length
    }

    /// Metadata of codeblock `cb_index`.
    pub fn cb_metadata(&self, cb_index: usize) -> Result<CodeblockMetadata, CodingError> {
        let params = self.params();
        if cb_index >= params.nof_segments {
            return Err(CodingError::InvalidConfiguration(format!(
                "Codeblock index {} must be lower than the number of segments {}",
                cb_index, params.nof_segments
            )));
        }
        Ok(params.cb_metadata[cb_index])
    }

    /// Number of transport-block bits carried by codeblock `cb_index`.
    pub fn cb_info_bits(&self, cb_index: usize) -> usize {
        self.params().cb_info_bits(cb_index)
    }

    /// Rate-matched length of codeblock `cb_index`.
    pub fn rm_length(&self, cb_index: usize) -> usize {
        self.params().cb_metadata[cb_index].cb_specific.rm_length
    }

    /// Checksum computed over the whole transport block.
    pub fn tb_crc_checksum(&self) -> u32 {
        self.tb_checksum
    }

    /// Materialises codeblock `cb_index` into `codeblock`.
    ///
    /// The buffer receives, in order: the transport-block slice of this
    /// segment, the TB CRC and zero padding (last segment only), the
    /// segment CRC (multi-segment transport blocks only) and zero-valued
    /// filler bits up to `K * Z`.
    pub fn read_codeblock(
        &self,
        codeblock: &mut BitBuffer,
        cb_index: usize,
    ) -> Result<(), CodingError> {
        let params = self.params();
        if codeblock.len() != params.segment_length {
            return Err(CodingError::InvalidOutputSize(format!(
                "Invalid codeblock size {}, expected {}",
                codeblock.len(),
                params.segment_length
            )));
        }
        if cb_index >= params.nof_segments {
            return Err(CodingError::InvalidConfiguration(format!(
                "Codeblock index {} must be lower than the number of segments {}",
                cb_index, params.nof_segments
            )));
        }

        let nof_segment_bits = params.cb_info_bits(cb_index);
        codeblock.copy_from_bytes(0, self.transport_block, params.tb_offset[cb_index], nof_segment_bits);
        let mut nof_used_bits = nof_segment_bits;

        // The last segment carries the TB CRC and the zero padding.
        if cb_index == params.nof_segments - 1 {
            let crc_bits = params.nof_tb_crc_bits;
            for i_byte in 0..crc_bits / 8 {
                let crc_byte = (self.tb_checksum >> (crc_bits - (i_byte + 1) * 8)) & 0xff;
                codeblock.insert(u64::from(crc_byte), nof_used_bits, 8);
                nof_used_bits += 8;
            }
            append_zeros(codeblock, nof_used_bits, params.zero_pad);
            nof_used_bits += params.zero_pad;
        }

        // Segment CRC over everything written so far.
        if params.nof_crc_bits != 0 {
            let cb_checksum = self.crc24b.calculate_packed(codeblock, nof_used_bits);
            for i_byte in 0..3 {
                let crc_byte = (cb_checksum >> (24 - (i_byte + 1) * 8)) & 0xff;
                codeblock.insert(u64::from(crc_byte), nof_used_bits, 8);
                nof_used_bits += 8;
            }
        }

        // Filler bits up to the segment length.
        append_zeros(codeblock, nof_used_bits, params.segment_length - nof_used_bits);
        Ok(())
    }
}

fn append_zeros(buffer: &mut BitBuffer, offset: usize, count: usize) {
    let mut written = 0;
    while written < count {
        let chunk = (count - written).min(64);
        buffer.insert(0, offset + written, chunk);
        written += chunk;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldpc::LdpcBaseGraph;
    use common::ModulationScheme;

    fn segmenter() -> TxSegmenter {
        TxSegmenter::new(
            CrcCalculator::new(CrcPoly::Crc16),
            CrcCalculator::new(CrcPoly::Crc24A),
            CrcCalculator::new(CrcPoly::Crc24B),
        )
        .unwrap()
    }

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
    fn test_rejects_wrong_crc_polynomials() {
        assert!(TxSegmenter::new(
            CrcCalculator::new(CrcPoly::Crc24A),
            CrcCalculator::new(CrcPoly::Crc24A),
            CrcCalculator::new(CrcPoly::Crc24B),
        )
        .is_err());
    }

    #[test]
    fn test_single_segment_layout() {
        let mut segmenter = segmenter();
        let tb: Vec<u8> = (0u8..12).collect();
        let buffer = segmenter.new_transmission(&tb, &config(66)).unwrap();
        assert_eq!(buffer.nof_segments(), 1);
        assert_eq!(buffer.segment_length(), 132);

        let mut codeblock = BitBuffer::with_len(132);
        // Dirty buffer: every appended bit must be written explicitly.
        codeblock.fill(1);
        buffer.read_codeblock(&mut codeblock, 0).unwrap();

        // Transport block copied verbatim.
        for (i, &byte) in tb.iter().enumerate() {
            assert_eq!(codeblock.extract(i * 8, 8) as u8, byte);
        }
        // TB CRC16 appended right after the payload.
        assert_eq!(codeblock.extract(96, 16) as u32, buffer.tb_crc_checksum());
        // Filler bits are zero.
        for i in 112..132 {
            assert_eq!(codeblock.get(i), 0, "filler bit {} not cleared", i);
        }
    }

    #[test]
    fn test_multi_segment_crc() {
        let mut segmenter = segmenter();
        let tb: Vec<u8> = (0..1500).map(|i| if i % 2 == 0 { 0x5a } else { 0xa5 }).collect();
        let buffer = segmenter.new_transmission(&tb, &config(8000)).unwrap();
        assert_eq!(buffer.nof_segments(), 2);
        assert_eq!(buffer.segment_length(), 6336);

        let crc24b = CrcCalculator::new(CrcPoly::Crc24B);
        for cb_index in 0..2 {
            let mut codeblock = BitBuffer::with_len(6336);
            buffer.read_codeblock(&mut codeblock, cb_index).unwrap();
            // Information plus segment CRC leaves a zero remainder.
            let protected = buffer.cb_info_bits(cb_index)
                + if cb_index == 1 { 24 } else { 0 }
                + 24;
            assert_eq!(crc24b.calculate_packed(&codeblock, protected), 0);
        }
    }

    #[test]
    fn test_segments_cover_transport_block() {
        let mut segmenter = segmenter();
        let tb = vec![0xffu8; 1500];
        let buffer = segmenter.new_transmission(&tb, &config(8000)).unwrap();

        let total: usize = (0..buffer.nof_segments()).map(|i| buffer.cb_info_bits(i)).sum();
        // All TB bits are distributed over the segments.
        assert_eq!(total, tb.len() * 8);
    }

    #[test]
    fn test_wrong_codeblock_size() {
        let mut segmenter = segmenter();
        let tb = vec![0u8; 12];
        let buffer = segmenter.new_transmission(&tb, &config(66)).unwrap();
        let mut codeblock = BitBuffer::with_len(64);
        assert!(buffer.read_codeblock(&mut codeblock, 0).is_err());
        let mut codeblock = BitBuffer::with_len(132);
        assert!(buffer.read_codeblock(&mut codeblock, 1).is_err());
    }
}
