//! End-to-end channel-coding tests
//!
//! Drives the full transmit chain (segmentation, encoding, rate matching)
//! into a noise-free channel and back through the receive chain (Rx
//! segmentation, rate dematching, decoding), for a range of transport-block
//! sizes, modulations and redundancy versions.

use anyhow::{ensure, Result};
use coding::ldpc::{
    LdpcBaseGraph, LdpcDecoder, LdpcDecoderConfig, LdpcEncoder, LdpcEncoderConfig,
    LdpcRateDematcher, LdpcRateMatcher, RxSegmenter, SegmenterConfig, TxSegmenter,
};
use coding::short_block::{ShortBlockDetector, ShortBlockEncoder};
use common::{BitBuffer, CrcCalculator, CrcPoly, Llr, ModulationScheme};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MAX_ITERATIONS: usize = 10;
const SCALING_FACTOR: f32 = 0.8;

fn make_tx_segmenter() -> TxSegmenter {
    TxSegmenter::new(
        CrcCalculator::new(CrcPoly::Crc16),
        CrcCalculator::new(CrcPoly::Crc24A),
        CrcCalculator::new(CrcPoly::Crc24B),
    )
    .expect("valid CRC set")
}

/// Converts a hard bit into a fully confident LLR.
fn bit_to_llr(bit: u8) -> Llr {
    Llr::new(127 * (1 - 2 * (bit as i8)))
}

/// Runs the whole Tx chain and returns the codeword LLRs observed by a
/// noise-free channel.
fn transmit(tb: &[u8], cfg: &SegmenterConfig) -> Result<Vec<Llr>> {
    let mut segmenter = make_tx_segmenter();
    let buffer = segmenter.new_transmission(tb, cfg)?;

    let mut encoder = LdpcEncoder::new();
    let mut rate_matcher = LdpcRateMatcher::new();
    let encoder_config = LdpcEncoderConfig {
        base_graph: cfg.base_graph,
        lifting_size: buffer.cb_metadata(0)?.tb_common.lifting_size,
    };

    let mut codeword = Vec::new();
    let mut codeblock = BitBuffer::with_len(buffer.segment_length());
    for cb_index in 0..buffer.nof_segments() {
        buffer.read_codeblock(&mut codeblock, cb_index)?;
        let metadata = buffer.cb_metadata(cb_index)?;

        let encoded = encoder.encode(&codeblock, &encoder_config)?;
        let mut rate_matched = BitBuffer::with_len(metadata.cb_specific.rm_length);
        rate_matcher.rate_match(&mut rate_matched, &encoded, &metadata)?;

        ensure!(metadata.cb_specific.cw_offset == codeword.len(), "codeword offset mismatch");
        for i in 0..rate_matched.len() {
            codeword.push(bit_to_llr(rate_matched.get(i)));
        }
    }
    ensure!(codeword.len() == cfg.nof_ch_symbols * cfg.modulation.bits_per_symbol());
    Ok(codeword)
}

struct Decoded {
    tb_bits: Vec<u8>,
    used_iterations: Vec<usize>,
}

/// Runs the whole Rx chain and reassembles the transport-block bits.
fn receive(codeword: &[Llr], tbs: usize, cfg: &SegmenterConfig) -> Result<Decoded> {
    let rx_segmenter = RxSegmenter::new();
    let codeblocks = rx_segmenter.segment(codeword, tbs, cfg)?;
    let nof_segments = codeblocks.len();

    let crc16 = CrcCalculator::new(CrcPoly::Crc16);
    let crc24a = CrcCalculator::new(CrcPoly::Crc24A);
    let crc24b = CrcCalculator::new(CrcPoly::Crc24B);

    let mut dematcher = LdpcRateDematcher::new();
    let mut decoder = LdpcDecoder::new();

    let mut tb_bits = Vec::new();
    let mut used_iterations = Vec::new();
    for (cb_index, codeblock) in codeblocks.iter().enumerate() {
        let metadata = &codeblock.metadata;
        let lifting_size = metadata.tb_common.lifting_size;
        let base_graph = metadata.tb_common.base_graph;
        let message_length = base_graph.nof_info_nodes() * lifting_size;

        let mut soft_codeblock = vec![Llr::ZERO; metadata.cb_specific.full_length];
        dematcher.rate_dematch(&mut soft_codeblock, codeblock.llrs, true, metadata)?;

        let crc = match (nof_segments, metadata.cb_specific.nof_crc_bits) {
            (1, 16) => &crc16,
            (1, 24) => &crc24a,
            _ => &crc24b,
        };
        let decoder_config = LdpcDecoderConfig {
            base_graph,
            lifting_size,
            max_iterations: MAX_ITERATIONS,
            scaling_factor: SCALING_FACTOR,
            nof_filler_bits: metadata.cb_specific.nof_filler_bits,
            nof_crc_bits: metadata.cb_specific.nof_crc_bits,
        };

        let mut message = BitBuffer::with_len(message_length);
        let used = decoder.decode(&mut message, &soft_codeblock, Some(crc), &decoder_config)?;
        let used = used.ok_or_else(|| anyhow::anyhow!("codeblock {} failed to decode", cb_index))?;
        used_iterations.push(used);

        // Strip the segment CRC; the last segment also carries the TB CRC
        // and possible zero padding, removed after reassembly.
        let significant = message_length
            - metadata.cb_specific.nof_filler_bits
            - if nof_segments > 1 { 24 } else { 0 };
        for i in 0..significant {
            tb_bits.push(message.get(i));
        }
    }

    // Remove the TB CRC (and the zero padding preceding it, if any).
    ensure!(tb_bits.len() >= tbs, "too few decoded bits");
    let crc_len = if tbs <= 3824 { 16 } else { 24 };
    let tb_crc = if tbs <= 3824 { &crc16 } else { &crc24a };
    ensure!(
        tb_crc.calculate_bits(&tb_bits[..tbs + crc_len]) == 0,
        "transport block CRC failed"
    );
    tb_bits.truncate(tbs);
    Ok(Decoded { tb_bits, used_iterations })
}

fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | bit))
        .collect()
}

fn round_trip(tb: &[u8], cfg: &SegmenterConfig) -> Result<Decoded> {
    let codeword = transmit(tb, cfg)?;
    let decoded = receive(&codeword, tb.len() * 8, cfg)?;
    ensure!(bits_to_bytes(&decoded.tb_bits) == tb, "transport block corrupted");
    Ok(decoded)
}

#[test]
fn scenario_bg1_tbs96_single_codeblock() -> Result<()> {
    // 12 bytes, one BG1 codeblock of length 132 with a CRC16.
    let tb: Vec<u8> = (0u8..12).collect();
    let cfg = SegmenterConfig {
        base_graph: LdpcBaseGraph::BaseGraph1,
        rv: 0,
        modulation: ModulationScheme::Qpsk,
        nref: 0,
        nof_layers: 1,
        nof_ch_symbols: 66,
    };

    let mut segmenter = make_tx_segmenter();
    let buffer = segmenter.new_transmission(&tb, &cfg)?;
    ensure!(buffer.nof_segments() == 1);
    ensure!(buffer.segment_length() == 132);
    // The TB checksum is embedded right after the payload.
    let mut codeblock = BitBuffer::with_len(132);
    buffer.read_codeblock(&mut codeblock, 0)?;
    ensure!(codeblock.extract(96, 16) as u32 == buffer.tb_crc_checksum());
    drop(buffer);

    let decoded = round_trip(&tb, &cfg)?;
    ensure!(decoded.used_iterations == vec![1], "expected single-iteration decode");
    Ok(())
}

#[test]
fn scenario_bg1_tbs4000_single_codeblock() -> Result<()> {
    // 500 bytes, one BG1 codeblock of length 4224 with a CRC24A.
    let tb = vec![0xa5u8; 500];
    let cfg = SegmenterConfig {
        base_graph: LdpcBaseGraph::BaseGraph1,
        rv: 0,
        modulation: ModulationScheme::Qam16,
        nref: 0,
        nof_layers: 2,
        nof_ch_symbols: 1056,
    };

    let mut segmenter = make_tx_segmenter();
    let buffer = segmenter.new_transmission(&tb, &cfg)?;
    ensure!(buffer.nof_segments() == 1);
    ensure!(buffer.segment_length() == 4224);
    ensure!(buffer.cb_metadata(0)?.cb_specific.nof_crc_bits == 24);
    drop(buffer);

    round_trip(&tb, &cfg)?;
    Ok(())
}

#[test]
fn scenario_bg1_tbs12000_two_codeblocks() -> Result<()> {
    // 1500 bytes, two BG1 codeblocks of length 6336, each with a CRC24B.
    let tb: Vec<u8> = (0..1500).map(|i| if i % 2 == 0 { 0x5a } else { 0xa5 }).collect();
    let cfg = SegmenterConfig {
        base_graph: LdpcBaseGraph::BaseGraph1,
        rv: 0,
        modulation: ModulationScheme::Qpsk,
        nref: 0,
        nof_layers: 1,
        nof_ch_symbols: 8000,
    };

    let mut segmenter = make_tx_segmenter();
    let buffer = segmenter.new_transmission(&tb, &cfg)?;
    ensure!(buffer.nof_segments() == 2);
    ensure!(buffer.segment_length() == 6336);
    ensure!(buffer.cb_metadata(0)?.cb_specific.nof_crc_bits == 24);
    drop(buffer);

    round_trip(&tb, &cfg)?;
    Ok(())
}

#[test]
fn scenario_bg1_tbs40000_five_codeblocks_all_rvs() -> Result<()> {
    // 5000 bytes, five BG1 codeblocks of length 8448; every redundancy
    // version decodes standalone since each E covers the full buffer.
    let mut rng = StdRng::seed_from_u64(0x40000);
    let tb: Vec<u8> = (0..5000).map(|_| rng.gen()).collect();

    for rv in 0..4u8 {
        let cfg = SegmenterConfig {
            base_graph: LdpcBaseGraph::BaseGraph1,
            rv,
            modulation: ModulationScheme::Qam64,
            nref: 0,
            nof_layers: 4,
            nof_ch_symbols: 21_120,
        };

        let mut segmenter = make_tx_segmenter();
        let buffer = segmenter.new_transmission(&tb, &cfg)?;
        ensure!(buffer.nof_segments() == 5);
        ensure!(buffer.segment_length() == 8448);
        drop(buffer);

        let decoded = round_trip(&tb, &cfg)?;
        for &used in &decoded.used_iterations {
            ensure!(used <= 2, "rv {} took {} iterations", rv, used);
        }
        if rv == 0 {
            ensure!(decoded.used_iterations.iter().all(|&used| used == 1));
        }
    }
    Ok(())
}

#[test]
fn scenario_bg2_tbs320_single_codeblock() -> Result<()> {
    // 40 bytes, one BG2 codeblock of length 440 with a CRC16.
    let tb: Vec<u8> = (0u8..40).collect();
    let cfg = SegmenterConfig {
        base_graph: LdpcBaseGraph::BaseGraph2,
        rv: 0,
        modulation: ModulationScheme::Qpsk,
        nref: 0,
        nof_layers: 1,
        nof_ch_symbols: 220,
    };

    let mut segmenter = make_tx_segmenter();
    let buffer = segmenter.new_transmission(&tb, &cfg)?;
    ensure!(buffer.nof_segments() == 1);
    ensure!(buffer.segment_length() == 440);
    ensure!(buffer.cb_metadata(0)?.cb_specific.nof_crc_bits == 16);
    drop(buffer);

    round_trip(&tb, &cfg)?;
    Ok(())
}

#[test]
fn scenario_short_block_k11_qam64() -> Result<()> {
    // 11 UCI bits spread over 64 rate-matched bits at Qm = 6.
    let message = [1u8, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1];
    let mut encoder = ShortBlockEncoder::new();
    let mut encoded = vec![0u8; 64];
    encoder.encode(&mut encoded, &message, ModulationScheme::Qam64)?;

    let llrs: Vec<Llr> = encoded.iter().map(|&bit| bit_to_llr(bit)).collect();
    let mut detector = ShortBlockDetector::new();
    let mut detected_bits = vec![0u8; 11];
    let detected = detector.detect(&mut detected_bits, &llrs, ModulationScheme::Qam64);
    ensure!(detected, "GLRT metric below threshold");
    ensure!(detected_bits == message);
    Ok(())
}

#[test]
fn round_trip_across_modulations_and_rvs() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for modulation in [
        ModulationScheme::Bpsk,
        ModulationScheme::Qpsk,
        ModulationScheme::Qam16,
        ModulationScheme::Qam64,
        ModulationScheme::Qam256,
    ] {
        for rv in 0..4u8 {
            // 89 bytes keep a single BG2 codeblock; symbols chosen so E
            // covers the full circular buffer for every rv.
            let tb: Vec<u8> = (0..89).map(|_| rng.gen()).collect();
            let qm = modulation.bits_per_symbol();
            let nof_ch_symbols = 4800 / qm;
            let cfg = SegmenterConfig {
                base_graph: LdpcBaseGraph::BaseGraph2,
                rv,
                modulation,
                nref: 0,
                nof_layers: 1,
                nof_ch_symbols,
            };
            round_trip(&tb, &cfg)?;
        }
    }
    Ok(())
}

#[test]
fn round_trip_with_limited_buffer() -> Result<()> {
    // Nref below the codeblock length restricts the circular buffer.
    let mut rng = StdRng::seed_from_u64(0x11ef);
    let tb: Vec<u8> = (0..89).map(|_| rng.gen()).collect();
    let cfg = SegmenterConfig {
        base_graph: LdpcBaseGraph::BaseGraph2,
        rv: 0,
        modulation: ModulationScheme::Qpsk,
        nref: 2000,
        nof_layers: 1,
        nof_ch_symbols: 900,
    };
    round_trip(&tb, &cfg)?;
    Ok(())
}

#[test]
fn harq_combining_is_order_insensitive() -> Result<()> {
    // Receiving rv0 then rv2 must fill the soft buffer exactly like rv2
    // then rv0.
    let mut rng = StdRng::seed_from_u64(0xcafe);
    let tb: Vec<u8> = (0..89).map(|_| rng.gen()).collect();

    let config_for_rv = |rv: u8| SegmenterConfig {
        base_graph: LdpcBaseGraph::BaseGraph2,
        rv,
        modulation: ModulationScheme::Qpsk,
        nref: 0,
        nof_layers: 1,
        nof_ch_symbols: 600,
    };

    let codewords: Vec<Vec<Llr>> = [0u8, 2]
        .iter()
        .map(|&rv| transmit(&tb, &config_for_rv(rv)))
        .collect::<Result<_>>()?;

    let rx_segmenter = RxSegmenter::new();
    let mut dematcher = LdpcRateDematcher::new();

    let mut combine = |order: [usize; 2]| -> Result<Vec<Llr>> {
        let mut soft = Vec::new();
        for (pass, &slot) in order.iter().enumerate() {
            let rv = [0u8, 2][slot];
            let codeblocks = rx_segmenter.segment(&codewords[slot], tb.len() * 8, &config_for_rv(rv))?;
            let metadata = &codeblocks[0].metadata;
            if pass == 0 {
                soft = vec![Llr::ZERO; metadata.cb_specific.full_length];
            }
            dematcher.rate_dematch(&mut soft, codeblocks[0].llrs, pass == 0, metadata)?;
        }
        Ok(soft)
    };

    let forward = combine([0, 1])?;
    let backward = combine([1, 0])?;
    ensure!(forward == backward, "combined soft buffers differ");
    Ok(())
}

#[test]
fn decoding_recovers_after_harq_combining() -> Result<()> {
    // First transmission heavily punctured, second fills the gap.
    let mut rng = StdRng::seed_from_u64(0x4a59);
    let tb: Vec<u8> = (0..89).map(|_| rng.gen()).collect();

    let config_for_rv = |rv: u8| SegmenterConfig {
        base_graph: LdpcBaseGraph::BaseGraph2,
        rv,
        modulation: ModulationScheme::Qpsk,
        nref: 0,
        nof_layers: 1,
        nof_ch_symbols: 600,
    };

    let rx_segmenter = RxSegmenter::new();
    let mut dematcher = LdpcRateDematcher::new();
    let mut soft = Vec::new();
    for (pass, rv) in [0u8, 2].iter().enumerate() {
        let codeword = transmit(&tb, &config_for_rv(*rv))?;
        let codeblocks = rx_segmenter.segment(&codeword, tb.len() * 8, &config_for_rv(*rv))?;
        let metadata = &codeblocks[0].metadata;
        if pass == 0 {
            soft = vec![Llr::ZERO; metadata.cb_specific.full_length];
        }
        dematcher.rate_dematch(&mut soft, codeblocks[0].llrs, pass == 0, metadata)?;
    }

    let crc16 = CrcCalculator::new(CrcPoly::Crc16);
    let reference_codeword = transmit(&tb, &config_for_rv(0))?;
    let codeblocks = rx_segmenter.segment(&reference_codeword, tb.len() * 8, &config_for_rv(0))?;
    let metadata = &codeblocks[0].metadata;
    let message_length = metadata.tb_common.base_graph.nof_info_nodes() * metadata.tb_common.lifting_size;
    let mut message = BitBuffer::with_len(message_length);
    let decoder_config = LdpcDecoderConfig {
        base_graph: metadata.tb_common.base_graph,
        lifting_size: metadata.tb_common.lifting_size,
        max_iterations: MAX_ITERATIONS,
        scaling_factor: SCALING_FACTOR,
        nof_filler_bits: metadata.cb_specific.nof_filler_bits,
        nof_crc_bits: 16,
    };
    let mut decoder = LdpcDecoder::new();
    let used = decoder.decode(&mut message, &soft, Some(&crc16), &decoder_config)?;
    ensure!(used.is_some(), "combined transmissions failed to decode");

    let mut tb_bits = Vec::new();
    for i in 0..tb.len() * 8 {
        tb_bits.push(message.get(i));
    }
    ensure!(bits_to_bytes(&tb_bits) == tb);
    Ok(())
}
