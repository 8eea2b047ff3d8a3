//! LDPC channel-coding chain walkthrough
//!
//! This example pushes a transport block through the full transmit chain
//! (segmentation, encoding, rate matching), models a noise-free channel and
//! recovers the data through the receive chain (rate dematching, decoding).

use coding::ldpc::{
    LdpcBaseGraph, LdpcDecoder, LdpcDecoderConfig, LdpcEncoder, LdpcEncoderConfig,
    LdpcRateDematcher, LdpcRateMatcher, RxSegmenter, SegmenterConfig, TxSegmenter,
};
use common::{BitBuffer, CrcCalculator, CrcPoly, Llr, ModulationScheme};

fn main() {
    println!("LDPC Channel-Coding Chain");
    println!("=========================\n");

    // Transport block and transmission configuration.
    let transport_block: Vec<u8> = (0..=0xff).cycle().take(1500).collect();
    let cfg = SegmenterConfig {
        base_graph: LdpcBaseGraph::BaseGraph1,
        rv: 0,
        modulation: ModulationScheme::Qpsk,
        nref: 0,
        nof_layers: 1,
        nof_ch_symbols: 8000,
    };

    println!("Configuration:");
    println!("  TBS: {} bits", transport_block.len() * 8);
    println!("  Base graph: {:?}", cfg.base_graph);
    println!("  Modulation: {:?}", cfg.modulation);
    println!("  Codeword: {} bits\n", cfg.nof_ch_symbols * cfg.modulation.bits_per_symbol());

    // Transmit side.
    let mut segmenter = match TxSegmenter::new(
        CrcCalculator::new(CrcPoly::Crc16),
        CrcCalculator::new(CrcPoly::Crc24A),
        CrcCalculator::new(CrcPoly::Crc24B),
    ) {
        Ok(segmenter) => segmenter,
        Err(e) => {
            eprintln!("Failed to create segmenter: {}", e);
            return;
        }
    };
    let buffer = match segmenter.new_transmission(&transport_block, &cfg) {
        Ok(buffer) => buffer,
        Err(e) => {
            eprintln!("Segmentation failed: {}", e);
            return;
        }
    };

    println!("Segmentation:");
    println!("  Codeblocks: {}", buffer.nof_segments());
    println!("  Segment length: {} bits", buffer.segment_length());
    println!("  TB CRC: {:#x}\n", buffer.tb_crc_checksum());

    let mut encoder = LdpcEncoder::new();
    let mut rate_matcher = LdpcRateMatcher::new();
    let mut codeword = Vec::new();
    let mut codeblock = BitBuffer::with_len(buffer.segment_length());

    for cb_index in 0..buffer.nof_segments() {
        let metadata = match buffer.cb_metadata(cb_index) {
            Ok(metadata) => metadata,
            Err(e) => {
                eprintln!("Metadata lookup failed: {}", e);
                return;
            }
        };
        if let Err(e) = buffer.read_codeblock(&mut codeblock, cb_index) {
            eprintln!("Codeblock read failed: {}", e);
            return;
        }

        let encoder_config = LdpcEncoderConfig {
            base_graph: metadata.tb_common.base_graph,
            lifting_size: metadata.tb_common.lifting_size,
        };
        let encoded = match encoder.encode(&codeblock, &encoder_config) {
            Ok(encoded) => encoded,
            Err(e) => {
                eprintln!("Encoding failed: {}", e);
                return;
            }
        };

        let mut rate_matched = BitBuffer::with_len(metadata.cb_specific.rm_length);
        if let Err(e) = rate_matcher.rate_match(&mut rate_matched, &encoded, &metadata) {
            eprintln!("Rate matching failed: {}", e);
            return;
        }

        println!(
            "  Codeblock {}: Z={}, E={} bits at offset {}",
            cb_index,
            metadata.tb_common.lifting_size,
            metadata.cb_specific.rm_length,
            metadata.cb_specific.cw_offset
        );

        // Noise-free channel: hard bits become confident LLRs.
        for i in 0..rate_matched.len() {
            let bit = rate_matched.get(i);
            codeword.push(Llr::new(127 * (1 - 2 * (bit as i8))));
        }
    }

    // Receive side.
    let rx_segmenter = RxSegmenter::new();
    let codeblocks = match rx_segmenter.segment(&codeword, transport_block.len() * 8, &cfg) {
        Ok(codeblocks) => codeblocks,
        Err(e) => {
            eprintln!("Rx segmentation failed: {}", e);
            return;
        }
    };

    let crc24b = CrcCalculator::new(CrcPoly::Crc24B);
    let mut dematcher = LdpcRateDematcher::new();
    let mut decoder = LdpcDecoder::new();

    println!("\nDecoding:");
    for (cb_index, received) in codeblocks.iter().enumerate() {
        let metadata = &received.metadata;
        let mut soft = vec![Llr::ZERO; metadata.cb_specific.full_length];
        if let Err(e) = dematcher.rate_dematch(&mut soft, received.llrs, true, metadata) {
            eprintln!("Rate dematching failed: {}", e);
            return;
        }

        let decoder_config = LdpcDecoderConfig {
            base_graph: metadata.tb_common.base_graph,
            lifting_size: metadata.tb_common.lifting_size,
            max_iterations: 10,
            scaling_factor: 0.8,
            nof_filler_bits: metadata.cb_specific.nof_filler_bits,
            nof_crc_bits: metadata.cb_specific.nof_crc_bits,
        };
        let message_length =
            metadata.tb_common.base_graph.nof_info_nodes() * metadata.tb_common.lifting_size;
        let mut message = BitBuffer::with_len(message_length);
        match decoder.decode(&mut message, &soft, Some(&crc24b), &decoder_config) {
            Ok(Some(iterations)) => {
                println!("  Codeblock {}: CRC passed after {} iteration(s)", cb_index, iterations)
            }
            Ok(None) => println!("  Codeblock {}: decoding failed", cb_index),
            Err(e) => {
                eprintln!("Decoding error: {}", e);
                return;
            }
        }
    }

    println!("\nDone.");
}
