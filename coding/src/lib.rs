//! Channel Coding Library
//!
//! This crate implements the 5G NR channel-coding chain of TS 38.212
//! Sections 5.2-5.4: LDPC transport-block segmentation, encoding, rate
//! matching and decoding, together with the short-block codec used for small
//! uplink control payloads.

pub mod ldpc;
pub mod short_block;

use thiserror::Error;

/// Common errors for the coding subsystems
#[derive(Error, Debug)]
pub enum CodingError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid input size: {0}")]
    InvalidInputSize(String),

    #[error("Invalid output size: {0}")]
    InvalidOutputSize(String),
}
