//! Common Types and Primitives Library
//!
//! This crate provides the shared value types used across the channel-coding
//! stack: packed bit buffers, saturating log-likelihood ratios and the CRC
//! calculators of 3GPP TS 38.212.

pub mod bit_buffer;
pub mod crc;
pub mod llr;
pub mod types;

// Re-export commonly used items
pub use bit_buffer::*;
pub use crc::*;
pub use llr::*;
pub use types::*;
