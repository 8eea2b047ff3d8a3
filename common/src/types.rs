//! Common Types for the Channel-Coding Stack
//!
//! Defines fundamental wire-valued types shared by the coding subsystems.

use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

/// Modulation schemes supported by the rate matcher and the short-block codec.
///
/// The discriminant is the number of bits carried per channel symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
pub enum ModulationScheme {
    /// BPSK / pi/2-BPSK
    Bpsk = 1,
    /// QPSK
    Qpsk = 2,
    /// 16-QAM
    Qam16 = 4,
    /// 64-QAM
    Qam64 = 6,
    /// 256-QAM
    Qam256 = 8,
}

impl ModulationScheme {
    /// Number of bits per modulated symbol.
    pub fn bits_per_symbol(&self) -> usize {
        *self as usize
    }
}
