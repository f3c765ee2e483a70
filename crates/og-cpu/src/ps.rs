//! Paired-single register support
//!
//! Each of the 32 floating-point registers holds two lanes. Lane 0 doubles as
//! the scalar FPR; both lanes are stored as raw double bit patterns so NaN
//! payloads and signed zeros survive every move.

use bytemuck::{Pod, Zeroable};

/// One paired-single register (two 64-bit lanes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct PairedSingle {
    pub ps0: u64,
    pub ps1: u64,
}

impl PairedSingle {
    pub const fn new(ps0: u64, ps1: u64) -> Self {
        Self { ps0, ps1 }
    }

    #[inline]
    pub fn ps0_as_double(&self) -> f64 {
        f64::from_bits(self.ps0)
    }

    #[inline]
    pub fn ps1_as_double(&self) -> f64 {
        f64::from_bits(self.ps1)
    }

    /// Low word of lane 0, as written by `stfiwx`
    #[inline]
    pub fn ps0_as_u32(&self) -> u32 {
        self.ps0 as u32
    }

    #[inline]
    pub fn set_ps0(&mut self, value: f64) {
        self.ps0 = value.to_bits();
    }

    #[inline]
    pub fn set_ps1(&mut self, value: f64) {
        self.ps1 = value.to_bits();
    }

    /// Write the same value to both lanes
    #[inline]
    pub fn fill(&mut self, value: f64) {
        self.ps0 = value.to_bits();
        self.ps1 = value.to_bits();
    }

    #[inline]
    pub fn set_both(&mut self, ps0: f64, ps1: f64) {
        self.ps0 = ps0.to_bits();
        self.ps1 = ps1.to_bits();
    }
}
