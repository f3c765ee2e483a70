//! Floating-point status and control register

use bitflags::bitflags;

use crate::state::PowerPcState;

bitflags! {
    /// FPSCR bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Fpscr: u32 {
        /// Rounding mode (two bits)
        const RN     = 0b11;
        /// Non-IEEE mode
        const NI     = 1 << 2;
        const XE     = 1 << 3;
        const ZE     = 1 << 4;
        const UE     = 1 << 5;
        const OE     = 1 << 6;
        const VE     = 1 << 7;
        /// Invalid integer convert
        const VXCVI  = 1 << 8;
        /// Invalid square root
        const VXSQRT = 1 << 9;
        /// Software request
        const VXSOFT = 1 << 10;
        /// Result flags (class + FPCC)
        const FPRF   = 0x1F << 12;
        /// Fraction inexact
        const FI     = 1 << 17;
        /// Fraction rounded
        const FR     = 1 << 18;
        /// Invalid compare
        const VXVC   = 1 << 19;
        /// Infinity times zero
        const VXIMZ  = 1 << 20;
        /// Zero divided by zero
        const VXZDZ  = 1 << 21;
        /// Infinity divided by infinity
        const VXIDI  = 1 << 22;
        /// Infinity minus infinity
        const VXISI  = 1 << 23;
        /// Signalling NaN
        const VXSNAN = 1 << 24;
        /// Inexact
        const XX     = 1 << 25;
        /// Zero divide
        const ZX     = 1 << 26;
        /// Underflow
        const UX     = 1 << 27;
        /// Overflow
        const OX     = 1 << 28;
        /// Invalid operation summary
        const VX     = 1 << 29;
        /// Enabled exception summary
        const FEX    = 1 << 30;
        /// Exception summary
        const FX     = 1 << 31;

        /// Every invalid-operation cause
        const VX_ANY = Self::VXSNAN.bits() | Self::VXISI.bits() | Self::VXIDI.bits()
            | Self::VXZDZ.bits() | Self::VXIMZ.bits() | Self::VXVC.bits()
            | Self::VXSOFT.bits() | Self::VXSQRT.bits() | Self::VXCVI.bits();
        /// Every sticky exception bit that sets FX when it turns on
        const ANY_X = Self::OX.bits() | Self::UX.bits() | Self::ZX.bits()
            | Self::XX.bits() | Self::VX_ANY.bits();
    }
}

/// Shift of the FPRF field
pub const FPRF_SHIFT: u32 = 12;
/// Shift of the FPCC sub-field (low four bits of FPRF)
pub const FPCC_SHIFT: u32 = 12;

/// Rounding modes (FPSCR[RN])
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingMode {
    Nearest = 0,
    TowardZero = 1,
    TowardPositive = 2,
    TowardNegative = 3,
}

impl RoundingMode {
    pub fn from_fpscr(fpscr: u32) -> Self {
        match fpscr & Fpscr::RN.bits() {
            0 => Self::Nearest,
            1 => Self::TowardZero,
            2 => Self::TowardPositive,
            _ => Self::TowardNegative,
        }
    }
}

/// Recompute VX and FEX from the individual cause and enable bits
pub fn update_summary(fpscr: &mut u32) {
    let mut f = Fpscr::from_bits_retain(*fpscr);
    f.set(Fpscr::VX, f.intersects(Fpscr::VX_ANY));
    // Cause bits 29..25 line up with enable bits 7..3.
    let enabled = ((f.bits() >> 22) & f.bits() & 0xF8) != 0;
    f.set(Fpscr::FEX, enabled);
    *fpscr = f.bits();
}

impl PowerPcState {
    #[inline]
    pub fn fpscr(&self) -> Fpscr {
        Fpscr::from_bits_retain(self.fpscr)
    }

    /// Raise a floating-point exception cause
    ///
    /// FX goes up when a cause that was clear becomes set. The derived
    /// summary bits are recomputed afterwards.
    pub fn set_fp_exception(&mut self, cause: Fpscr) {
        let newly_set = cause.bits() & !self.fpscr & Fpscr::ANY_X.bits();
        if newly_set != 0 {
            self.fpscr |= Fpscr::FX.bits();
        }
        self.fpscr |= cause.bits();
        update_summary(&mut self.fpscr);
    }

    /// Write a new FPSCR value from a move-to instruction
    pub fn set_fpscr(&mut self, value: u32) {
        self.fpscr = value;
        update_summary(&mut self.fpscr);
    }

    #[inline]
    pub fn rounding_mode(&self) -> RoundingMode {
        RoundingMode::from_fpscr(self.fpscr)
    }

    #[inline]
    pub fn non_ieee_mode(&self) -> bool {
        self.fpscr & Fpscr::NI.bits() != 0
    }

    /// Store a result class in FPRF
    #[inline]
    pub fn set_fprf(&mut self, class: u32) {
        self.fpscr = (self.fpscr & !Fpscr::FPRF.bits()) | ((class & 0x1F) << FPRF_SHIFT);
    }

    /// Store a comparison result in FPCC, keeping the class bit
    #[inline]
    pub fn set_fpcc(&mut self, fpcc: u32) {
        self.fpscr = (self.fpscr & !(0xF << FPCC_SHIFT)) | ((fpcc & 0xF) << FPCC_SHIFT);
    }

    #[inline]
    pub fn set_fi(&mut self, fi: bool) {
        if fi {
            self.set_fp_exception(Fpscr::XX);
        }
        let mut f = self.fpscr();
        f.set(Fpscr::FI, fi);
        self.fpscr = f.bits();
    }

    #[inline]
    pub fn set_fr(&mut self, fr: bool) {
        let mut f = self.fpscr();
        f.set(Fpscr::FR, fr);
        self.fpscr = f.bits();
    }

    /// Record form update of CR1 from the FPSCR summary bits
    #[inline]
    pub fn update_cr1(&mut self) {
        self.cr.set_field(1, (self.fpscr >> 28) as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_sets_fx_and_vx() {
        let mut state = PowerPcState::new();
        state.set_fp_exception(Fpscr::VXISI);
        let f = state.fpscr();
        assert!(f.contains(Fpscr::VXISI | Fpscr::VX | Fpscr::FX));
        assert!(!f.contains(Fpscr::FEX));
    }

    #[test]
    fn test_fx_only_on_new_bits() {
        let mut state = PowerPcState::new();
        state.set_fp_exception(Fpscr::ZX);
        state.fpscr &= !Fpscr::FX.bits();
        state.set_fp_exception(Fpscr::ZX);
        assert!(!state.fpscr().contains(Fpscr::FX));
    }

    #[test]
    fn test_fex_from_enabled_cause() {
        let mut state = PowerPcState::new();
        state.fpscr = Fpscr::ZE.bits();
        state.set_fp_exception(Fpscr::ZX);
        assert!(state.fpscr().contains(Fpscr::FEX));

        state.set_fpscr(Fpscr::VE.bits() | Fpscr::VXSNAN.bits());
        assert!(state.fpscr().contains(Fpscr::VX | Fpscr::FEX));
    }

    #[test]
    fn test_cr1_copy() {
        let mut state = PowerPcState::new();
        state.set_fp_exception(Fpscr::OX);
        state.update_cr1();
        // FX and OX
        assert_eq!(state.cr.field(1), 0b1001);
    }

    #[test]
    fn test_fprf_and_fpcc() {
        let mut state = PowerPcState::new();
        state.set_fprf(0x11);
        assert_eq!((state.fpscr >> FPRF_SHIFT) & 0x1F, 0x11);
        state.set_fpcc(0x2);
        assert_eq!((state.fpscr >> FPRF_SHIFT) & 0x1F, 0x12);
    }
}
