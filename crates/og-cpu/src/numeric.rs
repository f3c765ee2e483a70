//! Floating-point helpers shared by the scalar and paired-single handlers
//!
//! The Gekko does not quiet NaN operands: the first NaN input is passed
//! through bit for bit. Invalid operations that have no NaN input produce
//! [`PPC_NAN_BITS`]. Arithmetic itself is done with host doubles.

use crate::fpscr::{Fpscr, RoundingMode};
use crate::state::PowerPcState;

pub const DOUBLE_SIGN: u64 = 0x8000_0000_0000_0000;
pub const DOUBLE_EXP: u64 = 0x7FF0_0000_0000_0000;
pub const DOUBLE_FRAC: u64 = 0x000F_FFFF_FFFF_FFFF;
pub const DOUBLE_QBIT: u64 = 0x0008_0000_0000_0000;

/// Default NaN generated by invalid operations
pub const PPC_NAN_BITS: u64 = 0x7FF8_0000_0000_0000;

#[inline]
pub fn ppc_nan() -> f64 {
    f64::from_bits(PPC_NAN_BITS)
}

/// Largest finite single, widened to a double
pub const MAX_SINGLE: u64 = 0x47EF_FFFF_E000_0000;
/// Most negative finite single, widened to a double
pub const MIN_SINGLE: u64 = 0xC7EF_FFFF_E000_0000;

/// FPRF result classes
pub mod fpclass {
    pub const QNAN: u32 = 0x11;
    pub const NINF: u32 = 0x9;
    pub const NN: u32 = 0x8;
    pub const ND: u32 = 0x18;
    pub const NZ: u32 = 0x12;
    pub const PZ: u32 = 0x2;
    pub const PD: u32 = 0x14;
    pub const PN: u32 = 0x4;
    pub const PINF: u32 = 0x5;
}

/// Floating-point condition codes
pub mod fpcc {
    pub const FL: u32 = 8;
    pub const FG: u32 = 4;
    pub const FE: u32 = 2;
    pub const FU: u32 = 1;
}

#[inline]
pub fn is_snan(value: f64) -> bool {
    let bits = value.to_bits();
    (bits & DOUBLE_EXP) == DOUBLE_EXP && (bits & DOUBLE_FRAC) != 0 && (bits & DOUBLE_QBIT) == 0
}

/// FPRF class of a double bit pattern
pub fn classify_double(value: f64) -> u32 {
    let bits = value.to_bits();
    let sign = bits & DOUBLE_SIGN != 0;
    let exp = bits & DOUBLE_EXP;

    if exp > 0 && exp < DOUBLE_EXP {
        return if sign { fpclass::NN } else { fpclass::PN };
    }

    let mantissa = bits & DOUBLE_FRAC;
    match (mantissa != 0, exp != 0) {
        (true, true) => fpclass::QNAN,
        (true, false) => if sign { fpclass::ND } else { fpclass::PD },
        (false, true) => if sign { fpclass::NINF } else { fpclass::PINF },
        (false, false) => if sign { fpclass::NZ } else { fpclass::PZ },
    }
}

/// Recompute FPRF from a result
#[inline]
pub fn update_fprf(state: &mut PowerPcState, value: f64) {
    state.set_fprf(classify_double(value));
}

fn raise_snan(state: &mut PowerPcState, operands: &[f64]) {
    if operands.iter().any(|&v| is_snan(v)) {
        state.set_fp_exception(Fpscr::VXSNAN);
    }
}

/// Round a double to single precision, honouring non-IEEE mode
pub fn force_single(state: &PowerPcState, value: f64) -> f64 {
    let mut x = value as f32;
    if state.non_ieee_mode() && x.is_subnormal() {
        x = f32::from_bits(x.to_bits() & 0x8000_0000);
    }
    x as f64
}

/// Double-precision result coercion
///
/// Left as the identity: flush-to-zero of double denormals is not applied.
#[inline]
pub fn force_double(_state: &PowerPcState, value: f64) -> f64 {
    value
}

pub fn ni_add(state: &mut PowerPcState, a: f64, b: f64) -> f64 {
    let t = a + b;
    if t.is_nan() {
        raise_snan(state, &[a, b]);
        if a.is_nan() {
            return a;
        }
        if b.is_nan() {
            return b;
        }
        state.set_fp_exception(Fpscr::VXISI);
        return ppc_nan();
    }
    t
}

pub fn ni_sub(state: &mut PowerPcState, a: f64, b: f64) -> f64 {
    let t = a - b;
    if t.is_nan() {
        raise_snan(state, &[a, b]);
        if a.is_nan() {
            return a;
        }
        if b.is_nan() {
            return b;
        }
        state.set_fp_exception(Fpscr::VXISI);
        return ppc_nan();
    }
    t
}

pub fn ni_mul(state: &mut PowerPcState, a: f64, b: f64) -> f64 {
    let t = a * b;
    if t.is_nan() {
        raise_snan(state, &[a, b]);
        if a.is_nan() {
            return a;
        }
        if b.is_nan() {
            return b;
        }
        state.set_fp_exception(Fpscr::VXIMZ);
        return ppc_nan();
    }
    t
}

fn ni_fused(state: &mut PowerPcState, a: f64, c: f64, b: f64, subtract: bool) -> f64 {
    let product = a * c;
    if product.is_nan() {
        raise_snan(state, &[a, b, c]);
        if a.is_nan() {
            return a;
        }
        if b.is_nan() {
            return b;
        }
        if c.is_nan() {
            return c;
        }
        state.set_fp_exception(Fpscr::VXIMZ);
        return ppc_nan();
    }

    let t = if subtract { product - b } else { product + b };
    if t.is_nan() {
        raise_snan(state, &[b]);
        if b.is_nan() {
            return b;
        }
        state.set_fp_exception(Fpscr::VXISI);
        return ppc_nan();
    }
    t
}

/// `a * c + b`
#[inline]
pub fn ni_madd(state: &mut PowerPcState, a: f64, c: f64, b: f64) -> f64 {
    ni_fused(state, a, c, b, false)
}

/// `a * c - b`
#[inline]
pub fn ni_msub(state: &mut PowerPcState, a: f64, c: f64, b: f64) -> f64 {
    ni_fused(state, a, c, b, true)
}

/// Negate a fused result unless it is a NaN
#[inline]
pub fn negate_unless_nan(value: f64) -> f64 {
    if value.is_nan() {
        value
    } else {
        -value
    }
}

pub fn ni_div(state: &mut PowerPcState, a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        raise_snan(state, &[a, b]);
        return if a.is_nan() { a } else { b };
    }

    if b == 0.0 {
        if a == 0.0 {
            state.set_fp_exception(Fpscr::VXZDZ | Fpscr::ZX);
            return ppc_nan();
        }
        if a.is_finite() {
            state.set_fp_exception(Fpscr::ZX);
        }
        return a / b;
    }

    if a.is_infinite() && b.is_infinite() {
        state.set_fp_exception(Fpscr::VXIDI);
        return ppc_nan();
    }

    a / b
}

/// Clamp an overflowed single estimate to the largest finite single
#[inline]
fn clamp_to_single_range(value: f64) -> f64 {
    if value.is_infinite() {
        if value > 0.0 {
            f64::from_bits(MAX_SINGLE)
        } else {
            f64::from_bits(MIN_SINGLE)
        }
    } else {
        value
    }
}

/// Single-precision reciprocal estimate (`fres`, `ps_res`)
pub fn reciprocal_estimate(state: &mut PowerPcState, b: f64) -> f64 {
    if b == 0.0 {
        state.set_fp_exception(Fpscr::ZX);
        return force_single(state, 1.0 / b);
    }
    raise_snan(state, &[b]);
    clamp_to_single_range(force_single(state, 1.0 / b))
}

/// Double-precision reciprocal square root estimate (`frsqrte`)
pub fn rsqrt_estimate(state: &mut PowerPcState, b: f64) -> f64 {
    raise_snan(state, &[b]);
    if b < 0.0 {
        state.set_fp_exception(Fpscr::VXSQRT);
        return ppc_nan();
    }
    if b == 0.0 {
        state.set_fp_exception(Fpscr::ZX);
    }
    force_double(state, 1.0 / b.sqrt())
}

/// Single-precision reciprocal square root estimate (`ps_rsqrte`)
pub fn rsqrt_estimate_single(state: &mut PowerPcState, b: f64) -> f64 {
    raise_snan(state, &[b]);
    if b == 0.0 {
        state.set_fp_exception(Fpscr::ZX);
    }
    if b < 0.0 {
        state.set_fp_exception(Fpscr::VXSQRT);
    }
    let value = force_single(state, 1.0 / b.sqrt());
    if value == f64::INFINITY {
        f64::from_bits(MAX_SINGLE)
    } else {
        value
    }
}

/// Narrow a double bit pattern to a single without any rounding, the way
/// `stfs` does
pub fn convert_to_single(x: u64) -> u32 {
    let exp = ((x >> 52) & 0x7FF) as u32;
    if exp > 896 || (x & !DOUBLE_SIGN) == 0 {
        (((x >> 32) & 0xC000_0000) | ((x >> 29) & 0x3FFF_FFFF)) as u32
    } else if exp >= 874 {
        let mut t = 0x8000_0000u32 | ((x & DOUBLE_FRAC) >> 21) as u32;
        t >>= 905 - exp;
        t |= ((x >> 32) & 0x8000_0000) as u32;
        t
    } else {
        // Out of single range, the hardware result is undefined.
        (((x >> 32) & 0xC000_0000) | ((x >> 29) & 0x3FFF_FFFF)) as u32
    }
}

/// Widen a single bit pattern to a double exactly, the way `lfs` does
pub fn convert_to_double(value: u32) -> u64 {
    let x = value as u64;
    let exp = (x >> 23) & 0xFF;
    let mut frac = x & 0x007F_FFFF;

    if exp > 0 && exp < 255 {
        let y = (exp >> 7) ^ 1;
        let z = (y << 61) | (y << 60) | (y << 59);
        ((x & 0xC000_0000) << 32) | z | ((x & 0x3FFF_FFFF) << 29)
    } else if exp == 0 && frac != 0 {
        let mut exp = 1023u64 - 126;
        loop {
            frac <<= 1;
            exp -= 1;
            if frac & 0x0080_0000 != 0 {
                break;
            }
        }
        ((x & 0x8000_0000) << 32) | (exp << 52) | ((frac & 0x007F_FFFF) << 29)
    } else {
        let y = exp >> 7;
        let z = (y << 61) | (y << 60) | (y << 59);
        ((x & 0xC000_0000) << 32) | z | ((x & 0x3FFF_FFFF) << 29)
    }
}

/// Convert to a signed word for `fctiw`/`fctiwz`
///
/// Returns the full 64-bit register image: the integer in the low word under
/// a 0xFFF8 pattern, with bit 32 set for a negative zero result.
pub fn convert_to_integer(state: &mut PowerPcState, b: f64, mode: RoundingMode) -> u64 {
    let value: u32 = if b.is_nan() {
        let cause = if is_snan(b) { Fpscr::VXCVI | Fpscr::VXSNAN } else { Fpscr::VXCVI };
        state.set_fp_exception(cause);
        state.set_fi(false);
        state.set_fr(false);
        0x8000_0000
    } else {
        let rounded = match mode {
            RoundingMode::Nearest => b.round_ties_even(),
            RoundingMode::TowardZero => b.trunc(),
            RoundingMode::TowardPositive => b.ceil(),
            RoundingMode::TowardNegative => b.floor(),
        };

        if rounded > i32::MAX as f64 {
            state.set_fp_exception(Fpscr::VXCVI);
            state.set_fi(false);
            state.set_fr(false);
            0x7FFF_FFFF
        } else if rounded < i32::MIN as f64 {
            state.set_fp_exception(Fpscr::VXCVI);
            state.set_fi(false);
            state.set_fr(false);
            0x8000_0000
        } else {
            let i = rounded as i32;
            if rounded == b {
                state.set_fi(false);
                state.set_fr(false);
            } else {
                state.set_fi(true);
                state.set_fr(rounded.abs() > b.abs());
            }
            i as u32
        }
    };

    let mut result = 0xFFF8_0000_0000_0000u64 | value as u64;
    if value == 0 && b.is_sign_negative() {
        result |= 0x1_0000_0000;
    }
    result
}
