//! Integer arithmetic, logical, rotate, shift, compare and trap instructions

use crate::decoder::Instruction;
use crate::exceptions::program_cause;
use crate::interpreter::Interpreter;
use crate::state::PowerPcState;

/// Mask with bits `mb` through `me` set, wrapping when `mb > me`
#[inline]
pub fn generate_mask_32(mb: u32, me: u32) -> u32 {
    let begin = u32::MAX >> mb;
    let end = u32::MAX << (31 - me);
    if mb <= me {
        begin & end
    } else {
        begin | end
    }
}

/// Three-operand add with carry in, returning (result, carry out, overflow)
#[inline]
fn add3(a: u32, b: u32, carry_in: bool) -> (u32, bool, bool) {
    let wide = a as u64 + b as u64 + carry_in as u64;
    let signed = a as i32 as i64 + b as i32 as i64 + carry_in as i64;
    (
        wide as u32,
        wide >> 32 != 0,
        signed < i32::MIN as i64 || signed > i32::MAX as i64,
    )
}

#[inline]
fn record(state: &mut PowerPcState, inst: Instruction, value: u32) {
    if inst.rc() {
        state.update_cr0(value);
    }
}

#[inline]
fn set_overflow(state: &mut PowerPcState, inst: Instruction, overflow: bool) {
    if inst.oe() {
        state.set_xer_ov(overflow);
    }
}

// Immediate arithmetic

pub fn addi(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let base = if inst.ra() == 0 { 0 } else { state.gpr[inst.ra()] };
    state.gpr[inst.rd()] = base.wrapping_add(inst.simm16() as u32);
}

pub fn addis(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let base = if inst.ra() == 0 { 0 } else { state.gpr[inst.ra()] };
    state.gpr[inst.rd()] = base.wrapping_add((inst.simm16() as u32) << 16);
}

pub fn addic(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (result, carry, _) = add3(state.gpr[inst.ra()], inst.simm16() as u32, false);
    state.gpr[inst.rd()] = result;
    state.set_xer_ca(carry);
}

pub fn addic_rc(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    addic(interp, state, inst);
    state.update_cr0(state.gpr[inst.rd()]);
}

pub fn subfic(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (result, carry, _) = add3(!state.gpr[inst.ra()], inst.simm16() as u32, true);
    state.gpr[inst.rd()] = result;
    state.set_xer_ca(carry);
}

pub fn mulli(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    state.gpr[inst.rd()] = (state.gpr[inst.ra()] as i32).wrapping_mul(inst.simm16()) as u32;
}

// Compares

pub fn cmpi(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let a = state.gpr[inst.ra()] as i32;
    state.compare_signed(inst.crfd(), a, inst.simm16());
}

pub fn cmpli(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let a = state.gpr[inst.ra()];
    state.compare_unsigned(inst.crfd(), a, inst.uimm());
}

pub fn cmp(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let a = state.gpr[inst.ra()] as i32;
    let b = state.gpr[inst.rb()] as i32;
    state.compare_signed(inst.crfd(), a, b);
}

pub fn cmpl(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let a = state.gpr[inst.ra()];
    let b = state.gpr[inst.rb()];
    state.compare_unsigned(inst.crfd(), a, b);
}

// Logical immediates

pub fn ori(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    state.gpr[inst.ra()] = state.gpr[inst.rs()] | inst.uimm();
}

pub fn oris(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    state.gpr[inst.ra()] = state.gpr[inst.rs()] | (inst.uimm() << 16);
}

pub fn xori(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    state.gpr[inst.ra()] = state.gpr[inst.rs()] ^ inst.uimm();
}

pub fn xoris(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    state.gpr[inst.ra()] = state.gpr[inst.rs()] ^ (inst.uimm() << 16);
}

pub fn andi_rc(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let value = state.gpr[inst.rs()] & inst.uimm();
    state.gpr[inst.ra()] = value;
    state.update_cr0(value);
}

pub fn andis_rc(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let value = state.gpr[inst.rs()] & (inst.uimm() << 16);
    state.gpr[inst.ra()] = value;
    state.update_cr0(value);
}

// Rotates

pub fn rlwimix(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let mask = generate_mask_32(inst.mb(), inst.me());
    let rotated = state.gpr[inst.rs()].rotate_left(inst.sh());
    let value = (state.gpr[inst.ra()] & !mask) | (rotated & mask);
    state.gpr[inst.ra()] = value;
    record(state, inst, value);
}

pub fn rlwinmx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let mask = generate_mask_32(inst.mb(), inst.me());
    let value = state.gpr[inst.rs()].rotate_left(inst.sh()) & mask;
    state.gpr[inst.ra()] = value;
    record(state, inst, value);
}

pub fn rlwnmx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let mask = generate_mask_32(inst.mb(), inst.me());
    let value = state.gpr[inst.rs()].rotate_left(state.gpr[inst.rb()] & 0x1F) & mask;
    state.gpr[inst.ra()] = value;
    record(state, inst, value);
}

// Traps

fn trap_condition(to: u32, a: u32, b: u32) -> bool {
    let (sa, sb) = (a as i32, b as i32);
    (sa < sb && to & 0x10 != 0)
        || (sa > sb && to & 0x08 != 0)
        || (sa == sb && to & 0x04 != 0)
        || (a < b && to & 0x02 != 0)
        || (a > b && to & 0x01 != 0)
}

pub fn twi(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if trap_condition(inst.to(), state.gpr[inst.ra()], inst.simm16() as u32) {
        state.raise_program(program_cause::TRAP);
    }
}

pub fn tw(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if trap_condition(inst.to(), state.gpr[inst.ra()], state.gpr[inst.rb()]) {
        state.raise_program(program_cause::TRAP);
    }
}

// XO-form arithmetic

pub fn addx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (result, _, overflow) = add3(state.gpr[inst.ra()], state.gpr[inst.rb()], false);
    state.gpr[inst.rd()] = result;
    set_overflow(state, inst, overflow);
    record(state, inst, result);
}

pub fn addcx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (result, carry, overflow) = add3(state.gpr[inst.ra()], state.gpr[inst.rb()], false);
    state.gpr[inst.rd()] = result;
    state.set_xer_ca(carry);
    set_overflow(state, inst, overflow);
    record(state, inst, result);
}

pub fn addex(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ca = state.xer_ca();
    let (result, carry, overflow) = add3(state.gpr[inst.ra()], state.gpr[inst.rb()], ca);
    state.gpr[inst.rd()] = result;
    state.set_xer_ca(carry);
    set_overflow(state, inst, overflow);
    record(state, inst, result);
}

pub fn addmex(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ca = state.xer_ca();
    let (result, carry, overflow) = add3(state.gpr[inst.ra()], u32::MAX, ca);
    state.gpr[inst.rd()] = result;
    state.set_xer_ca(carry);
    set_overflow(state, inst, overflow);
    record(state, inst, result);
}

pub fn addzex(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ca = state.xer_ca();
    let (result, carry, overflow) = add3(state.gpr[inst.ra()], 0, ca);
    state.gpr[inst.rd()] = result;
    state.set_xer_ca(carry);
    set_overflow(state, inst, overflow);
    record(state, inst, result);
}

pub fn subfx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (result, _, overflow) = add3(!state.gpr[inst.ra()], state.gpr[inst.rb()], true);
    state.gpr[inst.rd()] = result;
    set_overflow(state, inst, overflow);
    record(state, inst, result);
}

pub fn subfcx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (result, carry, overflow) = add3(!state.gpr[inst.ra()], state.gpr[inst.rb()], true);
    state.gpr[inst.rd()] = result;
    state.set_xer_ca(carry);
    set_overflow(state, inst, overflow);
    record(state, inst, result);
}

pub fn subfex(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ca = state.xer_ca();
    let (result, carry, overflow) = add3(!state.gpr[inst.ra()], state.gpr[inst.rb()], ca);
    state.gpr[inst.rd()] = result;
    state.set_xer_ca(carry);
    set_overflow(state, inst, overflow);
    record(state, inst, result);
}

pub fn subfmex(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ca = state.xer_ca();
    let (result, carry, overflow) = add3(!state.gpr[inst.ra()], u32::MAX, ca);
    state.gpr[inst.rd()] = result;
    state.set_xer_ca(carry);
    set_overflow(state, inst, overflow);
    record(state, inst, result);
}

pub fn subfzex(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ca = state.xer_ca();
    let (result, carry, overflow) = add3(!state.gpr[inst.ra()], 0, ca);
    state.gpr[inst.rd()] = result;
    state.set_xer_ca(carry);
    set_overflow(state, inst, overflow);
    record(state, inst, result);
}

pub fn negx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let a = state.gpr[inst.ra()];
    let result = a.wrapping_neg();
    state.gpr[inst.rd()] = result;
    set_overflow(state, inst, a == 0x8000_0000);
    record(state, inst, result);
}

pub fn mullwx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let a = state.gpr[inst.ra()] as i32 as i64;
    let b = state.gpr[inst.rb()] as i32 as i64;
    let product = a * b;
    let result = product as u32;
    state.gpr[inst.rd()] = result;
    set_overflow(state, inst, product < i32::MIN as i64 || product > i32::MAX as i64);
    record(state, inst, result);
}

pub fn mulhwx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let a = state.gpr[inst.ra()] as i32 as i64;
    let b = state.gpr[inst.rb()] as i32 as i64;
    let result = ((a * b) >> 32) as u32;
    state.gpr[inst.rd()] = result;
    record(state, inst, result);
}

pub fn mulhwux(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let a = state.gpr[inst.ra()] as u64;
    let b = state.gpr[inst.rb()] as u64;
    let result = ((a * b) >> 32) as u32;
    state.gpr[inst.rd()] = result;
    record(state, inst, result);
}

pub fn divwx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let a = state.gpr[inst.ra()] as i32;
    let b = state.gpr[inst.rb()] as i32;
    let overflow = b == 0 || (a == i32::MIN && b == -1);
    let result = if overflow {
        if a < 0 {
            u32::MAX
        } else {
            0
        }
    } else {
        (a / b) as u32
    };
    state.gpr[inst.rd()] = result;
    set_overflow(state, inst, overflow);
    record(state, inst, result);
}

pub fn divwux(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let a = state.gpr[inst.ra()];
    let b = state.gpr[inst.rb()];
    let overflow = b == 0;
    let result = if overflow { 0 } else { a / b };
    state.gpr[inst.rd()] = result;
    set_overflow(state, inst, overflow);
    record(state, inst, result);
}

// X-form logical

macro_rules! logical_op {
    ($name:ident, |$s:ident, $b:ident| $body:expr) => {
        pub fn $name(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
            let $s = state.gpr[inst.rs()];
            let $b = state.gpr[inst.rb()];
            let value = $body;
            state.gpr[inst.ra()] = value;
            record(state, inst, value);
        }
    };
}

logical_op!(andx, |s, b| s & b);
logical_op!(andcx, |s, b| s & !b);
logical_op!(orx, |s, b| s | b);
logical_op!(orcx, |s, b| s | !b);
logical_op!(norx, |s, b| !(s | b));
logical_op!(xorx, |s, b| s ^ b);
logical_op!(nandx, |s, b| !(s & b));
logical_op!(eqvx, |s, b| !(s ^ b));

pub fn cntlzwx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let value = state.gpr[inst.rs()].leading_zeros();
    state.gpr[inst.ra()] = value;
    record(state, inst, value);
}

pub fn extsbx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let value = state.gpr[inst.rs()] as i8 as i32 as u32;
    state.gpr[inst.ra()] = value;
    record(state, inst, value);
}

pub fn extshx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let value = state.gpr[inst.rs()] as i16 as i32 as u32;
    state.gpr[inst.ra()] = value;
    record(state, inst, value);
}

// Shifts

pub fn slwx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let amount = state.gpr[inst.rb()];
    let value = if amount & 0x20 != 0 {
        0
    } else {
        state.gpr[inst.rs()] << (amount & 0x1F)
    };
    state.gpr[inst.ra()] = value;
    record(state, inst, value);
}

pub fn srwx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let amount = state.gpr[inst.rb()];
    let value = if amount & 0x20 != 0 {
        0
    } else {
        state.gpr[inst.rs()] >> (amount & 0x1F)
    };
    state.gpr[inst.ra()] = value;
    record(state, inst, value);
}

/// Arithmetic shift right; CA is set when a negative value loses one bits
fn shift_right_algebraic(state: &mut PowerPcState, value: u32, amount: u32) -> u32 {
    let negative = (value as i32) < 0;
    if amount & 0x20 != 0 {
        state.set_xer_ca(negative);
        return if negative { u32::MAX } else { 0 };
    }

    let amount = amount & 0x1F;
    let lost = amount != 0 && (value & ((1u32 << amount) - 1)) != 0;
    state.set_xer_ca(negative && lost);
    ((value as i32) >> amount) as u32
}

pub fn srawx(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let (source, amount) = (state.gpr[inst.rs()], state.gpr[inst.rb()] & 0x3F);
    let value = shift_right_algebraic(state, source, amount);
    state.gpr[inst.ra()] = value;
    record(state, inst, value);
}

pub fn srawix(_: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let source = state.gpr[inst.rs()];
    let value = shift_right_algebraic(state, source, inst.sh());
    state.gpr[inst.ra()] = value;
    record(state, inst, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_generation() {
        assert_eq!(generate_mask_32(0, 31), 0xFFFF_FFFF);
        assert_eq!(generate_mask_32(16, 31), 0x0000_FFFF);
        assert_eq!(generate_mask_32(0, 15), 0xFFFF_0000);
        assert_eq!(generate_mask_32(31, 31), 0x0000_0001);
        assert_eq!(generate_mask_32(0, 0), 0x8000_0000);
        assert_eq!(generate_mask_32(8, 15), 0x00FF_0000);
        // Wrapping mask
        assert_eq!(generate_mask_32(28, 3), 0xF000_000F);
    }

    #[test]
    fn test_add3_flags() {
        assert_eq!(add3(0xFFFF_FFFF, 1, false), (0, true, false));
        assert_eq!(add3(0x7FFF_FFFF, 1, false), (0x8000_0000, false, true));
        assert_eq!(add3(0xFFFF_FFFF, 0xFFFF_FFFF, true), (0xFFFF_FFFF, true, false));
        // subtract via complement: 5 - 3
        assert_eq!(add3(!3, 5, true), (2, true, false));
        // 3 - 5 borrows
        assert_eq!(add3(!5, 3, true), (0xFFFF_FFFE, false, false));
    }

    #[test]
    fn test_trap_conditions() {
        // TO = 4: equal
        assert!(trap_condition(4, 7, 7));
        assert!(!trap_condition(4, 7, 8));
        // TO = 0x10: signed less than
        assert!(trap_condition(0x10, 0xFFFF_FFFF, 0));
        // TO = 0x02: unsigned less than
        assert!(!trap_condition(0x02, 0xFFFF_FFFF, 0));
        // TO = 31: always
        assert!(trap_condition(31, 1, 2));
        assert!(!trap_condition(0, 1, 1));
    }
}
