//! Integer and floating-point loads and stores, string and multiple word
//! transfers, reservations and cache control

use super::{check_supervisor, ea_d, ea_du, ea_x, ea_xu};
use crate::decoder::Instruction;
use crate::exceptions::program_cause;
use crate::interpreter::Interpreter;
use crate::numeric::{convert_to_double, convert_to_single};
use crate::state::{spr, PowerPcState, CR_EQ, CR_SO};

/// Data cache block size
const CACHE_LINE: u32 = 32;

/// HID2 locked cache enable
const HID2_LCE: u32 = 1 << 28;

/// EAR enable bit
const EAR_E: u32 = 1 << 31;

// Integer loads

#[inline]
fn load_word(interp: &Interpreter, state: &mut PowerPcState, ea: u32) -> Option<u32> {
    interp.read_u32(state, ea)
}

#[inline]
fn load_half(interp: &Interpreter, state: &mut PowerPcState, ea: u32) -> Option<u32> {
    interp.read_u16(state, ea).map(u32::from)
}

#[inline]
fn load_half_algebraic(interp: &Interpreter, state: &mut PowerPcState, ea: u32) -> Option<u32> {
    interp.read_u16(state, ea).map(|v| v as i16 as i32 as u32)
}

#[inline]
fn load_byte(interp: &Interpreter, state: &mut PowerPcState, ea: u32) -> Option<u32> {
    interp.read_u8(state, ea).map(u32::from)
}

type LoadFn = fn(&Interpreter, &mut PowerPcState, u32) -> Option<u32>;

#[inline]
fn load(interp: &Interpreter, state: &mut PowerPcState, inst: Instruction, ea: u32, f: LoadFn) {
    if let Some(value) = f(interp, state, ea) {
        state.gpr[inst.rd()] = value;
    }
}

/// Update form: rA is only written back when the access succeeds
#[inline]
fn load_update(interp: &Interpreter, state: &mut PowerPcState, inst: Instruction, ea: u32, f: LoadFn) {
    if let Some(value) = f(interp, state, ea) {
        state.gpr[inst.rd()] = value;
        state.gpr[inst.ra()] = ea;
    }
}

pub fn lwz(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_d(state, inst);
    load(interp, state, inst, ea, load_word);
}

pub fn lwzu(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_du(state, inst);
    load_update(interp, state, inst, ea, load_word);
}

pub fn lwzx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    load(interp, state, inst, ea, load_word);
}

pub fn lwzux(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_xu(state, inst);
    load_update(interp, state, inst, ea, load_word);
}

pub fn lhz(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_d(state, inst);
    load(interp, state, inst, ea, load_half);
}

pub fn lhzu(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_du(state, inst);
    load_update(interp, state, inst, ea, load_half);
}

pub fn lhzx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    load(interp, state, inst, ea, load_half);
}

pub fn lhzux(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_xu(state, inst);
    load_update(interp, state, inst, ea, load_half);
}

pub fn lha(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_d(state, inst);
    load(interp, state, inst, ea, load_half_algebraic);
}

pub fn lhau(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_du(state, inst);
    load_update(interp, state, inst, ea, load_half_algebraic);
}

pub fn lhax(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    load(interp, state, inst, ea, load_half_algebraic);
}

pub fn lhaux(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_xu(state, inst);
    load_update(interp, state, inst, ea, load_half_algebraic);
}

pub fn lbz(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_d(state, inst);
    load(interp, state, inst, ea, load_byte);
}

pub fn lbzu(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_du(state, inst);
    load_update(interp, state, inst, ea, load_byte);
}

pub fn lbzx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    load(interp, state, inst, ea, load_byte);
}

pub fn lbzux(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_xu(state, inst);
    load_update(interp, state, inst, ea, load_byte);
}

pub fn lwbrx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    if let Some(value) = interp.read_u32(state, ea) {
        state.gpr[inst.rd()] = value.swap_bytes();
    }
}

pub fn lhbrx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    if let Some(value) = interp.read_u16(state, ea) {
        state.gpr[inst.rd()] = value.swap_bytes() as u32;
    }
}

// Integer stores

#[inline]
fn store_word(interp: &Interpreter, state: &mut PowerPcState, ea: u32, value: u32) -> Option<()> {
    interp.write_u32(state, ea, value)
}

#[inline]
fn store_half(interp: &Interpreter, state: &mut PowerPcState, ea: u32, value: u32) -> Option<()> {
    interp.write_u16(state, ea, value as u16)
}

#[inline]
fn store_byte(interp: &Interpreter, state: &mut PowerPcState, ea: u32, value: u32) -> Option<()> {
    interp.write_u8(state, ea, value as u8)
}

type StoreFn = fn(&Interpreter, &mut PowerPcState, u32, u32) -> Option<()>;

#[inline]
fn store(interp: &Interpreter, state: &mut PowerPcState, inst: Instruction, ea: u32, f: StoreFn) {
    let value = state.gpr[inst.rs()];
    f(interp, state, ea, value);
}

#[inline]
fn store_update(interp: &Interpreter, state: &mut PowerPcState, inst: Instruction, ea: u32, f: StoreFn) {
    let value = state.gpr[inst.rs()];
    if f(interp, state, ea, value).is_some() {
        state.gpr[inst.ra()] = ea;
    }
}

pub fn stw(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_d(state, inst);
    store(interp, state, inst, ea, store_word);
}

pub fn stwu(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_du(state, inst);
    store_update(interp, state, inst, ea, store_word);
}

pub fn stwx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    store(interp, state, inst, ea, store_word);
}

pub fn stwux(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_xu(state, inst);
    store_update(interp, state, inst, ea, store_word);
}

pub fn sth(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_d(state, inst);
    store(interp, state, inst, ea, store_half);
}

pub fn sthu(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_du(state, inst);
    store_update(interp, state, inst, ea, store_half);
}

pub fn sthx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    store(interp, state, inst, ea, store_half);
}

pub fn sthux(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_xu(state, inst);
    store_update(interp, state, inst, ea, store_half);
}

pub fn stb(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_d(state, inst);
    store(interp, state, inst, ea, store_byte);
}

pub fn stbu(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_du(state, inst);
    store_update(interp, state, inst, ea, store_byte);
}

pub fn stbx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    store(interp, state, inst, ea, store_byte);
}

pub fn stbux(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_xu(state, inst);
    store_update(interp, state, inst, ea, store_byte);
}

pub fn stwbrx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    let value = state.gpr[inst.rs()].swap_bytes();
    interp.write_u32(state, ea, value);
}

pub fn sthbrx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    let value = (state.gpr[inst.rs()] as u16).swap_bytes();
    interp.write_u16(state, ea, value);
}

// Multiple word

pub fn lmw(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let mut ea = ea_d(state, inst);
    if ea & 3 != 0 {
        state.raise_alignment(ea);
        return;
    }

    for reg in inst.rd()..32 {
        let Some(value) = interp.read_u32(state, ea) else {
            return;
        };
        state.gpr[reg] = value;
        ea = ea.wrapping_add(4);
    }
}

pub fn stmw(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let mut ea = ea_d(state, inst);
    if ea & 3 != 0 {
        state.raise_alignment(ea);
        return;
    }

    for reg in inst.rs()..32 {
        let value = state.gpr[reg];
        if interp.write_u32(state, ea, value).is_none() {
            return;
        }
        ea = ea.wrapping_add(4);
    }
}

// String

/// Load `count` bytes into consecutive registers starting at `first`,
/// wrapping from r31 to r0. A partially filled last register is zero padded.
fn load_string(interp: &Interpreter, state: &mut PowerPcState, first: usize, mut ea: u32, count: u32) {
    let mut reg = first;
    let mut shift = 24i32;
    for _ in 0..count {
        let Some(byte) = interp.read_u8(state, ea) else {
            return;
        };
        if shift == 24 {
            state.gpr[reg] = 0;
        }
        state.gpr[reg] |= (byte as u32) << shift;
        shift -= 8;
        if shift < 0 {
            shift = 24;
            reg = (reg + 1) % 32;
        }
        ea = ea.wrapping_add(1);
    }
}

fn store_string(interp: &Interpreter, state: &mut PowerPcState, first: usize, mut ea: u32, count: u32) {
    let mut reg = first;
    let mut shift = 24i32;
    for _ in 0..count {
        let byte = (state.gpr[reg] >> shift) as u8;
        if interp.write_u8(state, ea, byte).is_none() {
            return;
        }
        shift -= 8;
        if shift < 0 {
            shift = 24;
            reg = (reg + 1) % 32;
        }
        ea = ea.wrapping_add(1);
    }
}

#[inline]
fn immediate_byte_count(inst: Instruction) -> u32 {
    match inst.nb() {
        0 => 32,
        n => n,
    }
}

pub fn lswi(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = if inst.ra() == 0 { 0 } else { state.gpr[inst.ra()] };
    load_string(interp, state, inst.rd(), ea, immediate_byte_count(inst));
}

pub fn lswx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    let count = state.xer_byte_count();
    load_string(interp, state, inst.rd(), ea, count);
}

pub fn stswi(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = if inst.ra() == 0 { 0 } else { state.gpr[inst.ra()] };
    store_string(interp, state, inst.rs(), ea, immediate_byte_count(inst));
}

pub fn stswx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    let count = state.xer_byte_count();
    store_string(interp, state, inst.rs(), ea, count);
}

// Reservation

pub fn lwarx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    if ea & 3 != 0 {
        state.raise_alignment(ea);
        return;
    }

    if let Some(value) = interp.read_u32(state, ea) {
        state.gpr[inst.rd()] = value;
        state.reserve = 1;
        state.reserve_address = ea;
    }
}

pub fn stwcxd(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    if ea & 3 != 0 {
        state.raise_alignment(ea);
        return;
    }

    let so = if state.xer_so() { CR_SO } else { 0 };
    if state.reserve != 0 && state.reserve_address == ea {
        let value = state.gpr[inst.rs()];
        if interp.write_u32(state, ea, value).is_some() {
            state.reserve = 0;
            state.cr.set_field(0, CR_EQ | so);
        }
        return;
    }

    state.reserve = 0;
    state.cr.set_field(0, so);
}

// Floating point loads

#[inline]
fn load_single(interp: &Interpreter, state: &mut PowerPcState, inst: Instruction, ea: u32) -> bool {
    match interp.read_u32(state, ea) {
        Some(value) => {
            let bits = convert_to_double(value);
            let fd = &mut state.ps[inst.fd()];
            fd.ps0 = bits;
            fd.ps1 = bits;
            true
        }
        None => false,
    }
}

#[inline]
fn load_double(interp: &Interpreter, state: &mut PowerPcState, inst: Instruction, ea: u32) -> bool {
    match interp.read_u64(state, ea) {
        Some(value) => {
            state.ps[inst.fd()].ps0 = value;
            true
        }
        None => false,
    }
}

pub fn lfs(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_d(state, inst);
    load_single(interp, state, inst, ea);
}

pub fn lfsu(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_du(state, inst);
    if load_single(interp, state, inst, ea) {
        state.gpr[inst.ra()] = ea;
    }
}

pub fn lfsx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    load_single(interp, state, inst, ea);
}

pub fn lfsux(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_xu(state, inst);
    if load_single(interp, state, inst, ea) {
        state.gpr[inst.ra()] = ea;
    }
}

pub fn lfd(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_d(state, inst);
    load_double(interp, state, inst, ea);
}

pub fn lfdu(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_du(state, inst);
    if load_double(interp, state, inst, ea) {
        state.gpr[inst.ra()] = ea;
    }
}

pub fn lfdx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    load_double(interp, state, inst, ea);
}

pub fn lfdux(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_xu(state, inst);
    if load_double(interp, state, inst, ea) {
        state.gpr[inst.ra()] = ea;
    }
}

// Floating point stores

#[inline]
fn store_single(interp: &Interpreter, state: &mut PowerPcState, inst: Instruction, ea: u32) -> bool {
    let value = convert_to_single(state.ps[inst.fs()].ps0);
    interp.write_u32(state, ea, value).is_some()
}

#[inline]
fn store_double(interp: &Interpreter, state: &mut PowerPcState, inst: Instruction, ea: u32) -> bool {
    let value = state.ps[inst.fs()].ps0;
    interp.write_u64(state, ea, value).is_some()
}

pub fn stfs(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_d(state, inst);
    store_single(interp, state, inst, ea);
}

pub fn stfsu(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_du(state, inst);
    if store_single(interp, state, inst, ea) {
        state.gpr[inst.ra()] = ea;
    }
}

pub fn stfsx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    store_single(interp, state, inst, ea);
}

pub fn stfsux(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_xu(state, inst);
    if store_single(interp, state, inst, ea) {
        state.gpr[inst.ra()] = ea;
    }
}

pub fn stfd(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_d(state, inst);
    store_double(interp, state, inst, ea);
}

pub fn stfdu(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_du(state, inst);
    if store_double(interp, state, inst, ea) {
        state.gpr[inst.ra()] = ea;
    }
}

pub fn stfdx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    store_double(interp, state, inst, ea);
}

pub fn stfdux(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_xu(state, inst);
    if store_double(interp, state, inst, ea) {
        state.gpr[inst.ra()] = ea;
    }
}

pub fn stfiwx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    let value = state.ps[inst.fs()].ps0_as_u32();
    interp.write_u32(state, ea, value);
}

// Cache control

fn zero_block(interp: &Interpreter, state: &mut PowerPcState, ea: u32) {
    let base = ea & !(CACHE_LINE - 1);
    for offset in (0..CACHE_LINE).step_by(8) {
        if interp.write_u64(state, base + offset, 0).is_none() {
            return;
        }
    }
}

pub fn dcbz(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    zero_block(interp, state, ea);
}

pub fn dcbz_l(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if state.spr[spr::HID2] & HID2_LCE == 0 {
        state.raise_program(program_cause::ILLEGAL_INSTRUCTION);
        return;
    }
    let ea = ea_x(state, inst);
    zero_block(interp, state, ea);
}

pub fn dcbi(_: &mut Interpreter, state: &mut PowerPcState, _inst: Instruction) {
    check_supervisor(state);
}

pub fn dcbst(_: &mut Interpreter, _: &mut PowerPcState, _: Instruction) {}

pub fn dcbf(_: &mut Interpreter, _: &mut PowerPcState, _: Instruction) {}

pub fn dcbt(_: &mut Interpreter, _: &mut PowerPcState, _: Instruction) {}

pub fn dcbtst(_: &mut Interpreter, _: &mut PowerPcState, _: Instruction) {}

pub fn dcba(_: &mut Interpreter, _: &mut PowerPcState, _: Instruction) {}

pub fn icbi(interp: &mut Interpreter, _: &mut PowerPcState, _: Instruction) {
    interp.request_cache_invalidation();
}

// External control

pub fn eciwx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    if state.spr[spr::EAR] & EAR_E == 0 {
        state.raise_dsi(ea, false);
        return;
    }
    if ea & 3 != 0 {
        state.raise_alignment(ea);
        return;
    }
    if let Some(value) = interp.read_u32(state, ea) {
        state.gpr[inst.rd()] = value;
    }
}

pub fn ecowx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    let ea = ea_x(state, inst);
    if state.spr[spr::EAR] & EAR_E == 0 {
        state.raise_dsi(ea, true);
        return;
    }
    if ea & 3 != 0 {
        state.raise_alignment(ea);
        return;
    }
    let value = state.gpr[inst.rs()];
    interp.write_u32(state, ea, value);
}
