//! Quantized paired-single loads and stores
//!
//! Each access is described by one of the eight graphics quantization
//! registers (GQR0-7). A GQR holds a type and a signed 6-bit scale for loads
//! in its upper half and for stores in its lower half.

use crate::decoder::Instruction;
use crate::exceptions::program_cause;
use crate::interpreter::Interpreter;
use crate::numeric::{convert_to_double, convert_to_single};
use crate::state::{spr, PowerPcState};

/// HID2 load/store quantized enable
const HID2_LSQE: u32 = 1 << 31;

/// Quantized element type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizeType {
    Float,
    U8,
    U16,
    S8,
    S16,
}

impl QuantizeType {
    /// Types 1-3 are reserved and behave as float
    pub fn from_bits(bits: u32) -> Self {
        match bits & 7 {
            4 => Self::U8,
            5 => Self::U16,
            6 => Self::S8,
            7 => Self::S16,
            _ => Self::Float,
        }
    }

    /// Element size in bytes
    pub fn size(self) -> u32 {
        match self {
            Self::Float => 4,
            Self::U16 | Self::S16 => 2,
            Self::U8 | Self::S8 => 1,
        }
    }
}

/// One half of a GQR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quantizer {
    pub ty: QuantizeType,
    /// Signed power of two
    pub scale: i32,
}

impl Quantizer {
    fn from_half(half: u32) -> Self {
        Self {
            ty: QuantizeType::from_bits(half),
            scale: (((half >> 8) & 0x3F) << 26) as i32 >> 26,
        }
    }

    /// Load side of GQR `index`
    pub fn load(state: &PowerPcState, index: usize) -> Self {
        Self::from_half(state.spr[spr::GQR0 + index] >> 16)
    }

    /// Store side of GQR `index`
    pub fn store(state: &PowerPcState, index: usize) -> Self {
        Self::from_half(state.spr[spr::GQR0 + index] & 0xFFFF)
    }

    /// Raw element bits to a double lane
    fn dequantize(self, raw: u32) -> u64 {
        let value = match self.ty {
            QuantizeType::Float => return convert_to_double(raw),
            QuantizeType::U8 => raw as u8 as f32,
            QuantizeType::U16 => raw as u16 as f32,
            QuantizeType::S8 => raw as u8 as i8 as f32,
            QuantizeType::S16 => raw as u16 as i16 as f32,
        };
        ((value * (-self.scale as f32).exp2()) as f64).to_bits()
    }

    /// A double lane to raw element bits, saturating integer types
    fn quantize(self, lane: u64) -> u32 {
        let value = f64::from_bits(lane) as f32 * (self.scale as f32).exp2();
        match self.ty {
            QuantizeType::Float => convert_to_single(lane),
            QuantizeType::U8 => value as u8 as u32,
            QuantizeType::U16 => value as u16 as u32,
            QuantizeType::S8 => value as i8 as u8 as u32,
            QuantizeType::S16 => value as i16 as u16 as u32,
        }
    }
}

fn read_element(interp: &Interpreter, state: &mut PowerPcState, ty: QuantizeType, ea: u32) -> Option<u32> {
    match ty.size() {
        4 => interp.read_u32(state, ea),
        2 => interp.read_u16(state, ea).map(u32::from),
        _ => interp.read_u8(state, ea).map(u32::from),
    }
}

fn write_element(
    interp: &Interpreter,
    state: &mut PowerPcState,
    ty: QuantizeType,
    ea: u32,
    value: u32,
) -> Option<()> {
    match ty.size() {
        4 => interp.write_u32(state, ea, value),
        2 => interp.write_u16(state, ea, value as u16),
        _ => interp.write_u8(state, ea, value as u8),
    }
}

#[inline]
fn quantized_enabled(state: &mut PowerPcState) -> bool {
    if state.spr[spr::HID2] & HID2_LSQE == 0 {
        state.raise_program(program_cause::ILLEGAL_INSTRUCTION);
        false
    } else {
        true
    }
}

/// Load one or two elements into `fd`. Returns false on a data fault, in
/// which case the register is untouched.
fn quantized_load(
    interp: &Interpreter,
    state: &mut PowerPcState,
    fd: usize,
    ea: u32,
    single: bool,
    gqr: usize,
) -> bool {
    let q = Quantizer::load(state, gqr);

    let Some(first) = read_element(interp, state, q.ty, ea) else {
        return false;
    };
    let second = if single {
        None
    } else {
        match read_element(interp, state, q.ty, ea.wrapping_add(q.ty.size())) {
            Some(raw) => Some(raw),
            None => return false,
        }
    };

    let reg = &mut state.ps[fd];
    reg.ps0 = q.dequantize(first);
    reg.ps1 = match second {
        Some(raw) => q.dequantize(raw),
        None => 1.0f64.to_bits(),
    };
    true
}

fn quantized_store(
    interp: &Interpreter,
    state: &mut PowerPcState,
    fs: usize,
    ea: u32,
    single: bool,
    gqr: usize,
) -> bool {
    let q = Quantizer::store(state, gqr);
    let reg = state.ps[fs];

    if write_element(interp, state, q.ty, ea, q.quantize(reg.ps0)).is_none() {
        return false;
    }
    if !single {
        let ea1 = ea.wrapping_add(q.ty.size());
        if write_element(interp, state, q.ty, ea1, q.quantize(reg.ps1)).is_none() {
            return false;
        }
    }
    true
}

#[inline]
fn ea_psq(state: &PowerPcState, inst: Instruction) -> u32 {
    let base = if inst.ra() == 0 { 0 } else { state.gpr[inst.ra()] };
    base.wrapping_add(inst.ps_d() as u32)
}

/// Update forms with rA = 0 are invalid
#[inline]
fn update_base_valid(state: &mut PowerPcState, inst: Instruction) -> bool {
    if inst.ra() == 0 {
        state.raise_program(program_cause::ILLEGAL_INSTRUCTION);
        false
    } else {
        true
    }
}

pub fn psq_l(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if !quantized_enabled(state) {
        return;
    }
    let ea = ea_psq(state, inst);
    quantized_load(interp, state, inst.fd(), ea, inst.ps_w(), inst.ps_i());
}

pub fn psq_lu(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if !quantized_enabled(state) || !update_base_valid(state, inst) {
        return;
    }
    let ea = state.gpr[inst.ra()].wrapping_add(inst.ps_d() as u32);
    if quantized_load(interp, state, inst.fd(), ea, inst.ps_w(), inst.ps_i()) {
        state.gpr[inst.ra()] = ea;
    }
}

pub fn psq_st(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if !quantized_enabled(state) {
        return;
    }
    let ea = ea_psq(state, inst);
    quantized_store(interp, state, inst.fs(), ea, inst.ps_w(), inst.ps_i());
}

pub fn psq_stu(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if !quantized_enabled(state) || !update_base_valid(state, inst) {
        return;
    }
    let ea = state.gpr[inst.ra()].wrapping_add(inst.ps_d() as u32);
    if quantized_store(interp, state, inst.fs(), ea, inst.ps_w(), inst.ps_i()) {
        state.gpr[inst.ra()] = ea;
    }
}

pub fn psq_lx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if !quantized_enabled(state) {
        return;
    }
    let ea = super::ea_x(state, inst);
    quantized_load(interp, state, inst.fd(), ea, inst.ps_wx(), inst.ps_ix());
}

pub fn psq_lux(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if !quantized_enabled(state) || !update_base_valid(state, inst) {
        return;
    }
    let ea = super::ea_xu(state, inst);
    if quantized_load(interp, state, inst.fd(), ea, inst.ps_wx(), inst.ps_ix()) {
        state.gpr[inst.ra()] = ea;
    }
}

pub fn psq_stx(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if !quantized_enabled(state) {
        return;
    }
    let ea = super::ea_x(state, inst);
    quantized_store(interp, state, inst.fs(), ea, inst.ps_wx(), inst.ps_ix());
}

pub fn psq_stux(interp: &mut Interpreter, state: &mut PowerPcState, inst: Instruction) {
    if !quantized_enabled(state) || !update_base_valid(state, inst) {
        return;
    }
    let ea = super::ea_xu(state, inst);
    if quantized_store(interp, state, inst.fs(), ea, inst.ps_wx(), inst.ps_ix()) {
        state.gpr[inst.ra()] = ea;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exceptions::Exceptions;
    use og_memory::{FlatMemory, Memory};

    fn setup() -> (Interpreter, PowerPcState, std::sync::Arc<FlatMemory>) {
        let memory = FlatMemory::new();
        let interpreter = Interpreter::new(memory.clone());
        let mut state = PowerPcState::new();
        state.spr[spr::HID2] = HID2_LSQE;
        (interpreter, state, memory)
    }

    #[test]
    fn test_gqr_decoding() {
        let mut state = PowerPcState::new();
        state.spr[spr::GQR0 + 3] = (6 << 16) | (0x3F << 24) | 5 | (0x20 << 8);
        assert_eq!(
            Quantizer::load(&state, 3),
            Quantizer { ty: QuantizeType::S8, scale: -1 }
        );
        assert_eq!(
            Quantizer::store(&state, 3),
            Quantizer { ty: QuantizeType::U16, scale: -32 }
        );
        assert_eq!(QuantizeType::from_bits(2), QuantizeType::Float);
    }

    #[test]
    fn test_float_pair_load() {
        let (mut interp, mut state, memory) = setup();
        memory.write_u32(0x100, 0x3F80_0000).unwrap();
        memory.write_u32(0x104, 0xC000_0000).unwrap();
        state.gpr[3] = 0x100;
        // psq_l f1, 0(r3), 0, qr0
        psq_l(&mut interp, &mut state, Instruction(0xE023_0000));
        assert_eq!(state.ps[1].ps0_as_double(), 1.0);
        assert_eq!(state.ps[1].ps1_as_double(), -2.0);
    }

    #[test]
    fn test_signed_dequantize_with_scale() {
        let (mut interp, mut state, memory) = setup();
        // s8 elements, scale 1 halves the loaded values
        state.spr[spr::GQR0 + 1] = (6 << 16) | (1 << 24);
        memory.write_bytes(0x200, &[0xFC, 0x08]).unwrap();
        state.gpr[3] = 0x200;
        // psq_l f1, 0(r3), 0, qr1
        psq_l(&mut interp, &mut state, Instruction(0xE023_1000));
        assert_eq!(state.ps[1].ps0_as_double(), -2.0);
        assert_eq!(state.ps[1].ps1_as_double(), 4.0);
    }

    #[test]
    fn test_u8_store_saturates() {
        let (mut interp, mut state, memory) = setup();
        state.spr[spr::GQR0 + 1] = 4;
        state.ps[1].set_both(300.0, -5.0);
        state.gpr[3] = 0x300;
        // psq_st f1, 0(r3), 0, qr1
        psq_st(&mut interp, &mut state, Instruction(0xF023_1000));
        assert_eq!(memory.read_bytes(0x300, 2).unwrap(), vec![255, 0]);
    }

    #[test]
    fn test_update_form_rejects_r0() {
        let (mut interp, mut state, _memory) = setup();
        // psq_lu f1, 0(r0)
        psq_lu(&mut interp, &mut state, Instruction(0xE420_0000));
        assert!(state.pending().contains(Exceptions::PROGRAM));
    }

    #[test]
    fn test_update_form_writes_base() {
        let (mut interp, mut state, memory) = setup();
        memory.write_u32(0x408, 0x4000_0000).unwrap();
        state.gpr[3] = 0x400;
        // psq_lu f1, 8(r3), 1, qr0
        psq_lu(&mut interp, &mut state, Instruction(0xE423_8008));
        assert_eq!(state.gpr[3], 0x408);
        assert_eq!(state.ps[1].ps0_as_double(), 2.0);
        assert_eq!(state.ps[1].ps1_as_double(), 1.0);
    }

    #[test]
    fn test_indexed_store() {
        let (mut interp, mut state, memory) = setup();
        state.spr[spr::GQR0 + 2] = 5;
        state.ps[1].set_both(513.0, 7.0);
        state.gpr[3] = 0x500;
        state.gpr[4] = 0x10;
        // psq_stx f1, r3, r4, 0, qr2
        psq_stx(&mut interp, &mut state, Instruction(0x1023_210E));
        assert_eq!(memory.read_u16(0x510).unwrap(), 513);
        assert_eq!(memory.read_u16(0x512).unwrap(), 7);
    }
}
