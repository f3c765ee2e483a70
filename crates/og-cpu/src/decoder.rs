//! Instruction word decoding
//!
//! A Gekko instruction is a single big-endian 32-bit word. Every field is
//! derived from that word by shifting and masking; nothing is cached. Bit
//! numbers in the comments below use the IBM convention (bit 0 is the MSB).

use std::fmt;

/// A raw 32-bit instruction word
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Instruction(pub u32);

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instruction(0x{:08x})", self.0)
    }
}

#[inline(always)]
const fn bits(word: u32, shift: u32, mask: u32) -> u32 {
    (word >> shift) & mask
}

impl Instruction {
    #[inline(always)]
    pub const fn new(word: u32) -> Self {
        Self(word)
    }

    #[inline(always)]
    pub const fn hex(self) -> u32 {
        self.0
    }

    /// Primary opcode (bits 0-5)
    #[inline(always)]
    pub const fn opcd(self) -> u32 {
        bits(self.0, 26, 0x3F)
    }

    // Register fields

    /// Bits 6-10: RD/RS/FD/FS/TO/BO/CRBD
    #[inline(always)]
    pub const fn rd(self) -> usize {
        bits(self.0, 21, 0x1F) as usize
    }
    #[inline(always)]
    pub const fn rs(self) -> usize {
        self.rd()
    }
    #[inline(always)]
    pub const fn fd(self) -> usize {
        self.rd()
    }
    #[inline(always)]
    pub const fn fs(self) -> usize {
        self.rd()
    }
    #[inline(always)]
    pub const fn to(self) -> u32 {
        self.rd() as u32
    }
    #[inline(always)]
    pub const fn bo(self) -> u32 {
        self.rd() as u32
    }
    #[inline(always)]
    pub const fn crbd(self) -> u32 {
        self.rd() as u32
    }

    /// Bits 11-15: RA/FA/BI/CRBA
    #[inline(always)]
    pub const fn ra(self) -> usize {
        bits(self.0, 16, 0x1F) as usize
    }
    #[inline(always)]
    pub const fn fa(self) -> usize {
        self.ra()
    }
    #[inline(always)]
    pub const fn bi(self) -> u32 {
        self.ra() as u32
    }
    #[inline(always)]
    pub const fn crba(self) -> u32 {
        self.ra() as u32
    }

    /// Bits 16-20: RB/FB/SH/NB/CRBB
    #[inline(always)]
    pub const fn rb(self) -> usize {
        bits(self.0, 11, 0x1F) as usize
    }
    #[inline(always)]
    pub const fn fb(self) -> usize {
        self.rb()
    }
    #[inline(always)]
    pub const fn sh(self) -> u32 {
        self.rb() as u32
    }
    #[inline(always)]
    pub const fn nb(self) -> u32 {
        self.rb() as u32
    }
    #[inline(always)]
    pub const fn crbb(self) -> u32 {
        self.rb() as u32
    }

    /// Bits 21-25: FC/MB
    #[inline(always)]
    pub const fn fc(self) -> usize {
        bits(self.0, 6, 0x1F) as usize
    }
    #[inline(always)]
    pub const fn mb(self) -> u32 {
        self.fc() as u32
    }

    /// Bits 26-30
    #[inline(always)]
    pub const fn me(self) -> u32 {
        bits(self.0, 1, 0x1F)
    }

    // Condition register fields

    /// Bits 6-8
    #[inline(always)]
    pub const fn crfd(self) -> usize {
        bits(self.0, 23, 0x7) as usize
    }
    /// Bits 11-13
    #[inline(always)]
    pub const fn crfs(self) -> usize {
        bits(self.0, 18, 0x7) as usize
    }
    /// Bit 10, compare length
    #[inline(always)]
    pub const fn l(self) -> bool {
        bits(self.0, 21, 1) != 0
    }

    // Sub-opcodes

    /// Bit 21
    #[inline(always)]
    pub const fn oe(self) -> bool {
        bits(self.0, 10, 1) != 0
    }
    /// Bits 21-30
    #[inline(always)]
    pub const fn subop10(self) -> usize {
        bits(self.0, 1, 0x3FF) as usize
    }
    /// Bits 26-30
    #[inline(always)]
    pub const fn subop5(self) -> usize {
        bits(self.0, 1, 0x1F) as usize
    }
    /// Bits 25-30
    #[inline(always)]
    pub const fn subop6(self) -> usize {
        bits(self.0, 1, 0x3F) as usize
    }

    // Immediates

    /// Bits 16-31 sign-extended
    #[inline(always)]
    pub const fn simm16(self) -> i32 {
        self.0 as u16 as i16 as i32
    }
    /// Bits 16-31 zero-extended
    #[inline(always)]
    pub const fn uimm(self) -> u32 {
        self.0 & 0xFFFF
    }
    /// Branch displacement (bits 6-29) as a sign-extended byte offset
    #[inline(always)]
    pub const fn li(self) -> i32 {
        ((bits(self.0, 2, 0xFF_FFFF) << 8) as i32) >> 6
    }
    /// Conditional branch displacement (bits 16-29) as a sign-extended byte offset
    #[inline(always)]
    pub const fn bd(self) -> i32 {
        ((bits(self.0, 2, 0x3FFF) << 18) as i32) >> 16
    }
    /// Bit 30
    #[inline(always)]
    pub const fn aa(self) -> bool {
        bits(self.0, 1, 1) != 0
    }
    /// Bit 31
    #[inline(always)]
    pub const fn lk(self) -> bool {
        self.0 & 1 != 0
    }
    /// Bit 31, record flag
    #[inline(always)]
    pub const fn rc(self) -> bool {
        self.0 & 1 != 0
    }

    // Special register fields

    /// SPR number with its two halves put back in order
    #[inline(always)]
    pub const fn spr(self) -> usize {
        let raw = bits(self.0, 11, 0x3FF);
        (((raw & 0x1F) << 5) | (raw >> 5)) as usize
    }
    /// Time base register number, encoded like an SPR
    #[inline(always)]
    pub const fn tbr(self) -> usize {
        self.spr()
    }
    /// Bits 12-19
    #[inline(always)]
    pub const fn crm(self) -> u32 {
        bits(self.0, 12, 0xFF)
    }
    /// Bits 7-14
    #[inline(always)]
    pub const fn fm(self) -> u32 {
        bits(self.0, 17, 0xFF)
    }
    /// Bits 12-15
    #[inline(always)]
    pub const fn sr(self) -> usize {
        bits(self.0, 16, 0xF) as usize
    }
    /// Bits 16-19, mtfsfi immediate
    #[inline(always)]
    pub const fn imm(self) -> u32 {
        bits(self.0, 12, 0xF)
    }

    // Paired-single quantized load/store

    /// Bit 16
    #[inline(always)]
    pub const fn ps_w(self) -> bool {
        bits(self.0, 15, 1) != 0
    }
    /// Bits 17-19
    #[inline(always)]
    pub const fn ps_i(self) -> usize {
        bits(self.0, 12, 0x7) as usize
    }
    /// Bits 20-31 sign-extended
    #[inline(always)]
    pub const fn ps_d(self) -> i32 {
        ((self.0 << 20) as i32) >> 20
    }
    /// Bit 21
    #[inline(always)]
    pub const fn ps_wx(self) -> bool {
        bits(self.0, 10, 1) != 0
    }
    /// Bits 22-24
    #[inline(always)]
    pub const fn ps_ix(self) -> usize {
        bits(self.0, 7, 0x7) as usize
    }

    /// Interpret the word through one instruction format
    pub const fn view(self, form: InstructionForm) -> FormView {
        FormView { inst: self, form }
    }
}

impl From<u32> for Instruction {
    fn from(word: u32) -> Self {
        Self(word)
    }
}

/// Instruction formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionForm {
    /// I-Form: unconditional branch
    I,
    /// B-Form: conditional branch
    B,
    /// SC-Form: system call
    SC,
    /// D-Form: immediate arithmetic and displacement load/store
    D,
    /// X-Form: indexed load/store, logical, compare
    X,
    /// XL-Form: branch to LR/CTR, condition register logic
    XL,
    /// XFX-Form: move to/from special registers
    XFX,
    /// XFL-Form: move to FPSCR fields
    XFL,
    /// XO-Form: integer arithmetic with OE
    XO,
    /// A-Form: floating-point arithmetic
    A,
    /// M-Form: rotate and mask
    M,
    /// Paired-single quantized load/store with displacement
    PsQ,
    /// Paired-single quantized load/store indexed
    PsQx,
}

/// Named instruction fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Opcd,
    Rd,
    Ra,
    Rb,
    Rc,
    Crfd,
    Crfs,
    L,
    Bo,
    Bi,
    Li,
    Bd,
    Aa,
    Lk,
    Rcbit,
    Oe,
    Simm,
    Uimm,
    Sh,
    Mb,
    Me,
    Xo,
    Spr,
    Crm,
    Fm,
    Imm,
    PsW,
    PsI,
    PsD,
}

impl InstructionForm {
    /// Fields defined by this format
    pub const fn fields(self) -> &'static [Field] {
        use Field::*;
        match self {
            InstructionForm::I => &[Opcd, Li, Aa, Lk],
            InstructionForm::B => &[Opcd, Bo, Bi, Bd, Aa, Lk],
            InstructionForm::SC => &[Opcd],
            InstructionForm::D => &[Opcd, Rd, Ra, Simm, Uimm, Crfd, L],
            InstructionForm::X => &[Opcd, Rd, Ra, Rb, Crfd, Crfs, L, Sh, Xo, Rcbit],
            InstructionForm::XL => &[Opcd, Bo, Bi, Rd, Ra, Rb, Crfd, Crfs, Xo, Lk],
            InstructionForm::XFX => &[Opcd, Rd, Spr, Crm, Xo],
            InstructionForm::XFL => &[Opcd, Fm, Rb, Imm, Crfd, Xo, Rcbit],
            InstructionForm::XO => &[Opcd, Rd, Ra, Rb, Oe, Xo, Rcbit],
            InstructionForm::A => &[Opcd, Rd, Ra, Rb, Rc, Xo, Rcbit],
            InstructionForm::M => &[Opcd, Rd, Ra, Rb, Sh, Mb, Me, Rcbit],
            InstructionForm::PsQ => &[Opcd, Rd, Ra, PsW, PsI, PsD],
            InstructionForm::PsQx => &[Opcd, Rd, Ra, Rb, PsW, PsI, Xo],
        }
    }
}

/// One format's view of an instruction word
#[derive(Debug, Clone, Copy)]
pub struct FormView {
    inst: Instruction,
    form: InstructionForm,
}

impl FormView {
    pub fn form(&self) -> InstructionForm {
        self.form
    }

    pub fn has(&self, field: Field) -> bool {
        self.form.fields().contains(&field)
    }

    /// Extract `field`, sign-extended where the architecture says so.
    ///
    /// Asking for a field the format does not define is a caller bug.
    pub fn field(&self, field: Field) -> i32 {
        assert!(
            self.has(field),
            "field {:?} is not part of the {:?} form",
            field,
            self.form
        );
        let i = self.inst;
        match field {
            Field::Opcd => i.opcd() as i32,
            Field::Rd | Field::Bo => i.rd() as i32,
            Field::Ra | Field::Bi => i.ra() as i32,
            Field::Rb | Field::Sh => i.rb() as i32,
            Field::Rc | Field::Mb => i.fc() as i32,
            Field::Me => i.me() as i32,
            Field::Crfd => i.crfd() as i32,
            Field::Crfs => i.crfs() as i32,
            Field::L => i.l() as i32,
            Field::Li => i.li(),
            Field::Bd => i.bd(),
            Field::Aa => i.aa() as i32,
            Field::Lk | Field::Rcbit => i.rc() as i32,
            Field::Oe => i.oe() as i32,
            Field::Simm => i.simm16(),
            Field::Uimm => i.uimm() as i32,
            Field::Xo => match self.form {
                InstructionForm::A => i.subop5() as i32,
                InstructionForm::PsQx => i.subop6() as i32,
                InstructionForm::XO => (i.subop10() & 0x1FF) as i32,
                _ => i.subop10() as i32,
            },
            Field::Spr => i.spr() as i32,
            Field::Crm => i.crm() as i32,
            Field::Fm => i.fm() as i32,
            Field::Imm => i.imm() as i32,
            Field::PsW => match self.form {
                InstructionForm::PsQx => i.ps_wx() as i32,
                _ => i.ps_w() as i32,
            },
            Field::PsI => match self.form {
                InstructionForm::PsQx => i.ps_ix() as i32,
                _ => i.ps_i() as i32,
            },
            Field::PsD => i.ps_d(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_d_form_fields() {
        // addi r3, r4, -50
        let inst = Instruction(0x3864_FFCE);
        assert_eq!(inst.opcd(), 14);
        assert_eq!(inst.rd(), 3);
        assert_eq!(inst.ra(), 4);
        assert_eq!(inst.simm16(), -50);
        assert_eq!(inst.uimm(), 0xFFCE);
    }

    #[test]
    fn test_branch_displacements() {
        // b -4
        let inst = Instruction(0x4BFF_FFFC);
        assert_eq!(inst.opcd(), 18);
        assert_eq!(inst.li(), -4);
        assert!(!inst.aa());
        assert!(!inst.lk());

        // bl +0x100
        let inst = Instruction(0x4800_0101);
        assert_eq!(inst.li(), 0x100);
        assert!(inst.lk());

        // bne cr0, -8
        let inst = Instruction(0x4082_FFF8);
        assert_eq!(inst.bo(), 4);
        assert_eq!(inst.bi(), 2);
        assert_eq!(inst.bd(), -8);
    }

    #[test]
    fn test_spr_halves_swapped() {
        // mflr r0
        assert_eq!(Instruction(0x7C08_02A6).spr(), 8);
        // mtctr r3
        assert_eq!(Instruction(0x7C69_03A6).spr(), 9);
        // mfspr r3, GQR0 (912)
        assert_eq!(Instruction(0x7C70_E2A6).spr(), 912);
    }

    #[test]
    fn test_sub_opcodes() {
        // add r3, r4, r5
        let inst = Instruction(0x7C64_2A14);
        assert_eq!(inst.opcd(), 31);
        assert_eq!(inst.subop10(), 266);
        assert!(!inst.oe());

        // fadd f1, f2, f3
        let inst = Instruction(0xFC22_182A);
        assert_eq!(inst.subop5(), 21);
        assert_eq!(inst.fd(), 1);
        assert_eq!(inst.fa(), 2);
        assert_eq!(inst.fb(), 3);
    }

    #[test]
    fn test_psq_fields() {
        // psq_l f1, -8(r3), 1, 5
        let word = (56 << 26) | (1 << 21) | (3 << 16) | (1 << 15) | (5 << 12) | 0xFF8;
        let inst = Instruction(word);
        assert!(inst.ps_w());
        assert_eq!(inst.ps_i(), 5);
        assert_eq!(inst.ps_d(), -8);
    }

    #[test]
    fn test_form_views() {
        let view = Instruction(0x7C64_2E14).view(InstructionForm::XO);
        assert_eq!(view.field(Field::Rd), 3);
        assert_eq!(view.field(Field::Oe), 1);
        assert_eq!(view.field(Field::Xo), 266);

        let view = Instruction(0x4BFF_FFFC).view(InstructionForm::I);
        assert_eq!(view.field(Field::Li), -4);
    }

    #[test]
    #[should_panic(expected = "not part of")]
    fn test_invalid_field_request() {
        Instruction(0x4800_0000).view(InstructionForm::I).field(Field::Rd);
    }
}
