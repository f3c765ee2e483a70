//! Disassembler for Gekko instructions
//!
//! Mnemonics come from the dispatch table descriptors, so every opcode the
//! interpreter knows can be listed. Operands are laid out per opcode family.

use std::fmt;

use og_cpu::decoder::Instruction;
use og_cpu::tables::{self, OpFlags, OpInfo, OpType};
use og_memory::Memory;

/// Disassembled instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisassembledInstruction {
    /// Address of the instruction
    pub address: u32,
    /// Raw instruction word
    pub opcode: u32,
    pub mnemonic: String,
    /// Operands as a string
    pub operands: String,
}

impl DisassembledInstruction {
    /// Get opcode as hex string
    pub fn opcode_hex(&self) -> String {
        format!("{:08X}", self.opcode)
    }
}

impl fmt::Display for DisassembledInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operands.is_empty() {
            f.write_str(&self.mnemonic)
        } else {
            write!(f, "{:8} {}", self.mnemonic, self.operands)
        }
    }
}

/// Disassemble a single instruction word located at `address`
pub fn disassemble(address: u32, word: u32) -> DisassembledInstruction {
    let inst = Instruction(word);
    let (mnemonic, operands) = if tables::is_valid_instruction(inst) {
        let info = tables::resolve(inst);
        simplified(inst).unwrap_or_else(|| (mnemonic(info, inst), operands(info, inst, address)))
    } else {
        (".long".to_string(), format!("0x{:08X}", word))
    };

    DisassembledInstruction {
        address,
        opcode: word,
        mnemonic,
        operands,
    }
}

/// Disassemble `count` words starting at `address`
///
/// Stops early at the first address that cannot be read.
pub fn disassemble_range(memory: &dyn Memory, address: u32, count: usize) -> Vec<DisassembledInstruction> {
    let mut result = Vec::with_capacity(count);
    for i in 0..count as u32 {
        let addr = address.wrapping_add(i * 4);
        match memory.read_u32(addr) {
            Ok(word) => result.push(disassemble(addr, word)),
            Err(err) => {
                tracing::debug!("Disassembly stopped at 0x{:08x}: {}", addr, err);
                break;
            }
        }
    }
    result
}

/// Common extended mnemonics
fn simplified(inst: Instruction) -> Option<(String, String)> {
    let word = inst.hex();
    let found = match word {
        0x6000_0000 => ("nop", String::new()),
        0x4E80_0020 => ("blr", String::new()),
        0x4E80_0021 => ("blrl", String::new()),
        0x4E80_0420 => ("bctr", String::new()),
        0x4E80_0421 => ("bctrl", String::new()),
        _ => match inst.opcd() {
            14 if inst.ra() == 0 => ("li", format!("r{}, {}", inst.rd(), inst.simm16())),
            15 if inst.ra() == 0 => ("lis", format!("r{}, 0x{:X}", inst.rd(), inst.uimm())),
            // or rA, rS, rS
            31 if inst.subop10() == 444 && inst.rs() == inst.rb() && !inst.rc() => {
                ("mr", format!("r{}, r{}", inst.ra(), inst.rs()))
            }
            _ => return None,
        },
    };
    Some((found.0.to_string(), found.1))
}

/// Descriptor name turned into an assembler mnemonic
fn mnemonic(info: &OpInfo, inst: Instruction) -> String {
    let name = info.name;
    let suffix = |lk: bool, aa: bool| match (lk, aa) {
        (false, false) => "",
        (true, false) => "l",
        (false, true) => "a",
        (true, true) => "la",
    };

    match name {
        "bx" => return format!("b{}", suffix(inst.lk(), inst.aa())),
        "bcx" => return format!("bc{}", suffix(inst.lk(), inst.aa())),
        "bclrx" => return format!("bclr{}", suffix(inst.lk(), false)),
        "bcctrx" => return format!("bcctr{}", suffix(inst.lk(), false)),
        "stwcxd" => return "stwcx.".to_string(),
        _ => {}
    }
    if let Some(base) = name.strip_suffix("_rc") {
        return format!("{}.", base);
    }

    let record = info.flags.intersects(OpFlags::RC_BIT | OpFlags::RC_BIT_F);
    let mut mnemonic = match name.strip_suffix('x') {
        Some(base) if record => base.to_string(),
        _ => name.to_string(),
    };
    if record && inst.rc() {
        mnemonic.push('.');
    }
    mnemonic
}

/// Base name with record and overflow suffixes removed
fn family(info: &OpInfo) -> &'static str {
    let name = info.name;
    let name = name.strip_suffix("_rc").unwrap_or(name);
    let name = if info.flags.intersects(OpFlags::RC_BIT | OpFlags::RC_BIT_F) {
        name.strip_suffix('x').unwrap_or(name)
    } else {
        name
    };
    if info.flags.contains(OpFlags::SET_OE) {
        name.strip_suffix('o').unwrap_or(name)
    } else {
        name
    }
}

fn operands(info: &OpInfo, inst: Instruction, address: u32) -> String {
    let (rd, ra, rb) = (inst.rd(), inst.ra(), inst.rb());
    let (fd, fa, fb, fc) = (inst.fd(), inst.fa(), inst.fb(), inst.fc());
    let d = inst.simm16();

    match info.op_type {
        OpType::Branch => return branch_operands(info, inst, address),
        OpType::Load | OpType::Store => {
            return if inst.opcd() == 31 {
                format!("r{}, r{}, r{}", rd, ra, rb)
            } else {
                format!("r{}, {}(r{})", rd, d, ra)
            };
        }
        OpType::LoadFP | OpType::StoreFP => {
            return if inst.opcd() == 31 {
                format!("f{}, r{}, r{}", fd, ra, rb)
            } else {
                format!("f{}, {}(r{})", fd, d, ra)
            };
        }
        OpType::LoadPS | OpType::StorePS => {
            return if inst.opcd() == 4 {
                format!("f{}, r{}, r{}, {}, qr{}", fd, ra, rb, inst.ps_wx() as u8, inst.ps_ix())
            } else {
                format!("f{}, {}(r{}), {}, qr{}", fd, inst.ps_d(), ra, inst.ps_w() as u8, inst.ps_i())
            };
        }
        OpType::DataCache | OpType::InstructionCache if inst.opcd() == 31 => {
            return format!("r{}, r{}", ra, rb);
        }
        OpType::CR => return format!("crb{}, crb{}, crb{}", inst.crbd(), inst.crba(), inst.crbb()),
        _ => {}
    }

    match family(info) {
        "sc" | "rfi" | "isync" | "sync" | "eieio" | "tlbsync" => String::new(),

        // Immediate arithmetic
        "addi" | "addis" | "addic" | "mulli" | "subfic" => format!("r{}, r{}, {}", rd, ra, d),
        "ori" | "oris" | "xori" | "xoris" | "andi" | "andis" => {
            format!("r{}, r{}, 0x{:X}", ra, inst.rs(), inst.uimm())
        }
        "cmpi" => format!("cr{}, r{}, {}", inst.crfd(), ra, d),
        "cmpli" => format!("cr{}, r{}, 0x{:X}", inst.crfd(), ra, inst.uimm()),
        "twi" => format!("{}, r{}, {}", inst.to(), ra, d),
        "tw" => format!("{}, r{}, r{}", inst.to(), ra, rb),
        "lmw" | "stmw" => format!("r{}, {}(r{})", rd, d, ra),

        // Rotates
        "rlwimi" | "rlwinm" => format!("r{}, r{}, {}, {}, {}", ra, inst.rs(), inst.sh(), inst.mb(), inst.me()),
        "rlwnm" => format!("r{}, r{}, r{}, {}, {}", ra, inst.rs(), rb, inst.mb(), inst.me()),

        // Register arithmetic
        "neg" | "addme" | "addze" | "subfme" | "subfze" => format!("r{}, r{}", rd, ra),
        "add" | "addc" | "adde" | "subf" | "subfc" | "subfe" | "mullw" | "mulhw" | "mulhwu"
        | "divw" | "divwu" => format!("r{}, r{}, r{}", rd, ra, rb),
        "and" | "andc" | "or" | "orc" | "nor" | "nand" | "xor" | "eqv" | "slw" | "srw" | "sraw" => {
            format!("r{}, r{}, r{}", ra, inst.rs(), rb)
        }
        "srawi" => format!("r{}, r{}, {}", ra, inst.rs(), inst.sh()),
        "cntlzw" | "extsb" | "extsh" => format!("r{}, r{}", ra, inst.rs()),
        "cmp" | "cmpl" => format!("cr{}, r{}, r{}", inst.crfd(), ra, rb),

        // Condition and special registers
        "mcrf" | "mcrfs" => format!("cr{}, cr{}", inst.crfd(), inst.crfs()),
        "mcrxr" => format!("cr{}", inst.crfd()),
        "mfcr" | "mfmsr" => format!("r{}", rd),
        "mtmsr" => format!("r{}", inst.rs()),
        "mtcrf" => format!("0x{:02X}, r{}", inst.crm(), inst.rs()),
        "mfspr" => format!("r{}, {}", rd, inst.spr()),
        "mtspr" => format!("{}, r{}", inst.spr(), inst.rs()),
        "mftb" => format!("r{}, {}", rd, inst.tbr()),
        "mfsr" => format!("r{}, {}", rd, inst.sr()),
        "mtsr" => format!("{}, r{}", inst.sr(), inst.rs()),
        "mfsrin" | "mtsrin" => format!("r{}, r{}", rd, rb),
        "tlbie" => format!("r{}", rb),
        "eciwx" | "ecowx" => format!("r{}, r{}, r{}", rd, ra, rb),
        "dcbz_l" | "icbi" => format!("r{}, r{}", ra, rb),

        // FPSCR
        "mffs" => format!("f{}", fd),
        "mtfsb0" | "mtfsb1" => format!("crb{}", inst.crbd()),
        "mtfsfi" => format!("cr{}, {}", inst.crfd(), inst.imm()),
        "mtfsf" => format!("0x{:02X}, f{}", inst.fm(), fb),

        // Floating point and paired singles
        "fcmpu" | "fcmpo" | "ps_cmpu0" | "ps_cmpu1" | "ps_cmpo0" | "ps_cmpo1" => {
            format!("cr{}, f{}, f{}", inst.crfd(), fa, fb)
        }
        "fmr" | "fneg" | "fabs" | "fnabs" | "frsp" | "fctiw" | "fctiwz" | "fres" | "frsqrte"
        | "ps_mr" | "ps_neg" | "ps_abs" | "ps_nabs" | "ps_res" | "ps_rsqrte" => {
            format!("f{}, f{}", fd, fb)
        }
        "fmul" | "fmuls" | "ps_mul" | "ps_muls0" | "ps_muls1" => format!("f{}, f{}, f{}", fd, fa, fc),
        "fmadd" | "fmsub" | "fnmadd" | "fnmsub" | "fmadds" | "fmsubs" | "fnmadds" | "fnmsubs"
        | "fsel" | "ps_madd" | "ps_msub" | "ps_nmadd" | "ps_nmsub" | "ps_madds0" | "ps_madds1"
        | "ps_sum0" | "ps_sum1" | "ps_sel" => format!("f{}, f{}, f{}, f{}", fd, fa, fc, fb),
        _ => match info.op_type {
            OpType::DoubleFP | OpType::SingleFP | OpType::PS => format!("f{}, f{}, f{}", fd, fa, fb),
            _ => format!("r{}, r{}, r{}", rd, ra, rb),
        },
    }
}

fn branch_operands(info: &OpInfo, inst: Instruction, address: u32) -> String {
    match info.name {
        "bx" => {
            let target = if inst.aa() {
                inst.li() as u32
            } else {
                address.wrapping_add(inst.li() as u32)
            };
            format!("0x{:08X}", target)
        }
        "bcx" => {
            let target = if inst.aa() {
                inst.bd() as u32
            } else {
                address.wrapping_add(inst.bd() as u32)
            };
            format!("{}, {}, 0x{:08X}", inst.bo(), inst.bi(), target)
        }
        _ => format!("{}, {}", inst.bo(), inst.bi()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use og_memory::FlatMemory;

    #[test]
    fn test_disassemble_simplified() {
        assert_eq!(disassemble(0, 0x6000_0000).mnemonic, "nop");
        assert_eq!(disassemble(0, 0x4E80_0020).mnemonic, "blr");

        let dis = disassemble(0, 0x3860_0064);
        assert_eq!(dis.mnemonic, "li");
        assert_eq!(dis.operands, "r3, 100");

        // or r3, r4, r4
        let dis = disassemble(0, 0x7C83_2378);
        assert_eq!(dis.to_string(), "mr       r3, r4");
    }

    #[test]
    fn test_disassemble_branch() {
        let dis = disassemble(0x8000_3000, 0x4800_0101);
        assert_eq!(dis.mnemonic, "bl");
        assert_eq!(dis.operands, "0x80003100");

        // bdnz -8
        let dis = disassemble(0x8000_3014, 0x4200_FFF8);
        assert_eq!(dis.mnemonic, "bc");
        assert_eq!(dis.operands, "16, 0, 0x8000300C");
    }

    #[test]
    fn test_disassemble_record_and_overflow() {
        // add. r3, r4, r5
        let dis = disassemble(0, 0x7C64_2A15);
        assert_eq!(dis.mnemonic, "add.");
        assert_eq!(dis.operands, "r3, r4, r5");

        // addo r3, r4, r5
        let dis = disassemble(0, 0x7C64_2E14);
        assert_eq!(dis.mnemonic, "addo");
        assert_eq!(dis.operands, "r3, r4, r5");

        // andi. r3, r4, 0xFF
        let dis = disassemble(0, 0x7083_00FF);
        assert_eq!(dis.mnemonic, "andi.");
        assert_eq!(dis.operands, "r3, r4, 0xFF");

        // lwzx keeps its name
        assert_eq!(disassemble(0, 0x7C64_282E).mnemonic, "lwzx");
    }

    #[test]
    fn test_disassemble_memory_forms() {
        let dis = disassemble(0, 0x8065_0010);
        assert_eq!(dis.to_string(), "lwz      r3, 16(r5)");

        let dis = disassemble(0, 0xC825_FFF8);
        assert_eq!(dis.operands, "f1, -8(r5)");

        let dis = disassemble(0, 0xE025_1000);
        assert_eq!(dis.mnemonic, "psq_l");
        assert_eq!(dis.operands, "f1, 0(r5), 0, qr1");
    }

    #[test]
    fn test_disassemble_float() {
        // fmadd f1, f2, f3, f4
        let dis = disassemble(0, 0xFC22_20FA);
        assert_eq!(dis.mnemonic, "fmadd");
        assert_eq!(dis.operands, "f1, f2, f3, f4");

        let dis = disassemble(0, 0x1041_082A);
        assert_eq!(dis.mnemonic, "ps_add");
        assert_eq!(dis.operands, "f2, f1, f1");
    }

    #[test]
    fn test_disassemble_unknown() {
        let dis = disassemble(0, 0x0000_0000);
        assert_eq!(dis.mnemonic, ".long");
        assert_eq!(dis.to_string(), ".long    0x00000000");
    }

    #[test]
    fn test_disassemble_range() {
        let memory = FlatMemory::new();
        memory.write_u32(0x8000_3000, 0x3860_0001).unwrap();
        memory.write_u32(0x8000_3004, 0x4E80_0020).unwrap();

        let listing = disassemble_range(memory.as_ref(), 0x8000_3000, 2);
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[1].address, 0x8000_3004);
        assert_eq!(listing[1].mnemonic, "blr");

        // Runs off the end of MEM1
        let listing = disassemble_range(memory.as_ref(), 0x817F_FFFC, 4);
        assert_eq!(listing.len(), 1);
    }
}
