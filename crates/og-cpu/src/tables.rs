//! Opcode dispatch tables
//!
//! A primary table indexed by OPCD and five secondary tables (4, 19, 31, 59
//! and 63). Every slot of every table is first filled with the unknown
//! instruction descriptor and then overwritten by the literal entries below;
//! an entry that lands on an already written slot is a table bug and panics
//! during the one-time build.

use bitflags::bitflags;
use once_cell::sync::Lazy;

use crate::decoder::Instruction;
use crate::instructions::{
    branch, float, integer, load_store, load_store_paired, paired, system,
};
use crate::interpreter::{self, Interpreter};
use crate::state::PowerPcState;

/// Instruction handler
pub type Handler = fn(&mut Interpreter, &mut PowerPcState, Instruction);

/// Broad instruction category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpType {
    Integer,
    CR,
    SPR,
    System,
    SystemFP,
    Load,
    Store,
    LoadFP,
    StoreFP,
    LoadPS,
    StorePS,
    DoubleFP,
    SingleFP,
    PS,
    DataCache,
    InstructionCache,
    Branch,
    Unknown,
}

bitflags! {
    /// Side-effect flags of an opcode
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpFlags: u32 {
        /// Always writes CR0
        const SET_CR0           = 1 << 0;
        /// Writes the CR field named by CRFD
        const SET_CRN           = 1 << 1;
        /// Writes CR0 when Rc is set
        const RC_BIT            = 1 << 2;
        /// Writes CR1 when Rc is set
        const RC_BIT_F          = 1 << 3;
        /// Writes XER[CA]
        const SET_CA            = 1 << 4;
        /// Reads XER[CA]
        const READ_CA           = 1 << 5;
        /// Honours the OE bit
        const SET_OE            = 1 << 6;
        /// Ends the current batch
        const END_BLOCK         = 1 << 7;
        /// Needs MSR[FP]
        const USE_FPU           = 1 << 8;
        /// Accesses guest memory
        const LOADSTORE         = 1 << 9;
        /// Long-latency divide or estimate
        const FLOAT_DIV         = 1 << 10;
        /// May raise a program exception
        const PROGRAM_EXCEPTION = 1 << 11;
        /// Reads the time base
        const TIMER             = 1 << 12;
        /// May unmask pending interrupts; ends the current batch
        const CHECK_EXCEPTIONS  = 1 << 13;
    }
}

/// Static description of one opcode
pub struct OpInfo {
    /// Index into [`all_ops`], used for run counters
    pub id: usize,
    pub name: &'static str,
    pub op_type: OpType,
    pub flags: OpFlags,
    pub num_cycles: u32,
    pub handler: Handler,
}

impl std::fmt::Debug for OpInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpInfo")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("op_type", &self.op_type)
            .field("flags", &self.flags)
            .field("num_cycles", &self.num_cycles)
            .finish_non_exhaustive()
    }
}

impl OpInfo {
    #[inline]
    pub fn uses_fpu(&self) -> bool {
        self.flags.contains(OpFlags::USE_FPU)
    }

    #[inline]
    pub fn ends_block(&self) -> bool {
        self.flags
            .intersects(OpFlags::END_BLOCK | OpFlags::CHECK_EXCEPTIONS)
    }
}

/// Secondary tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubTable {
    Table4,
    Table19,
    Table31,
    Table59,
    Table63,
}

/// A primary table slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimarySlot {
    Op(u16),
    Table(SubTable),
}

struct Template {
    opcode: usize,
    name: &'static str,
    op_type: OpType,
    num_cycles: u32,
    flags: OpFlags,
    handler: Handler,
}

macro_rules! op {
    ($opcode:expr, $name:expr, $ty:ident, $cycles:expr, $handler:expr) => {
        op!($opcode, $name, $ty, $cycles, OpFlags::empty(), $handler)
    };
    ($opcode:expr, $name:expr, $ty:ident, $cycles:expr, $flags:expr, $handler:expr) => {
        Template {
            opcode: $opcode,
            name: $name,
            op_type: OpType::$ty,
            num_cycles: $cycles,
            flags: $flags,
            handler: $handler,
        }
    };
}

const END: OpFlags = OpFlags::END_BLOCK;
const RC: OpFlags = OpFlags::RC_BIT;
const CA: OpFlags = OpFlags::SET_CA;
const OE: OpFlags = OpFlags::SET_OE;
const LS: OpFlags = OpFlags::LOADSTORE;
const FPU: OpFlags = OpFlags::USE_FPU;
const PRIV: OpFlags = OpFlags::PROGRAM_EXCEPTION;

/// Float ops whose Rc bit records into CR1
const FP: OpFlags = OpFlags::RC_BIT_F.union(OpFlags::USE_FPU);
const FP_COMPARE: OpFlags = OpFlags::SET_CRN.union(OpFlags::USE_FPU);
const FP_DIV: OpFlags = FP.union(OpFlags::FLOAT_DIV);
const FP_LS: OpFlags = OpFlags::USE_FPU.union(OpFlags::LOADSTORE);
const PS_LS: OpFlags = FP_LS.union(OpFlags::PROGRAM_EXCEPTION);

fn primary_ops() -> Vec<Template> {
    vec![
        op!(16, "bcx", Branch, 1, END, branch::bcx),
        op!(18, "bx", Branch, 1, END, branch::bx),
        op!(3, "twi", System, 1, END, integer::twi),
        op!(17, "sc", System, 2, END, system::sc),
        op!(7, "mulli", Integer, 3, integer::mulli),
        op!(8, "subfic", Integer, 1, CA, integer::subfic),
        op!(10, "cmpli", Integer, 1, OpFlags::SET_CRN, integer::cmpli),
        op!(11, "cmpi", Integer, 1, OpFlags::SET_CRN, integer::cmpi),
        op!(12, "addic", Integer, 1, CA, integer::addic),
        op!(13, "addic_rc", Integer, 1, CA | OpFlags::SET_CR0, integer::addic_rc),
        op!(14, "addi", Integer, 1, integer::addi),
        op!(15, "addis", Integer, 1, integer::addis),
        op!(20, "rlwimix", Integer, 1, RC, integer::rlwimix),
        op!(21, "rlwinmx", Integer, 1, RC, integer::rlwinmx),
        op!(23, "rlwnmx", Integer, 1, RC, integer::rlwnmx),
        op!(24, "ori", Integer, 1, integer::ori),
        op!(25, "oris", Integer, 1, integer::oris),
        op!(26, "xori", Integer, 1, integer::xori),
        op!(27, "xoris", Integer, 1, integer::xoris),
        op!(28, "andi_rc", Integer, 1, OpFlags::SET_CR0, integer::andi_rc),
        op!(29, "andis_rc", Integer, 1, OpFlags::SET_CR0, integer::andis_rc),
        op!(32, "lwz", Load, 1, LS, load_store::lwz),
        op!(33, "lwzu", Load, 1, LS, load_store::lwzu),
        op!(34, "lbz", Load, 1, LS, load_store::lbz),
        op!(35, "lbzu", Load, 1, LS, load_store::lbzu),
        op!(40, "lhz", Load, 1, LS, load_store::lhz),
        op!(41, "lhzu", Load, 1, LS, load_store::lhzu),
        op!(42, "lha", Load, 1, LS, load_store::lha),
        op!(43, "lhau", Load, 1, LS, load_store::lhau),
        op!(44, "sth", Store, 1, LS, load_store::sth),
        op!(45, "sthu", Store, 1, LS, load_store::sthu),
        op!(36, "stw", Store, 1, LS, load_store::stw),
        op!(37, "stwu", Store, 1, LS, load_store::stwu),
        op!(38, "stb", Store, 1, LS, load_store::stb),
        op!(39, "stbu", Store, 1, LS, load_store::stbu),
        op!(46, "lmw", System, 11, LS, load_store::lmw),
        op!(47, "stmw", System, 11, LS, load_store::stmw),
        op!(48, "lfs", LoadFP, 1, FP_LS, load_store::lfs),
        op!(49, "lfsu", LoadFP, 1, FP_LS, load_store::lfsu),
        op!(50, "lfd", LoadFP, 1, FP_LS, load_store::lfd),
        op!(51, "lfdu", LoadFP, 1, FP_LS, load_store::lfdu),
        op!(52, "stfs", StoreFP, 1, FP_LS, load_store::stfs),
        op!(53, "stfsu", StoreFP, 1, FP_LS, load_store::stfsu),
        op!(54, "stfd", StoreFP, 1, FP_LS, load_store::stfd),
        op!(55, "stfdu", StoreFP, 1, FP_LS, load_store::stfdu),
        op!(56, "psq_l", LoadPS, 1, PS_LS, load_store_paired::psq_l),
        op!(57, "psq_lu", LoadPS, 1, PS_LS, load_store_paired::psq_lu),
        op!(60, "psq_st", StorePS, 1, PS_LS, load_store_paired::psq_st),
        op!(61, "psq_stu", StorePS, 1, PS_LS, load_store_paired::psq_stu),
    ]
}

/// Table 4, indexed directly by SUBOP10
fn table4_ops() -> Vec<Template> {
    vec![
        op!(0, "ps_cmpu0", PS, 1, FP_COMPARE, paired::ps_cmpu0),
        op!(32, "ps_cmpo0", PS, 1, FP_COMPARE, paired::ps_cmpo0),
        op!(40, "ps_neg", PS, 1, FP, paired::ps_neg),
        op!(136, "ps_nabs", PS, 1, FP, paired::ps_nabs),
        op!(264, "ps_abs", PS, 1, FP, paired::ps_abs),
        op!(64, "ps_cmpu1", PS, 1, FP_COMPARE, paired::ps_cmpu1),
        op!(72, "ps_mr", PS, 1, FP, paired::ps_mr),
        op!(96, "ps_cmpo1", PS, 1, FP_COMPARE, paired::ps_cmpo1),
        op!(528, "ps_merge00", PS, 1, FP, paired::ps_merge00),
        op!(560, "ps_merge01", PS, 1, FP, paired::ps_merge01),
        op!(592, "ps_merge10", PS, 1, FP, paired::ps_merge10),
        op!(624, "ps_merge11", PS, 1, FP, paired::ps_merge11),
        op!(1014, "dcbz_l", System, 1, LS | PRIV, load_store::dcbz_l),
    ]
}

/// Table 4 A-form group, replicated over bits 21-25
fn table4_2_ops() -> Vec<Template> {
    vec![
        op!(10, "ps_sum0", PS, 1, FP, paired::ps_sum0),
        op!(11, "ps_sum1", PS, 1, FP, paired::ps_sum1),
        op!(12, "ps_muls0", PS, 1, FP, paired::ps_muls0),
        op!(13, "ps_muls1", PS, 1, FP, paired::ps_muls1),
        op!(14, "ps_madds0", PS, 1, FP, paired::ps_madds0),
        op!(15, "ps_madds1", PS, 1, FP, paired::ps_madds1),
        op!(18, "ps_div", PS, 17, FP_DIV, paired::ps_div),
        op!(20, "ps_sub", PS, 1, FP, paired::ps_sub),
        op!(21, "ps_add", PS, 1, FP, paired::ps_add),
        op!(23, "ps_sel", PS, 1, FP, paired::ps_sel),
        op!(24, "ps_res", PS, 1, FP_DIV, paired::ps_res),
        op!(25, "ps_mul", PS, 1, FP, paired::ps_mul),
        op!(26, "ps_rsqrte", PS, 2, FP_DIV, paired::ps_rsqrte),
        op!(28, "ps_msub", PS, 1, FP, paired::ps_msub),
        op!(29, "ps_madd", PS, 1, FP, paired::ps_madd),
        op!(30, "ps_nmsub", PS, 1, FP, paired::ps_nmsub),
        op!(31, "ps_nmadd", PS, 1, FP, paired::ps_nmadd),
    ]
}

/// Table 4 indexed quantized load/store group, replicated over bits 21-24
fn table4_3_ops() -> Vec<Template> {
    vec![
        op!(6, "psq_lx", LoadPS, 1, PS_LS, load_store_paired::psq_lx),
        op!(7, "psq_stx", StorePS, 1, PS_LS, load_store_paired::psq_stx),
        op!(38, "psq_lux", LoadPS, 1, PS_LS, load_store_paired::psq_lux),
        op!(39, "psq_stux", StorePS, 1, PS_LS, load_store_paired::psq_stux),
    ]
}

fn table19_ops() -> Vec<Template> {
    vec![
        op!(528, "bcctrx", Branch, 1, END, branch::bcctrx),
        op!(16, "bclrx", Branch, 1, END, branch::bclrx),
        op!(257, "crand", CR, 1, system::crand),
        op!(129, "crandc", CR, 1, system::crandc),
        op!(289, "creqv", CR, 1, system::creqv),
        op!(225, "crnand", CR, 1, system::crnand),
        op!(33, "crnor", CR, 1, system::crnor),
        op!(449, "cror", CR, 1, system::cror),
        op!(417, "crorc", CR, 1, system::crorc),
        op!(193, "crxor", CR, 1, system::crxor),
        op!(150, "isync", InstructionCache, 1, system::isync),
        op!(0, "mcrf", System, 1, system::mcrf),
        op!(50, "rfi", System, 2, END | PRIV | OpFlags::CHECK_EXCEPTIONS, system::rfi),
    ]
}

fn table31_ops() -> Vec<Template> {
    let ca_in = CA | OpFlags::READ_CA;
    vec![
        op!(266, "addx", Integer, 1, RC, integer::addx),
        op!(778, "addox", Integer, 1, RC | OE, integer::addx),
        op!(10, "addcx", Integer, 1, RC | CA, integer::addcx),
        op!(522, "addcox", Integer, 1, RC | CA | OE, integer::addcx),
        op!(138, "addex", Integer, 1, RC | ca_in, integer::addex),
        op!(650, "addeox", Integer, 1, RC | ca_in | OE, integer::addex),
        op!(234, "addmex", Integer, 1, RC | ca_in, integer::addmex),
        op!(746, "addmeox", Integer, 1, RC | ca_in | OE, integer::addmex),
        op!(202, "addzex", Integer, 1, RC | ca_in, integer::addzex),
        op!(714, "addzeox", Integer, 1, RC | ca_in | OE, integer::addzex),
        op!(491, "divwx", Integer, 40, RC, integer::divwx),
        op!(1003, "divwox", Integer, 40, RC | OE, integer::divwx),
        op!(459, "divwux", Integer, 40, RC, integer::divwux),
        op!(971, "divwuox", Integer, 40, RC | OE, integer::divwux),
        op!(75, "mulhwx", Integer, 5, RC, integer::mulhwx),
        op!(11, "mulhwux", Integer, 5, RC, integer::mulhwux),
        op!(235, "mullwx", Integer, 5, RC, integer::mullwx),
        op!(747, "mullwox", Integer, 5, RC | OE, integer::mullwx),
        op!(104, "negx", Integer, 1, RC, integer::negx),
        op!(616, "negox", Integer, 1, RC | OE, integer::negx),
        op!(40, "subfx", Integer, 1, RC, integer::subfx),
        op!(552, "subfox", Integer, 1, RC | OE, integer::subfx),
        op!(8, "subfcx", Integer, 1, RC | CA, integer::subfcx),
        op!(520, "subfcox", Integer, 1, RC | CA | OE, integer::subfcx),
        op!(136, "subfex", Integer, 1, RC | ca_in, integer::subfex),
        op!(648, "subfeox", Integer, 1, RC | ca_in | OE, integer::subfex),
        op!(232, "subfmex", Integer, 1, RC | ca_in, integer::subfmex),
        op!(744, "subfmeox", Integer, 1, RC | ca_in | OE, integer::subfmex),
        op!(200, "subfzex", Integer, 1, RC | ca_in, integer::subfzex),
        op!(712, "subfzeox", Integer, 1, RC | ca_in | OE, integer::subfzex),
        op!(28, "andx", Integer, 1, RC, integer::andx),
        op!(60, "andcx", Integer, 1, RC, integer::andcx),
        op!(444, "orx", Integer, 1, RC, integer::orx),
        op!(124, "norx", Integer, 1, RC, integer::norx),
        op!(316, "xorx", Integer, 1, RC, integer::xorx),
        op!(412, "orcx", Integer, 1, RC, integer::orcx),
        op!(476, "nandx", Integer, 1, RC, integer::nandx),
        op!(284, "eqvx", Integer, 1, RC, integer::eqvx),
        op!(0, "cmp", Integer, 1, OpFlags::SET_CRN, integer::cmp),
        op!(32, "cmpl", Integer, 1, OpFlags::SET_CRN, integer::cmpl),
        op!(26, "cntlzwx", Integer, 1, RC, integer::cntlzwx),
        op!(922, "extshx", Integer, 1, RC, integer::extshx),
        op!(954, "extsbx", Integer, 1, RC, integer::extsbx),
        op!(536, "srwx", Integer, 1, RC, integer::srwx),
        op!(792, "srawx", Integer, 1, RC | CA, integer::srawx),
        op!(824, "srawix", Integer, 1, RC | CA, integer::srawix),
        op!(24, "slwx", Integer, 1, RC, integer::slwx),
        op!(54, "dcbst", DataCache, 5, LS, load_store::dcbst),
        op!(86, "dcbf", DataCache, 5, LS, load_store::dcbf),
        op!(246, "dcbtst", DataCache, 2, LS, load_store::dcbtst),
        op!(278, "dcbt", DataCache, 2, LS, load_store::dcbt),
        op!(470, "dcbi", DataCache, 5, LS | PRIV, load_store::dcbi),
        op!(758, "dcba", DataCache, 5, LS, load_store::dcba),
        op!(1014, "dcbz", DataCache, 5, LS, load_store::dcbz),
        op!(23, "lwzx", Load, 1, LS, load_store::lwzx),
        op!(55, "lwzux", Load, 1, LS, load_store::lwzux),
        op!(279, "lhzx", Load, 1, LS, load_store::lhzx),
        op!(311, "lhzux", Load, 1, LS, load_store::lhzux),
        op!(343, "lhax", Load, 1, LS, load_store::lhax),
        op!(375, "lhaux", Load, 1, LS, load_store::lhaux),
        op!(87, "lbzx", Load, 1, LS, load_store::lbzx),
        op!(119, "lbzux", Load, 1, LS, load_store::lbzux),
        op!(534, "lwbrx", Load, 1, LS, load_store::lwbrx),
        op!(790, "lhbrx", Load, 1, LS, load_store::lhbrx),
        op!(150, "stwcxd", Store, 1, LS | OpFlags::SET_CR0, load_store::stwcxd),
        op!(20, "lwarx", Load, 1, LS, load_store::lwarx),
        op!(533, "lswx", Load, 1, LS, load_store::lswx),
        op!(597, "lswi", Load, 1, LS, load_store::lswi),
        op!(151, "stwx", Store, 1, LS, load_store::stwx),
        op!(183, "stwux", Store, 1, LS, load_store::stwux),
        op!(407, "sthx", Store, 1, LS, load_store::sthx),
        op!(439, "sthux", Store, 1, LS, load_store::sthux),
        op!(215, "stbx", Store, 1, LS, load_store::stbx),
        op!(247, "stbux", Store, 1, LS, load_store::stbux),
        op!(662, "stwbrx", Store, 1, LS, load_store::stwbrx),
        op!(918, "sthbrx", Store, 1, LS, load_store::sthbrx),
        op!(661, "stswx", Store, 1, LS, load_store::stswx),
        op!(725, "stswi", Store, 1, LS, load_store::stswi),
        op!(535, "lfsx", LoadFP, 1, FP_LS, load_store::lfsx),
        op!(567, "lfsux", LoadFP, 1, FP_LS, load_store::lfsux),
        op!(599, "lfdx", LoadFP, 1, FP_LS, load_store::lfdx),
        op!(631, "lfdux", LoadFP, 1, FP_LS, load_store::lfdux),
        op!(663, "stfsx", StoreFP, 1, FP_LS, load_store::stfsx),
        op!(695, "stfsux", StoreFP, 1, FP_LS, load_store::stfsux),
        op!(727, "stfdx", StoreFP, 1, FP_LS, load_store::stfdx),
        op!(759, "stfdux", StoreFP, 1, FP_LS, load_store::stfdux),
        op!(983, "stfiwx", StoreFP, 1, FP_LS, load_store::stfiwx),
        op!(19, "mfcr", System, 1, system::mfcr),
        op!(83, "mfmsr", System, 1, PRIV, system::mfmsr),
        op!(144, "mtcrf", System, 1, system::mtcrf),
        op!(146, "mtmsr", System, 1, PRIV | OpFlags::CHECK_EXCEPTIONS, system::mtmsr),
        op!(210, "mtsr", System, 1, PRIV, system::mtsr),
        op!(242, "mtsrin", System, 1, PRIV, system::mtsrin),
        op!(339, "mfspr", SPR, 1, PRIV, system::mfspr),
        op!(467, "mtspr", SPR, 2, END | PRIV, system::mtspr),
        op!(371, "mftb", System, 1, OpFlags::TIMER, system::mftb),
        op!(512, "mcrxr", System, 1, system::mcrxr),
        op!(595, "mfsr", System, 3, PRIV, system::mfsr),
        op!(659, "mfsrin", System, 3, PRIV, system::mfsrin),
        op!(4, "tw", System, 2, END, integer::tw),
        op!(598, "sync", System, 3, system::sync),
        op!(982, "icbi", System, 4, END | LS, load_store::icbi),
        op!(310, "eciwx", System, 1, LS, load_store::eciwx),
        op!(438, "ecowx", System, 1, LS, load_store::ecowx),
        op!(854, "eieio", System, 1, system::eieio),
        op!(306, "tlbie", System, 1, PRIV, system::tlbie),
        op!(566, "tlbsync", System, 1, PRIV, system::tlbsync),
    ]
}

fn table59_ops() -> Vec<Template> {
    vec![
        op!(18, "fdivsx", SingleFP, 17, FP_DIV, float::fdivsx),
        op!(20, "fsubsx", SingleFP, 1, FP, float::fsubsx),
        op!(21, "faddsx", SingleFP, 1, FP, float::faddsx),
        op!(24, "fresx", SingleFP, 1, FP_DIV, float::fresx),
        op!(25, "fmulsx", SingleFP, 1, FP, float::fmulsx),
        op!(28, "fmsubsx", SingleFP, 1, FP, float::fmsubsx),
        op!(29, "fmaddsx", SingleFP, 1, FP, float::fmaddsx),
        op!(30, "fnmsubsx", SingleFP, 1, FP, float::fnmsubsx),
        op!(31, "fnmaddsx", SingleFP, 1, FP, float::fnmaddsx),
    ]
}

/// Table 63, indexed directly by SUBOP10
fn table63_ops() -> Vec<Template> {
    vec![
        op!(264, "fabsx", DoubleFP, 1, FP, float::fabsx),
        op!(32, "fcmpo", DoubleFP, 1, FP_COMPARE, float::fcmpo),
        op!(0, "fcmpu", DoubleFP, 1, FP_COMPARE, float::fcmpu),
        op!(14, "fctiwx", DoubleFP, 1, FP, float::fctiwx),
        op!(15, "fctiwzx", DoubleFP, 1, FP, float::fctiwzx),
        op!(72, "fmrx", DoubleFP, 1, FP, float::fmrx),
        op!(136, "fnabsx", DoubleFP, 1, FP, float::fnabsx),
        op!(40, "fnegx", DoubleFP, 1, FP, float::fnegx),
        op!(12, "frspx", DoubleFP, 1, FP, float::frspx),
        op!(64, "mcrfs", SystemFP, 1, FPU | OpFlags::SET_CRN, system::mcrfs),
        op!(583, "mffsx", SystemFP, 1, FP, system::mffsx),
        op!(70, "mtfsb0x", SystemFP, 3, FP, system::mtfsb0x),
        op!(38, "mtfsb1x", SystemFP, 3, FP, system::mtfsb1x),
        op!(134, "mtfsfix", SystemFP, 3, FP, system::mtfsfix),
        op!(711, "mtfsfx", SystemFP, 3, FP, system::mtfsfx),
    ]
}

/// Table 63 A-form group, replicated over bits 21-25
fn table63_2_ops() -> Vec<Template> {
    vec![
        op!(18, "fdivx", DoubleFP, 31, FP_DIV, float::fdivx),
        op!(20, "fsubx", DoubleFP, 1, FP, float::fsubx),
        op!(21, "faddx", DoubleFP, 1, FP, float::faddx),
        op!(23, "fselx", DoubleFP, 1, FP, float::fselx),
        op!(25, "fmulx", DoubleFP, 1, FP, float::fmulx),
        op!(26, "frsqrtex", DoubleFP, 1, FP_DIV, float::frsqrtex),
        op!(28, "fmsubx", DoubleFP, 1, FP, float::fmsubx),
        op!(29, "fmaddx", DoubleFP, 1, FP, float::fmaddx),
        op!(30, "fnmsubx", DoubleFP, 1, FP, float::fnmsubx),
        op!(31, "fnmaddx", DoubleFP, 1, FP, float::fnmaddx),
    ]
}

/// The built dispatch tables
pub struct Tables {
    ops: Vec<OpInfo>,
    unknown: u16,
    primary: [PrimarySlot; 64],
    table4: [u16; 1024],
    table19: [u16; 1024],
    table31: [u16; 1024],
    table59: [u16; 32],
    table63: [u16; 1024],
}

impl Tables {
    fn build() -> Self {
        let mut ops: Vec<OpInfo> = Vec::new();
        let mut add = |tpl: &Template| -> u16 {
            let id = ops.len();
            ops.push(OpInfo {
                id,
                name: tpl.name,
                op_type: tpl.op_type,
                flags: tpl.flags,
                num_cycles: tpl.num_cycles,
                handler: tpl.handler,
            });
            id as u16
        };

        let unknown = add(&op!(
            0,
            "unknown_instruction",
            Unknown,
            0,
            END,
            interpreter::unknown_instruction
        ));

        let mut primary = [PrimarySlot::Op(unknown); 64];
        primary[4] = PrimarySlot::Table(SubTable::Table4);
        primary[19] = PrimarySlot::Table(SubTable::Table19);
        primary[31] = PrimarySlot::Table(SubTable::Table31);
        primary[59] = PrimarySlot::Table(SubTable::Table59);
        primary[63] = PrimarySlot::Table(SubTable::Table63);
        for tpl in &primary_ops() {
            assert_eq!(
                primary[tpl.opcode],
                PrimarySlot::Op(unknown),
                "primary opcode {} defined twice",
                tpl.opcode
            );
            primary[tpl.opcode] = PrimarySlot::Op(add(tpl));
        }

        fn place(table: &mut [u16], index: usize, id: u16, unknown: u16, name: &str) {
            assert_eq!(table[index], unknown, "{} overlaps slot {}", name, index);
            table[index] = id;
        }

        let mut table4 = [unknown; 1024];
        for tpl in &table4_2_ops() {
            let id = add(tpl);
            for i in 0..32 {
                place(&mut table4, (i << 5) + tpl.opcode, id, unknown, tpl.name);
            }
        }
        for tpl in &table4_3_ops() {
            let id = add(tpl);
            for i in 0..16 {
                place(&mut table4, (i << 6) + tpl.opcode, id, unknown, tpl.name);
            }
        }
        for tpl in &table4_ops() {
            let id = add(tpl);
            place(&mut table4, tpl.opcode, id, unknown, tpl.name);
        }

        let mut table19 = [unknown; 1024];
        for tpl in &table19_ops() {
            let id = add(tpl);
            place(&mut table19, tpl.opcode, id, unknown, tpl.name);
        }

        let mut table31 = [unknown; 1024];
        for tpl in &table31_ops() {
            let id = add(tpl);
            place(&mut table31, tpl.opcode, id, unknown, tpl.name);
        }

        let mut table59 = [unknown; 32];
        for tpl in &table59_ops() {
            let id = add(tpl);
            place(&mut table59, tpl.opcode, id, unknown, tpl.name);
        }

        let mut table63 = [unknown; 1024];
        for tpl in &table63_ops() {
            let id = add(tpl);
            place(&mut table63, tpl.opcode, id, unknown, tpl.name);
        }
        for tpl in &table63_2_ops() {
            let id = add(tpl);
            for i in 0..32 {
                place(&mut table63, (i << 5) + tpl.opcode, id, unknown, tpl.name);
            }
        }

        tracing::debug!("Built dispatch tables with {} opcodes", ops.len());

        Self {
            ops,
            unknown,
            primary,
            table4,
            table19,
            table31,
            table59,
            table63,
        }
    }

    #[inline]
    fn resolve_id(&self, inst: Instruction) -> u16 {
        match self.primary[inst.opcd() as usize] {
            PrimarySlot::Op(id) => id,
            PrimarySlot::Table(SubTable::Table4) => self.table4[inst.subop10()],
            PrimarySlot::Table(SubTable::Table19) => self.table19[inst.subop10()],
            PrimarySlot::Table(SubTable::Table31) => self.table31[inst.subop10()],
            PrimarySlot::Table(SubTable::Table59) => self.table59[inst.subop5()],
            PrimarySlot::Table(SubTable::Table63) => self.table63[inst.subop10()],
        }
    }
}

static TABLES: Lazy<Tables> = Lazy::new(Tables::build);

/// Force the one-time table build
pub fn init() {
    Lazy::force(&TABLES);
}

/// Descriptor and handler for an instruction word. Total: unknown words
/// resolve to the unknown instruction descriptor.
#[inline]
pub fn resolve(inst: Instruction) -> &'static OpInfo {
    let tables = &*TABLES;
    &tables.ops[tables.resolve_id(inst) as usize]
}

/// Primary table slot for an opcode
pub fn primary_slot(opcd: u32) -> PrimarySlot {
    TABLES.primary[(opcd & 0x3F) as usize]
}

/// The unknown instruction descriptor
pub fn unknown_op() -> &'static OpInfo {
    let tables = &*TABLES;
    &tables.ops[tables.unknown as usize]
}

/// Every descriptor, indexed by [`OpInfo::id`]
pub fn all_ops() -> &'static [OpInfo] {
    &TABLES.ops
}

pub fn is_valid_instruction(inst: Instruction) -> bool {
    resolve(inst).op_type != OpType::Unknown
}

pub fn instruction_name(inst: Instruction) -> &'static str {
    resolve(inst).name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_build_without_overlap() {
        init();
        assert_eq!(unknown_op().name, "unknown_instruction");
        assert_eq!(unknown_op().id, 0);
        for (i, op) in all_ops().iter().enumerate() {
            assert_eq!(op.id, i);
        }
    }

    #[test]
    fn test_subtable_markers() {
        assert_eq!(primary_slot(4), PrimarySlot::Table(SubTable::Table4));
        assert_eq!(primary_slot(19), PrimarySlot::Table(SubTable::Table19));
        assert_eq!(primary_slot(31), PrimarySlot::Table(SubTable::Table31));
        assert_eq!(primary_slot(59), PrimarySlot::Table(SubTable::Table59));
        assert_eq!(primary_slot(63), PrimarySlot::Table(SubTable::Table63));
        assert!(matches!(primary_slot(14), PrimarySlot::Op(_)));
    }

    #[test]
    fn test_resolve_known_words() {
        assert_eq!(instruction_name(Instruction(0x3860_0005)), "addi");
        assert_eq!(instruction_name(Instruction(0x7C64_2A14)), "addx");
        assert_eq!(instruction_name(Instruction(0x7C64_2E14)), "addox");
        assert_eq!(instruction_name(Instruction(0xFC22_182A)), "faddx");
        assert_eq!(instruction_name(Instruction(0x4E80_0020)), "bclrx");
        assert_eq!(instruction_name(Instruction(0x4400_0002)), "sc");
        assert_eq!(instruction_name(Instruction(0xEC22_182A)), "faddsx");
        // ps_add f1, f2, f3
        assert_eq!(instruction_name(Instruction(0x1022_182A)), "ps_add");
        // fmadd with a non-zero FC lands in the replicated slots
        assert_eq!(instruction_name(Instruction(0xFC22_193A)), "fmaddx");
        assert_eq!(instruction_name(Instruction(0xFC20_1018)), "frspx");
    }

    #[test]
    fn test_unknown_words() {
        for word in [0x0000_0000u32, 0x0400_0000, 0x7C00_0002, 0xEC00_0000, 0xFC00_0002] {
            let inst = Instruction(word);
            assert_eq!(resolve(inst).op_type, OpType::Unknown, "0x{:08x}", word);
            assert!(!is_valid_instruction(inst));
        }
        assert!(is_valid_instruction(Instruction(0x6000_0000)));
    }

    #[test]
    fn test_dispatch_is_total() {
        // Every primary opcode with every secondary key
        for opcd in 0u32..64 {
            for sub in 0u32..1024 {
                let inst = Instruction((opcd << 26) | (sub << 1));
                let info = resolve(inst);
                assert!(info.id < all_ops().len());
                let _handler: Handler = info.handler;
            }
        }
    }

    #[test]
    fn test_fpu_flags() {
        assert!(resolve(Instruction(0xFC22_182A)).uses_fpu());
        assert!(resolve(Instruction(0xC020_0000)).uses_fpu());
        assert!(!resolve(Instruction(0x3860_0005)).uses_fpu());
        assert!(resolve(Instruction(0x4800_0000)).ends_block());
    }

    #[test]
    fn test_side_effect_flags() {
        // mtmsr r3 ends the batch so newly enabled interrupts are taken
        let mtmsr = resolve(Instruction(0x7C60_0124));
        assert!(mtmsr.flags.contains(OpFlags::CHECK_EXCEPTIONS));
        assert!(mtmsr.ends_block());
        // adde r3, r4, r5
        assert!(resolve(Instruction(0x7C64_2914)).flags.contains(OpFlags::READ_CA));
        // fdiv f1, f2, f3
        assert!(resolve(Instruction(0xFC22_1824)).flags.contains(OpFlags::FLOAT_DIV));
        // mftb r3
        assert!(resolve(Instruction(0x7C6C_42E6)).flags.contains(OpFlags::TIMER));
        // lwz r3, 0(r4)
        assert!(resolve(Instruction(0x8064_0000)).flags.contains(OpFlags::LOADSTORE));
    }
}
