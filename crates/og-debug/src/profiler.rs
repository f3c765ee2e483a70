//! Opcode profiler
//!
//! Turns the interpreter's per-opcode run counters into hotspot tables and
//! a breakdown by side effect (memory access, carry use, slow divides).
//! Counting must be enabled on the interpreter (`count_instructions`) for
//! the profile to be non-empty.

use std::collections::HashMap;
use std::fmt::Write;

use og_cpu::tables::{self, OpFlags, OpType};
use og_cpu::Interpreter;

/// One opcode's share of the executed instructions
#[derive(Debug, Clone, PartialEq)]
pub struct OpcodeProfile {
    pub name: &'static str,
    pub op_type: OpType,
    pub flags: OpFlags,
    pub count: u64,
    /// Percentage of all counted instructions
    pub percentage: f64,
}

/// Side-effect classes reported by [`Profiler::by_effect`]
pub const EFFECTS: [(&str, OpFlags); 8] = [
    ("memory", OpFlags::LOADSTORE),
    ("cr write", OpFlags::SET_CR0.union(OpFlags::SET_CRN)),
    ("carry in", OpFlags::READ_CA),
    ("carry out", OpFlags::SET_CA),
    ("fp divide", OpFlags::FLOAT_DIV),
    ("privileged", OpFlags::PROGRAM_EXCEPTION),
    ("time base", OpFlags::TIMER),
    ("msr change", OpFlags::CHECK_EXCEPTIONS),
];

/// Snapshot of opcode counters
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    entries: Vec<OpcodeProfile>,
    total: u64,
}

impl Profiler {
    /// Take a snapshot of the interpreter's counters
    pub fn capture(interpreter: &Interpreter) -> Self {
        Self::from_counts(&interpreter.instruction_counts())
    }

    /// Build from `(name, count)` pairs as returned by
    /// [`Interpreter::instruction_counts`]
    pub fn from_counts(counts: &[(&'static str, u64)]) -> Self {
        let descriptors: HashMap<&'static str, (OpType, OpFlags)> = tables::all_ops()
            .iter()
            .map(|op| (op.name, (op.op_type, op.flags)))
            .collect();
        let total: u64 = counts.iter().map(|(_, count)| count).sum();

        let mut entries: Vec<OpcodeProfile> = counts
            .iter()
            .map(|&(name, count)| {
                let (op_type, flags) = descriptors
                    .get(name)
                    .copied()
                    .unwrap_or((OpType::Unknown, OpFlags::empty()));
                OpcodeProfile {
                    name,
                    op_type,
                    flags,
                    count,
                    percentage: if total == 0 {
                        0.0
                    } else {
                        count as f64 * 100.0 / total as f64
                    },
                }
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then(a.name.cmp(b.name)));

        Self { entries, total }
    }

    /// Total instructions counted
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Most executed opcodes first
    pub fn entries(&self) -> &[OpcodeProfile] {
        &self.entries
    }

    /// The `n` most executed opcodes
    pub fn hotspots(&self, n: usize) -> &[OpcodeProfile] {
        &self.entries[..n.min(self.entries.len())]
    }

    /// Counts summed per opcode category, largest first
    pub fn by_type(&self) -> Vec<(OpType, u64)> {
        let mut sums: Vec<(OpType, u64)> = Vec::new();
        for entry in &self.entries {
            match sums.iter_mut().find(|(ty, _)| *ty == entry.op_type) {
                Some((_, sum)) => *sum += entry.count,
                None => sums.push((entry.op_type, entry.count)),
            }
        }
        sums.sort_by(|a, b| b.1.cmp(&a.1));
        sums
    }

    /// Instructions executed whose descriptor carries any of `flags`
    pub fn count_with(&self, flags: OpFlags) -> u64 {
        self.entries
            .iter()
            .filter(|entry| entry.flags.intersects(flags))
            .map(|entry| entry.count)
            .sum()
    }

    /// Non-zero counts per [`EFFECTS`] class
    pub fn by_effect(&self) -> Vec<(&'static str, u64)> {
        EFFECTS
            .iter()
            .map(|&(name, flags)| (name, self.count_with(flags)))
            .filter(|&(_, count)| count > 0)
            .collect()
    }

    /// Plain text table of the top `n` opcodes followed by the side-effect
    /// breakdown
    pub fn report(&self, n: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} instructions", self.total);
        for entry in self.hotspots(n) {
            let _ = writeln!(
                out,
                "{:<14} {:>12} {:>6.2}%",
                entry.name, entry.count, entry.percentage
            );
        }
        for (name, count) in self.by_effect() {
            let _ = writeln!(out, "[{}] {}", name, count);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use og_core::config::CpuConfig;
    use og_cpu::{CpuBackend, PowerPcState};
    use og_memory::{FlatMemory, Memory};

    #[test]
    fn test_from_counts() {
        let profiler = Profiler::from_counts(&[("addi", 30), ("lwz", 10), ("bcx", 60)]);
        assert_eq!(profiler.total(), 100);
        assert_eq!(profiler.entries()[0].name, "bcx");
        assert_eq!(profiler.entries()[0].op_type, OpType::Branch);
        assert_eq!(profiler.entries()[0].percentage, 60.0);
        assert_eq!(profiler.hotspots(2).len(), 2);
        assert_eq!(profiler.hotspots(10).len(), 3);

        let by_type = profiler.by_type();
        assert_eq!(by_type[0], (OpType::Branch, 60));
        assert_eq!(by_type[1], (OpType::Integer, 30));
    }

    #[test]
    fn test_side_effect_breakdown() {
        let profiler = Profiler::from_counts(&[
            ("lwz", 40),
            ("stw", 20),
            ("addex", 5),
            ("addcx", 3),
            ("fdivx", 2),
            ("mftb", 1),
            ("mtmsr", 1),
            ("cmpi", 7),
        ]);
        assert_eq!(profiler.count_with(OpFlags::LOADSTORE), 60);
        assert_eq!(profiler.count_with(OpFlags::READ_CA), 5);
        assert_eq!(profiler.count_with(OpFlags::SET_CA), 8);
        assert_eq!(profiler.count_with(OpFlags::FLOAT_DIV), 2);

        let effects = profiler.by_effect();
        assert_eq!(effects[0], ("memory", 60));
        assert!(effects.contains(&("cr write", 7)));
        assert!(effects.contains(&("time base", 1)));
        assert!(effects.contains(&("msr change", 1)));
        assert!(effects.contains(&("privileged", 1)));

        let report = profiler.report(2);
        assert!(report.contains("[memory] 60"));
        assert!(report.contains("[fp divide] 2"));
    }

    #[test]
    fn test_empty_profile() {
        let profiler = Profiler::from_counts(&[]);
        assert_eq!(profiler.total(), 0);
        assert!(profiler.hotspots(5).is_empty());
        assert_eq!(profiler.report(5), "0 instructions\n");
    }

    #[test]
    fn test_capture_interpreter() {
        let memory = FlatMemory::new();
        // li r3, 0; addi r3, r3, 1; addi r3, r3, 1
        for (i, word) in [0x3860_0000u32, 0x3863_0001, 0x3863_0001].iter().enumerate() {
            memory.write_u32(0x8000_3000 + 4 * i as u32, *word).unwrap();
        }
        let config = CpuConfig {
            count_instructions: true,
            ..CpuConfig::default()
        };
        let mut interpreter = Interpreter::from_config(memory, &config);
        let mut state = PowerPcState::new();
        state.pc = 0x8000_3000;
        for _ in 0..3 {
            interpreter.single_step(&mut state).unwrap();
        }

        let profiler = Profiler::capture(&interpreter);
        assert_eq!(profiler.total(), 3);
        assert_eq!(profiler.entries()[0].name, "addi");
        assert_eq!(profiler.entries()[0].count, 3);
        assert!(profiler.report(1).contains("addi"));
    }
}
