//! Opcode dispatch and interpreter throughput

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use og_core::config::CpuConfig;
use og_cpu::decoder::Instruction;
use og_cpu::{tables, Cpu};
use og_memory::{FlatMemory, Memory};

const ENTRY: u32 = 0x8000_3100;

const MIX: [u32; 8] = [
    0x7C63_2214, // add
    0x5483_463E, // rlwinm
    0x8065_0000, // lwz
    0xFC61_102A, // fadd
    0x1041_082A, // ps_add
    0x4200_FFF8, // bdnz
    0x7C7F_42A6, // mfspr
    0x0000_0000, // unknown
];

fn bench_resolve(c: &mut Criterion) {
    tables::init();
    c.bench_function("resolve_mix", |b| {
        b.iter(|| {
            for word in MIX {
                black_box(tables::resolve(Instruction(black_box(word))));
            }
        })
    });
}

fn bench_counted_loop(c: &mut Criterion) {
    let memory = FlatMemory::new();
    let program = [
        0x3860_0000, // li r3, 0
        0x3C80_0001, // lis r4, 1
        0x7C89_03A6, // mtctr r4
        0x3863_0001, // addi r3, r3, 1
        0x4200_FFFC, // bdnz -4
        0x4800_0000, // b .
    ];
    for (i, word) in program.iter().enumerate() {
        let _ = memory.write_u32(ENTRY + 4 * i as u32, *word);
    }
    let mut cpu = Cpu::new(memory, &CpuConfig::default());

    c.bench_function("interpreter_loop_64k", |b| {
        b.iter(|| {
            cpu.reset();
            cpu.state_mut().pc = ENTRY;
            cpu.state_mut().downcount = 200_000;
            let _ = black_box(cpu.run());
        })
    });
}

criterion_group!(benches, bench_resolve, bench_counted_loop);
criterion_main!(benches);
