use bfvm::{
    ir::{compile, compile_with, Optimizations, Program},
    side_effects::BufferedTerminal,
    targets::{self, translate},
    vm::*,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::atomic::AtomicBool;

const HELLO_WORLD: &str = "++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.";

/// Three nested loops of 64 iterations each, clearing cells on the way out.
const NESTED_LOOPS: &str = "++++++++[>++++++++[>++++++++[>++++++++[>+>+<<-]<-]<-]<-]>>>>[-]>[-]";

fn run(program: &Program, width: CellWidth) -> String {
    let config = Config {
        cell_width: width,
        ..Config::default()
    };
    let mut interpreter = Interpreter::with_config(BufferedTerminal::with_input(""), config);
    interpreter.run(program);
    interpreter.terminal().text()
}

fn bench_interpreter(c: &mut Criterion) {
    let mut group = c.benchmark_group("Interpreter");
    group.sample_size(20);

    group.bench_function("Hello world (compile)", |b| {
        b.iter(|| compile(black_box(HELLO_WORLD)).unwrap())
    });

    let hello = compile(HELLO_WORLD).unwrap();
    group.bench_function("Hello world (run)", |b| {
        b.iter(|| run(black_box(&hello), CellWidth::Eight))
    });

    let nested = compile(NESTED_LOOPS).unwrap();
    let naive = compile_with(NESTED_LOOPS, Optimizations::none()).unwrap();
    for width in [CellWidth::Eight, CellWidth::Sixteen, CellWidth::ThirtyTwo] {
        group.bench_function(format!("Nested loops ({width}, optimized)"), |b| {
            b.iter(|| run(black_box(&nested), width))
        });
    }
    group.bench_function("Nested loops (8-bit, naive)", |b| {
        b.iter(|| run(black_box(&naive), CellWidth::Eight))
    });

    group.bench_function("Nested loops (translate to C)", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            translate(
                black_box(&nested),
                &targets::C,
                &Config::default(),
                &mut out,
                &AtomicBool::new(false),
                &mut |_: f32| {},
            )
            .unwrap();
            out
        })
    });

    group.finish();
}

criterion_group!(benches, bench_interpreter);
criterion_main!(benches);
