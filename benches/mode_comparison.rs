//! Benchmark comparing execution modes: tree-walk vs bytecode VM.
//!
//! Run with: cargo bench --bench mode_comparison

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qrk::bytecode::{Compiler, Vm};
use qrk::interpreter::Interpreter;
use qrk::lexer::Scanner;
use qrk::parser::Parser;

/// Parse source code into an AST.
fn parse(source: &str) -> qrk::ast::Program {
    let tokens = Scanner::new(source).scan_tokens().expect("lexer error");
    Parser::new(tokens).parse().expect("parser error")
}

/// Run with the tree-walking interpreter.
fn run_tree_walk(source: &str) {
    let program = parse(source);
    let mut interpreter = Interpreter::new();
    interpreter.eval_program(&program);
}

/// Run with the bytecode VM.
fn run_bytecode(source: &str) {
    let program = parse(source);
    let mut compiler = Compiler::new();
    compiler.compile(&program).expect("compile error");
    let mut vm = Vm::new(compiler.bytecode());
    vm.run().expect("runtime error");
}

/// Recursive fibonacci, dominated by function-call overhead.
fn fibonacci_recursive_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("fib_recursive");

    let source = r#"
let fib = fn(n) {
    if (n < 2) { n } else { fib(n - 1) + fib(n - 2) }
};
fib(18);
"#;

    group.bench_function("tree_walk", |b| b.iter(|| run_tree_walk(black_box(source))));
    group.bench_function("bytecode", |b| b.iter(|| run_bytecode(black_box(source))));

    group.finish();
}

/// Arithmetic over collections: array building plus indexing.
fn collections_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("collections");

    let source = r#"
let table = {1: 10, 2: 20, 3: 30};
let row = [1, 2, 3, 4, 5, 6, 7, 8];
let pick = fn(i) { table[row[i]] };
pick(0);
pick(1);
pick(2);
"#;

    group.bench_function("tree_walk", |b| b.iter(|| run_tree_walk(black_box(source))));
    group.bench_function("bytecode", |b| b.iter(|| run_bytecode(black_box(source))));

    group.finish();
}

criterion_group!(benches, fibonacci_recursive_comparison, collections_comparison);
criterion_main!(benches);
