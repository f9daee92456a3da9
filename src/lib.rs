//! qrk: a small dynamically-typed expression language.
//!
//! Source text flows through the scanner and parser into an AST, which can
//! be executed two ways:
//!
//! - **Tree-walk interpreter**: direct AST evaluation
//! - **Bytecode VM**: a single-pass compiler feeding a stack machine
//!
//! Both back ends share the value model, the built-in registry and the
//! observable semantics; the VM is the default.

pub mod ast;
pub mod bytecode;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod repl;
pub mod stdlib;
pub mod value;

use std::path::Path;

use error::QrkError;
use value::Value;

/// Source files must carry this extension to be runnable.
pub const FILE_EXTENSION: &str = ".qrk";

/// Which back end executes a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Tree-walking interpreter.
    TreeWalk,
    /// Bytecode virtual machine.
    #[default]
    Bytecode,
}

/// Parse source code into an AST without executing it.
pub fn parse(source: &str) -> Result<ast::Program, QrkError> {
    let tokens = lexer::Scanner::new(source).scan_tokens()?;
    let program = parser::Parser::new(tokens).parse()?;
    Ok(program)
}

/// Compile source code to bytecode without executing it.
pub fn compile(source: &str) -> Result<bytecode::Bytecode, QrkError> {
    let program = parse(source)?;
    let mut compiler = bytecode::Compiler::new();
    compiler.compile(&program)?;
    Ok(compiler.bytecode())
}

/// Run a program with the default back end and produce its terminal value.
pub fn run(source: &str) -> Result<Value, QrkError> {
    run_with_options(source, ExecutionMode::default(), false)
}

/// Run a program with an explicit back end and optional disassembly dump.
pub fn run_with_options(
    source: &str,
    mode: ExecutionMode,
    disassemble: bool,
) -> Result<Value, QrkError> {
    let program = parse(source)?;

    match mode {
        ExecutionMode::TreeWalk => {
            let mut interpreter = interpreter::Interpreter::new();
            Ok(interpreter.eval_program(&program))
        }
        ExecutionMode::Bytecode => {
            let mut compiler = bytecode::Compiler::new();
            compiler.compile(&program)?;
            let bytecode = compiler.bytecode();

            if disassemble {
                bytecode::print_disassembly(&bytecode.instructions);
                println!("---");
            }

            let mut vm = bytecode::Vm::new(bytecode);
            vm.run()?;
            Ok(vm.last_popped().clone())
        }
    }
}

/// Run a `.qrk` source file. Any other extension is rejected.
pub fn run_file(path: &Path, mode: ExecutionMode, disassemble: bool) -> Result<Value, QrkError> {
    let display = path.display().to_string();
    if !display.ends_with(FILE_EXTENSION) {
        return Err(QrkError::UnsupportedFile(display));
    }

    let source = std::fs::read_to_string(path)?;
    run_with_options(&source, mode, disassemble)
}

/// Disassemble compiled bytecode to a string.
pub fn disassemble(bytecode: &bytecode::Bytecode) -> String {
    bytecode::disassemble(&bytecode.instructions)
}
