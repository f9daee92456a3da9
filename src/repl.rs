//! Interactive shell for qrk.

use std::io::BufRead;
use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::ast::Program;
use crate::bytecode::vm::GLOBALS_SIZE;
use crate::bytecode::{Compiler, SymbolTable, Vm};
use crate::error::QrkError;
use crate::interpreter::Interpreter;
use crate::lexer::Scanner;
use crate::parser::Parser;
use crate::value::Value;
use crate::ExecutionMode;

const HISTORY_FILE: &str = ".qrk_history";
const PROMPT: &str = "> ";

const WELCOME: &str = r#"
   ____ ______
  / __ `/ ___/ /_
 / /_/ / /  /  '_/
 \__, /_/  /_/\_\
   /_/
"#;

/// Compiler and VM state carried across REPL lines: the symbol table and
/// constant pool feed the next compilation, the globals array feeds the
/// next VM, so `let` bindings from earlier lines stay visible.
struct BytecodeSession {
    symbol_table: SymbolTable,
    constants: Vec<Value>,
    globals: Vec<Value>,
}

impl BytecodeSession {
    fn new() -> Self {
        // A throwaway compiler seeds the symbol table with the stdlib
        // registrations.
        let (symbol_table, constants) = Compiler::new().into_state();

        Self {
            symbol_table,
            constants,
            globals: vec![Value::Null; GLOBALS_SIZE],
        }
    }

    fn eval(&mut self, program: &Program) -> Result<Value, QrkError> {
        let symbol_table = std::mem::take(&mut self.symbol_table);
        let constants = std::mem::take(&mut self.constants);

        let mut compiler = Compiler::with_state(symbol_table, constants);
        let compiled = compiler.compile(program);
        let bytecode = compiler.bytecode();

        // State comes back even when compilation failed, so the session
        // survives the error.
        let (symbol_table, constants) = compiler.into_state();
        self.symbol_table = symbol_table;
        self.constants = constants;
        compiled?;

        let globals = std::mem::take(&mut self.globals);
        let mut vm = Vm::with_global_store(bytecode, globals);
        let outcome = vm.run();
        let value = vm.last_popped().clone();
        self.globals = vm.into_globals();
        outcome?;

        Ok(value)
    }
}

enum Engine {
    TreeWalk(Interpreter),
    Bytecode(BytecodeSession),
}

impl Engine {
    fn new(mode: ExecutionMode) -> Self {
        match mode {
            ExecutionMode::TreeWalk => Engine::TreeWalk(Interpreter::new()),
            ExecutionMode::Bytecode => Engine::Bytecode(BytecodeSession::new()),
        }
    }

    fn eval(&mut self, program: &Program) -> Result<Value, QrkError> {
        match self {
            Engine::TreeWalk(interpreter) => Ok(interpreter.eval_program(program)),
            Engine::Bytecode(session) => session.eval(program),
        }
    }
}

/// Run the REPL until EOF or interrupt.
pub fn start(mode: ExecutionMode) {
    print!("{}", WELCOME);

    let mut engine = Engine::new(mode);

    let Ok(mut editor) = DefaultEditor::new() else {
        run_basic(&mut engine);
        return;
    };

    let history_path = history_path();
    if let Some(path) = &history_path {
        let _ = editor.load_history(path);
    }

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);

                eval_line(&mut engine, line);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("readline error: {}", err);
                break;
            }
        }
    }

    if let Some(path) = &history_path {
        let _ = editor.save_history(path);
    }
}

/// Plain stdin loop for environments where line editing is unavailable.
fn run_basic(engine: &mut Engine) {
    use std::io::Write;

    let stdin = std::io::stdin();
    loop {
        print!("{}", PROMPT);
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = line.trim();
                if !line.is_empty() {
                    eval_line(engine, line);
                }
            }
        }
    }
}

fn eval_line(engine: &mut Engine, line: &str) {
    let tokens = match Scanner::new(line).scan_tokens() {
        Ok(tokens) => tokens,
        Err(err) => {
            println!("{}", err);
            return;
        }
    };

    let program = match Parser::new(tokens).parse() {
        Ok(program) => program,
        Err(errors) => {
            println!("Syntax error!");
            for err in &errors.0 {
                println!("\t{}", err);
            }
            return;
        }
    };

    match engine.eval(&program) {
        Ok(value) => println!("{}", value),
        Err(err) => println!("{}", err),
    }
}

fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(HISTORY_FILE))
}
