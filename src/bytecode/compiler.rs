//! Single-pass compiler from the AST to bytecode.

use std::rc::Rc;

use crate::ast::{BlockStatement, Expression, Program, Statement};
use crate::bytecode::instruction::{make, Opcode};
use crate::bytecode::symbol_table::{SymbolScope, SymbolTable};
use crate::error::CompileError;
use crate::stdlib;
use crate::value::{CompiledFunction, Value};

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// The product of a compilation: a flat instruction stream plus the constant
/// pool it indexes into. This is what the VM executes.
#[derive(Debug, Clone, PartialEq)]
pub struct Bytecode {
    pub instructions: Vec<u8>,
    pub constants: Vec<Value>,
}

/// Position and opcode of an already-emitted instruction, kept for the
/// peephole edits the compiler performs on branch tails.
#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

/// Per-function compilation state. The main program compiles in the base
/// scope; every function literal pushes a fresh one.
#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Vec<u8>,
    last_instruction: Option<EmittedInstruction>,
    prev_instruction: Option<EmittedInstruction>,
}

/// The bytecode compiler.
pub struct Compiler {
    constants: Vec<Value>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
    scope_index: usize,
}

impl Compiler {
    pub fn new() -> Self {
        let mut symbol_table = SymbolTable::new();
        for (index, builtin) in stdlib::BUILTINS.iter().enumerate() {
            symbol_table.define_stdlib(index, builtin.name);
        }

        Self {
            constants: Vec::new(),
            symbol_table,
            scopes: vec![CompilationScope::default()],
            scope_index: 0,
        }
    }

    /// A compiler that continues from an earlier run's symbol table and
    /// constant pool. The REPL uses this to keep bindings across lines.
    pub fn with_state(symbol_table: SymbolTable, constants: Vec<Value>) -> Self {
        let mut compiler = Self::new();
        compiler.symbol_table = symbol_table;
        compiler.constants = constants;

        compiler
    }

    /// Hand the symbol table and constant pool back for the next run.
    pub fn into_state(self) -> (SymbolTable, Vec<Value>) {
        (self.symbol_table, self.constants)
    }

    pub fn compile(&mut self, program: &Program) -> CompileResult<()> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }

        Ok(())
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.current_instructions().to_vec(),
            constants: self.constants.clone(),
        }
    }

    fn compile_statement(&mut self, statement: &Statement) -> CompileResult<()> {
        match statement {
            Statement::Expression { value } => {
                self.compile_expression(value)?;
                // An expression statement's value cannot be used by anything
                // later; drop it.
                self.emit(Opcode::Pop, &[]);
            }

            Statement::Let { name, value } => {
                self.compile_expression(value)?;

                let symbol = self.symbol_table.define(name);
                match symbol.scope {
                    SymbolScope::Global => {
                        self.emit(Opcode::SetGlobal, &[symbol.index]);
                    }
                    _ => {
                        self.emit(Opcode::SetLocal, &[symbol.index]);
                    }
                }
            }

            Statement::Assign { name, value } => {
                let symbol = self
                    .symbol_table
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;

                self.compile_expression(value)?;

                match symbol.scope {
                    SymbolScope::Global => {
                        self.emit(Opcode::SetGlobal, &[symbol.index]);
                    }
                    SymbolScope::Local => {
                        self.emit(Opcode::SetLocal, &[symbol.index]);
                    }
                    SymbolScope::Stdlib => {
                        return Err(CompileError::CannotAssign(name.clone()));
                    }
                }
            }

            Statement::Return { value } => {
                self.compile_expression(value)?;
                self.emit(Opcode::ReturnValue, &[]);
            }
        }

        Ok(())
    }

    fn compile_block(&mut self, block: &BlockStatement) -> CompileResult<()> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }

        Ok(())
    }

    fn compile_expression(&mut self, expression: &Expression) -> CompileResult<()> {
        match expression {
            Expression::IntegerLiteral(value) => {
                let index = self.add_constant(Value::Integer(*value));
                self.emit(Opcode::Constant, &[index]);
            }

            Expression::StringLiteral(value) => {
                let index = self.add_constant(Value::Str(Rc::new(value.clone())));
                self.emit(Opcode::Constant, &[index]);
            }

            Expression::Boolean(value) => {
                if *value {
                    self.emit(Opcode::True, &[]);
                } else {
                    self.emit(Opcode::False, &[]);
                }
            }

            Expression::Identifier(name) => {
                let symbol = self
                    .symbol_table
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;

                match symbol.scope {
                    SymbolScope::Global => {
                        self.emit(Opcode::GetGlobal, &[symbol.index]);
                    }
                    SymbolScope::Local => {
                        self.emit(Opcode::GetLocal, &[symbol.index]);
                    }
                    SymbolScope::Stdlib => {
                        self.emit(Opcode::GetStdlib, &[symbol.index]);
                    }
                }
            }

            Expression::Prefix { operator, right } => {
                self.compile_expression(right)?;

                match operator.as_str() {
                    "!" => self.emit(Opcode::Bang, &[]),
                    "-" => self.emit(Opcode::Minus, &[]),
                    _ => return Err(CompileError::UnknownPrefixOperator(operator.clone())),
                };
            }

            Expression::Infix {
                left,
                operator,
                right,
            } => {
                // There is no less-than opcode: `a < b` compiles as `b > a`.
                if operator == "<" {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(Opcode::GreaterThan, &[]);
                    return Ok(());
                }

                self.compile_expression(left)?;
                self.compile_expression(right)?;

                match operator.as_str() {
                    "+" => self.emit(Opcode::Add, &[]),
                    "-" => self.emit(Opcode::Sub, &[]),
                    "*" => self.emit(Opcode::Mul, &[]),
                    "/" => self.emit(Opcode::Div, &[]),
                    "==" => self.emit(Opcode::Equal, &[]),
                    "!=" => self.emit(Opcode::NotEqual, &[]),
                    ">" => self.emit(Opcode::GreaterThan, &[]),
                    "&&" => self.emit(Opcode::And, &[]),
                    "||" => self.emit(Opcode::Or, &[]),
                    _ => return Err(CompileError::UnknownInfixOperator(operator.clone())),
                };
            }

            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_expression(condition)?;

                // Placeholder target; patched once the consequence is laid out.
                let goto_else = self.emit(Opcode::GotoNotTruthy, &[u16::MAX as usize]);

                self.compile_branch(consequence)?;

                // Last instruction of the consequence, jumping over the else
                // branch.
                let skip_else = self.emit(Opcode::Goto, &[u16::MAX as usize]);

                let else_start = self.current_instructions().len();
                self.replace_operand(goto_else, else_start);

                match alternative {
                    Some(alternative) => self.compile_branch(alternative)?,
                    None => {
                        self.emit(Opcode::Null, &[]);
                    }
                }

                let else_end = self.current_instructions().len();
                self.replace_operand(skip_else, else_end);
            }

            Expression::ArrayLiteral(elements) => {
                for element in elements {
                    self.compile_expression(element)?;
                }

                self.emit(Opcode::Array, &[elements.len()]);
            }

            Expression::HashMapLiteral(pairs) => {
                // Emission order must not depend on source order, so the
                // instruction stream for a literal is reproducible: sort
                // keys by their source string form.
                let mut sorted: Vec<&(Expression, Expression)> = pairs.iter().collect();
                sorted.sort_by_key(|(key, _)| key.to_string());

                for (key, value) in sorted {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }

                self.emit(Opcode::HashMap, &[pairs.len() * 2]);
            }

            Expression::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[]);
            }

            Expression::FuncLiteral {
                name,
                parameters,
                body,
            } => {
                // A named literal's symbol must exist before its body
                // compiles, so recursive calls resolve.
                if let Some(name) = name {
                    self.symbol_table.define(name);
                }

                self.enter_scope();

                for parameter in parameters {
                    self.symbol_table.define(parameter);
                }

                self.compile_block(body)?;

                // An expression tail becomes the return value; a body that
                // ends any other way returns null.
                if self.last_instruction_is(Opcode::Pop) {
                    self.replace_last_pop_with_return();
                }
                if !self.last_instruction_is(Opcode::ReturnValue) {
                    self.emit(Opcode::Return, &[]);
                }

                let locals_count = self.symbol_table.definitions_count();
                let instructions = self.leave_scope();

                let func = Value::CompiledFunction(Rc::new(CompiledFunction {
                    instructions,
                    params_count: parameters.len(),
                    locals_count,
                }));

                let index = self.add_constant(func);
                self.emit(Opcode::Constant, &[index]);
            }

            Expression::Call {
                function,
                arguments,
            } => {
                self.compile_expression(function)?;

                for argument in arguments {
                    self.compile_expression(argument)?;
                }

                self.emit(Opcode::Call, &[arguments.len()]);
            }
        }

        Ok(())
    }

    /// Compile an `if` branch. The branch's value has to survive on the
    /// stack, so a trailing expression-statement `OpPop` is removed.
    fn compile_branch(&mut self, branch: &BlockStatement) -> CompileResult<()> {
        self.compile_block(branch)?;

        if self.last_instruction_is(Opcode::Pop) {
            self.remove_last_instruction();
        }

        Ok(())
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        self.scope_index += 1;

        let outer = std::mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::enclosed(outer);
    }

    fn leave_scope(&mut self) -> Vec<u8> {
        let scope = self.scopes.pop().unwrap_or_default();
        self.scope_index -= 1;

        let table = std::mem::take(&mut self.symbol_table);
        self.symbol_table = table.into_outer();

        scope.instructions
    }

    fn current_scope(&self) -> &CompilationScope {
        &self.scopes[self.scope_index]
    }

    fn current_scope_mut(&mut self) -> &mut CompilationScope {
        &mut self.scopes[self.scope_index]
    }

    fn current_instructions(&self) -> &[u8] {
        &self.current_scope().instructions
    }

    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Emit an instruction into the current scope and return its position.
    fn emit(&mut self, opcode: Opcode, operands: &[usize]) -> usize {
        let instruction = make(opcode, operands);
        let position = self.add_instruction(&instruction);
        self.set_last_instruction(opcode, position);

        position
    }

    fn add_instruction(&mut self, instruction: &[u8]) -> usize {
        let scope = self.current_scope_mut();
        let position = scope.instructions.len();
        scope.instructions.extend_from_slice(instruction);

        position
    }

    fn set_last_instruction(&mut self, opcode: Opcode, position: usize) {
        let scope = self.current_scope_mut();
        scope.prev_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { opcode, position });
    }

    fn last_instruction_is(&self, opcode: Opcode) -> bool {
        let scope = self.current_scope();
        if scope.instructions.is_empty() {
            return false;
        }

        matches!(scope.last_instruction, Some(last) if last.opcode == opcode)
    }

    fn remove_last_instruction(&mut self) {
        let scope = self.current_scope_mut();
        if let Some(last) = scope.last_instruction {
            scope.instructions.truncate(last.position);
            scope.last_instruction = scope.prev_instruction;
        }
    }

    /// Overwrite the instruction at `position` in place. Only same-width
    /// replacements are valid.
    fn replace_instruction(&mut self, position: usize, new_instruction: &[u8]) {
        let scope = self.current_scope_mut();
        scope.instructions[position..position + new_instruction.len()]
            .copy_from_slice(new_instruction);
    }

    /// Back-patch the operand of the instruction at `position`.
    fn replace_operand(&mut self, position: usize, operand: usize) {
        let opcode = Opcode::from_u8(self.current_instructions()[position]);
        if let Some(opcode) = opcode {
            let new_instruction = make(opcode, &[operand]);
            self.replace_instruction(position, &new_instruction);
        }
    }

    fn replace_last_pop_with_return(&mut self) {
        if let Some(last) = self.current_scope().last_instruction {
            self.replace_instruction(last.position, &make(Opcode::ReturnValue, &[]));
            self.current_scope_mut().last_instruction = Some(EmittedInstruction {
                opcode: Opcode::ReturnValue,
                position: last.position,
            });
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
