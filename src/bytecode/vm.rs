//! Stack-based virtual machine executing qrk bytecode.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::bytecode::compiler::Bytecode;
use crate::bytecode::frame::Frame;
use crate::bytecode::instruction::{read_u16, read_u8, Opcode};
use crate::error::RuntimeError;
use crate::stdlib;
use crate::value::{CompiledFunction, HashPair, Value};

/// Value stack depth.
pub const STACK_SIZE: usize = 2048;
/// Global binding slots.
pub const GLOBALS_SIZE: usize = 65536;
/// Call depth.
pub const MAX_FRAMES: usize = 1024;

/// Result type for VM execution.
pub type VmResult<T> = Result<T, RuntimeError>;

/// The virtual machine. All capacities are fixed up front; running out of
/// any of them is a hard error, never silent corruption.
pub struct Vm {
    constants: Vec<Value>,

    stack: Vec<Value>,
    /// Always points at the next free stack slot.
    sp: usize,

    globals: Vec<Value>,

    frames: Vec<Frame>,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_global_store(bytecode, vec![Value::Null; GLOBALS_SIZE])
    }

    /// A VM reusing an existing globals array, so bindings survive across
    /// successive compile+run cycles in the REPL.
    pub fn with_global_store(bytecode: Bytecode, globals: Vec<Value>) -> Self {
        let main_func = Rc::new(CompiledFunction {
            instructions: bytecode.instructions,
            params_count: 0,
            locals_count: 0,
        });

        let mut frames = Vec::with_capacity(MAX_FRAMES);
        frames.push(Frame::new(main_func, 0));

        Self {
            constants: bytecode.constants,
            stack: vec![Value::Null; STACK_SIZE],
            sp: 0,
            globals,
            frames,
        }
    }

    /// Hand the globals array back for the next run.
    pub fn into_globals(self) -> Vec<Value> {
        self.globals
    }

    /// The element most recently popped off the stack. Popping only moves
    /// the stack pointer, so the slot it points at still holds the value;
    /// this is how the REPL reads a statement's result.
    pub fn last_popped(&self) -> &Value {
        &self.stack[self.sp]
    }

    pub fn run(&mut self) -> VmResult<()> {
        while self.frame().ip < self.frame().instructions().len() as i64 - 1 {
            self.frame_mut().ip += 1;

            let ip = self.frame().ip as usize;
            let byte = self.frame().instructions()[ip];
            let op = Opcode::from_u8(byte).ok_or(RuntimeError::UndefinedOpcode(byte))?;

            match op {
                Opcode::Constant => {
                    let index = self.read_u16_operand() as usize;
                    let constant = self.constants[index].clone();
                    self.push(constant)?;
                }

                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    self.execute_binary_operation(op)?;
                }

                Opcode::True => self.push(Value::Boolean(true))?,
                Opcode::False => self.push(Value::Boolean(false))?,
                Opcode::Null => self.push(Value::Null)?,

                Opcode::Equal
                | Opcode::NotEqual
                | Opcode::GreaterThan
                | Opcode::And
                | Opcode::Or => {
                    self.execute_comparison_operation(op)?;
                }

                Opcode::Bang => {
                    let operand = self.pop()?;
                    self.push(Value::Boolean(!operand.is_truthy()))?;
                }

                Opcode::Minus => {
                    let operand = self.pop()?;
                    match operand {
                        Value::Integer(value) => {
                            self.push(Value::Integer(value.wrapping_neg()))?;
                        }
                        other => {
                            return Err(RuntimeError::UnsupportedNegation(other.type_name()));
                        }
                    }
                }

                Opcode::Pop => {
                    self.pop()?;
                }

                Opcode::Goto => {
                    let target = self.read_u16_operand() as i64;
                    // The loop's post-increment lands the ip on the target.
                    self.frame_mut().ip = target - 1;
                }

                Opcode::GotoNotTruthy => {
                    let target = self.read_u16_operand() as i64;
                    let condition = self.pop()?;
                    if !condition.is_truthy() {
                        self.frame_mut().ip = target - 1;
                    }
                }

                Opcode::SetGlobal => {
                    let index = self.read_u16_operand() as usize;
                    let value = self.pop()?;
                    self.globals[index] = value;
                }

                Opcode::GetGlobal => {
                    let index = self.read_u16_operand() as usize;
                    let value = self.globals[index].clone();
                    self.push(value)?;
                }

                Opcode::SetLocal => {
                    let index = self.read_u8_operand() as usize;
                    let base_pointer = self.frame().base_pointer;
                    let value = self.pop()?;
                    self.stack[base_pointer + index] = value;
                }

                Opcode::GetLocal => {
                    let index = self.read_u8_operand() as usize;
                    let base_pointer = self.frame().base_pointer;
                    let value = self.stack[base_pointer + index].clone();
                    self.push(value)?;
                }

                Opcode::GetStdlib => {
                    let index = self.read_u8_operand();
                    let builtin = stdlib::BUILTINS
                        .get(index as usize)
                        .ok_or(RuntimeError::UndefinedStdlibFunction(index))?;
                    self.push(Value::Builtin(builtin))?;
                }

                Opcode::Array => {
                    let count = self.read_u16_operand() as usize;
                    let array = self.build_array(self.sp - count, self.sp);
                    self.sp -= count;
                    self.push(array)?;
                }

                Opcode::HashMap => {
                    let count = self.read_u16_operand() as usize;
                    let hashmap = self.build_hashmap(self.sp - count, self.sp)?;
                    self.sp -= count;
                    self.push(hashmap)?;
                }

                Opcode::Index => {
                    let index = self.pop()?;
                    let left = self.pop()?;
                    self.execute_index_expression(left, index)?;
                }

                Opcode::Call => {
                    let args_count = self.read_u8_operand() as usize;
                    self.call_function(args_count)?;
                }

                Opcode::ReturnValue => {
                    let return_value = self.pop()?;

                    let frame = self.pop_frame()?;
                    if self.frames.is_empty() {
                        // A top-level `return` ends the program; its value
                        // becomes the terminal value.
                        self.sp = frame.base_pointer;
                        self.stack[self.sp] = return_value;
                        return Ok(());
                    }

                    // Drop the frame's slots plus the callee itself.
                    self.sp = frame.base_pointer - 1;
                    self.push(return_value)?;
                }

                Opcode::Return => {
                    let frame = self.pop_frame()?;
                    if self.frames.is_empty() {
                        self.sp = frame.base_pointer;
                        self.stack[self.sp] = Value::Null;
                        return Ok(());
                    }

                    self.sp = frame.base_pointer - 1;
                    self.push(Value::Null)?;
                }
            }
        }

        Ok(())
    }

    fn frame(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    fn frame_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn pop_frame(&mut self) -> VmResult<Frame> {
        self.frames.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Read the u16 operand after the current opcode and step over it.
    fn read_u16_operand(&mut self) -> u16 {
        let frame = self.frame_mut();
        let ip = frame.ip as usize;
        let operand = read_u16(&frame.instructions()[ip + 1..]);
        frame.ip += 2;
        operand
    }

    /// Read the u8 operand after the current opcode and step over it.
    fn read_u8_operand(&mut self) -> u8 {
        let frame = self.frame_mut();
        let ip = frame.ip as usize;
        let operand = read_u8(&frame.instructions()[ip + 1..]);
        frame.ip += 1;
        operand
    }

    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(RuntimeError::StackOverflow);
        }

        self.stack[self.sp] = value;
        self.sp += 1;

        Ok(())
    }

    fn pop(&mut self) -> VmResult<Value> {
        if self.sp == 0 {
            return Err(RuntimeError::StackUnderflow);
        }

        self.sp -= 1;
        Ok(self.stack[self.sp].clone())
    }

    fn execute_binary_operation(&mut self, op: Opcode) -> VmResult<()> {
        let right = self.pop()?;
        let left = self.pop()?;

        match (&left, &right) {
            (Value::Integer(left), Value::Integer(right)) => {
                self.execute_binary_int_operation(op, *left, *right)
            }
            (Value::Str(left), Value::Str(right)) => match op {
                Opcode::Add => {
                    let mut result = String::with_capacity(left.len() + right.len());
                    result.push_str(left);
                    result.push_str(right);
                    self.push(Value::Str(Rc::new(result)))
                }
                _ => Err(RuntimeError::UnknownStringOperator(op.definition().name)),
            },
            _ => Err(RuntimeError::UnsupportedBinaryTypes(
                left.type_name(),
                right.type_name(),
            )),
        }
    }

    fn execute_binary_int_operation(&mut self, op: Opcode, left: i64, right: i64) -> VmResult<()> {
        let result = match op {
            Opcode::Add => left.wrapping_add(right),
            Opcode::Sub => left.wrapping_sub(right),
            Opcode::Mul => left.wrapping_mul(right),
            Opcode::Div => {
                if right == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                left.wrapping_div(right)
            }
            _ => {
                return Err(RuntimeError::UnsupportedBinaryTypes(INTEGER, INTEGER));
            }
        };

        self.push(Value::Integer(result))
    }

    fn execute_comparison_operation(&mut self, op: Opcode) -> VmResult<()> {
        let right = self.pop()?;
        let left = self.pop()?;

        if let (Value::Integer(left), Value::Integer(right)) = (&left, &right) {
            let result = match op {
                Opcode::Equal => left == right,
                Opcode::NotEqual => left != right,
                Opcode::GreaterThan => left > right,
                _ => {
                    return Err(RuntimeError::UnsupportedBinaryTypes(INTEGER, INTEGER));
                }
            };
            return self.push(Value::Boolean(result));
        }

        match op {
            // Everything except integer pairs compares by object identity.
            Opcode::Equal => {
                let result = left.same_object(&right);
                self.push(Value::Boolean(result))
            }
            Opcode::NotEqual => {
                let result = !left.same_object(&right);
                self.push(Value::Boolean(result))
            }
            Opcode::And | Opcode::Or => match (&left, &right) {
                (Value::Boolean(left), Value::Boolean(right)) => {
                    let result = if op == Opcode::And {
                        *left && *right
                    } else {
                        *left || *right
                    };
                    self.push(Value::Boolean(result))
                }
                _ => Err(RuntimeError::UnsupportedBinaryTypes(
                    left.type_name(),
                    right.type_name(),
                )),
            },
            _ => Err(RuntimeError::UnsupportedBinaryTypes(
                left.type_name(),
                right.type_name(),
            )),
        }
    }

    fn build_array(&self, start: usize, end: usize) -> Value {
        let elements = self.stack[start..end].to_vec();
        Value::Array(Rc::new(elements))
    }

    fn build_hashmap(&self, start: usize, end: usize) -> VmResult<Value> {
        let mut pairs = IndexMap::with_capacity((end - start) / 2);

        let mut index = start;
        while index < end {
            let key = self.stack[index].clone();
            let value = self.stack[index + 1].clone();

            let hash_key = key
                .hash_key()
                .ok_or_else(|| RuntimeError::UnusableHashKey(key.type_name()))?;

            pairs.insert(
                hash_key,
                HashPair {
                    key,
                    value,
                },
            );

            index += 2;
        }

        Ok(Value::HashMap(Rc::new(pairs)))
    }

    fn execute_index_expression(&mut self, left: Value, index: Value) -> VmResult<()> {
        match (&left, &index) {
            (Value::Array(elements), Value::Integer(position)) => {
                let element = if *position < 0 || *position as usize >= elements.len() {
                    Value::Null
                } else {
                    elements[*position as usize].clone()
                };
                self.push(element)
            }
            (Value::HashMap(pairs), key) => {
                let hash_key = key
                    .hash_key()
                    .ok_or_else(|| RuntimeError::UnusableHashKey(key.type_name()))?;

                let value = match pairs.get(&hash_key) {
                    Some(pair) => pair.value.clone(),
                    None => Value::Null,
                };
                self.push(value)
            }
            _ => Err(RuntimeError::IndexNotSupported(left.type_name())),
        }
    }

    fn call_function(&mut self, args_count: usize) -> VmResult<()> {
        let base_pointer = self
            .sp
            .checked_sub(args_count)
            .filter(|bp| *bp > 0)
            .ok_or(RuntimeError::StackUnderflow)?;
        let callee = self.stack[base_pointer - 1].clone();

        match callee {
            Value::CompiledFunction(func) => {
                if func.params_count != args_count {
                    return Err(RuntimeError::WrongNumberOfArguments {
                        expected: func.params_count,
                        got: args_count,
                    });
                }
                if self.frames.len() >= MAX_FRAMES {
                    return Err(RuntimeError::FrameOverflow);
                }
                if base_pointer + func.locals_count > STACK_SIZE {
                    return Err(RuntimeError::StackOverflow);
                }

                // Arguments already sit at the bottom of the new frame;
                // reserve the remaining local slots above them.
                self.sp = base_pointer + func.locals_count;
                self.frames.push(Frame::new(func, base_pointer));

                Ok(())
            }

            Value::Builtin(builtin) => {
                let arity_ok = if builtin.variadic {
                    args_count >= builtin.params_count
                } else {
                    args_count == builtin.params_count
                };
                if !arity_ok {
                    return Err(RuntimeError::WrongNumberOfArguments {
                        expected: builtin.params_count,
                        got: args_count,
                    });
                }

                let args = self.stack[base_pointer..self.sp].to_vec();
                let result = (builtin.func)(&args);

                // Drop the arguments and the callee before pushing the
                // result, so surrounding expressions see a clean stack.
                self.sp = base_pointer - 1;
                self.push(result)
            }

            other => Err(RuntimeError::CallingNonFunction(other.type_name())),
        }
    }
}

const INTEGER: &str = crate::value::INTEGER_OBJ;
