//! Call frames for the virtual machine.

use std::rc::Rc;

use crate::value::CompiledFunction;

/// One function invocation: the code being executed, an instruction pointer
/// and the stack index where the frame's slots begin (arguments first, then
/// declared locals).
#[derive(Debug, Clone)]
pub struct Frame {
    func: Rc<CompiledFunction>,
    /// Starts one before the first instruction; the fetch loop advances it
    /// before decoding, so jumps store `target - 1`.
    pub ip: i64,
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(func: Rc<CompiledFunction>, base_pointer: usize) -> Self {
        Self {
            func,
            ip: -1,
            base_pointer,
        }
    }

    pub fn instructions(&self) -> &[u8] {
        &self.func.instructions
    }
}
