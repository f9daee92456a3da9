//! Disassembler for qrk bytecode.

use std::fmt::Write;

use crate::bytecode::instruction::{read_operands, Definition, Opcode};

/// Render an instruction stream as one line per instruction:
///
/// ```text
/// 0000 OpConstant 1
/// 0003 OpAdd
/// ```
///
/// The byte offset is left-padded to four digits. Only the opcode table is
/// consulted, so any well-formed stream disassembles without its constants.
pub fn disassemble(instructions: &[u8]) -> String {
    let mut out = String::new();
    let mut offset = 0;

    while offset < instructions.len() {
        let byte = instructions[offset];
        let Some(op) = Opcode::from_u8(byte) else {
            writeln!(out, "ERROR: opcode {} undefined", byte).unwrap();
            offset += 1;
            continue;
        };

        let definition = op.definition();
        let (operands, bytes_read) = read_operands(definition, &instructions[offset + 1..]);

        writeln!(out, "{:04} {}", offset, fmt_instruction(definition, &operands)).unwrap();

        offset += 1 + bytes_read;
    }

    out
}

fn fmt_instruction(definition: &Definition, operands: &[usize]) -> String {
    let operand_count = definition.operand_widths.len();

    if operands.len() != operand_count {
        return format!(
            "ERROR: operand len {} does not match defined {}",
            operands.len(),
            operand_count
        );
    }

    match operand_count {
        0 => definition.name.to_string(),
        1 => format!("{} {}", definition.name, operands[0]),
        _ => format!("ERROR: unhandled operand count for {}", definition.name),
    }
}

/// Print a disassembly to stdout, for the `--disassemble` flag.
pub fn print_disassembly(instructions: &[u8]) {
    print!("{}", disassemble(instructions));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::instruction::make;

    #[test]
    fn test_disassemble() {
        let instructions: Vec<u8> = [
            make(Opcode::Constant, &[1]),
            make(Opcode::Constant, &[2]),
            make(Opcode::Constant, &[65535]),
            make(Opcode::Add, &[]),
        ]
        .concat();

        let expected = "\
0000 OpConstant 1
0003 OpConstant 2
0006 OpConstant 65535
0009 OpAdd
";

        assert_eq!(disassemble(&instructions), expected);
    }

    #[test]
    fn test_disassemble_one_byte_operands() {
        let instructions: Vec<u8> = [
            make(Opcode::GetLocal, &[0]),
            make(Opcode::GetStdlib, &[1]),
            make(Opcode::Call, &[2]),
        ]
        .concat();

        let expected = "\
0000 OpGetLocal 0
0002 OpGetStdlib 1
0004 OpCall 2
";

        assert_eq!(disassemble(&instructions), expected);
    }

    #[test]
    fn test_disassemble_unknown_opcode() {
        let output = disassemble(&[200]);
        assert_eq!(output, "ERROR: opcode 200 undefined\n");
    }
}
