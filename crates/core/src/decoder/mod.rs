// Bass - 8-bit Virtual CPU Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::isa::{Opcode, OperandKind, Register, INSTRUCTION_SIZE};
use std::fmt;

/// Bass instruction with typed operands, decoded from a 3-byte record.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Instruction {
    Mov { dst: Register, src: Register }, // MOV dst, src
    Add { dst: Register, src: Register }, // ADD dst, src
    Sub { dst: Register, src: Register }, // SUB dst, src
    Imm { dst: Register, value: u8 },     // IMM dst, #value
    Cmp { lhs: Register, rhs: Register }, // CMP lhs, rhs
    Stm { addr: Register, src: Register }, // STM [addr], src
    Ldm { dst: Register, addr: Register }, // LDM dst, [addr]
    Sys,                                  // SYS (selector in ra)
    Jmp { target: u8 },                   // JMP target
    Jne { target: u8 },                   // JNE target (taken when zero set)
    Jlt { target: u8 },                   // JLT target (taken when sign set)
    And { dst: Register, src: Register }, // AND dst, src
    Not { dst: Register, src: Register }, // NOT dst, src (negation)
    Orr { dst: Register, src: Register }, // ORR dst, src
    Xor { dst: Register, src: Register }, // XOR dst, src
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("invalid register selector {0:#04x}")]
    BadRegister(u8),
}

fn reg(code: u8) -> Result<Register, DecodeError> {
    Register::from_code(code).ok_or(DecodeError::BadRegister(code))
}

pub fn decode(record: [u8; INSTRUCTION_SIZE]) -> Result<Instruction, DecodeError> {
    let [opcode, a, b] = record;
    let op = Opcode::from_code(opcode).ok_or(DecodeError::UnknownOpcode(opcode))?;

    let instruction = match op {
        Opcode::Mov => Instruction::Mov {
            dst: reg(a)?,
            src: reg(b)?,
        },
        Opcode::Add => Instruction::Add {
            dst: reg(a)?,
            src: reg(b)?,
        },
        Opcode::Sub => Instruction::Sub {
            dst: reg(a)?,
            src: reg(b)?,
        },
        Opcode::Imm => Instruction::Imm {
            dst: reg(a)?,
            value: b,
        },
        Opcode::Cmp => Instruction::Cmp {
            lhs: reg(a)?,
            rhs: reg(b)?,
        },
        Opcode::Stm => Instruction::Stm {
            addr: reg(a)?,
            src: reg(b)?,
        },
        Opcode::Ldm => Instruction::Ldm {
            dst: reg(a)?,
            addr: reg(b)?,
        },
        Opcode::Sys => Instruction::Sys,
        Opcode::Jmp => Instruction::Jmp { target: a },
        Opcode::Jne => Instruction::Jne { target: a },
        Opcode::Jlt => Instruction::Jlt { target: a },
        Opcode::And => Instruction::And {
            dst: reg(a)?,
            src: reg(b)?,
        },
        Opcode::Not => Instruction::Not {
            dst: reg(a)?,
            src: reg(b)?,
        },
        Opcode::Orr => Instruction::Orr {
            dst: reg(a)?,
            src: reg(b)?,
        },
        Opcode::Xor => Instruction::Xor {
            dst: reg(a)?,
            src: reg(b)?,
        },
    };

    Ok(instruction)
}

/// Operand rendered back to assembly text.
enum Operand {
    Reg(Register),
    Num(u8),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{}", r),
            Operand::Num(n) => write!(f, "{}", n),
        }
    }
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Mov { .. } => Opcode::Mov,
            Instruction::Add { .. } => Opcode::Add,
            Instruction::Sub { .. } => Opcode::Sub,
            Instruction::Imm { .. } => Opcode::Imm,
            Instruction::Cmp { .. } => Opcode::Cmp,
            Instruction::Stm { .. } => Opcode::Stm,
            Instruction::Ldm { .. } => Opcode::Ldm,
            Instruction::Sys => Opcode::Sys,
            Instruction::Jmp { .. } => Opcode::Jmp,
            Instruction::Jne { .. } => Opcode::Jne,
            Instruction::Jlt { .. } => Opcode::Jlt,
            Instruction::And { .. } => Opcode::And,
            Instruction::Not { .. } => Opcode::Not,
            Instruction::Orr { .. } => Opcode::Orr,
            Instruction::Xor { .. } => Opcode::Xor,
        }
    }

    fn operands(&self) -> (Operand, Operand) {
        use Operand::{Num, Reg};
        match *self {
            Instruction::Mov { dst, src }
            | Instruction::Add { dst, src }
            | Instruction::Sub { dst, src }
            | Instruction::And { dst, src }
            | Instruction::Not { dst, src }
            | Instruction::Orr { dst, src }
            | Instruction::Xor { dst, src } => (Reg(dst), Reg(src)),
            Instruction::Imm { dst, value } => (Reg(dst), Num(value)),
            Instruction::Cmp { lhs, rhs } => (Reg(lhs), Reg(rhs)),
            Instruction::Stm { addr, src } => (Reg(addr), Reg(src)),
            Instruction::Ldm { dst, addr } => (Reg(dst), Reg(addr)),
            Instruction::Sys => (Num(0), Num(0)),
            Instruction::Jmp { target } | Instruction::Jne { target } | Instruction::Jlt { target } => {
                (Num(target), Num(0))
            }
        }
    }

    /// Encodes back into a record. Operand bytes the opcode ignores are zero.
    pub fn encode(&self) -> [u8; INSTRUCTION_SIZE] {
        let byte = |operand: Operand| match operand {
            Operand::Reg(r) => r.code(),
            Operand::Num(n) => n,
        };
        let (a, b) = self.operands();
        let (kind_a, kind_b) = self.opcode().operand_kinds();
        let a = if kind_a == OperandKind::Ignored { 0 } else { byte(a) };
        let b = if kind_b == OperandKind::Ignored { 0 } else { byte(b) };
        [self.opcode().code(), a, b]
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b) = self.operands();
        write!(f, "{} {} {}", self.opcode(), a, b)
    }
}

/// Renders a byte-code array as assembly text, one line per record.
///
/// Records that do not decode (including zero padding) become comment lines
/// so the output still lines up with instruction indices. A trailing partial
/// record is ignored.
pub fn disassemble(bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks_exact(INSTRUCTION_SIZE)
        .map(|chunk| {
            let record = [chunk[0], chunk[1], chunk[2]];
            match decode(record) {
                Ok(instruction) => instruction.to_string(),
                Err(e) => format!(
                    "; {:02x} {:02x} {:02x} ({})",
                    record[0], record[1], record[2], e
                ),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_register_forms() {
        assert_eq!(
            decode([0x40, 0x01, 0x02]),
            Ok(Instruction::Add {
                dst: Register::Ra,
                src: Register::Rb
            })
        );
        assert_eq!(
            decode([0x45, 0x20, 0x10]),
            Ok(Instruction::Ldm {
                dst: Register::Rf,
                addr: Register::Re
            })
        );
    }

    #[test]
    fn test_decode_literal_operand_is_not_a_register() {
        assert_eq!(
            decode([0x42, 0x04, 0xFF]),
            Ok(Instruction::Imm {
                dst: Register::Rc,
                value: 0xFF
            })
        );
    }

    #[test]
    fn test_decode_ignores_unused_operands() {
        assert_eq!(decode([0x46, 0xAA, 0xBB]), Ok(Instruction::Sys));
        assert_eq!(
            decode([0x47, 0x07, 0x99]),
            Ok(Instruction::Jmp { target: 7 })
        );
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(decode([0x00, 0, 0]), Err(DecodeError::UnknownOpcode(0)));
        assert_eq!(
            decode([0x40, 0x01, 0x03]),
            Err(DecodeError::BadRegister(0x03))
        );
        assert_eq!(
            decode([0x39, 0x40, 0x01]),
            Err(DecodeError::BadRegister(0x40))
        );
    }

    #[test]
    fn test_encode_zeroes_ignored_operands() {
        let ins = decode([0x48, 0x05, 0x77]).unwrap();
        assert_eq!(ins.encode(), [0x48, 0x05, 0x00]);
        let ins = decode([0x53, 0x08, 0x01]).unwrap();
        assert_eq!(ins.encode(), [0x53, 0x08, 0x01]);
    }

    #[test]
    fn test_disassemble_marks_padding() {
        let lines = disassemble(&[0x42, 0x01, 0x05, 0x00, 0x00, 0x00, 0x47]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "imm ra 5");
        assert!(lines[1].starts_with("; 00 00 00"));
    }
}
