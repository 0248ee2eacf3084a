// Bass - 8-bit Virtual CPU Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Static tables of the Bass ISA: register codes, opcodes with their operand
//! kinds, syscall selectors, flag bit positions and fault sentinels.

use serde::{Deserialize, Serialize};

/// Size of one encoded instruction record in bytes.
pub const INSTRUCTION_SIZE: usize = 3;

/// Largest number of instructions addressable by an 8-bit instruction index.
pub const MAX_INSTRUCTIONS: usize = 256;

/// Size of the data memory. Equal to the value range of a register, so a
/// register value is always an in-range address.
pub const MEMORY_SIZE: usize = 256;

/// Marker that starts a comment token.
pub const COMMENT_MARKER: char = ';';

/// Marker that starts a label token.
pub const LABEL_MARKER: char = '<';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Register {
    Ra,
    Rb,
    Rc,
    Rd,
    Re,
    Rf,
}

impl Register {
    pub const ALL: [Register; 6] = [
        Register::Ra,
        Register::Rb,
        Register::Rc,
        Register::Rd,
        Register::Re,
        Register::Rf,
    ];

    /// One-hot selector byte used in the instruction encoding.
    pub const fn code(self) -> u8 {
        match self {
            Register::Ra => 0b0000_0001,
            Register::Rb => 0b0000_0010,
            Register::Rc => 0b0000_0100,
            Register::Rd => 0b0000_1000,
            Register::Re => 0b0001_0000,
            Register::Rf => 0b0010_0000,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.code() == code)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Register::Ra => "ra",
            Register::Rb => "rb",
            Register::Rc => "rc",
            Register::Rd => "rd",
            Register::Re => "re",
            Register::Rf => "rf",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }

    /// Position in the register file.
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How an instruction interprets one of its operand bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// A register selector.
    Register,
    /// An immediate value.
    Literal,
    /// An absolute instruction index.
    Target,
    /// Not read during execution.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opcode {
    Mov,
    Add,
    Sub,
    Imm,
    Cmp,
    Stm,
    Ldm,
    Sys,
    Jmp,
    Jne,
    Jlt,
    And,
    Not,
    Orr,
    Xor,
}

impl Opcode {
    pub const ALL: [Opcode; 15] = [
        Opcode::Mov,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Imm,
        Opcode::Cmp,
        Opcode::Stm,
        Opcode::Ldm,
        Opcode::Sys,
        Opcode::Jmp,
        Opcode::Jne,
        Opcode::Jlt,
        Opcode::And,
        Opcode::Not,
        Opcode::Orr,
        Opcode::Xor,
    ];

    pub const fn code(self) -> u8 {
        match self {
            Opcode::Mov => 0x39,
            Opcode::Add => 0x40,
            Opcode::Sub => 0x41,
            Opcode::Imm => 0x42,
            Opcode::Cmp => 0x43,
            Opcode::Stm => 0x44,
            Opcode::Ldm => 0x45,
            Opcode::Sys => 0x46,
            Opcode::Jmp => 0x47,
            Opcode::Jne => 0x48,
            Opcode::Jlt => 0x49,
            Opcode::And => 0x50,
            Opcode::Not => 0x51,
            Opcode::Orr => 0x52,
            Opcode::Xor => 0x53,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Mov => "mov",
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Imm => "imm",
            Opcode::Cmp => "cmp",
            Opcode::Stm => "stm",
            Opcode::Ldm => "ldm",
            Opcode::Sys => "sys",
            Opcode::Jmp => "jmp",
            Opcode::Jne => "jne",
            Opcode::Jlt => "jlt",
            Opcode::And => "and",
            Opcode::Not => "not",
            Opcode::Orr => "orr",
            Opcode::Xor => "xor",
        }
    }

    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == mnemonic)
    }

    /// Operand kinds of operand A and operand B.
    pub const fn operand_kinds(self) -> (OperandKind, OperandKind) {
        use OperandKind::*;
        match self {
            Opcode::Imm => (Register, Literal),
            Opcode::Sys => (Ignored, Ignored),
            Opcode::Jmp | Opcode::Jne | Opcode::Jlt => (Target, Ignored),
            Opcode::Mov
            | Opcode::Add
            | Opcode::Sub
            | Opcode::Cmp
            | Opcode::Stm
            | Opcode::Ldm
            | Opcode::And
            | Opcode::Not
            | Opcode::Orr
            | Opcode::Xor => (Register, Register),
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Syscall selectors, read from `ra` when `sys` executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Syscall {
    Write,
    Read,
    Exit,
}

impl Syscall {
    pub const ALL: [Syscall; 3] = [Syscall::Write, Syscall::Read, Syscall::Exit];

    pub const fn code(self) -> u8 {
        match self {
            Syscall::Write => 0x10,
            Syscall::Read => 0x20,
            Syscall::Exit => 0x30,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Name accepted by the assembler as an operand.
    pub const fn name(self) -> &'static str {
        match self {
            Syscall::Write => "sw",
            Syscall::Read => "sr",
            Syscall::Exit => "sx",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

pub const FLAG_SIGN_SHIFT: u8 = 0;
pub const FLAG_CARRY_SHIFT: u8 = 1;
pub const FLAG_ZERO_SHIFT: u8 = 2;
pub const FLAG_OVERFLOW_SHIFT: u8 = 3;

bitflags::bitflags! {
    /// Condition flags written by `cmp`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct Flags: u8 {
        const SIGN = 1 << FLAG_SIGN_SHIFT;
        const CARRY = 1 << FLAG_CARRY_SHIFT;
        const ZERO = 1 << FLAG_ZERO_SHIFT;
        const OVERFLOW = 1 << FLAG_OVERFLOW_SHIFT;
    }
}

/// Values left in `ra` when the machine halts on a fault.
pub mod sentinel {
    pub const WRITE_EXHAUSTED: u8 = 33;
    pub const READ_EXHAUSTED: u8 = 44;
    pub const UNKNOWN_SYSCALL: u8 = 55;
    pub const BAD_INSTRUCTION: u8 = 66;
    pub const BAD_REGISTER: u8 = 77;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_codes_are_one_hot_and_distinct() {
        for (i, reg) in Register::ALL.iter().enumerate() {
            assert_eq!(reg.code().count_ones(), 1);
            assert_eq!(reg.index(), i);
            assert_eq!(Register::from_code(reg.code()), Some(*reg));
            assert_eq!(Register::from_name(reg.name()), Some(*reg));
        }
        assert_eq!(Register::from_code(0x40), None);
        assert_eq!(Register::from_code(0x03), None);
    }

    #[test]
    fn test_opcode_table_roundtrip() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_code(op.code()), Some(op));
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
        }
        assert_eq!(Opcode::from_code(0x00), None);
        assert_eq!(Opcode::from_mnemonic("nop"), None);
    }

    #[test]
    fn test_jump_operand_kinds() {
        assert_eq!(
            Opcode::Jmp.operand_kinds(),
            (OperandKind::Target, OperandKind::Ignored)
        );
        assert_eq!(
            Opcode::Imm.operand_kinds(),
            (OperandKind::Register, OperandKind::Literal)
        );
    }

    #[test]
    fn test_flag_bits_match_shifts() {
        assert_eq!(Flags::SIGN.bits(), 0b0001);
        assert_eq!(Flags::CARRY.bits(), 0b0010);
        assert_eq!(Flags::ZERO.bits(), 0b0100);
        assert_eq!(Flags::OVERFLOW.bits(), 0b1000);
    }

    #[test]
    fn test_syscall_codes() {
        assert_eq!(Syscall::from_name("sw").map(Syscall::code), Some(0x10));
        assert_eq!(Syscall::from_code(0x20), Some(Syscall::Read));
        assert_eq!(Syscall::from_code(0x31), None);
    }
}
