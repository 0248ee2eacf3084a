// Bass - 8-bit Virtual CPU Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod assembler;
pub mod cpu;
pub mod decoder;
pub mod io;
pub mod isa;
pub mod memory;
pub mod metrics;
pub mod snapshot;

use serde::{Deserialize, Serialize};


pub use assembler::{assemble, AsmError, AsmErrorKind, AsmResult, Program};
pub use cpu::{Completion, RegisterFile, Status, Vm};
pub use decoder::{decode, disassemble, DecodeError, Instruction};
pub use isa::{Flags, Opcode, Register, Syscall};

/// Unrecoverable condition that halts the machine. The matching sentinel is
/// left in `ra`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    #[error("write budget exhausted")]
    WriteExhausted,
    #[error("read budget exhausted")]
    ReadExhausted,
    #[error("unknown syscall selector {selector:#04x}")]
    UnknownSyscall { selector: u8 },
    #[error("unknown opcode {opcode:#04x} at instruction {ip}")]
    UnknownOpcode { ip: u8, opcode: u8 },
    #[error("instruction pointer {ip} is outside the program")]
    IpOutOfBounds { ip: u8 },
    #[error("invalid register selector {code:#04x} at instruction {ip}")]
    BadRegister { ip: u8, code: u8 },
}

impl Fault {
    pub fn sentinel(&self) -> u8 {
        use isa::sentinel;
        match self {
            Fault::WriteExhausted => sentinel::WRITE_EXHAUSTED,
            Fault::ReadExhausted => sentinel::READ_EXHAUSTED,
            Fault::UnknownSyscall { .. } => sentinel::UNKNOWN_SYSCALL,
            Fault::UnknownOpcode { .. } | Fault::IpOutOfBounds { .. } => {
                sentinel::BAD_INSTRUCTION
            }
            Fault::BadRegister { .. } => sentinel::BAD_REGISTER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaltReason {
    /// The program issued the exit syscall.
    Exit,
    Fault(Fault),
}

impl HaltReason {
    pub fn is_fault(&self) -> bool {
        matches!(self, HaltReason::Fault(_))
    }
}

/// `Vm::run` hit its instruction ceiling before the machine halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("step limit of {0} reached before the machine halted")]
pub struct StepLimit(pub u64);

#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("snapshot memory is {0} bytes, expected {expected}", expected = isa::MEMORY_SIZE)]
    InvalidSnapshot(usize),
}

pub type VmResult<T> = Result<T, VmError>;

/// Hooks for watching a machine execute.
pub trait ExecutionObserver: std::fmt::Debug + Send + Sync {
    fn on_run_start(&self) {}
    fn on_step(&self, _ip: u8, _instruction: &Instruction) {}
    fn on_halt(&self, _reason: &HaltReason) {}
}
