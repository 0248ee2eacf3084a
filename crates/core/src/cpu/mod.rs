// Bass - 8-bit Virtual CPU Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::decoder::{decode, DecodeError, Instruction};
use crate::io::IoChannel;
use crate::isa::{Flags, Register, Syscall, INSTRUCTION_SIZE, MEMORY_SIZE};
use crate::memory::DataMemory;
use crate::snapshot::{IoSnapshot, VmSnapshot};
use crate::{ExecutionObserver, Fault, HaltReason, StepLimit, VmError, VmResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A + B mod 256.
pub fn add8(a: u8, b: u8) -> u8 {
    ((u16::from(a) + u16::from(b)) & 0xFF) as u8
}

/// A - B, computed as A + (256 - B) mod 256.
pub fn sub8(a: u8, b: u8) -> u8 {
    ((u16::from(a) + (0x100 - u16::from(b))) & 0xFF) as u8
}

/// Arithmetic negation, (256 - B) mod 256. `neg8(0) == 0`.
pub fn neg8(b: u8) -> u8 {
    ((0x100 - u16::from(b)) & 0xFF) as u8
}

/// Flags for A compared with B, from the 9-bit sum A + (256 - B).
pub fn compare(a: u8, b: u8) -> Flags {
    let result = u16::from(a) + (0x100 - u16::from(b));
    let low = (result & 0xFF) as u8;

    let sign_a = a >> 7;
    let sign_b = b >> 7;
    let sign_r = low >> 7;

    let mut flags = Flags::empty();
    flags.set(Flags::SIGN, sign_r == 1);
    flags.set(Flags::CARRY, (result >> 8) & 1 == 1);
    flags.set(Flags::ZERO, low == 0);
    flags.set(Flags::OVERFLOW, sign_a == sign_b && sign_r != sign_a);
    flags
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    values: [u8; 6],
}

impl RegisterFile {
    pub fn get(&self, reg: Register) -> u8 {
        self.values[reg.index()]
    }

    pub fn set(&mut self, reg: Register, value: u8) {
        self.values[reg.index()] = value;
    }

    /// Values in `ra..rf` order.
    pub fn values(&self) -> [u8; 6] {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (Register, u8)> + '_ {
        Register::ALL.into_iter().map(|r| (r, self.get(r)))
    }
}

impl std::ops::Index<Register> for RegisterFile {
    type Output = u8;

    fn index(&self, reg: Register) -> &u8 {
        &self.values[reg.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Halted,
}

/// Result of running a machine until it halts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub output: Vec<u8>,
    pub registers: RegisterFile,
    pub halt: HaltReason,
    pub steps: u64,
}

/// One Bass machine: registers, flags, data memory, I/O channel and the
/// program it executes. Instances share nothing.
#[derive(Debug)]
pub struct Vm {
    program: Vec<u8>,
    registers: RegisterFile,
    ip: u8,
    flags: Flags,
    memory: DataMemory,
    io: IoChannel,
    halt: Option<HaltReason>,
    steps: u64,
    observers: Vec<Arc<dyn ExecutionObserver>>,
}

impl Vm {
    pub fn new(program: Vec<u8>, input: Vec<u8>, read_budget: u32, write_budget: u32) -> Self {
        Self {
            program,
            registers: RegisterFile::default(),
            ip: 0,
            flags: Flags::empty(),
            memory: DataMemory::new(),
            io: IoChannel::new(input, read_budget, write_budget),
            halt: None,
            steps: 0,
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Arc<dyn ExecutionObserver>) {
        self.observers.push(observer);
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn register(&self, reg: Register) -> u8 {
        self.registers.get(reg)
    }

    /// Seeds a register before execution, e.g. to pass an argument.
    pub fn set_register(&mut self, reg: Register, value: u8) {
        self.registers.set(reg, value);
    }

    pub fn ip(&self) -> u8 {
        self.ip
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn memory(&self) -> &DataMemory {
        &self.memory
    }

    pub fn io(&self) -> &IoChannel {
        &self.io
    }

    pub fn output(&self) -> &[u8] {
        self.io.output()
    }

    pub fn program(&self) -> &[u8] {
        &self.program
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_some()
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt
    }

    /// Number of instructions executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn fetch(&self, ip: u8) -> Result<Instruction, Fault> {
        let start = usize::from(ip) * INSTRUCTION_SIZE;
        let record = self
            .program
            .get(start..start + INSTRUCTION_SIZE)
            .ok_or(Fault::IpOutOfBounds { ip })?;
        decode([record[0], record[1], record[2]]).map_err(|e| match e {
            DecodeError::UnknownOpcode(opcode) => Fault::UnknownOpcode { ip, opcode },
            DecodeError::BadRegister(code) => Fault::BadRegister { ip, code },
        })
    }

    fn halt_with(&mut self, reason: HaltReason) {
        self.halt = Some(reason);
        for observer in &self.observers {
            observer.on_halt(&reason);
        }
    }

    /// Puts the sentinel in `ra` and halts. `ip` is the faulting instruction.
    fn fault(&mut self, ip: u8, fault: Fault) -> Fault {
        tracing::warn!("Fault at ip={}: {}", ip, fault);
        self.registers.set(Register::Ra, fault.sentinel());
        self.halt_with(HaltReason::Fault(fault));
        fault
    }

    /// Runs the syscall selected by `ra`. Ok(true) means exit.
    fn syscall(&mut self) -> Result<bool, Fault> {
        let selector = self.registers.get(Register::Ra);
        match Syscall::from_code(selector) {
            Some(Syscall::Write) => {
                let byte = self.registers.get(Register::Rb);
                if !self.io.write(byte) {
                    return Err(Fault::WriteExhausted);
                }
                tracing::debug!("sys write {:#04x}", byte);
                Ok(false)
            }
            Some(Syscall::Read) => {
                let byte = self.io.read().ok_or(Fault::ReadExhausted)?;
                self.registers.set(Register::Ra, byte);
                Ok(false)
            }
            Some(Syscall::Exit) => Ok(true),
            None => Err(Fault::UnknownSyscall { selector }),
        }
    }

    /// Executes one decoded instruction. Returns Ok(true) on exit.
    fn execute(&mut self, instruction: Instruction, next_ip: &mut u8) -> Result<bool, Fault> {
        let r = &mut self.registers;
        match instruction {
            Instruction::Mov { dst, src } => r.set(dst, r.get(src)),
            Instruction::Add { dst, src } => r.set(dst, add8(r.get(dst), r.get(src))),
            Instruction::Sub { dst, src } => r.set(dst, sub8(r.get(dst), r.get(src))),
            Instruction::Imm { dst, value } => r.set(dst, value),
            Instruction::Cmp { lhs, rhs } => self.flags = compare(r.get(lhs), r.get(rhs)),
            Instruction::Stm { addr, src } => self.memory.write_u8(r.get(addr), r.get(src)),
            Instruction::Ldm { dst, addr } => r.set(dst, self.memory.read_u8(r.get(addr))),
            Instruction::Sys => return self.syscall(),
            Instruction::Jmp { target } => *next_ip = target,
            Instruction::Jne { target } => {
                if self.flags.contains(Flags::ZERO) {
                    *next_ip = target;
                }
            }
            Instruction::Jlt { target } => {
                if self.flags.contains(Flags::SIGN) {
                    *next_ip = target;
                }
            }
            Instruction::And { dst, src } => r.set(dst, r.get(dst) & r.get(src)),
            Instruction::Not { dst, src } => r.set(dst, neg8(r.get(src))),
            Instruction::Orr { dst, src } => r.set(dst, r.get(dst) | r.get(src)),
            Instruction::Xor { dst, src } => r.set(dst, r.get(dst) ^ r.get(src)),
        }
        Ok(false)
    }

    /// Fetches, decodes and executes one instruction.
    ///
    /// A fault places its sentinel in `ra`, halts the machine and is returned
    /// as `Err`. Stepping a halted machine does nothing.
    pub fn step(&mut self) -> Result<Status, Fault> {
        if self.halt.is_some() {
            return Ok(Status::Halted);
        }

        let ip = self.ip;
        let instruction = match self.fetch(ip) {
            Ok(instruction) => instruction,
            Err(fault) => return Err(self.fault(ip, fault)),
        };

        for observer in &self.observers {
            observer.on_step(ip, &instruction);
        }
        tracing::trace!("IP={}, Instr={}", ip, instruction);

        self.steps += 1;
        // 8-bit instruction pointer, wraps like the register file
        let mut next_ip = ip.wrapping_add(1);
        match self.execute(instruction, &mut next_ip) {
            Ok(false) => {
                self.ip = next_ip;
                Ok(Status::Running)
            }
            Ok(true) => {
                self.ip = next_ip;
                tracing::debug!("Exit after {} steps", self.steps);
                self.halt_with(HaltReason::Exit);
                Ok(Status::Halted)
            }
            // ip stays on the faulting instruction
            Err(fault) => Err(self.fault(ip, fault)),
        }
    }

    fn notify_run_start(&self) {
        for observer in &self.observers {
            observer.on_run_start();
        }
    }

    fn completion(&self, halt: HaltReason) -> Completion {
        Completion {
            output: self.io.output().to_vec(),
            registers: self.registers,
            halt,
            steps: self.steps,
        }
    }

    /// Steps until the machine halts. There is no instruction ceiling: a
    /// looping program never returns. Use [`Vm::run`] for untrusted programs.
    pub fn run_to_completion(&mut self) -> Completion {
        self.notify_run_start();
        loop {
            if let Some(reason) = self.halt {
                return self.completion(reason);
            }
            // Faults are recorded in `self.halt`.
            let _ = self.step();
        }
    }

    /// Steps until the machine halts or `max_steps` instructions have run.
    pub fn run(&mut self, max_steps: u64) -> Result<Completion, StepLimit> {
        self.notify_run_start();
        let mut executed = 0u64;
        loop {
            if let Some(reason) = self.halt {
                return Ok(self.completion(reason));
            }
            if executed >= max_steps {
                return Err(StepLimit(max_steps));
            }
            let _ = self.step();
            executed += 1;
        }
    }

    pub fn snapshot(&self) -> VmSnapshot {
        VmSnapshot {
            registers: self.registers.values(),
            ip: self.ip,
            flags: self.flags,
            memory: self.memory.as_slice().to_vec(),
            io: IoSnapshot {
                input: self.io.input().to_vec(),
                read_cursor: self.io.read_cursor(),
                output: self.io.output().to_vec(),
                read_budget: self.io.read_budget(),
                write_budget: self.io.write_budget(),
            },
            halt: self.halt,
            steps: self.steps,
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: &VmSnapshot) -> VmResult<()> {
        if snapshot.memory.len() != MEMORY_SIZE {
            return Err(VmError::InvalidSnapshot(snapshot.memory.len()));
        }
        self.registers = RegisterFile {
            values: snapshot.registers,
        };
        self.ip = snapshot.ip;
        self.flags = snapshot.flags;
        self.memory.load(&snapshot.memory);
        let io = &snapshot.io;
        self.io.restore(
            io.input.clone(),
            io.read_cursor,
            io.output.clone(),
            io.read_budget,
            io.write_budget,
        );
        self.halt = snapshot.halt;
        self.steps = snapshot.steps;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_sub_neg_exhaustive() {
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                assert_eq!(u16::from(add8(a, b)), (u16::from(a) + u16::from(b)) % 256);
                assert_eq!(
                    u16::from(sub8(a, b)),
                    (u16::from(a) + (256 - u16::from(b))) % 256
                );
            }
            assert_eq!(u16::from(neg8(a)), (256 - u16::from(a)) % 256);
        }
        assert_eq!(neg8(0), 0);
        assert_eq!(neg8(1), 255);
    }

    #[test]
    fn test_compare_zero_flag_boundaries() {
        assert!(compare(0, 0).contains(Flags::ZERO));
        assert!(!compare(0, 255).contains(Flags::ZERO));
        assert!(!compare(255, 0).contains(Flags::ZERO));
        assert!(compare(128, 128).contains(Flags::ZERO));
    }

    #[test]
    fn test_compare_zero_flag_exhaustive() {
        for a in 0..=255u8 {
            for b in 0..=255u8 {
                let expected = (u16::from(a) + (256 - u16::from(b))) % 256 == 0;
                assert_eq!(compare(a, b).contains(Flags::ZERO), expected);
            }
        }
    }

    #[test]
    fn test_compare_carry_and_sign() {
        // 0 + 256 sets bit 8
        assert_eq!(compare(0, 0), Flags::ZERO | Flags::CARRY);
        // 0 + 1 = 1: no carry, positive
        assert_eq!(compare(0, 255), Flags::empty());
        // 1 + 255 = 256 -> low byte 0, carry
        assert_eq!(compare(1, 1), Flags::ZERO | Flags::CARRY);
        // 5 + 250 = 255: sign set, no carry. Overflow compares the sign of
        // the result with the raw operands, so it is set too.
        assert_eq!(compare(5, 6), Flags::SIGN | Flags::OVERFLOW);
    }

    #[test]
    fn test_compare_overflow() {
        // 0x7F + 0xFF = 0x17E: low 0x7E, sign clear
        let flags = compare(0x7F, 0x01);
        assert!(!flags.contains(Flags::OVERFLOW));

        // 0x80 vs 0x80: signs equal, low 0 -> sign_r 0 != sign_a 1
        let flags = compare(0x80, 0x80);
        assert!(flags.contains(Flags::OVERFLOW));

        // 0x00 vs 0x7F: signs equal (0), 0 + 0x81 = 0x81 -> sign_r 1
        let flags = compare(0x00, 0x7F);
        assert!(flags.contains(Flags::OVERFLOW));
        assert!(flags.contains(Flags::SIGN));

        // differing signs never overflow
        assert!(!compare(0x80, 0x01).contains(Flags::OVERFLOW));
    }

    #[test]
    fn test_register_file_index() {
        let mut regs = RegisterFile::default();
        regs.set(Register::Rd, 9);
        assert_eq!(regs[Register::Rd], 9);
        assert_eq!(regs.values(), [0, 0, 0, 9, 0, 0]);
        assert_eq!(regs.iter().count(), 6);
    }
}
