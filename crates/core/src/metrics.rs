// Bass - 8-bit Virtual CPU Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::decoder::Instruction;
use crate::{ExecutionObserver, HaltReason};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Debug)]
pub struct ExecutionMetrics {
    instruction_count: AtomicU64,
    by_mnemonic: Mutex<BTreeMap<&'static str, u64>>,
    halt: Mutex<Option<HaltReason>>,
    start_time: Mutex<Instant>,
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            instruction_count: AtomicU64::new(0),
            by_mnemonic: Mutex::new(BTreeMap::new()),
            halt: Mutex::new(None),
            start_time: Mutex::new(Instant::now()),
        }
    }

    pub fn get_instructions(&self) -> u64 {
        self.instruction_count.load(Ordering::SeqCst)
    }

    pub fn get_count(&self, mnemonic: &str) -> u64 {
        self.by_mnemonic
            .lock()
            .ok()
            .and_then(|m| m.get(mnemonic).copied())
            .unwrap_or(0)
    }

    /// Per-mnemonic counts, sorted by mnemonic.
    pub fn counts(&self) -> BTreeMap<&'static str, u64> {
        self.by_mnemonic
            .lock()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt.lock().ok().and_then(|h| *h)
    }

    pub fn get_ips(&self) -> f64 {
        let elapsed = self
            .start_time
            .lock()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        if elapsed > 0.0 {
            self.get_instructions() as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl ExecutionObserver for ExecutionMetrics {
    fn on_run_start(&self) {
        if let Ok(mut t) = self.start_time.lock() {
            *t = Instant::now();
        }
    }

    fn on_step(&self, _ip: u8, instruction: &Instruction) {
        self.instruction_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut m) = self.by_mnemonic.lock() {
            *m.entry(instruction.opcode().mnemonic()).or_insert(0) += 1;
        }
    }

    fn on_halt(&self, reason: &HaltReason) {
        if let Ok(mut h) = self.halt.lock() {
            *h = Some(*reason);
        }
    }
}
