// Bass - 8-bit Virtual CPU Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::isa::Flags;
use crate::HaltReason;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VmSnapshot {
    /// Register file in `ra..rf` order.
    pub registers: [u8; 6],
    pub ip: u8,
    pub flags: Flags,
    pub memory: Vec<u8>,
    pub io: IoSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halt: Option<HaltReason>,
    pub steps: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IoSnapshot {
    pub input: Vec<u8>,
    pub read_cursor: usize,
    pub output: Vec<u8>,
    pub read_budget: u32,
    pub write_budget: u32,
}
