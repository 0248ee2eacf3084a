// Bass - 8-bit Virtual CPU Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::isa::MEMORY_SIZE;

/// Flat data memory addressed by register values.
///
/// The address type is `u8` and the backing array holds exactly
/// `MEMORY_SIZE` (256) bytes, so every access is in range without a check.
/// Widening registers or shrinking memory breaks that coupling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataMemory {
    data: [u8; MEMORY_SIZE],
}

impl Default for DataMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl DataMemory {
    pub fn new() -> Self {
        Self {
            data: [0; MEMORY_SIZE],
        }
    }

    pub fn read_u8(&self, addr: u8) -> u8 {
        self.data[usize::from(addr)]
    }

    pub fn write_u8(&mut self, addr: u8, value: u8) {
        self.data[usize::from(addr)] = value;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Copies `bytes` into memory starting at address 0. Returns false, leaving
    /// memory untouched, if `bytes` is longer than memory.
    pub fn load(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() > MEMORY_SIZE {
            return false;
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write_edges() {
        let mut mem = DataMemory::new();
        mem.write_u8(0, 42);
        mem.write_u8(255, 99);
        assert_eq!(mem.read_u8(0), 42);
        assert_eq!(mem.read_u8(255), 99);
        assert_eq!(mem.read_u8(128), 0);
    }

    #[test]
    fn test_load_rejects_oversized_image() {
        let mut mem = DataMemory::new();
        assert!(mem.load(&[1, 2, 3]));
        assert_eq!(mem.read_u8(2), 3);

        assert!(!mem.load(&[0xAA; MEMORY_SIZE + 1]));
        assert_eq!(mem.read_u8(0), 1);

        assert!(mem.load(&[0xBB; MEMORY_SIZE]));
        assert_eq!(mem.read_u8(255), 0xBB);
    }
}
