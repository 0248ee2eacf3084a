// Bass - 8-bit Virtual CPU Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

/// Syscall I/O channel: an input buffer consumed through a cursor, an output
/// buffer, and read/write budgets that only ever decrease.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IoChannel {
    input: Vec<u8>,
    read_cursor: usize,
    output: Vec<u8>,
    read_budget: u32,
    write_budget: u32,
}

impl IoChannel {
    pub fn new(input: Vec<u8>, read_budget: u32, write_budget: u32) -> Self {
        Self {
            input,
            read_cursor: 0,
            output: Vec::new(),
            read_budget,
            write_budget,
        }
    }

    /// Takes the next input byte. `None` when the read budget is spent or the
    /// input buffer has been fully consumed.
    pub fn read(&mut self) -> Option<u8> {
        if self.read_budget == 0 {
            return None;
        }
        let byte = *self.input.get(self.read_cursor)?;
        self.read_cursor += 1;
        self.read_budget -= 1;
        Some(byte)
    }

    /// Appends a byte to the output. Returns false when the write budget is spent.
    pub fn write(&mut self, byte: u8) -> bool {
        if self.write_budget == 0 {
            return false;
        }
        self.output.push(byte);
        self.write_budget -= 1;
        true
    }

    pub fn input(&self) -> &[u8] {
        &self.input
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn read_cursor(&self) -> usize {
        self.read_cursor
    }

    pub fn read_budget(&self) -> u32 {
        self.read_budget
    }

    pub fn write_budget(&self) -> u32 {
        self.write_budget
    }

    pub(crate) fn restore(
        &mut self,
        input: Vec<u8>,
        read_cursor: usize,
        output: Vec<u8>,
        read_budget: u32,
        write_budget: u32,
    ) {
        self.input = input;
        self.read_cursor = read_cursor.min(self.input.len());
        self.output = output;
        self.read_budget = read_budget;
        self.write_budget = write_budget;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_consumes_budget_and_cursor() {
        let mut io = IoChannel::new(vec![7, 8, 9], 2, 0);
        assert_eq!(io.read(), Some(7));
        assert_eq!(io.read(), Some(8));
        assert_eq!(io.read_budget(), 0);
        assert_eq!(io.read(), None);
        assert_eq!(io.read_cursor(), 2);
    }

    #[test]
    fn test_read_past_input_end_fails_without_spending_budget() {
        let mut io = IoChannel::new(vec![1], 5, 0);
        assert_eq!(io.read(), Some(1));
        assert_eq!(io.read(), None);
        assert_eq!(io.read_budget(), 4);
    }

    #[test]
    fn test_write_budget() {
        let mut io = IoChannel::new(Vec::new(), 0, 1);
        assert!(io.write(65));
        assert!(!io.write(66));
        assert_eq!(io.output(), &[65]);
        assert_eq!(io.write_budget(), 0);
    }
}
