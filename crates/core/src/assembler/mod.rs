// Bass - 8-bit Virtual CPU Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Two-pass assembler for Bass assembly text.
//!
//! Each line is blank, a comment (`; ...`), a label declaration (`<name>`),
//! or an instruction `mnemonic a b`. Labels bind to the index of the next
//! instruction and may be referenced before they are declared, so the first
//! pass only collects labels and the second pass emits bytes.

use crate::isa::{
    Opcode, Register, Syscall, COMMENT_MARKER, INSTRUCTION_SIZE, LABEL_MARKER, MAX_INSTRUCTIONS,
};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsmErrorKind {
    #[error("unknown opcode '{0}'")]
    UnknownOpcode(String),
    #[error("invalid operand '{0}'")]
    InvalidOperand(String),
    #[error("operand '{0}' is outside 0..=255")]
    OperandRangeError(String),
    #[error("expected 2 operands, found {0}")]
    OperandCount(usize),
    #[error("label '{0}' is declared more than once")]
    DuplicateLabel(String),
    #[error("unexpected '{0}' after label; a label must stand alone on its line")]
    LabelTrailingTokens(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsmError {
    #[error("line {line}: {kind}: `{text}`")]
    Line {
        line: usize,
        text: String,
        kind: AsmErrorKind,
    },
    #[error("program has {0} instructions, at most {MAX_INSTRUCTIONS} are addressable")]
    ProgramTooLarge(usize),
    #[error("program of {instructions} instructions does not fit {capacity} slots")]
    CapacityExceeded { instructions: usize, capacity: usize },
}

impl AsmError {
    pub fn kind(&self) -> Option<&AsmErrorKind> {
        match self {
            AsmError::Line { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn line_number(&self) -> Option<usize> {
        match self {
            AsmError::Line { line, .. } => Some(*line),
            _ => None,
        }
    }
}

pub type AsmResult<T> = Result<T, AsmError>;

/// Assembled byte-code: `3 * len()` bytes of `[opcode][a][b]` records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    bytes: Vec<u8>,
}

impl Program {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Number of instruction records.
    pub fn len(&self) -> usize {
        self.bytes.len() / INSTRUCTION_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Byte-code zero-padded to exactly `slots` instruction records.
    pub fn padded(&self, slots: usize) -> AsmResult<Vec<u8>> {
        if self.len() > slots {
            return Err(AsmError::CapacityExceeded {
                instructions: self.len(),
                capacity: slots,
            });
        }
        let mut out = self.bytes.clone();
        out.resize(slots * INSTRUCTION_SIZE, 0);
        Ok(out)
    }
}

enum Line<'a> {
    Instruction {
        opcode: Opcode,
        operands: Vec<&'a str>,
    },
    Label(&'a str),
}

struct SourceLine<'a> {
    number: usize,
    text: &'a str,
    line: Line<'a>,
}

impl SourceLine<'_> {
    fn error(&self, kind: AsmErrorKind) -> AsmError {
        AsmError::Line {
            line: self.number,
            text: self.text.trim().to_string(),
            kind,
        }
    }
}

/// Classifies every line. Blank and comment lines are dropped.
fn scan(source: &str) -> AsmResult<Vec<SourceLine<'_>>> {
    let mut lines = Vec::new();
    for (i, text) in source.lines().enumerate() {
        let tokens: Vec<&str> = text
            .split_whitespace()
            .take_while(|t| !t.starts_with(COMMENT_MARKER))
            .collect();
        let Some((&first, rest)) = tokens.split_first() else {
            continue;
        };

        let line = if first.starts_with(LABEL_MARKER) {
            if let Some(&extra) = rest.first() {
                return Err(AsmError::Line {
                    line: i + 1,
                    text: text.trim().to_string(),
                    kind: AsmErrorKind::LabelTrailingTokens(extra.to_string()),
                });
            }
            Line::Label(first)
        } else if let Some(opcode) = Opcode::from_mnemonic(first) {
            Line::Instruction {
                opcode,
                operands: rest.to_vec(),
            }
        } else {
            return Err(AsmError::Line {
                line: i + 1,
                text: text.trim().to_string(),
                kind: AsmErrorKind::UnknownOpcode(first.to_string()),
            });
        };

        lines.push(SourceLine {
            number: i + 1,
            text,
            line,
        });
    }
    Ok(lines)
}

/// Pass 1: binds each label to the index of the next instruction.
fn collect_labels<'a>(lines: &[SourceLine<'a>]) -> AsmResult<HashMap<&'a str, usize>> {
    let mut labels = HashMap::new();
    let mut counter = 0usize;
    for source in lines {
        match source.line {
            Line::Label(name) => {
                if labels.insert(name, counter).is_some() {
                    return Err(source.error(AsmErrorKind::DuplicateLabel(name.to_string())));
                }
                tracing::debug!("Label {} refers to instruction {}", name, counter);
            }
            Line::Instruction { .. } => counter += 1,
        }
    }
    if counter > MAX_INSTRUCTIONS {
        return Err(AsmError::ProgramTooLarge(counter));
    }
    Ok(labels)
}

fn looks_numeric(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()),
    }
}

fn parse_literal(token: &str) -> Option<i64> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -value } else { value })
}

/// Resolves one operand token: register, then syscall, then label, then
/// integer literal.
fn resolve_operand(token: &str, labels: &HashMap<&str, usize>) -> Result<u8, AsmErrorKind> {
    if let Some(reg) = Register::from_name(token) {
        return Ok(reg.code());
    }
    if let Some(sys) = Syscall::from_name(token) {
        return Ok(sys.code());
    }
    let value = if let Some(&index) = labels.get(token) {
        index as i64
    } else if looks_numeric(token) {
        parse_literal(token).ok_or_else(|| AsmErrorKind::OperandRangeError(token.to_string()))?
    } else {
        return Err(AsmErrorKind::InvalidOperand(token.to_string()));
    };
    u8::try_from(value).map_err(|_| AsmErrorKind::OperandRangeError(token.to_string()))
}

/// Assembles `source` into byte-code. Either the whole program assembles or
/// an error is returned; partial output is never produced.
pub fn assemble(source: &str) -> AsmResult<Program> {
    let lines = scan(source)?;
    let labels = collect_labels(&lines)?;

    let mut bytes = Vec::with_capacity(lines.len() * INSTRUCTION_SIZE);
    for source in &lines {
        let Line::Instruction {
            opcode,
            ref operands,
        } = source.line
        else {
            continue;
        };
        if operands.len() != 2 {
            return Err(source.error(AsmErrorKind::OperandCount(operands.len())));
        }
        let a = resolve_operand(operands[0], &labels).map_err(|k| source.error(k))?;
        let b = resolve_operand(operands[1], &labels).map_err(|k| source.error(k))?;
        bytes.extend_from_slice(&[opcode.code(), a, b]);
    }

    tracing::debug!(
        "Assembled {} instructions ({} labels)",
        bytes.len() / INSTRUCTION_SIZE,
        labels.len()
    );
    Ok(Program { bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_basic_program() {
        let program = assemble("imm ra 5\nimm rb 3\nadd ra rb\n").unwrap();
        assert_eq!(
            program.bytes(),
            &[0x42, 0x01, 5, 0x42, 0x02, 3, 0x40, 0x01, 0x02]
        );
        assert_eq!(program.len(), 3);
    }

    #[test]
    fn test_forward_label_binds_to_next_instruction() {
        let src = "jmp <end> 0\nimm ra 1\n<end>\nimm ra 2\n";
        let program = assemble(src).unwrap();
        // jmp operand is index 2, not the jump's own index 0
        assert_eq!(&program.bytes()[0..3], &[0x47, 2, 0]);
        assert_eq!(program.len(), 3);
    }

    #[test]
    fn test_backward_label_and_comments() {
        let src = "; countdown\n<top>\n  sub ra rb ; step\n  jne <top> 0\n\n";
        let program = assemble(src).unwrap();
        assert_eq!(program.bytes(), &[0x41, 0x01, 0x02, 0x48, 0, 0]);
    }

    #[test]
    fn test_syscall_names_and_hex_literals() {
        let program = assemble("imm ra sw\nimm rb 0x41\nsys 0 0").unwrap();
        assert_eq!(
            program.bytes(),
            &[0x42, 0x01, 0x10, 0x42, 0x02, 0x41, 0x46, 0, 0]
        );
    }

    #[test]
    fn test_register_name_wins_over_label() {
        // A label can never be named like a register since labels start with '<',
        // but a bare token that is a register name always resolves as a register.
        let program = assemble("mov rf ra").unwrap();
        assert_eq!(program.bytes(), &[0x39, 0x20, 0x01]);
    }

    #[test]
    fn test_unknown_opcode_reports_line() {
        let err = assemble("imm ra 1\nnop 0 0\n").unwrap_err();
        assert_eq!(err.line_number(), Some(2));
        assert_eq!(
            err.kind(),
            Some(&AsmErrorKind::UnknownOpcode("nop".to_string()))
        );
    }

    #[test]
    fn test_invalid_operand() {
        let err = assemble("imm ra <missing>").unwrap_err();
        assert_eq!(
            err.kind(),
            Some(&AsmErrorKind::InvalidOperand("<missing>".to_string()))
        );
        let err = assemble("imm ra banana").unwrap_err();
        assert!(matches!(err.kind(), Some(AsmErrorKind::InvalidOperand(_))));
    }

    #[test]
    fn test_operand_range() {
        for bad in ["256", "-1", "0x100", "99999999999999999999999"] {
            let err = assemble(&format!("imm ra {}", bad)).unwrap_err();
            assert_eq!(
                err.kind(),
                Some(&AsmErrorKind::OperandRangeError(bad.to_string())),
                "token {}",
                bad
            );
        }
        assert!(assemble("imm ra 255").is_ok());
        assert!(assemble("imm ra -0").is_ok());
    }

    #[test]
    fn test_operand_count() {
        let err = assemble("add ra").unwrap_err();
        assert_eq!(err.kind(), Some(&AsmErrorKind::OperandCount(1)));
        let err = assemble("add ra rb rc").unwrap_err();
        assert_eq!(err.kind(), Some(&AsmErrorKind::OperandCount(3)));
    }

    #[test]
    fn test_duplicate_label() {
        let err = assemble("<a>\nimm ra 1\n<a>\n").unwrap_err();
        assert_eq!(err.line_number(), Some(3));
        assert!(matches!(err.kind(), Some(AsmErrorKind::DuplicateLabel(_))));
    }

    #[test]
    fn test_label_index_past_255_is_range_error() {
        let mut src = String::from("jmp <end> 0\n");
        for _ in 0..255 {
            src.push_str("imm ra 0\n");
        }
        src.push_str("<end>\n");
        // 256 instructions: <end> binds to index 256
        let err = assemble(&src).unwrap_err();
        assert_eq!(
            err.kind(),
            Some(&AsmErrorKind::OperandRangeError("<end>".to_string()))
        );
    }

    #[test]
    fn test_program_too_large() {
        let src = "imm ra 0\n".repeat(MAX_INSTRUCTIONS + 1);
        assert_eq!(
            assemble(&src).unwrap_err(),
            AsmError::ProgramTooLarge(MAX_INSTRUCTIONS + 1)
        );
    }

    #[test]
    fn test_padding_to_slot_capacity() {
        let program = assemble("imm ra 1\nsys 0 0").unwrap();
        let padded = program.padded(4).unwrap();
        assert_eq!(padded.len(), 12);
        assert_eq!(&padded[6..], &[0; 6]);
        assert_eq!(
            program.padded(1).unwrap_err(),
            AsmError::CapacityExceeded {
                instructions: 2,
                capacity: 1
            }
        );
    }

    #[test]
    fn test_label_must_stand_alone() {
        let err = assemble("imm rb 1\n<start> imm ra 7\n").unwrap_err();
        assert_eq!(err.line_number(), Some(2));
        assert_eq!(
            err.kind(),
            Some(&AsmErrorKind::LabelTrailingTokens("imm".to_string()))
        );

        // A trailing comment is not an extra token.
        let program = assemble("<start> ; entry\nimm ra 7\n").unwrap();
        assert_eq!(program.bytes(), &[0x42, 0x01, 7]);
    }

    #[test]
    fn test_empty_source() {
        let program = assemble("\n; nothing here\n").unwrap();
        assert!(program.is_empty());
    }
}
