// Bass - 8-bit Virtual CPU Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use bass_core::Register;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: &str = "1.0";

/// Why a run ended, as recorded in run results.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Runner failed before execution started (script, program or assembly error).
    ConfigError,
    MaxSteps,
    Exit,
    WriteExhausted,
    ReadExhausted,
    UnknownSyscall,
    BadInstruction,
    BadRegister,
}

impl StopReason {
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            StopReason::WriteExhausted
                | StopReason::ReadExhausted
                | StopReason::UnknownSyscall
                | StopReason::BadInstruction
                | StopReason::BadRegister
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunInputs {
    /// Assembly source (`.s`/`.asm`) or raw byte-code, relative to the script.
    pub program: String,
    /// Bytes served by the read syscall, as hex.
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunLimits {
    pub max_steps: u64,
    #[serde(default)]
    pub read_budget: u32,
    #[serde(default)]
    pub write_budget: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct OutputHexAssertion {
    pub output_hex: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RegisterValueDetails {
    pub register: Register,
    pub expected: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RegisterValueAssertion {
    pub register_value: RegisterValueDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MemoryValueDetails {
    pub address: u8,
    pub expected: u8,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MemoryValueAssertion {
    pub memory_value: MemoryValueDetails,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct HaltAssertion {
    pub expected_halt: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum RunAssertion {
    OutputHex(OutputHexAssertion),
    RegisterValue(RegisterValueAssertion),
    MemoryValue(MemoryValueAssertion),
    ExpectedHalt(HaltAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunScript {
    pub schema_version: String,
    pub inputs: RunInputs,
    pub limits: RunLimits,
    #[serde(default)]
    pub assertions: Vec<RunAssertion>,
}

impl RunScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read run script at {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        let script: Self =
            serde_yaml::from_str(contents).context("Failed to parse Run Script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '{}'",
                self.schema_version,
                SCHEMA_VERSION
            );
        }

        if self.inputs.program.trim().is_empty() {
            anyhow::bail!("Input 'program' path cannot be empty");
        }

        if self.limits.max_steps == 0 {
            anyhow::bail!("Limit 'max_steps' must be greater than zero");
        }

        if let Some(input) = &self.inputs.input {
            parse_hex(input).context("Input 'input' is not valid hex")?;
        }

        for assertion in &self.assertions {
            if let RunAssertion::OutputHex(a) = assertion {
                parse_hex(&a.output_hex).context("Assertion 'output_hex' is not valid hex")?;
            }
        }

        Ok(())
    }

    /// Program path, resolved against the directory holding the script.
    pub fn program_path(&self, script_path: &Path) -> PathBuf {
        let program = Path::new(&self.inputs.program);
        if program.is_absolute() {
            return program.to_path_buf();
        }
        script_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(program)
    }

    pub fn input_bytes(&self) -> Result<Vec<u8>> {
        match &self.inputs.input {
            Some(input) => parse_hex(input),
            None => Ok(Vec::new()),
        }
    }
}

/// Parses a hex byte string. Whitespace and a leading `0x` are ignored.
pub fn parse_hex(s: &str) -> Result<Vec<u8>> {
    let compact: String = s.split_whitespace().collect();
    let digits = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);
    hex::decode(digits).with_context(|| format!("Invalid hex string '{}'", s))
}
