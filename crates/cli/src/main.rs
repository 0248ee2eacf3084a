// Bass - 8-bit Virtual CPU Toolkit
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use bass_codegen::TableGenerator;
use bass_config::{parse_hex, RunAssertion, RunLimits, RunScript, StopReason};
use bass_core::metrics::ExecutionMetrics;
use bass_core::{assemble, disassemble, Fault, HaltReason, StepLimit, Vm};

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Parser, Debug)]
#[command(author, version, about = "Bass 8-bit virtual CPU toolkit", long_about = None)]
struct Cli {
    /// Enable instruction-level execution tracing
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assemble a source file into byte-code.
    Asm(AsmArgs),

    /// Print the instructions of a byte-code (or assembly) file.
    Disasm(DisasmArgs),

    /// Execute a program until it halts or the step limit is reached.
    Run(RunArgs),

    /// Deterministic, CI-friendly runner mode driven by a run script (YAML).
    Test(TestArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    /// Raw byte-code
    Bin,
    /// One instruction record per line
    Hex,
    /// C array
    C,
    /// Rust static
    Rust,
}

#[derive(Parser, Debug)]
struct AsmArgs {
    /// Path to the assembly source
    input: PathBuf,

    /// Where to write the assembled program
    #[arg(short, long)]
    output: PathBuf,

    /// Pad the program with zero records up to this many instructions
    #[arg(long)]
    slots: Option<usize>,

    #[arg(long, value_enum, default_value = "bin")]
    format: OutputFormat,

    /// Table name for `c`/`rust` output (defaults to the input file stem)
    #[arg(long)]
    name: Option<String>,
}

#[derive(Parser, Debug)]
struct DisasmArgs {
    /// Byte-code file, or assembly source (`.s`/`.asm`) to assemble first
    input: PathBuf,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Byte-code file, or assembly source (`.s`/`.asm`) to assemble first
    program: PathBuf,

    /// Bytes served by the read syscall, as hex
    #[arg(long)]
    input: Option<String>,

    #[arg(long, default_value = "0")]
    read_budget: u32,

    #[arg(long, default_value = "0")]
    write_budget: u32,

    /// Maximum number of instructions to execute
    #[arg(long, default_value = "100000")]
    max_steps: u64,

    /// Print a JSON run report on stdout
    #[arg(long)]
    json: bool,

    /// Write the final machine state (JSON) to this path
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct TestArgs {
    /// Path to the run script (YAML)
    #[arg(short = 'c', long)]
    script: PathBuf,

    /// Override max steps (takes precedence over script)
    #[arg(long)]
    max_steps: Option<u64>,

    /// Directory to write test artifacts (result.json, output.bin, snapshot.json)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunReport {
    status: String,
    stop_reason: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    fault: Option<Fault>,
    steps: u64,
    output_hex: String,
    registers: BTreeMap<String, u8>,
    instruction_counts: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TestResult {
    result_schema_version: String,
    status: String,
    steps_executed: u64,
    instructions: u64,
    stop_reason: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    fault: Option<Fault>,
    limits: RunLimits,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    assertions: Vec<AssertionResult>,
    output_hex: String,
    registers: BTreeMap<String, u8>,
    program_hash: String,
    config: TestConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct AssertionResult {
    assertion: RunAssertion,
    passed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct TestConfig {
    program: Option<PathBuf>,
    script: PathBuf,
}

/// Outcome of driving a machine for at most `max_steps` instructions.
struct Outcome {
    stop_reason: StopReason,
    fault: Option<Fault>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable.
    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Asm(args) => run_asm(args),
        Commands::Disasm(args) => run_disasm(args),
        Commands::Run(args) => run_program(args),
        Commands::Test(args) => run_test(args),
    }
}

fn is_assembly_source(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("s") | Some("asm")
    )
}

fn assemble_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read assembly source {:?}", path))?;
    let program = assemble(&source).with_context(|| format!("Failed to assemble {:?}", path))?;
    info!(
        "Assembled {:?}: {} instructions",
        path,
        program.bytes().len() / bass_core::isa::INSTRUCTION_SIZE
    );
    Ok(program.into_bytes())
}

/// Reads byte-code, assembling first when the path names a source file.
fn load_program(path: &Path) -> anyhow::Result<Vec<u8>> {
    if is_assembly_source(path) {
        assemble_file(path)
    } else {
        std::fs::read(path).with_context(|| format!("Failed to read program {:?}", path))
    }
}

fn program_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn register_map(vm: &Vm) -> BTreeMap<String, u8> {
    vm.registers()
        .iter()
        .map(|(reg, value)| (reg.name().to_string(), value))
        .collect()
}

fn stop_reason_for(halt: &HaltReason) -> StopReason {
    match halt {
        HaltReason::Exit => StopReason::Exit,
        HaltReason::Fault(fault) => match fault {
            Fault::WriteExhausted => StopReason::WriteExhausted,
            Fault::ReadExhausted => StopReason::ReadExhausted,
            Fault::UnknownSyscall { .. } => StopReason::UnknownSyscall,
            Fault::UnknownOpcode { .. } | Fault::IpOutOfBounds { .. } => {
                StopReason::BadInstruction
            }
            Fault::BadRegister { .. } => StopReason::BadRegister,
        },
    }
}

fn execute(vm: &mut Vm, max_steps: u64) -> Outcome {
    match vm.run(max_steps) {
        Ok(completion) => {
            let fault = match completion.halt {
                HaltReason::Fault(fault) => Some(fault),
                HaltReason::Exit => None,
            };
            Outcome {
                stop_reason: stop_reason_for(&completion.halt),
                fault,
            }
        }
        Err(StepLimit(limit)) => {
            warn!("Step limit of {} reached at ip={}", limit, vm.ip());
            Outcome {
                stop_reason: StopReason::MaxSteps,
                fault: None,
            }
        }
    }
}

fn report_metrics(vm: &Vm, metrics: &ExecutionMetrics) {
    info!("Execution finished.");
    info!("Final IP: {}", vm.ip());
    info!("Total Instructions: {}", metrics.get_instructions());
    info!("Average IPS: {:.2}", metrics.get_ips());
    for (mnemonic, count) in metrics.counts() {
        tracing::debug!("  {:<4} {}", mnemonic, count);
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
    }
    let file =
        std::fs::File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer_pretty(file, value)
        .with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

fn run_asm(args: AsmArgs) -> ExitCode {
    match assemble_to_file(&args) {
        Ok(()) => ExitCode::from(EXIT_PASS),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn assemble_to_file(args: &AsmArgs) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(&args.input)
        .with_context(|| format!("Failed to read assembly source {:?}", args.input))?;
    let program =
        assemble(&source).with_context(|| format!("Failed to assemble {:?}", args.input))?;
    let bytes = match args.slots {
        Some(slots) => program.padded(slots)?,
        None => program.into_bytes(),
    };

    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("program")
            .to_string(),
    };

    let rendered: Vec<u8> = match args.format {
        OutputFormat::Bin => bytes.clone(),
        OutputFormat::Hex => TableGenerator::hex_listing(&bytes).into_bytes(),
        OutputFormat::C => TableGenerator::c_array(&name, &bytes)?.into_bytes(),
        OutputFormat::Rust => TableGenerator::rust_static(&name, &bytes)?.into_bytes(),
    };

    std::fs::write(&args.output, rendered)
        .with_context(|| format!("Failed to write {:?}", args.output))?;
    info!(
        "Wrote {} bytes ({:?}) to {:?}",
        bytes.len(),
        args.format,
        args.output
    );
    Ok(())
}

fn run_disasm(args: DisasmArgs) -> ExitCode {
    let bytes = match load_program(&args.input) {
        Ok(b) => b,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    for (index, line) in disassemble(&bytes).iter().enumerate() {
        println!("{:3}: {}", index, line);
    }
    ExitCode::from(EXIT_PASS)
}

fn run_program(args: RunArgs) -> ExitCode {
    info!("Starting Bass VM");

    let program = match load_program(&args.program) {
        Ok(b) => b,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };
    let input = match args.input.as_deref().map(parse_hex).transpose() {
        Ok(input) => input.unwrap_or_default(),
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let metrics = Arc::new(ExecutionMetrics::new());
    let mut vm = Vm::new(program, input, args.read_budget, args.write_budget);
    vm.add_observer(metrics.clone());

    let outcome = execute(&mut vm, args.max_steps);
    report_metrics(&vm, &metrics);

    let output_hex = hex::encode(vm.output());
    if args.json {
        let report = RunReport {
            status: if outcome.stop_reason == StopReason::Exit {
                "exit".to_string()
            } else {
                "error".to_string()
            },
            stop_reason: outcome.stop_reason,
            fault: outcome.fault,
            steps: vm.steps(),
            output_hex,
            registers: register_map(&vm),
            instruction_counts: metrics
                .counts()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        };
        match serde_json::to_string(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize run report: {}", e),
        }
    } else {
        println!("{}", output_hex);
        for (reg, value) in vm.registers().iter() {
            info!("{} = {:#04x}", reg, value);
        }
    }

    if let Some(path) = &args.snapshot {
        match write_json(path, &vm.snapshot()) {
            Ok(()) => info!("Snapshot saved to {:?}", path),
            Err(e) => error!("{:#}", e),
        }
    }

    match outcome.stop_reason {
        StopReason::Exit => ExitCode::from(EXIT_PASS),
        reason => {
            match outcome.fault {
                Some(fault) => error!("Machine faulted: {}", fault),
                None => error!("Machine stopped: {:?}", reason),
            }
            ExitCode::from(EXIT_RUNTIME_ERROR)
        }
    }
}

fn run_test(args: TestArgs) -> ExitCode {
    let script = match RunScript::from_file(&args.script) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(&args, None, None, None, msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let limits = RunLimits {
        max_steps: args.max_steps.unwrap_or(script.limits.max_steps),
        ..script.limits.clone()
    };

    // Guard against accidentally huge runs from CI misconfiguration.
    const MAX_ALLOWED_STEPS: u64 = 50_000_000;
    if limits.max_steps == 0 || limits.max_steps > MAX_ALLOWED_STEPS {
        let msg = format!(
            "max_steps {} must be within 1..={}",
            limits.max_steps, MAX_ALLOWED_STEPS
        );
        error!("{}", msg);
        write_config_error_outputs(&args, None, None, Some(&limits), msg);
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    let program_path = script.program_path(&args.script);
    let program = match load_program(&program_path) {
        Ok(b) => b,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(&args, Some(&program_path), None, Some(&limits), msg);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let input = match script.input_bytes() {
        Ok(b) => b,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_config_error_outputs(
                &args,
                Some(&program_path),
                Some(&program),
                Some(&limits),
                msg,
            );
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let metrics = Arc::new(ExecutionMetrics::new());
    let mut vm = Vm::new(
        program.clone(),
        input,
        limits.read_budget,
        limits.write_budget,
    );
    vm.add_observer(metrics.clone());

    let outcome = execute(&mut vm, limits.max_steps);
    report_metrics(&vm, &metrics);

    let mut assertion_results = Vec::new();
    let mut all_passed = true;
    let mut expected_stop_reason_matched = false;

    for assertion in &script.assertions {
        let passed = evaluate_assertion(assertion, &vm, outcome.stop_reason);

        if matches!(assertion, RunAssertion::ExpectedHalt(_)) && passed {
            expected_stop_reason_matched = true;
        }

        if !passed {
            all_passed = false;
            error!(
                "Assertion failed: {:?} (output={})",
                assertion,
                hex::encode(vm.output())
            );
        }

        assertion_results.push(AssertionResult {
            assertion: assertion.clone(),
            passed,
        });
    }

    let runtime_error = outcome.stop_reason != StopReason::Exit;
    let (status, code) = if !all_passed {
        ("fail", EXIT_ASSERT_FAIL)
    } else if runtime_error && !expected_stop_reason_matched {
        ("error", EXIT_RUNTIME_ERROR)
    } else {
        ("pass", EXIT_PASS)
    };

    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        steps_executed: vm.steps(),
        instructions: metrics.get_instructions(),
        stop_reason: outcome.stop_reason,
        fault: outcome.fault,
        limits,
        message: None,
        assertions: assertion_results,
        output_hex: hex::encode(vm.output()),
        registers: register_map(&vm),
        program_hash: program_hash(&program),
        config: TestConfig {
            program: Some(program_path),
            script: args.script.clone(),
        },
    };
    write_outputs(&args, &result, Some(&vm));

    info!("Test {}: stop reason {:?}", status, result.stop_reason);
    ExitCode::from(code)
}

fn evaluate_assertion(assertion: &RunAssertion, vm: &Vm, stop_reason: StopReason) -> bool {
    match assertion {
        // Validated when the script was loaded.
        RunAssertion::OutputHex(a) => parse_hex(&a.output_hex)
            .map(|expected| expected == vm.output())
            .unwrap_or(false),
        RunAssertion::RegisterValue(a) => {
            vm.register(a.register_value.register) == a.register_value.expected
        }
        RunAssertion::MemoryValue(a) => {
            vm.memory().read_u8(a.memory_value.address) == a.memory_value.expected
        }
        RunAssertion::ExpectedHalt(a) => a.expected_halt == stop_reason,
    }
}

fn write_outputs(args: &TestArgs, result: &TestResult, vm: Option<&Vm>) {
    let Some(output_dir) = &args.output_dir else {
        return;
    };
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!("Failed to create output directory {:?}: {}", output_dir, e);
        return;
    }

    if let Err(e) = write_json(&output_dir.join("result.json"), result) {
        error!("{:#}", e);
    }

    if let Some(vm) = vm {
        if let Err(e) = write_json(&output_dir.join("snapshot.json"), &vm.snapshot()) {
            error!("{:#}", e);
        }
        let output_path = output_dir.join("output.bin");
        if let Err(e) = std::fs::write(&output_path, vm.output()) {
            error!("Failed to write output.bin: {}", e);
        }
    }
}

fn write_config_error_outputs(
    args: &TestArgs,
    program_path: Option<&PathBuf>,
    program_bytes: Option<&[u8]>,
    limits: Option<&RunLimits>,
    message: String,
) {
    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: "error".to_string(),
        steps_executed: 0,
        instructions: 0,
        stop_reason: StopReason::ConfigError,
        fault: None,
        limits: limits.cloned().unwrap_or(RunLimits {
            max_steps: 0,
            read_budget: 0,
            write_budget: 0,
        }),
        message: Some(message),
        assertions: Vec::new(),
        output_hex: String::new(),
        registers: BTreeMap::new(),
        program_hash: program_bytes.map(program_hash).unwrap_or_default(),
        config: TestConfig {
            program: program_path.cloned(),
            script: args.script.clone(),
        },
    };
    write_outputs(args, &result, None);
}
