// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

use crate::core::error::{AsmError, AsmErrorKind};
use crate::core::number::parse_number;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "Table-driven x86 assembler and disassembler.

Assembles a program file (labels, data directives, expressions) to flat
bytes, or works on a single instruction with -a/-d. The instruction table
is bundled; -t/--table swaps in a custom one.";

#[derive(Parser, Debug)]
#[command(
    name = "forge86",
    version = VERSION,
    about = "x86 assembler/disassembler with labels, data directives and expressions",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    /// Program file to assemble.
    #[arg(value_name = "FILE")]
    pub input: Option<PathBuf>,
    #[arg(
        short = 'a',
        long = "assemble",
        value_name = "TEXT",
        long_help = "Assemble a single instruction and print its hex encoding."
    )]
    pub assemble: Option<String>,
    #[arg(
        short = 'd',
        long = "disassemble",
        value_name = "HEX",
        long_help = "Disassemble a hex-encoded instruction and print its text form."
    )]
    pub disassemble: Option<String>,
    #[arg(
        short = 'b',
        long = "base",
        value_name = "ADDR",
        default_value = "0x401000",
        allow_hyphen_values = true,
        long_help = "Code base address used to resolve absolute label references. \
                     Accepts the assembler's literal bases (0x.., ..h, ..b, ..o, decimal)."
    )]
    pub base: String,
    #[arg(
        short = 'o',
        long = "outfile",
        value_name = "FILE",
        long_help = "Write the assembled bytes to FILE instead of printing hex."
    )]
    pub outfile: Option<PathBuf>,
    #[arg(
        short = 't',
        long = "table",
        value_name = "FILE",
        long_help = "Replace the bundled instruction table with the templates in FILE."
    )]
    pub table: Option<PathBuf>,
    #[arg(
        long = "format",
        value_enum,
        default_value_t = OutputFormat::Text,
        long_help = "Select output format. text is default; json emits a machine-readable payload."
    )]
    pub format: OutputFormat,
    #[arg(
        short = 'q',
        long = "quiet",
        action = ArgAction::SetTrue,
        long_help = "Suppress diagnostic output for successful runs."
    )]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// What a validated invocation asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    Assemble(String),
    Disassemble(String),
    Program(PathBuf),
}

/// Validated CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub mode: RunMode,
    pub base: u32,
    pub table: Option<PathBuf>,
    pub outfile: Option<PathBuf>,
    pub format: OutputFormat,
    pub quiet: bool,
}

/// Check argument combinations and resolve literal values.
pub fn validate_cli(cli: &Cli) -> Result<CliConfig, AsmError> {
    let mut modes: Vec<RunMode> = Vec::new();
    if let Some(text) = &cli.assemble {
        modes.push(RunMode::Assemble(text.clone()));
    }
    if let Some(hex) = &cli.disassemble {
        modes.push(RunMode::Disassemble(hex.clone()));
    }
    if let Some(path) = &cli.input {
        modes.push(RunMode::Program(path.clone()));
    }
    let mode = match modes.len() {
        0 => {
            return Err(AsmError::new(
                AsmErrorKind::Cli,
                "Nothing to do. Provide a program file, -a/--assemble or -d/--disassemble",
                None,
            ))
        }
        1 => modes.remove(0),
        _ => {
            return Err(AsmError::new(
                AsmErrorKind::Cli,
                "A program file, -a and -d are mutually exclusive",
                None,
            ))
        }
    };

    if cli.outfile.is_some() && !matches!(mode, RunMode::Program(_)) {
        return Err(AsmError::new(
            AsmErrorKind::Cli,
            "-o/--outfile requires a program file",
            None,
        ));
    }

    let base = parse_number(&cli.base)
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| {
            AsmError::new(
                AsmErrorKind::Cli,
                "Invalid base address",
                Some(&cli.base),
            )
        })?;

    Ok(CliConfig {
        mode,
        base,
        table: cli.table.clone(),
        outfile: cli.outfile.clone(),
        format: cli.format,
        quiet: cli.quiet,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("forge86").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn a_program_file_is_a_valid_mode() {
        let config = validate_cli(&parse(&["boot.asm"])).expect("should validate");
        assert_eq!(config.mode, RunMode::Program("boot.asm".into()));
        assert_eq!(config.base, 0x401000);
    }

    #[test]
    fn single_instruction_modes_validate() {
        let config = validate_cli(&parse(&["-a", "nop"])).expect("should validate");
        assert_eq!(config.mode, RunMode::Assemble("nop".to_string()));

        let config = validate_cli(&parse(&["-d", "90"])).expect("should validate");
        assert_eq!(config.mode, RunMode::Disassemble("90".to_string()));
    }

    #[test]
    fn modes_are_mutually_exclusive() {
        assert!(validate_cli(&parse(&["-a", "nop", "-d", "90"])).is_err());
        assert!(validate_cli(&parse(&["boot.asm", "-a", "nop"])).is_err());
        assert!(validate_cli(&parse(&[])).is_err());
    }

    #[test]
    fn base_address_accepts_assembler_literals() {
        let config = validate_cli(&parse(&["boot.asm", "-b", "401000h"])).expect("should validate");
        assert_eq!(config.base, 0x401000);
        assert!(validate_cli(&parse(&["boot.asm", "-b", "zzz"])).is_err());
        assert!(validate_cli(&parse(&["boot.asm", "-b", "-1"])).is_err());
    }

    #[test]
    fn outfile_requires_a_program() {
        assert!(validate_cli(&parse(&["-a", "nop", "-o", "out.bin"])).is_err());
        assert!(validate_cli(&parse(&["boot.asm", "-o", "out.bin"])).is_ok());
    }
}
