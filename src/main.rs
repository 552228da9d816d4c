// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for forge86.

use std::fs;
use std::process::ExitCode;

use clap::Parser;

use forge86::assembler::cli::{validate_cli, Cli, CliConfig, OutputFormat, RunMode};
use forge86::assembler::Assembler;
use forge86::core::error::Diagnostic;
use forge86::x86::InstructionSet;

fn emit_diagnostics(diagnostics: &[Diagnostic], quiet: bool, failed: bool) {
    if quiet && !failed {
        return;
    }
    for diag in diagnostics {
        eprintln!("{}", diag.render());
    }
}

fn diagnostics_json(diagnostics: &[Diagnostic]) -> serde_json::Value {
    serde_json::Value::Array(
        diagnostics
            .iter()
            .map(|diag| {
                serde_json::json!({
                    "line": diag.line(),
                    "severity": diag.severity().as_str(),
                    "message": diag.error().message(),
                    "source": diag.source(),
                })
            })
            .collect(),
    )
}

fn load_instruction_set(config: &CliConfig) -> Result<InstructionSet, String> {
    let mut iset = InstructionSet::new();
    if let Some(path) = &config.table {
        iset.parse_file(path)
            .map_err(|err| format!("Failed to read table {}: {err}", path.display()))?;
        if iset.templates().is_empty() {
            return Err(format!("Table {} holds no templates", path.display()));
        }
    }
    Ok(iset)
}

fn run(config: &CliConfig) -> Result<ExitCode, String> {
    let iset = load_instruction_set(config)?;

    match &config.mode {
        RunMode::Assemble(text) => {
            let hex = iset
                .assemble_hex(text)
                .ok_or_else(|| format!("Instruction not found: {text}"))?;
            match config.format {
                OutputFormat::Text => println!("{hex}"),
                OutputFormat::Json => println!("{}", serde_json::json!({ "hex": hex })),
            }
            Ok(ExitCode::SUCCESS)
        }
        RunMode::Disassemble(hex) => {
            let text = iset
                .disassemble_hex(hex)
                .ok_or_else(|| format!("No instruction decodes: {hex}"))?;
            match config.format {
                OutputFormat::Text => println!("{text}"),
                OutputFormat::Json => println!("{}", serde_json::json!({ "text": text })),
            }
            Ok(ExitCode::SUCCESS)
        }
        RunMode::Program(path) => {
            let mut assembler = Assembler::new(&iset);
            assembler
                .parse_file(path)
                .map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
            assembler.process_nodes(config.base);

            let failed = assembler.has_errors();
            let bytes = assembler.assemble();
            let hex = assembler.hexify();

            match config.format {
                OutputFormat::Text => {
                    emit_diagnostics(assembler.diagnostics(), config.quiet, failed);
                    if !failed {
                        if let Some(outfile) = &config.outfile {
                            fs::write(outfile, &bytes).map_err(|err| {
                                format!("Failed to write {}: {err}", outfile.display())
                            })?;
                        } else {
                            println!("{hex}");
                        }
                    }
                }
                OutputFormat::Json => {
                    let payload = serde_json::json!({
                        "hex": hex,
                        "size": bytes.len(),
                        "ok": !failed,
                        "diagnostics": diagnostics_json(assembler.diagnostics()),
                    });
                    println!("{payload}");
                    if !failed {
                        if let Some(outfile) = &config.outfile {
                            fs::write(outfile, &bytes).map_err(|err| {
                                format!("Failed to write {}: {err}", outfile.display())
                            })?;
                        }
                    }
                }
            }

            Ok(if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match validate_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    match run(&config) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
