// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types and diagnostics for the assembler.
//!
//! Match failure during template scanning is `Option`-level data and never
//! reaches these types; a `Diagnostic` records something the user should see.

use std::fmt;

/// Categories of assembler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    Assembler,
    Cli,
    Expression,
    Instruction,
    Io,
    Parser,
    Symbol,
}

impl AsmErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AsmErrorKind::Assembler => "assembler",
            AsmErrorKind::Cli => "cli",
            AsmErrorKind::Expression => "expression",
            AsmErrorKind::Instruction => "instruction",
            AsmErrorKind::Io => "io",
            AsmErrorKind::Parser => "parser",
            AsmErrorKind::Symbol => "symbol",
        }
    }
}

/// An assembler error with a kind and message.
#[derive(Debug, Clone)]
pub struct AsmError {
    kind: AsmErrorKind,
    message: String,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, msg: &str, param: Option<&str>) -> Self {
        let message = match param {
            Some(param) => format!("{msg}: {param}"),
            None => msg.to_string(),
        };
        Self { kind, message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.kind
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AsmError {}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A diagnostic message with the line it refers to and, when available, the
/// source text of that line.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    line: u32,
    severity: Severity,
    error: AsmError,
    source: Option<String>,
}

impl Diagnostic {
    pub fn new(line: u32, severity: Severity, error: AsmError) -> Self {
        Self {
            line,
            severity,
            error,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// One-line rendering used by the CLI diagnostics sink.
    pub fn render(&self) -> String {
        match &self.source {
            Some(source) => format!(
                "{}: line {}: {} ({})",
                self.severity.as_str(),
                self.line,
                self.error.message(),
                source
            ),
            None => format!(
                "{}: line {}: {}",
                self.severity.as_str(),
                self.line,
                self.error.message()
            ),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
