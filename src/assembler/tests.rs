// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::{Assembler, Node};
use crate::core::error::{Diagnostic, Severity};
use crate::x86::InstructionSet;

fn parse_nodes(source: &str) -> Vec<Node> {
    let iset = InstructionSet::new();
    let mut asm = Assembler::new(&iset);
    asm.parse_source(source);
    asm.nodes().to_vec()
}

fn assemble_program(source: &str, base: u32) -> (String, Vec<Diagnostic>) {
    let iset = InstructionSet::new();
    let mut asm = Assembler::new(&iset);
    asm.parse_source(source);
    asm.process_nodes(base);
    let hex = asm.hexify();
    let diagnostics = asm.take_diagnostics();
    (hex, diagnostics)
}

fn error_messages(diagnostics: &[Diagnostic]) -> Vec<String> {
    diagnostics
        .iter()
        .filter(|diag| diag.severity() == Severity::Error)
        .map(|diag| diag.error().message().to_string())
        .collect()
}

// ── line classification ──

#[test]
fn comments_and_blank_lines_are_skipped() {
    let nodes = parse_nodes("; a comment\n\n   \nnop ; trailing\n");
    assert_eq!(nodes.len(), 1);
    match &nodes[0] {
        Node::Instruction(inst) => {
            assert_eq!(inst.text, "nop");
            assert_eq!(inst.line_nr, 4);
        }
        other => panic!("expected instruction node, got {other:?}"),
    }
}

#[test]
fn labels_split_off_their_statement() {
    let nodes = parse_nodes("start: mov eax, 1\nend:\n");
    assert_eq!(nodes.len(), 3);
    assert!(matches!(&nodes[0], Node::Label { name, .. } if name == "start"));
    assert!(matches!(&nodes[1], Node::Instruction(inst) if inst.text == "mov eax, 1"));
    assert!(matches!(&nodes[2], Node::Label { name, .. } if name == "end"));
}

#[test]
fn more_than_one_colon_is_reported() {
    let iset = InstructionSet::new();
    let mut asm = Assembler::new(&iset);
    asm.parse_source("a: b: nop\n");
    let messages = error_messages(asm.diagnostics());
    assert_eq!(messages, vec!["More than one ':' on line".to_string()]);
    // the leading label still lands in the node list
    assert!(matches!(&asm.nodes()[0], Node::Label { name, .. } if name == "a"));
}

#[test]
fn data_directives_expand_per_value() {
    let nodes = parse_nodes("db 0x12, 0x34, 0x56\n");
    let texts: Vec<&str> = nodes
        .iter()
        .map(|node| match node {
            Node::Instruction(inst) => inst.text.as_str(),
            other => panic!("expected instruction nodes, got {other:?}"),
        })
        .collect();
    assert_eq!(texts, vec!["db 0x12", "db 0x34", "db 0x56"]);
}

#[test]
fn single_value_data_lines_stay_whole() {
    let nodes = parse_nodes("dw 0x1234\n");
    assert_eq!(nodes.len(), 1);
    assert!(matches!(&nodes[0], Node::Instruction(inst) if inst.text == "dw 0x1234"));
}

#[test]
fn macro_lines_are_kept_and_diagnosed() {
    let iset = InstructionSet::new();
    let mut asm = Assembler::new(&iset);
    asm.parse_source("#winconst user32\n");
    assert!(matches!(&asm.nodes()[0], Node::Macro { text, .. } if text == "winconst user32"));
    assert_eq!(
        error_messages(asm.diagnostics()),
        vec!["Macro not found".to_string()]
    );
}

#[test]
fn relative_detection_covers_jumps_and_calls() {
    let nodes = parse_nodes("jmp x\nje x\ncall x\nmov eax, x\n");
    let relative: Vec<bool> = nodes
        .iter()
        .map(|node| match node {
            Node::Instruction(inst) => inst.is_relative(),
            other => panic!("expected instruction nodes, got {other:?}"),
        })
        .collect();
    assert_eq!(relative, vec![true, true, true, false]);
}

// ── whole programs ──

#[test]
fn a_self_jump_becomes_the_canonical_two_bytes() {
    let (hex, diagnostics) = assemble_program("L:\n jmp L\n", 0x401000);
    assert_eq!(hex, "ebfe");
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
}

#[test]
fn forward_jumps_stabilise_in_the_second_pass() {
    let (hex, diagnostics) = assemble_program("jmp end\nnop\nend:\n", 0);
    assert_eq!(hex, "eb0190");
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
}

#[test]
fn data_lists_concatenate() {
    let (hex, diagnostics) = assemble_program("db 0x12, 0x34\ndw 0x1234\ndd 1\n", 0);
    assert_eq!(hex, "1234341201000000");
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
}

#[test]
fn arithmetic_folds_before_encoding() {
    let (hex, diagnostics) = assemble_program("mov eax, 2*3+0x10\n", 0);
    assert_eq!(hex, "b816000000");
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
}

#[test]
fn absolute_label_references_add_the_code_base() {
    let (hex, diagnostics) = assemble_program("start:\nmov eax, start\n", 0x401000);
    assert_eq!(hex, "b800104000");
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
}

#[test]
fn label_plus_offset_arithmetic_combines_both_rewrites() {
    // start -> 0x401000, then +4 folds to decimal 4198404
    let (hex, diagnostics) = assemble_program("start:\nmov eax, start+4\n", 0x401000);
    assert_eq!(hex, "b804104000");
    assert!(diagnostics.is_empty(), "unexpected: {diagnostics:?}");
}

#[test]
fn fixed_addresses_turn_relative_calls_indirect() {
    let iset = InstructionSet::new();
    let mut asm = Assembler::new(&iset);
    asm.define_address("MessageBoxA", 0x1000);
    asm.parse_source("call MessageBoxA\n");
    asm.process_nodes(0x401000);
    assert_eq!(asm.hexify(), "ff1500100000");
    assert!(asm.diagnostics().is_empty());
}

#[test]
fn fixed_addresses_substitute_absolutely_elsewhere() {
    let iset = InstructionSet::new();
    let mut asm = Assembler::new(&iset);
    asm.define_address("buffer", 0x2000);
    asm.parse_source("mov eax, buffer\n");
    asm.process_nodes(0x401000);
    assert_eq!(asm.hexify(), "b800200000");
}

#[test]
fn duplicate_labels_are_reported() {
    let (_, diagnostics) = assemble_program("a:\na:\nnop\n", 0);
    let messages = error_messages(&diagnostics);
    assert!(
        messages.iter().any(|msg| msg == "Label already defined"),
        "missing duplicate-label diagnostic: {messages:?}"
    );
}

#[test]
fn undefined_labels_surface_as_match_failure() {
    let (hex, diagnostics) = assemble_program("jmp nowhere\n", 0);
    assert_eq!(hex, "");
    // the second pass skips unprocessed nodes, so the failure reports once
    assert_eq!(
        error_messages(&diagnostics),
        vec!["Instruction not found".to_string()]
    );
}

#[test]
fn substitution_matches_whole_tokens_only() {
    // `foo` must not rewrite inside `foo2`, so the reference stays unresolved
    let (hex, diagnostics) = assemble_program("foo:\njmp foo2\n", 0);
    assert_eq!(hex, "");
    assert!(error_messages(&diagnostics)
        .iter()
        .any(|msg| msg == "Instruction not found"));
}

#[test]
fn division_by_zero_reports_and_leaves_text() {
    let (_, diagnostics) = assemble_program("dd 1/0\n", 0);
    let messages = error_messages(&diagnostics);
    assert!(
        messages.iter().any(|msg| msg == "Error processing"),
        "missing arithmetic diagnostic: {messages:?}"
    );
    assert!(
        messages.iter().any(|msg| msg == "Instruction not found"),
        "the unevaluated text should fail to encode: {messages:?}"
    );
}

#[test]
fn shrinking_backward_jumps_report_size_changed() {
    // forty conservative 4-byte estimates put the backward target out of
    // rel8 range in the first pass; the real one-byte nops pull it back in,
    // so the second pass shrinks the jump and must say so
    let mut source = String::from("start:\n");
    for _ in 0..40 {
        source.push_str("nop\n");
    }
    source.push_str("jmp start\n");
    let (_, diagnostics) = assemble_program(&source, 0);
    assert!(
        error_messages(&diagnostics)
            .iter()
            .any(|msg| msg == "Size changed"),
        "expected size-change diagnostic: {diagnostics:?}"
    );
}

#[test]
fn processing_twice_is_idempotent() {
    let iset = InstructionSet::new();
    let mut asm = Assembler::new(&iset);
    asm.parse_source("start:\n mov eax, start\n jmp start\n db 1, 2\n");
    asm.process_nodes(0x401000);
    let first = asm.hexify();
    asm.process_nodes(0x401000);
    assert_eq!(asm.hexify(), first);
}

#[test]
fn assemble_concatenates_in_node_order() {
    let iset = InstructionSet::new();
    let mut asm = Assembler::new(&iset);
    asm.parse_source("nop\ninc eax\n");
    asm.process_nodes(0);
    assert_eq!(asm.assemble(), vec![0x90, 0x40]);
    assert_eq!(asm.size(), 2);
}

#[test]
fn parse_file_reads_programs_from_disk() {
    let dir = std::env::temp_dir().join("forge86-test-parse-file");
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let path = dir.join("prog.asm");
    std::fs::write(&path, "L:\n jmp L\n").expect("program should be writable");

    let iset = InstructionSet::new();
    let mut asm = Assembler::new(&iset);
    asm.parse_file(&path).expect("program should load");
    asm.process_nodes(0x401000);
    assert_eq!(asm.hexify(), "ebfe");

    let _ = std::fs::remove_file(&path);
}
