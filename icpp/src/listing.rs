//! Source-interleaved listing of a compiled program (the `-s` mode).
//!
//! Prints the external preludes, then every source line followed by the
//! instructions emitted for it, then the data segment. Relative operands are
//! shown with their resolved absolute code offsets. The format is stable:
//! [`recognize`](fn.recognize.html) re-extracts the instruction stream from
//! a listing, and the tests hold it to that.

use std::fmt::Write as _;

use icvm::{constants, DataKind, Opcode, Program, Word};

pub fn listing(source: &str, program: &Program) -> String {
    let mut out = String::new();

    let prelude_len = program.externals().len() * constants::PRELUDE_WORDS;
    if prelude_len > 0 {
        out.push_str("; externals\n");
        let mut offset = 0;
        while offset < prelude_len {
            offset = write_instruction(&mut out, program, offset);
        }
    }

    for (index, text) in source.lines().enumerate() {
        let line = (index + 1) as u32;
        writeln!(out, "{:>4} | {}", line, text).expect("string writes are infallible");
        for range in program.line_ranges().iter().filter(|r| r.line == line) {
            let mut offset = range.start;
            while offset < range.end {
                offset = write_instruction(&mut out, program, offset);
            }
        }
    }

    out.push_str("; data\n");
    for entry in program.data_entries() {
        let words = &program.data()[entry.offset..entry.offset + entry.size];
        match entry.kind {
            DataKind::Str => {
                let bytes = util::read_c_string(words).unwrap_or_default();
                writeln!(
                    out,
                    "{:>6}: {} = \"{}\"",
                    entry.offset,
                    entry.name,
                    escape(&bytes)
                )
                .expect("string writes are infallible");
            }
            DataKind::Words => {
                let rendered: Vec<String> =
                    words.iter().map(|w| format!("0x{:08x}", w)).collect();
                writeln!(
                    out,
                    "{:>6}: {} = {}",
                    entry.offset,
                    entry.name,
                    rendered.join(" ")
                )
                .expect("string writes are infallible");
            }
        }
    }
    out
}

/// Prints the instruction at `offset` and returns the next offset.
fn write_instruction(out: &mut String, program: &Program, offset: usize) -> usize {
    let code = program.code();
    let word = code[offset];

    let opcode = match Opcode::from_word(word) {
        Some(opcode) => opcode,
        None => {
            writeln!(out, "{:>6}: ??? {}", offset, word).expect("string writes are infallible");
            return offset + 1;
        }
    };

    let mut text = format!("{:>6}: {}", offset, opcode);
    let mut next = offset + 1;
    if opcode.has_operand() {
        let imm = code[next];
        next += 1;
        if opcode.is_relative() {
            let target = next as i64 + i64::from(imm);
            write!(text, " {} -> {}", imm, target).expect("string writes are infallible");
        } else {
            write!(text, " {}", imm).expect("string writes are infallible");
        }
    }
    if let Some(comment) = program.comment(offset) {
        write!(text, "  ; {}", comment).expect("string writes are infallible");
    }
    out.push_str(&text);
    out.push('\n');
    next
}

fn escape(bytes: &[u8]) -> String {
    let mut out = String::new();
    for &b in bytes {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\t' => out.push_str("\\t"),
            b'\r' => out.push_str("\\r"),
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            other => out.push_str(&format!("\\x{:02x}", other)),
        }
    }
    out
}

/// Re-extracts the `(offset, opcode, immediate)` stream from a listing.
///
/// Instruction lines carry a bare code offset before the colon; source
/// lines and banners never parse as one, and the data section ends the
/// scan.
pub fn recognize(listing: &str) -> Vec<(usize, Opcode, Option<Word>)> {
    let mut out = Vec::new();
    for line in listing.lines() {
        if line == "; data" {
            break;
        }
        let mut parts = line.splitn(2, ':');
        let offset = match parts.next().and_then(|p| p.trim().parse::<usize>().ok()) {
            Some(offset) => offset,
            None => continue,
        };
        let rest = match parts.next() {
            Some(rest) => rest,
            None => continue,
        };
        let mut words = rest.split_whitespace();
        let opcode = match words.next().map(str::parse::<Opcode>) {
            Some(Ok(opcode)) => opcode,
            _ => continue,
        };
        let imm = if opcode.has_operand() {
            words.next().and_then(|w| w.parse::<Word>().ok())
        } else {
            None
        };
        out.push((offset, opcode, imm));
    }
    out
}

/// Decodes a program's code segment into the same shape `recognize`
/// produces, for comparing listings against the emitted stream.
pub fn decode(program: &Program) -> Vec<(usize, Opcode, Option<Word>)> {
    let code = program.code();
    let mut out = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        match Opcode::from_word(code[offset]) {
            Some(opcode) if opcode.has_operand() => {
                out.push((offset, opcode, Some(code[offset + 1])));
                offset += 2;
            }
            Some(opcode) => {
                out.push((offset, opcode, None));
                offset += 1;
            }
            None => {
                offset += 1;
            }
        }
    }
    out
}
