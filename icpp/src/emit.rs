//! Appends instructions to the code segment.
//!
//! The emitter owns the growing code segment, the per-line range map and the
//! per-offset comments the listing prints. Relative-address instructions are
//! given their *absolute* target; the emitter rewrites it into the signed
//! displacement relative to the word following the operand. Forward branches
//! are emitted through [`Fixup`](struct.Fixup.html) records that must be
//! resolved exactly once; the record is consumed by resolution, so a
//! forgotten or double patch is a compile error here rather than a bad jump
//! at run time.

use std::collections::HashMap;
use std::fmt;

use icvm::{enum_to_word, LineRange, Opcode, Word};
use num_traits::ToPrimitive;

/// A branch whose displacement does not fit in a word.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TooFar;

impl fmt::Display for TooFar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("branch distance does not fit in a word")
    }
}

/// An unresolved forward branch: the code offset of its opcode word.
///
/// Not copyable; resolving consumes it.
#[must_use = "an unresolved branch leaves a zero displacement behind"]
#[derive(Debug)]
pub struct Fixup {
    offset: usize,
}

/// Rollback point for speculative parses (`sizeof` discards its operand's
/// code).
#[derive(Debug)]
pub struct Checkpoint {
    code_len: usize,
    ranges_len: usize,
    last_range_end: usize,
}

#[derive(Default)]
pub struct Emitter {
    code: Vec<Word>,
    line_ranges: Vec<LineRange>,
    comments: HashMap<usize, String>,
    current_line: u32,
    last_offset: usize,
}

impl Emitter {
    pub fn new() -> Emitter {
        Emitter::default()
    }

    /// Sets the source line subsequently emitted code is attributed to.
    pub fn set_line(&mut self, line: u32) {
        self.current_line = line;
    }

    /// Current end of the code segment.
    pub fn here(&self) -> usize {
        self.code.len()
    }

    /// Emits an operand-less instruction.
    pub fn emit(&mut self, op: Opcode) {
        debug_assert!(!op.has_operand());
        self.append(op, None);
    }

    /// Emits an instruction with an absolute immediate (not a displacement).
    pub fn emit_with(&mut self, op: Opcode, imm: Word) {
        debug_assert!(op.has_operand() && !op.is_relative());
        self.append(op, Some(imm));
    }

    /// Emits a branch or call aimed at a known absolute code offset,
    /// encoding the displacement relative to the word after the operand.
    pub fn emit_branch(&mut self, op: Opcode, target: usize) -> Result<(), TooFar> {
        debug_assert!(op.is_relative());
        let displacement = displacement(self.here() + 2, target)?;
        self.append(op, Some(displacement));
        Ok(())
    }

    /// Emits a branch with an unresolved forward target.
    pub fn emit_branch_fixup(&mut self, op: Opcode) -> Fixup {
        debug_assert!(op.is_relative());
        let offset = self.here();
        self.append(op, Some(0));
        Fixup { offset }
    }

    /// Points the branch at the current end of the code segment.
    pub fn resolve(&mut self, fixup: Fixup) -> Result<(), TooFar> {
        let opcode = Opcode::from_word(self.code[fixup.offset]);
        debug_assert!(opcode.map_or(false, Opcode::is_relative));
        self.code[fixup.offset + 1] = displacement(fixup.offset + 2, self.here())?;
        Ok(())
    }

    /// Rewrites the operand of the instruction at `offset` in place. Used to
    /// grow an `ENTER`'s locals size as declarations are parsed.
    pub fn set_operand(&mut self, offset: usize, imm: Word) {
        let opcode = Opcode::from_word(self.code[offset]);
        debug_assert!(opcode.map_or(false, Opcode::has_operand));
        self.code[offset + 1] = imm;
    }

    /// Attaches a listing comment to the most recently emitted instruction.
    pub fn comment(&mut self, text: &str) {
        self.comments.insert(self.last_offset, text.to_string());
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            code_len: self.code.len(),
            ranges_len: self.line_ranges.len(),
            last_range_end: self.line_ranges.last().map_or(0, |r| r.end),
        }
    }

    /// Discards everything emitted since the checkpoint.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.code.truncate(checkpoint.code_len);
        self.comments.retain(|&offset, _| offset < checkpoint.code_len);
        self.line_ranges.truncate(checkpoint.ranges_len);
        if let Some(last) = self.line_ranges.last_mut() {
            last.end = checkpoint.last_range_end;
        }
    }

    pub fn into_parts(self) -> (Vec<Word>, Vec<LineRange>, HashMap<usize, String>) {
        (self.code, self.line_ranges, self.comments)
    }

    fn append(&mut self, op: Opcode, imm: Option<Word>) {
        let start = self.code.len();
        self.last_offset = start;
        tracing::trace!("emit {:>6}: {} {:?}", start, op, imm);
        self.code.push(enum_to_word(op));
        if let Some(imm) = imm {
            self.code.push(imm);
        }
        let end = self.code.len();

        match self.line_ranges.last_mut() {
            Some(last) if last.line == self.current_line && last.end == start => {
                last.end = end;
            }
            _ => self.line_ranges.push(LineRange {
                line: self.current_line,
                start,
                end,
            }),
        }
    }
}

/// Displacement stored in a branch operand at `operand_end` (the offset of
/// the word following the operand) aimed at absolute `target`.
fn displacement(operand_end: usize, target: usize) -> Result<Word, TooFar> {
    (target as i64 - operand_end as i64).to_i32().ok_or(TooFar)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn one_and_two_word_instructions() {
        let mut emitter = Emitter::new();
        emitter.emit_with(Opcode::MOV, 5);
        emitter.emit(Opcode::PUSH);
        let (code, _, _) = emitter.into_parts();
        assert_eq!(
            code,
            vec![enum_to_word(Opcode::MOV), 5, enum_to_word(Opcode::PUSH)]
        );
    }

    #[test]
    fn backward_branch_displacement() {
        let mut emitter = Emitter::new();
        emitter.emit(Opcode::PUSH);
        let target = emitter.here();
        emitter.emit(Opcode::POP);
        emitter.emit_branch(Opcode::JMP, target).unwrap();
        let (code, _, _) = emitter.into_parts();
        // JMP sits at offset 2; the word after its operand is 4.
        assert_eq!(code[3], target as Word - 4);
    }

    #[test]
    fn forward_fixup_resolves_to_here() {
        let mut emitter = Emitter::new();
        let fixup = emitter.emit_branch_fixup(Opcode::JZ);
        emitter.emit_with(Opcode::MOV, 1);
        emitter.emit(Opcode::PUSH);
        emitter.resolve(fixup).unwrap();

        let (code, _, _) = emitter.into_parts();
        let operand_offset = 1;
        // Branch resolution invariant: operand offset + 1 + displacement
        // equals the patched absolute target.
        assert_eq!(operand_offset + 1 + code[operand_offset] as usize, 5);
    }

    #[test]
    fn line_ranges_extend_and_split() {
        let mut emitter = Emitter::new();
        emitter.set_line(1);
        emitter.emit_with(Opcode::MOV, 1);
        emitter.emit(Opcode::PUSH);
        emitter.set_line(3);
        emitter.emit(Opcode::POP);
        let (_, ranges, _) = emitter.into_parts();
        assert_eq!(ranges.len(), 2);
        assert_eq!((ranges[0].line, ranges[0].start, ranges[0].end), (1, 0, 3));
        assert_eq!((ranges[1].line, ranges[1].start, ranges[1].end), (3, 3, 4));
    }

    #[test]
    fn rollback_discards_speculative_code() {
        let mut emitter = Emitter::new();
        emitter.set_line(1);
        emitter.emit_with(Opcode::MOV, 1);
        let checkpoint = emitter.checkpoint();
        emitter.emit_with(Opcode::MOV, 2);
        emitter.comment("gone");
        emitter.rollback(checkpoint);
        emitter.emit(Opcode::PUSH);

        let (code, ranges, comments) = emitter.into_parts();
        assert_eq!(
            code,
            vec![enum_to_word(Opcode::MOV), 1, enum_to_word(Opcode::PUSH)]
        );
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].end, 3);
        assert!(comments.is_empty());
    }
}
