use std::collections::HashMap;

use crate::externals::External;
use crate::Word;

/// Classification of a data-segment entry, used by listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataKind {
    /// Plain words (globals, stream handles).
    Words,
    /// A packed, NUL-terminated string.
    Str,
}

/// One named or anonymous entry in the data segment.
#[derive(Clone, Debug, PartialEq)]
pub struct DataEntry {
    pub name: String,
    pub offset: usize,
    pub size: usize,
    pub kind: DataKind,
}

/// Code-segment range emitted for one source line.
///
/// Ranges are half-open and recorded in emission order; a line may own
/// several ranges when control-flow scaffolding returns to it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineRange {
    pub line: u32,
    pub start: usize,
    pub end: usize,
}

/// A compiled program image: the data and code segments plus everything the
/// loader and the listing printer need to make sense of them.
///
/// The image lives in memory only; this system writes no artifact to disk.
#[derive(Debug)]
pub struct Program {
    data: Vec<Word>,
    code: Vec<Word>,
    /// Code offset of the entry function.
    entry: usize,
    /// Fixed argument count of the entry function.
    entry_args: usize,
    /// External routines, indexed by prelude slot. Slot `i` owns the two
    /// code words starting at offset `i * PRELUDE_WORDS`.
    externals: Vec<External>,
    line_ranges: Vec<LineRange>,
    comments: HashMap<usize, String>,
    data_entries: Vec<DataEntry>,
}

impl Program {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        data: Vec<Word>,
        code: Vec<Word>,
        entry: usize,
        entry_args: usize,
        externals: Vec<External>,
        line_ranges: Vec<LineRange>,
        comments: HashMap<usize, String>,
        data_entries: Vec<DataEntry>,
    ) -> Program {
        Program {
            data,
            code,
            entry,
            entry_args,
            externals,
            line_ranges,
            comments,
            data_entries,
        }
    }

    pub fn data(&self) -> &[Word] {
        &self.data[..]
    }

    pub fn code(&self) -> &[Word] {
        &self.code[..]
    }

    pub fn entry(&self) -> usize {
        self.entry
    }

    pub fn entry_args(&self) -> usize {
        self.entry_args
    }

    pub fn externals(&self) -> &[External] {
        &self.externals[..]
    }

    pub fn line_ranges(&self) -> &[LineRange] {
        &self.line_ranges[..]
    }

    pub fn comment(&self, offset: usize) -> Option<&str> {
        self.comments.get(&offset).map(|s| &s[..])
    }

    pub fn data_entries(&self) -> &[DataEntry] {
        &self.data_entries[..]
    }

    /// Words required to hold the segments and the exit sentinel, before any
    /// argument block or stack space.
    pub fn required_words(&self) -> usize {
        self.data.len() + self.code.len() + 1
    }
}
