use std::error::Error as StdError;
use std::fmt;

use crate::instructions::{enum_to_word, Opcode};
use crate::memory::Memory;
use crate::processor::Registers;
use crate::program::Program;
use crate::Word;

/// Where the loader placed the program inside the memory array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    /// First word of the code segment (the data segment ends here).
    pub code_base: usize,
    /// Length of the code segment in words.
    pub code_len: usize,
    /// Length of the external-prelude region at the start of the code
    /// segment, in words.
    pub prelude_len: usize,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LoadError {
    /// Data, code and argument block together exceed the memory size.
    TooLarge { required: usize, available: usize },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LoadError::TooLarge {
                required,
                available,
            } => write!(
                f,
                "program needs {} words but the machine has {}",
                required, available
            ),
        }
    }
}

impl StdError for LoadError {}

/// A program laid out in machine memory, ready to run.
pub struct Image {
    pub memory: Memory,
    pub registers: Registers,
    pub layout: Layout,
}

/// Lays out `program` in a fresh memory of `memory_words` words and seeds
/// the entry frame.
///
/// Layout, low to high: the data segment at address zero (so data offsets
/// need no relocation), the code segment, one `EXIT` sentinel word, free
/// stack space, and at the very top the argument block: each argument as a
/// packed string, then the NUL-terminated vector of pointers to them.
///
/// `argc`, the pointer to the vector and the sentinel's address are pushed
/// in that order, so the entry function receives them as its two arguments
/// followed by a return address that halts the machine.
pub fn load<S: AsRef<str>>(
    program: &Program,
    args: &[S],
    memory_words: usize,
) -> Result<Image, LoadError> {
    let data = program.data();
    let code = program.code();
    let code_base = data.len();
    let sentinel = code_base + code.len();

    let packed: Vec<Vec<Word>> = args
        .iter()
        .map(|a| util::pack_str(a.as_ref().as_bytes()))
        .collect();
    let arg_words: usize = packed.iter().map(|w| w.len()).sum();
    // Segments, sentinel, argument strings, pointer vector, and the three
    // seeded stack words.
    let required = program.required_words() + arg_words + packed.len() + 1 + 3;
    if required > memory_words {
        return Err(LoadError::TooLarge {
            required,
            available: memory_words,
        });
    }

    let mut memory = Memory::new(memory_words);
    memory
        .borrow_slice_mut(0, data.len())
        .expect("data segment fits")
        .copy_from_slice(data);
    memory
        .borrow_slice_mut(code_base, code.len())
        .expect("code segment fits")
        .copy_from_slice(code);
    memory
        .write(sentinel, enum_to_word(Opcode::EXIT))
        .expect("sentinel fits");

    // Argument strings, then the pointer vector below them.
    let mut cursor = memory_words;
    let mut pointers = Vec::with_capacity(packed.len());
    for words in &packed {
        cursor -= words.len();
        memory
            .borrow_slice_mut(cursor, words.len())
            .expect("argument block fits")
            .copy_from_slice(words);
        pointers.push(cursor as Word);
    }
    cursor -= pointers.len() + 1;
    let argv = cursor;
    for (i, pointer) in pointers.iter().enumerate() {
        memory.write(argv + i, *pointer).expect("pointer fits");
    }
    memory.write(argv + pointers.len(), 0).expect("pointer fits");

    let mut sp = argv;
    for value in &[args.len() as Word, argv as Word, sentinel as Word] {
        sp -= 1;
        memory.write(sp, *value).expect("seeded stack fits");
    }

    Ok(Image {
        memory,
        registers: Registers {
            ax: 0,
            ip: code_base + program.entry(),
            sp,
            bp: sp,
        },
        layout: Layout {
            code_base,
            code_len: code.len(),
            prelude_len: program.externals().len() * crate::constants::PRELUDE_WORDS,
        },
    })
}
