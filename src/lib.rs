//! Stack-based virtual machine for the icpp interpreter.
//!
//! The machine owns a single flat array of signed words holding the data
//! segment, the code segment and the runtime stack. Programs are produced by
//! the `icpp` front end as a [`Program`](struct.Program.html) image; the
//! [loader](fn.load.html) places the image in memory, copies the process
//! arguments and seeds the entry frame, and the
//! [`Processor`](struct.Processor.html) executes until the program retires an
//! `EXIT` instruction.
//!
//! Built-in routines (stream output, `printf`) are ordinary code symbols
//! whose bodies are single `RET` preludes; whenever the instruction pointer
//! enters the prelude region the processor calls the matching native handler
//! before executing the `RET`. The handlers write to
//! [`Host`](struct.Host.html) sinks supplied by the embedding process.

pub mod constants;

mod externals;
mod instructions;
mod loader;
mod memory;
mod processor;
mod program;

pub use externals::{dispatch, External, Host, CERR_OFFSET, COUT_OFFSET};
pub use instructions::{enum_to_word, Opcode};
pub use loader::{load, Image, Layout, LoadError};
pub use memory::Memory;
pub use processor::{Processor, Registers, RuntimeError, Trap};
pub use program::{DataEntry, DataKind, LineRange, Program};

/// The machine word. All memory cells, immediates and runtime values share
/// this type; addresses stored in memory are non-negative words.
pub type Word = i32;

#[cfg(test)]
mod test;
