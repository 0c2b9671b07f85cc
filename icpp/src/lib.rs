//! Front end for the [icvm](../icvm/index.html) stack machine: an
//! interpreter for a restricted C++-like language.
//!
//! The main function provided by this crate is [`compile`](fn.compile.html),
//! which accepts the text of a source file and produces a
//! [`Program`](../icvm/struct.Program.html) image: the data segment, the
//! code segment, the pre-registered external routines and the line map the
//! [listing](fn.listing.html) printer consumes. Compilation is a single
//! pass: a hand-written lexer feeds a parser that emits instructions as it
//! goes, with no syntax tree in between.
//!
//! # Accepted language
//!
//! A strict subset of C++. `#`-prefixed lines are discarded; `typedef`,
//! `using`, `template`, `struct`, `class` and `union` declarations are
//! skipped; `namespace` blocks are entered but only affect scope tracking.
//! What remains is compiled:
//!
//! Construct | Notes
//! ----------|------
//! `int` globals and locals | one word each; constant initializers for globals
//! pointers | one-word values; indexing scales by one word per level
//! arrays | fixed shape, row-major; brace initializers, inferred dimensions
//! `enum` | constants substituted inline as integer literals
//! functions | overloaded by exact argument-type match, definition before use
//! `if`/`else`, `while`, `do`/`while`, `for` | the usual shapes
//! expressions | C++ precedence, `?:`, assignments, `++`/`--`, `sizeof`
//! `cout`/`cerr`/`endl`, `operator<<`, `printf` | externally implemented, see below
//!
//! Functions are located through *decorated names*: the bare identifier
//! followed by the comma-joined argument types, `fibonacci(int)` or
//! `operator<<(ostream,int)`. Resolution is an exact string match; the only
//! exception is the variadic suffix `,...`, which matches any remaining
//! arguments and carries `printf`.
//!
//! # Built-in routines
//!
//! Registered before parsing, so every program can use them without
//! declarations:
//!
//! Decorated name | Semantics
//! ---------------|----------
//! `cout`, `cerr` | stream handles (data words 0 and 1)
//! `endl` | newline marker for `operator<<`
//! `operator<<(ostream,int)` | decimal integer
//! `operator<<(ostream,double)` | word-backed value
//! `operator<<(ostream,const char*)` | NUL-terminated string
//! `operator<<(ostream,(*)(endl_t))` | newline + flush
//! `printf(const char*,...)` | `%d %c %s %p`, other conversions literal
//!
//! Their bodies are single `RET` preludes in the code segment; the machine
//! dispatches into native handlers when the instruction pointer enters the
//! prelude region.

mod builtins;
mod data;
mod emit;
mod error;
mod expr;
mod lexer;
mod listing;
mod parser;
mod scope;
mod symbols;

pub use error::{Error, ParseError};
pub use lexer::LexicalError;
pub use listing::{decode, listing, recognize};
pub use parser::Parser;

use icvm::Program;

/// Compiles a source file into a program image.
pub fn compile(source: &str) -> Result<Program, Error> {
    let mut parser = Parser::new(source)?;
    parser.parse_program()?;
    parser.finish()
}
