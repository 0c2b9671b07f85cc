/// Size of the machine's flat memory, in words.
pub const MEMORY_WORDS: usize = 1 << 20;

/// Code words occupied by one external-routine prelude (`RET n`).
pub const PRELUDE_WORDS: usize = 2;

/// Maximum number of frames reported in a runtime backtrace.
pub const BACKTRACE_FRAMES: usize = 8;
