use std::io::Write;

use crate::memory::Memory;
use crate::processor::Trap;
use crate::Word;

/// Data-segment offset of the standard output stream handle.
pub const COUT_OFFSET: usize = 0;

/// Data-segment offset of the standard error stream handle.
pub const CERR_OFFSET: usize = 1;

/// The native routines reachable through external-code preludes.
///
/// Each registered external owns one `RET n` prelude in the code segment;
/// when the instruction pointer enters a prelude the processor runs the
/// matching handler, stores its result in `ax` and then executes the `RET`
/// normally to unwind the caller's stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum External {
    /// `endl` itself; a marker routine. Writes a newline if ever called
    /// directly.
    Endl,
    /// `operator<<(ostream,int)`: writes the decimal value, returns the
    /// stream handle.
    PutInt,
    /// `operator<<(ostream,double)`: the machine has no second word width,
    /// so the word-backed value is written as-is.
    PutDouble,
    /// `operator<<(ostream,const char*)`: writes the packed NUL-terminated
    /// string, returns the stream handle.
    PutStr,
    /// `operator<<(ostream,(*)(endl_t))`: writes a newline and flushes,
    /// returns the stream handle.
    PutEndl,
    /// `printf(const char*,...)`: the `%d %c %s %p` subset; any other
    /// conversion character is written literally. Returns the number of
    /// bytes written.
    Printf,
}

/// Output sinks supplied by the embedding process.
///
/// The binary passes the real standard streams; tests pass byte buffers and
/// assert on their contents.
pub struct Host<'a> {
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
}

impl<'a> Host<'a> {
    pub fn new(out: &'a mut dyn Write, err: &'a mut dyn Write) -> Host<'a> {
        Host { out, err }
    }

    /// Resolves a stream handle (a data-segment offset) to its sink.
    fn stream(&mut self, handle: Word) -> Result<&mut dyn Write, Trap> {
        match handle {
            h if h == COUT_OFFSET as Word => Ok(&mut *self.out),
            h if h == CERR_OFFSET as Word => Ok(&mut *self.err),
            other => Err(Trap::BadStream(other)),
        }
    }
}

/// Runs the handler for `external`.
///
/// On entry `m[sp]` holds the return address pushed by `CALL`; the caller's
/// arguments sit above it, rightmost nearest the top. Variadic routines find
/// the count of variadic arguments at `m[sp + 1]` (pushed last by the
/// caller), the variadic arguments above the count and the fixed arguments
/// above those.
pub fn dispatch(
    external: External,
    memory: &Memory,
    sp: usize,
    host: &mut Host,
) -> Result<Word, Trap> {
    match external {
        External::Endl | External::PutEndl => {
            let stream_handle = match external {
                // endl(x) called directly has one argument and no stream.
                External::Endl => COUT_OFFSET as Word,
                _ => read(memory, sp + 2)?,
            };
            let stream = host.stream(stream_handle)?;
            stream.write_all(b"\n").map_err(|_| Trap::Io)?;
            stream.flush().map_err(|_| Trap::Io)?;
            Ok(stream_handle)
        }
        External::PutInt | External::PutDouble => {
            let value = read(memory, sp + 1)?;
            let stream_handle = read(memory, sp + 2)?;
            let stream = host.stream(stream_handle)?;
            write!(stream, "{}", value).map_err(|_| Trap::Io)?;
            Ok(stream_handle)
        }
        External::PutStr => {
            let address = to_address(read(memory, sp + 1)?)?;
            let bytes = memory.read_c_string(address).map_err(|_| Trap::Memory)?;
            let stream_handle = read(memory, sp + 2)?;
            let stream = host.stream(stream_handle)?;
            stream.write_all(&bytes).map_err(|_| Trap::Io)?;
            Ok(stream_handle)
        }
        External::Printf => printf(memory, sp, host),
    }
}

fn printf(memory: &Memory, sp: usize, host: &mut Host) -> Result<Word, Trap> {
    let count = to_address(read(memory, sp + 1)?)?;
    let format_address = to_address(read(memory, sp + count + 2)?)?;
    let format = memory
        .read_c_string(format_address)
        .map_err(|_| Trap::Memory)?;

    // Variadic argument `j` (leftmost first) was pushed `count - j`-th from
    // the top, just above the count word.
    let arg = |j: usize| -> Result<Word, Trap> {
        if j < count {
            read(memory, sp + 1 + count - j)
        } else {
            // Missing argument; host printf would read garbage, this one
            // reads zero.
            Ok(0)
        }
    };

    let mut output = Vec::new();
    let mut next_arg = 0;
    let mut bytes = format.iter().copied();

    while let Some(b) = bytes.next() {
        if b != b'%' {
            output.push(b);
            continue;
        }
        match bytes.next() {
            Some(b'd') => {
                output.extend_from_slice(arg(next_arg)?.to_string().as_bytes());
                next_arg += 1;
            }
            Some(b'c') => {
                output.push(arg(next_arg)? as u8);
                next_arg += 1;
            }
            Some(b's') => {
                let address = to_address(arg(next_arg)?)?;
                let s = memory.read_c_string(address).map_err(|_| Trap::Memory)?;
                output.extend_from_slice(&s);
                next_arg += 1;
            }
            Some(b'p') => {
                output.extend_from_slice(format!("0x{:x}", arg(next_arg)?).as_bytes());
                next_arg += 1;
            }
            // Unsupported conversions print the conversion character
            // itself; "%%" falls out of this rule as a literal percent.
            Some(other) => output.push(other),
            None => output.push(b'%'),
        }
    }

    host.out.write_all(&output).map_err(|_| Trap::Io)?;
    Ok(output.len() as Word)
}

fn read(memory: &Memory, address: usize) -> Result<Word, Trap> {
    memory.read(address).map_err(|_| Trap::Memory)
}

fn to_address(value: Word) -> Result<usize, Trap> {
    if value >= 0 {
        Ok(value as usize)
    } else {
        Err(Trap::Memory)
    }
}
