use std::error::Error as StdError;
use std::fmt;

use crate::constants;
use crate::externals::{dispatch, External, Host};
use crate::instructions::Opcode;
use crate::loader::Layout;
use crate::memory::Memory;
use crate::Word;

/// The machine's register file.
///
/// `ax` is the accumulator; `ip`, `sp` and `bp` are absolute word addresses
/// into the memory array. The stack grows downward from the top of memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Registers {
    pub ax: Word,
    pub ip: usize,
    pub sp: usize,
    pub bp: usize,
}

/// Reason a program was aborted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trap {
    /// Integer division or remainder by zero.
    DivisionByZero,
    /// Stack underflow or an access outside the memory array.
    Memory,
    /// A jump, call or return whose target lies outside the code segment.
    BadJump(Word),
    /// An output routine received a word that is not a stream handle.
    BadStream(Word),
    /// Writing to a host stream failed.
    Io,
}

/// A trap together with the register snapshot and return-address backtrace
/// captured at the moment of the fault.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeError {
    pub trap: Trap,
    pub registers: Registers,
    pub backtrace: Vec<Word>,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let reason = match self.trap {
            Trap::DivisionByZero => "division by zero".to_string(),
            Trap::Memory => "memory access outside the machine".to_string(),
            Trap::BadJump(target) => format!("jump outside the code segment (to {})", target),
            Trap::BadStream(handle) => format!("{} is not an output stream handle", handle),
            Trap::Io => "writing to a host stream failed".to_string(),
        };
        write!(
            f,
            "runtime fault: {} [ip={} sp={} bp={}]",
            reason, self.registers.ip, self.registers.sp, self.registers.bp
        )?;
        for address in &self.backtrace {
            write!(f, "\n  called from {}", address)?;
        }
        Ok(())
    }
}

impl StdError for RuntimeError {}

enum TickResult {
    Running,
    Exit(Word),
}

/// Executes a loaded program image.
pub struct Processor {
    registers: Registers,
}

impl Processor {
    pub fn new(registers: Registers) -> Processor {
        Processor { registers }
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Runs until the program retires an `EXIT`, returning its result value,
    /// or until a trap aborts execution.
    pub fn run(
        &mut self,
        memory: &mut Memory,
        layout: &Layout,
        externals: &[External],
        host: &mut Host,
    ) -> Result<Word, RuntimeError> {
        loop {
            match self.tick(memory, layout, externals, host) {
                Ok(TickResult::Running) => {}
                Ok(TickResult::Exit(value)) => return Ok(value),
                Err(trap) => return Err(self.fault(trap, memory, layout)),
            }
        }
    }

    fn tick(
        &mut self,
        memory: &mut Memory,
        layout: &Layout,
        externals: &[External],
        host: &mut Host,
    ) -> Result<TickResult, Trap> {
        let ip = self.registers.ip;

        // An instruction pointer inside the prelude region means an external
        // routine was called; run its native handler, then let the prelude's
        // RET execute as any other instruction.
        if ip >= layout.code_base {
            let offset = ip - layout.code_base;
            if offset < layout.prelude_len {
                let external = externals[offset / constants::PRELUDE_WORDS];
                self.registers.ax = dispatch(external, memory, self.registers.sp, host)?;
            }
        }

        let word = self.read(memory, ip)?;
        let opcode = match Opcode::from_word(word) {
            Some(opcode) => opcode,
            None => {
                tracing::warn!("unknown opcode {} at {}, skipping", word, ip);
                self.registers.ip = ip + 1;
                return Ok(TickResult::Running);
            }
        };

        let (imm, next) = if opcode.has_operand() {
            (self.read(memory, ip + 1)?, ip + 2)
        } else {
            (0, ip + 1)
        };
        self.registers.ip = next;

        tracing::trace!("{:>6}: {} {} ax={}", ip, opcode, imm, self.registers.ax);

        match opcode {
            Opcode::EXIT => return Ok(TickResult::Exit(self.registers.ax)),
            Opcode::PUSH => self.push(memory, self.registers.ax)?,
            Opcode::POP => self.registers.ax = self.pop(memory)?,
            Opcode::ADJ => self.adjust_sp(memory, imm)?,
            Opcode::MOV | Opcode::LEA => self.registers.ax = imm,
            Opcode::GET => self.registers.ax = self.read(memory, address(imm)?)?,
            Opcode::PUT => self.write(memory, address(imm)?, self.registers.ax)?,
            Opcode::LLEA => self.registers.ax = self.frame_address(imm)? as Word,
            Opcode::LGET => {
                let addr = self.frame_address(imm)?;
                self.registers.ax = self.read(memory, addr)?;
            }
            Opcode::LPUT => {
                let addr = self.frame_address(imm)?;
                self.write(memory, addr, self.registers.ax)?;
            }
            Opcode::SGET => {
                let addr = address(self.pop(memory)?)?;
                self.registers.ax = self.read(memory, addr)?;
            }
            Opcode::SPUT => {
                let addr = address(self.pop(memory)?)?;
                self.write(memory, addr, self.registers.ax)?;
            }
            Opcode::ADD => self.binary(memory, |l, r| l.wrapping_add(r))?,
            Opcode::SUB => self.binary(memory, |l, r| l.wrapping_sub(r))?,
            Opcode::MUL => self.binary(memory, |l, r| l.wrapping_mul(r))?,
            Opcode::DIV => {
                self.check_divisor()?;
                self.binary(memory, |l, r| l.wrapping_div(r))?;
            }
            Opcode::MOD => {
                self.check_divisor()?;
                self.binary(memory, |l, r| l.wrapping_rem(r))?;
            }
            // Shift amounts wrap modulo the word width, matching the host.
            Opcode::SHL => self.binary(memory, |l, r| l.wrapping_shl(r as u32))?,
            Opcode::SHR => self.binary(memory, |l, r| l.wrapping_shr(r as u32))?,
            Opcode::AND => self.binary(memory, |l, r| l & r)?,
            Opcode::OR => self.binary(memory, |l, r| l | r)?,
            Opcode::EQ => self.compare(memory, |l, r| l == r)?,
            Opcode::NE => self.compare(memory, |l, r| l != r)?,
            Opcode::GE => self.compare(memory, |l, r| l >= r)?,
            Opcode::GT => self.compare(memory, |l, r| l > r)?,
            Opcode::LE => self.compare(memory, |l, r| l <= r)?,
            Opcode::LT => self.compare(memory, |l, r| l < r)?,
            Opcode::LAND => self.compare(memory, |l, r| l != 0 && r != 0)?,
            Opcode::LOR => self.compare(memory, |l, r| l != 0 || r != 0)?,
            Opcode::NEG => self.registers.ax = self.registers.ax.wrapping_neg(),
            Opcode::INC => self.registers.ax = self.registers.ax.wrapping_add(1),
            Opcode::DEC => self.registers.ax = self.registers.ax.wrapping_sub(1),
            Opcode::NOT => self.registers.ax = !self.registers.ax,
            Opcode::LNOT => self.registers.ax = (self.registers.ax == 0) as Word,
            Opcode::ENTER => {
                self.push(memory, self.registers.bp as Word)?;
                self.registers.bp = self.registers.sp;
                self.adjust_sp(memory, imm.wrapping_neg())?;
            }
            Opcode::LEAVE => {
                self.registers.sp = self.registers.bp;
                self.registers.bp = address(self.pop(memory)?)?;
            }
            Opcode::CALL => {
                self.push(memory, next as Word)?;
                self.jump(layout, next as Word, imm)?;
            }
            Opcode::RET => {
                let target = self.pop(memory)?;
                self.adjust_sp(memory, imm)?;
                self.jump_absolute(layout, target)?;
            }
            Opcode::JMP => self.jump(layout, next as Word, imm)?,
            Opcode::JZ => {
                if self.registers.ax == 0 {
                    self.jump(layout, next as Word, imm)?;
                }
            }
            Opcode::JNZ => {
                if self.registers.ax != 0 {
                    self.jump(layout, next as Word, imm)?;
                }
            }
        }

        Ok(TickResult::Running)
    }

    fn read(&self, memory: &Memory, addr: usize) -> Result<Word, Trap> {
        memory.read(addr).map_err(|_| Trap::Memory)
    }

    fn write(&self, memory: &mut Memory, addr: usize, value: Word) -> Result<(), Trap> {
        memory.write(addr, value).map_err(|_| Trap::Memory)
    }

    fn push(&mut self, memory: &mut Memory, value: Word) -> Result<(), Trap> {
        let sp = self.registers.sp.checked_sub(1).ok_or(Trap::Memory)?;
        self.write(memory, sp, value)?;
        self.registers.sp = sp;
        Ok(())
    }

    fn pop(&mut self, memory: &Memory) -> Result<Word, Trap> {
        let value = self.read(memory, self.registers.sp)?;
        self.registers.sp += 1;
        Ok(value)
    }

    fn adjust_sp(&mut self, memory: &Memory, delta: Word) -> Result<(), Trap> {
        let sp = self.registers.sp as i64 + i64::from(delta);
        if sp < 0 || sp > memory.length() as i64 {
            return Err(Trap::Memory);
        }
        self.registers.sp = sp as usize;
        Ok(())
    }

    fn frame_address(&self, offset: Word) -> Result<usize, Trap> {
        let addr = self.registers.bp as i64 + i64::from(offset);
        if addr < 0 {
            return Err(Trap::Memory);
        }
        Ok(addr as usize)
    }

    fn binary(&mut self, memory: &Memory, op: impl Fn(Word, Word) -> Word) -> Result<(), Trap> {
        let left = self.pop(memory)?;
        self.registers.ax = op(left, self.registers.ax);
        Ok(())
    }

    fn compare(&mut self, memory: &Memory, op: impl Fn(Word, Word) -> bool) -> Result<(), Trap> {
        let left = self.pop(memory)?;
        self.registers.ax = op(left, self.registers.ax) as Word;
        Ok(())
    }

    fn check_divisor(&self) -> Result<(), Trap> {
        if self.registers.ax == 0 {
            Err(Trap::DivisionByZero)
        } else {
            Ok(())
        }
    }

    fn jump(&mut self, layout: &Layout, base: Word, displacement: Word) -> Result<(), Trap> {
        self.jump_absolute(layout, base.wrapping_add(displacement))
    }

    fn jump_absolute(&mut self, layout: &Layout, target: Word) -> Result<(), Trap> {
        let start = layout.code_base as i64;
        // The word one past the code segment holds the loader's exit
        // sentinel and is a legal target.
        let end = start + layout.code_len as i64;
        if i64::from(target) < start || i64::from(target) > end {
            return Err(Trap::BadJump(target));
        }
        self.registers.ip = target as usize;
        Ok(())
    }

    fn fault(&self, trap: Trap, memory: &Memory, layout: &Layout) -> RuntimeError {
        let mut backtrace = Vec::new();
        let mut bp = self.registers.bp;
        while backtrace.len() < constants::BACKTRACE_FRAMES {
            // Each frame stores the caller's bp at m[bp] and the return
            // address at m[bp + 1]; the walk stops at anything that does not
            // look like a frame.
            let return_address = match memory.read(bp + 1) {
                Ok(address) => address,
                Err(_) => break,
            };
            let code = layout.code_base as i64..=(layout.code_base + layout.code_len) as i64;
            if !code.contains(&i64::from(return_address)) {
                break;
            }
            backtrace.push(return_address);
            match memory.read(bp) {
                Ok(saved) if saved >= 0 && (saved as usize) > bp => bp = saved as usize,
                _ => break,
            }
        }
        RuntimeError {
            trap,
            registers: self.registers,
            backtrace,
        }
    }
}

fn address(value: Word) -> Result<usize, Trap> {
    if value >= 0 {
        Ok(value as usize)
    } else {
        Err(Trap::Memory)
    }
}
