use crate::Word;
use num::traits::ToPrimitive;
use num_derive::{FromPrimitive, ToPrimitive};
use util::EnumFromStr;
use util_derive::EnumFromStr;

/// Machine instruction set.
///
/// An instruction occupies one code word (the opcode) or two (opcode plus
/// immediate operand, see [`has_operand`](enum.Opcode.html#method.has_operand)).
/// The stack grows downward through the memory array; `m[x]` denotes the word
/// at address `x`.
///
/// Branch and call operands hold a *signed displacement* relative to the
/// address of the word immediately following the operand, so code is
/// position-independent regardless of where the loader places it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, FromPrimitive, ToPrimitive, EnumFromStr)]
pub enum Opcode {
    /// Halt the machine; the value of `ax` becomes the program's result.
    EXIT,
    /// Pushes the accumulator: `m[--sp] = ax`.
    PUSH,
    /// Pops into the accumulator: `ax = m[sp++]`.
    POP,
    /// Discards `n` stacked words: `sp += n`.
    ///
    /// Emitted by callers of variadic routines to drop the pushed count word
    /// and arguments after the call returns.
    ADJ,
    /// Loads the immediate: `ax = imm`.
    MOV,
    /// Loads a data-segment address: `ax = imm`.
    ///
    /// Identical effect to `MOV`; kept distinct so listings show which
    /// immediates are addresses.
    LEA,
    /// Reads a global word: `ax = m[imm]`.
    GET,
    /// Writes a global word: `m[imm] = ax`.
    PUT,
    /// Computes a frame address: `ax = bp + imm`.
    LLEA,
    /// Reads a frame word: `ax = m[bp + imm]`.
    LGET,
    /// Writes a frame word: `m[bp + imm] = ax`.
    LPUT,
    /// Loads through a stacked address: `ax = m[m[sp++]]`.
    SGET,
    /// Stores through a stacked address: `m[m[sp++]] = ax`.
    SPUT,
    /// `ax = m[sp++] + ax`.
    ADD,
    /// `ax = m[sp++] - ax`.
    SUB,
    /// `ax = m[sp++] * ax`.
    MUL,
    /// `ax = m[sp++] / ax`; division by zero is a runtime fault.
    DIV,
    /// `ax = m[sp++] % ax`; division by zero is a runtime fault.
    MOD,
    /// `ax = m[sp++] << ax`. Shift amounts are taken modulo the word width.
    SHL,
    /// `ax = m[sp++] >> ax` (arithmetic). Shift amounts are taken modulo the
    /// word width.
    SHR,
    /// `ax = m[sp++] & ax`.
    AND,
    /// `ax = m[sp++] | ax`.
    OR,
    /// `ax = (m[sp++] == ax) ? 1 : 0`.
    EQ,
    /// `ax = (m[sp++] != ax) ? 1 : 0`.
    NE,
    /// `ax = (m[sp++] >= ax) ? 1 : 0`.
    GE,
    /// `ax = (m[sp++] > ax) ? 1 : 0`.
    GT,
    /// `ax = (m[sp++] <= ax) ? 1 : 0`.
    LE,
    /// `ax = (m[sp++] < ax) ? 1 : 0`.
    LT,
    /// `ax = (m[sp++] != 0 && ax != 0) ? 1 : 0`.
    LAND,
    /// `ax = (m[sp++] != 0 || ax != 0) ? 1 : 0`.
    LOR,
    /// `ax = -ax`.
    NEG,
    /// `ax = ax + 1`.
    INC,
    /// `ax = ax - 1`.
    DEC,
    /// `ax = ~ax`.
    NOT,
    /// `ax = (ax == 0) ? 1 : 0`.
    LNOT,
    /// Opens a stack frame with `n` words of locals:
    /// `m[--sp] = bp; bp = sp; sp -= n`.
    ENTER,
    /// Closes the current stack frame: `sp = bp; bp = m[sp++]`.
    LEAVE,
    /// Pushes the return address and jumps: `m[--sp] = ip; ip += disp`.
    CALL,
    /// Returns, discarding `n` argument words: `ip = m[sp++]; sp += n`.
    RET,
    /// `ip += disp`.
    JMP,
    /// If `ax == 0`, `ip += disp`.
    JZ,
    /// If `ax != 0`, `ip += disp`.
    JNZ,
}

impl Opcode {
    /// Decodes a code word into an opcode.
    pub fn from_word(word: Word) -> Option<Opcode> {
        num::FromPrimitive::from_i32(word)
    }

    /// Returns true if the instruction is followed by an immediate operand
    /// word.
    pub fn has_operand(self) -> bool {
        match self {
            Opcode::ADJ
            | Opcode::MOV
            | Opcode::LEA
            | Opcode::GET
            | Opcode::PUT
            | Opcode::LLEA
            | Opcode::LGET
            | Opcode::LPUT
            | Opcode::ENTER
            | Opcode::CALL
            | Opcode::RET
            | Opcode::JMP
            | Opcode::JZ
            | Opcode::JNZ => true,
            _ => false,
        }
    }

    /// Returns true if the operand is a displacement relative to the word
    /// following it.
    pub fn is_relative(self) -> bool {
        match self {
            Opcode::CALL | Opcode::JMP | Opcode::JZ | Opcode::JNZ => true,
            _ => false,
        }
    }
}

#[inline]
pub fn enum_to_word<T: ToPrimitive + Copy>(val: T) -> Word {
    val.to_i32().unwrap()
}

macro_rules! impl_enum_display {
    ($e:ty) => {
        impl std::fmt::Display for $e {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                std::fmt::Debug::fmt(self, f)
            }
        }
    };
}

impl_enum_display!(Opcode);
