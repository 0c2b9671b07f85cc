use std::{error::Error, fmt};

use byteorder::ByteOrder;

/// Byte order used wherever words and byte strings meet: string literals are
/// packed with this endianness at compile time and unpacked with it again by
/// the machine's built-in routines.
pub type Endian = byteorder::LittleEndian;

/// Bytes of character data stored per machine word.
pub const CHARS_PER_WORD: usize = 4;

/// Packs a byte string into words, four bytes per word, and appends a NUL
/// terminator. The last word is zero-padded, so the result always contains at
/// least one terminating zero byte.
pub fn pack_str(bytes: &[u8]) -> Vec<i32> {
    let mut padded = Vec::with_capacity(bytes.len() + CHARS_PER_WORD);
    padded.extend_from_slice(bytes);
    padded.push(0);
    while padded.len() % CHARS_PER_WORD != 0 {
        padded.push(0);
    }

    let mut words = Vec::with_capacity(padded.len() / CHARS_PER_WORD);
    for chunk in padded.chunks(CHARS_PER_WORD) {
        words.push(Endian::read_i32(chunk));
    }
    words
}

/// Reads a NUL-terminated byte string from a word slice, starting at the
/// first byte of `words[0]`. Returns `None` if no terminator is found.
pub fn read_c_string(words: &[i32]) -> Option<Vec<u8>> {
    let mut bytes = Vec::new();
    for word in words {
        let mut buf = [0u8; CHARS_PER_WORD];
        Endian::write_i32(&mut buf, *word);
        for &b in &buf {
            if b == 0 {
                return Some(bytes);
            }
            bytes.push(b);
        }
    }
    None
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ParseEnumError {
    pub value: String,
    pub enum_name: &'static str,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Failed to parse \"{}\" as {}.",
            &self.value, &self.enum_name
        )
    }
}

impl Error for ParseEnumError {
    fn description(&self) -> &str {
        "Failed to parse enum."
    }
}

pub trait EnumFromStr: Sized {
    fn from_str(s: &str) -> Result<Self, ParseEnumError>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pack_empty() {
        assert_eq!(pack_str(b""), vec![0]);
    }

    #[test]
    fn pack_single_word() {
        // 'H' 'i' 0 0 little-endian
        assert_eq!(pack_str(b"Hi"), vec![0x0000_6948]);
    }

    #[test]
    fn pack_exact_boundary() {
        // Four chars force a second word for the terminator.
        let words = pack_str(b"abcd");
        assert_eq!(words.len(), 2);
        assert_eq!(words[1], 0);
    }

    #[test]
    fn round_trip() {
        let text = b"Hello, world!";
        let words = pack_str(text);
        assert_eq!(read_c_string(&words).unwrap(), text.to_vec());
    }

    #[test]
    fn unterminated() {
        assert_eq!(read_c_string(&[0x6161_6161]), None);
    }
}
