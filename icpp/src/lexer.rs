//! Hand-written lexer over the source line list.
//!
//! The lexer keeps a cursor of (line index, byte offset) over the lines of
//! the source. Keywords are not recognized here; they are ordinary
//! identifiers the parser distinguishes by string comparison. `#`-prefixed
//! lines are discarded wholesale, matching how the interpreter treats
//! preprocessor directives.

use std::error::Error as StdError;
use std::fmt;

use icvm::Word;

/// Token classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    /// String or character literal, quotes included in the text.
    StrChar,
    Operator,
    /// A character no rule matched; the parser reports it.
    Unknown,
    /// End of the token stream.
    Eos,
}

/// One token with its literal text and start position (1-based line and
/// column, for diagnostics only).
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub col: u32,
}

impl Token {
    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }

    pub fn eos(line: u32) -> Token {
        Token {
            kind: TokenKind::Eos,
            text: String::new(),
            line,
            col: 1,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LexicalError {
    UnterminatedLiteral { line: u32, text: String },
    UnterminatedComment { line: u32 },
}

impl fmt::Display for LexicalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LexicalError::UnterminatedLiteral { line, text } => {
                write!(f, "line {}: unterminated literal starting {}", line, text)
            }
            LexicalError::UnterminatedComment { line } => {
                write!(f, "line {}: unterminated block comment", line)
            }
        }
    }
}

impl StdError for LexicalError {}

/// Multi-character operators, longest first so that greedy matching wins.
const OPERATORS_3: &[&str] = &["<<=", ">>=", "->*", "<=>", "..."];
const OPERATORS_2: &[&str] = &[
    "::", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=", "*=",
    "/=", "%=", "&=", "^=", "|=", ".*",
];
const OPERATORS_1: &str = "{}()[],;+-*/%<>=!&|^~?:.";

pub struct Lexer<'a> {
    lines: Vec<&'a str>,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Lexer<'a> {
        Lexer {
            lines: source.lines().collect(),
            line: 0,
            col: 0,
        }
    }

    /// 1-based number of the line the cursor is on.
    pub fn line_number(&self) -> u32 {
        (self.line + 1) as u32
    }

    fn current(&self) -> &'a str {
        self.lines[self.line]
    }

    fn byte(&self, offset: usize) -> Option<u8> {
        self.current().as_bytes().get(self.col + offset).copied()
    }

    /// Skips blanks, comments and `#` lines, leaving the cursor on the first
    /// byte of the next token. Returns false at the end of the source.
    fn skip_blank(&mut self) -> Result<bool, LexicalError> {
        loop {
            if self.line >= self.lines.len() {
                return Ok(false);
            }
            if self.col == 0 {
                let trimmed = self.current().trim_start();
                if trimmed.starts_with('#') {
                    self.line += 1;
                    continue;
                }
            }
            if self.col >= self.current().len() {
                self.line += 1;
                self.col = 0;
                continue;
            }
            match self.byte(0).unwrap() {
                b' ' | b'\t' | b'\r' => self.col += 1,
                b'/' if self.byte(1) == Some(b'/') => {
                    self.line += 1;
                    self.col = 0;
                }
                b'/' if self.byte(1) == Some(b'*') => {
                    let start_line = self.line_number();
                    self.col += 2;
                    self.skip_block_comment(start_line)?;
                }
                _ => return Ok(true),
            }
        }
    }

    fn skip_block_comment(&mut self, start_line: u32) -> Result<(), LexicalError> {
        loop {
            if self.line >= self.lines.len() {
                return Err(LexicalError::UnterminatedComment { line: start_line });
            }
            if self.byte(0) == Some(b'*') && self.byte(1) == Some(b'/') {
                self.col += 2;
                return Ok(());
            }
            if self.col >= self.current().len() {
                self.line += 1;
                self.col = 0;
            } else {
                self.col += 1;
            }
        }
    }

    /// Produces the next token.
    pub fn next_token(&mut self) -> Result<Token, LexicalError> {
        if !self.skip_blank()? {
            return Ok(Token::eos(self.line_number()));
        }

        let line = self.line_number();
        let col = (self.col + 1) as u32;
        let bytes = self.current().as_bytes();
        let start = self.col;
        let b = bytes[start];

        let (kind, end) = if b == b'_' || b.is_ascii_alphabetic() {
            let mut end = start + 1;
            while end < bytes.len() && (bytes[end] == b'_' || bytes[end].is_ascii_alphanumeric()) {
                end += 1;
            }
            (TokenKind::Ident, end)
        } else if b.is_ascii_digit()
            || (b == b'.' && bytes.get(start + 1).map_or(false, |c| c.is_ascii_digit()))
        {
            // The body runs through digits, dots and letters; base and
            // suffix recognition happens during evaluation.
            let mut end = start + 1;
            while end < bytes.len()
                && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'.')
            {
                end += 1;
            }
            (TokenKind::Number, end)
        } else if b == b'"' || b == b'\'' {
            let mut end = start + 1;
            loop {
                match bytes.get(end) {
                    None => {
                        return Err(LexicalError::UnterminatedLiteral {
                            line,
                            text: self.current()[start..].to_string(),
                        });
                    }
                    Some(b'\\') => end += 2,
                    Some(&c) if c == b => {
                        end += 1;
                        break;
                    }
                    Some(_) => end += 1,
                }
            }
            (TokenKind::StrChar, end)
        } else if let Some(op) = self.match_operator() {
            let end = start + op.len();
            (TokenKind::Operator, end)
        } else {
            // Take the whole character so multi-byte input cannot split.
            let width = self.current()[start..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
            (TokenKind::Unknown, start + width)
        };

        let text = self.current()[start..end].to_string();
        self.col = end;
        Ok(Token {
            kind,
            text,
            line,
            col,
        })
    }

    fn match_operator(&self) -> Option<&'static str> {
        let rest = &self.current().as_bytes()[self.col..];
        for &op in OPERATORS_3 {
            if rest.starts_with(op.as_bytes()) {
                return Some(op);
            }
        }
        for &op in OPERATORS_2 {
            if rest.starts_with(op.as_bytes()) {
                return Some(op);
            }
        }
        OPERATORS_1
            .as_bytes()
            .iter()
            .position(|&c| c == rest[0])
            .map(|index| &OPERATORS_1[index..index + 1])
    }
}

/// Evaluates a number literal: `0x` prefixes hexadecimal, a leading zero
/// followed by digits octal, anything else decimal. A leading `-` is
/// honored; fractional parts are truncated at the dot.
pub fn eval_number(text: &str) -> Word {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let mut value: i64 = 0;
    if body.starts_with("0x") || body.starts_with("0X") {
        for b in body[2..].bytes() {
            match (b as char).to_digit(16) {
                Some(d) => value = value.wrapping_mul(16).wrapping_add(i64::from(d)),
                None => break,
            }
        }
    } else if body.len() > 1 && body.starts_with('0') && body.as_bytes()[1].is_ascii_digit() {
        for b in body[1..].bytes() {
            match (b as char).to_digit(8) {
                Some(d) => value = value.wrapping_mul(8).wrapping_add(i64::from(d)),
                None => break,
            }
        }
    } else {
        for b in body.bytes() {
            match (b as char).to_digit(10) {
                Some(d) => value = value.wrapping_mul(10).wrapping_add(i64::from(d)),
                None => break,
            }
        }
    }

    if negative {
        value = -value;
    }
    value as Word
}

/// Evaluates a string or character literal: strips the quotes and expands
/// `\r`, `\n`, `\t`, `\'` and `\"`; any other escaped character passes
/// through as itself.
pub fn eval_string(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let inner = if bytes.len() >= 2 {
        &bytes[1..bytes.len() - 1]
    } else {
        bytes
    };

    let mut out = Vec::with_capacity(inner.len());
    let mut i = 0;
    while i < inner.len() {
        if inner[i] == b'\\' && i + 1 < inner.len() {
            out.push(match inner[i + 1] {
                b'r' => b'\r',
                b'n' => b'\n',
                b't' => b'\t',
                other => other,
            });
            i += 2;
        } else {
            out.push(inner[i]);
            i += 1;
        }
    }
    out
}

/// Evaluates a character literal to its first byte's value.
pub fn eval_char(text: &str) -> Word {
    let bytes = eval_string(text);
    bytes.first().map_or(0, |&b| Word::from(b))
}

#[cfg(test)]
mod test {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token.kind == TokenKind::Eos {
                return out;
            }
            out.push(token);
        }
    }

    fn texts(source: &str) -> Vec<String> {
        tokens(source).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn identifiers_and_operators() {
        assert_eq!(
            texts("int main() { return a+b; }"),
            ["int", "main", "(", ")", "{", "return", "a", "+", "b", ";", "}"]
        );
    }

    #[test]
    fn longest_operator_match() {
        assert_eq!(texts("a <<= b >> c <= d"), ["a", "<<=", "b", ">>", "c", "<=", "d"]);
        assert_eq!(texts("x->*y :: z"), ["x", "->*", "y", "::", "z"]);
    }

    #[test]
    fn comments_and_hash_lines() {
        let source = "#include <iostream>\nint x; // trailing\n/* block\nspanning */ int y;";
        assert_eq!(texts(source), ["int", "x", ";", "int", "y", ";"]);
    }

    #[test]
    fn unterminated_block_comment() {
        let mut lexer = Lexer::new("/* never closed");
        match lexer.next_token() {
            Err(LexicalError::UnterminatedComment { line: 1 }) => {}
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn string_and_char_literals() {
        let tokens = tokens(r#"printf("a\"b", 'x')"#);
        assert_eq!(tokens[2].kind, TokenKind::StrChar);
        assert_eq!(tokens[2].text, r#""a\"b""#);
        assert_eq!(tokens[4].text, "'x'");
    }

    #[test]
    fn unterminated_string() {
        let mut lexer = Lexer::new("\"open");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn positions_are_one_based() {
        let tokens = tokens("a\n  b");
        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].col), (2, 3));
    }

    #[test]
    fn number_evaluation() {
        assert_eq!(eval_number("0"), 0);
        assert_eq!(eval_number("0x1F"), 31);
        assert_eq!(eval_number("0777"), 511);
        assert_eq!(eval_number("-42"), -42);
        assert_eq!(eval_number("3.14"), 3);
    }

    #[test]
    fn number_negation_is_symmetric() {
        for literal in &["0", "7", "0x10", "0644", "19.5"] {
            let negated = format!("-{}", literal);
            assert_eq!(eval_number(&negated), -eval_number(literal));
        }
    }

    #[test]
    fn string_evaluation() {
        assert_eq!(eval_string(r#""a\tb\n""#), b"a\tb\n");
        assert_eq!(eval_string(r#""\q""#), b"q");
        assert_eq!(eval_char("'A'"), 65);
        assert_eq!(eval_char(r"'\n'"), 10);
    }

    #[test]
    fn round_trip() {
        // Concatenating token texts with spaces must re-lex to the same
        // stream (comments and # lines excepted, which vanish either way).
        let source = "int main() { int a[3] = {1, 0x2F, -3}; return a[0] <= 42 ? 1 : 0; }";
        let first = tokens(source);
        let joined = first
            .iter()
            .map(|t| t.text.clone())
            .collect::<Vec<_>>()
            .join(" ");
        let second = tokens(&joined);
        assert_eq!(
            first.iter().map(|t| (&t.text, t.kind)).collect::<Vec<_>>(),
            second.iter().map(|t| (&t.text, t.kind)).collect::<Vec<_>>()
        );
    }
}
