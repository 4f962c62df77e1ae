//! Byte-level reader for the [RFC 3501 formal
//! syntax](https://tools.ietf.org/html/rfc3501#section-9): atoms, quoted strings, `NIL`,
//! literals and nested lists.
//!
//! Every method either consumes at least one byte or fails, so malformed input always ends in an
//! error instead of a loop.

use std::io::BufRead;

use crate::error::{Error, ParseError, Result};
use crate::types::{Element, ImapString, List, LiteralSpool};

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const SP: u8 = b' ';
/// Enough digits for any `u64`.
const MAX_LITERAL_DIGITS: usize = 20;

/// Bytes that end an atom.
fn is_atom_boundary(b: u8) -> bool {
    matches!(
        b,
        SP | CR | LF | b'(' | b')' | b'[' | b']' | b'{' | b'"'
    )
}

/// What [`Tokenizer::read_token`] found.
#[derive(Debug)]
pub(crate) enum Token {
    Element(Element),
    /// A `)` or `]` closing the innermost open list.
    Close(u8),
    /// CRLF, or a bare LF, outside of any literal.
    EndOfLine,
}

pub(crate) struct Tokenizer<'a, R> {
    reader: &'a mut R,
    spool: &'a LiteralSpool,
}

impl<'a, R: BufRead> Tokenizer<'a, R> {
    pub(crate) fn new(reader: &'a mut R, spool: &'a LiteralSpool) -> Self {
        Tokenizer { reader, spool }
    }

    /// Whether the stream is exhausted.
    pub(crate) fn at_eof(&mut self) -> Result<bool> {
        Ok(self.reader.fill_buf()?.is_empty())
    }

    pub(crate) fn peek(&mut self) -> Result<u8> {
        match self.reader.fill_buf()?.first() {
            Some(&b) => Ok(b),
            None => Err(Error::Parse(ParseError::UnexpectedEnd)),
        }
    }

    pub(crate) fn consume(&mut self) {
        self.reader.consume(1);
    }

    fn next_byte(&mut self) -> Result<u8> {
        let b = self.peek()?;
        self.consume();
        Ok(b)
    }

    pub(crate) fn skip_spaces(&mut self) -> Result<()> {
        while self.peek()? == SP {
            self.consume();
        }
        Ok(())
    }

    /// Read the next token of a line.
    pub(crate) fn read_token(&mut self) -> Result<Token> {
        self.skip_spaces()?;
        let token = match self.peek()? {
            CR => {
                self.consume();
                match self.next_byte()? {
                    LF => Token::EndOfLine,
                    b => return Err(Error::Parse(ParseError::UnexpectedByte(b))),
                }
            }
            LF => {
                self.consume();
                Token::EndOfLine
            }
            open @ (b'(' | b'[') => {
                self.consume();
                let close = if open == b'(' { b')' } else { b']' };
                Token::Element(Element::List(self.read_list(close)?))
            }
            close @ (b')' | b']') => {
                self.consume();
                Token::Close(close)
            }
            b'"' => {
                self.consume();
                Token::Element(Element::String(ImapString::Simple(self.read_quoted()?)))
            }
            b'{' => {
                self.consume();
                Token::Element(Element::String(self.read_literal()?))
            }
            _ => {
                let atom = self.read_atom()?;
                if atom.eq_ignore_ascii_case("NIL") {
                    Token::Element(Element::String(ImapString::Simple(String::new())))
                } else {
                    Token::Element(Element::String(ImapString::Simple(atom)))
                }
            }
        };
        Ok(token)
    }

    /// Read list elements up to and including `close`. The opening byte is already consumed.
    ///
    /// Literals read before a failure are released before the error is returned.
    pub(crate) fn read_list(&mut self, close: u8) -> Result<List> {
        let mut list = List::new();
        match self.fill_list(&mut list, close) {
            Ok(()) => Ok(list),
            Err(e) => {
                list.release();
                Err(e)
            }
        }
    }

    fn fill_list(&mut self, list: &mut List, close: u8) -> Result<()> {
        loop {
            match self.read_token()? {
                Token::Element(e) => list.push(e),
                Token::Close(c) if c == close => return Ok(()),
                Token::Close(c) => return Err(unbalanced(c)),
                Token::EndOfLine => return Err(unbalanced(close)),
            }
        }
    }

    /// Read an atom. A `[` inside the atom swallows everything up to the next `]`, so
    /// `BODY[HEADER.FIELDS (DATE)]` comes back whole.
    pub(crate) fn read_atom(&mut self) -> Result<String> {
        let mut atom = Vec::new();
        loop {
            let (taken, stop) = {
                let buf = self.reader.fill_buf()?;
                if buf.is_empty() {
                    return Err(Error::Parse(ParseError::UnexpectedEnd));
                }
                let n = buf
                    .iter()
                    .position(|&b| is_atom_boundary(b))
                    .unwrap_or(buf.len());
                atom.extend_from_slice(&buf[..n]);
                (n, buf.get(n).copied())
            };
            self.reader.consume(taken);

            match stop {
                None => continue,
                Some(b'[') if !atom.is_empty() => {
                    self.consume();
                    atom.push(b'[');
                    self.read_section_into(&mut atom)?;
                }
                Some(_) => break,
            }
        }
        if atom.is_empty() {
            // only reachable if the caller dispatched on a boundary byte
            let b = self.peek()?;
            return Err(Error::Parse(ParseError::UnexpectedByte(b)));
        }
        Ok(String::from_utf8_lossy(&atom).into_owned())
    }

    fn read_section_into(&mut self, atom: &mut Vec<u8>) -> Result<()> {
        loop {
            match self.next_byte()? {
                CR | LF => return Err(Error::Parse(ParseError::UnbalancedBracket)),
                b']' => {
                    atom.push(b']');
                    return Ok(());
                }
                b => atom.push(b),
            }
        }
    }

    /// Read a quoted string. The opening quote is already consumed.
    fn read_quoted(&mut self) -> Result<String> {
        let mut s = Vec::new();
        loop {
            match self.next_byte()? {
                b'"' => break,
                b'\\' => match self.next_byte()? {
                    CR | LF => return Err(Error::Parse(ParseError::UnterminatedQuote)),
                    escaped => s.push(escaped),
                },
                CR | LF => return Err(Error::Parse(ParseError::UnterminatedQuote)),
                b => s.push(b),
            }
        }
        Ok(String::from_utf8_lossy(&s).into_owned())
    }

    /// Read `n}` CRLF and then exactly `n` bytes. The `{` is already consumed.
    fn read_literal(&mut self) -> Result<ImapString> {
        let mut digits = String::new();
        loop {
            match self.next_byte()? {
                b'}' => break,
                b if b.is_ascii_digit() && digits.len() < MAX_LITERAL_DIGITS => {
                    digits.push(b as char)
                }
                b => {
                    return Err(Error::Parse(ParseError::InvalidLiteral(format!(
                        "{{{}{}",
                        digits,
                        char::from(b).escape_default()
                    ))))
                }
            }
        }
        let len: u64 = digits
            .parse()
            .map_err(|_| Error::Parse(ParseError::InvalidLiteral(format!("{{{}}}", digits))))?;

        match self.next_byte()? {
            CR => {
                if self.next_byte()? != LF {
                    return Err(Error::Parse(ParseError::InvalidLiteral(format!(
                        "{{{}}} not followed by CRLF",
                        len
                    ))));
                }
            }
            LF => {}
            _ => {
                return Err(Error::Parse(ParseError::InvalidLiteral(format!(
                    "{{{}}} not followed by CRLF",
                    len
                ))))
            }
        }

        self.spool.read_literal(self.reader, len)
    }

    /// Read the rest of the line as free text and consume the line terminator.
    pub(crate) fn read_rest_of_line(&mut self) -> Result<String> {
        let mut line = Vec::new();
        let n = self.reader.read_until(LF, &mut line)?;
        if n == 0 || line.last() != Some(&LF) {
            return Err(Error::Parse(ParseError::UnexpectedEnd));
        }
        line.pop();
        if line.last() == Some(&CR) {
            line.pop();
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }
}

fn unbalanced(b: u8) -> Error {
    match b {
        b')' => Error::Parse(ParseError::UnbalancedParen),
        _ => Error::Parse(ParseError::UnbalancedBracket),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn spool() -> LiteralSpool {
        LiteralSpool::new(1024, std::env::temp_dir())
    }

    fn tokens(input: &[u8]) -> Result<Vec<Element>> {
        let spool = spool();
        let mut cursor = Cursor::new(input);
        let mut tok = Tokenizer::new(&mut cursor, &spool);
        let mut out = Vec::new();
        loop {
            match tok.read_token()? {
                Token::Element(e) => out.push(e),
                Token::EndOfLine => return Ok(out),
                Token::Close(c) => return Err(unbalanced(c)),
            }
        }
    }

    #[test]
    fn atoms_and_quoted() {
        let t = tokens(b"abc \"d e\" \"q\\\"x\\\\\"\r\n").unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t[0].string_or_empty().string(), "abc");
        assert_eq!(t[1].string_or_empty().string(), "d e");
        assert_eq!(t[2].string_or_empty().string(), "q\"x\\");
    }

    #[test]
    fn nil_is_empty_string() {
        let t = tokens(b"NIL nil \"\"\r\n").unwrap();
        for e in &t {
            assert!(e.is_string());
            assert!(e.string_or_empty().is_empty());
        }
        assert_eq!(t[0], t[2]);
    }

    #[test]
    fn quoted_nil_is_text() {
        let t = tokens(b"\"NIL\"\r\n").unwrap();
        assert_eq!(t[0].string_or_empty().string(), "NIL");
    }

    #[test]
    fn section_brackets_stay_in_atom() {
        let t = tokens(b"BODY[HEADER.FIELDS (\"DATE\")] BODY[]<0>\r\n").unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t[0].string_or_empty().string(), "BODY[HEADER.FIELDS (\"DATE\")]");
        assert_eq!(t[1].string_or_empty().string(), "BODY[]<0>");
    }

    #[test]
    fn nested_lists() {
        let t = tokens(b"( a B () DEF ) ( a (ab) )\r\n").unwrap();
        assert_eq!(List::from(t).flatten(), "[[a,B,[],DEF],[a,[ab]]]");
    }

    #[test]
    fn bracket_list() {
        let t = tokens(b"[UIDNEXT 4]\r\n").unwrap();
        assert_eq!(t[0].flatten(), "[UIDNEXT,4]");
    }

    #[test]
    fn literal_with_embedded_crlf() {
        let t = tokens(b"{7}\r\nab\r\n)cd x\r\n").unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(&*t[0].string_or_empty().bytes(), b"ab\r\n)cd");
        assert!(t[0].string_or_empty().is_literal());
        assert!(t[1].is("x"));
    }

    #[test]
    fn empty_literal() {
        let t = tokens(b"{0}\r\n\r\n").unwrap();
        assert!(t[0].string_or_empty().is_empty());
    }

    #[test]
    fn bare_lf_terminates() {
        let t = tokens(b"a b\nrest").unwrap();
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn malformed_input_fails() {
        let cases: &[(&[u8], &str)] = &[
            (b"(a b\r\n", "unbalanced paren"),
            (b"a)\r\n", "stray close"),
            (b"[a\r\n", "unbalanced bracket"),
            (b"BODY[TEXT\r\n", "unclosed section"),
            (b"\"abc\r\n", "unterminated quote"),
            (b"{3x}\r\nabc\r\n", "bad literal digits"),
            (b"{3}abc\r\n", "literal without crlf"),
            (b"{}\r\n", "empty literal header"),
            (b"{99999999999999999999999}\r\n", "oversized literal header"),
            (b"{10}\r\nabc", "short literal"),
            (b"abc", "no line terminator"),
            (b"a\rb\r\n", "bare cr"),
            (b"", "empty stream"),
        ];
        for (input, what) in cases {
            assert!(tokens(input).is_err(), "{} should fail", what);
        }
    }

    #[test]
    fn rest_of_line() {
        let spool = spool();
        let mut cursor = Cursor::new(&b"some text (with parens\r\nnext"[..]);
        let mut tok = Tokenizer::new(&mut cursor, &spool);
        assert_eq!(tok.read_rest_of_line().unwrap(), "some text (with parens");
        assert!(tok.read_rest_of_line().is_err());
    }
}
