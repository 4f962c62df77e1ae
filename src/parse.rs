use std::io::BufRead;

use crate::error::{Error, ParseError, Result};
use crate::folders::decode_folder_name;
use crate::tokenizer::{Token, Tokenizer};
use crate::types::response::STATUS_WORDS;
use crate::types::*;

/// Reads complete [`Response`]s off a byte stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseParser {
    spool: LiteralSpool,
}

impl ResponseParser {
    /// Make a parser that places literals according to `spool`.
    pub fn new(spool: LiteralSpool) -> Self {
        ResponseParser { spool }
    }

    /// The literal placement policy in use.
    pub fn spool(&self) -> &LiteralSpool {
        &self.spool
    }

    /// Read one response, blocking until its final line terminator has arrived.
    ///
    /// End of stream before the first byte is [`Error::ConnectionLost`]; end of stream anywhere
    /// later is a [`ParseError::UnexpectedEnd`]. On any failure every literal read so far has
    /// already been released.
    pub fn read_response<R: BufRead>(&self, reader: &mut R) -> Result<Response> {
        let mut tok = Tokenizer::new(reader, &self.spool);
        if tok.at_eof()? {
            return Err(Error::ConnectionLost);
        }

        if tok.peek()? == b'+' {
            tok.consume();
            let text = tok.read_rest_of_line()?;
            let text = text.strip_prefix(' ').unwrap_or(&text);
            let mut list = List::new();
            if !text.is_empty() {
                list.push(Element::from(text));
            }
            return Ok(Response::new(None, true, list));
        }

        let tag = match tok.peek()? {
            b' ' | b'\r' | b'\n' | b'(' | b')' | b'[' | b']' | b'{' | b'"' => {
                return Err(Error::Parse(ParseError::MissingTag))
            }
            _ => tok.read_atom()?,
        };
        let tag = if tag == "*" { None } else { Some(tag) };

        let mut list = List::new();
        match read_elements(&mut tok, &mut list) {
            Ok(()) => Ok(Response::new(tag, false, list)),
            Err(e) => {
                list.release();
                Err(e)
            }
        }
    }
}

fn read_elements<R: BufRead>(tok: &mut Tokenizer<'_, R>, list: &mut List) -> Result<()> {
    loop {
        match tok.read_token()? {
            Token::EndOfLine => return Ok(()),
            Token::Close(b')') => return Err(Error::Parse(ParseError::UnbalancedParen)),
            Token::Close(_) => return Err(Error::Parse(ParseError::UnbalancedBracket)),
            Token::Element(e) => {
                let status = list.is_empty()
                    && matches!(&e, Element::String(ImapString::Simple(s))
                        if STATUS_WORDS.iter().any(|w| s.eq_ignore_ascii_case(w)));
                list.push(e);
                if status {
                    return read_response_text(tok, list);
                }
            }
        }
    }
}

/// `resp-text = ["[" resp-text-code "]" SP] text`
fn read_response_text<R: BufRead>(tok: &mut Tokenizer<'_, R>, list: &mut List) -> Result<()> {
    tok.skip_spaces()?;
    if tok.peek()? == b'[' {
        tok.consume();
        let code = tok.read_list(b']')?;
        list.push(Element::List(code));
        tok.skip_spaces()?;
    }
    let text = tok.read_rest_of_line()?;
    if !text.is_empty() {
        list.push(Element::from(text.as_str()));
    }
    Ok(())
}

/// Collect capabilities from `* CAPABILITY ...` data and `[CAPABILITY ...]` response codes.
pub fn parse_capabilities(responses: &[Response]) -> Capabilities {
    let mut caps = Capabilities::default();
    for r in responses {
        if r.is_data_response(0, "CAPABILITY") {
            caps.extend_from(r.iter().skip(1));
        } else if r.response_code_or_empty().is("CAPABILITY") {
            caps.extend_from(r.response_code_list_or_empty().iter().skip(1));
        }
    }
    caps
}

/// The personal namespace advertised by a [`NAMESPACE`](https://tools.ietf.org/html/rfc2342)
/// response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Namespace {
    /// Path prefix of the user's folders, e.g. `INBOX.`.
    pub prefix: String,
    /// Hierarchy delimiter within the namespace.
    pub delimiter: Option<char>,
}

/// Extract the first personal namespace from `* NAMESPACE (("prefix" "delim")) ...`.
pub fn parse_namespace(responses: &[Response]) -> Option<Namespace> {
    responses
        .iter()
        .find(|r| r.is_data_response(0, "NAMESPACE"))
        .and_then(|r| {
            let personal = r.list_or_empty(1).list_or_empty(0);
            if personal.is_empty() {
                return None;
            }
            Some(Namespace {
                prefix: personal.string_or_empty(0).string().into_owned(),
                delimiter: personal.string_or_empty(1).string().chars().next(),
            })
        })
}

/// Build [`FolderStatus`] from `* STATUS name (MESSAGES n UNSEEN n ...)`.
pub fn parse_status(responses: &[Response], prefix: Option<&str>) -> Result<FolderStatus> {
    let r = responses
        .iter()
        .find(|r| r.is_data_response(0, "STATUS"))
        .ok_or_else(|| Error::Parse(ParseError::Unexpected("no STATUS data".to_string())))?;
    let items = r.list_or_empty(2);
    let count = |key: &str| items.key_string_or_empty(key).number::<u32>();
    Ok(FolderStatus {
        name: decode_folder_name(&r.string_or_empty(1).string(), prefix),
        messages: count("MESSAGES"),
        recent: count("RECENT"),
        uid_next: count("UIDNEXT"),
        uid_validity: count("UIDVALIDITY"),
        unseen: count("UNSEEN"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn parser(threshold: usize) -> ResponseParser {
        ResponseParser::new(LiteralSpool::new(threshold, std::env::temp_dir()))
    }

    fn parse_all(input: &[u8]) -> Result<Vec<Response>> {
        let parser = parser(1024);
        let mut cursor = Cursor::new(input);
        let mut out = Vec::new();
        while (cursor.position() as usize) < input.len() {
            out.push(parser.read_response(&mut cursor)?);
        }
        Ok(out)
    }

    #[test]
    fn status_example() {
        let rs = parse_all(b"* STATUS \"INBOX\" (UNSEEN 2)\r\n100 OK STATUS completed\r\n").unwrap();
        assert_eq!(rs.len(), 2);
        assert!(!rs[0].is_tagged());
        assert_eq!(rs[0].flatten(), "[STATUS,INBOX,[UNSEEN,2]]");
        assert_eq!(rs[1].tag(), Some("100"));
        assert_eq!(rs[1].flatten(), "[OK,STATUS completed]");
        assert!(rs[1].is_ok());
    }

    #[test]
    fn alert() {
        let rs = parse_all(b"* OK [ALERT] warn text\r\n").unwrap();
        assert!(rs[0].is_ok());
        assert_eq!(rs[0].alert_text_or_empty().string(), "warn text");
    }

    #[test]
    fn response_code_with_arguments() {
        let rs = parse_all(
            b"* OK [PERMANENTFLAGS (\\Answered \\*)] Limited\r\n\
              a3 OK [READ-ONLY] EXAMINE completed\r\n",
        )
        .unwrap();
        assert_eq!(rs[0].response_code_or_empty().string(), "PERMANENTFLAGS");
        assert_eq!(
            rs[0].response_code_list_or_empty().list_or_empty(1).flatten(),
            "[\\Answered,\\*]"
        );
        assert_eq!(rs[0].status_text_or_empty().string(), "Limited");
        assert!(rs[1].response_code_or_empty().is("read-only"));
    }

    #[test]
    fn status_text_is_not_tokenized() {
        let rs = parse_all(b"a1 NO [TRYCREATE] can't (really) \"do\" that\r\n").unwrap();
        assert!(rs[0].is_no());
        assert_eq!(rs[0].status_text_or_empty().string(), "can't (really) \"do\" that");
    }

    #[test]
    fn status_without_text() {
        let rs = parse_all(b"a1 OK\r\n").unwrap();
        assert!(rs[0].is_ok());
        assert_eq!(rs[0].len(), 1);
    }

    #[test]
    fn bye() {
        let rs = parse_all(b"* BYE Autologout timer\r\n").unwrap();
        assert!(rs[0].is_bye());
        assert_eq!(rs[0].status_text_or_empty().string(), "Autologout timer");
    }

    #[test]
    fn continuation() {
        let rs = parse_all(b"+ Ready for (additional) text\r\n+\r\n").unwrap();
        assert!(rs[0].is_continuation_request());
        assert_eq!(rs[0].len(), 1);
        assert_eq!(
            rs[0].continuation_text_or_empty().string(),
            "Ready for (additional) text"
        );
        assert!(rs[1].is_continuation_request());
        assert!(rs[1].is_empty());
    }

    #[test]
    fn data_responses() {
        let rs = parse_all(b"* 23 EXISTS\r\n* 3 RECENT\r\n* LIST () \"/\" foo\r\n").unwrap();
        assert!(rs[0].is_data_response(1, "EXISTS"));
        assert_eq!(rs[0].string_or_empty(0).number_or_zero(), 23);
        assert!(rs[1].is_data_response(1, "recent"));
        assert!(rs[2].is_data_response(0, "LIST"));
    }

    #[test]
    fn fetch_with_literal() {
        let rs = parse_all(
            b"* 2 FETCH (UID 8 BODY[TEXT] {3}\r\nfoo FLAGS (\\Seen))\r\na1 OK done\r\n",
        )
        .unwrap();
        let attrs = rs[0].list_or_empty(2);
        assert_eq!(attrs.key_string_or_empty("UID").number_or_zero(), 8);
        assert_eq!(attrs.key_string_or_empty("BODY[TEXT]").string(), "foo");
        assert!(attrs.key_list_or_empty("FLAGS").contains("\\seen"));
    }

    #[test]
    fn literal_threshold_picks_representation() {
        let input = b"* 1 FETCH (BODY[] {5}\r\nhello)\r\n";
        for (threshold, file) in [(4, true), (5, false), (100, false), (0, true)] {
            let parser = parser(threshold);
            let mut r = parser.read_response(&mut Cursor::new(&input[..])).unwrap();
            let body = r.list_or_empty(2).key_string_or_empty("BODY[]");
            assert_eq!(&*body.bytes(), b"hello");
            assert_eq!(body.len(), 5);
            assert_eq!(matches!(body, ImapString::FileLiteral(_)), file);
            r.release();
        }
    }

    #[test]
    fn eof_before_response_is_connection_lost() {
        match parser(10).read_response(&mut Cursor::new(&b""[..])) {
            Err(Error::ConnectionLost) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn truncated_response_is_grammar_error() {
        for input in [&b"* 1 FETCH (UID"[..], b"a1 OK", b"* 1 FETCH {5}\r\nab"] {
            match parser(10).read_response(&mut Cursor::new(input)) {
                Err(Error::Parse(_)) => {}
                other => panic!("unexpected for {:?}: {:?}", input, other),
            }
        }
    }

    #[test]
    fn missing_tag() {
        match parser(10).read_response(&mut Cursor::new(&b" OK\r\n"[..])) {
            Err(Error::Parse(ParseError::MissingTag)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn stray_close_paren() {
        assert!(parse_all(b"* 1 FETCH (UID 1))\r\n").is_err());
    }

    #[test]
    fn capabilities_from_data_and_code() {
        let rs = parse_all(
            b"* CAPABILITY IMAP4rev1 ID\r\na1 OK [CAPABILITY IMAP4rev1 NAMESPACE] done\r\n",
        )
        .unwrap();
        let caps = parse_capabilities(&rs);
        assert!(caps.has("ID"));
        assert!(caps.has("NAMESPACE"));
        assert!(!caps.has("CAPABILITY"));
    }

    #[test]
    fn namespace() {
        let rs = parse_all(b"* NAMESPACE ((\"INBOX.\" \".\")) NIL NIL\r\n").unwrap();
        assert_eq!(
            parse_namespace(&rs),
            Some(Namespace {
                prefix: "INBOX.".into(),
                delimiter: Some('.'),
            })
        );
        let rs = parse_all(b"* NAMESPACE NIL NIL NIL\r\n").unwrap();
        assert_eq!(parse_namespace(&rs), None);
    }

    #[test]
    fn status_items() {
        let rs = parse_all(
            b"* STATUS \"INBOX.Sent\" (MESSAGES 231 UIDNEXT 44292 UNSEEN 3)\r\na1 OK\r\n",
        )
        .unwrap();
        let status = parse_status(&rs, Some("INBOX.")).unwrap();
        assert_eq!(status.name, "Sent");
        assert_eq!(status.messages, Some(231));
        assert_eq!(status.uid_next, Some(44292));
        assert_eq!(status.unseen, Some(3));
        assert_eq!(status.recent, None);
    }

    proptest! {
        #[test]
        fn literal_bytes_survive_either_representation(
            payload in prop::collection::vec(any::<u8>(), 0..256),
            threshold in 0usize..300,
        ) {
            let mut input = format!("* 1 FETCH (BODY[] {{{}}}\r\n", payload.len()).into_bytes();
            input.extend_from_slice(&payload);
            input.extend_from_slice(b")\r\n");

            let mut r = parser(threshold).read_response(&mut Cursor::new(&input[..])).unwrap();
            let body = r.list_or_empty(2).key_string_or_empty("BODY[]");
            let bytes = body.bytes();
            prop_assert_eq!(&*bytes, &payload[..]);
            prop_assert_eq!(matches!(body, ImapString::FileLiteral(_)), payload.len() > threshold);
            drop(bytes);
            r.release();
        }
    }
}
