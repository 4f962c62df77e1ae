//! Enable the test_helpers feature to expose helper methods to build
//! response structures and scripted transports for testing code that uses this crate.
//!
//! To use add a dev-dependency on the crate adding the feature "test_helpers"
//! e.g.
//!
//! ```toml
//! [dependencies]
//! imap-wire = { version = "0.1" }
//!
//! [dev-dependencies]
//! # mirror the same configuration your dependencies and add test_helpers
//! imap-wire = { version = "0.1", features = ["test_helpers"] }
//! ```
//!
#[cfg(doc)]
use crate::types::*;

pub use crate::mock_stream::MockStream;

/// Methods to build [`Responses`] objects
pub mod responses {
    use std::io::Cursor;

    use crate::parse::ResponseParser;
    use crate::types::{LiteralSpool, Responses};

    /// Parses every response in `input`, keeping all literals in memory.
    ///
    /// Example input.
    ///
    /// ```
    /// let input = "\
    /// * STATUS \"INBOX\" (UNSEEN 2)\r\n\
    /// 100 OK STATUS completed\r\n\
    /// ";
    /// let responses = imap_wire::testing::responses::parse(input);
    /// assert_eq!(responses.len(), 2);
    /// ```
    pub fn parse(input: impl Into<Vec<u8>>) -> Responses {
        parse_with(input, LiteralSpool::new(usize::MAX, std::env::temp_dir()))
    }

    /// Parses every response in `input`, placing literals according to `spool`.
    pub fn parse_with(input: impl Into<Vec<u8>>, spool: LiteralSpool) -> Responses {
        let input = input.into();
        let parser = ResponseParser::new(spool);
        let mut cursor = Cursor::new(&input[..]);
        let mut responses = Vec::new();
        while (cursor.position() as usize) < input.len() {
            responses.push(parser.read_response(&mut cursor).unwrap());
        }
        Responses::from(responses)
    }
}

/// Methods to build a folder hierarchy
pub mod folders {
    use crate::types::MailboxNode;

    /// Builds the [`MailboxNode`]s for the `LIST` responses in `input`.
    ///
    /// Example input.
    ///
    /// ```
    /// let input = "\
    /// * LIST (\\HasNoChildren) \".\" \"INBOX\"\r\n\
    /// * LIST (\\HasNoChildren) \".\" \"INBOX.Sent\"\r\n\
    /// ";
    /// let nodes = imap_wire::testing::folders::parse(input, Some("INBOX."));
    /// assert_eq!(nodes[1].server_id, "Sent");
    ///```
    pub fn parse(input: impl Into<Vec<u8>>, prefix: Option<&str>) -> Vec<MailboxNode> {
        let responses = super::responses::parse(input);
        crate::folders::build_hierarchy(&responses, prefix)
    }
}
