//! This module contains the data model produced by the response parser: the element tree,
//! literals, responses, and the typed values built from them.

/// From section [2.3.1.1 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-2.3.1.1).
///
/// A 32-bit value assigned to each message, which when used with the unique identifier validity
/// value forms a 64-bit value that will not refer to any other message in the mailbox or any
/// subsequent mailbox with the same name forever.  Unique identifiers are assigned in a strictly
/// ascending fashion in the mailbox; unlike message sequence numbers, they are not necessarily
/// contiguous.
pub type Uid = u32;

mod element;
pub use self::element::{Element, ImapString, List};

pub(crate) mod literal;
pub use self::literal::{sweep_orphans, FileLiteral, LiteralSpool, SPOOL_FILE_PREFIX};

pub(crate) mod response;
pub use self::response::{Response, Responses};

mod capabilities;
pub use self::capabilities::Capabilities;

mod mailbox;
pub use self::mailbox::{FolderStatus, MailboxNode, NameAttribute};
