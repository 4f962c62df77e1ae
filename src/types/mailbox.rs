use std::fmt;

/// One folder of the account's mailbox hierarchy, as built from a `LIST` pass.
///
/// `server_id` is the decoded folder path with any path prefix removed; it is what callers persist
/// and what [`encode_folder_name`](crate::folders::encode_folder_name) turns back into a wire name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MailboxNode {
    /// Full decoded path, e.g. `Work/Reports`.
    pub server_id: String,
    /// Last path component, e.g. `Reports`.
    pub display_name: String,
    /// Hierarchy delimiter advertised for this folder; `None` for a flat name.
    pub delimiter: Option<char>,
    /// `server_id` of the parent folder, or `None` for a root.
    pub parent_server_id: Option<String>,
    /// Whether the folder can be `SELECT`ed (it is not `\Noselect`).
    pub selectable: bool,
    /// All attributes the server reported.
    pub attributes: Vec<NameAttribute>,
}

impl MailboxNode {
    /// Whether this is the special `INBOX` node.
    pub fn is_inbox(&self) -> bool {
        self.server_id.eq_ignore_ascii_case("INBOX")
    }
}

impl fmt::Display for MailboxNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "server_id: {}, display_name: {}, delimiter: {:?}, parent: {:?}, selectable: {}",
            self.server_id, self.display_name, self.delimiter, self.parent_server_id, self.selectable
        )
    }
}

/// An attribute set for an IMAP name.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum NameAttribute {
    /// It is not possible for any child levels of hierarchy to exist
    /// under this name; no child levels exist now and none can be
    /// created in the future.
    NoInferiors,

    /// It is not possible to use this name as a selectable mailbox.
    NoSelect,

    /// The mailbox has been marked "interesting" by the server; the
    /// mailbox probably contains messages that have been added since
    /// the last time the mailbox was selected.
    Marked,

    /// The mailbox does not contain any additional messages since the
    /// last time the mailbox was selected.
    Unmarked,

    /// A non-standard user- or server-defined name attribute.
    Custom(String),
}

impl NameAttribute {
    fn system(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("\\Noinferiors") {
            Some(NameAttribute::NoInferiors)
        } else if s.eq_ignore_ascii_case("\\Noselect") || s.eq_ignore_ascii_case("\\NonExistent") {
            Some(NameAttribute::NoSelect)
        } else if s.eq_ignore_ascii_case("\\Marked") {
            Some(NameAttribute::Marked)
        } else if s.eq_ignore_ascii_case("\\Unmarked") {
            Some(NameAttribute::Unmarked)
        } else {
            None
        }
    }
}

impl From<&str> for NameAttribute {
    fn from(s: &str) -> Self {
        NameAttribute::system(s).unwrap_or_else(|| NameAttribute::Custom(s.to_string()))
    }
}

/// Counters from a [`STATUS`](https://tools.ietf.org/html/rfc3501#section-6.3.10) response.
/// Items the server did not report are `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FolderStatus {
    /// Decoded name of the folder the counters belong to.
    pub name: String,
    /// The number of messages in the mailbox.
    pub messages: Option<u32>,
    /// The number of messages with the `\Recent` flag set.
    pub recent: Option<u32>,
    /// The next unique identifier value of the mailbox.
    pub uid_next: Option<u32>,
    /// The unique identifier validity value of the mailbox.
    pub uid_validity: Option<u32>,
    /// The number of messages which do not have the `\Seen` flag set.
    pub unseen: Option<u32>,
}

impl fmt::Display for FolderStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "name: {}, messages: {:?}, recent: {:?}, unseen: {:?}, uid_next: {:?}, \
             uid_validity: {:?}",
            self.name, self.messages, self.recent, self.unseen, self.uid_next, self.uid_validity
        )
    }
}
