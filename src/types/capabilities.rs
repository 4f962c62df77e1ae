use std::collections::hash_set::Iter;
use std::collections::HashSet;

use super::element::Element;

/// From [section 7.2.1 of RFC 3501](https://tools.ietf.org/html/rfc3501#section-7.2.1).
///
/// A list of capabilities that the server supports.
/// The capability list will include the atom "IMAP4rev1".
///
/// A capability name which begins with `AUTH=` indicates that the server supports that particular
/// authentication mechanism.
///
/// The `LOGINDISABLED` capability indicates that the `LOGIN` command is disabled, and that the
/// server will respond with a `NO` response to any attempt to use the `LOGIN` command even if the
/// user name and password are valid.
///
/// Capability names are compared without regard to ASCII case.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities(pub(crate) HashSet<String>);

impl Capabilities {
    /// Check if the server has the given capability.
    pub fn has(&self, s: &str) -> bool {
        self.0.contains(&s.to_ascii_uppercase())
    }

    /// Check if the server supports the given `AUTH=` mechanism.
    pub fn has_auth(&self, mechanism: &str) -> bool {
        self.has(&format!("AUTH={}", mechanism))
    }

    /// Iterate over all the server's capabilities, upper-cased.
    pub fn iter(&self) -> Iter<'_, String> {
        self.0.iter()
    }

    /// Returns how many capabilities the server has.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the server purports to have no capabilities.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn extend_from<'a>(&mut self, atoms: impl IntoIterator<Item = &'a Element>) {
        for atom in atoms {
            if let Element::String(s) = atom {
                if !s.is_empty() {
                    self.0.insert(s.string().to_ascii_uppercase());
                }
            }
        }
    }
}

impl<S: AsRef<str>> FromIterator<S> for Capabilities {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Capabilities(
            iter.into_iter()
                .map(|s| s.as_ref().to_ascii_uppercase())
                .collect(),
        )
    }
}
