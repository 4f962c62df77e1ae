use std::borrow::Cow;
use std::fmt;
use std::io::{Cursor, Read};
use std::mem;
use std::slice::Iter;
use std::str::FromStr;

use super::literal::FileLiteral;

static NONE: Element = Element::None;
static EMPTY_LIST: List = List {
    elements: Vec::new(),
};
static EMPTY_STRING: ImapString = ImapString::Simple(String::new());

/// One node of a parsed IMAP response.
///
/// Every accessor that looks an element up by position or key returns a reference to one of the
/// static sentinels ([`Element::none`], [`List::empty`], [`ImapString::empty`]) rather than an
/// `Option`, so chains like `response.list_or_empty(2).string_or_empty(0)` never need to branch
/// on absence.
#[derive(Debug, PartialEq, Eq)]
pub enum Element {
    /// A parenthesized (or bracketed) list.
    List(List),
    /// An atom, quoted string or literal. `NIL` parses to the empty string.
    String(ImapString),
    /// Nothing; returned for lookups that did not match.
    None,
}

impl Element {
    /// The shared "no element" sentinel.
    pub fn none() -> &'static Element {
        &NONE
    }

    /// Returns true for [`Element::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, Element::None)
    }

    /// Returns true if this is a list.
    pub fn is_list(&self) -> bool {
        matches!(self, Element::List(_))
    }

    /// Returns true if this is a string of any kind.
    pub fn is_string(&self) -> bool {
        matches!(self, Element::String(_))
    }

    /// This element as a list, or the empty list.
    pub fn list_or_empty(&self) -> &List {
        match self {
            Element::List(l) => l,
            _ => List::empty(),
        }
    }

    /// This element as a string, or the empty string.
    pub fn string_or_empty(&self) -> &ImapString {
        match self {
            Element::String(s) => s,
            _ => ImapString::empty(),
        }
    }

    /// Case-insensitive comparison; only strings can match.
    pub fn is(&self, keyword: &str) -> bool {
        match self {
            Element::String(s) => s.is(keyword),
            _ => false,
        }
    }

    /// Release every file literal reachable from this element.
    pub fn release(&mut self) {
        match self {
            Element::List(l) => l.release(),
            Element::String(s) => s.release(),
            Element::None => {}
        }
    }

    /// A compact rendering of the tree, e.g. `[FETCH,[UID,1]]`.
    pub fn flatten(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::List(l) => fmt::Display::fmt(l, f),
            Element::String(s) => fmt::Display::fmt(s, f),
            Element::None => f.write_str("#NONE#"),
        }
    }
}

impl From<List> for Element {
    fn from(l: List) -> Self {
        Element::List(l)
    }
}

impl From<ImapString> for Element {
    fn from(s: ImapString) -> Self {
        Element::String(s)
    }
}

impl From<&str> for Element {
    fn from(s: &str) -> Self {
        Element::String(ImapString::from(s))
    }
}

/// An ordered sequence of elements. Sibling order is significant and lists may be empty.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct List {
    elements: Vec<Element>,
}

impl List {
    /// Make a new, empty list.
    pub fn new() -> Self {
        List::default()
    }

    /// The shared empty-list sentinel.
    pub fn empty() -> &'static List {
        &EMPTY_LIST
    }

    pub(crate) fn push(&mut self, element: Element) {
        self.elements.push(element);
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if the list has no children.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterate over the direct children.
    pub fn iter(&self) -> Iter<'_, Element> {
        self.elements.iter()
    }

    /// The child at `index`, or [`Element::none`] when out of range.
    pub fn element_or_none(&self, index: usize) -> &Element {
        self.elements.get(index).unwrap_or(&NONE)
    }

    /// The child at `index` if it is a list, otherwise the empty list.
    pub fn list_or_empty(&self, index: usize) -> &List {
        self.element_or_none(index).list_or_empty()
    }

    /// The child at `index` if it is a string, otherwise the empty string.
    pub fn string_or_empty(&self, index: usize) -> &ImapString {
        self.element_or_none(index).string_or_empty()
    }

    /// Whether the child at `index` is a string equal to `keyword`, ignoring ASCII case.
    pub fn is(&self, index: usize, keyword: &str) -> bool {
        self.element_or_none(index).is(keyword)
    }

    /// Whether the child at `index` is a string starting with `prefix`, ignoring ASCII case.
    pub fn starts_with(&self, index: usize, prefix: &str) -> bool {
        match self.element_or_none(index) {
            Element::String(s) => s.starts_with(prefix),
            _ => false,
        }
    }

    /// Whether any direct child is a string equal to `keyword`, ignoring ASCII case.
    pub fn contains(&self, keyword: &str) -> bool {
        self.elements.iter().any(|e| e.is(keyword))
    }

    /// Treat the list as `key value key value ...` and return the value following `key`.
    ///
    /// Keys sit at even indices. A trailing key with no value yields [`Element::none`].
    pub fn key_value_or_none(&self, key: &str) -> &Element {
        self.keyed_element_or_none(key, false)
    }

    /// Like [`key_value_or_none`](Self::key_value_or_none), optionally matching keys by prefix
    /// (useful for `BODY[...]` fetch items whose section varies).
    pub fn keyed_element_or_none(&self, key: &str, prefix: bool) -> &Element {
        for i in (1..self.elements.len()).step_by(2) {
            let matched = if prefix {
                self.starts_with(i - 1, key)
            } else {
                self.is(i - 1, key)
            };
            if matched {
                return &self.elements[i];
            }
        }
        &NONE
    }

    /// The value following `key` as a string, or the empty string.
    pub fn key_string_or_empty(&self, key: &str) -> &ImapString {
        self.key_value_or_none(key).string_or_empty()
    }

    /// The value following `key` as a list, or the empty list.
    pub fn key_list_or_empty(&self, key: &str) -> &List {
        self.key_value_or_none(key).list_or_empty()
    }

    /// Move the child at `index` out of the list, leaving [`Element::None`] in its place.
    ///
    /// This is how ownership of a literal is handed to a caller before the rest of a response is
    /// released.
    pub fn take(&mut self, index: usize) -> Element {
        match self.elements.get_mut(index) {
            Some(e) => mem::replace(e, Element::None),
            None => Element::None,
        }
    }

    /// [`take`](Self::take) the value following `key`.
    pub fn take_key_value(&mut self, key: &str) -> Element {
        match (1..self.elements.len())
            .step_by(2)
            .find(|&i| self.is(i - 1, key))
        {
            Some(i) => self.take(i),
            None => Element::None,
        }
    }

    /// Release every file literal reachable from this list.
    pub fn release(&mut self) {
        for e in &mut self.elements {
            e.release();
        }
    }

    /// A compact rendering of the tree, e.g. `[a,B,[],DEF]`.
    pub fn flatten(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        let mut first = true;
        for e in &self.elements {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            fmt::Display::fmt(e, f)?;
        }
        f.write_str("]")
    }
}

impl From<Vec<Element>> for List {
    fn from(elements: Vec<Element>) -> Self {
        List { elements }
    }
}

impl<'a> IntoIterator for &'a List {
    type Item = &'a Element;
    type IntoIter = Iter<'a, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

/// String-like data: an atom or quoted string, or a literal held in memory or spooled to disk.
#[derive(Debug, PartialEq, Eq)]
pub enum ImapString {
    /// An atom or quoted string.
    Simple(String),
    /// A literal no larger than the spool threshold.
    MemoryLiteral(Vec<u8>),
    /// A literal larger than the spool threshold.
    FileLiteral(FileLiteral),
}

impl ImapString {
    /// The shared empty-string sentinel. `NIL` parses to an equal value.
    pub fn empty() -> &'static ImapString {
        &EMPTY_STRING
    }

    /// Length in bytes.
    pub fn len(&self) -> u64 {
        match self {
            ImapString::Simple(s) => s.len() as u64,
            ImapString::MemoryLiteral(b) => b.len() as u64,
            ImapString::FileLiteral(f) => f.len(),
        }
    }

    /// Returns true if the string has no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true for either literal representation.
    pub fn is_literal(&self) -> bool {
        !matches!(self, ImapString::Simple(_))
    }

    /// The content as bytes. A file literal is read from disk; if that fails the result is empty.
    pub fn bytes(&self) -> Cow<'_, [u8]> {
        match self {
            ImapString::Simple(s) => Cow::Borrowed(s.as_bytes()),
            ImapString::MemoryLiteral(b) => Cow::Borrowed(b),
            ImapString::FileLiteral(f) => match f.read_to_vec() {
                Ok(b) => Cow::Owned(b),
                Err(e) => {
                    tracing::warn!(path = %f.path().display(), error = %e, "unable to read file literal");
                    Cow::Borrowed(&[])
                }
            },
        }
    }

    /// The content as text, replacing invalid UTF-8.
    pub fn string(&self) -> Cow<'_, str> {
        match self {
            ImapString::Simple(s) => Cow::Borrowed(s),
            ImapString::MemoryLiteral(b) => String::from_utf8_lossy(b),
            ImapString::FileLiteral(_) => {
                Cow::Owned(String::from_utf8_lossy(&self.bytes()).into_owned())
            }
        }
    }

    /// A byte source over the content. File literals are streamed from disk.
    pub fn reader(&self) -> std::io::Result<Box<dyn Read + '_>> {
        Ok(match self {
            ImapString::Simple(s) => Box::new(Cursor::new(s.as_bytes())),
            ImapString::MemoryLiteral(b) => Box::new(Cursor::new(&b[..])),
            ImapString::FileLiteral(f) => Box::new(f.open()?),
        })
    }

    /// The content parsed as a number, if it is one.
    pub fn number<T: FromStr>(&self) -> Option<T> {
        self.string().trim().parse().ok()
    }

    /// The content parsed as an unsigned number, or zero.
    pub fn number_or_zero(&self) -> u64 {
        self.number().unwrap_or(0)
    }

    /// Equality ignoring ASCII case.
    pub fn is(&self, keyword: &str) -> bool {
        self.len() == keyword.len() as u64 && self.string().eq_ignore_ascii_case(keyword)
    }

    /// Prefix test ignoring ASCII case.
    pub fn starts_with(&self, prefix: &str) -> bool {
        if self.len() < prefix.len() as u64 {
            return false;
        }
        let s = self.string();
        s.len() >= prefix.len()
            && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    }

    /// Delete the backing file of a file literal; a no-op for everything else.
    pub fn release(&mut self) {
        if let ImapString::FileLiteral(f) = self {
            f.release();
        }
    }
}

impl fmt::Display for ImapString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImapString::Simple(s) => f.write_str(s),
            ImapString::MemoryLiteral(b) => f.write_str(&String::from_utf8_lossy(b)),
            ImapString::FileLiteral(l) => write!(f, "{{{} byte literal(file)}}", l.len()),
        }
    }
}

impl From<&str> for ImapString {
    fn from(s: &str) -> Self {
        ImapString::Simple(s.to_string())
    }
}

impl From<String> for ImapString {
    fn from(s: String) -> Self {
        ImapString::Simple(s)
    }
}
