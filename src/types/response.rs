use std::fmt;
use std::ops::{Deref, DerefMut};
use std::slice::{Iter, IterMut};
use std::vec::IntoIter;

use super::element::{Element, ImapString, List};

/// One complete server response: tagged, untagged (`*`) or a continuation request (`+`).
///
/// The tag is not part of the element list; for `a1 OK [READ-ONLY] done` the elements are
/// `[OK, [READ-ONLY], done]`. All [`List`] accessors are available through `Deref`.
///
/// A response owns every literal it contains. Call [`release`](Response::release) once the
/// response has been consumed.
#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    tag: Option<String>,
    continuation: bool,
    list: List,
}

pub(crate) const STATUS_WORDS: [&str; 5] = ["OK", "NO", "BAD", "BYE", "PREAUTH"];

impl Response {
    pub(crate) fn new(tag: Option<String>, continuation: bool, list: List) -> Self {
        Response {
            tag,
            continuation,
            list,
        }
    }

    /// The client-assigned tag, if this is a tagged response.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Whether this response carries a tag.
    pub fn is_tagged(&self) -> bool {
        self.tag.is_some()
    }

    /// Whether this is a `+` continuation request.
    pub fn is_continuation_request(&self) -> bool {
        self.continuation
    }

    /// Whether the first element is one of `OK`, `NO`, `BAD`, `BYE` or `PREAUTH`.
    pub fn is_status_response(&self) -> bool {
        !self.continuation && STATUS_WORDS.iter().any(|w| self.list.is(0, w))
    }

    /// Status `OK`.
    pub fn is_ok(&self) -> bool {
        !self.continuation && self.list.is(0, "OK")
    }

    /// Status `NO`.
    pub fn is_no(&self) -> bool {
        !self.continuation && self.list.is(0, "NO")
    }

    /// Status `BAD`.
    pub fn is_bad(&self) -> bool {
        !self.continuation && self.list.is(0, "BAD")
    }

    /// Status `BYE`: the server is closing the connection.
    pub fn is_bye(&self) -> bool {
        !self.continuation && self.list.is(0, "BYE")
    }

    /// Status `PREAUTH`, only valid as a greeting.
    pub fn is_preauth(&self) -> bool {
        !self.tagged_or_continuation() && self.list.is(0, "PREAUTH")
    }

    fn tagged_or_continuation(&self) -> bool {
        self.tag.is_some() || self.continuation
    }

    /// Whether this is untagged data whose element at `index` equals `keyword`, e.g.
    /// `is_data_response(1, "EXISTS")` for `* 23 EXISTS`.
    pub fn is_data_response(&self, index: usize, keyword: &str) -> bool {
        !self.tagged_or_continuation() && self.list.is(index, keyword)
    }

    /// The bracketed response code list of a status response, e.g. `[UIDNEXT, 4392]`.
    pub fn response_code_list_or_empty(&self) -> &List {
        if !self.is_status_response() {
            return List::empty();
        }
        self.list.list_or_empty(1)
    }

    /// The name of the response code of a status response, e.g. `ALERT`.
    pub fn response_code_or_empty(&self) -> &ImapString {
        self.response_code_list_or_empty().string_or_empty(0)
    }

    /// The human-readable text of a status response.
    pub fn status_text_or_empty(&self) -> &ImapString {
        if !self.is_status_response() {
            return ImapString::empty();
        }
        match self.list.element_or_none(1) {
            Element::List(_) => self.list.string_or_empty(2),
            other => other.string_or_empty(),
        }
    }

    /// The text of an `[ALERT]` status response, which the user must be shown.
    pub fn alert_text_or_empty(&self) -> &ImapString {
        if !self.response_code_or_empty().is("ALERT") {
            return ImapString::empty();
        }
        self.status_text_or_empty()
    }

    /// The free text following `+` in a continuation request.
    pub fn continuation_text_or_empty(&self) -> &ImapString {
        if !self.continuation {
            return ImapString::empty();
        }
        self.list.string_or_empty(0)
    }

    /// Release every literal this response contains.
    pub fn release(&mut self) {
        self.list.release();
    }
}

impl Deref for Response {
    type Target = List;

    fn deref(&self) -> &List {
        &self.list
    }
}

impl DerefMut for Response {
    fn deref_mut(&mut self) -> &mut List {
        &mut self.list
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.continuation {
            f.write_str("+ ")?;
        } else {
            write!(f, "{} ", self.tag.as_deref().unwrap_or("*"))?;
        }
        fmt::Display::fmt(&self.list, f)
    }
}

/// All responses read for one command, in arrival order; the tagged completion comes last.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Responses(Vec<Response>);

impl Responses {
    pub(crate) fn push(&mut self, response: Response) {
        self.0.push(response);
    }

    /// The tagged completion, if the batch contains one.
    pub fn completion(&self) -> Option<&Response> {
        self.0.last().filter(|r| r.is_tagged())
    }

    /// Whether the command completed with `OK`.
    pub fn is_ok(&self) -> bool {
        self.completion().map(Response::is_ok).unwrap_or(false)
    }

    /// Untagged responses whose element at `index` equals `keyword`.
    pub fn data_responses<'a>(
        &'a self,
        index: usize,
        keyword: &'a str,
    ) -> impl Iterator<Item = &'a Response> + 'a {
        self.0
            .iter()
            .filter(move |r| r.is_data_response(index, keyword))
    }

    /// Release the literals of every response in the batch.
    pub fn release(&mut self) {
        for r in &mut self.0 {
            r.release();
        }
    }

    /// Unwrap into the underlying vector. The caller takes over releasing.
    pub fn into_inner(self) -> Vec<Response> {
        self.0
    }

    /// Iterate over mutable responses, e.g. to [`take`](List::take) a literal out.
    pub fn iter_mut(&mut self) -> IterMut<'_, Response> {
        self.0.iter_mut()
    }
}

impl Deref for Responses {
    type Target = [Response];

    fn deref(&self) -> &[Response] {
        &self.0
    }
}

impl From<Vec<Response>> for Responses {
    fn from(v: Vec<Response>) -> Self {
        Responses(v)
    }
}

impl IntoIterator for Responses {
    type Item = Response;
    type IntoIter = IntoIter<Response>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Responses {
    type Item = &'a Response;
    type IntoIter = Iter<'a, Response>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(tag: Option<&str>, elements: Vec<Element>) -> Response {
        Response::new(tag.map(String::from), false, List::from(elements))
    }

    #[test]
    fn alert_text() {
        let r = status(
            None,
            vec![
                Element::from("OK"),
                Element::from(List::from(vec![Element::from("ALERT")])),
                Element::from("warn text"),
            ],
        );
        assert!(r.is_ok());
        assert!(r.is_status_response());
        assert_eq!(r.response_code_or_empty().string(), "ALERT");
        assert_eq!(r.alert_text_or_empty().string(), "warn text");
        assert_eq!(r.status_text_or_empty().string(), "warn text");
    }

    #[test]
    fn status_text_without_code() {
        let r = status(
            Some("a1"),
            vec![Element::from("NO"), Element::from("no such mailbox")],
        );
        assert!(r.is_no());
        assert!(r.response_code_or_empty().is_empty());
        assert!(r.alert_text_or_empty().is_empty());
        assert_eq!(r.status_text_or_empty().string(), "no such mailbox");
    }

    #[test]
    fn data_responses_are_untagged() {
        let untagged = status(None, vec![Element::from("3"), Element::from("EXISTS")]);
        assert!(untagged.is_data_response(1, "exists"));
        assert!(!untagged.is_status_response());
        assert!(untagged.status_text_or_empty().is_empty());

        let tagged = status(Some("a2"), vec![Element::from("3"), Element::from("EXISTS")]);
        assert!(!tagged.is_data_response(1, "EXISTS"));
    }

    #[test]
    fn continuation_is_not_a_status() {
        let r = Response::new(None, true, List::from(vec![Element::from("OK go ahead")]));
        assert!(!r.is_ok());
        assert!(r.is_continuation_request());
        assert_eq!(r.continuation_text_or_empty().string(), "OK go ahead");
    }

    #[test]
    fn completion_is_last_tagged() {
        let mut batch = Responses::default();
        batch.push(status(None, vec![Element::from("3"), Element::from("EXISTS")]));
        assert!(batch.completion().is_none());
        assert!(!batch.is_ok());
        batch.push(status(Some("a1"), vec![Element::from("OK")]));
        assert!(batch.is_ok());
        assert_eq!(batch.data_responses(1, "EXISTS").count(), 1);
    }
}
