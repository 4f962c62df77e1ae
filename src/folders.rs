//! Turning `LIST` output into a mailbox hierarchy, and folder names to and from their wire form.

use std::collections::HashMap;

use crate::types::{MailboxNode, NameAttribute, Response};
use crate::utf7;

const INBOX: &str = "INBOX";

/// Turn a wire folder name into the name callers see: the path prefix is stripped, then the rest
/// is decoded from modified UTF-7. A name that is not valid modified UTF-7 is kept as sent.
///
/// `prefix` is in wire form, as the server reports it in `NAMESPACE` and as
/// [`Config::path_prefix`](crate::Config::path_prefix) stores it.
pub fn decode_folder_name(encoded: &str, prefix: Option<&str>) -> String {
    let stripped = match prefix {
        Some(p) if !p.is_empty() && encoded.starts_with(p) => &encoded[p.len()..],
        _ => encoded,
    };
    utf7::decode(stripped).unwrap_or_else(|| stripped.to_string())
}

/// The inverse of [`decode_folder_name`]. `INBOX` is never prefixed.
pub fn encode_folder_name(name: &str, prefix: Option<&str>) -> String {
    if name.eq_ignore_ascii_case(INBOX) {
        return INBOX.to_string();
    }
    format!("{}{}", prefix.unwrap_or_default(), utf7::encode(name))
}

struct Listed {
    name: String,
    delimiter: Option<char>,
    attributes: Vec<NameAttribute>,
}

fn listed(response: &Response, prefix: Option<&str>) -> Listed {
    let attributes = response
        .list_or_empty(1)
        .iter()
        .map(|flag| NameAttribute::from(&*flag.string_or_empty().string()))
        .collect();
    Listed {
        name: decode_folder_name(&response.string_or_empty(3).string(), prefix),
        delimiter: response.string_or_empty(2).string().chars().next(),
        attributes,
    }
}

/// Build the full folder tree from the untagged `LIST` responses of one `LIST` command.
///
/// `INBOX` always comes first and is always selectable. Every other folder follows in the order the
/// server listed it, linked to its parent when the parent was listed too; a folder whose parent is
/// missing becomes a root. Names that repeat are kept once.
pub fn build_hierarchy(responses: &[Response], prefix: Option<&str>) -> Vec<MailboxNode> {
    let mut inbox: Option<Listed> = None;
    let mut first_delimiter = None;
    let mut folders: Vec<Listed> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for response in responses.iter().filter(|r| r.is_data_response(0, "LIST")) {
        let entry = listed(response, prefix);
        if first_delimiter.is_none() {
            first_delimiter = entry.delimiter;
        }
        if entry.name.eq_ignore_ascii_case(INBOX) {
            inbox.get_or_insert(entry);
            continue;
        }
        if entry.name.is_empty() || seen.contains_key(&entry.name) {
            continue;
        }
        seen.insert(entry.name.clone(), folders.len());
        folders.push(entry);
    }

    let mut nodes = Vec::with_capacity(folders.len() + 1);
    nodes.push(MailboxNode {
        server_id: INBOX.to_string(),
        display_name: INBOX.to_string(),
        delimiter: inbox.as_ref().and_then(|i| i.delimiter).or(first_delimiter),
        parent_server_id: None,
        selectable: true,
        attributes: inbox.map(|i| i.attributes).unwrap_or_default(),
    });

    for folder in folders {
        let split = folder
            .delimiter
            .and_then(|d| folder.name.rsplit_once(d));
        let (parent, display_name) = match split {
            Some((parent, leaf)) => {
                let parent = if parent.eq_ignore_ascii_case(INBOX) {
                    Some(INBOX.to_string())
                } else if seen.contains_key(parent) {
                    Some(parent.to_string())
                } else {
                    None
                };
                (parent, leaf.to_string())
            }
            None => (None, folder.name.clone()),
        };
        nodes.push(MailboxNode {
            selectable: !folder.attributes.contains(&NameAttribute::NoSelect),
            server_id: folder.name,
            display_name,
            delimiter: folder.delimiter,
            parent_server_id: parent,
            attributes: folder.attributes,
        });
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::responses;
    use proptest::prelude::*;

    fn node<'a>(nodes: &'a [MailboxNode], id: &str) -> &'a MailboxNode {
        nodes
            .iter()
            .find(|n| n.server_id == id)
            .unwrap_or_else(|| panic!("no node {}", id))
    }

    #[test]
    fn non_ascii_prefix_round_trip() {
        let prefix = crate::Config::default().path_prefix("Entwürfe/").path_prefix;
        let prefix = prefix.as_deref();
        let wire = encode_folder_name("Gesendet", prefix);
        assert_eq!(wire, "Entw&APw-rfe/Gesendet");
        assert_eq!(decode_folder_name(&wire, prefix), "Gesendet");
        assert_eq!(encode_folder_name("inbox", prefix), "INBOX");
    }

    #[test]
    fn hierarchy() {
        let rs = responses::parse(
            "* LIST (\\HasChildren) \"/\" Work\r\n\
             * LIST (\\HasNoChildren) \"/\" \"Work/Reports\"\r\n\
             * LIST (\\Noselect \\HasChildren) \"/\" Archive\r\n\
             * LIST () \"/\" Archive/2020/Q1\r\n\
             * LIST () \"/\" \"Entw&APw-rfe\"\r\n\
             * LIST (\\HasNoChildren) \"/\" inbox\r\n\
             * LIST () \"/\" \"INBOX/Receipts\"\r\n\
             * LIST () \"/\" Work\r\n\
             a1 OK LIST completed\r\n",
        );
        let nodes = build_hierarchy(&rs, None);
        let ids: Vec<&str> = nodes.iter().map(|n| n.server_id.as_str()).collect();
        assert_eq!(
            ids,
            [
                "INBOX",
                "Work",
                "Work/Reports",
                "Archive",
                "Archive/2020/Q1",
                "Entwürfe",
                "INBOX/Receipts"
            ]
        );

        let inbox = node(&nodes, "INBOX");
        assert!(inbox.is_inbox());
        assert!(inbox.selectable);
        assert_eq!(inbox.delimiter, Some('/'));
        assert_eq!(inbox.attributes, [NameAttribute::Custom("\\HasNoChildren".into())]);

        let reports = node(&nodes, "Work/Reports");
        assert_eq!(reports.display_name, "Reports");
        assert_eq!(reports.parent_server_id.as_deref(), Some("Work"));

        assert!(!node(&nodes, "Archive").selectable);
        let q1 = node(&nodes, "Archive/2020/Q1");
        assert_eq!(q1.display_name, "Q1");
        assert_eq!(q1.parent_server_id, None);

        assert_eq!(
            node(&nodes, "INBOX/Receipts").parent_server_id.as_deref(),
            Some("INBOX")
        );
    }

    #[test]
    fn prefix_is_stripped() {
        let rs = responses::parse(
            "* LIST () \".\" INBOX\r\n\
             * LIST () \".\" INBOX.Sent\r\n\
             * LIST () \".\" INBOX.Sent.2021\r\n\
             * LIST (\\Noselect) \".\" INBOX.\r\n",
        );
        let nodes = build_hierarchy(&rs, Some("INBOX."));
        assert_eq!(nodes.len(), 3);
        assert_eq!(node(&nodes, "Sent").parent_server_id, None);
        assert_eq!(
            node(&nodes, "Sent.2021").parent_server_id.as_deref(),
            Some("Sent")
        );
    }

    #[test]
    fn flat_names_and_missing_inbox() {
        let rs = responses::parse("* LIST () NIL Notes\r\n");
        let nodes = build_hierarchy(&rs, None);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].delimiter, None);
        assert_eq!(nodes[1].display_name, "Notes");
        assert_eq!(nodes[1].delimiter, None);
    }

    #[test]
    fn rebuild_is_from_scratch() {
        let first = build_hierarchy(&responses::parse("* LIST () \"/\" a/b\r\n"), None);
        assert_eq!(first[1].parent_server_id, None);
        let second = build_hierarchy(
            &responses::parse("* LIST () \"/\" a\r\n* LIST () \"/\" a/b\r\n"),
            None,
        );
        assert_eq!(second[2].parent_server_id.as_deref(), Some("a"));
    }

    #[test]
    fn inbox_is_never_prefixed() {
        assert_eq!(encode_folder_name("Inbox", Some("INBOX.")), "INBOX");
        assert_eq!(encode_folder_name("Sent", Some("INBOX.")), "INBOX.Sent");
        assert_eq!(encode_folder_name("Entwürfe", None), "Entw&APw-rfe");
        assert_eq!(decode_folder_name("Other.Sent", Some("INBOX.")), "Other.Sent");
        assert_eq!(decode_folder_name("&broken", None), "&broken");
    }

    proptest! {
        #[test]
        fn ascii_names_round_trip(
            name in "[A-Za-z0-9/.]{1,24}",
            prefix in prop::option::of(prop::sample::select(vec!["", "INBOX.", "Mail/"])),
        ) {
            prop_assume!(!name.eq_ignore_ascii_case(INBOX));
            let encoded = encode_folder_name(&name, prefix);
            prop_assert_eq!(decode_folder_name(&encoded, prefix), name);
        }

        #[test]
        fn any_name_round_trips(name in "\\PC{1,16}") {
            prop_assume!(!name.eq_ignore_ascii_case(INBOX));
            let encoded = encode_folder_name(&name, None);
            prop_assert!(encoded.is_ascii());
            prop_assert_eq!(decode_folder_name(&encoded, None), name);
        }
    }
}
