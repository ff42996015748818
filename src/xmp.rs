//! XMP packet extraction.
//!
//! The packet is located by a plain byte search for the first `<x:xmpmeta`
//! and the first `</x:xmpmeta>` after it. This is not namespace-aware and
//! can misfire if those literal bytes occur inside unrelated binary data
//! ahead of the real packet.
//!
//! The packet is parsed into an [`XmpNode`] tree that keeps qualified names,
//! then [`flatten`] strips namespace prefixes and produces report items.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt;

use crate::error::{MetaError, Result};
use crate::report::Item;

const XMP_OPEN: &[u8] = b"<x:xmpmeta";
const XMP_CLOSE: &[u8] = b"</x:xmpmeta>";

/// Key under which an element's text is kept when it also has attributes.
pub const TEXT_KEY: &str = "#text";

/// A parsed XMP value.
#[derive(Debug, Clone, PartialEq)]
pub enum XmpNode {
    Leaf(String),
    Sequence(Vec<XmpNode>),
    /// Insertion-ordered `(qualified name, value)` pairs.
    Mapping(Vec<(String, XmpNode)>),
}

impl fmt::Display for XmpNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        enum Step<'a> {
            Node(&'a XmpNode),
            Str(&'a str),
        }

        let mut stack = vec![Step::Node(self)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Str(s) => f.write_str(s)?,
                Step::Node(XmpNode::Leaf(s)) => f.write_str(s)?,
                Step::Node(XmpNode::Sequence(items)) => {
                    stack.push(Step::Str("]"));
                    for (i, item) in items.iter().enumerate().rev() {
                        stack.push(Step::Node(item));
                        if i > 0 {
                            stack.push(Step::Str(", "));
                        }
                    }
                    stack.push(Step::Str("["));
                }
                Step::Node(XmpNode::Mapping(entries)) => {
                    stack.push(Step::Str("}"));
                    for (i, (k, v)) in entries.iter().enumerate().rev() {
                        stack.push(Step::Node(v));
                        stack.push(Step::Str(": "));
                        stack.push(Step::Str(k.as_str()));
                        if i > 0 {
                            stack.push(Step::Str(", "));
                        }
                    }
                    stack.push(Step::Str("{"));
                }
            }
        }
        Ok(())
    }
}

/// Find the XMP packet in a raw file, including the closing marker.
pub fn locate_packet(bytes: &[u8]) -> Option<&[u8]> {
    let start = find(bytes, XMP_OPEN)?;
    let end = start + find(&bytes[start..], XMP_CLOSE)? + XMP_CLOSE.len();
    Some(&bytes[start..end])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parse an XMP packet into a mapping tree.
///
/// Attributes become entries keyed by their qualified name (namespace
/// declarations are dropped), text-only elements become leaves, repeated
/// sibling names collapse into a [`XmpNode::Sequence`].
pub fn parse_packet(packet: &[u8]) -> Result<XmpNode> {
    let mut reader = Reader::from_reader(packet);
    reader.config_mut().trim_text(true);

    let mut stack = vec![Frame::new(String::new())];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => stack.push(Frame::open(&e)?),
            Event::Empty(e) => {
                let frame = Frame::open(&e)?;
                close(&mut stack, frame)?;
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| MetaError::XmpParse("unbalanced end tag".into()))?;
                close(&mut stack, frame)?;
            }
            Event::Text(t) => {
                let text = t.unescape()?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if stack.len() != 1 {
        let open = stack.last().map(|f| f.name.clone()).unwrap_or_default();
        return Err(MetaError::XmpParse(format!("unexpected end of packet, <{open}> not closed")));
    }
    let root = stack.pop().map(|f| f.entries).unwrap_or_default();
    Ok(XmpNode::Mapping(root))
}

/// An element under construction.
struct Frame {
    name: String,
    entries: Vec<(String, XmpNode)>,
    text: String,
}

impl Frame {
    fn new(name: String) -> Self {
        Self {
            name,
            entries: Vec::new(),
            text: String::new(),
        }
    }

    fn open(e: &BytesStart<'_>) -> Result<Self> {
        let mut frame = Self::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
        for attr in e.attributes() {
            let attr = attr.map_err(|err| MetaError::XmpParse(err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if key == "xmlns" || key.starts_with("xmlns:") {
                continue;
            }
            let value = attr.unescape_value()?.into_owned();
            insert(&mut frame.entries, key, XmpNode::Leaf(value));
        }
        Ok(frame)
    }

    fn into_node(self) -> XmpNode {
        if self.entries.is_empty() {
            return XmpNode::Leaf(self.text);
        }
        let mut entries = self.entries;
        if !self.text.is_empty() {
            entries.push((TEXT_KEY.to_string(), XmpNode::Leaf(self.text)));
        }
        XmpNode::Mapping(entries)
    }
}

fn close(stack: &mut [Frame], frame: Frame) -> Result<()> {
    let parent = stack
        .last_mut()
        .ok_or_else(|| MetaError::XmpParse("element outside document".into()))?;
    let name = frame.name.clone();
    insert(&mut parent.entries, name, frame.into_node());
    Ok(())
}

/// Add a child, turning a repeated name into a sequence.
fn insert(entries: &mut Vec<(String, XmpNode)>, key: String, node: XmpNode) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some((_, XmpNode::Sequence(items))) => items.push(node),
        Some((_, existing)) => {
            let first = std::mem::replace(existing, XmpNode::Sequence(Vec::new()));
            *existing = XmpNode::Sequence(vec![first, node]);
        }
        None => entries.push((key, node)),
    }
}

/// Strip a `{uri}` or `prefix:` qualifier, keeping the local name.
pub fn local_name(key: &str) -> &str {
    let key = key.rsplit_once('}').map_or(key, |(_, local)| local);
    key.rsplit_once(':').map_or(key, |(_, local)| local)
}

/// Flatten a mapping into report items, stripping prefixes at every depth.
///
/// Mapping children inside a sequence are spliced into the sequence's group.
/// Walks the tree with an explicit stack, so depth is not limited by the
/// thread's stack size.
pub fn flatten(entries: &[(String, XmpNode)]) -> Vec<Item> {
    let mut stack = vec![Pending::new("", mapping_work(entries))];

    while let Some(frame) = stack.last_mut() {
        let Some(work) = frame.todo.pop() else {
            let Some(done) = stack.pop() else { break };
            match stack.last_mut() {
                Some(parent) => parent.items.push(Item::group(done.name, done.items)),
                None => return done.items,
            }
            continue;
        };

        match work {
            Work::Value(node) => frame.items.push(Item::value(node.to_string())),
            Work::Entry(key, XmpNode::Leaf(v)) => {
                frame.items.push(Item::field(local_name(key), v.as_str()))
            }
            Work::Entry(key, XmpNode::Mapping(children)) => {
                stack.push(Pending::new(local_name(key), mapping_work(children)))
            }
            Work::Entry(key, XmpNode::Sequence(items)) => {
                stack.push(Pending::new(local_name(key), sequence_work(items)))
            }
        }
    }
    Vec::new()
}

enum Work<'a> {
    Entry(&'a str, &'a XmpNode),
    Value(&'a XmpNode),
}

/// A group being built by [`flatten`]. `todo` is popped from the back.
struct Pending<'a> {
    name: &'a str,
    items: Vec<Item>,
    todo: Vec<Work<'a>>,
}

impl<'a> Pending<'a> {
    fn new(name: &'a str, todo: Vec<Work<'a>>) -> Self {
        Self {
            name,
            items: Vec::new(),
            todo,
        }
    }
}

fn mapping_work(entries: &[(String, XmpNode)]) -> Vec<Work<'_>> {
    entries
        .iter()
        .rev()
        .map(|(key, value)| Work::Entry(key.as_str(), value))
        .collect()
}

fn sequence_work(items: &[XmpNode]) -> Vec<Work<'_>> {
    let mut todo = Vec::with_capacity(items.len());
    for item in items.iter().rev() {
        match item {
            XmpNode::Mapping(children) => todo.extend(mapping_work(children)),
            other => todo.push(Work::Value(other)),
        }
    }
    todo
}

/// Locate, parse and flatten the XMP packet of a raw file.
///
/// `Ok(None)` means the file has no packet.
pub fn extract(bytes: &[u8]) -> Result<Option<Vec<Item>>> {
    let Some(packet) = locate_packet(bytes) else {
        return Ok(None);
    };
    log::debug!("XMP packet found ({} bytes)", packet.len());

    match parse_packet(packet)? {
        XmpNode::Mapping(entries) => Ok(Some(flatten(&entries))),
        other => Ok(Some(vec![Item::value(other.to_string())])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKET: &str = r#"<x:xmpmeta xmlns:x="adobe:ns:meta/" x:xmptk="XMP Core 6.0.0">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about="" xmlns:dc="http://purl.org/dc/elements/1.1/"
      xmlns:xmp="http://ns.adobe.com/xap/1.0/" xmp:CreatorTool="Lightroom &amp; Co">
   <dc:title><rdf:Alt><rdf:li xml:lang="x-default">Sunset</rdf:li></rdf:Alt></dc:title>
   <dc:subject><rdf:Bag><rdf:li>beach</rdf:li><rdf:li>ocean</rdf:li></rdf:Bag></dc:subject>
   <dc:rights/>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>"#;

    fn leaf(s: &str) -> XmpNode {
        XmpNode::Leaf(s.to_string())
    }

    fn map(entries: Vec<(&str, XmpNode)>) -> XmpNode {
        XmpNode::Mapping(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    fn group<'a>(items: &'a [Item], name: &str) -> &'a [Item] {
        items
            .iter()
            .find_map(|i| match i {
                Item::Group { name: n, items } if n == name => Some(items.as_slice()),
                _ => None,
            })
            .unwrap_or_else(|| panic!("missing group {name}"))
    }

    #[test]
    fn locate_first_packet_with_closing_marker() {
        let mut file = b"\xFF\xD8junk".to_vec();
        file.extend_from_slice(PACKET.as_bytes());
        file.extend_from_slice(b"<?xpacket end='w'?>\xFF\xD9");
        let packet = locate_packet(&file).unwrap();
        assert!(packet.starts_with(b"<x:xmpmeta"));
        assert!(packet.ends_with(b"</x:xmpmeta>"));
    }

    #[test]
    fn locate_requires_both_markers() {
        assert_eq!(locate_packet(b"no packet here"), None);
        assert_eq!(locate_packet(b"<x:xmpmeta xmlns:x='adobe:ns:meta/'>"), None);
        assert_eq!(locate_packet(b"</x:xmpmeta><x:xmpmeta>"), None);
    }

    #[test]
    fn flatten_strips_prefixes_at_every_depth() {
        let tree = vec![(
            "rdf:Description".to_string(),
            map(vec![("dc:title", leaf("Sunset"))]),
        )];
        let items = flatten(&tree);
        assert_eq!(
            items,
            vec![Item::group("Description", vec![Item::field("title", "Sunset")])]
        );
    }

    #[test]
    fn local_name_forms() {
        assert_eq!(local_name("{http://purl.org/dc/elements/1.1/}title"), "title");
        assert_eq!(local_name("dc:title"), "title");
        assert_eq!(local_name("title"), "title");
        assert_eq!(local_name(TEXT_KEY), TEXT_KEY);
    }

    #[test]
    fn sequences_inline_mappings_and_list_leaves() {
        let tree = vec![(
            "dc:subject".to_string(),
            XmpNode::Sequence(vec![
                leaf("beach"),
                map(vec![("xml:lang", leaf("en")), (TEXT_KEY, leaf("ocean"))]),
            ]),
        )];
        let items = flatten(&tree);
        assert_eq!(
            items,
            vec![Item::group(
                "subject",
                vec![
                    Item::value("beach"),
                    Item::field("lang", "en"),
                    Item::field(TEXT_KEY, "ocean"),
                ]
            )]
        );
    }

    #[test]
    fn deep_nesting_has_no_depth_limit() {
        let mut node = leaf("bottom");
        for i in 0..5000 {
            node = map(vec![(if i % 2 == 0 { "a:x" } else { "b:y" }, node)]);
        }
        let XmpNode::Mapping(entries) = node else {
            unreachable!()
        };
        let items = flatten(&entries);
        let mut level = items.as_slice();
        let mut depth = 0;
        while let [Item::Group { items: inner, .. }] = level {
            level = inner;
            depth += 1;
        }
        assert_eq!(depth, 4999);
        assert_eq!(level, [Item::field("x", "bottom")]);
    }

    #[test]
    fn deep_sequences_display_without_recursion() {
        let mut node = leaf("x");
        for _ in 0..5000 {
            node = XmpNode::Sequence(vec![node]);
        }
        let text = node.to_string();
        assert_eq!(text.len(), 5000 * 2 + 1);
        assert!(text.starts_with("[[[") && text.ends_with("]]]"));
        assert_eq!(text.trim_matches(|c| c == '[' || c == ']'), "x");
    }

    #[test]
    fn parse_real_packet() {
        let root = parse_packet(PACKET.as_bytes()).unwrap();
        let XmpNode::Mapping(entries) = root else {
            panic!("root must be a mapping")
        };
        let items = flatten(&entries);

        let meta = group(&items, "xmpmeta");
        assert_eq!(meta[0], Item::field("xmptk", "XMP Core 6.0.0"));
        let desc = group(group(meta, "RDF"), "Description");
        assert_eq!(desc[0], Item::field("about", ""));
        assert_eq!(desc[1], Item::field("CreatorTool", "Lightroom & Co"));

        let title = group(group(desc, "title"), "Alt");
        assert_eq!(
            group(title, "li"),
            &[Item::field("lang", "x-default"), Item::field(TEXT_KEY, "Sunset")]
        );

        let bag = group(group(desc, "subject"), "Bag");
        assert_eq!(group(bag, "li"), &[Item::value("beach"), Item::value("ocean")]);

        assert!(desc.contains(&Item::field("rights", "")));
    }

    #[test]
    fn malformed_packet_is_parse_error() {
        let bad = b"<x:xmpmeta><rdf:RDF></x:xmpmeta>";
        assert!(matches!(parse_packet(bad), Err(MetaError::XmpParse(_))));
    }

    #[test]
    fn extract_reports_absence() {
        assert_eq!(extract(b"\x89PNG....").unwrap(), None);
        let items = extract(PACKET.as_bytes()).unwrap().unwrap();
        assert!(matches!(&items[0], Item::Group { name, .. } if name == "xmpmeta"));
    }
}
