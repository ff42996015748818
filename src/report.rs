//! The assembled metadata report and its renderings.
//!
//! A [`Report`] always carries the four sections in the same order:
//! EXIF, IPTC, XMP, File Information. Sections without data hold a single
//! [`Item::Note`] placeholder instead of disappearing.

use serde::Serialize;
use std::fmt::Write;

/// The four report sections, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SectionKind {
    Exif,
    Iptc,
    Xmp,
    FileInfo,
}

impl SectionKind {
    /// Fixed section order of every report.
    pub const ORDER: [SectionKind; 4] = [
        SectionKind::Exif,
        SectionKind::Iptc,
        SectionKind::Xmp,
        SectionKind::FileInfo,
    ];

    /// Section heading as shown to the user.
    pub fn title(&self) -> &'static str {
        match self {
            SectionKind::Exif => "EXIF Data",
            SectionKind::Iptc => "IPTC Data",
            SectionKind::Xmp => "XMP Data",
            SectionKind::FileInfo => "File Information",
        }
    }
}

/// One line (or nested block) of a section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Item {
    /// A named value, e.g. `Make: Canon`.
    Field { name: String, value: String },
    /// An unnamed element of a list.
    Value { value: String },
    /// A named block of nested items (GPS sub-directory, XMP structs).
    Group { name: String, items: Vec<Item> },
    /// A named hyperlink.
    Link { name: String, label: String, url: String },
    /// Placeholder or downgraded error message.
    Note { text: String },
}

impl Item {
    pub fn field(name: impl Into<String>, value: impl Into<String>) -> Self {
        Item::Field {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn value(value: impl Into<String>) -> Self {
        Item::Value { value: value.into() }
    }

    pub fn group(name: impl Into<String>, items: Vec<Item>) -> Self {
        Item::Group {
            name: name.into(),
            items,
        }
    }

    pub fn link(name: impl Into<String>, label: impl Into<String>, url: impl Into<String>) -> Self {
        Item::Link {
            name: name.into(),
            label: label.into(),
            url: url.into(),
        }
    }

    pub fn note(text: impl Into<String>) -> Self {
        Item::Note { text: text.into() }
    }
}

/// One titled block of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub kind: SectionKind,
    pub title: &'static str,
    pub items: Vec<Item>,
}

impl Section {
    pub fn new(kind: SectionKind, items: Vec<Item>) -> Self {
        Self {
            kind,
            title: kind.title(),
            items,
        }
    }

    /// A section whose only content is a placeholder note.
    pub fn placeholder(kind: SectionKind, text: impl Into<String>) -> Self {
        Self::new(kind, vec![Item::note(text)])
    }

    /// Find a top-level field value by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.items.iter().find_map(|item| match item {
            Item::Field { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    /// Whether the section holds nothing but notes.
    pub fn is_placeholder(&self) -> bool {
        self.items.iter().all(|i| matches!(i, Item::Note { .. }))
    }
}

/// The complete, ordered metadata report for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub sections: Vec<Section>,
}

impl Report {
    /// Look up a section by kind.
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Plain-text rendering, two spaces of indent per nesting level.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "{}", section.title);
            let _ = writeln!(out, "{}", "-".repeat(section.title.len()));
            write_text_items(&mut out, &section.items, 0);
        }
        out
    }

    /// HTML rendering: one `<h3>` per section and nested `<ul>` lists.
    pub fn to_html(&self) -> String {
        let mut out = String::from("<html><body>");
        for section in &self.sections {
            let _ = write!(out, "<h3>{}</h3>", escape_html(section.title));
            if section.is_placeholder() {
                for item in &section.items {
                    if let Item::Note { text } = item {
                        let _ = write!(out, "<p>{}</p>", escape_html(text));
                    }
                }
            } else {
                write_html_list(&mut out, &section.items);
            }
        }
        out.push_str("</body></html>");
        out
    }
}

/// Plain-text message replacing the whole report after a fatal error.
pub fn render_error_text(err: &crate::error::MetaError) -> String {
    format!("Error extracting metadata: {err}\n")
}

/// HTML message replacing the whole report after a fatal error.
pub fn render_error_html(err: &crate::error::MetaError) -> String {
    format!(
        "<html><body><p>Error extracting metadata: {}</p></body></html>",
        escape_html(&err.to_string())
    )
}

fn write_text_items(out: &mut String, items: &[Item], depth: usize) {
    let indent = "  ".repeat(depth);
    for item in items {
        match item {
            Item::Field { name, value } => {
                let _ = writeln!(out, "{indent}- {name}: {value}");
            }
            Item::Value { value } => {
                let _ = writeln!(out, "{indent}- {value}");
            }
            Item::Group { name, items } => {
                let _ = writeln!(out, "{indent}- {name}:");
                write_text_items(out, items, depth + 1);
            }
            Item::Link { name, url, .. } => {
                let _ = writeln!(out, "{indent}- {name}: {url}");
            }
            Item::Note { text } => {
                let _ = writeln!(out, "{indent}({text})");
            }
        }
    }
}

fn write_html_list(out: &mut String, items: &[Item]) {
    out.push_str("<ul>");
    for item in items {
        match item {
            Item::Field { name, value } => {
                let _ = write!(
                    out,
                    "<li><b>{}:</b> {}</li>",
                    escape_html(name),
                    escape_html(value)
                );
            }
            Item::Value { value } => {
                let _ = write!(out, "<li>{}</li>", escape_html(value));
            }
            Item::Group { name, items } => {
                let _ = write!(out, "<li><b>{}:</b>", escape_html(name));
                write_html_list(out, items);
                out.push_str("</li>");
            }
            Item::Link { name, label, url } => {
                let _ = write!(
                    out,
                    "<li><b>{}:</b> <a href='{}'>{}</a></li>",
                    escape_html(name),
                    escape_html(url),
                    escape_html(label)
                );
            }
            Item::Note { text } => {
                let _ = write!(out, "<li>{}</li>", escape_html(text));
            }
        }
    }
    out.push_str("</ul>");
}

/// Escape the characters that matter inside HTML text and single-quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Report {
        Report {
            sections: vec![
                Section::new(
                    SectionKind::Exif,
                    vec![
                        Item::field("Make", "Canon"),
                        Item::group(
                            "GPSInfo",
                            vec![
                                Item::field("GPSLatitudeRef", "N"),
                                Item::link("Google Maps Link", "View on Google Maps", "https://x/?a=1&b=2"),
                            ],
                        ),
                    ],
                ),
                Section::placeholder(SectionKind::Iptc, "No IPTC data found"),
                Section::placeholder(SectionKind::Xmp, "No XMP data found"),
                Section::new(SectionKind::FileInfo, vec![Item::field("File Name", "a<b>.jpg")]),
            ],
        }
    }

    #[test]
    fn titles_are_fixed() {
        let titles: Vec<_> = SectionKind::ORDER.iter().map(|k| k.title()).collect();
        assert_eq!(titles, ["EXIF Data", "IPTC Data", "XMP Data", "File Information"]);
    }

    #[test]
    fn text_rendering_nests_groups() {
        let text = sample().to_text();
        assert!(text.starts_with("EXIF Data\n---------\n- Make: Canon\n- GPSInfo:\n  - GPSLatitudeRef: N\n"));
        assert!(text.contains("(No IPTC data found)"));
        let exif = text.find("EXIF Data").unwrap();
        let iptc = text.find("IPTC Data").unwrap();
        let xmp = text.find("XMP Data").unwrap();
        let file = text.find("File Information").unwrap();
        assert!(exif < iptc && iptc < xmp && xmp < file);
    }

    #[test]
    fn html_rendering_escapes_and_links() {
        let html = sample().to_html();
        assert!(html.contains("<h3>EXIF Data</h3><ul><li><b>Make:</b> Canon</li>"));
        assert!(html.contains("<li><b>GPSInfo:</b><ul><li><b>GPSLatitudeRef:</b> N</li>"));
        assert!(html.contains("<a href='https://x/?a=1&amp;b=2'>View on Google Maps</a>"));
        assert!(html.contains("<h3>IPTC Data</h3><p>No IPTC data found</p>"));
        assert!(html.contains("a&lt;b&gt;.jpg"));
    }

    #[test]
    fn json_rendering_tags_items() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["sections"][0]["title"], "EXIF Data");
        assert_eq!(json["sections"][0]["items"][0]["type"], "field");
        assert_eq!(json["sections"][1]["items"][0]["text"], "No IPTC data found");
    }

    #[test]
    fn section_lookup_helpers() {
        let report = sample();
        let exif = report.section(SectionKind::Exif).unwrap();
        assert_eq!(exif.field("Make"), Some("Canon"));
        assert!(!exif.is_placeholder());
        assert!(report.section(SectionKind::Xmp).unwrap().is_placeholder());
    }

    #[test]
    fn fatal_error_rendering() {
        let err = crate::error::MetaError::Decode("truncated <file>".into());
        assert_eq!(
            render_error_html(&err),
            "<html><body><p>Error extracting metadata: Cannot decode image: truncated &lt;file&gt;</p></body></html>"
        );
        assert!(render_error_text(&err).starts_with("Error extracting metadata"));
    }
}
