//! Tolerant HTML tokenizer.
//!
//! Real checkout pages are not well-formed XML: void elements are left
//! open, end tags are missing or mismatched, and entities such as
//! `&nbsp;` are undeclared. This module drives `quick-xml` in its most
//! forgiving configuration and flattens the page into a document-ordered
//! list of [`Element`]s, which is all selector matching needs.
//!
//! `<script>` and `<style>` bodies are removed before tokenizing. A hard
//! tokenizer error ends the scan; everything read up to that point is kept.

use std::sync::OnceLock;

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use regex::Regex;
use tracing::warn;

/// Elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// One element of the page, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Lower-case tag name.
    pub tag: String,
    /// Attributes in source order; names lower-cased, values unescaped.
    pub attributes: Vec<(String, String)>,
    /// All descendant text, whitespace-collapsed.
    pub text: String,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Whitespace-separated tokens of the `class` attribute.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }
}

/// A parsed page.
#[derive(Debug, Clone, Default)]
pub struct Markup {
    pub elements: Vec<Element>,
    text_blocks: Vec<String>,
}

impl Markup {
    /// Human-visible text of the page with whitespace collapsed.
    pub fn visible_text(&self) -> String {
        collapse_whitespace(&self.text_blocks.join(" "))
    }
}

fn hidden_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
            .expect("hidden block regex is valid")
    })
}

/// Escape every `<` that cannot open a tag, comment or declaration, so
/// text such as "Orders < $100" stays text.
fn escape_stray_angles(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut chars = html.chars().peekable();
    while let Some(c) = chars.next() {
        let opens_markup = matches!(
            chars.peek(),
            Some(n) if n.is_ascii_alphabetic() || matches!(n, '/' | '!' | '?')
        );
        if c == '<' && !opens_markup {
            out.push_str("&lt;");
        } else {
            out.push(c);
        }
    }
    out
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tag_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.name().as_ref()).to_lowercase()
}

fn attributes(start: &BytesStart) -> Vec<(String, String)> {
    start
        .html_attributes()
        .filter_map(|a| a.ok())
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).to_lowercase();
            let value = match a.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
            };
            (key, value)
        })
        .collect()
}

fn text_of(t: &BytesText) -> String {
    match t.unescape() {
        Ok(s) => s.into_owned(),
        Err(_) => String::from_utf8_lossy(t).into_owned(),
    }
}

/// Parse `html` into elements and visible text.
pub fn parse(html: &str) -> Markup {
    let cleaned = escape_stray_angles(&hidden_block_regex().replace_all(html, " "));

    let mut reader = Reader::from_str(&cleaned);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut elements: Vec<Element> = Vec::new();
    // Indexes into `elements` of the currently open elements.
    let mut open: Vec<usize> = Vec::new();
    let mut text_blocks = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let tag = tag_name(&e);
                let is_void = VOID_ELEMENTS.contains(&tag.as_str());
                elements.push(Element {
                    tag,
                    attributes: attributes(&e),
                    text: String::new(),
                });
                if !is_void {
                    open.push(elements.len() - 1);
                }
            }
            Ok(Event::Empty(e)) => {
                elements.push(Element {
                    tag: tag_name(&e),
                    attributes: attributes(&e),
                    text: String::new(),
                });
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                // Close up to the nearest matching open element; stray ends are ignored.
                if let Some(pos) = open.iter().rposition(|&i| elements[i].tag == name) {
                    open.truncate(pos);
                }
            }
            Ok(Event::Text(t)) => {
                let text = text_of(&t);
                if text.trim().is_empty() {
                    continue;
                }
                for &i in &open {
                    elements[i].text.push_str(&text);
                }
                text_blocks.push(text);
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                for &i in &open {
                    elements[i].text.push_str(&text);
                }
                text_blocks.push(text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(
                    position = reader.buffer_position(),
                    error = %e,
                    "markup tokenizer stopped early"
                );
                break;
            }
        }
    }

    for el in &mut elements {
        el.text = collapse_whitespace(&el.text);
    }

    Markup {
        elements,
        text_blocks,
    }
}
