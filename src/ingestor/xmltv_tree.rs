//! Generic XML tree for tolerant XMLTV access
//!
//! The guide format varies between providers (attribute vs element fields,
//! namespace prefixes, one or many `programme` entries), so the document is
//! first read into a small untyped tree and fields are looked up leniently
//! afterwards.

use std::borrow::Cow;
use std::collections::HashMap;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Deepest element nesting accepted; guides need four levels
pub const MAX_DEPTH: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct XmlTreeError {
    pub message: String,
}

impl XmlTreeError {
    fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One element with prefix-free names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: HashMap<String, String>,
    pub children: Vec<XmlNode>,
    /// Direct character data (text, CDATA, resolved entities), untrimmed
    pub text: String,
}

impl XmlNode {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given name; a lone element yields a
    /// one-element sequence
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Own text followed by descendants' text, trimmed fragments joined by
    /// single spaces
    pub fn text_content(&self) -> String {
        let mut fragments = Vec::new();
        self.collect_text(&mut fragments);
        fragments.join(" ")
    }

    fn collect_text<'a>(&'a self, out: &mut Vec<&'a str>) {
        let own = self.text.trim();
        if !own.is_empty() {
            out.push(own);
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }
}

fn utf8<'a>(bytes: &'a [u8], what: &str) -> Result<&'a str, XmlTreeError> {
    std::str::from_utf8(bytes).map_err(|e| XmlTreeError::new(format!("Invalid UTF-8 in {what}: {e}")))
}

fn unescaped(raw: &str) -> Cow<'_, str> {
    unescape(raw).unwrap_or(Cow::Borrowed(raw))
}

fn element(start: &BytesStart) -> Result<XmlNode, XmlTreeError> {
    let name = utf8(start.local_name().as_ref(), "element name")?.to_string();

    let mut attributes = HashMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlTreeError::new(format!("Malformed attribute in <{name}>: {e}")))?;
        let key = utf8(attr.key.local_name().as_ref(), "attribute name")?.to_string();
        let value = utf8(&attr.value, "attribute value")?;
        attributes.insert(key, unescaped(value).into_owned());
    }

    Ok(XmlNode {
        name,
        attributes,
        ..XmlNode::default()
    })
}

fn append_text(stack: &mut [XmlNode], text: &str) {
    if let Some(top) = stack.last_mut() {
        top.text.push_str(text);
    }
}

/// Parse a whole document and return its root element
///
/// Content after the root element is ignored.
pub fn parse_document(content: &str) -> Result<XmlNode, XmlTreeError> {
    let mut reader = Reader::from_str(content);
    let mut stack: Vec<XmlNode> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(XmlTreeError::new(format!(
                        "Element nesting exceeds {MAX_DEPTH} levels at position {}",
                        reader.buffer_position()
                    )));
                }
                stack.push(element(e)?);
            }

            Ok(Event::Empty(ref e)) => {
                let node = element(e)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Ok(node),
                }
            }

            Ok(Event::End(_)) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| XmlTreeError::new("Unexpected closing tag"))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Ok(node),
                }
            }

            Ok(Event::Text(e)) => {
                let text = utf8(&e, "text")?;
                append_text(&mut stack, &unescaped(text));
            }

            Ok(Event::CData(e)) => {
                let text = utf8(&e, "CDATA")?;
                append_text(&mut stack, text);
            }

            Ok(Event::GeneralRef(e)) => {
                let name = utf8(&e, "entity reference")?;
                let reference = format!("&{name};");
                append_text(&mut stack, &unescaped(&reference));
            }

            Ok(Event::Eof) => {
                return Err(match stack.last() {
                    Some(open) => XmlTreeError::new(format!("Unclosed element <{}>", open.name)),
                    None => XmlTreeError::new("Document has no root element"),
                });
            }

            Err(e) => {
                return Err(XmlTreeError::new(format!(
                    "XML parsing error at position {}: {e}",
                    reader.error_position()
                )));
            }

            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_tree_with_prefixes_stripped() {
        let doc = r#"<?xml version="1.0"?>
<x:tv xmlns:x="urn:tv" x:source="demo">
  <x:programme start="20240101120000" channel="a"><x:title lang="en">News</x:title></x:programme>
  <x:programme start="20240101130000" channel="a"/>
</x:tv>"#;
        let root = parse_document(doc).unwrap();

        assert_eq!(root.name, "tv");
        assert_eq!(root.attribute("source"), Some("demo"));
        assert_eq!(root.children_named("programme").count(), 2);

        let first = root.child("programme").unwrap();
        assert_eq!(first.attribute("channel"), Some("a"));
        assert_eq!(first.child("title").unwrap().text_content(), "News");
    }

    #[test]
    fn test_entities_and_cdata_become_text() {
        let doc = "<tv><title>Tom &amp; Jerry &#8211; <![CDATA[<Live>]]></title></tv>";
        let root = parse_document(doc).unwrap();

        assert_eq!(root.child("title").unwrap().text_content(), "Tom & Jerry \u{2013} <Live>");
    }

    #[test]
    fn test_attribute_values_unescaped() {
        let root = parse_document(r#"<tv><programme channel="a&amp;b"/></tv>"#).unwrap();
        assert_eq!(root.child("programme").unwrap().attribute("channel"), Some("a&b"));
    }

    #[test]
    fn test_nested_text_joined() {
        let root = parse_document("<tv><desc>  Part one <b> bold </b>\n</desc></tv>").unwrap();
        assert_eq!(root.child("desc").unwrap().text_content(), "Part one bold");
    }

    #[test]
    fn test_structural_errors() {
        assert!(parse_document("<tv><programme></tv>").is_err());
        assert!(parse_document("<tv><programme>").is_err());
        assert!(parse_document("<?xml version=\"1.0\"?>").is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| format!("{}{}", "<a>".repeat(depth), "</a>".repeat(depth));

        let root = parse_document(&nested(MAX_DEPTH)).unwrap();
        assert_eq!(root.name, "a");

        let err = parse_document(&nested(MAX_DEPTH + 1)).unwrap_err();
        assert!(err.message.contains("nesting exceeds"));

        let hostile = format!("<tv>{}</tv>", nested(200_000));
        assert!(parse_document(&hostile).is_err());
    }
}
