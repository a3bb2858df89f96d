// crates/adt-bridge-client/src/xml.rs
// ============================================================================
// Module: XML Codecs
// Description: Tolerant namespace-stripping decoder and surgical editor.
// Purpose: Decode mixed-namespace ADT payloads; edit message-class XML
//          without re-serializing the document.
// Dependencies: quick-xml, thiserror
// ============================================================================

//! ## Overview
//! ADT responses mix namespace prefixes freely (`adtcore:`, `mc:`,
//! `srvb:`, `cai:`, ...). The tolerant decoder builds a tree keyed by
//! local names so callers never care which prefix a server emitted, and it
//! ignores children it does not recognize.
//!
//! The message-class editor is deliberately not a tree transform. The
//! server rejects documents it did not emit itself, so edits are anchored
//! text operations over the original bytes: only the touched attribute
//! value or element changes and everything else is preserved verbatim.
//! With empty update and delete maps the output equals the input
//! byte-for-byte.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the XML codecs.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The document is not valid UTF-8.
    #[error("xml document is not valid utf-8")]
    NotUtf8,
    /// The document failed to parse.
    #[error("xml parse failed: {0}")]
    Parse(String),
    /// A required element is missing from the document.
    #[error("xml document has no {0} element")]
    MissingElement(&'static str),
}

// ============================================================================
// SECTION: Tolerant Tree
// ============================================================================

/// One element of a tolerantly decoded document.
///
/// # Invariants
/// - `name` and attribute keys carry local names only; namespace prefixes
///   are stripped during parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Local element name.
    pub name: String,
    /// Attributes keyed by local name.
    pub attributes: BTreeMap<String, String>,
    /// Concatenated text content of this element.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Returns an attribute value by local name.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Returns an attribute parsed as an integer, when present and valid.
    #[must_use]
    pub fn attr_u32(&self, name: &str) -> Option<u32> {
        self.attr(name).and_then(|value| value.parse().ok())
    }

    /// Returns the first descendant with the given local name (pre-order).
    #[must_use]
    pub fn find_first(&self, name: &str) -> Option<&XmlElement> {
        for child in &self.children {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find_first(name) {
                return Some(found);
            }
        }
        None
    }

    /// Collects all descendants with the given local name (pre-order).
    #[must_use]
    pub fn find_all(&self, name: &str) -> Vec<&XmlElement> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, into: &mut Vec<&'a XmlElement>) {
        for child in &self.children {
            if child.name == name {
                into.push(child);
            }
            child.collect_named(name, into);
        }
    }
}

/// Strips the namespace prefix from a qualified name.
fn local_name(qualified: &[u8]) -> String {
    let name = String::from_utf8_lossy(qualified);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

/// Converts an element start tag into a tree node.
fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, CodecError> {
    let mut element = XmlElement {
        name: local_name(start.name().as_ref()),
        ..XmlElement::default()
    };
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| CodecError::Parse(err.to_string()))?;
        let key = local_name(attribute.key.as_ref());
        let value = attribute
            .unescape_value()
            .map_err(|err| CodecError::Parse(err.to_string()))?
            .into_owned();
        element.attributes.insert(key, value);
    }
    Ok(element)
}

/// Parses a document into a tolerant element tree.
///
/// Unknown elements become ordinary tree nodes, so decoders can pick out
/// what they understand and ignore the rest.
///
/// # Errors
///
/// Returns [`CodecError`] for malformed documents.
pub fn parse_tolerant(xml: &[u8]) -> Result<XmlElement, CodecError> {
    let text = std::str::from_utf8(xml).map_err(|_| CodecError::NotUtf8)?;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    loop {
        match reader.read_event().map_err(|err| CodecError::Parse(err.to_string()))? {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let value = text
                        .unescape()
                        .map_err(|err| CodecError::Parse(err.to_string()))?;
                    current.text.push_str(&value);
                }
            }
            Event::End(_) => {
                let Some(finished) = stack.pop() else {
                    return Err(CodecError::Parse("unbalanced end tag".to_string()));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(finished),
                    None => root = Some(finished),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    root.ok_or(CodecError::MissingElement("root"))
}

// ============================================================================
// SECTION: Attribute Escaping
// ============================================================================

/// Escapes a value for use inside a double-quoted XML attribute.
#[must_use]
pub fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}

// ============================================================================
// SECTION: Message Class Editor
// ============================================================================

/// Result of a surgical message-class edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageClassEdit {
    /// Edited document bytes; untouched regions are preserved verbatim.
    pub document: Vec<u8>,
    /// Message numbers whose text was updated or inserted, with the text.
    pub updated: BTreeMap<String, String>,
    /// Message numbers whose records were deleted.
    pub deleted: Vec<String>,
}

/// Applies updates, inserts, and deletions to a message-class document.
///
/// For each entry in `updates`: a non-empty text replaces the `msgtext`
/// value of the matching record in place, or appends a new self-closing
/// record before the closing container tag when no record exists; an empty
/// text deletes the matching record entirely, including nested children.
/// Inserted records copy the namespace prefix observed on sibling records
/// and attach a `lockhandle` attribute when `lock_handles` has one for the
/// message number.
///
/// # Errors
///
/// Returns [`CodecError`] when the document is not UTF-8 or has no
/// message-class container element.
pub fn modify_message_class_xml(
    input: &[u8],
    updates: &BTreeMap<String, String>,
    lock_handles: &BTreeMap<String, String>,
) -> Result<MessageClassEdit, CodecError> {
    let text = std::str::from_utf8(input).map_err(|_| CodecError::NotUtf8)?;
    let mut document = text.to_string();
    let mut updated = BTreeMap::new();
    let mut deleted = Vec::new();

    for (msgno, new_text) in updates {
        match find_message_element(&document, msgno) {
            Some(span) if new_text.is_empty() => {
                let mut end = span.end;
                if document[end..].starts_with('\n') {
                    end += 1;
                }
                document.replace_range(span.start..end, "");
                deleted.push(msgno.clone());
            }
            Some(span) => {
                if replace_msgtext_value(&mut document, &span, new_text) {
                    updated.insert(msgno.clone(), new_text.clone());
                }
            }
            None if new_text.is_empty() => {}
            None => {
                insert_message_element(
                    &mut document,
                    msgno,
                    new_text,
                    lock_handles.get(msgno).map(String::as_str),
                )?;
                updated.insert(msgno.clone(), new_text.clone());
            }
        }
    }

    Ok(MessageClassEdit {
        document: document.into_bytes(),
        updated,
        deleted,
    })
}

/// Byte span of one message record, including its closing tag.
struct MessageSpan {
    /// Offset of the record's `<` byte.
    start: usize,
    /// Offset one past the record's final `>` byte.
    end: usize,
    /// Offset one past the start tag's `>` byte.
    start_tag_end: usize,
    /// Exact tag name as written in the document (prefix included).
    tag: String,
}

/// Locates the message record carrying the given `msgno` attribute value.
fn find_message_element(document: &str, msgno: &str) -> Option<MessageSpan> {
    let needle = format!("msgno=\"{msgno}\"");
    let mut search_from = 0;
    while let Some(relative) = document[search_from..].find(&needle) {
        let attr_at = search_from + relative;
        // Walk back to the element start and confirm it is a message record.
        let start = document[..attr_at].rfind('<')?;
        let tag: String = document[start + 1..]
            .chars()
            .take_while(|ch| !ch.is_whitespace() && *ch != '>' && *ch != '/')
            .collect();
        if tag == "messages" || tag.ends_with(":messages") {
            let tag_close = document[attr_at..].find('>')? + attr_at;
            let self_closing = document[..tag_close].ends_with('/');
            let end = if self_closing {
                tag_close + 1
            } else {
                let close = format!("</{tag}>");
                let close_at = document[tag_close..].find(&close)? + tag_close;
                close_at + close.len()
            };
            return Some(MessageSpan {
                start,
                end,
                start_tag_end: tag_close + 1,
                tag,
            });
        }
        search_from = attr_at + needle.len();
    }
    None
}

/// Replaces the `msgtext` attribute value inside a record's start tag.
fn replace_msgtext_value(document: &mut String, span: &MessageSpan, new_text: &str) -> bool {
    let start_tag = &document[span.start..span.start_tag_end];
    let Some(marker) = start_tag.find("msgtext=\"") else {
        return false;
    };
    let value_start = span.start + marker + "msgtext=\"".len();
    let Some(value_len) = document[value_start..].find('"') else {
        return false;
    };
    document.replace_range(value_start..value_start + value_len, &escape_attribute(new_text));
    true
}

/// Appends a new self-closing message record before the container close tag.
fn insert_message_element(
    document: &mut String,
    msgno: &str,
    text: &str,
    lock_handle: Option<&str>,
) -> Result<(), CodecError> {
    let prefix = observed_message_prefix(document)?;
    let mut element = format!(
        "<{prefix}messages {prefix}msgno=\"{msgno}\" {prefix}msgtext=\"{}\"",
        escape_attribute(text)
    );
    if let Some(handle) = lock_handle {
        element.push_str(&format!(" {prefix}lockhandle=\"{}\"", escape_attribute(handle)));
    }
    element.push_str("/>");

    let close_at = find_container_close(document)
        .ok_or(CodecError::MissingElement("messageClass"))?;
    document.insert_str(close_at, &format!("{element}\n"));
    Ok(())
}

/// Returns the namespace prefix observed on sibling message records, or the
/// container's own prefix when the document has no records yet.
fn observed_message_prefix(document: &str) -> Result<String, CodecError> {
    let mut search_from = 0;
    while let Some(relative) = document[search_from..].find('<') {
        let at = search_from + relative;
        let tag: String = document[at + 1..]
            .chars()
            .take_while(|ch| !ch.is_whitespace() && *ch != '>' && *ch != '/')
            .collect();
        if tag == "messages" {
            return Ok(String::new());
        }
        if let Some(prefix) = tag.strip_suffix(":messages") {
            return Ok(format!("{prefix}:"));
        }
        search_from = at + 1;
    }
    // No records yet; mirror the container's prefix.
    let mut search_from = 0;
    while let Some(relative) = document[search_from..].find('<') {
        let at = search_from + relative;
        let tag: String = document[at + 1..]
            .chars()
            .take_while(|ch| !ch.is_whitespace() && *ch != '>' && *ch != '/')
            .collect();
        if tag == "messageClass" {
            return Ok(String::new());
        }
        if let Some(prefix) = tag.strip_suffix(":messageClass") {
            return Ok(format!("{prefix}:"));
        }
        search_from = at + 1;
    }
    Err(CodecError::MissingElement("messageClass"))
}

/// Finds the offset of the container's closing tag.
fn find_container_close(document: &str) -> Option<usize> {
    let mut search_from = 0;
    while let Some(relative) = document[search_from..].find("</") {
        let at = search_from + relative;
        let tag: String = document[at + 2..]
            .chars()
            .take_while(|ch| *ch != '>')
            .collect();
        if tag == "messageClass" || tag.ends_with(":messageClass") {
            return Some(at);
        }
        search_from = at + 2;
    }
    None
}

// ============================================================================
// SECTION: Tests
// ============================================================================
