//! XML codec for tree documents
//!
//! Parsing keeps everything outside the root element verbatim, along with text,
//! comments and CDATA inside it, attribute order and raw attribute values.
//! Serializing a freshly parsed document reproduces untouched regions byte for byte,
//! apart from attribute quoting and whitespace inside tags.

use crate::error::DocumentError;
use crate::tree::document::{unescape_lossy, Content, Document, Element, NodeId};
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

/// Parse a UTF-8 XML document
pub fn parse_document(input: &str) -> Result<Document, DocumentError> {
    let mut reader = Reader::from_str(input);
    reader.trim_text(false);

    let mut elements: Vec<Element> = Vec::new();
    let mut stack: Vec<NodeId> = Vec::new();
    let mut root: Option<NodeId> = None;
    let mut root_closed = false;
    let mut prolog = String::new();
    let mut epilog = String::new();

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Eof => break,
            Event::Start(start) | Event::Empty(start) if root_closed => {
                return Err(DocumentError::MultipleRoots(
                    std::str::from_utf8(start.name().as_ref())?.to_string(),
                ));
            }
            Event::Start(start) => {
                let id = push_element(&mut elements, &stack, &start, false)?;
                root.get_or_insert(id);
                stack.push(id);
            }
            Event::Empty(start) => {
                let id = push_element(&mut elements, &stack, &start, true)?;
                if root.is_none() {
                    root = Some(id);
                    root_closed = true;
                }
            }
            Event::End(end) => {
                let name = std::str::from_utf8(end.name().as_ref())?.to_string();
                let Some(open) = stack.pop() else {
                    return Err(DocumentError::UnbalancedTag(name));
                };
                if elements[open.index()].tag != name {
                    return Err(DocumentError::UnbalancedTag(name));
                }
                if stack.is_empty() {
                    root_closed = true;
                }
            }
            other => {
                let raw = raw_event(&other)?;
                match stack.last() {
                    Some(parent) if matches!(other, Event::Text(_)) => {
                        elements[parent.index()].children.push(Content::Text(raw))
                    }
                    Some(parent) => elements[parent.index()].children.push(Content::Markup(raw)),
                    None if root_closed => epilog.push_str(&raw),
                    None => prolog.push_str(&raw),
                }
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(DocumentError::Unterminated(elements[open.index()].tag.clone()));
    }
    let root = root.ok_or(DocumentError::MissingRoot)?;
    Ok(Document::from_parts(elements, root, prolog, epilog))
}

fn push_element(
    elements: &mut Vec<Element>,
    stack: &[NodeId],
    start: &BytesStart<'_>,
    self_closing: bool,
) -> Result<NodeId, DocumentError> {
    let mut element = Element::new(std::str::from_utf8(start.name().as_ref())?);
    element.self_closing = self_closing;
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        element.attributes.push((
            std::str::from_utf8(attribute.key.as_ref())?.to_string(),
            std::str::from_utf8(&attribute.value)?.to_string(),
        ));
    }
    elements.push(element);
    let id = NodeId::from_index(elements.len() - 1);
    if let Some(parent) = stack.last() {
        elements[parent.index()].children.push(Content::Element(id));
    }
    Ok(id)
}

/// Source form of a non-element event. Text stays escaped; markup keeps its delimiters.
fn raw_event(event: &Event<'_>) -> Result<String, DocumentError> {
    let mut scratch = Writer::new(Vec::new());
    scratch.write_event(event)?;
    String::from_utf8(scratch.into_inner()).map_err(|e| DocumentError::Encoding(e.utf8_error()))
}

/// Serialize a document, including everything outside the root element
pub fn write_document(doc: &Document) -> Result<Vec<u8>, DocumentError> {
    let mut writer = Writer::new(Vec::new());
    writer.get_mut().write_all(doc.prolog.as_bytes())?;
    write_element(&mut writer, doc, doc.root())?;
    writer.get_mut().write_all(doc.epilog.as_bytes())?;
    Ok(writer.into_inner())
}

/// Serialize a single element and its subtree
pub fn write_subtree(doc: &Document, id: NodeId) -> Result<String, DocumentError> {
    let mut writer = Writer::new(Vec::new());
    write_element(&mut writer, doc, id)?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    doc: &Document,
    id: NodeId,
) -> Result<(), DocumentError> {
    // Open elements with the position of their next unwritten content
    let mut stack: Vec<(NodeId, usize)> = Vec::new();
    if write_start(writer, doc, id)? {
        stack.push((id, 0));
    }

    while let Some((current, next)) = stack.pop() {
        let element = doc.element(current);
        let Some(content) = element.children.get(next) else {
            writer.write_event(Event::End(BytesEnd::new(element.tag.as_str())))?;
            continue;
        };
        stack.push((current, next + 1));
        match content {
            Content::Element(child) => {
                if write_start(writer, doc, *child)? {
                    stack.push((*child, 0));
                }
            }
            Content::Text(raw) | Content::Markup(raw) => {
                writer.get_mut().write_all(raw.as_bytes())?
            }
        }
    }
    Ok(())
}

/// Write an element's start tag. Returns false when it was written self-closed.
fn write_start(
    writer: &mut Writer<Vec<u8>>,
    doc: &Document,
    id: NodeId,
) -> Result<bool, DocumentError> {
    let element = doc.element(id);
    let mut start = BytesStart::new(element.tag.as_str());
    for (key, raw) in &element.attributes {
        // Values that came from single-quoted attributes may hold a bare double quote.
        let value: Cow<'_, str> = if raw.contains('"') {
            Cow::Owned(quick_xml::escape::escape(&unescape_lossy(raw)).into_owned())
        } else {
            Cow::Borrowed(raw.as_str())
        };
        start.push_attribute(Attribute {
            key: QName(key.as_bytes()),
            value: Cow::Borrowed(value.as_bytes()),
        });
    }

    if element.children.is_empty() && element.self_closing {
        writer.write_event(Event::Empty(start))?;
        return Ok(false);
    }
    writer.write_event(Event::Start(start))?;
    Ok(true)
}

/// Read and parse a document from disk
pub fn load_document(path: &Path) -> Result<Document, DocumentError> {
    let bytes = std::fs::read(path)?;
    let text = std::str::from_utf8(&bytes)?;
    parse_document(text)
}

/// Serialize a document to disk, creating parent directories as needed
pub fn save_document(doc: &Document, path: &Path) -> Result<(), DocumentError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, write_document(doc)?)?;
    Ok(())
}
