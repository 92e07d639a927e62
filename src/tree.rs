//! Node abstraction shared by the live libxml2 tree and detached copies
//!
//! [`XmlNode`] is the read-only view the stripper and the summarizer walk.
//! It is implemented by [`crate::document::NodeRef`] for parsed documents and
//! by `&Element` for owned trees built by [`crate::strip::strip`] or by hand.

use std::io::Cursor;

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::{Error, Result};

/// Namespace URI reserved for namespace declaration attributes
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Kind of node visible through [`XmlNode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Comment,
    ProcessingInstruction,
}

/// Attribute with a possibly namespace-qualified (`{uri}local`) name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// `xmlns`, `xmlns:*`, or any name in the reserved declaration namespace
    pub fn is_namespace_declaration(&self) -> bool {
        self.name == "xmlns"
            || self.name.starts_with("xmlns:")
            || self
                .name
                .strip_prefix('{')
                .and_then(|rest| rest.strip_prefix(XMLNS_NAMESPACE))
                .is_some_and(|rest| rest.starts_with('}'))
    }
}

/// Local part of a Clark-notation name (`{uri}local` -> `local`)
pub fn local_name(name: &str) -> &str {
    match name.rsplit_once('}') {
        Some((_, local)) => local,
        None => name,
    }
}

/// Read-only view of an XML node
///
/// `tag` is the Clark-notation name for elements, the target for processing
/// instructions and empty for comments. `text` is the content before the first
/// child (the payload for comments and processing instructions) and `tail` is
/// the text following the node inside its parent. Implementors are cheap
/// handles, so cloning one never copies a subtree.
pub trait XmlNode: Clone {
    fn kind(&self) -> NodeKind;
    fn tag(&self) -> String;
    fn attributes(&self) -> Vec<Attribute>;
    fn text(&self) -> Option<String>;
    fn tail(&self) -> Option<String>;
    /// Element, comment and processing-instruction children in document order
    fn children(&self) -> Vec<Self>;

    fn local_name(&self) -> String {
        local_name(&self.tag()).to_string()
    }

    fn is_element(&self) -> bool {
        self.kind() == NodeKind::Element
    }
}

/// Owned, detached node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub kind: NodeKind,
    pub tag: String,
    pub attributes: Vec<Attribute>,
    pub text: Option<String>,
    pub tail: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Element,
            tag: tag.into(),
            attributes: Vec::new(),
            text: None,
            tail: None,
            children: Vec::new(),
        }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Comment,
            tag: String::new(),
            text: Some(text.into()),
            ..Self::new("")
        }
    }

    pub fn processing_instruction(target: impl Into<String>, data: Option<String>) -> Self {
        Self {
            kind: NodeKind::ProcessingInstruction,
            tag: target.into(),
            text: data,
            ..Self::new("")
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_tail(mut self, tail: impl Into<String>) -> Self {
        self.tail = Some(tail.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Serialize as indented XML; the node's own tail is not written
    ///
    /// Content of an element that holds text is written as is, so indentation
    /// never adds whitespace the tree does not have.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        write_node(&mut writer, self, Some(0)).map_err(|err| Error::Serialization {
            details: err.to_string(),
        })?;
        String::from_utf8(writer.into_inner().into_inner()).map_err(|err| Error::Serialization {
            details: err.to_string(),
        })
    }

    /// Text or a child tail next to the child elements
    fn has_mixed_content(&self) -> bool {
        let non_empty = |text: &Option<String>| text.as_deref().is_some_and(|t| !t.is_empty());
        non_empty(&self.text) || self.children.iter().any(|child| non_empty(&child.tail))
    }
}

const INDENT: &str = "  ";

fn write_indent(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    depth: usize,
) -> std::result::Result<(), quick_xml::Error> {
    let whitespace = format!("\n{}", INDENT.repeat(depth));
    writer.write_event(Event::Text(BytesText::from_escaped(whitespace)))
}

/// `depth` is `None` inside mixed content
fn write_node(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    node: &Element,
    depth: Option<usize>,
) -> std::result::Result<(), quick_xml::Error> {
    match node.kind {
        NodeKind::Comment => {
            let text = node.text.as_deref().unwrap_or_default();
            writer.write_event(Event::Comment(BytesText::from_escaped(text)))?;
        }
        NodeKind::ProcessingInstruction => {
            let content = match node.text.as_deref() {
                Some(data) if !data.is_empty() => format!("{} {}", node.tag, data),
                _ => node.tag.clone(),
            };
            writer.write_event(Event::PI(BytesText::from_escaped(content)))?;
        }
        NodeKind::Element | NodeKind::Document => {
            let mut start = BytesStart::new(node.tag.as_str());
            for attr in &node.attributes {
                start.push_attribute((attr.name.as_str(), attr.value.as_str()));
            }
            let text = node.text.as_deref().filter(|text| !text.is_empty());
            if text.is_none() && node.children.is_empty() {
                writer.write_event(Event::Empty(start))?;
                return Ok(());
            }

            writer.write_event(Event::Start(start))?;
            if let Some(text) = text {
                writer.write_event(Event::Text(BytesText::new(text)))?;
            }
            let child_depth = match depth {
                Some(depth) if !node.has_mixed_content() => Some(depth + 1),
                _ => None,
            };
            for child in &node.children {
                if let Some(child_depth) = child_depth {
                    write_indent(writer, child_depth)?;
                }
                write_node(writer, child, child_depth)?;
                if let Some(tail) = child.tail.as_deref().filter(|tail| !tail.is_empty()) {
                    writer.write_event(Event::Text(BytesText::new(tail)))?;
                }
            }
            if let (Some(depth), Some(_)) = (depth, child_depth) {
                write_indent(writer, depth)?;
            }
            writer.write_event(Event::End(BytesEnd::new(node.tag.as_str())))?;
        }
    }
    Ok(())
}

impl<'a> XmlNode for &'a Element {
    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn tag(&self) -> String {
        self.tag.clone()
    }

    fn attributes(&self) -> Vec<Attribute> {
        self.attributes.clone()
    }

    fn text(&self) -> Option<String> {
        self.text.clone()
    }

    fn tail(&self) -> Option<String> {
        self.tail.clone()
    }

    fn children(&self) -> Vec<Self> {
        self.children.iter().collect()
    }
}
