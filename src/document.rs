//! Parsed XML documents backed by libxml2
//!
//! [`Document`] owns the libxml2 tree and frees it on drop. [`NodeRef`] is a
//! cheap, copyable view into that tree whose lifetime is tied to the
//! document, so no node can outlive the tree it belongs to.

use std::ffi::CString;
use std::marker::PhantomData;
use std::path::Path;

use libc::{c_char, c_int};
use tracing::debug;

use crate::error::{Error, ParseError, ParseResult, Result};
use crate::libxml2::{
    self, BufferGuard, ErrorCapture, XML_CDATA_SECTION_NODE, XML_COMMENT_NODE,
    XML_DOCUMENT_NODE, XML_ELEMENT_NODE, XML_PI_NODE, XML_TEXT_NODE, XmlDoc, XmlNode as RawNode,
    XmlNs,
};
use crate::tree::{Attribute, NodeKind, XmlNode};

/// An in-memory XML document
pub struct Document {
    ptr: *mut XmlDoc,
    source_name: String,
}

// Safety: the tree is owned exclusively by this value and libxml2 documents
// may move between threads as long as only one thread uses them at a time.
// `Document` is deliberately not `Sync`.
unsafe impl Send for Document {}

impl Document {
    /// Read and parse the file at `path`
    ///
    /// The file is read once; the encoding declared in the prolog is honored
    /// by libxml2. Ignorable whitespace between elements is dropped and entity
    /// references are replaced by their text.
    pub fn parse_file(path: &Path) -> ParseResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| ParseError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_bytes(&bytes, &path.display().to_string())
    }

    /// Parse an in-memory XML string
    pub fn parse_str(xml: &str) -> ParseResult<Self> {
        Self::parse_bytes(xml.as_bytes(), "<memory>")
    }

    /// Parse raw bytes; `source_name` is used as the document URL and in errors
    pub fn parse_bytes(bytes: &[u8], source_name: &str) -> ParseResult<Self> {
        let malformed = |details: String| ParseError::Malformed {
            source_name: source_name.to_string(),
            details,
        };

        let size = c_int::try_from(bytes.len())
            .map_err(|_| malformed("document exceeds the maximum parseable size".to_string()))?;
        let url = CString::new(source_name)
            .map_err(|_| malformed("source name contains a NUL byte".to_string()))?;

        let capture = ErrorCapture::new();
        let ptr = unsafe {
            libxml2::xmlReadMemory(
                bytes.as_ptr() as *const c_char,
                size,
                url.as_ptr(),
                std::ptr::null(),
                libxml2::PARSE_OPTIONS,
            )
        };

        if ptr.is_null() {
            return Err(malformed(capture.details("document is not well-formed")));
        }

        let document = Document {
            ptr,
            source_name: source_name.to_string(),
        };
        if document.root().is_none() {
            return Err(ParseError::NoRootElement {
                source_name: source_name.to_string(),
            });
        }

        debug!(source = source_name, bytes = bytes.len(), "parsed XML document");
        Ok(document)
    }

    /// File path or `<memory>` the document was parsed from
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// The document node itself, usable as an XPath context
    pub fn as_node(&self) -> NodeRef<'_> {
        NodeRef::new(self.ptr as *mut RawNode)
    }

    /// The root element
    pub fn root(&self) -> Option<NodeRef<'_>> {
        let root = unsafe { libxml2::xmlDocGetRootElement(self.ptr) };
        if root.is_null() {
            None
        } else {
            Some(NodeRef::new(root))
        }
    }

    /// Serialize with XML declaration, indentation and UTF-8 encoding
    pub fn to_xml_string(&self) -> Result<String> {
        let mut output = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        for child in self.as_node().children() {
            output.push_str(&child.to_xml_string()?);
            output.push('\n');
        }
        Ok(output)
    }

    /// Write the document to `path` with declaration, indentation and UTF-8 encoding
    pub fn save(&self, path: &Path) -> Result<()> {
        let c_path = CString::new(path.to_string_lossy().as_bytes()).map_err(|_| {
            Error::LibXml2Internal {
                details: format!("path contains a NUL byte: {}", path.display()),
            }
        })?;

        let capture = ErrorCapture::new();
        let written = unsafe {
            libxml2::xmlSaveFormatFileEnc(c_path.as_ptr(), self.ptr, c"UTF-8".as_ptr(), 1)
        };
        if written < 0 {
            return Err(Error::LibXml2Internal {
                details: capture.details(&format!("failed to save {}", path.display())),
            });
        }

        debug!(path = %path.display(), bytes = written, "saved XML document");
        Ok(())
    }

    pub(crate) fn as_ptr(&self) -> *mut XmlDoc {
        self.ptr
    }
}

impl Drop for Document {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                libxml2::xmlFreeDoc(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("source_name", &self.source_name)
            .finish()
    }
}

/// Borrowed view of a node inside a [`Document`]
#[derive(Clone, Copy)]
pub struct NodeRef<'doc> {
    ptr: *mut RawNode,
    _doc: PhantomData<&'doc Document>,
}

impl<'doc> NodeRef<'doc> {
    pub(crate) fn new(ptr: *mut RawNode) -> Self {
        NodeRef {
            ptr,
            _doc: PhantomData,
        }
    }

    pub(crate) fn as_ptr(&self) -> *mut RawNode {
        self.ptr
    }

    fn raw(&self) -> &'doc RawNode {
        unsafe { &*self.ptr }
    }

    fn raw_type(&self) -> c_int {
        self.raw().node_type
    }

    /// Parent element, or `None` at the root
    pub fn parent(&self) -> Option<NodeRef<'doc>> {
        if self.raw_type() == XML_DOCUMENT_NODE {
            return None;
        }
        let parent = self.raw().parent;
        if parent.is_null() || unsafe { (*parent).node_type } != XML_ELEMENT_NODE {
            None
        } else {
            Some(NodeRef::new(parent))
        }
    }

    /// Namespace declarations in scope at this element, innermost first
    ///
    /// Each entry is `(prefix, uri)`; the default namespace has no prefix.
    /// A prefix redeclared on an inner element shadows outer declarations.
    pub fn namespaces(&self) -> Vec<(Option<String>, String)> {
        let mut in_scope: Vec<(Option<String>, String)> = Vec::new();
        let mut current = Some(*self).filter(|node| node.raw_type() == XML_ELEMENT_NODE);
        while let Some(node) = current {
            let mut ns = node.raw().ns_def;
            while !ns.is_null() {
                let prefix = unsafe { libxml2::c_string((*ns).prefix) };
                let href = ns_href(ns).unwrap_or_default();
                if !in_scope.iter().any(|(seen, _)| *seen == prefix) {
                    in_scope.push((prefix, href));
                }
                ns = unsafe { (*ns).next };
            }
            current = node.parent();
        }
        in_scope
    }

    /// Raw libxml2 serialization of this node, namespaces as written
    pub fn to_xml_string(&self) -> Result<String> {
        let buffer = BufferGuard::new().ok_or_else(|| Error::LibXml2Internal {
            details: "buffer allocation failed".to_string(),
        })?;
        let written =
            unsafe { libxml2::xmlNodeDump(buffer.as_ptr(), self.raw().doc, self.ptr, 0, 1) };
        if written < 0 {
            return Err(Error::LibXml2Internal {
                details: "node serialization failed".to_string(),
            });
        }
        Ok(buffer.contents())
    }

    /// Text and CDATA content of the sibling run starting at `start`
    fn text_run(start: *mut RawNode) -> Option<String> {
        let mut node = start;
        let mut text: Option<String> = None;
        while !node.is_null() {
            let raw = unsafe { &*node };
            if raw.node_type != XML_TEXT_NODE && raw.node_type != XML_CDATA_SECTION_NODE {
                break;
            }
            if let Some(content) = unsafe { libxml2::c_string(raw.content) } {
                text.get_or_insert_with(String::new).push_str(&content);
            }
            node = raw.next;
        }
        text
    }
}

fn ns_href(ns: *mut XmlNs) -> Option<String> {
    if ns.is_null() {
        None
    } else {
        unsafe { libxml2::c_string((*ns).href) }
    }
}

fn clark_name(name: Option<String>, ns: *mut XmlNs) -> String {
    let local = name.unwrap_or_default();
    match ns_href(ns) {
        Some(uri) => format!("{{{}}}{}", uri, local),
        None => local,
    }
}

impl<'doc> XmlNode for NodeRef<'doc> {
    fn kind(&self) -> NodeKind {
        match self.raw_type() {
            XML_DOCUMENT_NODE => NodeKind::Document,
            XML_COMMENT_NODE => NodeKind::Comment,
            XML_PI_NODE => NodeKind::ProcessingInstruction,
            _ => NodeKind::Element,
        }
    }

    fn tag(&self) -> String {
        let raw = self.raw();
        match self.raw_type() {
            XML_ELEMENT_NODE => clark_name(unsafe { libxml2::c_string(raw.name) }, raw.ns),
            XML_PI_NODE => unsafe { libxml2::c_string(raw.name) }.unwrap_or_default(),
            _ => String::new(),
        }
    }

    fn attributes(&self) -> Vec<Attribute> {
        let mut attributes = Vec::new();
        if self.raw_type() != XML_ELEMENT_NODE {
            return attributes;
        }
        let mut attr = self.raw().properties;
        while !attr.is_null() {
            let raw = unsafe { &*attr };
            let name = clark_name(unsafe { libxml2::c_string(raw.name) }, raw.ns);
            let value = Self::text_run(raw.children).unwrap_or_default();
            attributes.push(Attribute::new(name, value));
            attr = raw.next;
        }
        attributes
    }

    fn text(&self) -> Option<String> {
        match self.raw_type() {
            XML_ELEMENT_NODE => Self::text_run(self.raw().children),
            XML_COMMENT_NODE | XML_PI_NODE => unsafe { libxml2::c_string(self.raw().content) },
            _ => None,
        }
    }

    fn tail(&self) -> Option<String> {
        if self.raw_type() == XML_DOCUMENT_NODE {
            return None;
        }
        Self::text_run(self.raw().next)
    }

    fn children(&self) -> Vec<Self> {
        let mut children = Vec::new();
        let mut child = self.raw().children;
        while !child.is_null() {
            let raw = unsafe { &*child };
            if matches!(
                raw.node_type,
                XML_ELEMENT_NODE | XML_COMMENT_NODE | XML_PI_NODE
            ) {
                children.push(NodeRef::new(child));
            }
            child = raw.next;
        }
        children
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRef")
            .field("kind", &self.kind())
            .field("tag", &self.tag())
            .finish()
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.ptr, other.ptr)
    }
}

impl Eq for NodeRef<'_> {}
