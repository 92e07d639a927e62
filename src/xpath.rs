//! XPath 1.0 evaluation through libxml2
//!
//! Results keep the engine's data model: node-sets become a sequence of
//! values, scalar results a one-element sequence.

use std::ffi::CString;

use tracing::debug;

use crate::document::{Document, NodeRef};
use crate::error::{QueryError, QueryResult};
use crate::libxml2::{
    self, ErrorCapture, XML_ATTRIBUTE_NODE, XML_CDATA_SECTION_NODE, XML_COMMENT_NODE,
    XML_DOCUMENT_NODE, XML_ELEMENT_NODE, XML_NAMESPACE_DECL, XML_PI_NODE, XML_TEXT_NODE,
    XPATH_BOOLEAN, XPATH_NODESET, XPATH_NUMBER, XPATH_STRING, XPATH_XSLT_TREE, XPathContextGuard,
    XPathObjectGuard, XmlAttr, XmlNode as RawNode, XmlNs,
};
use crate::namespace::NamespaceMap;

/// One item of an XPath result
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue<'doc> {
    /// Element, comment, processing instruction or document node
    Node(NodeRef<'doc>),
    /// String result, or the string value of a text, attribute or namespace node
    String(String),
    Number(f64),
    Boolean(bool),
}

impl<'doc> XPathValue<'doc> {
    pub fn as_node(&self) -> Option<NodeRef<'doc>> {
        match self {
            XPathValue::Node(node) => Some(*node),
            _ => None,
        }
    }
}

/// Evaluate `expression` with `context` as the context node
///
/// `namespaces` adds prefix bindings on top of those built into the engine.
pub fn evaluate<'doc>(
    context: NodeRef<'doc>,
    expression: &str,
    namespaces: Option<&NamespaceMap>,
) -> QueryResult<Vec<XPathValue<'doc>>> {
    let invalid = |details: String| QueryError::Invalid {
        expression: expression.to_string(),
        details,
    };

    let c_expression =
        CString::new(expression).map_err(|_| invalid("expression contains a NUL byte".into()))?;

    let capture = ErrorCapture::new();
    let raw = unsafe { &*context.as_ptr() };
    let context_guard = XPathContextGuard::new(raw.doc).ok_or(QueryError::ContextCreation)?;

    if let Some(namespaces) = namespaces {
        for (prefix, uri) in namespaces.iter() {
            register_namespace(&context_guard, prefix, uri)?;
        }
    }

    let object = unsafe {
        libxml2::xmlXPathNodeEval(context.as_ptr(), c_expression.as_ptr(), context_guard.as_ptr())
    };
    let guard = XPathObjectGuard::from_raw(object)
        .ok_or_else(|| invalid(capture.details("evaluation failed")))?;
    let object = guard.get();

    let values = match object.object_type {
        XPATH_NODESET | XPATH_XSLT_TREE => node_set_values(object.nodesetval),
        XPATH_BOOLEAN => vec![XPathValue::Boolean(object.boolval != 0)],
        XPATH_NUMBER => vec![XPathValue::Number(object.floatval)],
        XPATH_STRING => vec![XPathValue::String(
            unsafe { libxml2::c_string(object.stringval) }.unwrap_or_default(),
        )],
        code => {
            return Err(QueryError::UnsupportedResult {
                expression: expression.to_string(),
                code,
            });
        }
    };

    debug!(expression, results = values.len(), "evaluated XPath expression");
    Ok(values)
}

fn register_namespace(context: &XPathContextGuard, prefix: &str, uri: &str) -> QueryResult<()> {
    let registration = || QueryError::Registration {
        prefix: prefix.to_string(),
        uri: uri.to_string(),
    };
    let c_prefix = CString::new(prefix).map_err(|_| registration())?;
    let c_uri = CString::new(uri).map_err(|_| registration())?;
    let status =
        unsafe { libxml2::xmlXPathRegisterNs(context.as_ptr(), c_prefix.as_ptr(), c_uri.as_ptr()) };
    if status != 0 {
        return Err(registration());
    }
    Ok(())
}

fn node_set_values<'doc>(set: *mut libxml2::XmlNodeSet) -> Vec<XPathValue<'doc>> {
    if set.is_null() {
        return Vec::new();
    }
    let set = unsafe { &*set };
    let count = usize::try_from(set.node_nr).unwrap_or(0);
    if count == 0 || set.node_tab.is_null() {
        return Vec::new();
    }
    let nodes = unsafe { std::slice::from_raw_parts(set.node_tab, count) };
    nodes.iter().filter_map(|&node| node_value(node)).collect()
}

fn node_value<'doc>(node: *mut RawNode) -> Option<XPathValue<'doc>> {
    if node.is_null() {
        return None;
    }
    let node_type = unsafe { (*node).node_type };
    let value = match node_type {
        XML_ELEMENT_NODE | XML_COMMENT_NODE | XML_PI_NODE | XML_DOCUMENT_NODE => {
            XPathValue::Node(NodeRef::new(node))
        }
        XML_TEXT_NODE | XML_CDATA_SECTION_NODE => {
            XPathValue::String(unsafe { libxml2::c_string((*node).content) }.unwrap_or_default())
        }
        XML_ATTRIBUTE_NODE => {
            let attr = unsafe { &*(node as *mut XmlAttr) };
            let mut value = String::new();
            let mut child = attr.children;
            while !child.is_null() {
                if let Some(content) = unsafe { libxml2::c_string((*child).content) } {
                    value.push_str(&content);
                }
                child = unsafe { (*child).next };
            }
            XPathValue::String(value)
        }
        XML_NAMESPACE_DECL => {
            let ns = unsafe { &*(node as *mut XmlNs) };
            XPathValue::String(unsafe { libxml2::c_string(ns.href) }.unwrap_or_default())
        }
        _ => return None,
    };
    Some(value)
}

impl Document {
    /// Evaluate `expression` against the whole document
    pub fn xpath(
        &self,
        expression: &str,
        namespaces: Option<&NamespaceMap>,
    ) -> QueryResult<Vec<XPathValue<'_>>> {
        evaluate(self.as_node(), expression, namespaces)
    }
}
