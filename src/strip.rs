//! Namespace stripping for display
//!
//! Produces a detached copy of a subtree with every namespace removed:
//! element and attribute names are reduced to their local part and namespace
//! declarations are dropped. The copy is intentionally lossy and cannot be
//! mapped back onto the namespaced original.

use crate::tree::{Element, NodeKind, XmlNode};

/// Deep, namespace-free copy of `node`; the input is never modified
///
/// A document node is stripped as its root element.
pub fn strip<N: XmlNode>(node: &N) -> Element {
    match node.kind() {
        NodeKind::Comment => Element {
            tail: node.tail(),
            ..Element::comment(node.text().unwrap_or_default())
        },
        NodeKind::ProcessingInstruction => Element {
            tail: node.tail(),
            ..Element::processing_instruction(node.tag(), node.text())
        },
        NodeKind::Document => match node.children().iter().find(|child| child.is_element()) {
            Some(root) => strip(root),
            None => Element::new(""),
        },
        NodeKind::Element => Element {
            kind: NodeKind::Element,
            tag: node.local_name(),
            attributes: node
                .attributes()
                .into_iter()
                .filter(|attr| !attr.is_namespace_declaration())
                .map(|mut attr| {
                    attr.name = attr.local_name().to_string();
                    attr
                })
                .collect(),
            text: node.text(),
            tail: node.tail(),
            children: node.children().iter().map(strip).collect(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::tree::Attribute;

    fn namespaced_tree() -> Element {
        Element::new("{urn:x}root")
            .with_attribute("xmlns", "urn:x")
            .with_attribute("xmlns:p", "urn:p")
            .with_attribute("{http://www.w3.org/2000/xmlns/}q", "urn:q")
            .with_attribute("{urn:p}id", "7")
            .with_attribute("plain", "yes")
            .with_text("lead")
            .with_child(
                Element::new("{urn:p}child")
                    .with_text("inner")
                    .with_tail("after"),
            )
            .with_child(Element::comment(" note ").with_tail("end"))
            .with_child(Element::processing_instruction("pi", Some("data".into())))
    }

    #[test]
    fn test_strip_owned_tree() {
        let source = namespaced_tree();
        let stripped = strip(&&source);

        assert_eq!(stripped.tag, "root");
        assert_eq!(
            stripped.attributes,
            vec![Attribute::new("id", "7"), Attribute::new("plain", "yes")]
        );
        assert_eq!(stripped.text.as_deref(), Some("lead"));
        assert_eq!(stripped.children.len(), 3);
        assert_eq!(stripped.children[0].tag, "child");
        assert_eq!(stripped.children[0].text.as_deref(), Some("inner"));
        assert_eq!(stripped.children[0].tail.as_deref(), Some("after"));
        assert_eq!(stripped.children[1].kind, NodeKind::Comment);
        assert_eq!(stripped.children[1].text.as_deref(), Some(" note "));
        assert_eq!(stripped.children[1].tail.as_deref(), Some("end"));
        assert_eq!(stripped.children[2].kind, NodeKind::ProcessingInstruction);
        assert_eq!(stripped.children[2].tag, "pi");
    }

    #[test]
    fn test_strip_does_not_modify_input() {
        let source = namespaced_tree();
        let before = source.clone();
        let _ = strip(&&source);
        assert_eq!(source, before);
    }

    #[test]
    fn test_strip_is_idempotent() {
        let source = namespaced_tree();
        let once = strip(&&source);
        let twice = strip(&&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_strip_parsed_document() {
        let doc = Document::parse_str(
            r#"<root xmlns="urn:x" xmlns:p="urn:p" p:id="1"><p:a>t</p:a><!--c--></root>"#,
        )
        .unwrap();
        let stripped = strip(&doc.root().unwrap());

        assert_eq!(stripped.tag, "root");
        assert_eq!(stripped.attributes, vec![Attribute::new("id", "1")]);
        assert_eq!(stripped.children[0].tag, "a");
        assert_eq!(stripped.children[0].text.as_deref(), Some("t"));
        assert_eq!(stripped.children[1].kind, NodeKind::Comment);

        let xml = stripped.to_xml_string().unwrap();
        assert!(!xml.contains("xmlns"));
        assert!(!xml.contains("urn:"));
    }

    #[test]
    fn test_strip_document_node_uses_root() {
        let doc = Document::parse_str(r#"<!--top--><r xmlns="urn:x"/>"#).unwrap();
        let stripped = strip(&doc.as_node());
        assert_eq!(stripped.tag, "r");
    }

    #[test]
    fn test_stripped_output_has_no_declarations() {
        let source = namespaced_tree();
        let stripped = strip(&&source);
        fn check(element: &Element) {
            assert!(element.attributes.iter().all(|a| !a.is_namespace_declaration()));
            assert!(!element.tag.contains('}'));
            element.children.iter().for_each(check);
        }
        check(&stripped);
    }
}
