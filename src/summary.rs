//! Structural outline of a document's tag hierarchy
//!
//! The outline is built in two passes. The counting pass walks every element
//! once and aggregates per local tag name. The rendering pass then walks the
//! graph of tag names (not the node tree) from the root tag, so each distinct
//! parent/child relationship is printed once regardless of how often it occurs.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Write as _;

use crate::tree::{NodeKind, XmlNode};

/// Marker emitted under a tag that reappears on its own ancestor path
pub const RECURSION_MARKER: &str = "(recursive element)";

const INDENT: &str = "  ";

/// Aggregate facts about one local tag name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagInfo {
    pub count: usize,
    pub attributes: BTreeSet<String>,
    pub children: BTreeMap<String, usize>,
}

/// Per-tag aggregates keyed by local name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSummary {
    tags: BTreeMap<String, TagInfo>,
    root: Option<String>,
}

impl TagSummary {
    /// Count every element under (and including) `root`
    ///
    /// A document node is summarized from its root element.
    pub fn collect<N: XmlNode>(root: &N) -> Self {
        let mut summary = Self::default();

        let mut stack: Vec<(N, Option<String>)> = match root.kind() {
            NodeKind::Document => root
                .children()
                .into_iter()
                .filter(|child| child.is_element())
                .take(1)
                .map(|child| (child, None))
                .collect(),
            NodeKind::Element => vec![(root.clone(), None)],
            _ => Vec::new(),
        };

        while let Some((node, parent)) = stack.pop() {
            let tag = node.local_name();
            if summary.root.is_none() {
                summary.root = Some(tag.clone());
            }

            let info = summary.tags.entry(tag.clone()).or_default();
            info.count += 1;
            info.attributes.extend(
                node.attributes()
                    .iter()
                    .filter(|attr| !attr.is_namespace_declaration())
                    .map(|attr| attr.local_name().to_string()),
            );

            if let Some(parent) = parent {
                *summary
                    .tags
                    .entry(parent)
                    .or_default()
                    .children
                    .entry(tag.clone())
                    .or_insert(0) += 1;
            }

            for child in node.children().into_iter().rev() {
                if child.is_element() {
                    stack.push((child, Some(tag.clone())));
                }
            }
        }

        summary
    }

    pub fn get(&self, tag: &str) -> Option<&TagInfo> {
        self.tags.get(tag)
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Indented outline, two spaces per level
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(root) = &self.root {
            let mut path = HashSet::new();
            self.render_tag(root, 0, &mut path, &mut out);
        }
        out
    }

    fn render_tag<'a>(
        &'a self,
        tag: &'a str,
        depth: usize,
        path: &mut HashSet<&'a str>,
        out: &mut String,
    ) {
        let info = self.tags.get(tag);
        let _ = write!(out, "{}{}", INDENT.repeat(depth), tag);
        if let Some(info) = info.filter(|info| !info.attributes.is_empty()) {
            let names: Vec<&str> = info.attributes.iter().map(String::as_str).collect();
            let _ = write!(out, " [{}]", names.join(", "));
        }
        out.push('\n');

        if !path.insert(tag) {
            let _ = writeln!(out, "{}{}", INDENT.repeat(depth + 1), RECURSION_MARKER);
            return;
        }
        if let Some(info) = info {
            for child in info.children.keys() {
                self.render_tag(child, depth + 1, path, out);
            }
        }
        path.remove(tag);
    }
}

/// Outline of the tag hierarchy under `root`, ready to paste into a prompt
pub fn summarize<N: XmlNode>(root: &N) -> String {
    TagSummary::collect(root).render()
}
