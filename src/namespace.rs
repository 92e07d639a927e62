//! Namespace normalization
//!
//! XPath 1.0 cannot address elements in an unprefixed default namespace. When
//! a document declares one, the loader binds its URI to a synthesized prefix
//! that does not collide with any declared prefix, so expressions such as
//! `/ns:root/ns:a` work. The prefix can later be renamed through
//! [`LoadedDocument::rename_prefix`] after checking it with
//! [`LoadedDocument::is_valid_new_prefix`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::document::Document;
use crate::error::{ParseError, ParseResult, PrefixError};

/// First candidate for the synthesized default-namespace prefix
pub const BASE_PREFIX: &str = "ns";

/// Appended to the candidate until it no longer collides
pub const DISAMBIGUATION_SUFFIX: char = '_';

static NCNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\p{L}_][\p{L}\p{N}_.\-]*$").expect("NCName pattern is valid")
});

/// Mapping from non-empty prefix to namespace URI
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceMap {
    entries: BTreeMap<String, String>,
}

impl NamespaceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.entries.get(prefix).map(String::as_str)
    }

    pub fn contains_prefix(&self, prefix: &str) -> bool {
        self.entries.contains_key(prefix)
    }

    pub fn insert(&mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Option<String> {
        self.entries.insert(prefix.into(), uri.into())
    }

    pub fn remove(&mut self, prefix: &str) -> Option<String> {
        self.entries.remove(prefix)
    }

    /// Prefixes bound to `uri`
    pub fn prefixes_for<'a>(&'a self, uri: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(_, value)| value.as_str() == uri)
            .map(|(prefix, _)| prefix.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NamespaceMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(prefix, uri)| (prefix.into(), uri.into()))
                .collect(),
        }
    }
}

/// `true` when `candidate` can be written as a namespace prefix
pub fn is_ncname(candidate: &str) -> bool {
    NCNAME.is_match(candidate)
}

/// Pick a prefix for the default namespace that is not already declared
pub fn synthesize_prefix<'a>(declared: impl IntoIterator<Item = &'a str> + Clone) -> String {
    let mut prefix = BASE_PREFIX.to_string();
    while declared.clone().into_iter().any(|taken| taken == prefix) {
        prefix.push(DISAMBIGUATION_SUFFIX);
    }
    prefix
}

/// A document plus the namespace bindings XPath evaluation should use
#[derive(Debug)]
pub struct LoadedDocument {
    pub document: Document,
    namespaces: Option<NamespaceMap>,
    default_prefix: Option<String>,
}

impl LoadedDocument {
    /// Inspect the root's in-scope declarations and synthesize a prefix for
    /// the default namespace, if one is declared
    pub fn normalize(document: Document) -> ParseResult<Self> {
        let root = document.root().ok_or_else(|| ParseError::NoRootElement {
            source_name: document.source_name().to_string(),
        })?;
        let declarations = root.namespaces();

        let default_uri = declarations
            .iter()
            .find(|(prefix, uri)| prefix.is_none() && !uri.is_empty())
            .map(|(_, uri)| uri.clone());

        let Some(default_uri) = default_uri else {
            debug!(source = document.source_name(), "no default namespace declared");
            return Ok(Self {
                document,
                namespaces: None,
                default_prefix: None,
            });
        };

        let declared_prefixes: Vec<&str> = declarations
            .iter()
            .filter_map(|(prefix, _)| prefix.as_deref())
            .collect();
        let prefix = synthesize_prefix(declared_prefixes.iter().copied());

        let mut namespaces: NamespaceMap = declarations
            .iter()
            .filter_map(|(declared, uri)| declared.as_ref().map(|p| (p.clone(), uri.clone())))
            .collect();
        namespaces.insert(prefix.clone(), default_uri.clone());

        info!(
            source = document.source_name(),
            prefix = %prefix,
            uri = %default_uri,
            "bound default namespace to synthesized prefix"
        );

        Ok(Self {
            document,
            namespaces: Some(namespaces),
            default_prefix: Some(prefix),
        })
    }

    /// The mapping to hand to XPath evaluation, absent without a default namespace
    pub fn namespaces(&self) -> Option<&NamespaceMap> {
        self.namespaces.as_ref()
    }

    /// The synthesized (or since renamed) default-namespace prefix
    pub fn default_prefix(&self) -> Option<&str> {
        self.default_prefix.as_deref()
    }

    /// Pure check whether the default-namespace prefix may be renamed to `candidate`
    ///
    /// Renaming to the current prefix is always accepted. Otherwise the
    /// candidate must be an NCName not already bound in the map.
    pub fn is_valid_new_prefix(&self, candidate: &str) -> bool {
        self.check_new_prefix(candidate).is_ok()
    }

    fn check_new_prefix(&self, candidate: &str) -> Result<(), PrefixError> {
        let (Some(current), Some(namespaces)) = (&self.default_prefix, &self.namespaces) else {
            return Err(PrefixError::NoDefaultNamespace);
        };
        if candidate == current.as_str() {
            return Ok(());
        }
        if !is_ncname(candidate) {
            return Err(PrefixError::InvalidName {
                prefix: candidate.to_string(),
            });
        }
        if namespaces.contains_prefix(candidate) {
            return Err(PrefixError::Collision {
                prefix: candidate.to_string(),
            });
        }
        Ok(())
    }

    /// Rebind the default namespace from the current prefix to `new_prefix`
    ///
    /// The previous entry is removed so exactly one synthesized prefix maps to
    /// the default namespace.
    pub fn rename_prefix(&mut self, new_prefix: &str) -> Result<(), PrefixError> {
        self.check_new_prefix(new_prefix)?;

        let (Some(current), Some(namespaces)) = (&mut self.default_prefix, &mut self.namespaces)
        else {
            return Err(PrefixError::NoDefaultNamespace);
        };
        if current.as_str() == new_prefix {
            return Ok(());
        }

        let uri = namespaces
            .remove(current)
            .ok_or_else(|| PrefixError::Unknown {
                prefix: current.clone(),
            })?;
        namespaces.insert(new_prefix, uri);

        info!(from = %current, to = %new_prefix, "renamed default namespace prefix");
        *current = new_prefix.to_string();
        Ok(())
    }
}

/// Load the file at `path` and normalize its default namespace
pub fn load(path: &Path) -> ParseResult<LoadedDocument> {
    LoadedDocument::normalize(Document::parse_file(path)?)
}

/// In-memory counterpart of [`load`]
pub fn load_str(xml: &str) -> ParseResult<LoadedDocument> {
    LoadedDocument::normalize(Document::parse_str(xml)?)
}
