//! # xpathfinder Library
//!
//! Interactive XPath exploration of XML documents on top of libxml2:
//! namespace-aware loading that makes unprefixed default namespaces
//! addressable, namespace-free rendering of results, a structural outline for
//! prompting a query assistant, and undo/redo for the editable buffers.

pub mod assistant;
pub mod buffer;
pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod history;
pub mod libxml2;
pub mod namespace;
pub mod output;
pub mod repl;
pub mod script;
pub mod session;
pub mod strip;
pub mod summary;
pub mod tree;
pub mod xpath;

pub use assistant::{AssistantClient, AssistantReply, AssistantRequest};
pub use buffer::{BufferKind, EditBuffer};
pub use cli::{Cli, VerbosityLevel};
pub use config::{Config, ConfigManager, EnvProvider, SystemEnvProvider};
pub use document::{Document, NodeRef};
pub use error::{
    AssistantError, ConfigError, Error, ParseError, PrefixError, QueryError, Result, ScriptError,
};
pub use history::History;
pub use namespace::{LoadedDocument, NamespaceMap, load, load_str};
pub use output::{Output, format_number, render_value};
pub use script::{CommandRunner, ScriptOutput, ScriptRunner, ScriptScope};
pub use session::{Evaluation, LogEntry, Session};
pub use strip::strip;
pub use summary::{RECURSION_MARKER, TagSummary, summarize};
pub use tree::{Attribute, Element, NodeKind, XmlNode};
pub use xpath::{XPathValue, evaluate};
