//! Interactive session state
//!
//! A [`Session`] owns at most one loaded document, the three editable buffers
//! and a timestamped output log. Every operation leaves the session usable:
//! failed loads keep the previous document, failed queries and scripts are
//! logged and returned to the caller.

use std::path::Path;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::assistant::{AssistantReply, AssistantRequest, truncate_sample};
use crate::buffer::{BufferKind, EditBuffer};
use crate::document::Document;
use crate::error::{Error, ParseError, PrefixError, Result, ScriptError};
use crate::namespace::{self, LoadedDocument};
use crate::output::render_value;
use crate::script::{ScriptOutput, ScriptRunner, ScriptScope};
use crate::summary::summarize;

/// One line of the output log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

/// Rendered results of one expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub expression: String,
    pub rendered: Vec<String>,
}

impl Evaluation {
    pub fn len(&self) -> usize {
        self.rendered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }
}

/// Which buffers an assistant reply replaced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedReply {
    pub expression: bool,
    pub script: bool,
    pub text: Option<String>,
}

#[derive(Debug, Default)]
pub struct Session {
    document: Option<LoadedDocument>,
    query: EditBuffer,
    expression: EditBuffer,
    script: EditBuffer,
    last_expression: Option<String>,
    log: Vec<LogEntry>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path`, replacing the current document only on success
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let loaded = namespace::load(path)?;
        self.replace_document(loaded, &path.display().to_string());
        Ok(())
    }

    /// In-memory counterpart of [`Session::load`]
    pub fn load_str(&mut self, xml: &str) -> Result<()> {
        let loaded = namespace::load_str(xml)?;
        self.replace_document(loaded, "<memory>");
        Ok(())
    }

    fn replace_document(&mut self, loaded: LoadedDocument, source: &str) {
        if let Some(prefix) = loaded.default_prefix() {
            self.record(format!(
                "Default namespace bound to prefix '{}'",
                prefix
            ));
        }
        self.document = Some(loaded);
        self.record(format!("Loaded XML from: {}", source));
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    fn loaded(&self) -> Result<&LoadedDocument> {
        self.document.as_ref().ok_or(Error::NoDocument)
    }

    pub fn buffer(&self, kind: BufferKind) -> &EditBuffer {
        match kind {
            BufferKind::Query => &self.query,
            BufferKind::Expression => &self.expression,
            BufferKind::Script => &self.script,
        }
    }

    pub fn buffer_mut(&mut self, kind: BufferKind) -> &mut EditBuffer {
        match kind {
            BufferKind::Query => &mut self.query,
            BufferKind::Expression => &mut self.expression,
            BufferKind::Script => &mut self.script,
        }
    }

    /// Expression most recently evaluated without error
    pub fn last_expression(&self) -> Option<&str> {
        self.last_expression.as_deref()
    }

    /// Evaluate the expression buffer against the document
    ///
    /// Returns `Ok(None)` for a blank expression. The buffer is committed to
    /// its history only once evaluation succeeds.
    pub fn run_expression(&mut self) -> Result<Option<Evaluation>> {
        let expression = self.expression.text().trim().to_string();
        if expression.is_empty() {
            return Ok(None);
        }
        let loaded = self.loaded()?;

        let outcome = loaded
            .document
            .xpath(&expression, loaded.namespaces())
            .map_err(Error::from)
            .and_then(|values| values.iter().map(render_value).collect::<Result<Vec<_>>>());

        match outcome {
            Ok(rendered) => {
                self.expression.commit();
                self.last_expression = Some(expression.clone());
                self.record(format!("XPath executed: {}", expression));
                Ok(Some(Evaluation {
                    expression,
                    rendered,
                }))
            }
            Err(err) => {
                self.record(format!("XPath error: {}", err));
                Err(err)
            }
        }
    }

    /// Pure check for the namespace prefix field
    pub fn is_valid_new_prefix(&self, candidate: &str) -> bool {
        self.document
            .as_ref()
            .is_some_and(|loaded| loaded.is_valid_new_prefix(candidate))
    }

    /// Rename the synthesized default-namespace prefix
    pub fn set_prefix(&mut self, new_prefix: &str) -> Result<()> {
        let loaded = self.document.as_mut().ok_or(Error::NoDocument)?;
        let previous = loaded
            .default_prefix()
            .map(str::to_string)
            .ok_or(PrefixError::NoDefaultNamespace)?;
        loaded.rename_prefix(new_prefix)?;
        if previous != new_prefix {
            self.record(format!(
                "Namespace prefix renamed from '{}' to '{}'",
                previous, new_prefix
            ));
        }
        Ok(())
    }

    /// Outline of the loaded document's tag hierarchy
    pub fn structure(&self) -> Result<String> {
        let loaded = self.loaded()?;
        Ok(summarize(&loaded.document.as_node()))
    }

    /// Build an assistant request from the query buffer
    ///
    /// Returns `Ok(None)` for a blank prompt. Works without a document; the
    /// structure and sample are empty then.
    pub fn assistant_request(&mut self, sample_bytes: usize) -> Result<Option<AssistantRequest>> {
        let prompt = self.query.text().trim().to_string();
        if prompt.is_empty() {
            return Ok(None);
        }
        self.query.commit();

        let (structure, sample, prefix) = match &self.document {
            Some(loaded) => {
                let xml = loaded.document.to_xml_string()?;
                (
                    summarize(&loaded.document.as_node()),
                    Some(truncate_sample(&xml, sample_bytes).to_string()),
                    loaded.default_prefix().map(str::to_string),
                )
            }
            None => (String::new(), None, None),
        };

        let request = AssistantRequest {
            prompt: prompt.clone(),
            structure,
            sample,
            expression: self.expression.text().to_string(),
            script: self.script.text().to_string(),
            prefix,
        };
        self.record(format!("Assistant prompt: {}", prompt));
        Ok(Some(request))
    }

    /// Copy suggestions into the buffers and log any advice
    ///
    /// The caller decides whether to run the replaced expression or script.
    pub fn apply_reply(&mut self, reply: AssistantReply) -> AppliedReply {
        let mut applied = AppliedReply::default();
        if let Some(xpath) = reply.xpath {
            self.expression.set_text(xpath);
            applied.expression = true;
        }
        if let Some(code) = reply.code {
            self.script.set_text(code);
            applied.script = true;
        }
        if let Some(text) = reply.text {
            self.record(text.clone());
            applied.text = Some(text);
        }
        applied
    }

    /// Run the script buffer through `runner`
    ///
    /// Returns `Ok(None)` for a blank script. Script failures are logged and
    /// returned; they never invalidate the session. A document handed back by
    /// the script replaces the loaded one only if it parses.
    pub fn run_script(&mut self, runner: &mut dyn ScriptRunner) -> Result<Option<ScriptOutput>> {
        let script = self.script.text().to_string();
        if script.trim().is_empty() {
            return Ok(None);
        }
        let Some(loaded) = self.document.as_ref() else {
            return Err(Error::NoDocument);
        };
        let source_name = loaded.document.source_name().to_string();
        let previous_prefix = loaded.default_prefix().map(str::to_string);
        self.script.commit();

        let scope = ScriptScope {
            document: &loaded.document,
            namespaces: loaded.namespaces(),
            expression: self.last_expression.as_deref(),
        };
        let outcome = runner.run(&script, &scope).and_then(|output| {
            let edited = output
                .document
                .as_deref()
                .map(|xml| reload_edited(xml, &source_name, previous_prefix.as_deref()))
                .transpose()?;
            Ok((output, edited))
        });

        match outcome {
            Ok((output, edited)) => {
                let stdout = output.stdout.trim_end();
                if !stdout.is_empty() {
                    self.record(stdout.to_string());
                }
                if let Some(loaded) = edited {
                    self.document = Some(loaded);
                    self.record("Document updated by script.".to_string());
                    info!(source = %source_name, "script replaced document");
                }
                self.record("Script executed successfully.".to_string());
                info!("script executed");
                Ok(Some(output))
            }
            Err(err) => {
                warn!(error = %err, "script failed");
                self.record(format!("Script execution error: {}", err));
                Err(err.into())
            }
        }
    }

    /// Write the document as indented UTF-8 XML with a declaration
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.loaded()?.document.save(path)?;
        self.record(format!("Saved XML to: {}", path.display()));
        Ok(())
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn record(&mut self, message: String) {
        self.log.push(LogEntry {
            timestamp: Local::now(),
            message,
        });
    }
}

/// Parse XML written back by a script, keeping a renamed prefix when it still applies
fn reload_edited(
    xml: &[u8],
    source_name: &str,
    previous_prefix: Option<&str>,
) -> std::result::Result<LoadedDocument, ScriptError> {
    let invalid = |err: ParseError| ScriptError::InvalidOutput {
        details: err.to_string(),
    };
    let document = Document::parse_bytes(xml, source_name).map_err(invalid)?;
    let mut loaded = LoadedDocument::normalize(document).map_err(invalid)?;

    if let Some(prefix) = previous_prefix {
        if loaded.is_valid_new_prefix(prefix) {
            loaded
                .rename_prefix(prefix)
                .map_err(|err| ScriptError::InvalidOutput {
                    details: err.to_string(),
                })?;
        }
    }
    Ok(loaded)
}
