//! Script execution collaborator
//!
//! Scripts never get access to the process. A [`ScriptRunner`] receives a
//! [`ScriptScope`]: the loaded document, its namespace bindings and the last
//! XPath expression with its results. [`CommandRunner`] hands that scope to an
//! external interpreter: the serialized document on stdin, everything else in
//! `XPATHFINDER_*` environment variables.
//!
//! A script edits the document by writing the new XML to the file named by
//! `XPATHFINDER_OUTPUT`. Nothing written there means the document is unchanged.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;

use tempfile::TempDir;

use tracing::{debug, warn};

use crate::document::Document;
use crate::error::ScriptError;
use crate::namespace::NamespaceMap;
use crate::output::render_value;
use crate::xpath::XPathValue;

pub const ENV_EXPRESSION: &str = "XPATHFINDER_EXPRESSION";
pub const ENV_NAMESPACES: &str = "XPATHFINDER_NAMESPACES";
pub const ENV_OUTPUT: &str = "XPATHFINDER_OUTPUT";
pub const ENV_RESULTS: &str = "XPATHFINDER_RESULTS";
pub const ENV_SOURCE: &str = "XPATHFINDER_SOURCE";

/// View of the session handed to a script
#[derive(Debug, Clone, Copy)]
pub struct ScriptScope<'a> {
    pub document: &'a Document,
    pub namespaces: Option<&'a NamespaceMap>,
    pub expression: Option<&'a str>,
}

impl<'a> ScriptScope<'a> {
    /// Re-evaluate the last expression; empty when none was run
    pub fn results(&self) -> Result<Vec<XPathValue<'a>>, ScriptError> {
        match self.expression {
            Some(expression) => self
                .document
                .xpath(expression, self.namespaces)
                .map_err(|err| ScriptError::Other(err.to_string())),
            None => Ok(Vec::new()),
        }
    }
}

/// Captured output of a successful script run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutput {
    pub stdout: String,
    pub stderr: String,
    /// Replacement document, unparsed
    pub document: Option<Vec<u8>>,
}

pub trait ScriptRunner {
    fn run(&mut self, script: &str, scope: &ScriptScope<'_>) -> Result<ScriptOutput, ScriptError>;
}

/// Runs `program args... <script>` as a child process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Command line as shown in logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Contents of the output file; missing or empty means no edit
    fn read_document(path: &Path) -> Result<Option<Vec<u8>>, ScriptError> {
        match fs::read(path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn environment(scope: &ScriptScope<'_>) -> Result<Vec<(&'static str, String)>, ScriptError> {
        let json = |err: serde_json::Error| ScriptError::Other(err.to_string());

        let namespaces: serde_json::Map<String, serde_json::Value> = scope
            .namespaces
            .map(|map| {
                map.iter()
                    .map(|(prefix, uri)| (prefix.to_string(), uri.into()))
                    .collect()
            })
            .unwrap_or_default();

        let results = scope
            .results()?
            .iter()
            .map(render_value)
            .collect::<crate::error::Result<Vec<String>>>()
            .map_err(|err| ScriptError::Other(err.to_string()))?;

        Ok(vec![
            (ENV_SOURCE, scope.document.source_name().to_string()),
            (ENV_EXPRESSION, scope.expression.unwrap_or_default().to_string()),
            (ENV_NAMESPACES, serde_json::to_string(&namespaces).map_err(json)?),
            (ENV_RESULTS, serde_json::to_string(&results).map_err(json)?),
        ])
    }
}

impl ScriptRunner for CommandRunner {
    fn run(&mut self, script: &str, scope: &ScriptScope<'_>) -> Result<ScriptOutput, ScriptError> {
        if self.program.trim().is_empty() {
            return Err(ScriptError::NotConfigured);
        }

        let input = scope
            .document
            .to_xml_string()
            .map_err(|err| ScriptError::Other(err.to_string()))?;

        let scratch = TempDir::new()?;
        let output_path = scratch.path().join("output.xml");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(script)
            .envs(Self::environment(scope)?)
            .env(ENV_OUTPUT, &output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(command = %self.command_line(), "spawning script interpreter");
        let mut child = command.spawn().map_err(|source| ScriptError::Spawn {
            command: self.command_line(),
            source,
        })?;

        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || match stdin.write_all(input.as_bytes()) {
                Err(err) if err.kind() != ErrorKind::BrokenPipe => Err(err),
                _ => Ok(()),
            })
        });

        let output = child.wait_with_output().map_err(|source| ScriptError::Spawn {
            command: self.command_line(),
            source,
        })?;

        if let Some(Ok(Err(err))) = writer.map(|handle| handle.join()) {
            warn!(error = %err, "failed to write document to script stdin");
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ScriptError::Failed {
                status: output.status.code().unwrap_or(-1),
                stderr: stderr.trim_end().to_string(),
            });
        }

        let document = Self::read_document(&output_path)?;
        debug!(
            stdout_bytes = stdout.len(),
            edited = document.is_some(),
            "script finished"
        );
        Ok(ScriptOutput {
            stdout,
            stderr,
            document,
        })
    }
}
