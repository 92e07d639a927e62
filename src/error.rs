use std::path::PathBuf;

use thiserror::Error;

/// Main application error type that encompasses all possible failure modes
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Prefix(#[from] PrefixError),

    #[error(transparent)]
    Assistant(#[from] AssistantError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No document loaded")]
    NoDocument,

    #[error("Serialization error: {details}")]
    Serialization { details: String },

    #[error("LibXML2 internal error: {details}")]
    LibXml2Internal { details: String },
}

/// Malformed or unreadable input document
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Cannot read XML file: {path} - {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML parsing failed: {source_name} - {details}")]
    Malformed { source_name: String, details: String },

    #[error("XML document has no root element: {source_name}")]
    NoRootElement { source_name: String },
}

/// Invalid or unsupported XPath expression
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid XPath expression '{expression}': {details}")]
    Invalid { expression: String, details: String },

    #[error("Namespace prefix could not be registered: {prefix} -> {uri}")]
    Registration { prefix: String, uri: String },

    #[error("XPath context creation failed")]
    ContextCreation,

    #[error("Unsupported XPath result type {code} for '{expression}'")]
    UnsupportedResult { expression: String, code: i32 },
}

/// Failure raised by an externally executed user script
#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("Script interpreter could not be started: {command} - {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Script exited with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },

    #[error("Script execution is not configured")]
    NotConfigured,

    #[error("Script produced an invalid document: {details}")]
    InvalidOutput { details: String },

    #[error("Script output could not be read: {0}")]
    Io(#[from] std::io::Error),

    #[error("Script error: {0}")]
    Other(String),
}

/// Rejected rename of the synthesized default-namespace prefix
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PrefixError {
    #[error("Document has no default namespace to rename")]
    NoDefaultNamespace,

    #[error("Invalid namespace prefix: '{prefix}'")]
    InvalidName { prefix: String },

    #[error("Namespace prefix already in use: '{prefix}'")]
    Collision { prefix: String },

    #[error("Unknown namespace prefix: '{prefix}'")]
    Unknown { prefix: String },
}

/// Query assistant failures
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Assistant API key is not set (expected in ${env_var})")]
    MissingApiKey { env_var: String },

    #[error("Assistant request timed out after {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },

    #[error("Assistant HTTP status error: {status} - {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Invalid assistant response: {details}")]
    InvalidResponse { details: String },
}

/// Configuration-specific error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Parse result type alias
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Query result type alias
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_error_display() {
        let malformed = ParseError::Malformed {
            source_name: "broken.xml".to_string(),
            details: "Opening and ending tag mismatch".to_string(),
        };
        assert!(malformed.to_string().contains("XML parsing failed"));
        assert!(malformed.to_string().contains("broken.xml"));
        assert!(malformed.to_string().contains("tag mismatch"));

        let unreadable = ParseError::Unreadable {
            path: PathBuf::from("/missing/file.xml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
        };
        assert!(unreadable.to_string().contains("/missing/file.xml"));
    }

    #[test]
    fn test_query_error_display() {
        let invalid = QueryError::Invalid {
            expression: "//a[".to_string(),
            details: "Invalid predicate".to_string(),
        };
        assert!(invalid.to_string().contains("//a["));
        assert!(invalid.to_string().contains("Invalid predicate"));

        let unsupported = QueryError::UnsupportedResult {
            expression: "foo()".to_string(),
            code: 7,
        };
        assert!(unsupported.to_string().contains('7'));
    }

    #[test]
    fn test_prefix_error_display() {
        let collision = PrefixError::Collision {
            prefix: "xs".to_string(),
        };
        assert!(collision.to_string().contains("already in use"));
        assert!(collision.to_string().contains("xs"));

        let invalid = PrefixError::InvalidName {
            prefix: "1abc".to_string(),
        };
        assert!(invalid.to_string().contains("1abc"));
    }

    #[test]
    fn test_assistant_error_display() {
        let missing = AssistantError::MissingApiKey {
            env_var: "OPENAI_API_KEY".to_string(),
        };
        assert!(missing.to_string().contains("$OPENAI_API_KEY"));

        let status = AssistantError::HttpStatus {
            status: 401,
            message: "Unauthorized".to_string(),
        };
        assert!(status.to_string().contains("401"));
    }

    #[test]
    fn test_script_error_display() {
        let failed = ScriptError::Failed {
            status: 2,
            stderr: "NameError".to_string(),
        };
        assert!(failed.to_string().contains("status 2"));
        assert!(failed.to_string().contains("NameError"));
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Access denied");
        assert!(matches!(Error::from(io_error), Error::Io(_)));

        let query_error = QueryError::ContextCreation;
        assert!(matches!(Error::from(query_error), Error::Query(_)));

        let config_error = ConfigError::Validation("bad".to_string());
        match Error::from(config_error) {
            Error::Config(message) => assert!(message.contains("bad")),
            other => panic!("Expected Error::Config, got {:?}", other),
        }
    }

    #[test]
    fn test_transparent_display() {
        let error: Error = PrefixError::NoDefaultNamespace.into();
        assert_eq!(error.to_string(), "Document has no default namespace to rename");
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error as _;

        let error = ParseError::Unreadable {
            path: PathBuf::from("a.xml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "File not found"),
        };
        let source = error.source().expect("io source");
        assert_eq!(source.to_string(), "File not found");
    }
}
