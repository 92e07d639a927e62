use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show results and errors
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show detailed information
    Verbose,
    /// Show all available debugging information
    Debug,
}

impl VerbosityLevel {
    /// Default `tracing` filter directive for this level
    pub fn log_filter(self) -> &'static str {
        match self {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "xpathfinder=info",
            VerbosityLevel::Debug => "xpathfinder=debug",
        }
    }
}

/// Explore XML documents with XPath, scripts and a query assistant
#[derive(Parser, Debug, Clone)]
#[command(name = "xpathfinder")]
#[command(
    about = "Explore XML documents with XPath, namespace-aware loading and an optional query assistant"
)]
#[command(version)]
pub struct Cli {
    /// XML file to open
    #[arg(help = "XML file to open")]
    pub file: Option<PathBuf>,

    /// Configuration file (TOML or JSON)
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Enable verbose output (repeat for debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Enable quiet mode (results and errors only)
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Quiet mode",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,

    /// Assistant model name
    #[arg(long = "model")]
    pub model: Option<String>,

    /// Base URL of the OpenAI-compatible assistant API
    #[arg(long = "base-url")]
    pub base_url: Option<String>,

    /// Assistant request timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// Evaluate one XPath expression against FILE and exit
    #[arg(short = 'x', long = "xpath", value_name = "EXPR", requires = "file")]
    pub expression: Option<String>,

    /// Print the structure outline of FILE and exit
    #[arg(long = "structure", requires = "file")]
    pub structure: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        match (self.quiet, self.verbose) {
            (true, _) => VerbosityLevel::Quiet,
            (false, 0) => VerbosityLevel::Normal,
            (false, 1) => VerbosityLevel::Verbose,
            (false, _) => VerbosityLevel::Debug,
        }
    }

    /// One-shot mode: evaluate or summarize, then exit without a REPL
    pub fn is_one_shot(&self) -> bool {
        self.expression.is_some() || self.structure
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(file) = &self.file
            && !file.is_file()
        {
            return Err(format!("File does not exist: {}", file.display()));
        }
        if self.timeout == Some(0) {
            return Err("Timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}
