//! Simple Output and Reporting
//!
//! Renders XPath results, the session log and errors for the terminal.

use crate::cli::VerbosityLevel;
use crate::error::Result;
use crate::session::LogEntry;
use crate::strip::strip;
use crate::xpath::XPathValue;

/// Render one result item for display
///
/// Nodes are stripped of namespaces and pretty-printed; scalars follow the
/// XPath `string()` conversion.
pub fn render_value(value: &XPathValue<'_>) -> Result<String> {
    match value {
        XPathValue::Node(node) => strip(node).to_xml_string(),
        XPathValue::String(text) => Ok(text.clone()),
        XPathValue::Number(number) => Ok(format_number(*number)),
        XPathValue::Boolean(flag) => Ok(flag.to_string()),
    }
}

/// XPath 1.0 number-to-string conversion
pub fn format_number(number: f64) -> String {
    if number.is_nan() {
        "NaN".to_string()
    } else if number.is_infinite() {
        if number > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if number == 0.0 {
        "0".to_string()
    } else if number.fract() == 0.0 && number.abs() < 1e15 {
        format!("{}", number as i64)
    } else {
        format!("{}", number)
    }
}

/// Simple output formatter for human-readable results
pub struct Output {
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    /// Results plus, unless quiet, a count line
    pub fn format_evaluation(&self, expression: &str, rendered: &str, count: usize) -> String {
        let mut output = String::new();
        if !rendered.is_empty() {
            output.push_str(rendered);
            output.push('\n');
        }
        if self.verbosity >= VerbosityLevel::Normal {
            let summary = format!(
                "{} result{} for {}",
                count,
                if count == 1 { "" } else { "s" },
                expression
            );
            let color = if count == 0 { "33" } else { "32" };
            output.push_str(&self.colorize(&summary, color));
            output.push('\n');
        }
        output
    }

    pub fn format_error(&self, error: &dyn std::error::Error) -> String {
        let mut output = format!("{} {}", self.colorize("error:", "31"), error);
        if self.verbosity >= VerbosityLevel::Verbose {
            let mut source = error.source();
            while let Some(cause) = source {
                output.push_str(&format!("\n  caused by: {}", cause));
                source = cause.source();
            }
        }
        output
    }

    pub fn format_notice(&self, message: &str) -> String {
        if self.verbosity == VerbosityLevel::Quiet {
            String::new()
        } else {
            format!("{}\n", self.colorize(message, "36"))
        }
    }

    pub fn format_log(&self, entries: &[LogEntry]) -> String {
        let mut output = String::new();
        for entry in entries {
            let timestamp = entry.timestamp.format("%H:%M:%S").to_string();
            output.push_str(&format!(
                "{} {}\n",
                self.colorize(&timestamp, "90"),
                entry.message
            ));
        }
        output
    }
}
