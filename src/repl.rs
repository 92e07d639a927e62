//! Line commands understood by the interactive prompt
//!
//! A line starting with `:` is a command; any other non-empty line is an
//! XPath expression to evaluate.

use std::path::PathBuf;
use std::str::FromStr;

use crate::buffer::BufferKind;

pub const HELP: &str = "\
Commands:
  <expr>              evaluate an XPath expression
  :open PATH          load an XML file
  :xpath EXPR         set the expression buffer and evaluate it
  :run                evaluate the expression buffer again
  :ns [PREFIX]        show or rename the default-namespace prefix
  :undo [BUFFER]      undo in query, xpath (default) or code
  :redo [BUFFER]      redo in query, xpath (default) or code
  :clear [BUFFER]     empty a buffer, keeping its history
  :code [TEXT]        show or set the script (\\n starts a new line)
  :exec               run the script
  :ask PROMPT         ask the assistant
  :structure          print the tag outline
  :save PATH          write the document
  :log [clear]        show or clear the output log
  :help               show this text
  :quit               leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Evaluate(String),
    Open(PathBuf),
    Rerun,
    ShowNamespaces,
    RenamePrefix(String),
    Undo(BufferKind),
    Redo(BufferKind),
    Clear(BufferKind),
    ShowScript,
    SetScript(String),
    Exec,
    Ask(String),
    Structure,
    Save(PathBuf),
    ShowLog,
    ClearLog,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err("Empty command".to_string());
        }
        let Some(command) = line.strip_prefix(':') else {
            return Ok(Command::Evaluate(line.to_string()));
        };

        let (name, argument) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };
        let required = |what: &str| {
            if argument.is_empty() {
                Err(format!(":{} needs {}", name, what))
            } else {
                Ok(argument.to_string())
            }
        };
        let buffer = || {
            if argument.is_empty() {
                Ok(BufferKind::Expression)
            } else {
                argument.parse()
            }
        };

        match name {
            "open" | "o" => required("a path").map(|path| Command::Open(PathBuf::from(path))),
            "xpath" | "x" => required("an expression").map(Command::Evaluate),
            "run" | "r" => Ok(Command::Rerun),
            "ns" => Ok(if argument.is_empty() {
                Command::ShowNamespaces
            } else {
                Command::RenamePrefix(argument.to_string())
            }),
            "undo" | "u" => buffer().map(Command::Undo),
            "redo" => buffer().map(Command::Redo),
            "clear" => buffer().map(Command::Clear),
            "code" => Ok(if argument.is_empty() {
                Command::ShowScript
            } else {
                Command::SetScript(argument.replace("\\n", "\n"))
            }),
            "exec" | "e" => Ok(Command::Exec),
            "ask" | "a" => required("a prompt").map(Command::Ask),
            "structure" | "s" => Ok(Command::Structure),
            "save" => required("a path").map(|path| Command::Save(PathBuf::from(path))),
            "log" => match argument {
                "" => Ok(Command::ShowLog),
                "clear" => Ok(Command::ClearLog),
                other => Err(format!("Unknown :log argument: {}", other)),
            },
            "help" | "h" | "?" => Ok(Command::Help),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            other => Err(format!("Unknown command :{} (try :help)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        line.parse().unwrap()
    }

    #[test]
    fn test_bare_line_is_expression() {
        assert_eq!(parse("  //ns:a  "), Command::Evaluate("//ns:a".to_string()));
        assert_eq!(parse(":xpath count(//a)"), Command::Evaluate("count(//a)".to_string()));
    }

    #[test]
    fn test_buffer_commands_default_to_expression() {
        assert_eq!(parse(":undo"), Command::Undo(BufferKind::Expression));
        assert_eq!(parse(":redo code"), Command::Redo(BufferKind::Script));
        assert_eq!(parse(":clear query"), Command::Clear(BufferKind::Query));
        assert!(":undo window".parse::<Command>().is_err());
    }

    #[test]
    fn test_namespace_commands() {
        assert_eq!(parse(":ns"), Command::ShowNamespaces);
        assert_eq!(parse(":ns d"), Command::RenamePrefix("d".to_string()));
    }

    #[test]
    fn test_script_commands() {
        assert_eq!(parse(":code"), Command::ShowScript);
        assert_eq!(
            parse(r":code import sys\nprint(sys.stdin.read())"),
            Command::SetScript("import sys\nprint(sys.stdin.read())".to_string())
        );
        assert_eq!(parse(":exec"), Command::Exec);
    }

    #[test]
    fn test_path_commands() {
        assert_eq!(parse(":open data/a b.xml"), Command::Open(PathBuf::from("data/a b.xml")));
        assert_eq!(parse(":save out.xml"), Command::Save(PathBuf::from("out.xml")));
        assert!(":open".parse::<Command>().is_err());
        assert!(":ask".parse::<Command>().is_err());
    }

    #[test]
    fn test_misc_commands() {
        assert_eq!(parse(":ask find titles"), Command::Ask("find titles".to_string()));
        assert_eq!(parse(":structure"), Command::Structure);
        assert_eq!(parse(":log"), Command::ShowLog);
        assert_eq!(parse(":log clear"), Command::ClearLog);
        assert_eq!(parse(":q"), Command::Quit);
        assert_eq!(parse(":help"), Command::Help);
        assert!(":frobnicate".parse::<Command>().is_err());
        assert!("   ".parse::<Command>().is_err());
    }
}
