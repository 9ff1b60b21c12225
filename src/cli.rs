//! CLI utilities for the driver.
//!
//! The utilities in this module back an interactive client: a prompt that
//! reads one command per line, where dot-commands manage tables and any
//! other input is taken as a raw JSON expression to evaluate on the
//! server.
use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::term::{MetaQuery, Query, Term};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("unrecognized command '{0}'")]
    UnrecognizedCommand(String),

    #[error("invalid '{command}' command, {reason}")]
    InvalidCommandArguments { command: String, reason: String },

    #[error("no command provided")]
    Empty,

    #[error("failed to read input: {0}")]
    Io(#[from] io::Error),
}

/// Possible commands from a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Exit command `.exit`
    Exit,
    /// List tables on the server `.tables`
    Tables,
    /// Create a table `.create NAME`
    CreateTable(String),
    /// Drop a table `.drop NAME`
    DropTable(String),
    /// A raw JSON expression to evaluate
    Eval(String),
}

impl Command {
    /// The query this command submits, or `None` for `.exit`.
    pub fn into_query(self) -> Option<Query> {
        match self {
            Command::Exit => None,
            Command::Tables => Some(Query::Meta(MetaQuery::ListTables)),
            Command::CreateTable(name) => Some(Query::Meta(MetaQuery::CreateTable(name))),
            Command::DropTable(name) => Some(Query::Meta(MetaQuery::DropTable(name))),
            Command::Eval(text) => Some(Query::Read(Term::Json(text))),
        }
    }
}

impl TryFrom<&str> for Command {
    type Error = CliError;

    fn try_from(line: &str) -> Result<Self, Self::Error> {
        match line.trim() {
            "" => Err(CliError::Empty),
            ".exit" => Ok(Command::Exit),
            ".tables" => Ok(Command::Tables),
            s if s.starts_with(".create") => named_table_command(s, ".create")
                .map(Command::CreateTable),
            s if s.starts_with(".drop") => named_table_command(s, ".drop").map(Command::DropTable),
            s if s.starts_with('.') => Err(CliError::UnrecognizedCommand(s.to_string())),
            s => Ok(Command::Eval(s.to_string())),
        }
    }
}

fn named_table_command(line: &str, command: &str) -> Result<String, CliError> {
    let mut parts = line.split_whitespace().skip(1);
    match parts.next() {
        Some(name) if parts.next().is_none() => Ok(name.to_string()),
        _ => Err(CliError::InvalidCommandArguments {
            command: command.to_string(),
            reason: format!("requires exactly one table name. Example: {command} users"),
        }),
    }
}

/// Prompt the user for the next command. End of input reads as `.exit`.
pub fn prompt<R, W>(reader: &mut R, writer: &mut W) -> Result<Command, CliError>
where
    R: BufRead,
    W: Write,
{
    write!(writer, "> ")?;
    writer.flush()?;

    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(Command::Exit);
    }
    line.as_str().try_into()
}
