use std::path::PathBuf;

use thiserror::Error;

pub const HELP_TEXT: &str = "\
Commands:
  add <path>...      add video files (.mp4 .avi .mov .mkv)
  select <n|path>    select a clip by list number or path
  deselect           clear the selection
  remove             remove the selected clip from the list
  generate           generate a label for the selected clip
  label <text>       edit the label of the selected clip
  save               rename the selected clip using its label
  revert             undo the rename of the selected clip
  list               show all clips
  help               show this help
  quit               exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectTarget {
    /// 1-based position in the list.
    Index(usize),
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    Add(Vec<PathBuf>),
    Select(SelectTarget),
    Deselect,
    Remove,
    Generate,
    Label(String),
    Save,
    Revert,
    List,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command '{0}'. Type 'help' for a list of commands.")]
    Unknown(String),
    #[error("'{0}' needs an argument. Type 'help' for usage.")]
    MissingArgument(&'static str),
    #[error("Unterminated quote in: {0}")]
    UnterminatedQuote(String),
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<UiCommand>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "add" => {
            let paths: Vec<PathBuf> = split_args(rest)?.into_iter().map(PathBuf::from).collect();
            if paths.is_empty() {
                return Err(CommandError::MissingArgument("add"));
            }
            UiCommand::Add(paths)
        }
        "select" => {
            let mut args = split_args(rest)?;
            if args.len() != 1 {
                return Err(CommandError::MissingArgument("select"));
            }
            let arg = args.remove(0);
            match arg.parse::<usize>() {
                Ok(index) => UiCommand::Select(SelectTarget::Index(index)),
                Err(_) => UiCommand::Select(SelectTarget::Path(PathBuf::from(arg))),
            }
        }
        "deselect" => UiCommand::Deselect,
        "remove" | "rm" => UiCommand::Remove,
        "generate" | "gen" => UiCommand::Generate,
        // The label is taken verbatim so an empty one reaches validation.
        "label" => UiCommand::Label(rest.to_string()),
        "save" => UiCommand::Save,
        "revert" | "undo" => UiCommand::Revert,
        "list" | "ls" => UiCommand::List,
        "help" | "?" => UiCommand::Help,
        "quit" | "exit" | "q" => UiCommand::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

// Whitespace separated arguments; double quotes group arguments containing spaces.
fn split_args(input: &str) -> Result<Vec<String>, CommandError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if in_quotes {
        return Err(CommandError::UnterminatedQuote(input.to_string()));
    }
    if has_token {
        args.push(current);
    }
    Ok(args)
}
