use std::fmt;
use std::io;

use lamina_core::ActionError;

/// One input line, either a console command or an action to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Empty,
    Help,
    /// List registered actions with their parameters.
    List,
    /// Dump states, optionally only those whose id starts with a prefix.
    States(Option<&'a str>),
    Get(&'a str),
    Layers,
    Windows,
    Quit,
    Action(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Command::Empty;
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let arg = (!rest.is_empty()).then_some(rest);
        match (word, arg) {
            ("help" | "?", None) => Command::Help,
            ("list", None) => Command::List,
            ("states", arg) => Command::States(arg),
            ("get", Some(id)) => Command::Get(id),
            ("layers", None) => Command::Layers,
            ("windows", None) => Command::Windows,
            ("quit" | "exit", None) => Command::Quit,
            _ => Command::Action(line),
        }
    }
}

pub const HELP: &str = "\
commands:
  help                 this text
  list                 registered actions and their parameters
  states [prefix]      current value of every state
  get <stateid>        current value of one state
  layers               layers, bottom first
  windows              registered window ids
  quit                 leave
anything else is dispatched as an action, e.g.
  NewLayer brain dims=32x32x16
  ActivateLayer layer=1
  Set stateid=layer_1::opacity value=0.5";

#[derive(Debug)]
pub enum CommandError {
    Io(io::Error),
    /// A script line could not be turned into an action.
    Script { line: usize, source: ActionError },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{}", e),
            Self::Script { line, source } => write!(f, "line {}: {}", line, source),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Script { source, .. } => Some(source),
        }
    }
}

impl From<io::Error> for CommandError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
