//! Parsing of `TypeName key=value "positional" ...` command lines.

use std::fmt::Display;
use std::str::FromStr;

use crate::error::ActionError;

/// The action name and raw text parameters of one command line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionArgs {
    action: String,
    named: Vec<(String, String)>,
    positional: Vec<String>,
}

impl ActionArgs {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    /// Builder-style named parameter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }

    /// Split a command line into the action name and its parameters.
    /// Values may be double-quoted; `\"` and `\\` escape inside quotes.
    pub fn parse(line: &str) -> Result<Self, ActionError> {
        let mut tokens = tokenize(line)?.into_iter();
        let action = match tokens.next() {
            Some(Token { key: None, value }) => value,
            Some(Token { key: Some(_), .. }) => {
                return Err(ActionError::Syntax("line must start with an action name".into()))
            }
            None => return Err(ActionError::Syntax("empty command".into())),
        };
        let mut args = Self::new(action);
        for token in tokens {
            match token.key {
                Some(key) => args.named.push((key, token.value)),
                None => args.positional.push(token.value),
            }
        }
        Ok(args)
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Assign positional values to `names` in order. A name given both ways
    /// is an error.
    pub fn bind_positional(&mut self, names: &[&str]) -> Result<(), ActionError> {
        if self.positional.len() > names.len() {
            return Err(ActionError::Syntax(format!(
                "{} takes at most {} positional parameters",
                self.action,
                names.len()
            )));
        }
        for (value, name) in std::mem::take(&mut self.positional).into_iter().zip(names) {
            if self.get(name).is_some() {
                return Err(ActionError::Syntax(format!(
                    "{}: parameter '{}' given twice",
                    self.action, name
                )));
            }
            self.named.push((name.to_string(), value));
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.named
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.named.iter().map(|(k, _)| k.as_str())
    }

    pub fn require(&self, name: &str) -> Result<&str, ActionError> {
        self.get(name).ok_or_else(|| ActionError::MissingParameter {
            action: self.action.clone(),
            param: name.to_string(),
        })
    }

    pub fn parse_param<T>(&self, name: &str) -> Result<T, ActionError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.require(name)?;
        self.convert(name, raw)
    }

    pub fn parse_optional<T>(&self, name: &str) -> Result<Option<T>, ActionError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(name).map(|raw| self.convert(name, raw)).transpose()
    }

    fn convert<T>(&self, name: &str, raw: &str) -> Result<T, ActionError>
    where
        T: FromStr,
        T::Err: Display,
    {
        raw.trim().parse::<T>().map_err(|e| ActionError::InvalidParameter {
            action: self.action.clone(),
            param: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Reject parameter names outside `allowed`.
    pub fn check_names(&self, allowed: &[&str]) -> Result<(), ActionError> {
        match self.names().find(|n| !allowed.contains(n)) {
            Some(unknown) => Err(ActionError::InvalidParameter {
                action: self.action.clone(),
                param: unknown.to_string(),
                reason: "unknown parameter".into(),
            }),
            None => Ok(()),
        }
    }
}

struct Token {
    key: Option<String>,
    value: String,
}

fn tokenize(line: &str) -> Result<Vec<Token>, ActionError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = None;
        let mut buf = String::new();
        let mut quoted = false;
        while let Some(&c) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            chars.next();
            match c {
                '"' => {
                    quoted = true;
                    read_quoted(&mut chars, &mut buf)?;
                }
                '=' if key.is_none() && !quoted => {
                    if buf.is_empty() {
                        return Err(ActionError::Syntax("parameter name missing before '='".into()));
                    }
                    key = Some(std::mem::take(&mut buf));
                }
                _ => buf.push(c),
            }
        }
        tokens.push(Token { key, value: buf });
    }
    Ok(tokens)
}

fn read_quoted(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    buf: &mut String,
) -> Result<(), ActionError> {
    while let Some(c) = chars.next() {
        match c {
            '"' => return Ok(()),
            '\\' => match chars.next() {
                Some(escaped) => buf.push(escaped),
                None => break,
            },
            _ => buf.push(c),
        }
    }
    Err(ActionError::Syntax("unterminated quote".into()))
}
