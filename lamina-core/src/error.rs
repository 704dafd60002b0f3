//! Error types for state access and action construction.

use std::fmt;

/// Error from reading or writing a state variable through its text form.
#[derive(Debug)]
pub enum StateError {
    /// No registered state has this id.
    UnknownState(String),
    /// The text could not be decoded into the state's value type.
    Parse { state: String, source: serde_json::Error },
    /// The state is maintained by its owner and cannot be written as text.
    ReadOnly(String),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownState(id) => write!(f, "StateID: '{}' is invalid", id),
            Self::Parse { state, source } => {
                write!(f, "could not parse value for '{}': {}", state, source)
            }
            Self::ReadOnly(id) => write!(f, "StateID: '{}' is read-only", id),
        }
    }
}

impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse { source, .. } => Some(source),
            Self::UnknownState(_) | Self::ReadOnly(_) => None,
        }
    }
}

/// Error from turning a command line or argument list into an action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionError {
    /// The command line was empty or malformed.
    Syntax(String),
    /// No factory is registered under this type name.
    UnknownAction(String),
    /// A required parameter was not supplied.
    MissingParameter { action: String, param: String },
    /// A parameter was supplied but could not be converted.
    InvalidParameter { action: String, param: String, reason: String },
    /// The action's factory requires live handles and has no text form.
    NotScriptable(String),
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax(msg) => write!(f, "syntax error: {}", msg),
            Self::UnknownAction(name) => write!(f, "unknown action '{}'", name),
            Self::MissingParameter { action, param } => {
                write!(f, "{}: missing parameter '{}'", action, param)
            }
            Self::InvalidParameter { action, param, reason } => {
                write!(f, "{}: invalid parameter '{}': {}", action, param, reason)
            }
            Self::NotScriptable(name) => {
                write!(f, "action '{}' can only be created programmatically", name)
            }
        }
    }
}

impl std::error::Error for ActionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let e = ActionError::MissingParameter {
            action: "ActivateLayer".into(),
            param: "layer".into(),
        };
        assert_eq!(e.to_string(), "ActivateLayer: missing parameter 'layer'");
        assert_eq!(
            StateError::UnknownState("view::zoom".into()).to_string(),
            "StateID: 'view::zoom' is invalid"
        );
    }
}
