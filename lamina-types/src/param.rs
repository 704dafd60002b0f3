use serde::{Deserialize, Serialize};

use crate::LayerId;

/// A typed value carried by an action parameter or returned as an action result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Layer(LayerId),
}

impl ParamValue {
    pub fn as_layer(&self) -> Option<LayerId> {
        match self {
            ParamValue::Layer(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text form used on the command line. Strings containing whitespace or
    /// quotes are quoted so they survive re-parsing.
    pub fn to_arg_string(&self) -> String {
        match self {
            ParamValue::Bool(v) => v.to_string(),
            ParamValue::Int(v) => v.to_string(),
            ParamValue::Float(v) => v.to_string(),
            ParamValue::Layer(id) => id.to_string(),
            ParamValue::Text(s) => {
                if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\') {
                    let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
                    format!("\"{}\"", escaped)
                } else {
                    s.clone()
                }
            }
        }
    }
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Text(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.to_arg_string()),
        }
    }
}

impl From<LayerId> for ParamValue {
    fn from(id: LayerId) -> Self {
        ParamValue::Layer(id)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}
