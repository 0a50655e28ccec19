// Argument coercion: raw, weakly-typed call arguments to the values a
// handler's parameter list expects

use crate::error::CoercionError;
use crate::schema::{ParameterSpec, SemanticType};
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

/// Coerced positional arguments handed to a handler
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    names: Vec<String>,
    values: Vec<Value>,
}

impl Arguments {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Deserialize the argument at `index`.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> anyhow::Result<T> {
        let value = self
            .values
            .get(index)
            .with_context(|| format!("no argument at position {}", index))?;
        let name = self.names.get(index).map(String::as_str).unwrap_or("?");
        serde_json::from_value(value.clone())
            .with_context(|| format!("argument '{}' has an unexpected shape", name))
    }

    /// Deserialize the argument bound to parameter `name`.
    pub fn get_named<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<T> {
        let index = self
            .names
            .iter()
            .position(|n| n == name)
            .with_context(|| format!("no parameter named '{}'", name))?;
        self.get(index)
    }
}

/// Coerce a raw argument mapping against a parameter list. The result follows
/// the parameter order, not the order of the raw keys.
pub fn coerce_arguments(
    specs: &[ParameterSpec],
    raw: Option<&Value>,
) -> Result<Arguments, CoercionError> {
    let empty = Map::new();
    let raw = match raw {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(map)) => map,
        Some(Value::Array(items)) if items.is_empty() => &empty,
        // A non-empty list is a mapping keyed by position.
        Some(Value::Array(_)) => {
            return Err(CoercionError::NonStringKey {
                key: "0".to_string(),
            })
        }
        Some(other) => {
            return Err(CoercionError::NotAMapping {
                found: describe(other),
            })
        }
    };

    for key in raw.keys() {
        if !specs.iter().any(|spec| &spec.name == key) {
            tracing::debug!(argument = %key, "Ignoring undeclared argument");
        }
    }

    let mut arguments = Arguments::default();
    for spec in specs {
        let value = match raw.get(&spec.name) {
            Some(value) if !value.is_null() => coerce_value(spec, value)?,
            _ if spec.required => {
                return Err(CoercionError::MissingRequired {
                    parameter: spec.name.clone(),
                })
            }
            _ => spec.default.clone().unwrap_or(Value::Null),
        };
        arguments.names.push(spec.name.clone());
        arguments.values.push(value);
    }

    Ok(arguments)
}

/// Convert one raw value to the parameter's semantic type.
pub fn coerce_value(spec: &ParameterSpec, raw: &Value) -> Result<Value, CoercionError> {
    let converted = match spec.semantic_type {
        SemanticType::Number => to_number(raw),
        SemanticType::Boolean => to_boolean(raw),
        SemanticType::String => to_string(raw),
        SemanticType::Object => to_object(raw),
    };

    converted.ok_or_else(|| CoercionError::TypeMismatch {
        parameter: spec.name.clone(),
        expected: spec.semantic_type,
        found: describe(raw),
    })
}

fn to_number(raw: &Value) -> Option<Value> {
    match raw {
        Value::Number(_) => Some(raw.clone()),
        Value::String(text) => parse_number(text.trim()).map(Value::Number),
        _ => None,
    }
}

fn parse_number(text: &str) -> Option<Number> {
    if let Ok(int) = text.parse::<i64>() {
        return Some(Number::from(int));
    }
    if let Ok(uint) = text.parse::<u64>() {
        return Some(Number::from(uint));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

fn to_boolean(raw: &Value) -> Option<Value> {
    match raw {
        Value::Bool(_) => Some(raw.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(v) if v == 0.0 => Some(Value::Bool(false)),
            Some(v) if v == 1.0 => Some(Value::Bool(true)),
            _ => None,
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(Value::Bool(true)),
            "false" | "0" | "no" | "off" | "" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn to_string(raw: &Value) -> Option<Value> {
    match raw {
        Value::String(_) => Some(raw.clone()),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

fn to_object(raw: &Value) -> Option<Value> {
    match raw {
        Value::Object(_) | Value::Array(_) => Some(raw.clone()),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => Some(parsed),
            _ => None,
        },
        _ => None,
    }
}

/// Longest string quoted verbatim in an error message
const PREVIEW_CHARS: usize = 40;

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) if s.chars().count() > PREVIEW_CHARS => {
            let preview: String = s.chars().take(PREVIEW_CHARS).collect();
            format!("string {:?}... ({} bytes)", preview, s.len())
        }
        Value::String(s) => format!("string {:?}", s),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}
