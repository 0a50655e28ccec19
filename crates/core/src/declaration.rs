// Operation declarations: the metadata that marks a handler as a tool,
// prompt or resource

use serde::{Deserialize, Serialize};

pub const DEFAULT_MIME_TYPE: &str = "text/plain";

/// The three operation classes a service can expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Tool,
    Prompt,
    Resource,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Tool => "tool",
            Self::Prompt => "prompt",
            Self::Resource => "resource",
        };
        f.write_str(label)
    }
}

/// Declaration attached to one handler.
///
/// Tools and prompts are keyed by `name`; resources are keyed by `uri` and use
/// `name` as their display name. `parameters` holds the explicit parameter
/// (or prompt argument) map when one was declared; it is validated when the
/// registry is built, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub kind: OperationKind,
    pub name: String,
    pub uri: Option<String>,
    pub description: String,
    pub mime_type: Option<String>,
    pub parameters: Option<serde_json::Value>,
}

impl Declaration {
    pub fn tool(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Tool,
            name: name.into(),
            uri: None,
            description: description.into(),
            mime_type: None,
            parameters: None,
        }
    }

    pub fn prompt(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Prompt,
            ..Self::tool(name, description)
        }
    }

    pub fn resource(
        uri: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind: OperationKind::Resource,
            name: name.into(),
            uri: Some(uri.into()),
            description: description.into(),
            mime_type: Some(DEFAULT_MIME_TYPE.to_string()),
            parameters: None,
        }
    }

    /// Attach an explicit parameter map, e.g.
    /// `json!({"text": {"type": "string", "description": "...", "required": true}})`.
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Registry key: the uri for resources, the name otherwise.
    pub fn key(&self) -> &str {
        match self.kind {
            OperationKind::Resource => self.uri.as_deref().unwrap_or_default(),
            OperationKind::Tool | OperationKind::Prompt => &self.name,
        }
    }

    pub fn mime_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or(DEFAULT_MIME_TYPE)
    }

    /// True when an explicit map was declared and it has at least one entry.
    pub fn has_explicit_parameters(&self) -> bool {
        match &self.parameters {
            None => false,
            Some(serde_json::Value::Object(map)) => !map.is_empty(),
            Some(serde_json::Value::Array(items)) => !items.is_empty(),
            Some(serde_json::Value::Null) => false,
            Some(_) => true,
        }
    }
}
