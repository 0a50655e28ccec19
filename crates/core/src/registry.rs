// Operation registry: the immutable per-service index of tools, prompts and
// resources, with listing payloads computed once at build time

use crate::coerce::Arguments;
use crate::declaration::{Declaration, OperationKind};
use crate::error::RegistryError;
use crate::protocol::{
    GetPromptResult, ListPromptsResult, ListResourcesResult, ListToolsResult, ToolContent,
};
use crate::schema::{self, ParameterSpec};
use crate::signature::FormalParameter;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Business method bound to a declaration
pub type Handler = Arc<dyn Fn(Arguments) -> anyhow::Result<Reply> + Send + Sync>;

/// A service whose operations are exposed through the registry
pub trait Service: Send + Sync + 'static {
    /// Declare every operation of this service on `registry`.
    fn declare(self: Arc<Self>, registry: &mut RegistryBuilder);
}

/// Value returned by a handler
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A plain value; rendered as text by the dispatcher.
    Value(Value),
    /// Ready-made tool content blocks.
    Content(Vec<ToolContent>),
    /// A complete prompt result, passed through unchanged.
    Prompt(GetPromptResult),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Value(Value::String(text.into()))
    }

    /// Render the reply as a single text body.
    pub fn into_text(self) -> String {
        match self {
            Self::Value(value) => render_value(value),
            Self::Content(content) => join_text(content.iter()),
            Self::Prompt(result) => join_text(result.messages.iter().map(|m| &m.content)),
        }
    }
}

fn render_value(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
        }
    }
}

fn join_text<'a>(content: impl Iterator<Item = &'a ToolContent>) -> String {
    content
        .filter_map(|c| match c {
            ToolContent::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<i64> for Reply {
    fn from(n: i64) -> Self {
        Self::Value(n.into())
    }
}

impl From<f64> for Reply {
    fn from(n: f64) -> Self {
        Self::Value(n.into())
    }
}

impl From<bool> for Reply {
    fn from(b: bool) -> Self {
        Self::Value(b.into())
    }
}

impl From<ToolContent> for Reply {
    fn from(content: ToolContent) -> Self {
        Self::Content(vec![content])
    }
}

impl From<GetPromptResult> for Reply {
    fn from(result: GetPromptResult) -> Self {
        Self::Prompt(result)
    }
}

/// A declaration bound to its handler and resolved parameters
#[derive(Clone)]
pub struct OperationEntry {
    declaration: Declaration,
    parameters: Vec<ParameterSpec>,
    handler: Handler,
}

impl OperationEntry {
    pub fn declaration(&self) -> &Declaration {
        &self.declaration
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn invoke(&self, arguments: Arguments) -> anyhow::Result<Reply> {
        (self.handler)(arguments)
    }
}

impl std::fmt::Debug for OperationEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationEntry")
            .field("declaration", &self.declaration)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Entries of one kind, in registration order, indexed by key
#[derive(Debug, Default)]
struct OperationTable {
    entries: Vec<OperationEntry>,
    index: HashMap<String, usize>,
}

impl OperationTable {
    fn insert(&mut self, entry: OperationEntry) -> Result<(), RegistryError> {
        let key = entry.declaration.key().to_string();
        if self.index.contains_key(&key) {
            return Err(RegistryError::Duplicate {
                kind: entry.declaration.kind,
                key,
            });
        }
        self.index.insert(key, self.entries.len());
        self.entries.push(entry);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<&OperationEntry> {
        self.index.get(key).map(|&i| &self.entries[i])
    }
}

struct PendingOperation {
    declaration: Declaration,
    signature: Vec<FormalParameter>,
    handler: Handler,
}

/// Collects declarations; nothing is validated until [`RegistryBuilder::build`].
#[derive(Default)]
pub struct RegistryBuilder {
    pending: Vec<PendingOperation>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a declaration
    pub fn register<F>(
        &mut self,
        declaration: Declaration,
        signature: impl IntoIterator<Item = FormalParameter>,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(Arguments) -> anyhow::Result<Reply> + Send + Sync + 'static,
    {
        self.register_handler(declaration, signature, Arc::new(handler))
    }

    /// Register an already shared handler, e.g. one method exposed as both a
    /// tool and a prompt.
    pub fn register_handler(
        &mut self,
        declaration: Declaration,
        signature: impl IntoIterator<Item = FormalParameter>,
        handler: Handler,
    ) -> &mut Self {
        self.pending.push(PendingOperation {
            declaration,
            signature: signature.into_iter().collect(),
            handler,
        });
        self
    }

    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut tools = OperationTable::default();
        let mut prompts = OperationTable::default();
        let mut resources = OperationTable::default();

        for PendingOperation {
            declaration,
            signature,
            handler,
        } in self.pending
        {
            validate_key(&declaration)?;
            let parameters = schema::resolve_parameters(&declaration, &signature)?;

            tracing::debug!(
                kind = %declaration.kind,
                key = %declaration.key(),
                parameters = parameters.len(),
                "Registering operation"
            );

            let table = match declaration.kind {
                OperationKind::Tool => &mut tools,
                OperationKind::Prompt => &mut prompts,
                OperationKind::Resource => &mut resources,
            };
            table.insert(OperationEntry {
                declaration,
                parameters,
                handler,
            })?;
        }

        let tool_listing = ListToolsResult {
            tools: tools
                .entries
                .iter()
                .map(|e| schema::tool_schema(&e.declaration, &e.parameters))
                .collect(),
        };
        let prompt_listing = ListPromptsResult {
            prompts: prompts
                .entries
                .iter()
                .map(|e| schema::prompt_schema(&e.declaration, &e.parameters))
                .collect(),
        };
        let resource_listing = ListResourcesResult {
            resources: resources
                .entries
                .iter()
                .map(|e| schema::resource_descriptor(&e.declaration))
                .collect(),
        };

        tracing::info!(
            tools = tools.entries.len(),
            prompts = prompts.entries.len(),
            resources = resources.entries.len(),
            "Operation registry built"
        );

        Ok(Registry {
            tools,
            prompts,
            resources,
            tool_listing,
            prompt_listing,
            resource_listing,
        })
    }
}

fn validate_key(declaration: &Declaration) -> Result<(), RegistryError> {
    match declaration.kind {
        OperationKind::Tool | OperationKind::Prompt if declaration.name.trim().is_empty() => {
            Err(RegistryError::MissingName {
                kind: declaration.kind,
            })
        }
        OperationKind::Resource if declaration.key().trim().is_empty() => {
            Err(RegistryError::MissingUri {
                name: declaration.name.clone(),
            })
        }
        _ => Ok(()),
    }
}

/// Immutable index of a service's operations
#[derive(Debug)]
pub struct Registry {
    tools: OperationTable,
    prompts: OperationTable,
    resources: OperationTable,
    tool_listing: ListToolsResult,
    prompt_listing: ListPromptsResult,
    resource_listing: ListResourcesResult,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Build the registry for one service instance.
    pub fn from_service<S: Service>(service: Arc<S>) -> Result<Self, RegistryError> {
        let mut builder = RegistryBuilder::new();
        service.declare(&mut builder);
        builder.build()
    }

    pub fn tool(&self, name: &str) -> Option<&OperationEntry> {
        self.tools.get(name)
    }

    pub fn prompt(&self, name: &str) -> Option<&OperationEntry> {
        self.prompts.get(name)
    }

    pub fn resource(&self, uri: &str) -> Option<&OperationEntry> {
        self.resources.get(uri)
    }

    pub fn tool_listing(&self) -> &ListToolsResult {
        &self.tool_listing
    }

    pub fn prompt_listing(&self) -> &ListPromptsResult {
        &self.prompt_listing
    }

    pub fn resource_listing(&self) -> &ListResourcesResult {
        &self.resource_listing
    }

    pub fn has_prompts(&self) -> bool {
        !self.prompts.entries.is_empty()
    }

    pub fn has_resources(&self) -> bool {
        !self.resources.entries.is_empty()
    }
}
