// MCP server: JSON-RPC method routing over a table of named handlers

use crate::config::ServerConfig;
use crate::notify::Outbox;
use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use herald_core::dispatch::{methods, Dispatcher, HandlerTable, RequestHandler};
use herald_core::protocol::{
    InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ListChangedCapability, ServerCapabilities, ServerInfo, JSONRPC_VERSION, PROTOCOL_VERSION,
};
use herald_core::{RegistryError, Service};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

pub struct McpServer {
    info: ServerInfo,
    handlers: HashMap<String, RequestHandler>,
    outbox: Mutex<Option<Outbox>>,
}

impl McpServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: ServerInfo {
                name: name.into(),
                version: version.into(),
            },
            handlers: HashMap::new(),
            outbox: Mutex::new(None),
        }
    }

    /// Attach the receiving half of a service's `Notifier`; `serve` writes
    /// its notifications after each response.
    pub fn with_outbox(self, outbox: Outbox) -> Self {
        Self {
            outbox: Mutex::new(Some(outbox)),
            ..self
        }
    }

    /// Build the registry for `service` and bind its dispatcher.
    pub fn for_service<S: Service>(
        config: &ServerConfig,
        default_name: &str,
        service: Arc<S>,
    ) -> Result<Self, RegistryError> {
        let dispatcher = Dispatcher::for_service(service, config.dispatch.clone())?;
        let mut server = Self::new(
            config.server.name.as_deref().unwrap_or(default_name),
            config.server.version.clone(),
        );
        Arc::new(dispatcher).bind(&mut server);
        Ok(server)
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn has_handler(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Capabilities advertised at initialization, derived from the bound handlers
    pub fn capabilities(&self) -> ServerCapabilities {
        let group = |method: &str| {
            self.has_handler(method)
                .then(ListChangedCapability::default)
        };
        ServerCapabilities {
            tools: group(methods::TOOLS_LIST),
            prompts: group(methods::PROMPTS_LIST),
            resources: group(methods::RESOURCES_LIST),
        }
    }

    /// Route one request. Notifications never get a response.
    pub fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let result = if request.jsonrpc != JSONRPC_VERSION {
            Err(JsonRpcError::invalid_request())
        } else {
            self.route(&request.method, request.params)
        };

        let Some(id) = request.id else {
            if let Err(err) = result {
                tracing::debug!(method = %request.method, error = %err, "Notification not handled");
            }
            return None;
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(err) => {
                tracing::debug!(method = %request.method, error = %err, "Request failed");
                JsonRpcResponse::error(id, err)
            }
        })
    }

    fn route(&self, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
        tracing::debug!(method = %method, "Handling request");
        match method {
            "initialize" => self.initialize(params),
            "ping" => Ok(serde_json::json!({})),
            _ => match self.handlers.get(method) {
                Some(handler) => handler(params),
                None => Err(JsonRpcError::method_not_found(method)),
            },
        }
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        if let Some(params) = params {
            let params: InitializeParams = serde_json::from_value(params)
                .map_err(|e| JsonRpcError::invalid_params(e.to_string()))?;
            tracing::info!(
                client = %params.client_info.name,
                client_version = %params.client_info.version,
                protocol = %params.protocol_version,
                "Client connected"
            );
        }

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: self.capabilities(),
            server_info: self.info.clone(),
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }

    /// Handle one line of JSON text, returning the serialized response if any.
    pub fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<Value>(line) {
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unparseable request");
                Some(JsonRpcResponse::error(Value::Null, JsonRpcError::parse_error()))
            }
            Ok(value) => {
                let id = value.get("id").cloned().unwrap_or(Value::Null);
                match serde_json::from_value::<JsonRpcRequest>(value) {
                    Ok(request) => self.handle(request),
                    Err(_) => Some(JsonRpcResponse::error(id, JsonRpcError::invalid_request())),
                }
            }
        }?;

        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response");
                None
            }
        }
    }

    /// Serve newline-delimited JSON-RPC until `reader` is exhausted. Requests
    /// run on the blocking pool since handlers may block.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut requests = FramedRead::new(reader, LinesCodec::new());
        let mut responses = FramedWrite::new(writer, LinesCodec::new());
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| anyhow::anyhow!("Notification outbox lock poisoned"))?
            .take();

        while let Some(line) = requests.next().await {
            let line = line.context("Failed to read request")?;
            let server = self.clone();
            let response = tokio::task::spawn_blocking(move || server.handle_line(&line))
                .await
                .context("Request task failed")?;

            if let Some(response) = response {
                responses
                    .send(response)
                    .await
                    .context("Failed to write response")?;
            }

            for notification in outbox.as_mut().map(Outbox::drain).unwrap_or_default() {
                let line = serde_json::to_string(&notification)
                    .context("Failed to serialize notification")?;
                responses
                    .send(line)
                    .await
                    .context("Failed to write notification")?;
            }
        }

        tracing::info!("Input closed, shutting down");
        Ok(())
    }
}

impl HandlerTable for McpServer {
    fn register_handler(&mut self, method: &str, handler: RequestHandler) {
        if self.handlers.insert(method.to_string(), handler).is_some() {
            tracing::warn!(method = %method, "Replaced existing handler");
        }
    }
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<_> = self.handlers.keys().collect();
        methods.sort();
        f.debug_struct("McpServer")
            .field("info", &self.info)
            .field("methods", &methods)
            .finish()
    }
}
