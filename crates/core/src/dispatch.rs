// Dispatcher: listing and call entry points over a registry, plus binding
// of those entry points onto a server's handler table

use crate::coerce::coerce_arguments;
use crate::config::DispatchConfig;
use crate::error::{DispatchError, RegistryError};
use crate::protocol::{
    CallToolParams, CallToolResult, GetPromptParams, GetPromptResult, JsonRpcError,
    ListPromptsResult, ListResourcesResult, ListToolsResult, PromptMessage, ReadResourceParams,
    ReadResourceResult, ResourceContents, Role, ToolContent,
};
use crate::registry::{OperationEntry, Registry, Reply, Service};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Protocol method names the dispatcher binds
pub mod methods {
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PROMPTS_GET: &str = "prompts/get";
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_READ: &str = "resources/read";
}

/// Handler callable registered on a server: raw params in, result or failure out
pub type RequestHandler = Arc<dyn Fn(Option<Value>) -> Result<Value, JsonRpcError> + Send + Sync>;

/// Something that accepts named request handlers (the server side)
pub trait HandlerTable {
    fn register_handler(&mut self, method: &str, handler: RequestHandler);
}

/// Routes named calls to registry entries
#[derive(Debug)]
pub struct Dispatcher {
    registry: Registry,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(registry: Registry, config: DispatchConfig) -> Self {
        Self { registry, config }
    }

    pub fn for_service<S: Service>(
        service: Arc<S>,
        config: DispatchConfig,
    ) -> Result<Self, RegistryError> {
        Ok(Self::new(Registry::from_service(service)?, config))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn list_tools(&self) -> &ListToolsResult {
        self.registry.tool_listing()
    }

    pub fn list_prompts(&self) -> &ListPromptsResult {
        self.registry.prompt_listing()
    }

    pub fn list_resources(&self) -> &ListResourcesResult {
        self.registry.resource_listing()
    }

    /// Call a tool. Every failure is reported inside the result.
    pub fn call_tool(&self, name: &str, arguments: Option<&Value>) -> CallToolResult {
        match self.try_call_tool(name, arguments) {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(tool = %name, error = %err, "Tool call failed");
                CallToolResult::failure(err.to_string())
            }
        }
    }

    fn try_call_tool(
        &self,
        name: &str,
        arguments: Option<&Value>,
    ) -> Result<CallToolResult, DispatchError> {
        let entry = self
            .registry
            .tool(name)
            .ok_or_else(|| DispatchError::UnknownTool(name.to_string()))?;

        let content = match invoke(entry, arguments)? {
            Reply::Content(content) => content,
            reply => vec![ToolContent::text(reply.into_text())],
        };
        Ok(CallToolResult::success(content))
    }

    pub fn get_prompt(
        &self,
        name: &str,
        arguments: Option<&Value>,
    ) -> Result<GetPromptResult, DispatchError> {
        let entry = self
            .registry
            .prompt(name)
            .ok_or_else(|| DispatchError::UnknownPrompt(name.to_string()))?;

        Ok(match invoke(entry, arguments)? {
            Reply::Prompt(result) => result,
            reply => GetPromptResult {
                description: Some(entry.declaration().description.clone()),
                messages: vec![PromptMessage::text(Role::Assistant, reply.into_text())],
            },
        })
    }

    pub fn read_resource(&self, uri: &str) -> Result<ReadResourceResult, DispatchError> {
        let entry = self
            .registry
            .resource(uri)
            .ok_or_else(|| DispatchError::UnknownResource(uri.to_string()))?;

        let text = invoke(entry, None)?.into_text();
        let text = truncate_content(uri, text, self.config.max_resource_bytes);

        Ok(ReadResourceResult {
            contents: vec![ResourceContents {
                uri: uri.to_string(),
                text,
                mime_type: entry.declaration().mime_type().to_string(),
            }],
        })
    }

    /// Register the entry points on `table`. Prompt and resource handlers are
    /// only bound when the registry has operations of that kind.
    pub fn bind(self: Arc<Self>, table: &mut impl HandlerTable) {
        let this = self.clone();
        table.register_handler(
            methods::TOOLS_LIST,
            request_handler(move |_| to_result(this.list_tools())),
        );

        let this = self.clone();
        table.register_handler(
            methods::TOOLS_CALL,
            request_handler(move |params| {
                let params: CallToolParams = decode_params(params)?;
                to_result(&this.call_tool(&params.name, params.arguments.as_ref()))
            }),
        );

        if self.registry.has_prompts() {
            let this = self.clone();
            table.register_handler(
                methods::PROMPTS_LIST,
                request_handler(move |_| to_result(this.list_prompts())),
            );

            let this = self.clone();
            table.register_handler(
                methods::PROMPTS_GET,
                request_handler(move |params| {
                    let params: GetPromptParams = decode_params(params)?;
                    let result = this.get_prompt(&params.name, params.arguments.as_ref())?;
                    to_result(&result)
                }),
            );
        }

        if self.registry.has_resources() {
            let this = self.clone();
            table.register_handler(
                methods::RESOURCES_LIST,
                request_handler(move |_| to_result(this.list_resources())),
            );

            let this = self;
            table.register_handler(
                methods::RESOURCES_READ,
                request_handler(move |params| {
                    let params: ReadResourceParams = decode_params(params)?;
                    let result = this.read_resource(&params.uri)?;
                    to_result(&result)
                }),
            );
        }
    }
}

/// Coerce the raw arguments and run the handler. The handler is only reached
/// with a well-formed argument list; a panic inside it is reported like any
/// other handler failure.
fn invoke(entry: &OperationEntry, arguments: Option<&Value>) -> Result<Reply, DispatchError> {
    let declaration = entry.declaration();
    let arguments = coerce_arguments(entry.parameters(), arguments).map_err(|source| {
        DispatchError::InvalidArguments {
            kind: declaration.kind,
            operation: declaration.key().to_string(),
            source,
        }
    })?;

    tracing::debug!(
        kind = %declaration.kind,
        operation = %declaration.key(),
        "Invoking operation"
    );

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| entry.invoke(arguments)));
    let message = match outcome {
        Ok(Ok(reply)) => return Ok(reply),
        Ok(Err(err)) => format!("{:#}", err),
        Err(payload) => panic_message(payload.as_ref()),
    };

    Err(DispatchError::Handler {
        kind: declaration.kind,
        operation: declaration.key().to_string(),
        message,
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {}", text)
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("handler panicked: {}", text)
    } else {
        "handler panicked".to_string()
    }
}

/// Cut `text` at the last char boundary within `ceiling` bytes and append a
/// notice carrying the original size.
fn truncate_content(uri: &str, mut text: String, ceiling: usize) -> String {
    let total = text.len();
    if total <= ceiling {
        return text;
    }

    let mut cut = ceiling;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);

    tracing::warn!(uri = %uri, total, shown = cut, "Resource content truncated");
    text.push_str(&format!(
        "\n\n[truncated: showing {} of {} bytes]",
        cut, total
    ));
    text
}

fn request_handler<F>(handler: F) -> RequestHandler
where
    F: Fn(Option<Value>) -> Result<Value, JsonRpcError> + Send + Sync + 'static,
{
    Arc::new(handler)
}

fn decode_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, JsonRpcError> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| DispatchError::InvalidParams(e.to_string()).into())
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::Arguments;
    use crate::declaration::{Declaration, OperationKind};
    use crate::error::{CoercionError, ErrorKind};
    use crate::registry::RegistryBuilder;
    use crate::signature::FormalParameter;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Service used across the dispatcher tests; counts handler invocations.
    #[derive(Default)]
    struct Sample {
        calls: AtomicUsize,
        memo: String,
    }

    impl Sample {
        fn with_memo(memo: String) -> Self {
            Self {
                memo,
                ..Self::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Service for Sample {
        fn declare(self: Arc<Self>, registry: &mut RegistryBuilder) {
            let this = self.clone();
            registry.register(
                Declaration::tool("sum", "Add two numbers"),
                [
                    FormalParameter::new::<i64>("num1"),
                    FormalParameter::new::<i64>("num2").with_default(0),
                ],
                move |args| {
                    this.calls.fetch_add(1, Ordering::SeqCst);
                    Ok((args.get::<i64>(0)? + args.get::<i64>(1)?).into())
                },
            );

            let this = self.clone();
            registry.register(
                Declaration::tool("shout", "Upper-case text").with_parameters(json!({
                    "text": {"type": "string", "description": "Text", "required": true}
                })),
                [FormalParameter::new::<String>("text")],
                move |args| {
                    this.calls.fetch_add(1, Ordering::SeqCst);
                    Ok(args.get::<String>(0)?.to_uppercase().into())
                },
            );

            registry.register(Declaration::tool("fail", "Always fails"), [], |_| {
                anyhow::bail!("database unavailable")
            });

            registry.register(Declaration::tool("explode", "Panics"), [], |_| {
                panic!("kaboom")
            });

            registry.register(
                Declaration::prompt("greeting", "Generate a greeting").with_parameters(json!({
                    "name": {"description": "Who to greet", "required": true}
                })),
                [FormalParameter::new::<String>("name")],
                |args| Ok(format!("Hello, {}!", args.get::<String>(0)?).into()),
            );

            registry.register(Declaration::prompt("broken", "Fails"), [], |_| {
                anyhow::bail!("template missing")
            });

            let this = self;
            registry.register(
                Declaration::resource("memo://insights", "Insights", "Insight memo"),
                [],
                move |_| Ok(this.memo.clone().into()),
            );
        }
    }

    fn dispatcher(service: Arc<Sample>) -> Dispatcher {
        Dispatcher::for_service(service, DispatchConfig::default()).unwrap()
    }

    #[test]
    fn test_sum_coerces_and_applies_default() {
        let service = Arc::new(Sample::default());
        let d = dispatcher(service.clone());

        let result = d.call_tool("sum", Some(&json!({"num1": "5"})));
        assert!(!result.is_error());
        assert_eq!(result.content, vec![ToolContent::text("5")]);
        assert_eq!(service.calls(), 1);

        let result = d.call_tool("sum", Some(&json!({"num1": 2, "num2": "40"})));
        assert_eq!(result.text(), "42");
    }

    #[test]
    fn test_unknown_tool_is_in_band_error() {
        let d = dispatcher(Arc::new(Sample::default()));
        let result = d.call_tool("unknown-name", Some(&json!({})));
        assert!(result.is_error());
        assert!(result.text().contains("unknown-name"));
    }

    #[test]
    fn test_missing_parameter_never_invokes_handler() {
        let service = Arc::new(Sample::default());
        let d = dispatcher(service.clone());

        let result = d.call_tool("shout", Some(&json!({})));
        assert!(result.is_error());
        assert!(result.text().contains("text"));
        assert_eq!(service.calls(), 0);

        let result = d.call_tool("sum", Some(&json!({"num1": "many"})));
        assert!(result.is_error());
        assert!(result.text().contains("num1"));
        assert_eq!(service.calls(), 0);
    }

    #[test]
    fn test_handler_failure_is_caught() {
        let d = dispatcher(Arc::new(Sample::default()));
        let result = d.call_tool("fail", None);
        assert!(result.is_error());
        assert!(result.text().contains("database unavailable"));
    }

    #[test]
    fn test_handler_panic_is_caught() {
        let d = dispatcher(Arc::new(Sample::default()));
        let result = d.call_tool("explode", None);
        assert!(result.is_error());
        assert!(result.text().contains("kaboom"));
    }

    #[test]
    fn test_listings_are_stable() {
        let d = dispatcher(Arc::new(Sample::default()));
        let first = d.list_tools().clone();
        d.call_tool("sum", Some(&json!({"num1": 1})));
        d.list_prompts();
        assert_eq!(d.list_tools(), &first);
        assert_eq!(d.list_tools(), &first);
        assert_eq!(first.tools.len(), 4);
        assert_eq!(first.tools[0].input_schema["required"], json!(["num1"]));
    }

    #[test]
    fn test_get_prompt_wraps_assistant_message() {
        let d = dispatcher(Arc::new(Sample::default()));
        let result = d.get_prompt("greeting", Some(&json!({"name": "Ada"}))).unwrap();

        assert_eq!(result.description.as_deref(), Some("Generate a greeting"));
        assert_eq!(
            result.messages,
            vec![PromptMessage::text(Role::Assistant, "Hello, Ada!")]
        );
    }

    #[test]
    fn test_get_prompt_failures_propagate() {
        let d = dispatcher(Arc::new(Sample::default()));

        let err = d.get_prompt("nope", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownPrompt);

        let err = d.get_prompt("greeting", None).unwrap_err();
        assert_eq!(
            err,
            DispatchError::InvalidArguments {
                kind: OperationKind::Prompt,
                operation: "greeting".into(),
                source: CoercionError::MissingRequired {
                    parameter: "name".into()
                },
            }
        );

        let err = d.get_prompt("broken", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Handler);
        assert_eq!(
            err.to_string(),
            "error processing prompt 'broken': template missing"
        );
    }

    #[test]
    fn test_read_resource() {
        let d = dispatcher(Arc::new(Sample::with_memo("No insights yet.".into())));
        let result = d.read_resource("memo://insights").unwrap();
        assert_eq!(
            result.contents,
            vec![ResourceContents {
                uri: "memo://insights".into(),
                text: "No insights yet.".into(),
                mime_type: "text/plain".into(),
            }]
        );

        let err = d.read_resource("memo://missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownResource);
    }

    #[test]
    fn test_large_resource_is_truncated() {
        let total = 3 * 1024 * 1024;
        let d = dispatcher(Arc::new(Sample::with_memo("x".repeat(total))));

        let text = &d.read_resource("memo://insights").unwrap().contents[0].text;
        let ceiling = DEFAULT_CEILING;
        assert!(text.starts_with(&"x".repeat(ceiling)));
        assert!(!text[..ceiling + 1].ends_with('x'));

        let notice = &text[ceiling..];
        assert_eq!(
            notice,
            format!("\n\n[truncated: showing {} of {} bytes]", ceiling, total)
        );
    }

    const DEFAULT_CEILING: usize = crate::config::DEFAULT_MAX_RESOURCE_BYTES;

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // Each 'é' is two bytes; a ceiling of 5 must cut back to 4.
        let text = truncate_content("memo://x", "éééé".to_string(), 5);
        assert!(text.starts_with("éé\n\n"));
        assert!(text.ends_with("[truncated: showing 4 of 8 bytes]"));

        assert_eq!(truncate_content("memo://x", "short".to_string(), 5), "short");
    }

    #[derive(Default)]
    struct Table(HashMap<String, RequestHandler>);

    impl HandlerTable for Table {
        fn register_handler(&mut self, method: &str, handler: RequestHandler) {
            self.0.insert(method.to_string(), handler);
        }
    }

    #[test]
    fn test_bind_registers_callables() {
        let d = Arc::new(dispatcher(Arc::new(Sample::with_memo("memo".into()))));
        let mut table = Table::default();
        d.bind(&mut table);

        let mut methods: Vec<_> = table.0.keys().cloned().collect();
        methods.sort();
        assert_eq!(
            methods,
            vec![
                "prompts/get",
                "prompts/list",
                "resources/list",
                "resources/read",
                "tools/call",
                "tools/list"
            ]
        );

        let call = &table.0["tools/call"];
        let result = call(Some(json!({"name": "sum", "arguments": {"num1": "5"}}))).unwrap();
        assert_eq!(result["content"][0]["text"], "5");

        let result = call(Some(json!({"name": "missing"}))).unwrap();
        assert_eq!(result["isError"], true);

        let err = call(None).unwrap_err();
        assert_eq!(err.code, JsonRpcError::INVALID_PARAMS);

        let get = &table.0["prompts/get"];
        let err = get(Some(json!({"name": "nope"}))).unwrap_err();
        assert_eq!(err.code, JsonRpcError::INVALID_PARAMS);

        let read = &table.0["resources/read"];
        let result = read(Some(json!({"uri": "memo://insights"}))).unwrap();
        assert_eq!(result["contents"][0]["text"], "memo");
        assert_eq!(result["contents"][0]["mimeType"], "text/plain");
    }

    #[test]
    fn test_bind_skips_empty_groups() {
        let mut builder = Registry::builder();
        builder.register(Declaration::tool("noop", ""), [], |_: Arguments| Ok("".into()));
        let d = Arc::new(Dispatcher::new(builder.build().unwrap(), DispatchConfig::default()));

        let mut table = Table::default();
        d.bind(&mut table);
        assert!(table.0.contains_key("tools/list"));
        assert!(!table.0.contains_key("prompts/list"));
        assert!(!table.0.contains_key("resources/read"));
    }

    #[test]
    fn test_explicit_map_arguments_arrive_in_handler_order() {
        let mut builder = Registry::builder();
        builder.register(
            Declaration::tool("div", "Divide").with_parameters(json!({
                "b": {"type": "integer", "required": true},
                "a": {"type": "integer", "required": true}
            })),
            [
                FormalParameter::new::<i64>("a"),
                FormalParameter::new::<i64>("b"),
            ],
            |args: Arguments| Ok((args.get::<i64>(0)? / args.get::<i64>(1)?).into()),
        );
        builder.register(
            Declaration::tool("greet", "Greet").with_parameters(json!({
                "name": {"type": "string", "required": true}
            })),
            [
                FormalParameter::new::<String>("name"),
                FormalParameter::new::<String>("greeting").with_default("Hi"),
            ],
            |args: Arguments| {
                Ok(format!("{}, {}", args.get::<String>(1)?, args.get::<String>(0)?).into())
            },
        );
        let d = Dispatcher::new(builder.build().unwrap(), DispatchConfig::default());

        let result = d.call_tool("div", Some(&json!({"a": 10, "b": 2})));
        assert!(!result.is_error());
        assert_eq!(result.text(), "5");

        let result = d.call_tool("greet", Some(&json!({"name": "Ada"})));
        assert_eq!(result.text(), "Hi, Ada");
        let result = d.call_tool("greet", Some(&json!({"name": "Ada", "greeting": "Hey"})));
        assert_eq!(result.text(), "Hey, Ada");
    }

    #[test]
    fn test_concurrent_dispatch_shares_registry() {
        let service = Arc::new(Sample::default());
        let d = Arc::new(dispatcher(service.clone()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let d = d.clone();
                std::thread::spawn(move || {
                    let result = d.call_tool("sum", Some(&json!({"num1": i, "num2": i})));
                    result.text()
                })
            })
            .collect();

        let mut totals: Vec<i64> = handles
            .into_iter()
            .map(|h| h.join().unwrap().parse().unwrap())
            .collect();
        totals.sort();
        assert_eq!(totals, vec![0, 2, 4, 6, 8, 10, 12, 14]);
        assert_eq!(service.calls(), 8);
    }
}
