// Minimal service with one operation of each kind

use herald_core::{Declaration, FormalParameter, RegistryBuilder, Service};
use serde_json::json;
use std::sync::Arc;

pub const SERVER_NAME: &str = "mcp-test-server";

#[derive(Debug, Default)]
pub struct DemoService;

impl DemoService {
    pub fn new() -> Self {
        Self
    }

    pub fn sum(&self, num1: i64, num2: i64) -> i64 {
        num1 + num2
    }

    pub fn greeting(&self, name: &str) -> String {
        format!("Hello, {}!", name)
    }

    pub fn greeting_text(&self) -> &'static str {
        "Hello from the example MCP server!"
    }
}

impl Service for DemoService {
    fn declare(self: Arc<Self>, registry: &mut RegistryBuilder) {
        let this = self.clone();
        registry.register(
            Declaration::tool("sum", "Add two numbers"),
            [
                FormalParameter::new::<i64>("num1"),
                FormalParameter::new::<i64>("num2").with_default(0),
            ],
            move |args| Ok(this.sum(args.get(0)?, args.get(1)?).into()),
        );

        let this = self.clone();
        registry.register(
            Declaration::prompt("greeting", "Generate a greeting").with_parameters(json!({
                "name": {"description": "Name of the person to greet", "required": true}
            })),
            [FormalParameter::new::<String>("name")],
            move |args| Ok(this.greeting(&args.get::<String>(0)?).into()),
        );

        let this = self;
        registry.register(
            Declaration::resource("example://greeting", "Greeting Text", "A simple greeting message"),
            [],
            move |_| Ok(this.greeting_text().into()),
        );
    }
}
