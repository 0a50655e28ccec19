// Business insights memo: a tool that appends to it, a resource that renders
// it and a prompt that walks a user through the workflow

use crate::notify::Notifier;
use anyhow::{anyhow, Result};
use herald_core::protocol::{GetPromptResult, PromptMessage, Role};
use herald_core::{Declaration, FormalParameter, RegistryBuilder, Reply, Service};
use serde_json::json;
use std::sync::{Arc, RwLock};

pub const SERVER_NAME: &str = "mcp-memo-server";

pub const MEMO_URI: &str = "memo://insights";

const DEMO_PROMPT_TEMPLATE: &str = "\
You are guiding a user through a short demo of an MCP server. The chosen topic is: {topic}.

Walk through the three parts of the server in order:
1. Prompts: this message came from the \"mcp-demo\" prompt, filled in with the topic above.
2. Tools: invent a realistic business scenario about the topic, analyse it with the user, \
and record each finding with the \"append_insight\" tool.
3. Resources: point the user at the \"memo://insights\" resource, which now lists every \
insight recorded so far.

Keep each step brief and wait for the user before moving on.";

#[derive(Debug, Default)]
pub struct MemoService {
    insights: RwLock<Vec<String>>,
    notifier: Option<Notifier>,
}

impl MemoService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce memo changes to the connected client through `notifier`.
    pub fn with_notifier(notifier: Notifier) -> Self {
        Self {
            notifier: Some(notifier),
            ..Self::default()
        }
    }

    pub fn append_insight(&self, insight: String) -> Result<&'static str> {
        let mut insights = self
            .insights
            .write()
            .map_err(|_| anyhow!("Insight store is unavailable"))?;
        insights.push(insight);
        tracing::debug!(count = insights.len(), "Insight recorded");
        drop(insights);

        if let Some(notifier) = &self.notifier {
            notifier.resource_updated(MEMO_URI);
        }
        Ok("Insight added to memo")
    }

    pub fn memo(&self) -> Result<String> {
        let insights = self
            .insights
            .read()
            .map_err(|_| anyhow!("Insight store is unavailable"))?;

        if insights.is_empty() {
            return Ok("No business insights have been discovered yet.".to_string());
        }

        let mut memo = String::from("Business Insights Memo\n\nKey findings:\n\n");
        for insight in insights.iter() {
            memo.push_str(&format!("- {}\n", insight));
        }
        if insights.len() > 1 {
            memo.push_str(&format!(
                "\nSummary:\n{} key business insights have been recorded.",
                insights.len()
            ));
        }
        Ok(memo)
    }

    pub fn demo_prompt(&self, topic: &str) -> GetPromptResult {
        GetPromptResult {
            description: Some(format!("Demo template for {}", topic)),
            messages: vec![PromptMessage::text(
                Role::User,
                DEMO_PROMPT_TEMPLATE.replace("{topic}", topic),
            )],
        }
    }
}

impl Service for MemoService {
    fn declare(self: Arc<Self>, registry: &mut RegistryBuilder) {
        let this = self.clone();
        registry.register(
            Declaration::tool("append_insight", "Add a business insight to the memo")
                .with_parameters(json!({
                    "insight": {
                        "type": "string",
                        "description": "The insight to record",
                        "required": true
                    }
                })),
            [FormalParameter::new::<String>("insight")],
            move |args| Ok(this.append_insight(args.get(0)?)?.into()),
        );

        let this = self.clone();
        registry.register(
            Declaration::prompt("mcp-demo", "Walk through the tools, prompts and resources of this server")
                .with_parameters(json!({
                    "topic": {"description": "Topic for the demo scenario", "required": true}
                })),
            [FormalParameter::new::<String>("topic")],
            move |args| Ok(Reply::from(this.demo_prompt(&args.get::<String>(0)?))),
        );

        let this = self;
        registry.register(
            Declaration::resource(MEMO_URI, "Business Insights Memo", "Insights recorded so far"),
            [],
            move |_| Ok(this.memo()?.into()),
        );
    }
}
