// Base64 encoding tools

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use herald_core::protocol::ToolContent;
use herald_core::{Declaration, FormalParameter, RegistryBuilder, Reply, Service};
use serde_json::json;
use std::sync::Arc;

pub const SERVER_NAME: &str = "mcp-base64-server";

#[derive(Debug, Default)]
pub struct Base64Service;

impl Base64Service {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, text: &str) -> String {
        STANDARD.encode(text)
    }

    pub fn decode(&self, encoded: &str) -> Result<String> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .context("Invalid base64 input")?;
        String::from_utf8(bytes).context("Decoded bytes are not valid UTF-8 text")
    }

    /// Validate base64 image data, with or without a `data:image/...;base64,`
    /// prefix, and return it as image content.
    pub fn to_image(&self, encoded: &str) -> Result<ToolContent> {
        let data = strip_data_uri(encoded.trim());
        let bytes = STANDARD.decode(data).context("Invalid base64 input")?;
        let mime_type = sniff_image_type(&bytes).context("Data is not a recognised image")?;
        Ok(ToolContent::image(data, mime_type))
    }
}

fn strip_data_uri(input: &str) -> &str {
    input
        .strip_prefix("data:image/")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, data)| data)
        .unwrap_or(input)
}

fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"BM") {
        Some("image/bmp")
    } else {
        None
    }
}

impl Service for Base64Service {
    fn declare(self: Arc<Self>, registry: &mut RegistryBuilder) {
        let this = self.clone();
        registry.register(
            Declaration::tool("encode", "Encode text as base64").with_parameters(json!({
                "text": {"type": "string", "description": "Text to encode", "required": true}
            })),
            [FormalParameter::new::<String>("text")],
            move |args| Ok(this.encode(&args.get::<String>(0)?).into()),
        );

        let this = self.clone();
        registry.register(
            Declaration::tool("decode", "Decode base64 into text").with_parameters(json!({
                "base64": {"type": "string", "description": "Base64 string to decode", "required": true}
            })),
            [FormalParameter::new::<String>("base64")],
            move |args| Ok(this.decode(&args.get::<String>(0)?)?.into()),
        );

        let this = self;
        registry.register(
            Declaration::tool("to-image", "Turn base64 image data into an image").with_parameters(
                json!({
                    "base64": {
                        "type": "string",
                        "description": "Base64 image data, optionally with a data URI prefix",
                        "required": true
                    }
                }),
            ),
            [FormalParameter::new::<String>("base64")],
            move |args| Ok(Reply::from(this.to_image(&args.get::<String>(0)?)?)),
        );
    }
}
