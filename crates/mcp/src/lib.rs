// MCP server over stdio for services built on herald-core

pub mod config;
pub mod notify;
pub mod server;
pub mod services;

pub use config::ServerConfig;
pub use notify::{Notifier, Outbox};
pub use server::McpServer;
