// Services exposed by the herald-mcp binary

pub mod demo;
pub mod encoder;
pub mod memo;

pub use demo::DemoService;
pub use encoder::Base64Service;
pub use memo::MemoService;
