use serde::{Deserialize, Serialize};

/// Resource bodies above this many bytes are truncated (2 MiB).
pub const DEFAULT_MAX_RESOURCE_BYTES: usize = 2 * 1024 * 1024;

/// Dispatcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_max_resource_bytes")]
    pub max_resource_bytes: usize,
}

fn default_max_resource_bytes() -> usize {
    DEFAULT_MAX_RESOURCE_BYTES
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_resource_bytes: default_max_resource_bytes(),
        }
    }
}
