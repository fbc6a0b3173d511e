//! Listener configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ListenConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address (any IPv4 address by default)
    #[serde(default = "default_host")]
    pub host: String,
    /// Maximum length of the pending connection queue
    #[serde(default = "default_backlog")]
    pub backlog: u32,
}

fn default_port() -> u16 {
    3333
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_backlog() -> u32 {
    511
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            backlog: default_backlog(),
        }
    }
}
