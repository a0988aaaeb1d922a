//! Client settings fixed at startup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Root of the remote API, e.g. `http://localhost:8000/api`.
    pub base_url: String,
    /// Pause between a successful logout and returning to the home page.
    pub logout_redirect_delay_ms: u64,
}

impl ClientConfig {
    pub fn logout_redirect_delay(&self) -> Duration {
        Duration::from_millis(self.logout_redirect_delay_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            logout_redirect_delay_ms: 1000,
        }
    }
}
