use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_23074")]
    pub port: u16,
    /// Name announced to the server right after the socket opens.
    /// When unset, no `Name` request is sent.
    #[serde(default)]
    pub app_name: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: 23074,
            app_name: None,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_host() -> String {
    "localhost".into()
}
fn d_23074() -> u16 {
    23074
}
