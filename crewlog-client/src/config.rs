use std::time::Duration;

use crate::api::AuthToken;

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// eg. `https://crew.example.org`, without trailing slash
    pub host: String,
    pub token: AuthToken,

    /// Path prefix of the comment endpoints, without leading or trailing slash
    pub api_base: String,
}

impl ClientConfig {
    pub fn new(host: String, token: AuthToken) -> ClientConfig {
        ClientConfig {
            host: String::from(host.trim_end_matches('/')),
            token,
            api_base: String::from("api/feedback"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ThreadConfig {
    /// Replies deeper than this are drawn at this depth and cannot be replied to
    pub max_depth: usize,

    /// Change notifications arriving within this window trigger a single re-fetch
    pub coalesce_window: Duration,

    // Websocket keep-alive of the change feed
    pub ping_interval: Duration,
    pub disconnect_after: Duration,
    pub reconnect_spacing: Duration,
}

impl Default for ThreadConfig {
    fn default() -> ThreadConfig {
        ThreadConfig {
            max_depth: 3,
            coalesce_window: Duration::from_millis(250),
            ping_interval: Duration::from_secs(10),
            disconnect_after: Duration::from_secs(20),
            reconnect_spacing: Duration::from_secs(1),
        }
    }
}
