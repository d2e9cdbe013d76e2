//! Connection manager configuration.

use std::time::Duration;

use reqwest::Url;

use crate::domain::ChannelName;

const DEFAULT_JOIN_LINK_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_SINK_ATTACH_ATTEMPTS: u32 = 10;
const DEFAULT_SINK_ATTACH_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Origin the shareable join link is built on
    pub join_link_origin: String,
    /// How many times a video sink is asked for after a participant publishes video
    pub sink_attach_attempts: u32,
    /// Pause between two sink requests
    pub sink_attach_interval: Duration,
    /// Capacity of the lifecycle event channel; slow subscribers lag past it
    pub event_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            join_link_origin: DEFAULT_JOIN_LINK_ORIGIN.to_string(),
            sink_attach_attempts: DEFAULT_SINK_ATTACH_ATTEMPTS,
            sink_attach_interval: DEFAULT_SINK_ATTACH_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ConnectionConfig {
    pub fn with_join_link_origin(mut self, origin: impl Into<String>) -> Self {
        self.join_link_origin = origin.into();
        self
    }

    pub fn with_sink_attach(mut self, attempts: u32, interval: Duration) -> Self {
        self.sink_attach_attempts = attempts;
        self.sink_attach_interval = interval;
        self
    }

    /// Shareable link inviting someone into `channel`: `<origin>/sessions?room=<channel>`
    pub fn join_link(&self, channel: &ChannelName) -> String {
        match Url::parse(&self.join_link_origin) {
            Ok(mut url) => {
                let path = format!("{}/sessions", url.path().trim_end_matches('/'));
                url.set_path(&path);
                url.set_fragment(None);
                url.query_pairs_mut()
                    .clear()
                    .append_pair("room", channel.as_str());
                url.into()
            }
            Err(e) => {
                tracing::warn!(
                    "Join link origin {} is not a valid URL ({}), using it verbatim",
                    self.join_link_origin,
                    e
                );
                format!(
                    "{}/sessions?room={}",
                    self.join_link_origin.trim_end_matches('/'),
                    channel
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(name: &str) -> ChannelName {
        ChannelName::try_from(name).unwrap()
    }

    #[test]
    fn test_join_link_on_origin() {
        // テスト項目: 参加リンクが <origin>/sessions?room=<channel> の形になる
        // given (前提条件):
        let config = ConnectionConfig::default().with_join_link_origin("https://kizuna.example");

        // when (操作):
        let link = config.join_link(&channel("group-abc123-1700000000000"));

        // then (期待する結果):
        assert_eq!(
            link,
            "https://kizuna.example/sessions?room=group-abc123-1700000000000"
        );
    }

    #[test]
    fn test_join_link_keeps_origin_base_path() {
        // テスト項目: オリジンにパスが含まれる場合はその下に sessions が付く
        // given (前提条件):
        let config = ConnectionConfig::default().with_join_link_origin("https://example.com/app/");

        // when (操作):
        let link = config.join_link(&channel("room-a"));

        // then (期待する結果):
        assert_eq!(link, "https://example.com/app/sessions?room=room-a");
    }

    #[test]
    fn test_join_link_with_unparsable_origin() {
        // テスト項目: URL として解釈できないオリジンはそのまま連結される
        // given (前提条件):
        let config = ConnectionConfig::default().with_join_link_origin("kizuna-app/");

        // when (操作):
        let link = config.join_link(&channel("room-a"));

        // then (期待する結果):
        assert_eq!(link, "kizuna-app/sessions?room=room-a");
    }
}
