//! Session configuration.

use std::time::Duration;

use url::Url;

/// Default WebSocket endpoint of the play server.
pub const DEFAULT_PLAY_URL: &str = "wss://play.storyweave.io/play";

/// Bounded retry schedule for one outage.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Attempts before the session gives up and reports a terminal failure.
    pub max_attempts: u32,
    /// Delay before the first attempt.
    pub initial_delay: Duration,
    /// Ceiling for grown delays.
    pub max_delay: Duration,
    /// Growth factor applied after each attempt.
    pub multiplier: f64,
}

impl ReconnectPolicy {
    /// Retry immediately, `max_attempts` times, with no delay between
    /// attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// What the session does when a message arrives with `endStory` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndStoryPolicy {
    /// Emit `StoryEnded`, then disconnect.
    #[default]
    DisconnectAndNotify,
    /// Emit `StoryEnded` and leave the connection open.
    NotifyOnly,
}

/// Tunables for a [`crate::Playthrough`].
#[derive(Debug, Clone)]
pub struct PlaythroughConfig {
    /// WebSocket endpoint of the play server.
    pub play_url: Url,
    /// Budget for opening the transport, per attempt.
    pub connect_timeout: Duration,
    /// Ping cadence while connected.
    pub heartbeat_interval: Duration,
    /// Unanswered pings tolerated before the connection is presumed dead.
    pub heartbeat_threshold: u32,
    pub reconnect: ReconnectPolicy,
    pub end_story: EndStoryPolicy,
}

impl Default for PlaythroughConfig {
    fn default() -> Self {
        Self {
            play_url: Url::parse(DEFAULT_PLAY_URL).expect("default play url is valid"),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(10),
            heartbeat_threshold: 3,
            reconnect: ReconnectPolicy::default(),
            end_story: EndStoryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_policy_has_no_delays() {
        let policy = ReconnectPolicy::immediate(5);
        assert_eq!(policy.max_attempts, 5);
        assert!(policy.initial_delay.is_zero());
        assert!(policy.max_delay.is_zero());
    }

    #[test]
    fn default_config_parses_its_url() {
        let config = PlaythroughConfig::default();
        assert_eq!(config.play_url.scheme(), "wss");
        assert_eq!(config.end_story, EndStoryPolicy::DisconnectAndNotify);
    }
}
