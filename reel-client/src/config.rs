//! Client configuration
//!
//! Resolves the backend origin and endpoint paths from the TOML file and the
//! command line. CLI/env values are applied by the binary on top of
//! [`ClientConfig::from_toml`].

use reel_common::config::TomlConfig;
use std::time::Duration;

use crate::models::Pipeline;

/// Default backend origin for local development
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

pub const DEFAULT_TIMELINE_PATH: &str = "/api/generate-video-timeline";
pub const DEFAULT_RENDER_FREE_PATH: &str = "/api/generate-video-reels";
pub const DEFAULT_RENDER_PRO_PATH: &str = "/api/generate-video-pro-reels";
pub const DEFAULT_EVENTS_PATH: &str = "/api/sse/video_update";

/// Wait for push endpoint response headers before rendering without progress
pub const DEFAULT_PUSH_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Endpoint paths, relative to the base URL (absolute URLs are used as-is)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub timeline: String,
    pub render_free: String,
    pub render_pro: String,
    pub events: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            timeline: DEFAULT_TIMELINE_PATH.to_string(),
            render_free: DEFAULT_RENDER_FREE_PATH.to_string(),
            render_pro: DEFAULT_RENDER_PRO_PATH.to_string(),
            events: DEFAULT_EVENTS_PATH.to_string(),
        }
    }
}

/// Resolved client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub endpoints: Endpoints,
    /// TCP connect timeout; `None` leaves the HTTP client default
    pub connect_timeout: Option<Duration>,
    /// Upper bound on opening the push channel
    pub push_handshake_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            endpoints: Endpoints::default(),
            connect_timeout: None,
            push_handshake_timeout: DEFAULT_PUSH_HANDSHAKE_TIMEOUT,
        }
    }

    /// Build from a parsed config file, with an optional base URL override
    /// taken from the command line or environment
    pub fn from_toml(toml: &TomlConfig, base_url_override: Option<String>) -> Self {
        let base_url = base_url_override
            .or_else(|| toml.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let defaults = Endpoints::default();
        let overrides = &toml.endpoints;
        let endpoints = Endpoints {
            timeline: overrides.timeline.clone().unwrap_or(defaults.timeline),
            render_free: overrides.render_free.clone().unwrap_or(defaults.render_free),
            render_pro: overrides.render_pro.clone().unwrap_or(defaults.render_pro),
            events: overrides.events.clone().unwrap_or(defaults.events),
        };

        Self {
            base_url,
            endpoints,
            connect_timeout: toml.connect_timeout_ms.map(Duration::from_millis),
            push_handshake_timeout: toml
                .push_handshake_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_PUSH_HANDSHAKE_TIMEOUT),
        }
    }

    pub fn timeline_url(&self) -> String {
        join_url(&self.base_url, &self.endpoints.timeline)
    }

    /// Render endpoint for the chosen pipeline
    pub fn render_url(&self, pipeline: Pipeline) -> String {
        let path = match pipeline {
            Pipeline::Free => &self.endpoints.render_free,
            Pipeline::Pro => &self.endpoints.render_pro,
        };
        join_url(&self.base_url, path)
    }

    pub fn events_url(&self) -> String {
        join_url(&self.base_url, &self.endpoints.events)
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_common::config::EndpointOverrides;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(
            config.timeline_url(),
            "http://localhost:8080/api/generate-video-timeline"
        );
        assert_eq!(
            config.render_url(Pipeline::Free),
            "http://localhost:8080/api/generate-video-reels"
        );
        assert_eq!(
            config.render_url(Pipeline::Pro),
            "http://localhost:8080/api/generate-video-pro-reels"
        );
        assert_eq!(
            config.events_url(),
            "http://localhost:8080/api/sse/video_update"
        );
        assert_eq!(config.connect_timeout, None);
        assert_eq!(config.push_handshake_timeout, DEFAULT_PUSH_HANDSHAKE_TIMEOUT);
    }

    #[test]
    fn test_toml_values_and_override() {
        let toml = TomlConfig {
            base_url: Some("https://reels.example.com/".to_string()),
            endpoints: EndpointOverrides {
                render_pro: Some("v2/render".to_string()),
                events: Some("https://push.example.com/sse".to_string()),
                ..Default::default()
            },
            connect_timeout_ms: Some(2500),
            push_handshake_timeout_ms: Some(750),
            ..Default::default()
        };

        let config = ClientConfig::from_toml(&toml, None);
        assert_eq!(config.render_url(Pipeline::Pro), "https://reels.example.com/v2/render");
        assert_eq!(config.events_url(), "https://push.example.com/sse");
        assert_eq!(
            config.timeline_url(),
            "https://reels.example.com/api/generate-video-timeline"
        );
        assert_eq!(config.connect_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.push_handshake_timeout, Duration::from_millis(750));

        let config = ClientConfig::from_toml(&toml, Some("http://127.0.0.1:9000".to_string()));
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
    }
}
