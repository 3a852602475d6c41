//! Gemini Live connection settings.

use std::time::Duration;

use url::Url;

use crate::config::{Secret, UpstreamSettings};
use crate::core::upstream::base::{UpstreamError, UpstreamResult};

/// Host serving the Live API.
pub const GEMINI_LIVE_HOST: &str = "generativelanguage.googleapis.com";

/// Settings for one Gemini Live connector.
#[derive(Debug, Clone)]
pub struct GeminiLiveConfig {
    pub api_key: Option<Secret>,
    pub model: String,
    pub voice: String,
    pub api_version: String,
    /// Full websocket URL override
    pub endpoint: Option<String>,
    pub connect_timeout: Duration,
}

impl From<&UpstreamSettings> for GeminiLiveConfig {
    fn from(settings: &UpstreamSettings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            voice: settings.voice.clone(),
            api_version: settings.api_version.clone(),
            endpoint: settings.endpoint.clone(),
            connect_timeout: settings.connect_timeout(),
        }
    }
}

impl GeminiLiveConfig {
    /// Fully qualified model resource name.
    pub fn model_resource(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }

    /// Build the websocket URL including the `key` query parameter.
    pub fn build_ws_url(&self) -> UpstreamResult<Url> {
        let api_key = self
            .api_key
            .as_ref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                UpstreamError::InvalidConfiguration("no API key configured".to_string())
            })?;

        let base = match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!(
                "wss://{GEMINI_LIVE_HOST}/ws/google.ai.generativelanguage.{}.GenerativeService.BidiGenerateContent",
                self.api_version
            ),
        };

        let mut url = Url::parse(&base)
            .map_err(|e| UpstreamError::InvalidConfiguration(format!("invalid endpoint: {e}")))?;
        url.query_pairs_mut().append_pair("key", api_key.expose());
        Ok(url)
    }
}
