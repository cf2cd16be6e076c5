use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Binary media attached to an analysis request (e.g. a screenshot)
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MediaInput {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// What a provider is asked to analyze
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AnalysisInput {
    pub text: Option<String>,
    pub media: Option<MediaInput>,
    pub metadata: HashMap<String, Value>,
}

impl AnalysisInput {
    /// Creates a text-only input.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Creates a media-only input.
    pub fn media(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            media: Some(MediaInput {
                mime_type: mime_type.into(),
                data,
            }),
            ..Default::default()
        }
    }

    /// Adds a free-form metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Per-call options passed down to a provider
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AnalysisOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub timeout: Option<Duration>,
}

/// A single provider's answer
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderResponse {
    pub content: String,
    /// Self-reported confidence in [0, 1]
    pub confidence: f64,
    pub tokens_used: u32,
    pub response_time_ms: u64,
    pub model: String,
    pub timestamp: DateTime<Utc>,
}

/// Rate-limit state reported by a provider
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RateLimitInfo {
    pub requests_per_minute: u32,
    pub requests_remaining: u32,
    pub reset_time: DateTime<Utc>,
    pub daily_limit: Option<u32>,
    pub daily_used: Option<u32>,
}

impl RateLimitInfo {
    /// A limit that never constrains selection.
    pub fn unlimited() -> Self {
        Self {
            requests_per_minute: 0,
            requests_remaining: 0,
            reset_time: Utc::now(),
            daily_limit: None,
            daily_used: None,
        }
    }

    /// Fraction of the per-minute budget already spent, 0 when no limit is known
    pub fn utilization(&self) -> f64 {
        if self.requests_per_minute == 0 {
            return 0.0;
        }
        let remaining = self.requests_remaining.min(self.requests_per_minute) as f64;
        1.0 - remaining / self.requests_per_minute as f64
    }
}

impl Default for RateLimitInfo {
    fn default() -> Self {
        Self::unlimited()
    }
}
