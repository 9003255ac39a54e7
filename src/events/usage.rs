//! Token usage and rate-limit payloads.
//!
//! The producer has reported token counts in two schema generations: flat
//! counters directly on the payload, and a nested `info` object carrying
//! cumulative and last-turn counters plus the model context window. Both
//! normalize into [`TokenUsage`]; when a payload carries both shapes the
//! nested one wins because it is strictly richer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One set of token counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenCounts {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub cached_input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub reasoning_output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// One named quota window (e.g. primary/secondary).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitWindow {
    /// Percentage of the window already consumed.
    pub used_percent: f64,
    #[serde(default)]
    pub window_minutes: Option<u64>,
    #[serde(default)]
    pub resets_in_seconds: Option<u64>,
}

/// Rate-limit snapshot embedded in token-usage events.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    #[serde(default)]
    pub primary: Option<RateLimitWindow>,
    #[serde(default)]
    pub secondary: Option<RateLimitWindow>,
}

/// Normalized token usage for one token-count event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TokenUsage {
    /// Cumulative counters for the session.
    pub total: TokenCounts,
    /// Counters for the most recent turn, when reported.
    pub last: Option<TokenCounts>,
    /// Model context window size, when reported.
    pub model_context_window: Option<u64>,
    /// Quota windows, when reported.
    pub rate_limits: Option<RateLimitSnapshot>,
}

/// Nested `info` object from the newer schema generation.
#[derive(Debug, Clone, Deserialize)]
struct UsageInfo {
    #[serde(default)]
    total_token_usage: Option<TokenCounts>,
    #[serde(default)]
    last_token_usage: Option<TokenCounts>,
    #[serde(default)]
    model_context_window: Option<u64>,
}

impl TokenUsage {
    /// Build a normalized usage record from a token-count payload.
    ///
    /// Returns `None` (logged by the caller) when the payload carries
    /// neither counter shape nor rate limits.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let rate_limits = payload
            .get("rate_limits")
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value::<RateLimitSnapshot>(v.clone()).ok());

        let info = payload
            .get("info")
            .filter(|v| !v.is_null())
            .and_then(|v| serde_json::from_value::<UsageInfo>(v.clone()).ok());

        let flat = has_flat_counters(payload)
            .then(|| serde_json::from_value::<TokenCounts>(payload.clone()).ok())
            .flatten();

        match (info, flat) {
            (Some(info), _) => Some(Self {
                total: info.total_token_usage.unwrap_or_default(),
                last: info.last_token_usage,
                model_context_window: info.model_context_window,
                rate_limits,
            }),
            (None, Some(counts)) => Some(Self {
                total: counts,
                last: None,
                model_context_window: payload
                    .get("model_context_window")
                    .and_then(Value::as_u64),
                rate_limits,
            }),
            (None, None) if rate_limits.is_some() => Some(Self {
                rate_limits,
                ..Self::default()
            }),
            (None, None) => None,
        }
    }
}

fn has_flat_counters(payload: &Value) -> bool {
    ["input_tokens", "output_tokens", "total_tokens"]
        .iter()
        .any(|key| payload.get(key).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_generation() {
        let payload = json!({
            "input_tokens": 100,
            "cached_input_tokens": 20,
            "output_tokens": 50,
            "total_tokens": 150
        });
        let usage = TokenUsage::from_payload(&payload).unwrap();
        assert_eq!(usage.total.input_tokens, 100);
        assert_eq!(usage.total.cached_input_tokens, 20);
        assert_eq!(usage.total.total_tokens, 150);
        assert!(usage.last.is_none());
    }

    #[test]
    fn test_nested_generation() {
        let payload = json!({
            "info": {
                "total_token_usage": {"input_tokens": 500, "output_tokens": 200, "total_tokens": 700},
                "last_token_usage": {"input_tokens": 10, "output_tokens": 5, "total_tokens": 15},
                "model_context_window": 272000
            }
        });
        let usage = TokenUsage::from_payload(&payload).unwrap();
        assert_eq!(usage.total.total_tokens, 700);
        assert_eq!(usage.last.unwrap().total_tokens, 15);
        assert_eq!(usage.model_context_window, Some(272000));
    }

    #[test]
    fn test_nested_wins_over_flat_when_both_present() {
        let payload = json!({
            "total_tokens": 1,
            "info": {
                "total_token_usage": {"total_tokens": 700}
            }
        });
        let usage = TokenUsage::from_payload(&payload).unwrap();
        assert_eq!(usage.total.total_tokens, 700);
    }

    #[test]
    fn test_rate_limits() {
        let payload = json!({
            "total_tokens": 10,
            "rate_limits": {
                "primary": {"used_percent": 42.5, "window_minutes": 300, "resets_in_seconds": 1200},
                "secondary": {"used_percent": 3.0}
            }
        });
        let usage = TokenUsage::from_payload(&payload).unwrap();
        let limits = usage.rate_limits.unwrap();
        let primary = limits.primary.unwrap();
        assert!((primary.used_percent - 42.5).abs() < f64::EPSILON);
        assert_eq!(primary.window_minutes, Some(300));
        assert_eq!(limits.secondary.unwrap().resets_in_seconds, None);
    }

    #[test]
    fn test_rate_limits_only() {
        let payload = json!({
            "rate_limits": {"primary": {"used_percent": 10.0}}
        });
        let usage = TokenUsage::from_payload(&payload).unwrap();
        assert_eq!(usage.total, TokenCounts::default());
        assert!(usage.rate_limits.is_some());
    }

    #[test]
    fn test_empty_payload_yields_none() {
        assert!(TokenUsage::from_payload(&json!({})).is_none());
        assert!(TokenUsage::from_payload(&json!({"info": null})).is_none());
    }
}
