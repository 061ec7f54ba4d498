//! Per-context configuration and its persisted settings form.
//!
//! The host stores a settings object per key and hands it back on
//! `willAppear` and `didReceiveSettings`. [`RawSettings`] is that object as
//! received (every field optional), [`ContextConfig`] is the resolved,
//! cached configuration the plugin works with, and [`PersistedSettings`] is
//! what gets written back with `setSettings`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// obs-websocket URL used when none is configured.
pub const DEFAULT_OBS_URL: &str = "ws://localhost:4455";

/// OBS text input name used when none is configured.
pub const DEFAULT_TEXT_SOURCE: &str = "CounterText";

/// Settings object as delivered by the host. Absent fields are `None`.
///
/// Each field is read on its own: a value of the wrong type is treated as
/// absent rather than invalidating the whole object.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSettings {
    /// Counter value; a number or a numeric string.
    #[serde(default, deserialize_with = "present")]
    pub count: Option<Value>,
    /// Whether OBS mirroring is on, by JavaScript truthiness.
    #[serde(default, deserialize_with = "truthy")]
    pub obs_enabled: Option<bool>,
    /// obs-websocket server URL.
    #[serde(default, deserialize_with = "text")]
    pub obs_web_socket_url: Option<String>,
    /// obs-websocket password.
    #[serde(default, deserialize_with = "text")]
    pub obs_web_socket_password: Option<String>,
    /// Name of the OBS text input to update.
    #[serde(default, deserialize_with = "text")]
    pub obs_text_source_name: Option<String>,
}

impl RawSettings {
    /// Parses a host settings value, falling back to empty settings when the
    /// value is missing or is not an object.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };
        match serde_json::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed settings object");
                Self::default()
            }
        }
    }

    fn count(&self) -> Option<i64> {
        self.count.as_ref().map(lenient_count)
    }
}

/// Interprets a count value the way the settings editor produces it: a
/// JSON number, or a string holding a leading integer. Anything else is 0.
#[must_use]
pub fn lenient_count(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => leading_integer(s.trim()).unwrap_or(0),
        _ => 0,
    }
}

fn leading_integer(s: &str) -> Option<i64> {
    let end = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(s.len(), |(i, _)| i);
    s.get(..end)?.parse().ok()
}

fn present<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok((!value.is_null()).then_some(value))
}

fn truthy<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        Value::Bool(b) => Some(b),
        Value::Number(n) => Some(n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan())),
        Value::String(s) => Some(!s.is_empty()),
        Value::Array(_) | Value::Object(_) => Some(true),
    })
}

fn text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => {
            tracing::warn!(value = %other, "ignoring non-text settings field");
            None
        }
    })
}

/// Resolved configuration for one context.
///
/// The last resolved copy is cached for the context's lifetime so that
/// value-only updates never lose the OBS fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    /// Whether OBS mirroring is on.
    pub enabled: bool,
    /// obs-websocket server URL.
    pub url: String,
    /// obs-websocket password; may be empty.
    pub credential: String,
    /// Name of the OBS text input to update.
    pub target_field: String,
    /// Current counter value.
    pub value: i64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: DEFAULT_OBS_URL.to_string(),
            credential: String::new(),
            target_field: DEFAULT_TEXT_SOURCE.to_string(),
            value: 0,
        }
    }
}

impl ContextConfig {
    /// Resolves settings delivered with `willAppear`. Missing or empty
    /// fields take their defaults.
    #[must_use]
    pub fn from_appear(raw: &RawSettings) -> Self {
        let defaults = Self::default();
        Self {
            enabled: raw.obs_enabled.unwrap_or(false),
            url: non_empty(raw.obs_web_socket_url.as_deref()).unwrap_or(defaults.url),
            credential: raw.obs_web_socket_password.clone().unwrap_or_default(),
            target_field: non_empty(raw.obs_text_source_name.as_deref())
                .unwrap_or(defaults.target_field),
            value: raw.count().unwrap_or(0),
        }
    }

    /// Resolves settings delivered with `didReceiveSettings` on top of the
    /// previously cached configuration.
    ///
    /// Present fields win; absent fields keep the cached value. URL and
    /// input name also keep the cached value when delivered empty.
    #[must_use]
    pub fn from_update(previous: Option<&Self>, raw: &RawSettings) -> Self {
        let base = previous.cloned().unwrap_or_default();
        Self {
            enabled: raw.obs_enabled.unwrap_or(base.enabled),
            url: non_empty(raw.obs_web_socket_url.as_deref()).unwrap_or(base.url),
            credential: raw
                .obs_web_socket_password
                .clone()
                .unwrap_or(base.credential),
            target_field: non_empty(raw.obs_text_source_name.as_deref())
                .unwrap_or(base.target_field),
            value: raw.count().unwrap_or(base.value),
        }
    }

    /// Returns `true` if this context needs an authenticated OBS session:
    /// mirroring is on and both URL and input name are set.
    #[must_use]
    pub fn requires_obs(&self) -> bool {
        self.enabled && !self.url.is_empty() && !self.target_field.is_empty()
    }

    /// Settings object to persist through the host.
    #[must_use]
    pub fn to_settings(&self) -> PersistedSettings {
        PersistedSettings {
            count: self.value,
            obs_enabled: self.enabled,
            obs_web_socket_url: self.url.clone(),
            obs_web_socket_password: self.credential.clone(),
            obs_text_source_name: self.target_field.clone(),
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(str::to_string)
}

/// Complete settings object written back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSettings {
    /// Counter value.
    pub count: i64,
    /// Whether OBS mirroring is on.
    pub obs_enabled: bool,
    /// obs-websocket server URL.
    pub obs_web_socket_url: String,
    /// obs-websocket password.
    pub obs_web_socket_password: String,
    /// Name of the OBS text input.
    pub obs_text_source_name: String,
}
