//! Plugin configuration from host launch arguments and the environment.
//!
//! The host launches the plugin with `-port`, `-pluginUUID`,
//! `-registerEvent` and `-info`. Those are parsed with `clap` after the
//! single-dash flags are rewritten to `--` form. Tuning knobs come from
//! environment variables (or a `.env` file via `dotenvy`).

use std::time::Duration;

use clap::Parser;

use crate::error::BridgeError;

/// Smallest accepted health sweep period. Anything shorter risks replacing
/// sessions that are still inside a normal authentication round trip.
pub const MIN_HEALTH_INTERVAL_SECS: u64 = 5;

/// Arguments the host passes when it spawns the plugin process.
#[derive(Debug, Clone, Parser)]
#[command(name = "obs-counter-bridge", about = "Stream Deck counter with OBS text sync")]
pub struct LaunchArgs {
    /// Port of the host's local WebSocket server.
    #[arg(long)]
    pub port: u16,

    /// Opaque identifier used to register with the host.
    #[arg(long = "pluginUUID")]
    pub plugin_uuid: String,

    /// Event name to send in the registration message.
    #[arg(long = "registerEvent")]
    pub register_event: String,

    /// Host and device information as a JSON string.
    #[arg(long, default_value = "{}")]
    pub info: String,
}

impl LaunchArgs {
    /// Parses launch arguments, accepting the host's single-dash long flags.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if a required flag is missing
    /// or `-port` is not a valid port number.
    pub fn parse_host_args<I>(args: I) -> Result<Self, BridgeError>
    where
        I: IntoIterator<Item = String>,
    {
        Self::try_parse_from(args.into_iter().map(normalize_flag))
            .map_err(|e| BridgeError::Configuration(e.to_string()))
    }
}

/// Rewrites `-name` to `--name`, leaving values and `--flags` untouched.
fn normalize_flag(arg: String) -> String {
    let mut chars = arg.chars();
    match (chars.next(), chars.next()) {
        (Some('-'), Some(c)) if c.is_ascii_alphabetic() && arg.len() > 2 => format!("-{arg}"),
        _ => arg,
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level plugin configuration.
///
/// Loaded once at startup via [`BridgeConfig::from_args_and_env`].
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Port of the host WebSocket server on loopback.
    pub host_port: u16,

    /// Identifier sent in the registration message.
    pub plugin_uuid: String,

    /// Registration event name.
    pub register_event: String,

    /// Period of the OBS health sweep.
    pub health_interval: Duration,

    /// Upper bound on a single OBS connect attempt.
    pub connect_timeout: Duration,

    /// How long a key must be held to reset the counter.
    pub long_press: Duration,

    /// Title shown while OBS connectivity is required but not authenticated.
    pub unknown_indicator: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Host application version from `-info`, when present.
    pub host_version: Option<String>,
}

impl BridgeConfig {
    /// Loads configuration from the process arguments and environment.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if the launch arguments are
    /// incomplete or a tuning knob is out of range.
    pub fn from_args_and_env() -> Result<Self, BridgeError> {
        dotenvy::dotenv().ok();
        let args = LaunchArgs::parse_host_args(std::env::args())?;
        Self::from_launch(args, |key| std::env::var(key).ok())
    }

    /// Builds a configuration from parsed arguments and a variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Configuration`] if the health interval is
    /// shorter than [`MIN_HEALTH_INTERVAL_SECS`] or the long-press delay is
    /// zero.
    pub fn from_launch<F>(args: LaunchArgs, lookup: F) -> Result<Self, BridgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let health_secs = parse_var(&lookup, "OBS_HEALTH_INTERVAL_SECS", 12u64);
        if health_secs < MIN_HEALTH_INTERVAL_SECS {
            return Err(BridgeError::Configuration(format!(
                "OBS_HEALTH_INTERVAL_SECS must be at least {MIN_HEALTH_INTERVAL_SECS}, got {health_secs}"
            )));
        }

        let long_press_ms = parse_var(&lookup, "LONG_PRESS_MS", 3_000u64);
        if long_press_ms == 0 {
            return Err(BridgeError::Configuration(
                "LONG_PRESS_MS must be positive".to_string(),
            ));
        }

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let host_version = host_version(&args.info);

        Ok(Self {
            host_port: args.port,
            plugin_uuid: args.plugin_uuid,
            register_event: args.register_event,
            health_interval: Duration::from_secs(health_secs),
            connect_timeout: Duration::from_secs(parse_var(
                &lookup,
                "OBS_CONNECT_TIMEOUT_SECS",
                5u64,
            )),
            long_press: Duration::from_millis(long_press_ms),
            unknown_indicator: lookup("DISPLAY_UNKNOWN_INDICATOR")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "?".to_string()),
            log_format,
            host_version,
        })
    }

    /// URL of the host's WebSocket server.
    #[must_use]
    pub fn host_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.host_port)
    }
}

/// Reads `application.version` from the host's `-info` JSON.
fn host_version(info: &str) -> Option<String> {
    let info: serde_json::Value = serde_json::from_str(info).ok()?;
    info.pointer("/application/version")?
        .as_str()
        .map(str::to_string)
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
