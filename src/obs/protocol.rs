//! obs-websocket v5 wire types and the authentication algorithm.
//!
//! Every frame is a UTF-8 JSON object `{ "op": <int>, "d": <object> }`.
//! Only the subset this plugin speaks is modelled here.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::BridgeError;

/// obs-websocket op codes.
pub mod op {
    /// Server → client, first frame after connect.
    pub const HELLO: u8 = 0;
    /// Client → server, identification (and optional auth).
    pub const IDENTIFY: u8 = 1;
    /// Server → client, identification accepted.
    pub const IDENTIFIED: u8 = 2;
    /// Server → client, subscribed event.
    pub const EVENT: u8 = 5;
    /// Client → server, request.
    pub const REQUEST: u8 = 6;
    /// Server → client, response to a request.
    pub const REQUEST_RESPONSE: u8 = 7;
    /// Request batch. Only ever received as noise; treated as informational.
    pub const REQUEST_BATCH: u8 = 8;
    /// Response to a request batch; informational.
    pub const REQUEST_BATCH_RESPONSE: u8 = 9;

    /// Returns `true` for op codes that are logged but never change
    /// session state.
    #[must_use]
    pub const fn is_informational(op: u8) -> bool {
        matches!(
            op,
            EVENT | REQUEST_RESPONSE | REQUEST_BATCH | REQUEST_BATCH_RESPONSE
        )
    }
}

/// RPC version announced when the server's Hello omits one.
pub const DEFAULT_RPC_VERSION: u32 = 1;

/// Request type used to update a text input.
pub const SET_INPUT_SETTINGS: &str = "SetInputSettings";

/// A received frame with its payload left as raw JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingFrame {
    /// Op code.
    pub op: u8,
    /// Op-specific payload.
    #[serde(default)]
    pub d: Value,
}

impl IncomingFrame {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Protocol`] if the text is not a JSON object
    /// with an integer `op`.
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Hello payload (`op = 0`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    /// Latest RPC version the server supports.
    #[serde(default = "default_rpc_version")]
    pub rpc_version: u32,
    /// Present when the server requires authentication.
    #[serde(default)]
    pub authentication: Option<AuthChallenge>,
}

fn default_rpc_version() -> u32 {
    DEFAULT_RPC_VERSION
}

/// Authentication challenge carried by Hello.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthChallenge {
    /// Per-server salt.
    pub salt: String,
    /// Per-connection challenge.
    pub challenge: String,
}

/// Identify payload (`op = 1`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    /// RPC version to use for this session.
    pub rpc_version: u32,
    /// Authentication response; omitted when not authenticating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    /// Event subscription bitmask; this client subscribes to nothing.
    pub event_subscriptions: u32,
}

/// Request payload (`op = 6`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request<T> {
    /// Request type name.
    pub request_type: &'static str,
    /// Client-chosen id echoed in the response.
    pub request_id: String,
    /// Request-specific data.
    pub request_data: T,
}

/// `SetInputSettings` data for a text input.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTextData {
    /// Input to update.
    pub input_name: String,
    /// Settings overlay.
    pub input_settings: TextSettings,
}

/// Text input settings overlay.
#[derive(Debug, Clone, Serialize)]
pub struct TextSettings {
    /// New text.
    pub text: String,
}

/// Status block of a RequestResponse.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestStatus {
    /// Whether the request succeeded.
    pub result: bool,
    /// Numeric status code.
    pub code: u32,
    /// Optional failure detail.
    #[serde(default)]
    pub comment: Option<String>,
}

/// RequestResponse payload, only the fields this plugin logs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    /// Request type being answered.
    #[serde(default)]
    pub request_type: String,
    /// Id of the originating request.
    #[serde(default)]
    pub request_id: String,
    /// Outcome.
    pub request_status: RequestStatus,
}

#[derive(Serialize)]
struct OutgoingFrame<T> {
    op: u8,
    d: T,
}

/// Serializes an Identify frame.
///
/// # Errors
///
/// Returns [`BridgeError::Protocol`] if serialization fails.
pub fn identify_frame(identify: &Identify) -> Result<String, BridgeError> {
    encode(op::IDENTIFY, identify)
}

/// Serializes a `SetInputSettings` request that sets `input_name`'s text.
///
/// # Errors
///
/// Returns [`BridgeError::Protocol`] if serialization fails.
pub fn set_text_frame(request_id: u64, input_name: &str, text: String) -> Result<String, BridgeError> {
    encode(
        op::REQUEST,
        Request {
            request_type: SET_INPUT_SETTINGS,
            request_id: request_id.to_string(),
            request_data: SetTextData {
                input_name: input_name.to_string(),
                input_settings: TextSettings { text },
            },
        },
    )
}

fn encode<T: Serialize>(op: u8, d: T) -> Result<String, BridgeError> {
    Ok(serde_json::to_string(&OutgoingFrame { op, d })?)
}

/// Computes the obs-websocket authentication response:
///
/// ```text
/// secret   = base64(sha256(password + salt))
/// response = base64(sha256(secret + challenge))
/// ```
#[must_use]
pub fn auth_response(password: &str, salt: &str, challenge: &str) -> String {
    let engine = base64::engine::general_purpose::STANDARD;

    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    let secret = engine.encode(hasher.finalize());

    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(challenge.as_bytes());
    engine.encode(hasher.finalize())
}
