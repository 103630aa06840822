//! Translation between wire frames and protocol messages.

use crate::{AtlasError, Result};
use atlas_types::{WsClientMessage, WsServerMessage};
use serde_json::Value;

/// Encode a user prompt as an outbound `message` frame.
///
/// The text is trimmed; blank input is rejected.
pub fn encode_user_message(text: &str) -> Result<String> {
    let content = text.trim();
    if content.is_empty() {
        return Err(AtlasError::EmptyMessage);
    }
    let frame = WsClientMessage::Message {
        content: content.to_string(),
    };
    Ok(serde_json::to_string(&frame)?)
}

/// Decode and validate one inbound frame.
pub fn decode_frame(raw: &str) -> Result<WsServerMessage> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| AtlasError::MalformedFrame(e.to_string()))?;

    let kind = match value.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(_) => return Err(AtlasError::MalformedFrame("\"type\" is not a string".into())),
        None if value.is_object() => {
            return Err(AtlasError::MalformedFrame("missing \"type\"".into()));
        }
        None => return Err(AtlasError::MalformedFrame("frame is not an object".into())),
    };

    if !WsServerMessage::is_known_kind(&kind) {
        return Err(AtlasError::UnknownEventKind(kind));
    }

    serde_json::from_value(value).map_err(|e| AtlasError::MalformedFrame(format!("{kind}: {e}")))
}
