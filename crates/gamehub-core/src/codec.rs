//! JSON codec for relay text frames.

use crate::error::{RelayError, RelayResult};
use crate::messages::{Inbound, INBOUND_TAGS};
use serde_json::Value;

/// Encode any serializable value into a text frame.
pub fn encode<T: serde::Serialize>(value: &T) -> RelayResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decode an inbound text frame.
///
/// Frames without a string `cmd` and frames whose `cmd` is not one of
/// [`INBOUND_TAGS`] are rejected with [`RelayError::InvalidMessage`] so the
/// caller can log the offending tag.
pub fn decode_inbound(text: &str) -> RelayResult<Inbound> {
    let value: Value = serde_json::from_str(text)?;
    let cmd = match value.get("cmd") {
        Some(Value::String(cmd)) => cmd.as_str(),
        Some(_) => return Err(RelayError::InvalidMessage("cmd is not a string".into())),
        None => return Err(RelayError::InvalidMessage("missing cmd".into())),
    };
    if !INBOUND_TAGS.contains(&cmd) {
        return Err(RelayError::InvalidMessage(format!("unknown cmd: {cmd}")));
    }
    Ok(serde_json::from_value(value)?)
}
