//! JSON codec for the tagged envelopes exchanged with the game server.
//!
//! Every frame is a JSON object with exactly one key naming the variant,
//! e.g. `{"Turn": {"direction": "Up"}}`.

use crate::{ClientMessage, RegisterPayload, ServerMessage, TurnPayload, MAX_ARENA_SIDE};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug)]
pub enum CodecError {
    /// Frame is not valid JSON, or a value could not be encoded
    Json(serde_json::Error),
    /// Frame is JSON but not a single-key object
    Envelope(String),
    /// Known variant whose payload does not match its schema
    Payload {
        tag: String,
        source: serde_json::Error,
    },
    /// Payload parsed but violates a protocol constraint
    Invalid { tag: String, reason: String },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Json(e) => write!(f, "invalid JSON frame: {}", e),
            CodecError::Envelope(reason) => write!(f, "malformed envelope: {}", reason),
            CodecError::Payload { tag, source } => {
                write!(f, "malformed {} payload: {}", tag, source)
            }
            CodecError::Invalid { tag, reason } => write!(f, "invalid {} payload: {}", tag, reason),
        }
    }
}

impl std::error::Error for CodecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecError::Json(e) => Some(e),
            CodecError::Payload { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Json(e)
    }
}

pub fn encode_client_message(message: &ClientMessage) -> Result<String, CodecError> {
    Ok(serde_json::to_string(message)?)
}

/// Encodes a server event. Only used by test servers and tooling; the
/// client never sends these.
pub fn encode_server_message(message: &ServerMessage) -> Result<String, CodecError> {
    let payload = match message {
        ServerMessage::Register(register) => serde_json::to_value(register)?,
        ServerMessage::Turn(turn) => serde_json::to_value(turn)?,
        ServerMessage::Unknown { .. } => Value::Object(Map::new()),
    };

    let mut envelope = Map::with_capacity(1);
    envelope.insert(message.tag().to_string(), payload);
    Ok(serde_json::to_string(&Value::Object(envelope))?)
}

pub fn decode_server_message(text: &str) -> Result<ServerMessage, CodecError> {
    let value: Value = serde_json::from_str(text)?;

    let mut envelope = match value {
        Value::Object(map) => map,
        other => {
            return Err(CodecError::Envelope(format!(
                "expected an object, got {}",
                json_kind(&other)
            )))
        }
    };

    if envelope.len() != 1 {
        return Err(CodecError::Envelope(format!(
            "expected exactly one variant key, got {}",
            envelope.len()
        )));
    }

    let tag = match envelope.keys().next() {
        Some(tag) => tag.clone(),
        None => return Err(CodecError::Envelope("empty object".to_string())),
    };
    let payload = envelope.remove(&tag).unwrap_or(Value::Null);

    match tag.as_str() {
        "Register" => {
            let register: RegisterPayload = serde_json::from_value(payload)
                .map_err(|source| CodecError::Payload {
                    tag: tag.clone(),
                    source,
                })?;
            if register.field_width == 0 || register.field_height == 0 {
                return Err(CodecError::Invalid {
                    tag,
                    reason: format!(
                        "arena must be non-empty, got {}x{}",
                        register.field_width, register.field_height
                    ),
                });
            }
            if register.field_width > MAX_ARENA_SIDE || register.field_height > MAX_ARENA_SIDE {
                return Err(CodecError::Invalid {
                    tag,
                    reason: format!(
                        "arena {}x{} exceeds the {} tile limit per side",
                        register.field_width, register.field_height, MAX_ARENA_SIDE
                    ),
                });
            }
            Ok(ServerMessage::Register(register))
        }
        "Turn" => {
            let turn: TurnPayload =
                serde_json::from_value(payload).map_err(|source| CodecError::Payload {
                    tag: tag.clone(),
                    source,
                })?;
            Ok(ServerMessage::Turn(turn))
        }
        _ => Ok(ServerMessage::Unknown { tag }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
