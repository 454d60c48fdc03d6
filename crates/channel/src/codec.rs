//! Wire encoding of messages as flat field lists.
//!
//! A message is flattened to `[k1, v1, k2, v2, ...]`. Strings are written
//! raw, every other value as its JSON text. Decoding parses each value as
//! JSON and falls back to the raw string, so a string field that looks like
//! a number or boolean comes back as a number or boolean.

use common::Payload;
use serde_json::Value;

/// Flattens a message into alternating key/value fields.
pub fn encode(message: &Payload) -> Vec<String> {
    let mut fields = Vec::with_capacity(message.len() * 2);
    for (key, value) in message {
        fields.push(key.clone());
        fields.push(encode_value(value));
    }
    fields
}

/// Renders a single value for the wire.
pub fn encode_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Rebuilds a message from alternating key/value fields.
///
/// A trailing key without a value decodes to `null`.
pub fn decode(fields: &[String]) -> Payload {
    let mut message = Payload::new();
    for pair in fields.chunks(2) {
        let value = pair.get(1).map(|raw| decode_value(raw)).unwrap_or(Value::Null);
        message.insert(pair[0].clone(), value);
    }
    message
}

/// Parses a single wire value.
pub fn decode_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
