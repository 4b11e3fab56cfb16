//! Record representation shared by candidates, references and consensus output.

use serde_json::{Map, Value};

/// A flat mapping of field name to JSON value.
///
/// Backed by an insertion-ordered map, so a record built by walking a schema
/// serializes its fields in the schema's declared order.
pub type Record = Map<String, Value>;

/// Normalize text for keying: trim, lowercase and collapse runs of whitespace.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.chars().flat_map(char::to_lowercase));
    }
    out
}

/// Short human-readable name of a JSON value's kind, used in error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
