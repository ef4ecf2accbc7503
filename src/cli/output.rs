//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use crate::core::Key;
use crate::error::Error;
use serde_json::{Value, json};
use std::fmt::Write;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats a stored value.
///
/// In text mode a JSON string prints as its raw contents and anything else
/// as compact JSON.
#[must_use]
pub fn format_value(value: &Value, format: OutputFormat) -> String {
    match (value, format) {
        (Value::String(s), OutputFormat::Text) => format!("{s}\n"),
        _ => format!("{value}\n"),
    }
}

/// Formats a key listing.
#[must_use]
pub fn format_keys(keys: &[Key], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            for key in keys {
                match key.as_text() {
                    Some(text) => {
                        let _ = writeln!(output, "{text}");
                    }
                    None => {
                        let _ = writeln!(output, "{key}");
                    }
                }
            }
            output
        }
        OutputFormat::Json => {
            let keys: Vec<Value> = keys.iter().map(key_to_json).collect();
            format!("{}\n", Value::Array(keys))
        }
    }
}

/// Formats an error for display.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json => json!({ "error": error.to_string() }).to_string(),
    }
}

/// JSON form of a key. Blobs use their SQL literal.
fn key_to_json(key: &Key) -> Value {
    match key {
        Key::Null => Value::Null,
        Key::Integer(n) => json!(n),
        Key::Real(x) => json!(x),
        Key::Text(s) => json!(s),
        Key::Blob(_) => json!(key.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("text"), OutputFormat::Text);
        assert_eq!(OutputFormat::parse("other"), OutputFormat::Text);
    }

    #[test]
    fn test_format_value_text() {
        assert_eq!(format_value(&json!("test"), OutputFormat::Text), "test\n");
        assert_eq!(format_value(&json!({"a": 1}), OutputFormat::Text), "{\"a\":1}\n");
        assert_eq!(format_value(&json!(3), OutputFormat::Text), "3\n");
    }

    #[test]
    fn test_format_value_json() {
        assert_eq!(format_value(&json!("test"), OutputFormat::Json), "\"test\"\n");
    }

    #[test]
    fn test_format_keys() {
        let keys = [Key::from("a"), Key::from(13), Key::Null];
        assert_eq!(format_keys(&keys, OutputFormat::Text), "a\n13\nNULL\n");
        assert_eq!(
            format_keys(&keys, OutputFormat::Json),
            "[\"a\",13,null]\n"
        );
        assert_eq!(format_keys(&[], OutputFormat::Text), "");
    }

    #[test]
    fn test_format_error() {
        let err: Error = StorageError::LockContention("database is locked".to_string()).into();
        assert_eq!(
            format_error(&err, OutputFormat::Text),
            "storage error: database is locked"
        );
        assert_eq!(
            format_error(&err, OutputFormat::Json),
            r#"{"error":"storage error: database is locked"}"#
        );
    }
}
