//! Message payload helpers.
//!
//! The kernel treats a message as an opaque JSON payload. By convention a
//! message is either a plain string or an array of nodes shaped like
//! `{"type": "text", "data": {"text": "..."}}`; these helpers build and read
//! that convention without constraining connectors to it.

use serde_json::{Value, json};

/// Builds a single text node.
pub fn text_node(text: impl Into<String>) -> Value {
    json!({ "type": "text", "data": { "text": text.into() } })
}

/// Builds a message consisting of one text node.
pub fn text(text: impl Into<String>) -> Value {
    Value::Array(vec![text_node(text)])
}

/// Concatenates the text content of a message.
///
/// Strings are returned as-is; for node arrays only `text` nodes contribute.
/// Anything else yields an empty string.
pub fn plain_text(message: &Value) -> String {
    match message {
        Value::String(s) => s.clone(),
        Value::Array(nodes) => nodes
            .iter()
            .filter(|node| node.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|node| node.pointer("/data/text").and_then(Value::as_str))
            .collect(),
        _ => String::new(),
    }
}

/// Returns the node types in a message that are not plain text.
pub fn non_text_types(message: &Value) -> Vec<&str> {
    match message {
        Value::Array(nodes) => nodes
            .iter()
            .filter_map(|node| node.get("type").and_then(Value::as_str))
            .filter(|ty| *ty != "text")
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_of_nodes() {
        let message = json!([
            { "type": "text", "data": { "text": "hello " } },
            { "type": "image", "data": { "file": "a.png" } },
            { "type": "text", "data": { "text": "world" } },
        ]);
        assert_eq!(plain_text(&message), "hello world");
        assert_eq!(non_text_types(&message), vec!["image"]);
    }

    #[test]
    fn plain_text_of_string_and_other() {
        assert_eq!(plain_text(&json!("hi")), "hi");
        assert_eq!(plain_text(&json!(3)), "");
        assert_eq!(plain_text(&text("abc")), "abc");
    }
}
