//! Markdown rendering of export payloads.

use pmos_core::export::ExportRequest;
use serde_json::Value;

/// Render a request as a standalone markdown document.
///
/// String payloads are used as the body verbatim. Object payloads become one
/// section per field.
pub fn render_markdown(request: &ExportRequest) -> String {
    let mut out = format!("# {}\n\n", request.title.trim());
    match &request.payload {
        Value::String(body) => out.push_str(body.trim()),
        Value::Object(fields) => {
            let sections: Vec<String> = fields
                .iter()
                .map(|(key, value)| format!("## {}\n\n{}", heading(key), render_value(value)))
                .collect();
            out.push_str(&sections.join("\n\n"));
        }
        Value::Null => {}
        other => out.push_str(&render_value(other)),
    }
    out.push('\n');
    out
}

fn heading(key: &str) -> String {
    let words: Vec<String> = key
        .split(['_', '-'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    words.join(" ")
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => format!("- {}", s.trim()),
                other => format!("- {other}"),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => "_none_".into(),
        other => match serde_json::to_string_pretty(other) {
            Ok(pretty) => format!("```json\n{pretty}\n```"),
            Err(_) => other.to_string(),
        },
    }
}
