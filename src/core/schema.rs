//! Response body schemas inferred from the literal passed to `res.json()`/`res.send()`.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::params::{infer_format, infer_type};
use super::text::{find_matching, is_identifier, split_top_level, unquote};

/// JSON-schema-like description of a response payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SchemaNode {
    String {
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    Number,
    Boolean,
    Object {
        properties: BTreeMap<String, SchemaNode>,
    },
    Array {
        items: Box<SchemaNode>,
    },
    Null,
    Any,
}

impl SchemaNode {
    fn plain_string() -> Self {
        SchemaNode::String { format: None }
    }

    /// Attach a name-derived format to an unformatted string node
    fn with_name_format(self, key: &str) -> Self {
        match self {
            SchemaNode::String { format: None } => SchemaNode::String {
                format: infer_format(key).map(str::to_string),
            },
            other => other,
        }
    }

    fn object(properties: BTreeMap<String, SchemaNode>) -> Self {
        SchemaNode::Object { properties }
    }
}

/// Rewrite a JavaScript object/array literal so a strict JSON parser can read it.
///
/// Comments are dropped, single-quoted and template strings become double-quoted,
/// bare keys get quoted, trailing commas go and `undefined` becomes `null`.
pub fn sanitize_js_literal(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                out.push('"');
                i += 1;
                while i < chars.len() && chars[i] != c {
                    match chars[i] {
                        '\\' if i + 1 < chars.len() => {
                            if chars[i + 1] != '\'' && chars[i + 1] != '`' {
                                out.push('\\');
                            }
                            out.push(chars[i + 1]);
                            i += 2;
                            continue;
                        }
                        '"' => out.push_str("\\\""),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        other => out.push(other),
                    }
                    i += 1;
                }
                out.push('"');
                i += 1;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(',');
                }
                i += 1;
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let next = chars[i..].iter().find(|c| !c.is_whitespace());
                let prev = out.chars().rev().find(|c| !c.is_whitespace());
                let is_key = next == Some(&':') && matches!(prev, Some('{') | Some(','));

                if is_key {
                    out.push('"');
                    out.push_str(&word);
                    out.push('"');
                } else if word == "undefined" {
                    out.push_str("null");
                } else {
                    out.push_str(&word);
                }
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }

    out
}

/// Parse an object or array literal, if it is plain enough to survive sanitizing
pub fn parse_literal(argument: &str) -> Option<Value> {
    let trimmed = argument.trim();
    let looks_structured = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    if !looks_structured {
        return None;
    }
    serde_json::from_str(&sanitize_js_literal(trimmed)).ok()
}

/// Structural schema of a parsed JSON value
pub fn schema_from_value(value: &Value) -> SchemaNode {
    match value {
        Value::Null => SchemaNode::Null,
        Value::Bool(_) => SchemaNode::Boolean,
        Value::Number(_) => SchemaNode::Number,
        Value::String(_) => SchemaNode::plain_string(),
        Value::Array(items) => SchemaNode::Array {
            items: Box::new(items.first().map(schema_from_value).unwrap_or(SchemaNode::Any)),
        },
        Value::Object(map) => SchemaNode::object(
            map.iter()
                .map(|(key, v)| (key.clone(), schema_from_value(v).with_name_format(key)))
                .collect(),
        ),
    }
}

/// Best-effort schema for a literal that would not parse as JSON
pub fn schema_from_text(argument: &str) -> SchemaNode {
    let text = argument.trim();

    if text.starts_with('{') {
        let inner = match find_matching(text, 0) {
            Some(end) => &text[1..end],
            None => &text[1..],
        };
        return SchemaNode::object(object_properties(inner));
    }

    if text.starts_with('[') {
        let inner = match find_matching(text, 0) {
            Some(end) => &text[1..end],
            None => &text[1..],
        };
        let first = split_top_level(inner, ",").into_iter().map(str::trim).find(|s| !s.is_empty());
        return SchemaNode::Array {
            items: Box::new(first.map(value_schema).unwrap_or(SchemaNode::Any)),
        };
    }

    if unquote(text).is_some() {
        return SchemaNode::plain_string();
    }

    if is_dotted_identifier(text) {
        return SchemaNode::object(BTreeMap::new());
    }

    SchemaNode::plain_string()
}

/// Infer a schema for a response-call argument. Empty arguments have no schema.
pub fn infer_schema(argument: &str) -> Option<SchemaNode> {
    if argument.trim().is_empty() {
        return None;
    }
    Some(match parse_literal(argument) {
        Some(value) => schema_from_value(&value),
        None => schema_from_text(argument),
    })
}

fn object_properties(inner: &str) -> BTreeMap<String, SchemaNode> {
    let mut properties = BTreeMap::new();

    for entry in split_top_level(inner, ",") {
        let entry = entry.trim();
        if entry.is_empty() || entry.starts_with("...") {
            continue;
        }

        let pieces = split_top_level(entry, ":");
        let (key, value) = match pieces.as_slice() {
            [shorthand] => (shorthand.trim(), shorthand.trim()),
            [key, ..] => (key.trim(), entry[key.len() + 1..].trim()),
            [] => continue,
        };
        let key = unquote(key).unwrap_or(key);
        if key.is_empty() {
            continue;
        }

        properties.insert(key.to_string(), value_schema(value).with_name_format(key));
    }

    properties
}

/// Type of a single value token, judged by its shape
fn value_schema(token: &str) -> SchemaNode {
    let token = token.trim();

    if unquote(token).is_some() {
        return SchemaNode::plain_string();
    }
    if is_numeric(token)
        || ["parseInt(", "parseFloat(", "Number("].iter().any(|p| token.starts_with(p))
    {
        return SchemaNode::Number;
    }
    match token {
        "true" | "false" => return SchemaNode::Boolean,
        "null" | "undefined" => return SchemaNode::Null,
        _ => {}
    }
    if token.starts_with('{') || token.starts_with('[') {
        return schema_from_text(token);
    }
    if is_dotted_identifier(token) {
        let name = token.rsplit('.').next().unwrap_or(token);
        return type_label_schema(infer_type(name));
    }
    SchemaNode::Any
}

/// First alternative of a parameter type label as a schema node
fn type_label_schema(label: &str) -> SchemaNode {
    match label.split('|').next().map(str::trim) {
        Some("number") => SchemaNode::Number,
        Some("boolean") => SchemaNode::Boolean,
        Some("string") => SchemaNode::plain_string(),
        _ => SchemaNode::Any,
    }
}

fn is_numeric(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && digits.bytes().filter(|&b| b == b'.').count() <= 1
        && digits.bytes().next().is_some_and(|b| b.is_ascii_digit())
}

fn is_dotted_identifier(text: &str) -> bool {
    !text.is_empty() && text.split('.').all(is_identifier)
}
