use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use super::schema::{infer_schema, parse_literal, SchemaNode};
use super::text::find_matching;

const ERROR_FIELDS: [&str; 4] = ["error", "message", "detail", "issue"];

/// One documented response of a route
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSpec {
    pub status_code: u16,
    pub description: String,
    pub schema: Option<SchemaNode>,
}

/// Consolidated responses: the last success and every distinct error
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Responses {
    pub success_response: Option<ResponseSpec>,
    pub error_responses: Vec<ResponseSpec>,
}

/// A `res.*()` call found in a handler body
#[derive(Debug, Clone)]
pub struct ResponseCall {
    pub status_code: u16,
    pub method: String,
    pub argument: String,
}

/// Scans handler bodies for Express response calls
pub struct ResponseExtractor {
    call_regex: Regex,
    field_regex: Regex,
}

impl ResponseExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            call_regex: Regex::new(
                r"res\s*\.\s*(?:status\s*\(\s*(\d+)\s*\)\s*\.\s*)?(json|send|sendStatus)\s*\(",
            )?,
            field_regex: Regex::new(
                r#"['"`]?\b(error|message|detail|issue|field)\b['"`]?\s*:\s*['"`](.*?)['"`]"#,
            )?,
        })
    }

    /// Every response call in source order, with its full argument text
    pub fn calls(&self, body: &str) -> Vec<ResponseCall> {
        self.call_regex
            .captures_iter(body)
            .filter_map(|cap| {
                let whole = cap.get(0)?;
                let open = whole.end() - 1;
                let argument = match find_matching(body, open) {
                    Some(close) => body[open + 1..close].trim().to_string(),
                    None => return None,
                };
                let method = cap[2].to_string();
                let explicit = cap.get(1).and_then(|m| m.as_str().parse::<u16>().ok());

                let status_code = match (explicit, method.as_str()) {
                    (Some(code), _) => code,
                    (None, "sendStatus") => argument.parse::<u16>().unwrap_or(204),
                    (None, _) => 200,
                };

                Some(ResponseCall {
                    status_code,
                    method,
                    argument,
                })
            })
            .collect()
    }

    /// Classify and consolidate the response calls of a handler
    pub fn extract(&self, calls: &[ResponseCall]) -> Responses {
        let mut responses = Responses::default();

        for call in calls {
            let parsed = parse_literal(&call.argument);
            let schema = if call.method == "sendStatus" {
                None
            } else {
                infer_schema(&call.argument)
            };

            if call.status_code >= 400 {
                let description = self.error_description(call, parsed.as_ref());
                let duplicate = responses
                    .error_responses
                    .iter()
                    .any(|r| r.status_code == call.status_code && r.description == description);
                if !duplicate {
                    responses.error_responses.push(ResponseSpec {
                        status_code: call.status_code,
                        description,
                        schema,
                    });
                }
            } else {
                responses.success_response = Some(ResponseSpec {
                    status_code: call.status_code,
                    description: self.success_description(call, parsed.as_ref()),
                    schema,
                });
            }
        }

        responses
    }

    fn error_description(&self, call: &ResponseCall, parsed: Option<&Value>) -> String {
        let mut parts = Vec::new();

        match parsed {
            Some(Value::Object(map)) => {
                for field in ERROR_FIELDS {
                    if let Some(text) = map.get(field).and_then(scalar_text) {
                        parts.push(format!("{}: {}", field, text));
                    }
                }
                if let Some(Value::Array(details)) = map.get("details") {
                    for detail in details {
                        let text = match detail {
                            Value::Object(entry) => entry
                                .get("message")
                                .or_else(|| entry.get("msg"))
                                .and_then(scalar_text),
                            other => scalar_text(other),
                        };
                        parts.extend(text);
                    }
                }
            }
            _ => {
                for cap in self.field_regex.captures_iter(&call.argument) {
                    parts.push(format!("{}: {}", &cap[1], &cap[2]));
                }
            }
        }

        if parts.is_empty() {
            format!("Error response with status {}.", call.status_code)
        } else {
            parts.join("; ")
        }
    }

    fn success_description(&self, call: &ResponseCall, parsed: Option<&Value>) -> String {
        let message = match parsed {
            Some(Value::Object(map)) => map.get("message").and_then(scalar_text),
            _ => self
                .field_regex
                .captures_iter(&call.argument)
                .find(|cap| &cap[1] == "message")
                .map(|cap| cap[2].to_string()),
        };
        message.unwrap_or_else(|| "Successful operation.".to_string())
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(body: &str) -> Responses {
        let extractor = ResponseExtractor::new().unwrap();
        let calls = extractor.calls(body);
        extractor.extract(&calls)
    }

    #[test]
    fn test_not_found_error() {
        let responses = extract("if (!item) return res.status(404).json({ error: 'Not found' });");
        assert!(responses.success_response.is_none());
        assert_eq!(responses.error_responses.len(), 1);
        assert_eq!(responses.error_responses[0].status_code, 404);
        assert_eq!(responses.error_responses[0].description, "error: Not found");
    }

    #[test]
    fn test_duplicate_errors_collapse_in_order() {
        let body = r#"
    if (!a) return res.status(400).json({ error: 'Bad input' });
    if (!b) return res.status(400).json({ error: 'Bad input' });
    if (!c) return res.status(401).json({ error: 'Unauthorized' });
    if (!d) return res.status(400).json({ error: 'Other' });
"#;
        let errors = extract(body).error_responses;
        let summary: Vec<(u16, &str)> = errors
            .iter()
            .map(|e| (e.status_code, e.description.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![(400, "error: Bad input"), (401, "error: Unauthorized"), (400, "error: Other")]
        );
    }

    #[test]
    fn test_last_success_wins() {
        let body = "if (cached) { return res.json(cached); }\nres.status(201).json({ message: 'Created', id: item.id });";
        let success = extract(body).success_response.unwrap();
        assert_eq!(success.status_code, 201);
        assert_eq!(success.description, "Created");
        assert!(matches!(success.schema, Some(SchemaNode::Object { .. })));
    }

    #[test]
    fn test_default_status_and_empty_body() {
        let responses = extract("users.splice(index, 1);\nres.status(204).send();");
        let success = responses.success_response.unwrap();
        assert_eq!(success.status_code, 204);
        assert_eq!(success.schema, None);
        assert_eq!(success.description, "Successful operation.");

        let responses = extract("res.json(users);");
        assert_eq!(responses.success_response.unwrap().status_code, 200);
    }

    #[test]
    fn test_send_status_codes() {
        let responses = extract("res.sendStatus(403);\nres.sendStatus();");
        assert_eq!(responses.error_responses[0].status_code, 403);
        assert_eq!(responses.error_responses[0].description, "Error response with status 403.");
        assert_eq!(responses.success_response.unwrap().status_code, 204);
    }

    #[test]
    fn test_details_and_regex_fallback() {
        let responses = extract(
            "res.status(422).json({ error: 'Validation failed', details: ['name is required', { msg: 'email invalid' }] });\n\
             res.status(500).json({ error: 'Server error', cause: err.message });",
        );
        let errors = &responses.error_responses;
        assert_eq!(errors[0].description, "error: Validation failed; name is required; email invalid");
        assert_eq!(errors[1].description, "error: Server error");
    }

    #[test]
    fn test_nested_parentheses_in_argument() {
        let extractor = ResponseExtractor::new().unwrap();
        let calls = extractor.calls("res.json({ total: items.filter((i) => i.ok).length });");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].argument, "{ total: items.filter((i) => i.ok).length }");
    }
}
