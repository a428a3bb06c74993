use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::Result;
use super::text::{find_matching, is_identifier, split_top_level, unquote};

/// Where a parameter is read from on the `req` object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
    Body,
}

impl ParamLocation {
    /// Field name on `req` (`req.params`, `req.query`, `req.body`)
    pub fn request_field(self) -> &'static str {
        match self {
            ParamLocation::Path => "params",
            ParamLocation::Query => "query",
            ParamLocation::Body => "body",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParamLocation::Path => "path",
            ParamLocation::Query => "query",
            ParamLocation::Body => "body",
        }
    }

    fn from_request_field(field: &str) -> Option<Self> {
        match field {
            "params" => Some(ParamLocation::Path),
            "query" => Some(ParamLocation::Query),
            "body" => Some(ParamLocation::Body),
            _ => None,
        }
    }
}

/// A single request parameter as inferred from the handler source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSpec {
    #[serde(skip)]
    pub name: String,

    #[serde(skip)]
    pub location: ParamLocation,

    #[serde(rename = "type")]
    pub param_type: String,

    pub required: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    pub description: String,
}

/// Parameters grouped by location, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Parameters {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub path: BTreeMap<String, ParameterSpec>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, ParameterSpec>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub body: BTreeMap<String, ParameterSpec>,
}

impl Parameters {
    fn get_mut(&mut self, location: ParamLocation) -> &mut BTreeMap<String, ParameterSpec> {
        match location {
            ParamLocation::Path => &mut self.path,
            ParamLocation::Query => &mut self.query,
            ParamLocation::Body => &mut self.body,
        }
    }

    /// Required query and body parameters, in location then name order
    pub fn required_inputs(&self) -> Vec<&ParameterSpec> {
        self.query
            .values()
            .chain(self.body.values())
            .filter(|p| p.required)
            .collect()
    }
}

/// Type label for a parameter name. First matching keyword wins.
pub fn infer_type(name: &str) -> &'static str {
    let n = name.to_lowercase();
    if ["id", "count", "num"].iter().any(|k| n.contains(k)) {
        "number | string"
    } else if n.contains("is") || n.contains("has") || n.starts_with("enable") {
        "boolean"
    } else if ["email", "password", "date", "time", "stamp"].iter().any(|k| n.contains(k)) {
        "string"
    } else if ["limit", "offset", "page"].iter().any(|k| n.contains(k)) {
        "number"
    } else {
        "any"
    }
}

/// OpenAPI string format suggested by a field or parameter name
pub fn infer_format(name: &str) -> Option<&'static str> {
    let n = name.to_lowercase();
    if n.contains("email") {
        Some("email")
    } else if n.contains("password") {
        Some("password")
    } else if ["date", "time", "stamp"].iter().any(|k| n.contains(k)) {
        Some("date-time")
    } else if n.contains("url") || n.contains("uri") {
        Some("uri")
    } else if n.contains("uuid") || n.contains("guid") {
        Some("uuid")
    } else {
        None
    }
}

fn describe(name: &str, location: ParamLocation) -> String {
    let n = name.to_lowercase();
    if n.contains("id") {
        format!("Identifier ({}).", name)
    } else if n.contains("name") {
        format!("Name ({}).", name)
    } else if n.contains("email") {
        format!("Email address ({}).", name)
    } else if n.contains("date") || n.contains("time") {
        format!("Date or timestamp ({}).", name)
    } else if ["limit", "page", "offset"].iter().any(|k| n.contains(k)) {
        format!("Pagination parameter ({}).", name)
    } else if n.contains("is") || n.contains("has") || n.starts_with("enable") {
        format!("Boolean flag ({}).", name)
    } else {
        format!("Parameter '{}' from the request {}.", name, location.as_str())
    }
}

/// Turn the literal after `||` or `=` into a JSON value
fn coerce_default(raw: &str) -> Value {
    let raw = raw.trim();
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        _ => match unquote(raw) {
            Some(inner) => Value::String(inner.to_string()),
            None => Value::String(raw.to_string()),
        },
    }
}

/// Extracts request parameters from Express handler bodies
pub struct ParamExtractor {
    access_regex: Regex,
    path_token_regex: Regex,
    destructure_regex: Regex,
    fallback_default_regex: Regex,
    guard_regex: Regex,
    error_status_regex: Regex,
}

impl ParamExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            access_regex: Regex::new(r"req\.(params|query|body)\.([A-Za-z_$][\w$]*)")?,
            path_token_regex: Regex::new(r":([A-Za-z_]\w*)")?,
            destructure_regex: Regex::new(
                r"(?:const|let|var)\s*\{([^}]*)\}\s*=\s*req\.(params|query|body)\b",
            )?,
            fallback_default_regex: Regex::new(
                r"req\.(query|body)\.([A-Za-z_$][\w$]*)\s*\|\|\s*([^;,)+\]\n]+)",
            )?,
            guard_regex: Regex::new(r"\bif\s*\(")?,
            error_status_regex: Regex::new(r"res\.(?:status|sendStatus)\(\s*[45]\d\d\s*\)")?,
        })
    }

    /// Extract path, query and body parameters for one route
    pub fn extract(&self, body: &str, route_path: &str) -> Parameters {
        let mut names: Vec<(ParamLocation, String)> = Vec::new();
        let mut defaults: BTreeMap<(ParamLocation, String), Value> = BTreeMap::new();

        for cap in self.path_token_regex.captures_iter(route_path) {
            names.push((ParamLocation::Path, cap[1].to_string()));
        }

        for cap in self.access_regex.captures_iter(body) {
            if let Some(location) = ParamLocation::from_request_field(&cap[1]) {
                names.push((location, cap[2].to_string()));
            }
        }

        for cap in self.destructure_regex.captures_iter(body) {
            let Some(location) = ParamLocation::from_request_field(&cap[2]) else {
                continue;
            };
            for (name, default) in destructured_names(&cap[1]) {
                if let Some(default) = default {
                    defaults.entry((location, name.clone())).or_insert(default);
                }
                names.push((location, name));
            }
        }

        for cap in self.fallback_default_regex.captures_iter(body) {
            if let Some(location) = ParamLocation::from_request_field(&cap[1]) {
                defaults
                    .entry((location, cap[2].to_string()))
                    .or_insert_with(|| coerce_default(&cap[3]));
            }
        }

        let guards = self.guards(body);
        let mut params = Parameters::default();

        for (location, name) in names {
            let map = params.get_mut(location);
            if map.contains_key(&name) {
                continue;
            }

            let default = defaults.get(&(location, name.clone())).cloned();
            let required = match location {
                ParamLocation::Path => true,
                _ => default.is_none() && is_guarded(&guards, &name, location),
            };
            let param_type = infer_type(&name);
            let format = if param_type == "string" {
                infer_format(&name).map(str::to_string)
            } else {
                None
            };

            map.insert(
                name.clone(),
                ParameterSpec {
                    description: describe(&name, location),
                    name,
                    location,
                    param_type: param_type.to_string(),
                    required,
                    format,
                    default,
                },
            );
        }

        params
    }

    /// `if (...)` conditions whose consequent leaves the handler early
    fn guards<'a>(&self, body: &'a str) -> Vec<&'a str> {
        let mut guards = Vec::new();

        for m in self.guard_regex.find_iter(body) {
            let open = m.end() - 1;
            let Some(close) = find_matching(body, open) else {
                continue;
            };
            let condition = &body[open + 1..close];

            let rest = body[close + 1..].trim_start();
            let offset = body.len() - rest.len();
            let consequent = if rest.starts_with('{') {
                match find_matching(body, offset) {
                    Some(end) => &body[offset..=end],
                    None => rest,
                }
            } else {
                rest.split(|c| c == '\n' || c == ';').next().unwrap_or_default()
            };

            if self.exits_early(consequent) {
                guards.push(condition);
            }
        }

        guards
    }

    fn exits_early(&self, consequent: &str) -> bool {
        consequent.split(|c: char| !c.is_alphanumeric() && c != '_').any(|w| w == "return" || w == "throw")
            || consequent.contains("next(")
            || self.error_status_regex.is_match(consequent)
    }
}

/// Names (and literal defaults) bound by a `{ a, b = 1, c: alias }` pattern
fn destructured_names(pattern: &str) -> Vec<(String, Option<Value>)> {
    split_top_level(pattern, ",")
        .into_iter()
        .filter_map(|item| {
            let item = item.trim();
            if item.is_empty() || item.starts_with("...") {
                return None;
            }
            let (binding, default) = match item.split_once('=') {
                Some((lhs, rhs)) => (lhs, Some(coerce_default(rhs))),
                None => (item, None),
            };
            let name = binding.split(':').next().unwrap_or_default().trim();
            is_identifier(name).then(|| (name.to_string(), default))
        })
        .collect()
}

/// Some disjunct of some guard tests the parameter for a falsy or empty value
fn is_guarded(guards: &[&str], name: &str, location: ParamLocation) -> bool {
    let qualified = format!("req.{}.{}", location.request_field(), name);
    let targets = |s: &str| {
        let s = s.trim();
        s == name || s == qualified
    };

    guards.iter().any(|condition| {
        split_top_level(condition, "||").into_iter().any(|disjunct| {
            let d = strip_parens(disjunct.trim());
            if d.contains("&&") {
                return false;
            }
            if let Some(rest) = d.strip_prefix('!') {
                if !rest.starts_with('=') {
                    return targets(rest);
                }
            }
            for op in ["===", "=="] {
                if let Some((lhs, rhs)) = d.split_once(op) {
                    return targets(lhs)
                        && matches!(rhs.trim(), "undefined" | "null" | "''" | "\"\"");
                }
            }
            false
        })
    })
}

fn strip_parens(mut text: &str) -> &str {
    while text.starts_with('(') && find_matching(text, 0) == Some(text.len() - 1) {
        text = text[1..text.len() - 1].trim();
    }
    text
}
