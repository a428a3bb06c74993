use regex::Regex;

use crate::error::Result;
use super::super::text::{find_matching, is_identifier, line_at};
use super::{RouteMatch, RouteParser};

/// Regex-driven extractor for `app.get(...)` / `router.post(...)` registrations
pub struct ExpressParser {
    route_regex: Regex,
    marker_regex: Regex,
    function_regex: Regex,
    doc_tags: Vec<String>,
}

impl ExpressParser {
    pub fn new(doc_tags: &[String]) -> Result<Self> {
        Ok(Self {
            route_regex: Regex::new(
                r#"(?i)(?:app|router)\.(get|post|put|delete|patch)\s*\(\s*['"`]([^'"`]+)['"`]\s*,\s*([^)]+)\)"#,
            )?,
            marker_regex: Regex::new(
                r"(?i)(?:app|router)\.(?:get|post|put|delete|patch)\s*\(|express\.Router\s*\(\s*\)|createRouter",
            )?,
            function_regex: Regex::new(r"function\s+([A-Za-z_$][\w$]*)")?,
            doc_tags: doc_tags.to_vec(),
        })
    }

    /// Resolve the handler's name from its argument text
    fn function_name(&self, handler_text: &str) -> String {
        let text = handler_text.trim();

        if !text.contains('(') && !text.contains("=>") {
            // Named handler, possibly after middleware: `auth, getUser`
            let last = text.rsplit(',').next().unwrap_or(text).trim();
            if !last.is_empty() && last.split('.').all(is_identifier) {
                return last.to_string();
            }
        }

        match self.function_regex.captures(text) {
            Some(cap) => cap[1].to_string(),
            None => "anonymous".to_string(),
        }
    }

    /// Body of a handler defined elsewhere in the same file under `name`
    fn named_handler_body(&self, content: &str, name: &str) -> Option<(usize, usize)> {
        let local = name.rsplit('.').next()?;
        let pattern = format!(
            r"(?:function\s+{0}\s*\(|(?:const|let|var)\s+{0}\s*=\s*(?:async\s+)?(?:function\b|\(|[A-Za-z_$][\w$]*\s*=>))",
            regex::escape(local)
        );
        let definition = Regex::new(&pattern).ok()?.find(content)?;
        let open = definition.end() + content[definition.end()..].find('{')?;
        let close = find_matching(content, open)?;
        Some((open, close))
    }

    /// Whether the lines right above `line` (1-based) form a tagged JSDoc block
    fn has_doc_block_above(&self, lines: &[&str], line: usize) -> bool {
        let mut block = Vec::new();
        let mut in_block = false;

        for text in lines[..line.saturating_sub(1).min(lines.len())].iter().rev() {
            let text = text.trim();
            if !in_block {
                if text.is_empty() {
                    continue;
                }
                if !text.ends_with("*/") {
                    return false;
                }
                in_block = true;
            }
            block.push(text);
            if text.starts_with("/**") {
                return block
                    .iter()
                    .any(|l| self.doc_tags.iter().any(|tag| l.contains(tag.as_str())));
            }
        }

        false
    }
}

impl RouteParser for ExpressParser {
    fn extract_routes(&self, content: &str) -> Vec<RouteMatch> {
        let lines: Vec<&str> = content.lines().collect();

        self.route_regex
            .captures_iter(content)
            .filter_map(|cap| {
                let whole = cap.get(0)?;
                let handler = cap.get(3)?;
                let handler_text = handler.as_str().to_string();
                let handler_start = handler.start();
                let function_name = self.function_name(&handler_text);
                let line = line_at(content, whole.start());

                let inline = handler_text.contains('(') || handler_text.contains("=>");
                let braces = if inline {
                    content[handler_start..]
                        .find('{')
                        .map(|rel| handler_start + rel)
                        .and_then(|open| find_matching(content, open).map(|close| (open, close)))
                } else {
                    self.named_handler_body(content, &function_name)
                };

                let (handler_body, end_line) = match braces {
                    Some((open, close)) => (
                        content[open + 1..close].to_string(),
                        if inline { line_at(content, close) } else { line },
                    ),
                    None => (String::new(), line),
                };

                Some(RouteMatch {
                    method: cap[1].to_uppercase(),
                    path: cap[2].to_string(),
                    handler_text,
                    handler_start,
                    handler_body,
                    function_name,
                    line,
                    end_line,
                    documented: self.has_doc_block_above(&lines, line),
                })
            })
            .collect()
    }

    fn is_api_source(&self, content: &str) -> bool {
        self.marker_regex.is_match(content)
    }

    fn file_extensions(&self) -> &[&str] {
        &["js", "ts", "jsx", "tsx", "mjs", "cjs"]
    }

    fn framework_name(&self) -> &str {
        "Express"
    }
}
