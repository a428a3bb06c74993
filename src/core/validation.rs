use regex::Regex;

use crate::error::Result;
use super::params::ParameterSpec;
use super::responses::ResponseCall;

/// Collects input constraints from error messages and validation-library calls
pub struct ConstraintCollector {
    literal_regex: Regex,
    keyword_regex: Regex,
    express_validator_regex: Regex,
    joi_regex: Regex,
    yup_regex: Regex,
}

impl ConstraintCollector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            literal_regex: Regex::new(r#"'([^']*)'|"([^"]*)"|`([^`]*)`"#)?,
            keyword_regex: Regex::new(r"(?i)required|invalid|must|minimum|maximum|length")?,
            express_validator_regex: Regex::new(
                r#"\b(?:body|check)\s*\(\s*['"]([^'"]+)['"]\s*\)\s*\.\s*(is[A-Z]\w*|notEmpty|exists)"#,
            )?,
            joi_regex: Regex::new(
                r"(?i:joi)\.(string|number|boolean|object)\(\)(?:\.(?:required|min|max|length|email|pattern)\([^)]*\))+",
            )?,
            yup_regex: Regex::new(
                r"(?i:yup)\.(string|number|boolean|object)\(\)(?:\.(?:required|min|max|length|email)\([^)]*\))+",
            )?,
        })
    }

    /// Constraint strings for one handler, deduplicated in first-seen order.
    ///
    /// Required parameters come first, then messages from response payloads,
    /// then validation-library calls.
    pub fn collect(
        &self,
        body: &str,
        calls: &[ResponseCall],
        required: &[&ParameterSpec],
    ) -> Vec<String> {
        let mut constraints: Vec<String> = Vec::new();
        let mut push = |constraint: String| {
            if !constraints.contains(&constraint) {
                constraints.push(constraint);
            }
        };

        for param in required {
            push(format!(
                "Parameter '{}' in {} is required.",
                param.name,
                param.location.as_str()
            ));
        }

        for call in calls {
            for cap in self.literal_regex.captures_iter(&call.argument) {
                let literal = cap
                    .get(1)
                    .or_else(|| cap.get(2))
                    .or_else(|| cap.get(3))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                if self.keyword_regex.is_match(literal) {
                    push(literal.to_string());
                }
            }
        }

        for cap in self.express_validator_regex.captures_iter(body) {
            push(format!("Validate {} using express-validator: {}", &cap[1], &cap[2]));
        }
        for cap in self.joi_regex.captures_iter(body) {
            push(format!("Validate using Joi: {}", &cap[1]));
        }
        for cap in self.yup_regex.captures_iter(body) {
            push(format!("Validate using Yup: {}", &cap[1]));
        }

        constraints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::ParamExtractor;
    use crate::core::responses::ResponseExtractor;

    fn collect(body: &str, path: &str) -> Vec<String> {
        let params = ParamExtractor::new().unwrap().extract(body, path);
        let calls = ResponseExtractor::new().unwrap().calls(body);
        ConstraintCollector::new()
            .unwrap()
            .collect(body, &calls, &params.required_inputs())
    }

    #[test]
    fn test_required_params_then_messages() {
        let body = r#"
    const { name, email } = req.body;
    if (!name || !email) {
        return res.status(400).json({ error: 'Name and email are required' });
    }
    if (name.length < 3) {
        return res.status(400).json({ error: 'Name must be at least 3 characters' });
    }
    res.status(201).json({ message: 'User created' });
"#;
        let constraints = collect(body, "/users");
        assert_eq!(
            constraints,
            vec![
                "Parameter 'email' in body is required.",
                "Parameter 'name' in body is required.",
                "Name and email are required",
                "Name must be at least 3 characters",
            ]
        );
    }

    #[test]
    fn test_library_patterns() {
        let body = r#"
    body('email').isEmail();
    check('password').isLength({ min: 8 });
    const schema = Joi.string().min(3).required();
    const other = yup.number().min(1);
"#;
        let constraints = collect(body, "/signup");
        assert!(constraints.contains(&"Validate email using express-validator: isEmail".to_string()));
        assert!(constraints.contains(&"Validate password using express-validator: isLength".to_string()));
        assert!(constraints.contains(&"Validate using Joi: string".to_string()));
        assert!(constraints.contains(&"Validate using Yup: number".to_string()));
    }

    #[test]
    fn test_duplicate_messages_collapse() {
        let body = r#"
    if (!a) return res.status(400).json({ error: 'Invalid id' });
    if (!b) return res.status(400).json({ error: 'Invalid id' });
"#;
        assert_eq!(collect(body, "/things"), vec!["Invalid id"]);
    }
}
