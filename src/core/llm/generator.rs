use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tera::{Context, Tera};
use tracing::{debug, info, warn};

use crate::config::{GenerationConfig, TemplateConfig};
use crate::error::{AutoSwaggerError, ProtocolError, Result};
use super::super::changes::{Change, FileOffsetTable};
use super::super::context::ApiContext;
use super::documenter::{CompletionRequest, LlmDocumenter};

/// Reply substituted when the model does not answer before the deadline
pub const TIMEOUT_FALLBACK: &str = r#"{"changes":[{"filepath":"error","code":"/** Generation timed out */","description":"Generation timed out"}]}"#;

const SYSTEM_TEMPLATE: &str = r#"You are an API documentation assistant. You write Swagger/OpenAPI JSDoc comments for Express.js routes.

For every route context you receive, write one JSDoc block that starts with "/**", contains an "@swagger" tag followed by the OpenAPI YAML for that path and method, and ends with "*/".
Document the path, query and body parameters, the success response and every error response listed in the context.

Reply with JSON only, in exactly this shape:
{"changes": [{"filepath": "<codeContext.filename>", "code": "<the JSDoc block>", "description": "<one line summary>"}]}

Return exactly one entry per route context, in the same order as the contexts were given. Copy each filepath verbatim from codeContext.filename."#;

const USER_TEMPLATE: &str = r#"Write Swagger JSDoc comments for the following {{ count }} Express route(s).

Route contexts:
{{ contexts_json }}

Respond with a JSON object whose "changes" array has exactly {{ count }} entries."#;

#[derive(Debug, Deserialize)]
struct ReplyEnvelope {
    changes: Vec<ProposedChange>,
}

#[derive(Debug, Deserialize)]
struct ProposedChange {
    filepath: String,
    code: String,
    #[serde(default)]
    description: String,
}

/// Turns route contexts into positioned documentation changes via the model
pub struct DocGenerator {
    documenter: Box<dyn LlmDocumenter>,
    tera: Tera,
    max_retries: u32,
    timeout: Duration,
    progress_interval: Duration,
}

impl DocGenerator {
    pub fn new(
        documenter: Box<dyn LlmDocumenter>,
        generation: &GenerationConfig,
        templates: &TemplateConfig,
    ) -> Result<Self> {
        Ok(Self {
            documenter,
            tera: load_templates(templates.template_dir.as_deref())?,
            max_retries: generation.max_retries.max(1),
            timeout: Duration::from_secs(generation.timeout_secs),
            progress_interval: Duration::from_secs(generation.progress_interval_secs.max(1)),
        })
    }

    pub fn documenter(&self) -> &dyn LlmDocumenter {
        self.documenter.as_ref()
    }

    /// One change per context, in context order, or an error once retries run out
    pub async fn generate(&self, contexts: &[ApiContext]) -> Result<Vec<Change>> {
        if contexts.is_empty() {
            return Ok(Vec::new());
        }

        let request = self.render(contexts)?;

        for attempt in 1..=self.max_retries {
            info!(
                "🤖 Requesting documentation for {} route(s) (attempt {}/{})",
                contexts.len(),
                attempt,
                self.max_retries
            );

            let raw = match self.call_with_watchdog(request.clone()).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("⚠️ Model call failed: {}", e);
                    continue;
                }
            };
            debug!("Raw model reply:\n{}", raw);

            match parse_reply(&raw).and_then(|proposed| resolve_changes(contexts, proposed)) {
                Ok(changes) => return Ok(changes),
                Err(e) => warn!("⚠️ Rejected model reply: {}", e),
            }
        }

        Err(AutoSwaggerError::Generation(format!(
            "no usable reply after {} attempts",
            self.max_retries
        )))
    }

    fn render(&self, contexts: &[ApiContext]) -> Result<CompletionRequest> {
        let mut context = Context::new();
        context.insert("count", &contexts.len());
        context.insert("contexts_json", &serde_json::to_string_pretty(contexts)?);

        Ok(CompletionRequest {
            system_prompt: self.tera.render("system", &context)?,
            user_prompt: self.tera.render("user", &context)?,
        })
    }

    /// Race the model call against the deadline, reporting progress meanwhile.
    ///
    /// On timeout the call is dropped and the canned fallback reply is returned.
    async fn call_with_watchdog(&self, request: CompletionRequest) -> Result<String> {
        let started = tokio::time::Instant::now();
        let call = self.documenter.complete(request);
        tokio::pin!(call);
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);
        let mut ticker =
            tokio::time::interval_at(started + self.progress_interval, self.progress_interval);

        loop {
            tokio::select! {
                result = &mut call => {
                    let response = result?;
                    debug!("Completion metadata: {:?}", response.metadata);
                    return Ok(response.content);
                }
                _ = &mut deadline => {
                    warn!("⏰ Model call timed out after {}s", self.timeout.as_secs());
                    return Ok(TIMEOUT_FALLBACK.to_string());
                }
                _ = ticker.tick() => {
                    info!("⏳ Still generating... {}s elapsed", started.elapsed().as_secs());
                }
            }
        }
    }
}

fn load_templates(template_dir: Option<&Path>) -> Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_template("system", SYSTEM_TEMPLATE)?;
    tera.add_raw_template("user", USER_TEMPLATE)?;

    if let Some(dir) = template_dir {
        for name in ["system", "user"] {
            let path = dir.join(format!("{}.tera", name));
            if path.is_file() {
                let source = std::fs::read_to_string(&path)?;
                tera.add_raw_template(name, &source)?;
                debug!("Using prompt template {}", path.display());
            }
        }
    }

    Ok(tera)
}

/// Locate the JSON object in a model reply.
///
/// A ```json fence wins over a bare ``` fence, which wins over the first `{`.
fn extract_json(text: &str) -> Option<&str> {
    for fence in ["```json", "```"] {
        if let Some(pos) = text.find(fence) {
            let after = &text[pos + fence.len()..];
            if let Some(start) = after.find('{') {
                let body = &after[start..];
                let end = body.find("```").unwrap_or(body.len());
                return Some(body[..end].trim());
            }
        }
    }
    text.find('{').map(|start| text[start..].trim())
}

fn parse_reply(text: &str) -> std::result::Result<Vec<ProposedChange>, ProtocolError> {
    let json = extract_json(text).ok_or(ProtocolError::NoJson)?;
    let mut stream = serde_json::Deserializer::from_str(json).into_iter::<ReplyEnvelope>();
    match stream.next() {
        Some(Ok(envelope)) => Ok(envelope.changes),
        Some(Err(e)) => Err(ProtocolError::MalformedJson(e.to_string())),
        None => Err(ProtocolError::NoJson),
    }
}

/// Match proposed changes to contexts by position and compute insertion lines.
///
/// Offsets accumulate per file in reply order, so several routes in one file
/// land correctly when they arrive in ascending line order.
fn resolve_changes(
    contexts: &[ApiContext],
    proposed: Vec<ProposedChange>,
) -> std::result::Result<Vec<Change>, ProtocolError> {
    if proposed.is_empty() {
        return Err(ProtocolError::EmptyChanges);
    }
    if proposed.len() != contexts.len() {
        return Err(ProtocolError::LengthMismatch {
            expected: contexts.len(),
            actual: proposed.len(),
        });
    }

    let mut offsets = FileOffsetTable::new();
    let mut changes = Vec::with_capacity(proposed.len());

    for (index, (context, change)) in contexts.iter().zip(proposed).enumerate() {
        let expected = &context.code_context.filename;
        if *expected != change.filepath {
            return Err(ProtocolError::FilepathMismatch {
                index,
                expected: expected.clone(),
                actual: change.filepath,
            });
        }

        let start_line =
            (context.code_context.line.beginning + offsets.offset(&change.filepath)).saturating_sub(1);
        offsets.record(&change.filepath, change.code.matches('\n').count() + 1);

        changes.push(Change {
            filepath: change.filepath,
            start_line,
            end_line: None,
            code: change.code,
            description: change.description,
        });
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::{ApiDetails, CodeContext, Endpoint, LineSpan, Validation};
    use crate::core::llm::documenter::CompletionResponse;
    use crate::core::params::Parameters;
    use crate::core::responses::Responses;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn context(filename: &str, beginning: usize) -> ApiContext {
        ApiContext {
            code_context: CodeContext {
                filename: filename.to_string(),
                function_name: "anonymous".to_string(),
                line: LineSpan {
                    beginning,
                    end: beginning + 3,
                },
                general_purpose: "API endpoint to retrieve item.".to_string(),
            },
            api_details: ApiDetails {
                endpoint: Endpoint {
                    path: "/items".to_string(),
                    method: "GET".to_string(),
                    resource_type: "Item".to_string(),
                },
                parameters: Parameters::default(),
                responses: Responses::default(),
                validation: Validation::default(),
            },
        }
    }

    fn reply(entries: &[(&str, &str)]) -> String {
        let changes: Vec<serde_json::Value> = entries
            .iter()
            .map(|(filepath, code)| {
                serde_json::json!({"filepath": filepath, "code": code, "description": "doc"})
            })
            .collect();
        serde_json::json!({ "changes": changes }).to_string()
    }

    /// Replays canned replies; `None` entries never resolve
    struct ScriptedDocumenter {
        replies: Mutex<VecDeque<Option<String>>>,
        calls: Arc<Mutex<usize>>,
    }

    impl ScriptedDocumenter {
        fn new(replies: Vec<Option<String>>) -> (Self, Arc<Mutex<usize>>) {
            let calls = Arc::new(Mutex::new(0));
            (
                Self {
                    replies: Mutex::new(replies.into()),
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait::async_trait]
    impl LlmDocumenter for ScriptedDocumenter {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            *self.calls.lock().unwrap() += 1;
            let next = self.replies.lock().unwrap().pop_front().flatten();
            match next {
                Some(content) => Ok(CompletionResponse {
                    content,
                    metadata: HashMap::new(),
                }),
                None => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn generator(replies: Vec<Option<String>>, timeout: Duration) -> (DocGenerator, Arc<Mutex<usize>>) {
        let (documenter, calls) = ScriptedDocumenter::new(replies);
        let generator = DocGenerator {
            documenter: Box::new(documenter),
            tera: load_templates(None).unwrap(),
            max_retries: 3,
            timeout,
            progress_interval: Duration::from_millis(5),
        };
        (generator, calls)
    }

    #[test]
    fn test_two_routes_same_file_scenario() {
        let contexts = vec![context("a.js", 5), context("a.js", 20)];
        let proposed = parse_reply(&reply(&[("a.js", "/**\n */"), ("a.js", "/**\n *\n *\n */")])).unwrap();
        let changes = resolve_changes(&contexts, proposed).unwrap();

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].start_line, 4);
        assert_eq!(changes[1].start_line, 21);
        assert!(changes.iter().all(|c| c.is_insertion()));
    }

    #[test]
    fn test_same_nominal_line_shifts_second_change() {
        let contexts = vec![context("a.js", 10), context("a.js", 10)];
        let proposed = parse_reply(&reply(&[("a.js", "l1\nl2\nl3"), ("a.js", "x")])).unwrap();
        let changes = resolve_changes(&contexts, proposed).unwrap();
        assert_eq!(changes[0].start_line, 9);
        assert_eq!(changes[1].start_line, 12);
    }

    #[test]
    fn test_offsets_are_per_file() {
        let contexts = vec![context("a.js", 3), context("b.js", 3), context("a.js", 8)];
        let proposed =
            parse_reply(&reply(&[("a.js", "x\ny"), ("b.js", "z"), ("a.js", "w")])).unwrap();
        let lines: Vec<usize> = resolve_changes(&contexts, proposed)
            .unwrap()
            .iter()
            .map(|c| c.start_line)
            .collect();
        assert_eq!(lines, vec![2, 2, 9]);
    }

    #[test]
    fn test_positional_validation_failures() {
        let contexts = vec![context("a.js", 1), context("b.js", 1)];

        let short = parse_reply(&reply(&[("a.js", "x")])).unwrap();
        assert_eq!(
            resolve_changes(&contexts, short).unwrap_err(),
            ProtocolError::LengthMismatch { expected: 2, actual: 1 }
        );

        let swapped = parse_reply(&reply(&[("b.js", "x"), ("a.js", "y")])).unwrap();
        assert!(matches!(
            resolve_changes(&contexts, swapped).unwrap_err(),
            ProtocolError::FilepathMismatch { index: 0, .. }
        ));

        let empty = parse_reply(r#"{"changes": []}"#).unwrap();
        assert_eq!(resolve_changes(&contexts, empty).unwrap_err(), ProtocolError::EmptyChanges);
    }

    #[test]
    fn test_extract_json_variants() {
        let fenced = "Sure!\n```json\n{\"changes\": []}\n```\nDone.";
        assert_eq!(extract_json(fenced), Some("{\"changes\": []}"));

        let plain_fence = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json(plain_fence), Some("{\"a\": 1}"));

        let bare = "Here you go: {\"changes\": []} hope it helps";
        let proposed = parse_reply(bare).unwrap();
        assert!(proposed.is_empty());

        assert_eq!(parse_reply("no json here").unwrap_err(), ProtocolError::NoJson);
        assert!(matches!(
            parse_reply("```json\n{\"changes\": [\n```").unwrap_err(),
            ProtocolError::MalformedJson(_)
        ));
    }

    #[test]
    fn test_timeout_fallback_cannot_satisfy_batch() {
        let proposed = parse_reply(TIMEOUT_FALLBACK).unwrap();
        let contexts = vec![context("a.js", 1), context("a.js", 9)];
        assert!(resolve_changes(&contexts, proposed).is_err());
    }

    #[test]
    fn test_user_prompt_embeds_contexts() {
        let (generator, _) = generator(vec![], Duration::from_secs(1));
        let request = generator.render(&[context("src/app.js", 7)]).unwrap();
        assert!(request.user_prompt.contains("\"filename\": \"src/app.js\""));
        assert!(request.user_prompt.contains("following 1 Express route(s)"));
        assert!(request.system_prompt.contains("@swagger"));
    }

    #[test]
    fn test_template_override() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("user.tera"), "ROUTES={{ count }}").unwrap();
        let tera = load_templates(Some(dir.path())).unwrap();

        let mut context = Context::new();
        context.insert("count", &2);
        context.insert("contexts_json", "[]");
        assert_eq!(tera.render("user", &context).unwrap(), "ROUTES=2");
        assert!(tera.render("system", &context).unwrap().contains("JSDoc"));
    }

    #[tokio::test]
    async fn test_retry_after_bad_reply() {
        let contexts = vec![context("a.js", 5)];
        let (generator, calls) = generator(
            vec![
                Some("I cannot help with that".to_string()),
                Some(format!("```json\n{}\n```", reply(&[("a.js", "/** ok */")]))),
            ],
            Duration::from_secs(5),
        );

        let changes = generator.generate(&contexts).await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].start_line, 4);
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_is_terminal() {
        let contexts = vec![context("a.js", 5)];
        let (generator, calls) = generator(
            vec![
                Some(reply(&[("b.js", "x")])),
                Some(reply(&[])),
                Some("{".to_string()),
            ],
            Duration::from_secs(5),
        );

        let err = generator.generate(&contexts).await.unwrap_err();
        assert!(matches!(err, AutoSwaggerError::Generation(_)));
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_hung_call_times_out_and_retries() {
        let contexts = vec![context("a.js", 2)];
        let (generator, calls) = generator(
            vec![None, Some(reply(&[("a.js", "/** late */")]))],
            Duration::from_millis(50),
        );

        let changes = generator.generate(&contexts).await.unwrap();
        assert_eq!(changes[0].start_line, 1);
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_model() {
        let (generator, calls) = generator(vec![], Duration::from_secs(1));
        assert!(generator.generate(&[]).await.unwrap().is_empty());
        assert_eq!(*calls.lock().unwrap(), 0);
    }
}
