//! Training pairs for teaching a model to write route JSDoc.
//!
//! Each already-documented route becomes one JSONL line: the empty route stub as
//! the prompt and its JSDoc block as the completion.

use regex::Regex;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::FinetuneConfig;
use crate::error::{AutoSwaggerError, Result};

const PROMPT_PREFIX: &str = "Generate JSDoc Swagger comments for this Express route:\n";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinetuneExample {
    pub filepath: String,
    pub prompt: String,
    pub completion: String,
}

/// Builds the fine-tuning dataset from documented route files
pub struct DatasetBuilder {
    doc_route_regex: Regex,
    nested_brace_regex: Regex,
    stop_token: String,
}

impl DatasetBuilder {
    pub fn new(config: &FinetuneConfig) -> Result<Self> {
        if config.doc_tags.is_empty() {
            return Err(AutoSwaggerError::Config("finetune.doc_tags is empty".to_string()));
        }
        let tags = config
            .doc_tags
            .iter()
            .map(|tag| regex::escape(tag))
            .collect::<Vec<_>>()
            .join("|");

        Ok(Self {
            doc_route_regex: Regex::new(&format!(
                r"(/\*\*(?:[^*]|\*[^/])*?(?:{})(?:[^*]|\*[^/])*\*/)\s*((?:app|router)\.\w+\s*\([^)]*\)\s*=>\s*\{{)",
                tags
            ))?,
            nested_brace_regex: Regex::new(r"\{\s*\{")?,
            stop_token: config.stop_token.clone(),
        })
    }

    /// Pairs found in one source text
    pub fn examples_from_source(&self, filepath: &str, source: &str) -> Vec<FinetuneExample> {
        self.doc_route_regex
            .captures_iter(source)
            .map(|cap| {
                let jsdoc = cap[1].replace("\r\n", "\n");
                FinetuneExample {
                    filepath: filepath.to_string(),
                    prompt: format!("{}{}", PROMPT_PREFIX, self.clean_stub(&cap[2])),
                    completion: format!("{}\n{}", jsdoc, self.stop_token),
                }
            })
            .collect()
    }

    /// Walk `input_dir` and write every example to `output_file` as JSONL
    pub fn build(&self, input_dir: &Path, output_file: &Path) -> Result<usize> {
        if !input_dir.is_dir() {
            return Err(AutoSwaggerError::FileSystem(format!(
                "Input directory not found: {}",
                input_dir.display()
            )));
        }

        let mut examples = Vec::new();
        for entry in WalkDir::new(input_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| AutoSwaggerError::FileSystem(e.to_string()))?;
            let path = entry.path();
            let is_source = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext == "js" || ext == "ts")
                .unwrap_or(false);
            if !entry.file_type().is_file() || !is_source {
                continue;
            }

            let source = String::from_utf8_lossy(&std::fs::read(path)?).into_owned();
            let relative = path
                .strip_prefix(input_dir)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            let found = self.examples_from_source(&relative, &source);
            debug!("{}: {} examples", relative, found.len());
            examples.extend(found);
        }

        if let Some(parent) = output_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = std::io::BufWriter::new(std::fs::File::create(output_file)?);
        for example in &examples {
            serde_json::to_writer(&mut out, example)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;

        info!("📚 Wrote {} examples to {}", examples.len(), output_file.display());
        Ok(examples.len())
    }

    /// `app.get('/x', (req, res) => {` becomes `app.get('/x', (req, res) => {};`
    fn clean_stub(&self, stub: &str) -> String {
        let collapsed = self.nested_brace_regex.replace_all(stub, "{");
        format!("{}{{}};", collapsed.trim_end().trim_end_matches('{'))
    }
}
