// src/core/engine.rs
use std::path::{Path, PathBuf};
use anyhow::{Context as _, Result};
use tracing::{debug, info, warn};

use crate::config::{Config, CONFIG_CANDIDATES};
use crate::error::AutoSwaggerError;
use super::parser::{calculate_hash, read_source};
use super::{
    create_documenter, ApiContext, Change, ChangeApplier, CodeParser, ContextAssembler,
    DatasetBuilder, DocGenerator, GitWorkspace, SourceFile,
};

/// Options of the `generate` command
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Repository (or sub-directory) to document
    pub repo: PathBuf,

    /// Compare against this branch instead of HEAD
    pub branch: Option<String>,

    /// Document every API file, not just changed ones
    pub all: bool,

    /// Leave the edits uncommitted
    pub no_commit: bool,

    /// Only report what would be documented
    pub dry_run: bool,
}

/// Outcome of one generation run
#[derive(Debug, Default)]
pub struct GenerationReport {
    pub files_documented: usize,
    pub changes_applied: usize,
    pub changes_failed: usize,
    pub files_skipped: usize,
    pub commit: Option<git2::Oid>,
}

/// Main orchestration engine for auto-swagger
pub struct Engine {
    config: Config,
    parser: CodeParser,
    assembler: ContextAssembler,
}

impl Engine {
    /// Create a new engine instance from a config file (or the defaults)
    pub async fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(config_path)?;
        debug!("Loaded configuration: {:?}", config);
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let parser = CodeParser::new(&config.parsing, &config.project, &config.finetune.doc_tags)?;
        let assembler = ContextAssembler::new(config.parsing.skip_documented)?;

        Ok(Self {
            config,
            parser,
            assembler,
        })
    }

    /// Document undocumented routes, apply the comments and commit them
    pub async fn generate(&self, options: GenerateOptions) -> Result<()> {
        if options.dry_run {
            return self.preview(&options);
        }

        let documenter = create_documenter(&self.config.llm)?;
        let generator = DocGenerator::new(documenter, &self.config.generation, &self.config.templates)?;
        info!(
            "✅ LLM provider: {} ({})",
            generator.documenter().provider_name(),
            generator.documenter().model_name()
        );

        let report = self.run_generation(&generator, &options).await?;

        info!("📊 Generation complete:");
        info!("  - {} files documented", report.files_documented);
        info!("  - {} changes applied", report.changes_applied);
        if report.changes_failed > 0 {
            warn!("  - {} changes failed", report.changes_failed);
        }
        if report.files_skipped > 0 {
            warn!("  - {} files skipped (modified during generation)", report.files_skipped);
        }
        match report.commit {
            Some(oid) => info!("  - committed as {} on {}", oid, self.config.git.branch_name),
            None if options.no_commit => info!("  - changes left uncommitted"),
            None => info!("  - nothing to commit"),
        }
        Ok(())
    }

    async fn run_generation(
        &self,
        generator: &DocGenerator,
        options: &GenerateOptions,
    ) -> Result<GenerationReport> {
        let root = canonical_root(&options.repo)?;
        info!("🔍 Scanning {} for {} routes", root.display(), self.parser.framework_name());

        let git = if !options.all || !options.no_commit {
            Some(GitWorkspace::open(&root, &self.config.git)?)
        } else {
            None
        };
        if let Some(git) = &git {
            debug!("Repository at {}", git.workdir().display());
            // With --branch the edits are committed on the current branch
            if !options.no_commit && options.branch.is_none() {
                git.setup_branch()?;
            }
        }

        let files = self.select_files(&root, git.as_ref(), options)?;
        info!("Found {} API files", files.len());

        let applier = ChangeApplier::new(&root);
        let mut report = GenerationReport::default();
        let mut applied: Vec<Change> = Vec::new();

        for file in &files {
            let contexts = self.contexts_for(file);
            if contexts.is_empty() {
                debug!("{}: nothing to document", file.relative_path);
                continue;
            }

            info!("📄 {}: documenting {} route(s)", file.relative_path, contexts.len());
            let changes = generator
                .generate(&contexts)
                .await
                .with_context(|| format!("Failed to document {}", file.relative_path))?;

            if !is_unchanged(file) {
                warn!("⚠️ {} changed since it was scanned, skipping", file.relative_path);
                report.files_skipped += 1;
                continue;
            }

            for change in changes {
                if applier.apply(&change) {
                    report.changes_applied += 1;
                    applied.push(change);
                } else {
                    report.changes_failed += 1;
                }
            }
            report.files_documented += 1;
        }

        if let (Some(git), false) = (&git, options.no_commit) {
            report.commit = git.commit_changes(&root, &applied)?;
        }

        Ok(report)
    }

    /// Log the routes `generate` would document, touching nothing
    fn preview(&self, options: &GenerateOptions) -> Result<()> {
        let root = canonical_root(&options.repo)?;
        let git = if options.all {
            None
        } else {
            Some(GitWorkspace::open(&root, &self.config.git)?)
        };

        info!("📋 Dry run - showing what would be documented");
        let mut total = 0;
        for file in self.select_files(&root, git.as_ref(), options)? {
            for context in self.contexts_for(&file) {
                let endpoint = &context.api_details.endpoint;
                info!(
                    "  {}:{} {} {} - {}",
                    context.code_context.filename,
                    context.code_context.line.beginning,
                    endpoint.method,
                    endpoint.path,
                    context.code_context.general_purpose
                );
                total += 1;
            }
        }
        info!("{} routes would be documented", total);
        Ok(())
    }

    /// Write the route contexts of every API file as JSON
    pub async fn scan(&self, repo: PathBuf, output: Option<PathBuf>) -> Result<()> {
        let root = canonical_root(&repo)?;
        info!("🔍 Scanning {} for {} routes", root.display(), self.parser.framework_name());

        let contexts: Vec<ApiContext> = self
            .parser
            .discover(&root)?
            .iter()
            .flat_map(|file| self.contexts_for(file))
            .collect();
        let json = serde_json::to_string_pretty(&contexts)?;

        match output {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, json)?;
                info!("📝 Wrote {} route contexts to {}", contexts.len(), path.display());
            }
            None => println!("{}", json),
        }
        Ok(())
    }

    /// Build the fine-tuning JSONL from already-documented routes
    pub async fn prepare_finetune(&self, input: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
        let input = input.unwrap_or_else(|| self.config.finetune.input_dir.clone());
        let output = output.unwrap_or_else(|| self.config.finetune.output_file.clone());
        info!("📚 Preparing fine-tuning data from {}", input.display());

        let builder = DatasetBuilder::new(&self.config.finetune)?;
        let count = builder.build(&input, &output)?;
        if count == 0 {
            warn!("⚠️ No documented routes found in {}", input.display());
        }
        Ok(())
    }

    /// Write a default config file and the data directories
    pub async fn init(&self, path: Option<PathBuf>) -> Result<()> {
        let target_dir = match path {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        info!("Initializing auto-swagger in: {}", target_dir.display());
        std::fs::create_dir_all(&target_dir)?;

        let config_path = target_dir.join(CONFIG_CANDIDATES[0]);
        if config_path.exists() {
            warn!("⚠️ {} already exists, leaving it untouched", config_path.display());
        } else {
            Config::default().save(&config_path)?;
            info!("📝 Wrote {}", config_path.display());
        }

        let data_dir = target_dir.join(&self.config.finetune.input_dir);
        std::fs::create_dir_all(&data_dir)?;
        if let Some(parent) = self.config.finetune.output_file.parent() {
            std::fs::create_dir_all(target_dir.join(parent))?;
        }
        info!("📁 Created {}", data_dir.display());
        Ok(())
    }

    fn select_files(
        &self,
        root: &Path,
        git: Option<&GitWorkspace>,
        options: &GenerateOptions,
    ) -> Result<Vec<SourceFile>> {
        if options.all {
            return Ok(self.parser.discover(root)?);
        }

        let git = git.ok_or_else(|| {
            AutoSwaggerError::Config("Changed-file discovery needs a git repository".to_string())
        })?;
        let paths = git.get_unmerged_files(options.branch.as_deref())?;
        debug!("Changed files: {:?}", paths);
        Ok(self.parser.load_paths(root, &paths)?)
    }

    fn contexts_for(&self, file: &SourceFile) -> Vec<ApiContext> {
        let routes = self.parser.parse_routes(file);
        self.assembler.assemble(file, &routes)
    }
}

fn canonical_root(repo: &Path) -> Result<PathBuf> {
    repo.canonicalize()
        .with_context(|| format!("Repository path not found: {}", repo.display()))
}

/// The file on disk still has the content it had when it was scanned
fn is_unchanged(file: &SourceFile) -> bool {
    read_source(&file.path)
        .map(|current| calculate_hash(&current) == file.content_hash)
        .unwrap_or(false)
}
