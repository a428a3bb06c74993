use std::path::{Path, PathBuf};
use sha2::{Sha256, Digest};
use ignore::WalkBuilder;
use tracing::debug;

use crate::config::{ParsingConfig, ProjectConfig};
use crate::error::{AutoSwaggerError, Result};
use super::languages::{ExpressParser, RouteMatch, RouteParser};

/// A discovered API source file
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Absolute path on disk
    pub path: PathBuf,

    /// Path relative to the repository root, `/`-separated
    pub relative_path: String,

    /// Content hash taken at discovery time
    pub content_hash: String,

    /// Decoded source text
    pub content: String,
}

/// Walks a repository for files that register HTTP routes
pub struct CodeParser {
    config: ParsingConfig,
    ignore_dirs: Vec<String>,
    route_parser: Box<dyn RouteParser>,
}

impl CodeParser {
    pub fn new(parsing: &ParsingConfig, project: &ProjectConfig, doc_tags: &[String]) -> Result<Self> {
        Ok(Self {
            config: parsing.clone(),
            ignore_dirs: project.ignore_dirs.clone(),
            route_parser: Box::new(ExpressParser::new(doc_tags)?),
        })
    }

    pub fn framework_name(&self) -> &str {
        self.route_parser.framework_name()
    }

    /// Find every API file under `root`
    pub fn discover(&self, root: &Path) -> Result<Vec<SourceFile>> {
        let ignore_dirs = self.ignore_dirs.clone();

        // Use ignore crate to respect .gitignore and configured directory names
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                !(is_dir && ignore_dirs.iter().any(|d| entry.file_name() == d.as_str()))
            })
            .build();

        let mut paths = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| AutoSwaggerError::FileSystem(e.to_string()))?;
            if entry.path().is_file() {
                paths.push(entry.into_path());
            }
        }
        paths.sort();

        self.load_paths(root, &paths)
    }

    /// Load the API files among an explicit list of paths
    pub fn load_paths(&self, root: &Path, paths: &[PathBuf]) -> Result<Vec<SourceFile>> {
        let mut files = Vec::new();

        for path in paths {
            if !self.should_parse_file(path) || self.is_ignored(root, path) {
                continue;
            }
            match self.load_file(root, path) {
                Ok(Some(file)) => files.push(file),
                Ok(None) => debug!("Skipping non-API file {}", path.display()),
                Err(e) => debug!("Skipping {}: {}", path.display(), e),
            }
        }

        Ok(files)
    }

    /// Read a file and keep it only if it looks like it registers routes
    fn load_file(&self, root: &Path, path: &Path) -> Result<Option<SourceFile>> {
        let metadata = std::fs::metadata(path)?;
        if metadata.len() as usize > self.config.max_file_size {
            return Err(AutoSwaggerError::Parser(format!(
                "File {} exceeds maximum size limit",
                path.display()
            )));
        }

        let content = read_source(path)?;
        if !self.route_parser.is_api_source(&content) {
            return Ok(None);
        }

        Ok(Some(SourceFile {
            path: path.to_path_buf(),
            relative_path: relative_path(root, path)?,
            content_hash: calculate_hash(&content),
            content,
        }))
    }

    /// Route registrations in a discovered file
    pub fn parse_routes(&self, file: &SourceFile) -> Vec<RouteMatch> {
        self.route_parser.extract_routes(&file.content)
    }

    /// Determine if a file should be parsed based on its extension
    fn should_parse_file(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        if self.config.file_extensions.is_empty() {
            self.route_parser.file_extensions().contains(&extension)
        } else {
            self.config.file_extensions.iter().any(|e| e == extension)
        }
    }

    fn is_ignored(&self, root: &Path, path: &Path) -> bool {
        path.strip_prefix(root)
            .map(|rel| {
                rel.components().any(|c| {
                    self.ignore_dirs.iter().any(|d| c.as_os_str() == d.as_str())
                })
            })
            .unwrap_or(true)
    }
}

/// Read source text as UTF-8, falling back to Latin-1
pub fn read_source(path: &Path) -> Result<String> {
    Ok(decode_source(std::fs::read(path)?).0)
}

/// Decoded text, and whether the Latin-1 fallback was needed
pub fn decode_source(bytes: Vec<u8>) -> (String, bool) {
    match String::from_utf8(bytes) {
        Ok(text) => (text, false),
        Err(e) => (e.into_bytes().iter().map(|&b| b as char).collect(), true),
    }
}

/// Latin-1 bytes for `text`, or `None` if some char does not fit
pub fn encode_latin1(text: &str) -> Option<Vec<u8>> {
    text.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect()
}

/// Calculate SHA256 hash of content
pub fn calculate_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn relative_path(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).map_err(|_| {
        AutoSwaggerError::FileSystem(format!(
            "{} is outside {}",
            path.display(),
            root.display()
        ))
    })?;
    Ok(rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}
