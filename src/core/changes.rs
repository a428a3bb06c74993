use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error};

use crate::error::{AutoSwaggerError, Result};
use super::parser::{decode_source, encode_latin1};

/// A single proposed edit to a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Repository-relative path of the target file
    pub filepath: String,

    /// 0-based line index the snippet is placed at
    pub start_line: usize,

    /// Exclusive end of the replaced range; `None` inserts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,

    pub code: String,

    #[serde(default)]
    pub description: String,
}

impl Change {
    pub fn is_insertion(&self) -> bool {
        self.end_line.map_or(true, |end| end == self.start_line)
    }
}

/// Lines inserted so far per file while resolving one batch
#[derive(Debug, Default)]
pub struct FileOffsetTable {
    offsets: HashMap<String, usize>,
}

impl FileOffsetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self, filepath: &str) -> usize {
        self.offsets.get(filepath).copied().unwrap_or(0)
    }

    pub fn record(&mut self, filepath: &str, inserted_lines: usize) {
        *self.offsets.entry(filepath.to_string()).or_insert(0) += inserted_lines;
    }
}

/// Writes changes into files under a repository root
pub struct ChangeApplier {
    root: PathBuf,
}

impl ChangeApplier {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Apply one change. Failures are logged and reported as `false`.
    pub fn apply(&self, change: &Change) -> bool {
        match self.try_apply(change) {
            Ok(path) => {
                debug!("Applied change to {} at line {}", path.display(), change.start_line);
                true
            }
            Err(e) => {
                error!("❌ Failed to apply change to {}: {}", change.filepath, e);
                false
            }
        }
    }

    /// Absolute path for a repository-relative one, refusing anything outside the root
    pub fn resolve(&self, filepath: &str) -> Result<PathBuf> {
        let mut resolved = PathBuf::new();
        for component in Path::new(filepath).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !resolved.pop() {
                        return Err(AutoSwaggerError::FileSystem(format!(
                            "{} escapes the repository root",
                            filepath
                        )));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(AutoSwaggerError::FileSystem(format!(
                        "{} is not a relative path",
                        filepath
                    )));
                }
            }
        }
        if resolved.as_os_str().is_empty() {
            return Err(AutoSwaggerError::FileSystem("Empty file path".to_string()));
        }
        Ok(self.root.join(resolved))
    }

    fn try_apply(&self, change: &Change) -> Result<PathBuf> {
        let path = self.resolve(&change.filepath)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let (existing, latin1) = if path.exists() {
            decode_source(std::fs::read(&path)?)
        } else {
            (String::new(), false)
        };

        let mut lines: Vec<String> = existing.split_inclusive('\n').map(str::to_string).collect();
        if let Some(last) = lines.last_mut() {
            if !last.ends_with('\n') {
                last.push('\n');
            }
        }
        while lines.len() < change.start_line {
            lines.push("\n".to_string());
        }

        let start = change.start_line;
        let indent: String = lines
            .get(start)
            .map(|line| line.chars().take_while(|c| *c == ' ' || *c == '\t').collect())
            .unwrap_or_default();

        // One output line per `\n`-separated segment, trailing empty one included
        let snippet: Vec<String> = change
            .code
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .map(|line| {
                if line.trim().is_empty() {
                    "\n".to_string()
                } else {
                    format!("{}{}\n", indent, line)
                }
            })
            .collect();

        if change.is_insertion() {
            lines.splice(start..start, snippet);
        } else {
            let end = change.end_line.unwrap_or(start).min(lines.len());
            if end < start {
                return Err(AutoSwaggerError::FileSystem(format!(
                    "Invalid line range {}..{}",
                    start, end
                )));
            }
            lines.splice(start..end, snippet);
        }

        let text = lines.concat();
        let bytes = match latin1.then(|| encode_latin1(&text)).flatten() {
            Some(bytes) => bytes,
            None => text.into_bytes(),
        };
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use predicates::prelude::*;

    fn insertion(filepath: &str, start_line: usize, code: &str) -> Change {
        Change {
            filepath: filepath.to_string(),
            start_line,
            end_line: None,
            code: code.to_string(),
            description: "doc".to_string(),
        }
    }

    #[test]
    fn test_insert_with_indentation() {
        let temp = TempDir::new().unwrap();
        let file = temp.child("routes.js");
        file.write_str("const r = 1;\n  router.get('/a', h);\n").unwrap();

        let applier = ChangeApplier::new(temp.path());
        assert!(applier.apply(&insertion("routes.js", 1, "/**\n * @swagger\n\n */")));

        file.assert("const r = 1;\n  /**\n   * @swagger\n\n   */\n  router.get('/a', h);\n");
    }

    #[test]
    fn test_trailing_newline_in_code_adds_a_line() {
        let temp = TempDir::new().unwrap();
        let file = temp.child("app.js");
        file.write_str("a\nb\n").unwrap();

        let code = "/**\r\n * doc\r\n */\n";
        assert!(ChangeApplier::new(temp.path()).apply(&insertion("app.js", 1, code)));

        // newlines(code) + 1 lines inserted
        file.assert("a\n/**\n * doc\n */\n\nb\n");
    }

    #[test]
    fn test_latin1_file_is_edited_in_place() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.js");
        std::fs::write(&path, b"// caf\xE9\napp.get('/', h);\n").unwrap();

        let applier = ChangeApplier::new(temp.path());
        assert!(applier.apply(&insertion("app.js", 1, "/** @swagger */")));

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, b"// caf\xE9\n/** @swagger */\napp.get('/', h);\n".to_vec());
    }

    #[test]
    fn test_pads_short_file_without_losing_lines() {
        let temp = TempDir::new().unwrap();
        let file = temp.child("app.js");
        file.write_str("a\nb\nc").unwrap();

        let applier = ChangeApplier::new(temp.path());
        assert!(applier.apply(&insertion("app.js", 10, "/** doc */")));

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(&lines[..3], &["a", "b", "c"]);
        assert!(lines[3..10].iter().all(|l| l.is_empty()));
        assert_eq!(lines[10], "/** doc */");
        assert_eq!(lines.len(), 11);
    }

    #[test]
    fn test_replace_range() {
        let temp = TempDir::new().unwrap();
        let file = temp.child("app.js");
        file.write_str("one\n/** old\n */\nroute\n").unwrap();

        let change = Change {
            end_line: Some(3),
            ..insertion("app.js", 1, "/** new */")
        };
        assert!(ChangeApplier::new(temp.path()).apply(&change));
        file.assert("one\n/** new */\nroute\n");
    }

    #[test]
    fn test_replace_end_clamped_to_file_length() {
        let temp = TempDir::new().unwrap();
        let file = temp.child("app.js");
        file.write_str("keep\ndrop\n").unwrap();

        let change = Change {
            end_line: Some(99),
            ..insertion("app.js", 1, "new")
        };
        assert!(ChangeApplier::new(temp.path()).apply(&change));
        file.assert("keep\nnew\n");
    }

    #[test]
    fn test_creates_missing_file_and_parents() {
        let temp = TempDir::new().unwrap();
        let applier = ChangeApplier::new(temp.path());
        assert!(applier.apply(&insertion("src/new/routes.js", 0, "// hello")));
        temp.child("src/new/routes.js").assert(predicate::str::contains("// hello"));
    }

    #[test]
    fn test_rejects_paths_outside_root() {
        let temp = TempDir::new().unwrap();
        let applier = ChangeApplier::new(temp.path().join("repo"));
        assert!(!applier.apply(&insertion("../escape.js", 0, "x")));
        assert!(!applier.apply(&insertion("/etc/passwd", 0, "x")));
        temp.child("escape.js").assert(predicate::path::missing());
        assert!(applier.resolve("src/../app.js").unwrap().ends_with("app.js"));
    }

    #[test]
    fn test_offset_table_accumulates_per_file() {
        let mut table = FileOffsetTable::new();
        table.record("a.js", 3);
        table.record("a.js", 2);
        table.record("b.js", 1);
        assert_eq!(table.offset("a.js"), 5);
        assert_eq!(table.offset("b.js"), 1);
        assert_eq!(table.offset("c.js"), 0);
    }
}
