use git2::build::CheckoutBuilder;
use git2::{BranchType, Diff, DiffOptions, Oid, Repository, Signature};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::GitConfig;
use crate::error::{AutoSwaggerError, Result};
use super::changes::Change;

const DEFAULT_AUTHOR: &str = "auto-swagger";
const DEFAULT_EMAIL: &str = "auto-swagger@localhost";

/// Branch, diff and commit operations on the target repository
pub struct GitWorkspace {
    repo: Repository,
    workdir: PathBuf,
    config: GitConfig,
}

impl GitWorkspace {
    /// Open the repository containing `path`
    pub fn open<P: AsRef<Path>>(path: P, config: &GitConfig) -> Result<Self> {
        let repo = Repository::discover(path.as_ref())?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| AutoSwaggerError::Config("Bare repositories are not supported".to_string()))?
            .canonicalize()?;

        Ok(Self {
            repo,
            workdir,
            config: config.clone(),
        })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Check out the documentation branch, creating it from HEAD if needed
    pub fn setup_branch(&self) -> Result<()> {
        let name = &self.config.branch_name;
        let refname = format!("refs/heads/{}", name);

        let head_commit = match self.repo.head() {
            Ok(head) => head.peel_to_commit()?,
            Err(_) => {
                // Unborn HEAD: the first commit will create the branch
                self.repo.set_head(&refname)?;
                info!("🌱 Using new branch {} (repository has no commits yet)", name);
                return Ok(());
            }
        };

        if self.repo.find_branch(name, BranchType::Local).is_err() {
            self.repo.branch(name, &head_commit, false)?;
            info!("🌿 Created branch {}", name);
        }

        let target = self.repo.revparse_single(&refname)?;
        self.repo
            .checkout_tree(&target, Some(CheckoutBuilder::new().safe()))?;
        self.repo.set_head(&refname)?;
        info!("🔀 Checked out {}", name);
        Ok(())
    }

    /// Files that differ from `branch` (or from HEAD when no branch is given)
    pub fn get_unmerged_files(&self, branch: Option<&str>) -> Result<Vec<PathBuf>> {
        let mut paths = BTreeSet::new();
        let head_tree = self.repo.head().ok().and_then(|h| h.peel_to_tree().ok());

        if let Some(branch) = branch {
            let head = self.repo.head()?.peel_to_commit()?.id();
            let other = self.repo.revparse_single(branch)?.peel_to_commit()?.id();
            let base = self.repo.merge_base(head, other)?;
            let base_tree = self.repo.find_commit(base)?.tree()?;
            let diff = self
                .repo
                .diff_tree_to_tree(Some(&base_tree), head_tree.as_ref(), None)?;
            collect_paths(&diff, &mut paths);
        }

        let mut options = DiffOptions::new();
        options.include_untracked(true).recurse_untracked_dirs(true);
        let diff = self
            .repo
            .diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut options))?;
        collect_paths(&diff, &mut paths);

        let files: Vec<PathBuf> = paths
            .into_iter()
            .map(|rel| self.workdir.join(rel))
            .filter(|path| path.is_file())
            .collect();
        debug!("{} changed files found", files.len());
        Ok(files)
    }

    /// Stage the files touched by `changes` and commit them on the current branch.
    ///
    /// `root` is the directory change paths are relative to.
    pub fn commit_changes(&self, root: &Path, changes: &[Change]) -> Result<Option<Oid>> {
        if changes.is_empty() {
            return Ok(None);
        }

        let mut index = self.repo.index()?;
        let touched: BTreeSet<&str> = changes.iter().map(|c| c.filepath.as_str()).collect();
        for filepath in touched {
            let absolute = root.join(filepath);
            let relative = absolute.strip_prefix(&self.workdir).map_err(|_| {
                AutoSwaggerError::FileSystem(format!(
                    "{} is outside the repository",
                    absolute.display()
                ))
            })?;
            index.add_path(relative)?;
        }
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let signature = self.signature()?;

        let parents: Vec<git2::Commit> = self
            .repo
            .head()
            .ok()
            .and_then(|reference| reference.peel_to_commit().ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &self.commit_message(changes),
            &tree,
            &parent_refs,
        )?;
        info!("✅ Committed {} changes as {}", changes.len(), oid);
        Ok(Some(oid))
    }

    fn commit_message(&self, changes: &[Change]) -> String {
        let bullets: Vec<String> = changes
            .iter()
            .map(|c| {
                if c.description.trim().is_empty() {
                    format!("- Document {}", c.filepath)
                } else {
                    format!("- {}", c.description.trim())
                }
            })
            .collect();
        format!("{}\n\n{}", self.config.commit_message, bullets.join("\n"))
    }

    fn signature(&self) -> Result<Signature<'static>> {
        if let Ok(signature) = self.repo.signature() {
            return Ok(signature.to_owned());
        }
        let name = self.config.author_name.as_deref().unwrap_or(DEFAULT_AUTHOR);
        let email = self.config.author_email.as_deref().unwrap_or(DEFAULT_EMAIL);
        Ok(Signature::now(name, email)?)
    }
}

fn collect_paths(diff: &Diff<'_>, paths: &mut BTreeSet<PathBuf>) {
    for delta in diff.deltas() {
        if let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) {
            paths.insert(path.to_path_buf());
        }
    }
}
