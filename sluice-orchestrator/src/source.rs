//! Source control adapter
//!
//! The orchestrator reads exactly two things from repositories: the raw bytes
//! of a file at a revision, and the paths changed between two commits.
//! [`GitCliSource`] answers both from bare repositories on local disk by
//! shelling out to `git`.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("repository {0} not found")]
    RepositoryNotFound(Uuid),

    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    Git { command: &'static str, stderr: String },

    #[error("invalid revision '{0}'")]
    InvalidRevision(String),
}

#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Raw content of `path` at `revision`, or `None` when the file does not exist there
    async fn read_file(
        &self,
        repository_id: Uuid,
        revision: &str,
        path: &str,
    ) -> Result<Option<Vec<u8>>, SourceError>;

    /// Paths changed between two commits
    async fn changed_paths(
        &self,
        repository_id: Uuid,
        from: &str,
        to: &str,
    ) -> Result<Vec<String>, SourceError>;
}

/// Bare repositories stored at `<repos_dir>/<repository-id>`
pub struct GitCliSource {
    repos_dir: PathBuf,
}

impl GitCliSource {
    pub fn new(repos_dir: impl Into<PathBuf>) -> Self {
        Self {
            repos_dir: repos_dir.into(),
        }
    }

    fn git_dir(&self, repository_id: Uuid) -> Result<PathBuf, SourceError> {
        let dir = self.repos_dir.join(repository_id.to_string());
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(SourceError::RepositoryNotFound(repository_id))
        }
    }
}

/// Reject revisions git could read as an option or as a `rev:path` split
fn check_revision(revision: &str) -> Result<(), SourceError> {
    if revision.is_empty()
        || revision.starts_with('-')
        || revision.contains(':')
        || revision.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(SourceError::InvalidRevision(revision.to_string()));
    }
    Ok(())
}

#[async_trait]
impl SourceControl for GitCliSource {
    async fn read_file(
        &self,
        repository_id: Uuid,
        revision: &str,
        path: &str,
    ) -> Result<Option<Vec<u8>>, SourceError> {
        let git_dir = self.git_dir(repository_id)?;
        check_revision(revision)?;

        let output = Command::new("git")
            .arg("--git-dir")
            .arg(&git_dir)
            .args(["show", "--end-of-options"])
            .arg(format!("{}:{}", revision, path))
            .output()
            .await?;

        if output.status.success() {
            Ok(Some(output.stdout))
        } else {
            // Missing path or unknown revision
            tracing::debug!(
                "git show {}:{} in {} failed: {}",
                revision,
                path,
                repository_id,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            Ok(None)
        }
    }

    async fn changed_paths(
        &self,
        repository_id: Uuid,
        from: &str,
        to: &str,
    ) -> Result<Vec<String>, SourceError> {
        let git_dir = self.git_dir(repository_id)?;
        check_revision(from)?;
        check_revision(to)?;

        let output = Command::new("git")
            .arg("--git-dir")
            .arg(&git_dir)
            .args(["diff", "--name-only", "--end-of-options", from, to])
            .output()
            .await?;

        if !output.status.success() {
            return Err(SourceError::Git {
                command: "diff",
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }
}

/// Source control backed by maps, for tests
#[cfg(test)]
#[derive(Default)]
pub struct MemorySource {
    files: std::sync::Mutex<std::collections::HashMap<(Uuid, String, String), Vec<u8>>>,
    diffs: std::sync::Mutex<std::collections::HashMap<(Uuid, String, String), Vec<String>>>,
}

#[cfg(test)]
impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, repository_id: Uuid, revision: &str, path: &str, content: &str) -> Self {
        if let Ok(mut files) = self.files.lock() {
            files.insert(
                (repository_id, revision.to_string(), path.to_string()),
                content.as_bytes().to_vec(),
            );
        }
        self
    }

    pub fn with_diff(self, repository_id: Uuid, from: &str, to: &str, paths: &[&str]) -> Self {
        if let Ok(mut diffs) = self.diffs.lock() {
            diffs.insert(
                (repository_id, from.to_string(), to.to_string()),
                paths.iter().map(|p| p.to_string()).collect(),
            );
        }
        self
    }
}

#[cfg(test)]
#[async_trait]
impl SourceControl for MemorySource {
    async fn read_file(
        &self,
        repository_id: Uuid,
        revision: &str,
        path: &str,
    ) -> Result<Option<Vec<u8>>, SourceError> {
        let files = self.files.lock().map_err(|_| SourceError::RepositoryNotFound(repository_id))?;
        Ok(files
            .get(&(repository_id, revision.to_string(), path.to_string()))
            .cloned())
    }

    async fn changed_paths(
        &self,
        repository_id: Uuid,
        from: &str,
        to: &str,
    ) -> Result<Vec<String>, SourceError> {
        let diffs = self.diffs.lock().map_err(|_| SourceError::RepositoryNotFound(repository_id))?;
        diffs
            .get(&(repository_id, from.to_string(), to.to_string()))
            .cloned()
            .ok_or(SourceError::Git {
                command: "diff",
                stderr: format!("unknown revision range {}..{}", from, to),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::process::Command as StdCommand;
    use tempfile::TempDir;

    fn git(dir: &Path, args: &[&str]) -> String {
        let output = StdCommand::new("git")
            .arg("-C")
            .arg(dir)
            .args([
                "-c",
                "user.name=sluice",
                "-c",
                "user.email=sluice@localhost",
                "-c",
                "commit.gpgsign=false",
            ])
            .args(args)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    /// A bare repository with two commits on `main`; returns (root, repo id, first, second)
    fn bare_repository() -> (TempDir, Uuid, String, String) {
        let root = TempDir::new().unwrap();
        let work = root.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        git(&work, &["init", "-q"]);
        git(&work, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        std::fs::write(work.join(".ci.yml"), "jobs:\n  v1: {}\n").unwrap();
        git(&work, &["add", "."]);
        git(&work, &["commit", "-q", "-m", "first"]);
        let first = git(&work, &["rev-parse", "HEAD"]);

        std::fs::write(work.join(".ci.yml"), "jobs:\n  v2: {}\n").unwrap();
        std::fs::create_dir_all(work.join("docs")).unwrap();
        std::fs::write(work.join("docs/index.md"), "# docs\n").unwrap();
        git(&work, &["add", "."]);
        git(&work, &["commit", "-q", "-m", "second"]);
        let second = git(&work, &["rev-parse", "HEAD"]);

        let repository_id = Uuid::new_v4();
        let repos = root.path().join("repos");
        std::fs::create_dir_all(&repos).unwrap();
        let work_path = work.to_string_lossy().into_owned();
        let bare_path = repos.join(repository_id.to_string()).to_string_lossy().into_owned();
        git(root.path(), &["clone", "-q", "--bare", work_path.as_str(), bare_path.as_str()]);

        (root, repository_id, first, second)
    }

    #[tokio::test]
    async fn test_git_reads_files_at_revisions() {
        let (root, repo, first, _) = bare_repository();
        let source = GitCliSource::new(root.path().join("repos"));

        let old = source.read_file(repo, &first, ".ci.yml").await.unwrap();
        assert_eq!(old.as_deref(), Some("jobs:\n  v1: {}\n".as_bytes()));
        let head = source.read_file(repo, "main", ".ci.yml").await.unwrap();
        assert_eq!(head.as_deref(), Some("jobs:\n  v2: {}\n".as_bytes()));

        assert!(source.read_file(repo, "main", ".pm-ci.yml").await.unwrap().is_none());
        assert!(source.read_file(repo, "no-such-branch", ".ci.yml").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_git_lists_changed_paths() {
        let (root, repo, first, second) = bare_repository();
        let source = GitCliSource::new(root.path().join("repos"));

        let changed = source.changed_paths(repo, &first, &second).await.unwrap();
        assert_eq!(changed, vec![".ci.yml", "docs/index.md"]);

        let unknown = "1234567890abcdef1234567890abcdef12345678";
        assert!(matches!(
            source.changed_paths(repo, unknown, &second).await,
            Err(SourceError::Git { .. })
        ));
    }

    #[tokio::test]
    async fn test_option_like_revisions_never_reach_git() {
        let (root, repo, first, second) = bare_repository();
        let source = GitCliSource::new(root.path().join("repos"));
        let victim = root.path().join("victim.txt");
        std::fs::write(&victim, "IMPORTANT DATA\n").unwrap();
        let option = format!("--output={}", victim.display());

        assert!(matches!(
            source.read_file(repo, &option, ".ci.yml").await,
            Err(SourceError::InvalidRevision(_))
        ));
        assert!(matches!(
            source.changed_paths(repo, &option, &second).await,
            Err(SourceError::InvalidRevision(_))
        ));
        assert!(matches!(
            source.changed_paths(repo, &first, &option).await,
            Err(SourceError::InvalidRevision(_))
        ));

        assert_eq!(std::fs::read_to_string(&victim).unwrap(), "IMPORTANT DATA\n");
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_check_revision() {
        assert!(check_revision("main").is_ok());
        assert!(check_revision("release/1.0").is_ok());
        assert!(check_revision("0123abcd").is_ok());
        assert!(check_revision("").is_err());
        assert!(check_revision("-p").is_err());
        assert!(check_revision("--output=/tmp/x").is_err());
        assert!(check_revision("main:secret").is_err());
        assert!(check_revision("a b").is_err());
    }

    #[tokio::test]
    async fn test_missing_repository_is_an_error() {
        let source = GitCliSource::new("/nonexistent/sluice/repos");
        let repository_id = Uuid::new_v4();

        let result = source.read_file(repository_id, "main", ".ci.yml").await;
        assert!(matches!(result, Err(SourceError::RepositoryNotFound(id)) if id == repository_id));

        let result = source.changed_paths(repository_id, "a", "b").await;
        assert!(matches!(result, Err(SourceError::RepositoryNotFound(_))));
    }

    #[tokio::test]
    async fn test_memory_source() {
        let repository_id = Uuid::new_v4();
        let source = MemorySource::new()
            .with_file(repository_id, "main", ".ci.yml", "jobs: {}")
            .with_diff(repository_id, "a", "b", &["src/lib.rs"]);

        let content = source.read_file(repository_id, "main", ".ci.yml").await.unwrap();
        assert_eq!(content.as_deref(), Some("jobs: {}".as_bytes()));
        assert!(source.read_file(repository_id, "dev", ".ci.yml").await.unwrap().is_none());
        assert_eq!(
            source.changed_paths(repository_id, "a", "b").await.unwrap(),
            vec!["src/lib.rs"]
        );
        assert!(source.changed_paths(repository_id, "b", "c").await.is_err());
    }
}
