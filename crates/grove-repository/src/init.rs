use std::fs;
use std::path::{Path, PathBuf};

use grove_config::ConfigFile;
use grove_ref::RefName;
use grove_worktree::{FsCapabilities, NativeFs};

use crate::RepoError;

pub const DEFAULT_BRANCH: &str = "main";

#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Create the git directory at the path itself, with no work tree.
    pub bare: bool,
    /// Branch `HEAD` points at; `main` when unset.
    pub initial_branch: Option<String>,
}

/// Create the directory skeleton, `HEAD` and `config`. Returns the git
/// directory and the work tree. An existing repository is left untouched.
pub(crate) fn init_layout(
    path: &Path,
    options: &InitOptions,
) -> Result<(PathBuf, Option<PathBuf>), RepoError> {
    let path = if path.is_relative() {
        std::env::current_dir()?.join(path)
    } else {
        path.to_path_buf()
    };
    let (git_dir, work_tree) = if options.bare {
        (path.clone(), None)
    } else {
        (path.join(".git"), Some(path))
    };

    if git_dir.join("HEAD").is_file() {
        tracing::debug!(git_dir = %git_dir.display(), "reinitializing existing repository");
        return Ok((git_dir, work_tree));
    }

    let branch = options.initial_branch.as_deref().unwrap_or(DEFAULT_BRANCH);
    let head_target = RefName::new(format!("refs/heads/{}", branch))?;

    for dir in ["objects/info", "objects/pack", "refs/heads", "refs/tags"] {
        fs::create_dir_all(git_dir.join(dir))?;
    }
    fs::write(git_dir.join("HEAD"), format!("ref: {}\n", head_target))?;

    let mut config = ConfigFile::new();
    config.set("core.repositoryformatversion", "0")?;
    config.set("core.filemode", bool_str(NativeFs.supports_executable()))?;
    config.set("core.bare", bool_str(options.bare))?;
    config.set("core.logallrefupdates", "false")?;
    config.write_to(git_dir.join("config"))?;

    tracing::info!(git_dir = %git_dir.display(), branch, bare = options.bare, "initialized repository");
    Ok((git_dir, work_tree))
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
