use std::path::{Path, PathBuf};
use std::process::Command;

/// Run `git <args>` in `dir`, returning trimmed stdout on success.
/// Returns `None` if not in a git repo or git is unavailable.
fn git_output(dir: &Path, args: &[&str]) -> Option<String> {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Top-level directory of the enclosing repository.
pub fn repo_root(dir: &Path) -> Option<PathBuf> {
    git_output(dir, &["rev-parse", "--show-toplevel"]).map(PathBuf::from)
}

/// Current branch via `git rev-parse --abbrev-ref HEAD`.
pub fn current_branch(dir: &Path) -> Option<String> {
    git_output(dir, &["rev-parse", "--abbrev-ref", "HEAD"]).filter(|b| b != "HEAD")
}

/// Short hash of HEAD.
pub fn head_commit(dir: &Path) -> Option<String> {
    git_output(dir, &["rev-parse", "--short", "HEAD"])
}
