//! Pushing generated artifacts to a git remote.
//!
//! The publish step stages the registry and manifest, commits them with
//! a configured message, and pushes to the configured remote branch. It
//! is a thin wrapper over the `git` binary; the repository checkout and
//! credentials are the operator's responsibility.

use crate::Result;
use camino::Utf8Path;
use core::time::Duration;
use ohno::{IntoAppError, bail};
use std::process::Stdio;
use tokio::process::Command;

const LOG_TARGET: &str = "   publish";

const GIT_TIMEOUT: Duration = Duration::from_mins(2);

/// Commit and push the given artifact paths.
///
/// Returns `false` without touching history when none of the paths has
/// changed since the last commit.
pub async fn publish_artifacts(
    repo_root: &Utf8Path,
    paths: &[&Utf8Path],
    message: &str,
    remote: &str,
    branch: &str,
) -> Result<bool> {
    if !has_changes(repo_root, paths).await? {
        log::debug!(target: LOG_TARGET, "No artifact changes under '{repo_root}', nothing to publish");
        return Ok(false);
    }

    let mut add_args = vec!["add", "--"];
    add_args.extend(paths.iter().map(|p| p.as_str()));
    let _ = run_git(repo_root, &add_args).await?;

    let _ = run_git(repo_root, &["commit", "-m", message]).await?;
    let _ = run_git(repo_root, &["push", remote, branch]).await?;

    log::info!(target: LOG_TARGET, "Pushed artifact commit to {remote}/{branch}");

    Ok(true)
}

/// True when git sees pending changes in any of the paths.
async fn has_changes(repo_root: &Utf8Path, paths: &[&Utf8Path]) -> Result<bool> {
    let mut args = vec!["status", "--porcelain", "--"];
    args.extend(paths.iter().map(|p| p.as_str()));

    let stdout = run_git(repo_root, &args).await?;
    Ok(!stdout.is_empty())
}

/// Run one git command in `repo_root`, returning trimmed stdout.
async fn run_git(repo_root: &Utf8Path, args: &[&str]) -> Result<String> {
    let child = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .into_app_err("could not spawn git command")?;

    let output = match tokio::time::timeout(GIT_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(e).into_app_err_with(|| format!("'git {}' failed to run", args.join(" "))),
        Err(_) => bail!("'git {}' timed out after {} seconds", args.join(" "), GIT_TIMEOUT.as_secs()),
    };

    if !output.status.success() {
        bail!("{}", failure_detail(&output));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Pick the most useful description of a failed git invocation.
fn failure_detail(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        return stdout.to_string();
    }

    "command failed".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::{ExitStatus, Output};

    fn failed_output(stdout: &[u8], stderr: &[u8]) -> Output {
        #[cfg(unix)]
        let status = {
            use std::os::unix::process::ExitStatusExt;
            ExitStatus::from_raw(256)
        };

        #[cfg(windows)]
        let status = {
            use std::os::windows::process::ExitStatusExt;
            ExitStatus::from_raw(1)
        };

        Output {
            status,
            stdout: stdout.to_vec(),
            stderr: stderr.to_vec(),
        }
    }

    #[test]
    fn failure_detail_prefers_stderr_then_stdout() {
        let output = failed_output(b"ignored", b"fatal: not a git repository\n");
        assert_eq!(failure_detail(&output), "fatal: not a git repository");

        let output = failed_output(b"nothing to commit\n", b"  ");
        assert_eq!(failure_detail(&output), "nothing to commit");

        let output = failed_output(b"", b"");
        assert_eq!(failure_detail(&output), "command failed");
    }

    #[tokio::test]
    async fn change_detection_tracks_the_working_tree() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();

        let _ = run_git(root, &["init", "--quiet"]).await.unwrap();
        fs::write(root.join("themes.json"), "[]\n").unwrap();
        assert!(has_changes(root, &[Utf8Path::new("themes.json")]).await.unwrap());

        let _ = run_git(root, &["add", "--", "themes.json"]).await.unwrap();
        let _ = run_git(
            root,
            &[
                "-c",
                "user.email=indexer@example.com",
                "-c",
                "user.name=indexer",
                "commit",
                "--quiet",
                "-m",
                "seed",
            ],
        )
        .await
        .unwrap();

        assert!(!has_changes(root, &[Utf8Path::new("themes.json")]).await.unwrap());

        fs::write(root.join("themes.json"), "[1]\n").unwrap();
        assert!(has_changes(root, &[Utf8Path::new("themes.json")]).await.unwrap());
    }

    #[tokio::test]
    async fn git_failures_surface_their_stderr() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();

        // Not a repository, so status must fail
        let err = has_changes(root, &[Utf8Path::new("themes.json")]).await.unwrap_err();
        assert!(err.to_string().contains("not a git repository"));
    }
}
