use std::ffi::OsString;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long output is still collected after a killed child.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Whether a non-zero exit aborts the caller or is handed back for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    Bail,
    Tolerate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed (signal or timeout).
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs the git binary. Nothing is retried.
#[derive(Debug, Clone)]
pub struct GitRunner {
    program: OsString,
    envs: Vec<(OsString, OsString)>,
}

impl Default for GitRunner {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitRunner {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            envs: Vec::new(),
        }
    }

    /// Extra environment for every child process.
    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.program.to_string_lossy(), args.join(" "))
    }

    fn command(&self, dir: &Path, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).current_dir(dir);
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }
        cmd
    }

    fn spawn_error(&self, dir: &Path, err: io::Error) -> Error {
        if err.kind() == io::ErrorKind::NotFound && dir.is_dir() {
            Error::ToolNotFound {
                program: self.program.to_string_lossy().to_string(),
            }
        } else {
            Error::fs("run git in", dir, err)
        }
    }

    pub fn run(&self, dir: &Path, args: &[&str], on_failure: OnFailure) -> Result<CommandOutput> {
        self.run_with_timeout(dir, args, on_failure, None)
    }

    /// Run `git args` in `dir`. A timed-out child is killed and reported as a
    /// failure without an exit code.
    pub fn run_with_timeout(
        &self,
        dir: &Path,
        args: &[&str],
        on_failure: OnFailure,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        let described = self.describe(args);
        tracing::debug!(command = %described, dir = %dir.display(), "running");

        let output = match timeout {
            None => {
                let out = self
                    .command(dir, args)
                    .output()
                    .map_err(|e| self.spawn_error(dir, e))?;
                CommandOutput {
                    code: out.status.code(),
                    stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                }
            }
            Some(limit) => self.run_timed(dir, args, limit)?,
        };

        if output.success() {
            return Ok(output);
        }
        match on_failure {
            OnFailure::Tolerate => {
                tracing::debug!(
                    command = %described,
                    code = ?output.code,
                    stderr = %output.stderr.trim(),
                    "tolerated failure"
                );
                Ok(output)
            }
            OnFailure::Bail => Err(Error::CommandFailed {
                command: described,
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            }),
        }
    }

    fn run_timed(&self, dir: &Path, args: &[&str], limit: Duration) -> Result<CommandOutput> {
        let mut cmd = self.command(dir, args);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so helpers git starts (ssh, remote helpers) die with it.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        let mut child = cmd.spawn().map_err(|e| self.spawn_error(dir, e))?;

        // Drain both pipes so a chatty child cannot block on a full buffer.
        let (tx, rx) = mpsc::channel();
        drain(child.stdout.take(), Pipe::Stdout, tx.clone());
        drain(child.stderr.take(), Pipe::Stderr, tx);

        let started = Instant::now();
        let (code, timed_out) = loop {
            match child.try_wait() {
                Ok(Some(status)) => break (status.code(), false),
                Ok(None) if started.elapsed() >= limit => {
                    kill_tree(&mut child);
                    let _ = child.wait();
                    break (None, true);
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    kill_tree(&mut child);
                    return Err(Error::fs("wait for git in", dir, e));
                }
            }
        };

        // A surviving grandchild may hold the pipes open; its output is dropped.
        let deadline = (started + limit).max(Instant::now() + DRAIN_GRACE);
        let mut stdout = String::new();
        let mut stderr = String::new();
        for _ in 0..2 {
            match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok((Pipe::Stdout, text)) => stdout = text,
                Ok((Pipe::Stderr, text)) => stderr = text,
                Err(_) => {
                    tracing::debug!(command = %self.describe(args), "output still held open, dropping it");
                    break;
                }
            }
        }

        if timed_out {
            tracing::warn!(command = %self.describe(args), secs = limit.as_secs(), "timed out");
            stderr = format!("timed out after {}s\n{}", limit.as_secs(), stderr);
        }
        Ok(CommandOutput {
            code,
            stdout,
            stderr,
        })
    }

    // --- typed operations ---

    pub fn init_bare(&self, cwd: &Path, path: &Path) -> Result<CommandOutput> {
        let path = path.to_string_lossy();
        self.run(cwd, &["init", "--bare", &path], OnFailure::Bail)
    }

    pub fn init(&self, dir: &Path) -> Result<CommandOutput> {
        self.run(dir, &["init"], OnFailure::Bail)
    }

    pub fn clone_into(&self, cwd: &Path, source: &Path, dest: &Path) -> Result<CommandOutput> {
        let source = source.to_string_lossy();
        let dest = dest.to_string_lossy();
        self.run(cwd, &["clone", &source, &dest], OnFailure::Bail)
    }

    pub fn remote_add(
        &self,
        dir: &Path,
        name: &str,
        url: &Path,
        on_failure: OnFailure,
    ) -> Result<CommandOutput> {
        let url = url.to_string_lossy();
        self.run(dir, &["remote", "add", name, &url], on_failure)
    }

    pub fn remote_remove(&self, dir: &Path, name: &str, on_failure: OnFailure) -> Result<CommandOutput> {
        self.run(dir, &["remote", "remove", name], on_failure)
    }

    pub fn add_all(&self, dir: &Path) -> Result<CommandOutput> {
        self.run(dir, &["add", "-A"], OnFailure::Bail)
    }

    pub fn commit(&self, dir: &Path, message: &str, on_failure: OnFailure) -> Result<CommandOutput> {
        self.run(dir, &["commit", "-m", message], on_failure)
    }

    /// `git switch -c`: create a branch and check it out.
    pub fn switch_create(&self, dir: &Path, branch: &str, on_failure: OnFailure) -> Result<CommandOutput> {
        self.run(dir, &["switch", "-c", branch], on_failure)
    }

    /// `git checkout -B`: create or reset a branch to HEAD and check it out.
    pub fn checkout_force_branch(
        &self,
        dir: &Path,
        branch: &str,
        on_failure: OnFailure,
    ) -> Result<CommandOutput> {
        self.run(dir, &["checkout", "-B", branch], on_failure)
    }

    /// `git branch -M`: rename the current branch.
    pub fn rename_branch(&self, dir: &Path, branch: &str, on_failure: OnFailure) -> Result<CommandOutput> {
        self.run(dir, &["branch", "-M", branch], on_failure)
    }

    pub fn push_upstream(&self, dir: &Path, branch: &str, on_failure: OnFailure) -> Result<CommandOutput> {
        self.run(dir, &["push", "-u", "origin", branch], on_failure)
    }

    pub fn fetch_all(&self, dir: &Path, on_failure: OnFailure, timeout: Duration) -> Result<CommandOutput> {
        self.run_with_timeout(dir, &["fetch", "--all"], on_failure, Some(timeout))
    }

    pub fn remotes(&self, dir: &Path) -> Result<Vec<String>> {
        let out = self.run(dir, &["remote"], OnFailure::Bail)?;
        Ok(parse_lines(&out.stdout))
    }

    pub fn remote_url(&self, dir: &Path, name: &str) -> Result<Option<String>> {
        let out = self.run(dir, &["remote", "get-url", name], OnFailure::Tolerate)?;
        if !out.success() {
            return Ok(None);
        }
        Ok(Some(out.stdout.trim().to_string()).filter(|s| !s.is_empty()))
    }

    /// The checked-out branch, or `None` when HEAD is detached or unreadable.
    /// An unborn branch (no commits yet) still has a name.
    pub fn current_branch(&self, dir: &Path) -> Result<Option<String>> {
        let out = self.run(dir, &["symbolic-ref", "--quiet", "--short", "HEAD"], OnFailure::Tolerate)?;
        if !out.success() {
            return Ok(None);
        }
        Ok(parse_current_branch(&out.stdout))
    }

    /// Number of paths with uncommitted changes, untracked files included.
    pub fn changed_files(&self, dir: &Path) -> Result<usize> {
        let out = self.run(dir, &["status", "--porcelain"], OnFailure::Bail)?;
        Ok(parse_lines(&out.stdout).len())
    }
}

enum Pipe {
    Stdout,
    Stderr,
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>, which: Pipe, tx: mpsc::Sender<(Pipe, String)>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send((which, String::from_utf8_lossy(&buf).to_string()));
    });
}

/// Kill the child and, on Unix, every process in its group.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;
        if let Ok(pid) = i32::try_from(child.id()) {
            let _ = killpg(Pid::from_raw(pid), Signal::SIGKILL);
        }
    }
    let _ = child.kill();
}

fn parse_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_current_branch(output: &str) -> Option<String> {
    let branch = output.trim();
    if branch.is_empty() || branch == "HEAD" {
        None
    } else {
        Some(branch.to_string())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::GitRunner;
    use std::path::Path;
    use std::process::Command;

    pub fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// A runner that does not depend on the machine's git configuration.
    pub fn runner() -> GitRunner {
        GitRunner::default()
            .with_env("GIT_CONFIG_NOSYSTEM", "1")
            .with_env("GIT_CONFIG_GLOBAL", "/dev/null")
            .with_env("GIT_AUTHOR_NAME", "Test")
            .with_env("GIT_AUTHOR_EMAIL", "test@example.com")
            .with_env("GIT_COMMITTER_NAME", "Test")
            .with_env("GIT_COMMITTER_EMAIL", "test@example.com")
            .with_env("GIT_CONFIG_COUNT", "2")
            .with_env("GIT_CONFIG_KEY_0", "init.defaultBranch")
            .with_env("GIT_CONFIG_VALUE_0", "main")
            .with_env("GIT_CONFIG_KEY_1", "commit.gpgsign")
            .with_env("GIT_CONFIG_VALUE_1", "false")
    }

    /// Run git with the test runner's environment, panicking on failure.
    pub fn git(dir: &Path, args: &[&str]) -> String {
        let out = runner()
            .run(dir, args, super::OnFailure::Bail)
            .unwrap_or_else(|e| panic!("git {args:?} failed: {e}"));
        out.stdout
    }

    /// A working copy at `dir` on `branch` with one committed file.
    pub fn repo_with_commit(dir: &Path, branch: &str) {
        std::fs::create_dir_all(dir).unwrap();
        git(dir, &["init"]);
        git(dir, &["checkout", "-b", branch]);
        std::fs::write(dir.join("README.md"), "hello\n").unwrap();
        git(dir, &["add", "-A"]);
        git(dir, &["commit", "-m", "init"]);
    }
}
