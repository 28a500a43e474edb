//! Subprocess execution seam.
//!
//! Every external command the tool runs goes through [`Host`], so probes and
//! workflows can be exercised against scripted fakes instead of real binaries.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

/// Output from a command execution.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    /// The program could not be spawned at all (not on PATH).
    pub not_found: bool,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            success: true,
            ..Default::default()
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    pub fn missing() -> Self {
        Self {
            not_found: true,
            ..Default::default()
        }
    }

    /// Whether the failure looks like the process lacked privileges.
    pub fn is_permission_denied(&self) -> bool {
        if self.success {
            return false;
        }
        let text = format!("{}\n{}", self.stderr, self.stdout).to_lowercase();
        text.contains("eacces")
            || text.contains("eperm")
            || text.contains("permission denied")
            || text.contains("operation not permitted")
    }

    /// Short single-line description of a failure for reports.
    pub fn failure_summary(&self) -> String {
        if self.not_found {
            return "command not found".to_string();
        }
        let source = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        source
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .unwrap_or("exited with a non-zero status")
            .to_string()
    }
}

/// Capabilities the tool needs from the machine it runs on.
#[async_trait]
pub trait Host: Send + Sync {
    /// Run a program to completion and capture its output.
    async fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> CommandOutput;

    /// Run a program with inherited stdio so the user sees its progress.
    /// Returns true when it exits successfully.
    async fn run_interactive(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> bool {
        self.run(program, args, cwd).await.success
    }

    /// Whether the container daemon answers.
    async fn container_runtime_live(&self) -> bool {
        self.run("docker", &["info"], None).await.success
    }
}

/// The real machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

#[async_trait]
impl Host for SystemHost {
    async fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> CommandOutput {
        tracing::debug!("Running {} {}", program, args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        match cmd.output().await {
            Ok(output) => CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                success: output.status.success(),
                not_found: false,
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{} is not installed", program);
                CommandOutput::missing()
            }
            Err(e) => {
                tracing::debug!("Failed to spawn {}: {}", program, e);
                CommandOutput::failed(e.to_string())
            }
        }
    }

    async fn run_interactive(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> bool {
        tracing::debug!("Running (interactive) {} {}", program, args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        match cmd.status().await {
            Ok(status) => status.success(),
            Err(e) => {
                tracing::warn!("Failed to spawn {}: {}", program, e);
                false
            }
        }
    }

    async fn container_runtime_live(&self) -> bool {
        match bollard::Docker::connect_with_local_defaults() {
            Ok(docker) => match docker.ping().await {
                Ok(_) => true,
                Err(e) => {
                    tracing::debug!("Docker ping failed: {}", e);
                    self.run("docker", &["info"], None).await.success
                }
            },
            Err(e) => {
                tracing::debug!("Docker socket unavailable: {}", e);
                self.run("docker", &["info"], None).await.success
            }
        }
    }
}

/// Whether a binary is on PATH, without running it.
pub fn is_on_path(program: &str) -> bool {
    which::which(program).is_ok()
}


#[cfg(test)]
mod tests {
    use super::fake::FakeHost;
    use super::*;

    #[test]
    fn test_permission_denied_detection() {
        let out = CommandOutput::failed("npm ERR! code EACCES\nnpm ERR! syscall mkdir");
        assert!(out.is_permission_denied());

        let out = CommandOutput::failed("Error: Permission denied (os error 13)");
        assert!(out.is_permission_denied());

        let out = CommandOutput::failed("network timeout");
        assert!(!out.is_permission_denied());

        assert!(!CommandOutput::ok("permission denied in a log line").is_permission_denied());
    }

    #[test]
    fn test_failure_summary_uses_last_line() {
        let out = CommandOutput::failed("warning: foo\nerror: could not connect\n\n");
        assert_eq!(out.failure_summary(), "error: could not connect");
        assert_eq!(CommandOutput::missing().failure_summary(), "command not found");
        assert_eq!(
            CommandOutput::failed("").failure_summary(),
            "exited with a non-zero status"
        );
    }

    #[tokio::test]
    async fn test_system_host_reports_missing_binary() {
        let out = SystemHost
            .run("launchkit-definitely-not-a-real-binary", &[], None)
            .await;
        assert!(!out.success);
        assert!(out.not_found);
    }

    #[tokio::test]
    async fn test_fake_host_replays_queue_then_repeats_last() {
        let host = FakeHost::new()
            .on("pnpm --version", CommandOutput::missing())
            .on("pnpm --version", CommandOutput::ok("9.1.0\n"));

        assert!(host.run("pnpm", &["--version"], None).await.not_found);
        assert_eq!(host.run("pnpm", &["--version"], None).await.stdout, "9.1.0\n");
        assert_eq!(host.run("pnpm", &["--version"], None).await.stdout, "9.1.0\n");
        assert_eq!(host.calls().len(), 3);
    }
}
