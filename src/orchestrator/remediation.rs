//! Side-effecting install steps.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::ToolConfig;
use crate::exec::{is_on_path, Host};
use crate::ui;

/// An automated fix the orchestrator can offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remediation {
    InstallPackageManager { upgrade: bool },
    InstallLocalPackages(Vec<String>),
}

impl Remediation {
    pub fn describe(&self, package_manager: &str) -> String {
        match self {
            Remediation::InstallPackageManager { upgrade: false } => {
                format!("Install {}", package_manager)
            }
            Remediation::InstallPackageManager { upgrade: true } => {
                format!("Upgrade {}", package_manager)
            }
            Remediation::InstallLocalPackages(names) => {
                format!("Install project dependencies ({})", names.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    /// Needs elevated privileges; the detail is the tool's own message.
    PermissionDenied(String),
    Failed(String),
}

/// A non-privileged way to perform a step that hit a permission error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
    pub label: String,
    pub program: String,
    pub args: Vec<String>,
}

impl Alternative {
    fn new(label: &str, program: &str, args: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn shell(label: &str, script: &str) -> Self {
        Self::new(label, "sh", &["-c", script])
    }
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

#[async_trait]
pub trait Remediator: Send + Sync {
    async fn apply(&self, step: &Remediation) -> InstallOutcome;

    /// Strategies that avoid elevated privileges for `step`.
    fn alternatives(&self, step: &Remediation) -> Vec<Alternative>;

    async fn apply_alternative(&self, alternative: &Alternative) -> InstallOutcome;
}

/// Runs install steps through the real package tooling.
pub struct SystemRemediator<'a> {
    host: &'a dyn Host,
    config: &'a ToolConfig,
    project: PathBuf,
}

impl<'a> SystemRemediator<'a> {
    pub fn new(host: &'a dyn Host, config: &'a ToolConfig, project: &Path) -> Self {
        Self {
            host,
            config,
            project: project.to_path_buf(),
        }
    }

    async fn run_step(&self, label: &str, program: &str, args: &[&str], cwd: Option<&Path>) -> InstallOutcome {
        let pb = ui::spinner(label.to_string());
        let out = self.host.run(program, args, cwd).await;
        pb.finish_and_clear();

        if out.success {
            tracing::info!("{} succeeded", label);
            InstallOutcome::Installed
        } else if out.is_permission_denied() {
            tracing::warn!("{} needs elevated privileges", label);
            InstallOutcome::PermissionDenied(out.failure_summary())
        } else {
            tracing::warn!("{} failed: {}", label, out.failure_summary());
            InstallOutcome::Failed(out.failure_summary())
        }
    }
}

#[async_trait]
impl Remediator for SystemRemediator<'_> {
    async fn apply(&self, step: &Remediation) -> InstallOutcome {
        let pm = self.config.package_manager.as_str();
        match step {
            Remediation::InstallPackageManager { .. } => {
                let package = format!("{}@latest", pm);
                self.run_step(
                    &step.describe(pm),
                    "npm",
                    &["install", "-g", package.as_str()],
                    None,
                )
                .await
            }
            Remediation::InstallLocalPackages(_) => {
                self.run_step(&step.describe(pm), pm, &["install"], Some(&self.project))
                    .await
            }
        }
    }

    fn alternatives(&self, step: &Remediation) -> Vec<Alternative> {
        let pm = self.config.package_manager.as_str();
        let mut options = Vec::new();

        match step {
            Remediation::InstallPackageManager { .. } => {
                if is_on_path("corepack") {
                    options.push(Alternative::new(
                        &format!("Enable {} through corepack (bundled with Node.js)", pm),
                        "corepack",
                        &["enable", pm],
                    ));
                }
                if is_on_path("npm") {
                    let package = format!("{}@latest", pm);
                    let prefix = shellexpand::tilde("~/.local").to_string();
                    options.push(Alternative::new(
                        &format!("Install {} into ~/.local with npm", pm),
                        "npm",
                        &["install", "-g", package.as_str(), "--prefix", prefix.as_str()],
                    ));
                }
                if pm == "pnpm" && is_on_path("curl") {
                    options.push(Alternative::shell(
                        "Use the standalone pnpm install script",
                        "curl -fsSL https://get.pnpm.io/install.sh | sh -",
                    ));
                }
            }
            Remediation::InstallLocalPackages(_) => {
                options.push(Alternative::shell(
                    "Remove node_modules and reinstall as the current user",
                    &format!("rm -rf node_modules && {} install", pm),
                ));
            }
        }

        options
    }

    async fn apply_alternative(&self, alternative: &Alternative) -> InstallOutcome {
        let args: Vec<&str> = alternative.args.iter().map(String::as_str).collect();
        self.run_step(
            &alternative.label,
            &alternative.program,
            &args,
            Some(&self.project),
        )
        .await
    }
}
