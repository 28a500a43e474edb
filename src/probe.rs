//! Read-only environment checks.
//!
//! Nothing in here returns an error: a check that cannot determine its answer
//! reports the conservative "not satisfied" result instead.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::ToolConfig;
use crate::exec::Host;

/// A dotted numeric version. Missing trailing components compare as zero.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    #[cfg(test)]
    pub fn new(parts: Vec<u64>) -> Self {
        Self { parts }
    }

    /// Parse `20.11.1`, `v20.11.1` or `9.1.0-beta.2` (pre-release suffix ignored).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_prefix('v').unwrap_or(s);
        let core = s.split(['-', '+', ' ']).next()?;
        if core.is_empty() {
            return None;
        }

        let parts = core
            .split('.')
            .map(|p| p.parse::<u64>().ok())
            .collect::<Option<Vec<_>>>()?;
        Some(Self { parts })
    }

    fn component(&self, i: usize) -> u64 {
        self.parts.get(i).copied().unwrap_or(0)
    }

    /// Exactly `major.minor.patch`.
    pub fn is_exact(&self) -> bool {
        self.parts.len() == 3
    }

    pub fn satisfies(&self, minimum: &Version) -> bool {
        self >= minimum
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            match self.component(i).cmp(&other.component(i)) {
                Ordering::Equal => continue,
                decided => return decided,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.parts.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// True when `actual` is at least `minimum`, component-wise.
/// Unparsable input never satisfies.
pub fn compare_versions(actual: &str, minimum: &str) -> bool {
    match (Version::parse(actual), Version::parse(minimum)) {
        (Some(a), Some(m)) => a.satisfies(&m),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeCheck {
    pub satisfied: bool,
    pub version: Option<Version>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PackageManagerCheck {
    NotFound,
    Outdated(Version),
    Ok(Version),
    /// Present, but it failed or printed something that is not a version.
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// A throwaway directory (temp dir, package-runner cache) with dependencies
    /// resolved by whatever launched us.
    Ephemeral,
    /// A real project checkout with its own manifest.
    Checkout,
}

impl ExecutionContext {
    pub fn classify(dir: &Path) -> Self {
        let text = dir.to_string_lossy();
        let in_cache = ["/_npx/", "/.pnpm-store/", "/dlx-", "/.npm/_cacache"]
            .iter()
            .any(|marker| text.contains(marker));
        if in_cache || dir.starts_with(std::env::temp_dir().join("_npx")) {
            return Self::Ephemeral;
        }

        if dir.join("package.json").is_file() {
            Self::Checkout
        } else {
            Self::Ephemeral
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalPackagesCheck {
    pub context: ExecutionContext,
    pub missing: BTreeSet<String>,
}

impl LocalPackagesCheck {
    pub fn satisfied(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Runs prerequisite checks against a [`Host`].
pub struct EnvironmentProbe<'a> {
    host: &'a dyn Host,
    config: &'a ToolConfig,
}

impl<'a> EnvironmentProbe<'a> {
    pub fn new(host: &'a dyn Host, config: &'a ToolConfig) -> Self {
        Self { host, config }
    }

    pub fn config(&self) -> &ToolConfig {
        self.config
    }

    pub async fn check_runtime_version(&self) -> RuntimeCheck {
        let out = self.host.run("node", &["--version"], None).await;
        let version = if out.success {
            Version::parse(&out.stdout)
        } else {
            None
        };

        let satisfied =
            out.success && compare_versions(&out.stdout, &self.config.min_runtime_version);

        tracing::debug!(
            "Runtime check: version={:?} satisfied={}",
            version.as_ref().map(|v| v.to_string()),
            satisfied
        );
        RuntimeCheck { satisfied, version }
    }

    pub async fn check_package_manager(&self) -> PackageManagerCheck {
        let pm = &self.config.package_manager;
        let out = self.host.run(pm, &["--version"], None).await;

        let first_line = out.stdout.lines().next().unwrap_or_default();
        let result = if out.not_found {
            PackageManagerCheck::NotFound
        } else if !out.success {
            PackageManagerCheck::Unknown(out.failure_summary())
        } else {
            match Version::parse(first_line) {
                Some(v)
                    if compare_versions(first_line, &self.config.min_package_manager_version) =>
                {
                    PackageManagerCheck::Ok(v)
                }
                Some(v) => PackageManagerCheck::Outdated(v),
                None => PackageManagerCheck::Unknown(format!(
                    "unexpected output '{}'",
                    first_line.trim()
                )),
            }
        };

        tracing::debug!("Package manager check ({}): {:?}", pm, result);
        result
    }

    pub async fn check_container_runtime_live(&self) -> bool {
        let live = self.host.container_runtime_live().await;
        tracing::debug!("Container runtime live: {}", live);
        live
    }

    pub async fn check_service_cli_installed(&self) -> bool {
        self.host
            .run(&self.config.service_cli, &["--version"], None)
            .await
            .success
    }

    pub async fn check_service_running_locally(&self, project: &Path) -> bool {
        self.host
            .run(&self.config.service_cli, &["status"], Some(project))
            .await
            .success
    }

    pub fn check_local_packages_installed(
        &self,
        project: &Path,
        required: &[String],
    ) -> LocalPackagesCheck {
        let context = ExecutionContext::classify(project);
        if context == ExecutionContext::Ephemeral {
            tracing::debug!(
                "Skipping local package check in ephemeral context {}",
                project.display()
            );
            return LocalPackagesCheck {
                context,
                missing: BTreeSet::new(),
            };
        }

        let modules = project.join("node_modules");
        let missing = required
            .iter()
            .filter(|name| !package_dir(&modules, name).is_dir())
            .cloned()
            .collect();

        LocalPackagesCheck { context, missing }
    }
}

/// `node_modules/@scope/name` for scoped names, `node_modules/name` otherwise.
fn package_dir(modules: &Path, name: &str) -> PathBuf {
    name.split('/').fold(modules.to_path_buf(), |p, seg| p.join(seg))
}
