//! Dependency remediation.
//!
//! ```text
//! Probing ──ok──────────────────────────────────────────► Satisfied
//!    │
//!    ├─runtime too old / nothing installable───────────► Blocked
//!    ▼
//! AwaitingUserConsent ──declined───────────────────────► Blocked
//!    │
//!    ▼
//! Installing (sequential, stops at first failure)
//!    │
//!    ▼
//! Reprobing ──ok──► Satisfied
//!    └──still failing──► Blocked
//! ```
//!
//! Decisions are pure functions over a [`DependencyCheckResult`] snapshot; the
//! side effects sit behind [`Remediator`] and [`Prompter`].

pub mod remediation;

use std::collections::BTreeSet;
use std::path::Path;

use console::style;

use crate::error::Result;
use crate::probe::{EnvironmentProbe, PackageManagerCheck, Version};
use crate::ui::{self, Prompter};

pub use remediation::{Alternative, InstallOutcome, Remediation, Remediator, SystemRemediator};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageManagerStatus {
    pub needs_install: bool,
    pub needs_upgrade: bool,
    pub current_version: Option<Version>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalPackagesStatus {
    pub needs_install: bool,
    pub missing: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Installable {
    pub package_manager: PackageManagerStatus,
    pub local_packages: LocalPackagesStatus,
}

/// One probe pass. Recomputed, never mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyCheckResult {
    pub overall_success: bool,
    pub runtime_satisfied: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub installable: Installable,
}

pub async fn check_dependencies(probe: &EnvironmentProbe<'_>, project: &Path) -> DependencyCheckResult {
    let config = probe.config();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut installable = Installable::default();

    let runtime = probe.check_runtime_version().await;
    if !runtime.satisfied {
        errors.push(match &runtime.version {
            Some(v) => format!(
                "Node.js {} is installed but {} or newer is required",
                v, config.min_runtime_version
            ),
            None => format!(
                "Node.js is not installed (version {} or newer is required)",
                config.min_runtime_version
            ),
        });
    }

    let pm = &config.package_manager;
    match probe.check_package_manager().await {
        PackageManagerCheck::NotFound => {
            errors.push(format!("{} is not installed", pm));
            installable.package_manager.needs_install = true;
        }
        PackageManagerCheck::Outdated(v) => {
            let msg = format!(
                "{} {} is older than the recommended {}",
                pm, v, config.min_package_manager_version
            );
            if config.strict_package_manager {
                errors.push(msg);
            } else {
                warnings.push(msg);
            }
            installable.package_manager.needs_upgrade = true;
            installable.package_manager.current_version = Some(v);
        }
        PackageManagerCheck::Ok(v) => {
            installable.package_manager.current_version = Some(v);
        }
        PackageManagerCheck::Unknown(detail) => {
            warnings.push(format!(
                "Could not determine the installed {} version: {}",
                pm, detail
            ));
        }
    }

    let packages = probe.check_local_packages_installed(project, &config.required_packages);
    if !packages.satisfied() {
        let names: Vec<&str> = packages.missing.iter().map(String::as_str).collect();
        errors.push(format!("Missing project packages: {}", names.join(", ")));
        installable.local_packages.needs_install = true;
        installable.local_packages.missing = packages.missing;
    }

    DependencyCheckResult {
        overall_success: errors.is_empty(),
        runtime_satisfied: runtime.satisfied,
        errors,
        warnings,
        installable,
    }
}

/// Ordered fixes for a result: package manager always before local packages.
pub fn plan(result: &DependencyCheckResult, strict_package_manager: bool) -> Vec<Remediation> {
    let mut steps = Vec::new();
    let pm = &result.installable.package_manager;
    if pm.needs_install {
        steps.push(Remediation::InstallPackageManager { upgrade: false });
    } else if pm.needs_upgrade && strict_package_manager {
        steps.push(Remediation::InstallPackageManager { upgrade: true });
    }

    let local = &result.installable.local_packages;
    if local.needs_install {
        steps.push(Remediation::InstallLocalPackages(
            local.missing.iter().cloned().collect(),
        ));
    }
    steps
}

#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Probing,
    AwaitingUserConsent(Vec<Remediation>),
    Installing(Vec<Remediation>),
    Reprobing,
    Satisfied,
    Blocked(Vec<String>),
}

/// Where a fresh probe result leads.
pub fn after_probe(result: &DependencyCheckResult, strict_package_manager: bool) -> State {
    if result.overall_success {
        return State::Satisfied;
    }
    if !result.runtime_satisfied {
        let mut reasons = result.errors.clone();
        reasons.push("Install a newer Node.js from https://nodejs.org or with nvm: nvm install --lts".to_string());
        return State::Blocked(reasons);
    }

    let steps = plan(result, strict_package_manager);
    if steps.is_empty() {
        State::Blocked(result.errors.clone())
    } else {
        State::AwaitingUserConsent(steps)
    }
}

/// Where a re-probe after installing leads.
pub fn after_reprobe(result: &DependencyCheckResult) -> State {
    if result.overall_success {
        State::Satisfied
    } else {
        State::Blocked(result.errors.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Satisfied,
    Blocked(Vec<String>),
}

pub struct Orchestrator<'a> {
    probe: &'a EnvironmentProbe<'a>,
    remediator: &'a dyn Remediator,
    prompter: &'a dyn Prompter,
    trace: Vec<State>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        probe: &'a EnvironmentProbe<'a>,
        remediator: &'a dyn Remediator,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            probe,
            remediator,
            prompter,
            trace: Vec::new(),
        }
    }

    /// Every state visited by the last [`run`](Self::run).
    pub fn trace(&self) -> &[State] {
        &self.trace
    }

    fn enter(&mut self, state: State) -> State {
        tracing::debug!("Orchestrator -> {:?}", state);
        self.trace.push(state.clone());
        state
    }

    pub async fn run(&mut self, project: &Path) -> Result<Resolution> {
        self.trace.clear();
        let strict = self.probe.config().strict_package_manager;
        let pm = self.probe.config().package_manager.clone();

        let mut state = self.enter(State::Probing);
        loop {
            state = match state {
                State::Probing => {
                    let result = check_dependencies(self.probe, project).await;
                    for warning in &result.warnings {
                        ui::warn(warning);
                    }
                    self.enter(after_probe(&result, strict))
                }
                State::AwaitingUserConsent(steps) => {
                    println!();
                    println!("  {}", style("Some dependencies are missing:").yellow().bold());
                    for step in &steps {
                        println!("    {} {}", style("•").dim(), step.describe(&pm));
                    }
                    if self.prompter.confirm("Install them now?", true)? {
                        self.enter(State::Installing(steps))
                    } else {
                        let reasons = steps
                            .iter()
                            .map(|s| format!("{} (declined)", s.describe(&pm)))
                            .collect();
                        self.enter(State::Blocked(reasons))
                    }
                }
                State::Installing(steps) => {
                    self.install_sequentially(&steps, &pm).await?;
                    self.enter(State::Reprobing)
                }
                State::Reprobing => {
                    let result = check_dependencies(self.probe, project).await;
                    self.enter(after_reprobe(&result))
                }
                State::Satisfied => return Ok(Resolution::Satisfied),
                State::Blocked(reasons) => return Ok(Resolution::Blocked(reasons)),
            };
        }
    }

    /// Apply steps in order, stopping at the first one that does not succeed.
    async fn install_sequentially(&self, steps: &[Remediation], pm: &str) -> Result<()> {
        for step in steps {
            match self.remediator.apply(step).await {
                InstallOutcome::Installed => ui::success(step.describe(pm)),
                InstallOutcome::PermissionDenied(detail) => {
                    ui::fail(format!("{}: permission denied", step.describe(pm)));
                    tracing::debug!("Permission denied detail: {}", detail);
                    self.offer_alternatives(step).await?;
                    return Ok(());
                }
                InstallOutcome::Failed(msg) => {
                    ui::fail(format!("{}: {}", step.describe(pm), msg));
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    async fn offer_alternatives(&self, step: &Remediation) -> Result<()> {
        let alternatives = self.remediator.alternatives(step);
        let mut items: Vec<String> = alternatives.iter().map(|a| a.label.clone()).collect();
        items.push("Skip, I'll install it myself".to_string());

        let choice = self.prompter.select(
            "This needs elevated privileges. Pick another way to install",
            &items,
            items.len() - 1,
        )?;

        match alternatives.get(choice) {
            Some(alt) => match self.remediator.apply_alternative(alt).await {
                InstallOutcome::Installed => ui::success(&alt.label),
                InstallOutcome::PermissionDenied(msg) | InstallOutcome::Failed(msg) => {
                    ui::fail(format!("{}: {}", alt.label, msg))
                }
            },
            None => ui::hint("Install it manually, then re-run this command"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolConfig;
    use crate::exec::fake::FakeHost;
    use crate::exec::CommandOutput;
    use crate::ui::fake::ScriptedPrompter;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct RecordingRemediator {
        project: PathBuf,
        outcomes: Mutex<Vec<InstallOutcome>>,
        applied: Mutex<Vec<Remediation>>,
        alternatives_run: Mutex<Vec<String>>,
    }

    impl RecordingRemediator {
        fn new(project: &Path, outcomes: Vec<InstallOutcome>) -> Self {
            Self {
                project: project.to_path_buf(),
                outcomes: Mutex::new(outcomes),
                applied: Mutex::new(Vec::new()),
                alternatives_run: Mutex::new(Vec::new()),
            }
        }

        fn applied(&self) -> Vec<Remediation> {
            self.applied.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Remediator for RecordingRemediator {
        async fn apply(&self, step: &Remediation) -> InstallOutcome {
            self.applied.lock().unwrap().push(step.clone());
            let outcome = self.outcomes.lock().unwrap().remove(0);
            if let (Remediation::InstallLocalPackages(names), InstallOutcome::Installed) =
                (step, &outcome)
            {
                for name in names {
                    std::fs::create_dir_all(self.project.join("node_modules").join(name)).unwrap();
                }
            }
            outcome
        }

        fn alternatives(&self, _step: &Remediation) -> Vec<Alternative> {
            vec![Alternative {
                label: "corepack".to_string(),
                program: "corepack".to_string(),
                args: vec!["enable".to_string(), "pnpm".to_string()],
            }]
        }

        async fn apply_alternative(&self, alternative: &Alternative) -> InstallOutcome {
            self.alternatives_run
                .lock()
                .unwrap()
                .push(alternative.label.clone());
            InstallOutcome::Installed
        }
    }

    fn config() -> ToolConfig {
        ToolConfig {
            required_packages: vec!["next".to_string(), "pg".to_string()],
            ..Default::default()
        }
    }

    fn project_with_manifest() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_all_satisfied_goes_straight_to_satisfied() {
        let config = config();
        let dir = project_with_manifest();
        std::fs::create_dir_all(dir.path().join("node_modules/next")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pg")).unwrap();
        let host = FakeHost::new()
            .on("node --version", CommandOutput::ok("v20.11.1"))
            .on("pnpm --version", CommandOutput::ok("9.0.0"));
        let probe = EnvironmentProbe::new(&host, &config);
        let remediator = RecordingRemediator::new(dir.path(), vec![]);
        let prompter = ScriptedPrompter::new();

        let mut orch = Orchestrator::new(&probe, &remediator, &prompter);
        let resolution = orch.run(dir.path()).await.unwrap();

        assert_eq!(resolution, Resolution::Satisfied);
        assert_eq!(orch.trace(), &[State::Probing, State::Satisfied]);
        assert!(prompter.asked().is_empty());
    }

    #[tokio::test]
    async fn test_package_manager_installed_before_local_packages() {
        let config = config();
        let dir = project_with_manifest();
        let host = FakeHost::new()
            .on("node --version", CommandOutput::ok("v22.3.0"))
            .on("pnpm --version", CommandOutput::missing())
            .on("pnpm --version", CommandOutput::ok("9.4.0"));
        let probe = EnvironmentProbe::new(&host, &config);
        let remediator = RecordingRemediator::new(
            dir.path(),
            vec![InstallOutcome::Installed, InstallOutcome::Installed],
        );
        let prompter = ScriptedPrompter::new().confirm_with(true);

        let mut orch = Orchestrator::new(&probe, &remediator, &prompter);
        let resolution = orch.run(dir.path()).await.unwrap();

        assert_eq!(resolution, Resolution::Satisfied);
        assert_eq!(
            remediator.applied(),
            vec![
                Remediation::InstallPackageManager { upgrade: false },
                Remediation::InstallLocalPackages(vec!["next".to_string(), "pg".to_string()]),
            ]
        );
        assert!(matches!(orch.trace().last(), Some(State::Satisfied)));
    }

    #[tokio::test]
    async fn test_permission_denied_stops_before_local_packages() {
        let config = config();
        let dir = project_with_manifest();
        let host = FakeHost::new()
            .on("node --version", CommandOutput::ok("v20.0.0"))
            .on("pnpm --version", CommandOutput::missing());
        let probe = EnvironmentProbe::new(&host, &config);
        let remediator = RecordingRemediator::new(
            dir.path(),
            vec![InstallOutcome::PermissionDenied("EACCES".to_string())],
        );
        // accept install, then choose "skip" (index 1, after the single alternative)
        let prompter = ScriptedPrompter::new().confirm_with(true).select_with(1);

        let mut orch = Orchestrator::new(&probe, &remediator, &prompter);
        let resolution = orch.run(dir.path()).await.unwrap();

        assert_eq!(
            remediator.applied(),
            vec![Remediation::InstallPackageManager { upgrade: false }]
        );
        assert!(remediator.alternatives_run.lock().unwrap().is_empty());
        assert!(matches!(resolution, Resolution::Blocked(ref errs) if errs.iter().any(|e| e.contains("pnpm is not installed"))));
    }

    #[tokio::test]
    async fn test_permission_denied_runs_chosen_alternative_then_rechecks() {
        let config = config();
        let dir = project_with_manifest();
        let host = FakeHost::new()
            .on("node --version", CommandOutput::ok("v20.0.0"))
            .on("pnpm --version", CommandOutput::missing())
            .on("pnpm --version", CommandOutput::ok("9.0.0"));
        let probe = EnvironmentProbe::new(&host, &config);
        let remediator = RecordingRemediator::new(
            dir.path(),
            vec![InstallOutcome::PermissionDenied("EACCES".to_string())],
        );
        let prompter = ScriptedPrompter::new().confirm_with(true).select_with(0);

        let mut orch = Orchestrator::new(&probe, &remediator, &prompter);
        let resolution = orch.run(dir.path()).await.unwrap();

        assert_eq!(*remediator.alternatives_run.lock().unwrap(), vec!["corepack"]);
        assert_eq!(remediator.applied().len(), 1);
        // pnpm is now present but the local packages step never ran
        assert!(matches!(resolution, Resolution::Blocked(ref errs) if errs.iter().any(|e| e.contains("Missing project packages"))));
        assert_eq!(orch.trace()[orch.trace().len() - 2], State::Reprobing);
    }

    #[tokio::test]
    async fn test_declining_consent_blocks() {
        let config = config();
        let dir = project_with_manifest();
        let host = FakeHost::new()
            .on("node --version", CommandOutput::ok("v20.0.0"))
            .on("pnpm --version", CommandOutput::ok("9.0.0"));
        let probe = EnvironmentProbe::new(&host, &config);
        let remediator = RecordingRemediator::new(dir.path(), vec![]);
        let prompter = ScriptedPrompter::new().confirm_with(false);

        let mut orch = Orchestrator::new(&probe, &remediator, &prompter);
        let resolution = orch.run(dir.path()).await.unwrap();

        assert!(matches!(resolution, Resolution::Blocked(_)));
        assert!(remediator.applied().is_empty());
    }

    #[tokio::test]
    async fn test_old_runtime_blocks_without_asking() {
        let config = config();
        let dir = project_with_manifest();
        let host = FakeHost::new()
            .on("node --version", CommandOutput::ok("v18.19.0"))
            .on("pnpm --version", CommandOutput::missing());
        let probe = EnvironmentProbe::new(&host, &config);
        let remediator = RecordingRemediator::new(dir.path(), vec![]);
        let prompter = ScriptedPrompter::new();

        let mut orch = Orchestrator::new(&probe, &remediator, &prompter);
        let resolution = orch.run(dir.path()).await.unwrap();

        match resolution {
            Resolution::Blocked(errs) => {
                assert!(errs[0].contains("Node.js 18.19.0"));
                assert!(errs.iter().any(|e| e.contains("nvm install")));
            }
            other => panic!("expected Blocked, got {:?}", other),
        }
        assert!(prompter.asked().is_empty());
        assert!(remediator.applied().is_empty());
    }

    #[test]
    fn test_outdated_package_manager_is_soft_unless_strict() {
        let result = DependencyCheckResult {
            overall_success: true,
            runtime_satisfied: true,
            warnings: vec!["pnpm 7.0.0 is older than the recommended 8.0.0".to_string()],
            installable: Installable {
                package_manager: PackageManagerStatus {
                    needs_upgrade: true,
                    current_version: Version::parse("7.0.0"),
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(after_probe(&result, false), State::Satisfied);
        assert!(plan(&result, false).is_empty());
        assert_eq!(
            plan(&result, true),
            vec![Remediation::InstallPackageManager { upgrade: true }]
        );
    }
}
