//! `launchkit verify`: every check in one pass, then the production build.

use std::path::Path;

use crate::connectivity::{probe_auth_service, probe_database, DatabaseDriver, ProbeOutcome};
use crate::envfile::classify::{effective_value, DATABASE_URL, RECOGNIZED_KEYS, SUPABASE_ANON_KEY, SUPABASE_URL};
use crate::envfile::{classify_configured_value, Category, EnvFile, ValueState};
use crate::error::Result;
use crate::orchestrator::check_dependencies;
use crate::ui;
use crate::workflow::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub detail: Option<String>,
}

impl Check {
    fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: None,
        }
    }

    fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub checks: Vec<Check>,
    /// `None` when the build was skipped.
    pub build: Option<bool>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed) && self.build != Some(false)
    }

    fn record(&mut self, check: Check) {
        if check.passed {
            ui::success(&check.name);
        } else {
            ui::fail(format!(
                "{}: {}",
                check.name,
                check.detail.as_deref().unwrap_or("failed")
            ));
        }
        self.checks.push(check);
    }
}

pub async fn verify(
    session: &Session<'_>,
    project: &Path,
    driver: Option<&dyn DatabaseDriver>,
    skip_build: bool,
) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();
    let probe = session.probe();

    ui::heading("Dependencies");
    let deps = check_dependencies(&probe, project).await;
    for warning in &deps.warnings {
        ui::warn(warning);
    }
    if deps.errors.is_empty() {
        report.record(Check::pass("Node.js, package manager and project packages"));
    }
    for error in &deps.errors {
        report.record(Check::fail("Dependencies", error.clone()));
    }

    ui::heading("Environment");
    let env = EnvFile::load(session.env_path(project))?;
    for &key in RECOGNIZED_KEYS {
        match env.state_of(key) {
            ValueState::Configured => report.record(Check::pass(key)),
            ValueState::Placeholder => report.record(Check::fail(key, "still a placeholder")),
            ValueState::Missing => report.record(Check::fail(
                key,
                format!("not set in {}", session.config.env_file),
            )),
        }
    }

    ui::heading("Connections");
    match env
        .get(DATABASE_URL)
        .filter(|v| classify_configured_value(v, Category::Database))
        .map(effective_value)
    {
        Some(url) => {
            let outcome = probe_database(url, driver).await;
            report.record(outcome_check("Database connection", &outcome));
        }
        None => ui::hint("Skipping database connection, DATABASE_URL is not configured"),
    }

    let configured_auth = |key: &str| {
        env.get(key)
            .filter(|v| classify_configured_value(v, Category::Auth))
            .map(effective_value)
    };
    match (configured_auth(SUPABASE_URL), configured_auth(SUPABASE_ANON_KEY)) {
        (Some(url), Some(key)) => {
            let outcome = probe_auth_service(url, key, session.config.probe_timeout()).await;
            report.record(outcome_check("Auth service", &outcome));
        }
        _ => ui::hint("Skipping auth connection, Supabase URL or key is not configured"),
    }

    if skip_build {
        ui::hint("Build skipped");
    } else if report.passed() {
        ui::heading("Build");
        let script = session.config.build_script.as_str();
        let ok = session
            .host
            .run_interactive(&session.config.package_manager, &["run", script], Some(project))
            .await;
        if ok {
            ui::success(session.script_command(script));
        } else {
            ui::fail(format!("{} failed", session.script_command(script)));
        }
        report.build = Some(ok);
    } else {
        ui::hint("Build not attempted until the checks above pass");
    }

    println!();
    if report.passed() {
        ui::success("Everything checks out");
    } else {
        let failed = report.checks.iter().filter(|c| !c.passed).count();
        ui::fail(format!("{} check(s) failed", failed + usize::from(report.build == Some(false))));
    }
    Ok(report)
}

fn outcome_check(name: &str, outcome: &ProbeOutcome) -> Check {
    match outcome {
        ProbeOutcome::Verified => Check::pass(name),
        ProbeOutcome::Assumed => Check {
            name: name.to_string(),
            passed: true,
            detail: Some(outcome.to_string()),
        },
        ProbeOutcome::Failed(msg) => Check::fail(name, msg.clone()),
    }
}
