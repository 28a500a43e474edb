//! `launchkit status`: read-only report of the project's environment.

use std::fmt;
use std::path::Path;

use console::style;

use crate::envfile::classify::{is_local_url, DATABASE_URL, RECOGNIZED_KEYS, SUPABASE_URL};
use crate::envfile::{EnvFile, ValueState};
use crate::error::Result;
use crate::probe::{PackageManagerCheck, RuntimeCheck};
use crate::ui;
use crate::workflow::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode {
    Local,
    Production,
    Unconfigured,
}

impl ServiceMode {
    fn detect(env: &EnvFile, key: &str) -> Self {
        match (env.state_of(key), env.get(key)) {
            (ValueState::Configured, Some(value)) if is_local_url(value) => ServiceMode::Local,
            (ValueState::Configured, _) => ServiceMode::Production,
            _ => ServiceMode::Unconfigured,
        }
    }
}

impl fmt::Display for ServiceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceMode::Local => write!(f, "local"),
            ServiceMode::Production => write!(f, "production"),
            ServiceMode::Unconfigured => write!(f, "not configured"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub runtime: RuntimeCheck,
    pub package_manager: PackageManagerCheck,
    pub container_runtime_live: bool,
    pub service_cli_installed: bool,
    pub service_running: bool,
    pub env_file_exists: bool,
    pub variables: Vec<(&'static str, ValueState)>,
    pub auth_mode: ServiceMode,
    pub database_mode: ServiceMode,
}

pub async fn gather_status(session: &Session<'_>, project: &Path) -> Result<StatusReport> {
    let probe = session.probe();
    let env_path = session.env_path(project);
    let env = EnvFile::load(&env_path)?;

    Ok(StatusReport {
        runtime: probe.check_runtime_version().await,
        package_manager: probe.check_package_manager().await,
        container_runtime_live: probe.check_container_runtime_live().await,
        service_cli_installed: probe.check_service_cli_installed().await,
        service_running: probe.check_service_running_locally(project).await,
        env_file_exists: env_path.is_file(),
        variables: RECOGNIZED_KEYS.iter().map(|&k| (k, env.state_of(k))).collect(),
        auth_mode: ServiceMode::detect(&env, SUPABASE_URL),
        database_mode: ServiceMode::detect(&env, DATABASE_URL),
    })
}

pub fn print_status(session: &Session<'_>, report: &StatusReport) {
    let config = session.config;

    ui::heading("Tools");
    match &report.runtime.version {
        Some(v) if report.runtime.satisfied => ui::success(format!("Node.js {}", v)),
        Some(v) => ui::fail(format!("Node.js {} (need {}+)", v, config.min_runtime_version)),
        None => ui::fail("Node.js not found"),
    }
    let pm = &config.package_manager;
    match &report.package_manager {
        PackageManagerCheck::Ok(v) => ui::success(format!("{} {}", pm, v)),
        PackageManagerCheck::Outdated(v) => ui::warn(format!(
            "{} {} (recommended {}+)",
            pm, v, config.min_package_manager_version
        )),
        PackageManagerCheck::Unknown(detail) => {
            ui::warn(format!("{} (unknown version: {})", pm, detail))
        }
        PackageManagerCheck::NotFound => ui::fail(format!("{} not found", pm)),
    }
    flag(report.container_runtime_live, "Docker running", "Docker not running");
    flag(
        report.service_cli_installed,
        &format!("{} CLI installed", config.service_cli),
        &format!("{} CLI not installed", config.service_cli),
    );

    ui::heading("Services");
    flag(
        report.service_running,
        "Local Supabase running",
        "Local Supabase stopped",
    );
    println!(
        "  {} auth: {}   database: {}",
        style("•").dim(),
        style(report.auth_mode).bold(),
        style(report.database_mode).bold()
    );

    ui::heading(&format!("Environment ({})", config.env_file));
    if !report.env_file_exists {
        ui::fail(format!("{} does not exist", config.env_file));
        ui::hint("Run `launchkit connect` or copy .env.example");
        return;
    }
    for (key, state) in &report.variables {
        match state {
            ValueState::Configured => ui::success(key),
            ValueState::Placeholder => ui::warn(format!("{} (placeholder)", key)),
            ValueState::Missing => ui::fail(format!("{} (missing)", key)),
        }
    }
}

fn flag(ok: bool, yes: &str, no: &str) {
    if ok {
        ui::success(yes);
    } else {
        ui::warn(no);
    }
}
