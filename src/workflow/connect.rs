//! `launchkit connect`: point a project at production services, or back at the
//! local stack.
//!
//! Values are probed before anything is written. All accepted changes land in
//! a single save, so one run produces exactly one backup.

use std::path::{Path, PathBuf};

use crate::connectivity::{probe_auth_service, probe_database, DatabaseDriver, ProbeOutcome};
use crate::credentials::get_service_credentials;
use crate::envfile::classify::{DATABASE_URL, SUPABASE_ANON_KEY, SUPABASE_URL};
use crate::envfile::EnvFile;
use crate::error::{LaunchkitError, Result};
use crate::ui;
use crate::workflow::{
    Session, LOCAL_AUTH_SECTION, LOCAL_DATABASE_SECTION, PRODUCTION_AUTH_SECTION,
    PRODUCTION_DATABASE_SECTION,
};

#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub auth: bool,
    pub database: bool,
    /// Supabase project URL.
    pub url: Option<String>,
    /// Supabase anon key.
    pub key: Option<String>,
    pub database_url: Option<String>,
    /// Switch back to the local stack instead of production.
    pub local: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectReport {
    pub auth: Option<ProbeOutcome>,
    pub database: Option<ProbeOutcome>,
    pub saved: bool,
    pub backup: Option<PathBuf>,
}

/// One env change waiting for the single save at the end.
struct PendingSection {
    stale_labels: [&'static str; 2],
    label: &'static str,
    values: Vec<(&'static str, String)>,
}

impl PendingSection {
    fn apply(&self, env: &mut EnvFile) {
        let values: Vec<(&str, &str)> = self
            .values
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        env.replace_section(self.label, &self.stale_labels, &values);
    }
}

pub async fn connect(
    session: &Session<'_>,
    project: &Path,
    opts: &ConnectOptions,
    driver: Option<&dyn DatabaseDriver>,
) -> Result<ConnectReport> {
    let (auth, database) = resolve_targets(session, opts)?;
    let mut report = ConnectReport::default();
    let mut pending = Vec::new();

    if opts.local {
        ui::heading("Switching to the local stack");
        let creds = get_service_credentials(session.host, &session.config.service_cli, project)
            .await
            .ok_or_else(|| {
                LaunchkitError::command(
                    &session.config.service_cli,
                    "local stack is not running or returned incomplete credentials; run `supabase start` first",
                )
            })?;

        if auth {
            pending.push(auth_section(LOCAL_AUTH_SECTION, creds.api_url, creds.anon_key));
            report.auth = Some(ProbeOutcome::Verified);
        }
        if database {
            pending.push(database_section(LOCAL_DATABASE_SECTION, creds.database_url));
            report.database = Some(ProbeOutcome::Verified);
        }
    } else {
        if auth {
            ui::heading("Production auth");
            let url = value_or_prompt(session, opts.url.as_deref(), "Supabase project URL")?;
            let key = value_or_prompt(session, opts.key.as_deref(), "Supabase anon key")?;

            let outcome = probe_auth_service(&url, &key, session.config.probe_timeout()).await;
            if accept(session, "auth service", &outcome)? {
                pending.push(auth_section(PRODUCTION_AUTH_SECTION, url, key));
            }
            report.auth = Some(outcome);
        }

        if database {
            ui::heading("Production database");
            let url = value_or_prompt(session, opts.database_url.as_deref(), "Database URL")?;

            let outcome = probe_database(&url, driver).await;
            if accept(session, "database", &outcome)? {
                pending.push(database_section(PRODUCTION_DATABASE_SECTION, url));
            }
            report.database = Some(outcome);
        }
    }

    if pending.is_empty() {
        ui::warn("Nothing changed");
        return Ok(report);
    }

    let mut env = EnvFile::load(session.env_path(project))?;
    for section in &pending {
        section.apply(&mut env);
    }

    report.backup = env.save()?;
    report.saved = true;
    ui::success(format!("Updated {}", env.path().display()));
    if let Some(backup) = &report.backup {
        ui::hint(format!("Previous version saved to {}", backup.display()));
    }
    Ok(report)
}

fn resolve_targets(session: &Session<'_>, opts: &ConnectOptions) -> Result<(bool, bool)> {
    if opts.auth || opts.database {
        return Ok((opts.auth, opts.database));
    }
    if opts.local {
        return Ok((true, true));
    }

    let items = vec![
        "Auth (Supabase)".to_string(),
        "Database".to_string(),
        "Both".to_string(),
    ];
    Ok(match session.prompter.select("What do you want to connect?", &items, 2)? {
        0 => (true, false),
        1 => (false, true),
        _ => (true, true),
    })
}

fn value_or_prompt(session: &Session<'_>, given: Option<&str>, prompt: &str) -> Result<String> {
    let value = match given {
        Some(v) => v.to_string(),
        None => session.prompter.input(prompt, None)?,
    };
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(LaunchkitError::Config(format!("{} cannot be empty", prompt)));
    }
    Ok(value)
}

/// Report a probe result and decide whether its values get written.
fn accept(session: &Session<'_>, what: &str, outcome: &ProbeOutcome) -> Result<bool> {
    match outcome {
        ProbeOutcome::Verified => {
            ui::success(format!("Connected to the {}", what));
            Ok(true)
        }
        ProbeOutcome::Assumed => {
            ui::warn(format!("The {} URL looks valid but could not be tested from here", what));
            Ok(true)
        }
        ProbeOutcome::Failed(msg) => {
            ui::fail(format!("Could not reach the {}: {}", what, msg));
            session.prompter.confirm("Save these values anyway?", false)
        }
    }
}

fn auth_section(label: &'static str, url: String, key: String) -> PendingSection {
    PendingSection {
        stale_labels: [LOCAL_AUTH_SECTION, PRODUCTION_AUTH_SECTION],
        label,
        values: vec![(SUPABASE_URL, url), (SUPABASE_ANON_KEY, key)],
    }
}

fn database_section(label: &'static str, url: String) -> PendingSection {
    PendingSection {
        stale_labels: [LOCAL_DATABASE_SECTION, PRODUCTION_DATABASE_SECTION],
        label,
        values: vec![(DATABASE_URL, url)],
    }
}
