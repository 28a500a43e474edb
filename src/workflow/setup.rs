//! `launchkit create`: scaffold a project and bring it to a runnable state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::credentials::{get_service_credentials, ServiceCredentials};
use crate::envfile::classify::{DATABASE_URL, SITE_URL, SUPABASE_ANON_KEY, SUPABASE_URL};
use crate::envfile::EnvFile;
use crate::error::{LaunchkitError, Result};
use crate::orchestrator::{Orchestrator, Resolution, SystemRemediator};
use crate::probe::PackageManagerCheck;
use crate::template::{self, TemplateSource, TemplateVars};
use crate::ui;
use crate::workflow::requirements::{final_connectivity_check, ConnectivityCheck};
use crate::workflow::{
    Session, LOCAL_API_URL, LOCAL_AUTH_SECTION, LOCAL_DATABASE_SECTION, LOCAL_DATABASE_URL,
    LOCAL_SITE_URL, PRODUCTION_AUTH_SECTION, PRODUCTION_DATABASE_SECTION, PRODUCTION_SITE_SECTION,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatabaseProvider {
    /// Postgres from the local Supabase stack.
    #[default]
    Local,
    Supabase,
    Neon,
    Custom,
}

impl DatabaseProvider {
    pub const ALL: [DatabaseProvider; 4] = [
        DatabaseProvider::Local,
        DatabaseProvider::Supabase,
        DatabaseProvider::Neon,
        DatabaseProvider::Custom,
    ];

    fn label(self) -> &'static str {
        match self {
            DatabaseProvider::Local => "Local Postgres (Supabase in Docker)",
            DatabaseProvider::Supabase => "Supabase (hosted)",
            DatabaseProvider::Neon => "Neon",
            DatabaseProvider::Custom => "Other Postgres (bring your own URL)",
        }
    }
}

impl fmt::Display for DatabaseProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DatabaseProvider::Local => "local",
            DatabaseProvider::Supabase => "supabase",
            DatabaseProvider::Neon => "neon",
            DatabaseProvider::Custom => "custom",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for DatabaseProvider {
    type Err = LaunchkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "self-hosted" => Ok(DatabaseProvider::Local),
            "supabase" => Ok(DatabaseProvider::Supabase),
            "neon" => Ok(DatabaseProvider::Neon),
            "custom" | "postgres" => Ok(DatabaseProvider::Custom),
            other => Err(LaunchkitError::Config(format!(
                "Unknown database provider '{}' (expected local, supabase, neon or custom)",
                other
            ))),
        }
    }
}

/// Which services a new project points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetupConfiguration {
    pub use_production_auth: bool,
    pub database: DatabaseProvider,
    pub use_production_deploy: bool,
}

impl SetupConfiguration {
    pub fn uses_production_database(&self) -> bool {
        self.database != DatabaseProvider::Local
    }

    pub fn needs_local_service(&self) -> bool {
        !self.use_production_auth || !self.uses_production_database()
    }

    fn auth_mode(&self) -> &'static str {
        if self.use_production_auth {
            "production"
        } else {
            "local"
        }
    }

    fn deploy_target(&self) -> &'static str {
        if self.use_production_deploy {
            "vercel"
        } else {
            "none"
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    pub name: String,
    /// Parent directory the project folder is created in.
    pub path: PathBuf,
    pub full: bool,
    pub auth: bool,
    pub database: Option<DatabaseProvider>,
    pub deploy: bool,
    pub fast: bool,
    pub template: Option<PathBuf>,
}

/// Flags win; with no flags at all the user is asked.
pub fn resolve_configuration(opts: &SetupOptions, session: &Session<'_>) -> Result<SetupConfiguration> {
    if opts.full {
        return Ok(SetupConfiguration {
            use_production_auth: true,
            database: opts.database.unwrap_or(DatabaseProvider::Supabase),
            use_production_deploy: true,
        });
    }

    if opts.auth || opts.database.is_some() || opts.deploy || opts.fast {
        return Ok(SetupConfiguration {
            use_production_auth: opts.auth,
            database: opts.database.unwrap_or_default(),
            use_production_deploy: opts.deploy,
        });
    }

    let prompter = session.prompter;
    let use_production_auth = prompter.confirm("Use a hosted Supabase project for auth?", false)?;
    let items: Vec<String> = DatabaseProvider::ALL.iter().map(|p| p.label().to_string()).collect();
    let database = DatabaseProvider::ALL[prompter.select("Database", &items, 0)?.min(items.len() - 1)];
    let use_production_deploy = prompter.confirm("Prepare for deployment to Vercel?", false)?;

    Ok(SetupConfiguration {
        use_production_auth,
        database,
        use_production_deploy,
    })
}

pub fn validate_project_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 214
        && !name.starts_with(['.', '_', '-'])
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(LaunchkitError::Config(format!(
            "Invalid project name '{}': use lowercase letters, digits, '-', '_' or '.'",
            name
        )))
    }
}

#[derive(Debug)]
pub struct SetupSummary {
    pub project_dir: PathBuf,
    pub configuration: SetupConfiguration,
    pub connectivity: Option<ConnectivityCheck>,
}

pub async fn setup_project(session: &Session<'_>, opts: &SetupOptions) -> Result<SetupSummary> {
    validate_project_name(&opts.name)?;
    let setup = resolve_configuration(opts, session)?;
    let target = opts.path.join(&opts.name);
    let config = session.config;

    ui::heading(&format!("Creating {}", opts.name));
    let vars = TemplateVars {
        project_name: opts.name.clone(),
        auth_mode: setup.auth_mode().to_string(),
        database_provider: setup.database.to_string(),
        deploy_target: setup.deploy_target().to_string(),
        package_manager: config.package_manager.clone(),
        package_manager_version: pinnable_package_manager_version(session).await,
    };
    let source = TemplateSource::from_option(opts.template.clone().or_else(|| config.template_path()));
    let files = template::materialize(&source, &target, &vars)?;
    ui::success(format!("Wrote {} files to {}", files.len(), target.display()));

    if setup.needs_local_service() {
        check_local_service_prerequisites(session).await;
    }

    ui::heading("Installing dependencies");
    let probe = session.probe();
    let remediator = SystemRemediator::new(session.host, config, &target);
    let mut orchestrator = Orchestrator::new(&probe, &remediator, session.prompter);
    if let Resolution::Blocked(reasons) = orchestrator.run(&target).await? {
        return Err(LaunchkitError::Blocked(reasons));
    }
    ui::success("Dependencies ready");

    let credentials = if setup.needs_local_service() {
        start_local_service(session, &target).await
    } else {
        None
    };

    ui::heading("Writing environment");
    let env_path = session.env_path(&target);
    reconcile_env(&env_path, &setup, credentials.as_ref())?;
    ui::success(format!("Updated {}", config.env_file));

    init_git(session, &target).await;

    let connectivity = if opts.fast {
        None
    } else {
        Some(final_connectivity_check(session, &target, &setup).await?)
    };

    print_next_steps(session, &opts.name, &setup);
    Ok(SetupSummary {
        project_dir: target,
        configuration: setup,
        connectivity,
    })
}

/// The installed package manager version, if it is a full `x.y.z` that
/// corepack accepts in `packageManager`.
async fn pinnable_package_manager_version(session: &Session<'_>) -> Option<String> {
    match session.probe().check_package_manager().await {
        PackageManagerCheck::Ok(v) if v.is_exact() => Some(v.to_string()),
        _ => None,
    }
}

/// Warn-only: the rest of scaffolding works without the local stack.
async fn check_local_service_prerequisites(session: &Session<'_>) {
    let probe = session.probe();
    let cli = &session.config.service_cli;

    if !probe.check_container_runtime_live().await {
        ui::warn("Docker is not running; the local Supabase stack will not start");
        ui::hint("Start Docker, then run `supabase start` in the project");
    }
    if !probe.check_service_cli_installed().await {
        ui::warn(format!("The {} CLI is not installed", cli));
        ui::hint("Install it from https://supabase.com/docs/guides/cli");
    }
}

/// Initialize and start the local stack when possible, returning its credentials.
async fn start_local_service(session: &Session<'_>, project: &Path) -> Option<ServiceCredentials> {
    let probe = session.probe();
    let cli = session.config.service_cli.as_str();

    if !probe.check_service_cli_installed().await || !probe.check_container_runtime_live().await {
        tracing::info!("Skipping local service start, prerequisites missing");
        return None;
    }

    ui::heading("Starting local services");
    if !project.join("supabase").join("config.toml").exists() {
        let out = session.host.run(cli, &["init"], Some(project)).await;
        if out.success {
            ui::success(format!("{} init", cli));
        } else {
            ui::warn(format!("{} init failed: {}", cli, out.failure_summary()));
            return None;
        }
    }

    if !probe.check_service_running_locally(project).await {
        if !session.host.run_interactive(cli, &["start"], Some(project)).await {
            ui::warn(format!("{} start failed", cli));
            ui::hint(format!("Run `{} start` in {} to see why", cli, project.display()));
            return None;
        }
    }
    ui::success("Local Supabase is running");

    get_service_credentials(session.host, cli, project).await
}

/// Values for one group of related keys, and the section labels that may
/// currently head them in the file.
struct EnvGroup<'a> {
    /// `None` writes the values as plain assignments.
    section: Option<&'static str>,
    stale_labels: &'static [&'static str],
    vars: Vec<(&'static str, &'a str)>,
}

/// Write every recognized key for `setup` in one save.
///
/// Local values fetched from the running stack are written as plain
/// assignments. Anything that still needs user input goes under a labelled
/// section so `connect` can find and replace it later. Running this again with
/// the same inputs leaves the file unchanged.
pub fn reconcile_env(
    path: &Path,
    setup: &SetupConfiguration,
    credentials: Option<&ServiceCredentials>,
) -> Result<Option<PathBuf>> {
    const AUTH_LABELS: &[&str] = &[LOCAL_AUTH_SECTION, PRODUCTION_AUTH_SECTION];
    const DATABASE_LABELS: &[&str] = &[LOCAL_DATABASE_SECTION, PRODUCTION_DATABASE_SECTION];
    const SITE_LABELS: &[&str] = &[PRODUCTION_SITE_SECTION];

    let auth = if setup.use_production_auth {
        EnvGroup {
            section: Some(PRODUCTION_AUTH_SECTION),
            stale_labels: AUTH_LABELS,
            vars: vec![
                (SUPABASE_URL, "your-production-supabase-url"),
                (SUPABASE_ANON_KEY, "your-production-anon-key"),
            ],
        }
    } else if let Some(creds) = credentials {
        EnvGroup {
            section: None,
            stale_labels: AUTH_LABELS,
            vars: vec![
                (SUPABASE_URL, creds.api_url.as_str()),
                (SUPABASE_ANON_KEY, creds.anon_key.as_str()),
            ],
        }
    } else {
        EnvGroup {
            section: Some(LOCAL_AUTH_SECTION),
            stale_labels: AUTH_LABELS,
            vars: vec![(SUPABASE_URL, LOCAL_API_URL), (SUPABASE_ANON_KEY, "your-local-anon-key")],
        }
    };

    let database = if setup.uses_production_database() {
        EnvGroup {
            section: Some(PRODUCTION_DATABASE_SECTION),
            stale_labels: DATABASE_LABELS,
            vars: vec![(DATABASE_URL, "your-production-database-url")],
        }
    } else if let Some(creds) = credentials {
        EnvGroup {
            section: None,
            stale_labels: DATABASE_LABELS,
            vars: vec![(DATABASE_URL, creds.database_url.as_str())],
        }
    } else {
        EnvGroup {
            section: Some(LOCAL_DATABASE_SECTION),
            stale_labels: DATABASE_LABELS,
            vars: vec![(DATABASE_URL, LOCAL_DATABASE_URL)],
        }
    };

    let site = EnvGroup {
        section: setup.use_production_deploy.then_some(PRODUCTION_SITE_SECTION),
        stale_labels: SITE_LABELS,
        vars: vec![(
            SITE_URL,
            if setup.use_production_deploy {
                "https://your-production-domain"
            } else {
                LOCAL_SITE_URL
            },
        )],
    };

    let groups = [auth, database, site];
    let mut env = EnvFile::load(path)?;

    // Plain assignments first, so they never land under a section header.
    for group in groups.iter().filter(|g| g.section.is_none()) {
        for label in group.stale_labels {
            env.remove_section_comment(label);
        }
        env.upsert(&group.vars);
    }
    for group in &groups {
        if let Some(label) = group.section {
            env.replace_section(label, group.stale_labels, &group.vars);
        }
    }

    env.collapse_blank_runs();
    env.save()
}

async fn init_git(session: &Session<'_>, project: &Path) {
    if project.join(".git").exists() {
        return;
    }
    let out = session.host.run("git", &["init"], Some(project)).await;
    if out.success {
        ui::success("Initialized git repository");
    } else if out.not_found {
        ui::warn("git is not installed; skipping repository setup");
    } else {
        ui::warn(format!("git init failed: {}", out.failure_summary()));
    }
}

fn print_next_steps(session: &Session<'_>, name: &str, setup: &SetupConfiguration) {
    ui::heading("Next steps");
    ui::hint(format!("cd {}", name));
    if setup.use_production_auth {
        ui::hint("launchkit connect --auth");
    }
    if setup.uses_production_database() {
        ui::hint("launchkit connect --database");
    }
    ui::hint(session.script_command("dev"));
}
