pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ToolConfig;
use crate::error::Result;
use crate::ui::{DefaultsPrompter, Prompter, TerminalPrompter};
use crate::workflow::setup::DatabaseProvider;

#[derive(Parser)]
#[command(name = "launchkit")]
#[command(version)]
#[command(about = "Scaffold a pre-wired Next.js + Supabase app")]
#[command(long_about = "Scaffold a pre-wired Next.js + Supabase app, then keep its local and production services in sync.\n\nEvery check is safe to re-run. Env file changes are always backed up first.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new project
    Create {
        /// Project name (also the directory name)
        name: String,

        /// Production auth, hosted database and deployment in one go
        #[arg(long)]
        full: bool,

        /// Use a hosted Supabase project for auth
        #[arg(long)]
        auth: bool,

        /// Database provider: local, supabase, neon or custom
        #[arg(long, value_parser = parse_provider)]
        database: Option<DatabaseProvider>,

        /// Prepare for deployment to Vercel
        #[arg(long)]
        deploy: bool,

        /// Accept every default and skip the connection check
        #[arg(long)]
        fast: bool,

        /// Directory to create the project in
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Template directory to use instead of the built-in starter
        #[arg(long)]
        template: Option<PathBuf>,
    },

    /// Connect a project to production services (or back to the local stack)
    Connect {
        /// Connect auth (Supabase URL and anon key)
        #[arg(long)]
        auth: bool,

        /// Connect the database
        #[arg(long)]
        database: bool,

        /// Supabase project URL
        #[arg(long)]
        url: Option<String>,

        /// Supabase anon key
        #[arg(long)]
        key: Option<String>,

        /// Postgres connection string
        #[arg(long)]
        database_url: Option<String>,

        /// Use credentials from the running local stack instead
        #[arg(long)]
        local: bool,

        /// Project directory
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },

    /// Show tools, services and env file state
    Status {
        /// Project directory
        #[arg(long, default_value = ".")]
        path: PathBuf,
    },

    /// Run every check and the production build; exits non-zero on failure
    Verify {
        /// Project directory
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Skip the build step
        #[arg(long)]
        skip_build: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },
}

fn parse_provider(s: &str) -> std::result::Result<DatabaseProvider, String> {
    s.parse().map_err(|e: crate::error::LaunchkitError| e.to_string())
}

/// Interactive prompts on a terminal, defaults everywhere else.
fn prompter(fast: bool) -> Box<dyn Prompter> {
    if fast || !console::user_attended() {
        Box::new(DefaultsPrompter)
    } else {
        Box::new(TerminalPrompter)
    }
}

impl Cli {
    /// Returns whether the command succeeded; failures have already been reported.
    pub async fn execute(self) -> Result<bool> {
        match self.command {
            Commands::Create {
                name,
                full,
                auth,
                database,
                deploy,
                fast,
                path,
                template,
            } => {
                let config = ToolConfig::load()?;
                let opts = crate::workflow::setup::SetupOptions {
                    name,
                    path,
                    full,
                    auth,
                    database,
                    deploy,
                    fast,
                    template,
                };
                let prompter = prompter(fast);
                commands::create::execute(&config, prompter.as_ref(), opts).await
            }
            Commands::Connect {
                auth,
                database,
                url,
                key,
                database_url,
                local,
                path,
            } => {
                let config = ToolConfig::load()?;
                let opts = crate::workflow::connect::ConnectOptions {
                    auth,
                    database,
                    url,
                    key,
                    database_url,
                    local,
                };
                let prompter = prompter(false);
                commands::connect::execute(&config, prompter.as_ref(), &path, opts).await
            }
            Commands::Status { path } => {
                let config = ToolConfig::load()?;
                commands::status::execute(&config, &path).await
            }
            Commands::Verify { path, skip_build } => {
                let config = ToolConfig::load()?;
                commands::verify::execute(&config, &path, skip_build).await
            }
            Commands::Config { command } => match command {
                ConfigCommands::Show => commands::config::show().await,
                ConfigCommands::Set { key, value } => commands::config::set(key, value).await,
            },
        }
    }
}
