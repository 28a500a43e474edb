use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchkitError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Env file {}: {message}", .path.display())]
    EnvFile { path: PathBuf, message: String },

    #[error("Command `{program}` failed: {message}")]
    Command { program: String, message: String },

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Cannot scaffold into {}: {message}", .path.display())]
    Scaffold { path: PathBuf, message: String },

    /// The environment cannot be brought to a runnable state without manual action.
    #[error("Setup blocked:\n  {}", .0.join("\n  "))]
    Blocked(Vec<String>),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Dialog error: {0}")]
    Dialog(#[from] dialoguer::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LaunchkitError {
    pub fn env_file(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::EnvFile {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn command(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            program: program.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LaunchkitError>;
