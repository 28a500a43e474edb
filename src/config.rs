use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LaunchkitError, Result};
use crate::probe::Version;

/// Tool-wide settings. Every field has a default so the CLI works without a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub package_manager: String,
    pub min_runtime_version: String,
    pub min_package_manager_version: String,
    /// Treat an outdated package manager as an error instead of a warning.
    pub strict_package_manager: bool,
    pub service_cli: String,
    pub env_file: String,
    pub required_packages: Vec<String>,
    pub test_script: String,
    pub build_script: String,
    pub probe_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            package_manager: "pnpm".to_string(),
            min_runtime_version: "20.0.0".to_string(),
            min_package_manager_version: "8.0.0".to_string(),
            strict_package_manager: false,
            service_cli: "supabase".to_string(),
            env_file: ".env.local".to_string(),
            required_packages: vec![
                "next".to_string(),
                "@supabase/supabase-js".to_string(),
                "@supabase/ssr".to_string(),
                "pg".to_string(),
            ],
            test_script: "test:connections".to_string(),
            build_script: "build".to_string(),
            probe_timeout_secs: 5,
            template_dir: None,
        }
    }
}

impl ToolConfig {
    pub fn config_dir() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| {
            LaunchkitError::Config("Could not determine the user config directory".to_string())
        })?;
        Ok(base.join("launchkit"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.yaml"))
    }

    /// Load from the user config file (if any), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// The config file alone, as `config set` should rewrite it.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_path()?;

        let config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_yaml::from_str(&content)
                .map_err(|e| LaunchkitError::Config(format!("Invalid config: {}", e)))?
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Self::default()
        };
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(pm) = std::env::var("LAUNCHKIT_PACKAGE_MANAGER") {
            if !pm.trim().is_empty() {
                self.package_manager = pm.trim().to_string();
            }
        }
        if let Ok(dir) = std::env::var("LAUNCHKIT_TEMPLATE_DIR") {
            if !dir.trim().is_empty() {
                self.template_dir = Some(dir.trim().to_string());
            }
        }
        if let Ok(cli) = std::env::var("LAUNCHKIT_SERVICE_CLI") {
            if !cli.trim().is_empty() {
                self.service_cli = cli.trim().to_string();
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if Version::parse(&self.min_runtime_version).is_none() {
            return Err(LaunchkitError::Config(format!(
                "Invalid min_runtime_version '{}'. Use a dotted version like '20.0.0'",
                self.min_runtime_version
            )));
        }
        if Version::parse(&self.min_package_manager_version).is_none() {
            return Err(LaunchkitError::Config(format!(
                "Invalid min_package_manager_version '{}'. Use a dotted version like '8.0.0'",
                self.min_package_manager_version
            )));
        }
        if self.probe_timeout_secs == 0 {
            return Err(LaunchkitError::Config(
                "probe_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.package_manager.trim().is_empty() {
            return Err(LaunchkitError::Config(
                "package_manager cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn template_path(&self) -> Option<PathBuf> {
        self.template_dir
            .as_deref()
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).as_ref()))
    }

    /// Apply a `config set` pair. Returns false for an unknown key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "package_manager" | "package-manager" => self.package_manager = value.to_string(),
            "min_runtime_version" | "min-runtime-version" => {
                self.min_runtime_version = value.to_string()
            }
            "min_package_manager_version" | "min-package-manager-version" => {
                self.min_package_manager_version = value.to_string()
            }
            "strict_package_manager" | "strict-package-manager" => {
                self.strict_package_manager = value == "true" || value == "yes"
            }
            "service_cli" | "service-cli" => self.service_cli = value.to_string(),
            "env_file" | "env-file" => self.env_file = value.to_string(),
            "required_packages" | "required-packages" => {
                self.required_packages = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }
            "test_script" | "test-script" => self.test_script = value.to_string(),
            "build_script" | "build-script" => self.build_script = value.to_string(),
            "probe_timeout_secs" | "probe-timeout" => {
                self.probe_timeout_secs = value.parse().map_err(|_| {
                    LaunchkitError::Config(format!("Invalid probe timeout '{}'", value))
                })?
            }
            "template_dir" | "template-dir" => self.template_dir = Some(value.to_string()),
            _ => return Ok(false),
        }
        self.validate()?;
        Ok(true)
    }
}
