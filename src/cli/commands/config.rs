use console::style;

use crate::config::ToolConfig;
use crate::error::Result;

pub async fn show() -> Result<bool> {
    let config_path = ToolConfig::config_path()?;
    let config = ToolConfig::load()?;

    println!("{}", style("Current Configuration").bold().cyan());
    println!();
    println!("  Package manager:   {} (>= {}{})",
        style(&config.package_manager).white(),
        config.min_package_manager_version,
        if config.strict_package_manager { ", strict" } else { "" }
    );
    println!("  Node.js:           >= {}", style(&config.min_runtime_version).white());
    println!("  Service CLI:       {}", style(&config.service_cli).white());
    println!("  Env file:          {}", style(&config.env_file).white());
    println!("  Required packages: {}", style(config.required_packages.join(", ")).white());
    println!("  Test script:       {}", style(&config.test_script).white());
    println!("  Build script:      {}", style(&config.build_script).white());
    println!("  Probe timeout:     {}", style(format!("{}s", config.probe_timeout_secs)).yellow());
    print!("  Template:          ");
    match &config.template_dir {
        Some(d) => println!("{}", style(d).white()),
        None => println!("{}", style("(built-in)").dim()),
    }
    println!();
    if config_path.exists() {
        println!("Config file: {}", style(config_path.display()).dim());
    } else {
        println!(
            "{} {}",
            style("No config file, using defaults.").dim(),
            style(format!("({})", config_path.display())).dim()
        );
    }

    Ok(true)
}

pub async fn set(key: String, value: String) -> Result<bool> {
    let mut config = ToolConfig::load_file()?;

    if !config.set(&key, &value)? {
        println!(
            "{} Unknown config key: {}",
            style("!").yellow().bold(),
            style(&key).red()
        );
        println!("\nAvailable keys:");
        println!("  package_manager, min_runtime_version, min_package_manager_version,");
        println!("  strict_package_manager, service_cli, env_file, required_packages,");
        println!("  test_script, build_script, probe_timeout_secs, template_dir");
        return Ok(false);
    }

    config.save()?;

    println!(
        "{} Set {} = {}",
        style("✓").green().bold(),
        style(&key).cyan(),
        style(&value).white()
    );

    Ok(true)
}
