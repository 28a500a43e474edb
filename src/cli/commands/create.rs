use console::style;

use crate::config::ToolConfig;
use crate::error::Result;
use crate::exec::SystemHost;
use crate::ui::Prompter;
use crate::workflow::requirements::ConnectivityCheck;
use crate::workflow::setup::{setup_project, SetupOptions};
use crate::workflow::Session;

pub async fn execute(config: &ToolConfig, prompter: &dyn Prompter, opts: SetupOptions) -> Result<bool> {
    let host = SystemHost;
    let session = Session::new(&host, config, prompter);

    let summary = setup_project(&session, &opts).await?;

    println!();
    println!(
        "{} {} is ready at {}",
        style("✓").green().bold(),
        style(&opts.name).cyan().bold(),
        style(summary.project_dir.display()).dim()
    );
    if summary.connectivity == Some(ConnectivityCheck::Failed) {
        println!(
            "  {}",
            style("Some connections still fail. Fix the items above, then run `launchkit verify`.").yellow()
        );
    }
    Ok(true)
}
