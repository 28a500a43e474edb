use std::path::Path;

use console::style;

use crate::config::ToolConfig;
use crate::error::Result;
use crate::exec::SystemHost;
use crate::ui::DefaultsPrompter;
use crate::workflow::status::{gather_status, print_status};
use crate::workflow::Session;

pub async fn execute(config: &ToolConfig, project: &Path) -> Result<bool> {
    let host = SystemHost;
    let session = Session::new(&host, config, &DefaultsPrompter);

    println!(
        "{} {}",
        style("launchkit status").bold().cyan(),
        style(project.display()).dim()
    );
    let report = gather_status(&session, project).await?;
    print_status(&session, &report);
    Ok(true)
}
