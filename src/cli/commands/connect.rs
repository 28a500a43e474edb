use std::path::Path;

use crate::config::ToolConfig;
use crate::connectivity::{DatabaseDriver, PgDriver};
use crate::error::Result;
use crate::exec::SystemHost;
use crate::ui::{self, Prompter};
use crate::workflow::connect::{connect, ConnectOptions};
use crate::workflow::Session;

pub async fn execute(
    config: &ToolConfig,
    prompter: &dyn Prompter,
    project: &Path,
    opts: ConnectOptions,
) -> Result<bool> {
    let host = SystemHost;
    let session = Session::new(&host, config, prompter);
    let driver = PgDriver::new(config.probe_timeout());

    let report = connect(&session, project, &opts, Some(&driver as &dyn DatabaseDriver)).await?;
    if report.saved {
        ui::hint("Run `launchkit verify` to check the whole project");
    }
    Ok(true)
}
