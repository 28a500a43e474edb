use std::path::Path;

use crate::config::ToolConfig;
use crate::connectivity::{DatabaseDriver, PgDriver};
use crate::error::Result;
use crate::exec::SystemHost;
use crate::ui::DefaultsPrompter;
use crate::workflow::verify::verify;
use crate::workflow::Session;

pub async fn execute(config: &ToolConfig, project: &Path, skip_build: bool) -> Result<bool> {
    let host = SystemHost;
    let session = Session::new(&host, config, &DefaultsPrompter);
    let driver = PgDriver::new(config.probe_timeout());

    let report = verify(&session, project, Some(&driver as &dyn DatabaseDriver), skip_build).await?;
    Ok(report.passed())
}
