//! Local backing-service credentials.
//!
//! The service CLI's `status` output is free-form text with no version marker.
//! [`parse_status_output`] is the only code that knows its shape.

use std::path::Path;

use regex_lite::Regex;

use crate::exec::Host;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCredentials {
    pub api_url: String,
    pub anon_key: String,
    pub database_url: String,
}

/// Extract all three credentials, or nothing.
pub fn parse_status_output(text: &str) -> Option<ServiceCredentials> {
    let api_url = capture(text, r"(?m)API URL:[ \t]*(\S.*)$")?;
    let anon_key = capture(text, r"(?m)anon key:[ \t]*(\S.*)$")?;
    let database_url = capture(text, r"(?m)DB URL:[ \t]*(\S.*)$")?;

    Some(ServiceCredentials {
        api_url,
        anon_key,
        database_url,
    })
}

fn capture(text: &str, pattern: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    let value = re.captures(text)?.get(1)?.as_str().trim().to_string();
    (!value.is_empty()).then_some(value)
}

/// Ask the running local service for its credentials.
///
/// Any failure (CLI missing, service stopped, incomplete output) yields `None`.
pub async fn get_service_credentials(
    host: &dyn Host,
    service_cli: &str,
    project: &Path,
) -> Option<ServiceCredentials> {
    let out = host.run(service_cli, &["status"], Some(project)).await;
    if !out.success {
        tracing::debug!("{} status failed: {}", service_cli, out.failure_summary());
        return None;
    }

    let creds = parse_status_output(&out.stdout);
    if creds.is_none() {
        tracing::warn!("{} status output did not contain all credentials", service_cli);
    }
    creds
}
