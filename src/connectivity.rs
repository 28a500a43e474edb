//! Live trial connections to the database and the auth service.
//!
//! Probes never return errors. Each reduces to an outcome plus an optional
//! message and is bounded by a timeout.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

pub const DATABASE_SCHEMES: &[&str] = &["postgresql://", "postgres://"];

/// Path probed on the auth service base URL.
pub const AUTH_PROBE_PATH: &str = "/rest/v1/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// A live round trip succeeded.
    Verified,
    /// The value is well-formed but no live check could be made.
    Assumed,
    Failed(String),
}

impl ProbeOutcome {
    pub fn is_ok(&self) -> bool {
        !matches!(self, ProbeOutcome::Failed(_))
    }

    #[cfg(test)]
    pub fn message(&self) -> Option<&str> {
        match self {
            ProbeOutcome::Failed(msg) => Some(msg),
            _ => None,
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Verified => write!(f, "connected"),
            ProbeOutcome::Assumed => write!(f, "format valid (not tested live)"),
            ProbeOutcome::Failed(msg) => write!(f, "failed: {}", msg),
        }
    }
}

/// Something that can open a live database connection.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    async fn ping(&self, url: &str) -> std::result::Result<(), String>;
}

/// An explicitly owned Postgres connection pool of size one.
pub struct PgHandle {
    pool: PgPool,
}

impl PgHandle {
    pub async fn connect(url: &str, timeout: Duration) -> std::result::Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(timeout)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn round_trip(&self) -> std::result::Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// [`DatabaseDriver`] backed by sqlx.
#[derive(Debug, Clone)]
pub struct PgDriver {
    timeout: Duration,
}

impl PgDriver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl DatabaseDriver for PgDriver {
    async fn ping(&self, url: &str) -> std::result::Result<(), String> {
        let attempt = async {
            let handle = PgHandle::connect(url, self.timeout).await?;
            let result = handle.round_trip().await;
            handle.close().await;
            result
        };

        // sqlx's acquire timeout does not cover DNS or TLS stalls on every platform.
        match tokio::time::timeout(self.timeout + Duration::from_secs(1), attempt).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {:?}", self.timeout)),
        }
    }
}

pub fn has_database_scheme(url: &str) -> bool {
    let url = url.trim();
    DATABASE_SCHEMES.iter().any(|scheme| url.starts_with(scheme))
}

/// Check a database URL. Without a driver, a well-formed URL is reported as
/// [`ProbeOutcome::Assumed`].
pub async fn probe_database(url: &str, driver: Option<&dyn DatabaseDriver>) -> ProbeOutcome {
    if !has_database_scheme(url) {
        return ProbeOutcome::Failed(
            "Invalid database URL: must start with postgresql:// or postgres://".to_string(),
        );
    }

    let Some(driver) = driver else {
        tracing::debug!("No database driver available, accepting URL on format alone");
        return ProbeOutcome::Assumed;
    };

    match driver.ping(url.trim()).await {
        Ok(()) => ProbeOutcome::Verified,
        Err(e) => {
            tracing::debug!("Database probe failed: {}", e);
            ProbeOutcome::Failed(e)
        }
    }
}

/// GET the auth service's REST root with the anon key. Any 2xx is success.
pub async fn probe_auth_service(url: &str, key: &str, timeout: Duration) -> ProbeOutcome {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(c) => c,
        Err(e) => return ProbeOutcome::Failed(e.to_string()),
    };

    let endpoint = format!("{}{}", url.trim().trim_end_matches('/'), AUTH_PROBE_PATH);
    let response = client
        .get(&endpoint)
        .header("apikey", key)
        .header("Authorization", format!("Bearer {}", key))
        .send()
        .await;

    match response {
        Ok(resp) if resp.status().is_success() => ProbeOutcome::Verified,
        Ok(resp) => ProbeOutcome::Failed(format!("HTTP {}", resp.status())),
        Err(e) => {
            tracing::debug!("Auth probe request to {} failed: {}", endpoint, e);
            ProbeOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct CountingDriver {
        calls: AtomicUsize,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl DatabaseDriver for CountingDriver {
        async fn ping(&self, _url: &str) -> std::result::Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(msg) => Err(msg.clone()),
                None => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn test_database_check_fails_fast_on_bad_scheme() {
        let driver = CountingDriver::default();
        let outcome = probe_database("mysql://u:p@h/d", Some(&driver as &dyn DatabaseDriver)).await;
        assert!(!outcome.is_ok());
        assert_eq!(driver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_database_check_without_driver_is_assumed() {
        let outcome = probe_database("postgres://u:p@h:5432/d", None).await;
        assert_eq!(outcome, ProbeOutcome::Assumed);
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn test_database_check_uses_driver() {
        let driver = CountingDriver::default();
        let outcome = probe_database("postgresql://u:p@h:5432/d", Some(&driver as &dyn DatabaseDriver)).await;
        assert_eq!(outcome, ProbeOutcome::Verified);
        assert_eq!(driver.calls.load(Ordering::SeqCst), 1);

        let driver = CountingDriver {
            fail_with: Some("connection refused".to_string()),
            ..Default::default()
        };
        let outcome = probe_database("postgresql://u:p@h:5432/d", Some(&driver as &dyn DatabaseDriver)).await;
        assert_eq!(outcome.message(), Some("connection refused"));
    }

    #[tokio::test]
    async fn test_pg_driver_unreachable_host_fails_within_timeout() {
        let driver = PgDriver::new(Duration::from_millis(300));
        let started = std::time::Instant::now();
        let outcome =
            probe_database("postgresql://u:p@127.0.0.1:1/d", Some(&driver as &dyn DatabaseDriver)).await;
        assert!(!outcome.is_ok());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_auth_check_200_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/"))
            .and(header("apikey", "anon-key"))
            .and(header("Authorization", "Bearer anon-key"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let outcome = probe_auth_service(&server.uri(), "anon-key", Duration::from_secs(5)).await;
        assert_eq!(outcome, ProbeOutcome::Verified);
    }

    #[tokio::test]
    async fn test_auth_check_401_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let outcome = probe_auth_service(&server.uri(), "bad-key", Duration::from_secs(5)).await;
        assert!(!outcome.is_ok());
        assert!(outcome.message().unwrap().contains("401"));
    }

    #[tokio::test]
    async fn test_auth_check_network_error_is_failure() {
        let outcome =
            probe_auth_service("http://127.0.0.1:1", "anon-key", Duration::from_secs(2)).await;
        assert!(!outcome.is_ok());
    }

    #[tokio::test]
    async fn test_auth_check_trims_trailing_slash() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/", server.uri());
        assert!(probe_auth_service(&url, "k", Duration::from_secs(5)).await.is_ok());
    }
}
