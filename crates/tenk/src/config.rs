//! Configuration loading and validation.
//!
//! Settings come from a TOML file with a few environment overrides:
//!
//! - `TENK_USER_AGENT` - identifying User-Agent sent to the registry
//! - `TENK_DATABASE` - SQLite database path
//! - `TENK_CONCURRENCY` - filings processed concurrently per company
//!
//! # Example
//!
//! ```toml
//! user_agent = "Example Research research@example.com"
//! database = "tenk.db"
//!
//! [[companies]]
//! ticker = "AAPL"
//! name = "Apple Inc."
//! cik = "0000320193"
//! sector = "Technology"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt};

use tenk_core::{Cik, Company, Error, Result, Ticker};
use tenk_edgar::{DEFAULT_FILINGS_PER_COMPANY, RetryPolicy};

use crate::pipeline::MAX_CONCURRENCY;

/// Environment variable overriding [`Config::user_agent`].
pub const ENV_USER_AGENT: &str = "TENK_USER_AGENT";
/// Environment variable overriding [`Config::database`].
pub const ENV_DATABASE: &str = "TENK_DATABASE";
/// Environment variable overriding [`Config::concurrency`].
pub const ENV_CONCURRENCY: &str = "TENK_CONCURRENCY";

/// Logging configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `tenk=debug`.
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoggingConfig {
    /// Initialize the tracing subscriber. `RUST_LOG` takes precedence over `level`.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

/// Retry settings for registry requests.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,
    /// Delay after the first failure, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: u64::try_from(policy.initial_backoff.as_millis()).unwrap_or(500),
            max_backoff_ms: u64::try_from(policy.max_backoff.as_millis()).unwrap_or(5_000),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }
}

/// A tracked company.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct CompanyConfig {
    /// Exchange ticker.
    pub ticker: String,
    /// Registered company name.
    pub name: String,
    /// Central Index Key, with or without leading zeros.
    pub cik: String,
    /// Optional sector.
    #[serde(default)]
    pub sector: Option<String>,
    /// Optional industry.
    #[serde(default)]
    pub industry: Option<String>,
}

impl CompanyConfig {
    fn to_company(&self) -> Result<Company> {
        let ticker = Ticker::new(&self.ticker)?;
        let cik: Cik = self.cik.parse().map_err(|e| {
            Error::Config(format!("Invalid CIK for {}: {e}", self.ticker))
        })?;

        let mut company = Company::new(ticker, self.name.trim(), cik);
        if let Some(sector) = &self.sector {
            company = company.with_sector(sector);
        }
        if let Some(industry) = &self.industry {
            company = company.with_industry(industry);
        }
        Ok(company)
    }
}

fn default_database() -> PathBuf {
    PathBuf::from("tenk.db")
}

const fn default_concurrency() -> usize {
    1
}

const fn default_requests_per_second() -> u32 {
    10
}

const fn default_filings_per_company() -> usize {
    DEFAULT_FILINGS_PER_COMPANY
}

/// Application configuration.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Identifying User-Agent, e.g. `"Name contact@example.com"`.
    #[serde(default)]
    pub user_agent: String,

    /// SQLite database path.
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Filings processed concurrently per company (1-4).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Registry request budget.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Most recent 10-K filings ingested per company.
    #[serde(default = "default_filings_per_company")]
    pub filings_per_company: usize,

    /// Retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Tracked companies.
    #[serde(default)]
    pub companies: Vec<CompanyConfig>,
}

impl Config {
    /// Load configuration from a TOML file, apply environment overrides and validate.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the file cannot be read or parsed, or if
    /// validation fails.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::parse_toml(&content, |key| std::env::var(key).ok())
    }

    /// Parse configuration from TOML, reading overrides through `env`.
    ///
    /// # Errors
    /// Returns [`Error::Config`] on invalid TOML, overrides or settings.
    pub fn parse_toml<F>(content: &str, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))?;
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `TENK_CONCURRENCY` is not a number.
    pub fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(user_agent) = env(ENV_USER_AGENT) {
            self.user_agent = user_agent;
        }
        if let Some(database) = env(ENV_DATABASE) {
            self.database = PathBuf::from(database);
        }
        if let Some(concurrency) = env(ENV_CONCURRENCY) {
            self.concurrency = concurrency.trim().parse().map_err(|_| {
                Error::Config(format!("{ENV_CONCURRENCY} must be a number, got {concurrency:?}"))
            })?;
        }
        Ok(())
    }

    /// Validate settings.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.user_agent.trim().is_empty() {
            return Err(Error::Config(format!(
                "user_agent is required (or set {ENV_USER_AGENT})"
            )));
        }
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(Error::Config(format!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            )));
        }
        if self.requests_per_second == 0 {
            return Err(Error::Config(
                "requests_per_second must be positive".to_string(),
            ));
        }
        if self.filings_per_company == 0 {
            return Err(Error::Config(
                "filings_per_company must be positive".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "retry.max_attempts must be positive".to_string(),
            ));
        }
        if self.companies.is_empty() {
            return Err(Error::Config("no companies configured".to_string()));
        }
        self.companies()?;
        Ok(())
    }

    /// The configured companies as domain values.
    ///
    /// # Errors
    /// Returns an error for an invalid ticker or CIK.
    pub fn companies(&self) -> Result<Vec<Company>> {
        self.companies.iter().map(CompanyConfig::to_company).collect()
    }

    /// The configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }

    /// Initialize logging.
    pub fn init_logging(&self) {
        self.logging.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const MINIMAL: &str = r#"
user_agent = "Example Research research@example.com"

[[companies]]
ticker = "aapl"
name = "Apple Inc."
cik = "0000320193"
sector = "Technology"
"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::parse_toml(MINIMAL, no_env).unwrap();

        assert_eq!(config.database, PathBuf::from("tenk.db"));
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.requests_per_second, 10);
        assert_eq!(config.filings_per_company, 3);
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_companies() {
        let config = Config::parse_toml(MINIMAL, no_env).unwrap();
        let companies = config.companies().unwrap();

        assert_eq!(companies.len(), 1);
        assert_eq!(companies[0].ticker.as_str(), "AAPL");
        assert_eq!(companies[0].cik, Cik::new(320_193));
        assert_eq!(companies[0].sector.as_deref(), Some("Technology"));
        assert_eq!(companies[0].industry, None);
    }

    #[test]
    fn test_full_config() {
        let content = r#"
user_agent = "Example Research research@example.com"
database = "/var/lib/tenk/filings.db"
concurrency = 3
requests_per_second = 5
filings_per_company = 5

[retry]
max_attempts = 4
initial_backoff_ms = 250

[logging]
level = "tenk=debug"
format = "json"

[[companies]]
ticker = "MSFT"
name = "Microsoft Corp"
cik = "789019"

[[companies]]
ticker = "JPM"
name = "JPMorgan Chase & Co."
cik = "19617"
industry = "Banks"
"#;
        let config = Config::parse_toml(content, no_env).unwrap();

        assert_eq!(config.concurrency, 3);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.max_backoff_ms, 5_000);
        assert_eq!(config.retry_policy().initial_backoff, Duration::from_millis(250));
        assert_eq!(config.companies().unwrap().len(), 2);
    }

    #[test]
    fn test_env_overrides() {
        let env = env_from(&[
            (ENV_USER_AGENT, "Override ops@example.com"),
            (ENV_DATABASE, "/tmp/other.db"),
            (ENV_CONCURRENCY, "4"),
        ]);
        let config = Config::parse_toml(MINIMAL, env).unwrap();

        assert_eq!(config.user_agent, "Override ops@example.com");
        assert_eq!(config.database, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.concurrency, 4);
    }

    #[test]
    fn test_env_supplies_missing_user_agent() {
        let content = MINIMAL.replace("user_agent = \"Example Research research@example.com\"", "");
        assert!(Config::parse_toml(&content, no_env).is_err());

        let env = env_from(&[(ENV_USER_AGENT, "Env Agent env@example.com")]);
        assert!(Config::parse_toml(&content, env).is_ok());
    }

    #[test]
    fn test_invalid_concurrency() {
        let env = env_from(&[(ENV_CONCURRENCY, "8")]);
        let err = Config::parse_toml(MINIMAL, env).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let env = env_from(&[(ENV_CONCURRENCY, "many")]);
        assert!(Config::parse_toml(MINIMAL, env).is_err());
    }

    #[test]
    fn test_rejects_bad_settings() {
        let cases = [
            "user_agent = \"a b\"\n",
            "user_agent = \"a b\"\nrequests_per_second = 0\n[[companies]]\nticker = \"A\"\nname = \"A\"\ncik = \"1\"\n",
            "user_agent = \"a b\"\n[[companies]]\nticker = \"A\"\nname = \"A\"\ncik = \"not-a-cik\"\n",
            "user_agent = \"a b\"\n[[companies]]\nticker = \"\"\nname = \"A\"\ncik = \"1\"\n",
            "not toml at all = = =",
        ];
        for content in cases {
            assert!(Config::parse_toml(content, no_env).is_err(), "{content}");
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/tenk.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/tenk.toml"));
    }
}
