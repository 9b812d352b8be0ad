use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub brands_path: PathBuf,
    /// Directory holding `checkpoint.json` and the published mapping.
    pub state_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_concurrent_brands: usize,
    pub validation_workers: usize,
    /// Minimum spacing between two requests to the same host.
    pub host_spacing_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub logo_api_base_url: String,
    pub logo_api_token: Option<String>,
    pub logo_search_url: String,
    pub logo_search_key: Option<String>,
    pub search_base_url: String,
}

impl AppConfig {
    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.state_dir.join("checkpoint.json")
    }

    #[must_use]
    pub fn mapping_path(&self) -> PathBuf {
        self.state_dir.join("logo-mapping.json")
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("brands_path", &self.brands_path)
            .field("state_dir", &self.state_dir)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_concurrent_brands", &self.max_concurrent_brands)
            .field("validation_workers", &self.validation_workers)
            .field("host_spacing_ms", &self.host_spacing_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("logo_api_base_url", &self.logo_api_base_url)
            .field(
                "logo_api_token",
                &self.logo_api_token.as_ref().map(|_| "[redacted]"),
            )
            .field("logo_search_url", &self.logo_search_url)
            .field(
                "logo_search_key",
                &self.logo_search_key.as_ref().map(|_| "[redacted]"),
            )
            .field("search_base_url", &self.search_base_url)
            .finish()
    }
}
