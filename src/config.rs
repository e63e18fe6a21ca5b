//! Application configuration loaded from environment variables.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Server Configuration ===
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    // === Firestore Credentials ===
    /// Path to the service-account key file.
    #[serde(default = "default_credentials_path")]
    pub google_application_credentials: String,

    /// Project to talk to. Falls back to the key file's `project_id`.
    #[serde(default)]
    pub firestore_project_id: Option<String>,

    /// Firestore database id.
    #[serde(default = "default_database")]
    pub firestore_database: String,

    /// Collection holding case documents.
    #[serde(default = "default_collection")]
    pub cases_collection: String,

    /// Firestore REST API base URL.
    #[serde(default = "default_base_url")]
    pub firestore_base_url: String,

    /// `host:port` of a Firestore emulator. Skips credential loading when set.
    #[serde(default)]
    pub firestore_emulator_host: Option<String>,

    // === HTTP Client ===
    /// Timeout for a single Firestore request, in milliseconds.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    // === Metrics ===
    /// Expose a Prometheus scrape endpoint.
    #[serde(default)]
    pub metrics_enabled: bool,

    /// Port for the Prometheus scrape endpoint.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

fn default_port() -> u16 {
    5000
}

fn default_credentials_path() -> String {
    "firebase-key.json".to_string()
}

fn default_database() -> String {
    "(default)".to_string()
}

fn default_collection() -> String {
    "cases".to_string()
}

fn default_base_url() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            google_application_credentials: default_credentials_path(),
            firestore_project_id: None,
            firestore_database: default_database(),
            cases_collection: default_collection(),
            firestore_base_url: default_base_url(),
            firestore_emulator_host: None,
            http_timeout_ms: default_http_timeout_ms(),
            metrics_enabled: false,
            metrics_port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("PORT must be non-zero".to_string());
        }

        if self.cases_collection.trim().is_empty() {
            return Err("CASES_COLLECTION must not be empty".to_string());
        }

        if self.cases_collection.contains('/') {
            return Err("CASES_COLLECTION must be a top-level collection id".to_string());
        }

        if self.http_timeout_ms == 0 {
            return Err("HTTP_TIMEOUT_MS must be non-zero".to_string());
        }

        if self.metrics_enabled && self.metrics_port == self.port {
            return Err("METRICS_PORT must differ from PORT".to_string());
        }

        Ok(())
    }

    /// Whether requests go to a local emulator instead of Google Cloud.
    pub fn uses_emulator(&self) -> bool {
        self.firestore_emulator_host.is_some()
    }
}
