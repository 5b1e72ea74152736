use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Where recipients are looked up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum DirectorySource {
    /// `users` table in PostgreSQL.
    Postgres { database_url: String },
    /// JSON file of `{ "key", "phone" }` entries.
    File { path: PathBuf },
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Endpoint returning `{ "events": [...] }`
    pub events_url: String,

    /// RaspiSMS scheduled-SMS endpoint
    pub gateway_url: String,

    /// RaspiSMS API key, sent as `X-Api-Key`
    pub gateway_api_key: String,

    /// RaspiSMS phone-line identifier (`id_phone`)
    pub gateway_phone_id: String,

    /// Delivery ledger JSON file
    pub ledger_path: PathBuf,

    /// Polling interval in seconds (default: 120)
    pub poll_interval_secs: u64,

    /// Buffer between submission and the gateway's scheduled send (default: 180)
    pub send_delay_secs: u64,

    /// Upper bound on every outbound HTTP call (default: 10)
    pub http_timeout_secs: u64,

    /// Recipient directory backend
    pub directory: DirectorySource,

    /// Maximum number of PostgreSQL connections in the pool (default: 5)
    pub db_max_connections: u32,

    /// Bind address for the status API; disabled when unset
    pub status_addr: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| lookup(*key).filter(|v| !v.trim().is_empty()))
        };

        let directory = match (get(&["DATABASE_URL"]), get(&["RECIPIENTS_FILE"])) {
            (Some(database_url), _) => DirectorySource::Postgres { database_url },
            (None, Some(path)) => DirectorySource::File {
                path: PathBuf::from(path),
            },
            (None, None) => {
                return Err(anyhow::anyhow!(
                    "either DATABASE_URL or RECIPIENTS_FILE must be set"
                ));
            }
        };

        Ok(Self {
            events_url: get(&["EVENTS_URL", "GCURL"])
                .ok_or_else(|| anyhow::anyhow!("EVENTS_URL environment variable is required"))?,
            gateway_url: get(&["RASPISMS_URL"])
                .unwrap_or_else(|| "http://localhost:8080/api/scheduled/".to_string()),
            gateway_api_key: get(&["RASPISMS_API_KEY", "RASPISMSAPI"]).ok_or_else(|| {
                anyhow::anyhow!("RASPISMS_API_KEY environment variable is required")
            })?,
            gateway_phone_id: get(&["RASPISMS_PHONE_ID", "IDPHONE"]).ok_or_else(|| {
                anyhow::anyhow!("RASPISMS_PHONE_ID environment variable is required")
            })?,
            ledger_path: PathBuf::from(
                get(&["LEDGER_PATH", "LOGPATH"]).unwrap_or_else(|| "sent_sms.json".to_string()),
            ),
            poll_interval_secs: get(&["POLL_INTERVAL_SECS"])
                .unwrap_or_else(|| "120".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("POLL_INTERVAL_SECS must be a valid u64"))?,
            send_delay_secs: get(&["SEND_DELAY_SECS"])
                .unwrap_or_else(|| "180".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SEND_DELAY_SECS must be a valid u64"))?,
            http_timeout_secs: get(&["HTTP_TIMEOUT_SECS"])
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("HTTP_TIMEOUT_SECS must be a valid u64"))?,
            directory,
            db_max_connections: get(&["DB_MAX_CONNECTIONS"])
                .unwrap_or_else(|| "5".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            status_addr: get(&["STATUS_ADDR"]),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_secs(self.send_delay_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}
