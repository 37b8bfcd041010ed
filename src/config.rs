use anyhow::Result;
use dotenvy::dotenv;
use std::collections::HashMap;
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    /// API key -> verifier identity.
    pub verifier_keys: HashMap<String, String>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub summary_cache_ttl_secs: u64,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            verifier_keys: parse_verifier_keys(&env::var("VERIFIER_API_KEYS").unwrap_or_default())?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|raw| parse_origins(&raw))
                .filter(|origins| !origins.is_empty()),
            summary_cache_ttl_secs: env::var("SUMMARY_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .parse()?,
        })
    }

    pub fn summary_cache_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.summary_cache_ttl_secs)
    }
}

/// Parses `name:key,name:key` into a key -> name map.
///
/// An empty value yields an empty map; only `serve` requires verifiers, and
/// startup validation enforces that.
pub fn parse_verifier_keys(raw: &str) -> anyhow::Result<HashMap<String, String>> {
    let mut keys = HashMap::new();

    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let Some((name, key)) = entry.split_once(':') else {
            anyhow::bail!("VERIFIER_API_KEYS entry '{}' must look like name:key", entry);
        };
        let (name, key) = (name.trim(), key.trim());
        if name.is_empty() || key.is_empty() {
            anyhow::bail!("VERIFIER_API_KEYS entry '{}' has an empty name or key", entry);
        }
        if keys.insert(key.to_string(), name.to_string()).is_some() {
            anyhow::bail!("VERIFIER_API_KEYS assigns the same key to more than one verifier");
        }
    }

    Ok(keys)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
