use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Postgres URL; the in-memory stores are used when absent.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub server: ServerConfig,
    pub seed_sample_data: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = var("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let db_max_connections = match var("DB_MAX_CONNECTIONS") {
            Some(v) => v.parse::<u32>().context("DB_MAX_CONNECTIONS")?,
            None => 10,
        };
        let server = ServerConfig {
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: match var("APP_PORT") {
                Some(v) => v.parse::<u16>().context("APP_PORT")?,
                None => 8080,
            },
        };
        let seed_sample_data = match var("SEED_SAMPLE_DATA") {
            Some(v) => parse_flag(&v).with_context(|| format!("SEED_SAMPLE_DATA={v}"))?,
            None => true,
        };

        Ok(Self {
            database_url,
            db_max_connections,
            server,
            seed_sample_data,
        })
    }
}

fn parse_flag(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("not a boolean: {other}"),
    }
}
