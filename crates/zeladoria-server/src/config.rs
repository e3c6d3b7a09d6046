use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use zeladoria_api::social::DEFAULT_GRAPH_URL;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub admin_email: String,
    pub admin_password: Option<String>,
    pub facebook_graph_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("ZELADORIA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("ZELADORIA_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let host = var("ZELADORIA_HOST", "0.0.0.0");
        let port: u16 = var("ZELADORIA_PORT", "8000")
            .parse()
            .context("ZELADORIA_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

        Ok(Self {
            jwt_secret,
            db_path: var("ZELADORIA_DB_PATH", "zeladoria.db").into(),
            addr,
            admin_email: var("ZELADORIA_ADMIN_EMAIL", "admin@zeladoria.local"),
            admin_password: get("ZELADORIA_ADMIN_PASSWORD").filter(|p| !p.is_empty()),
            facebook_graph_url: var("ZELADORIA_FACEBOOK_GRAPH_URL", DEFAULT_GRAPH_URL),
        })
    }
}
