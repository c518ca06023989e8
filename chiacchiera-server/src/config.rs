use std::{env, fmt::Display, fs::read_to_string, net::SocketAddr, str::FromStr};

use anyhow::{anyhow, Context};
use chiacchiera_client::CookieOptions;
use tracing::info;

/// Configurazione del server, letta dall'ambiente all'avvio.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub pocketbase_url: String,
    pub admin_email: String,
    pub admin_password: String,
    pub cookie: CookieOptions,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            bind_addr: try_load("BIND_ADDR", "127.0.0.1:3000")?,
            pocketbase_url: try_load("POCKETBASE_URL", "http://127.0.0.1:8090")?,
            admin_email: read_secret("POCKETBASE_PRIVATE_EMAIL")?,
            admin_password: read_secret("POCKETBASE_PRIVATE_PASSWORD")?,
            cookie: CookieOptions {
                secure: try_load("COOKIE_SECURE", "true")?,
                http_only: try_load("COOKIE_HTTP_ONLY", "true")?,
                ..CookieOptions::default()
            },
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}"))
}

// Credenziali: prima l'ambiente, poi il secret montato in /run/secrets
fn read_secret(name: &str) -> anyhow::Result<String> {
    if let Ok(value) = env::var(name) {
        return Ok(value);
    }

    let path = format!("/run/secrets/{name}");
    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .with_context(|| format!("{name} is not set and {path} is not readable"))
}
