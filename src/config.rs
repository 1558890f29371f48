use anyhow::Context;
use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_DATABASE_URL: &str = "sqlite://pathfinder.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub static_dir: Option<PathBuf>,
}

impl Config {
    /// Reads `PATHFINDER_*` variables. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url =
            lookup("PATHFINDER_DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let bind_addr = lookup("PATHFINDER_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("PATHFINDER_BIND_ADDR is not a socket address")?;

        let max_connections = match lookup("PATHFINDER_MAX_CONNECTIONS") {
            Some(v) => v
                .parse::<u32>()
                .context("PATHFINDER_MAX_CONNECTIONS is not a number")?
                .max(1),
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let static_dir = lookup("PATHFINDER_STATIC_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
            static_dir,
        })
    }
}
