use std::{net::SocketAddr, path::PathBuf};

use crate::error::{bad_config, AppResult};

const DEFAULT_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_STATIC_DIR: &str = "static";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub addr:       SocketAddr,
    pub static_dir: PathBuf,
}

impl Config {
    /// Reads `ARCADE_ADDR` / `ARCADE_STATIC_DIR`; call after `dotenvy`.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let addr = get("ARCADE_ADDR").unwrap_or_else(|| DEFAULT_ADDR.into());
        let addr = addr
            .parse()
            .map_err(|e| bad_config(format!("ARCADE_ADDR {addr:?}: {e}")))?;
        let static_dir = get("ARCADE_STATIC_DIR")
            .unwrap_or_else(|| DEFAULT_STATIC_DIR.into())
            .into();
        Ok(Self { addr, static_dir })
    }
}
