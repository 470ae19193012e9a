//! Process settings read from the environment (and `.env`, when present).

use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "demos/classicmodels";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const SEED_FILE: &str = "seed.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// PostgreSQL URL. `None` serves from the in-memory store.
    pub database_url: Option<String>,
    /// Directory holding `resources.json`.
    pub config_path: PathBuf,
    /// Rows for the in-memory store.
    pub seed_path: PathBuf,
    pub bind_addr: String,
    pub max_connections: u32,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config_path = PathBuf::from(get("CONFIG_PATH").unwrap_or_else(|| DEFAULT_CONFIG_PATH.into()));
        let seed_path = get("SEED_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| config_path.join(SEED_FILE));
        let max_connections = match get("MAX_CONNECTIONS") {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::Load(format!("MAX_CONNECTIONS must be a positive integer, got '{}'", raw)))?,
        };

        Ok(Settings {
            database_url: get("DATABASE_URL"),
            config_path,
            seed_path,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.database_url, None);
        assert_eq!(s.config_path, PathBuf::from("demos/classicmodels"));
        assert_eq!(s.seed_path, PathBuf::from("demos/classicmodels/seed.json"));
        assert_eq!(s.bind_addr, "0.0.0.0:8000");
        assert_eq!(s.max_connections, 5);
    }

    #[test]
    fn seed_follows_config_path() {
        let s = settings(&[("CONFIG_PATH", "/etc/graph"), ("DATABASE_URL", " ")]).unwrap();
        assert_eq!(s.seed_path, PathBuf::from("/etc/graph/seed.json"));
        assert_eq!(s.database_url, None);
    }

    #[test]
    fn rejects_bad_pool_size() {
        assert!(matches!(settings(&[("MAX_CONNECTIONS", "many")]), Err(ConfigError::Load(_))));
    }
}
