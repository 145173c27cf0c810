use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_DATABASE_URL: &str = "kioskdb.sqlite";
const DEFAULT_COLLECTION_NAME: &str = "EventDaySubmission";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

/// Server settings read from the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// SQLite file holding every database/collection
    pub database_url: String,
    /// Kiosk collection the dashboard reads submissions from
    pub collection_name: String,
    pub host: String,
    pub port: u16,
    /// Replacement for the built-in dataset catalog
    pub catalog: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Missing keys fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Config {
            database_url: or_default(get("KIOSKDB_DATABASE_URL"), "KIOSKDB_DATABASE_URL", DEFAULT_DATABASE_URL),
            collection_name: or_default(
                get("KIOSKDB_COLLECTION_NAME"),
                "KIOSKDB_COLLECTION_NAME",
                DEFAULT_COLLECTION_NAME,
            ),
            host: or_default(get("KIOSKDB_HOST"), "KIOSKDB_HOST", DEFAULT_HOST),
            port: parsed(get("KIOSKDB_PORT"), "KIOSKDB_PORT", DEFAULT_PORT),
            catalog: get("KIOSKDB_CATALOG").map(PathBuf::from),
        }
    }
}

fn or_default(value: Option<String>, key: &str, default: &str) -> String {
    value.unwrap_or_else(|| {
        log::info!("{key} not set, using {default}");
        default.to_string()
    })
}

fn parsed<T: FromStr + std::fmt::Display>(value: Option<String>, key: &str, default: T) -> T {
    match value {
        None => {
            log::info!("{key} not set, using {default}");
            default
        }
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("{key}={raw} is not valid, using {default}");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.database_url, "kioskdb.sqlite");
        assert_eq!(config.collection_name, "EventDaySubmission");
        assert_eq!(config.port, 8080);
        assert_eq!(config.catalog, None);
    }

    #[test]
    fn test_overrides_and_bad_port() {
        let env: HashMap<&str, &str> = [
            ("KIOSKDB_DATABASE_URL", "/var/lib/kiosk.db"),
            ("KIOSKDB_COLLECTION_NAME", "DaySubmissions"),
            ("KIOSKDB_PORT", "eighty"),
            ("KIOSKDB_CATALOG", "catalog.yaml"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.database_url, "/var/lib/kiosk.db");
        assert_eq!(config.collection_name, "DaySubmissions");
        assert_eq!(config.port, 8080);
        assert_eq!(config.catalog, Some(PathBuf::from("catalog.yaml")));
    }
}
