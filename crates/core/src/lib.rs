pub mod domain;
pub mod frame;
pub mod indicators;
pub mod ingest;
pub mod loader;
pub mod picks;
pub mod pipeline;
pub mod rank;
pub mod screen;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::path::PathBuf;

    const DEFAULT_DATA_DIR: &str = "./src_data";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub data_dir: Option<String>,
        pub workers: Option<usize>,
        pub price_provider_base_url: Option<String>,
        pub price_provider_api_key: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let workers = match std::env::var("VALU_WORKERS") {
                Ok(s) => Some(
                    s.trim()
                        .parse::<usize>()
                        .with_context(|| format!("VALU_WORKERS must be a positive integer (got {s:?})"))?,
                ),
                Err(_) => None,
            };
            if let Some(n) = workers {
                anyhow::ensure!(n >= 1, "VALU_WORKERS must be >= 1");
            }

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                data_dir: std::env::var("VALU_DATA_DIR").ok(),
                workers,
                price_provider_base_url: std::env::var("PRICE_PROVIDER_BASE_URL").ok(),
                price_provider_api_key: std::env::var("PRICE_PROVIDER_API_KEY").ok(),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_price_provider_base_url(&self) -> anyhow::Result<&str> {
            self.price_provider_base_url
                .as_deref()
                .context("PRICE_PROVIDER_BASE_URL is required")
        }

        /// Data root, with an explicit override (CLI flag) taking precedence over the env.
        pub fn data_dir(&self, override_dir: Option<&str>) -> PathBuf {
            override_dir
                .or(self.data_dir.as_deref())
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn empty() -> Settings {
            Settings {
                database_url: None,
                sentry_dsn: None,
                data_dir: None,
                workers: None,
                price_provider_base_url: None,
                price_provider_api_key: None,
            }
        }

        #[test]
        fn data_dir_prefers_override_then_env_then_default() {
            let mut s = empty();
            assert_eq!(s.data_dir(None), PathBuf::from("./src_data"));

            s.data_dir = Some("/srv/valu".to_string());
            assert_eq!(s.data_dir(None), PathBuf::from("/srv/valu"));
            assert_eq!(s.data_dir(Some("/tmp/x")), PathBuf::from("/tmp/x"));
        }

        #[test]
        fn missing_database_url_is_reported_by_name() {
            let err = empty().require_database_url().unwrap_err();
            assert!(err.to_string().contains("DATABASE_URL"));
        }
    }
}
