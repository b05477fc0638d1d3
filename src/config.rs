use std::path::PathBuf;

const DEFAULT_DB_NAME: &str = "adept.db";
const DEFAULT_LOG_FILTER: &str = "warn";

/// Runtime settings resolved from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub seed: Option<u64>,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            db_path: db_path(),
            seed: std::env::var("ADEPT_SEED")
                .ok()
                .and_then(|s| s.trim().parse().ok()),
            log_filter: std::env::var("ADEPT_LOG")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        }
    }

    /// A seed given on the command line wins over the environment.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        if seed.is_some() {
            self.seed = seed;
        }
        self
    }
}

fn db_path() -> PathBuf {
    if let Ok(path) = std::env::var("ADEPT_DB") {
        return PathBuf::from(path);
    }

    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("adept");

    config_dir.join(DEFAULT_DB_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Environment variables are process-wide, so every env assertion lives in one test.
    #[test]
    fn reads_environment() {
        env::set_var("ADEPT_DB", "/tmp/test_adept.db");
        env::set_var("ADEPT_SEED", "17");
        env::set_var("ADEPT_LOG", "adept=debug");

        let config = Config::from_env();
        assert_eq!(config.db_path, PathBuf::from("/tmp/test_adept.db"));
        assert_eq!(config.seed, Some(17));
        assert_eq!(config.log_filter, "adept=debug");

        env::set_var("ADEPT_SEED", "not-a-number");
        env::remove_var("ADEPT_LOG");
        let config = Config::from_env();
        assert_eq!(config.seed, None);
        assert_eq!(config.log_filter, "warn");

        env::remove_var("ADEPT_DB");
        env::remove_var("ADEPT_SEED");
        let config = Config::from_env();
        assert!(config.db_path.ends_with("adept/adept.db"));
    }

    #[test]
    fn cli_seed_overrides() {
        let config = Config {
            db_path: PathBuf::from("x.db"),
            seed: Some(1),
            log_filter: "warn".into(),
        };
        assert_eq!(config.clone().with_seed(Some(5)).seed, Some(5));
        assert_eq!(config.with_seed(None).seed, Some(1));
    }
}
