use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;

pub const DEFAULT_VAULT_URL: &str = "https://api.restful-api.dev";
pub const DEFAULT_CORPUS_URL: &str = "https://dummyjson.com/recipes";
pub const DEFAULT_MEAL_URL: &str = "https://www.themealdb.com/api/json/v1/1/random.php";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const DB_FILE: &str = "larder.db";

#[derive(Debug, Clone)]
pub struct Config {
    /// Vault root; collection lives at `{vault_url}/objects`.
    pub vault_url: String,
    pub corpus_url: String,
    pub meal_url: String,
    pub request_timeout: Duration,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
}

impl Config {
    /// Resolve the platform data directory, apply `LARDER_*` environment
    /// overrides, and make sure the data directory exists.
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os("LARDER_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => ProjectDirs::from("", "", "larder")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };

        let mut config = Self::with_data_dir(&data_dir)?;
        if let Ok(url) = std::env::var("LARDER_VAULT_URL") {
            config.vault_url = url;
        }
        if let Ok(url) = std::env::var("LARDER_CORPUS_URL") {
            config.corpus_url = url;
        }
        if let Ok(url) = std::env::var("LARDER_MEAL_URL") {
            config.meal_url = url;
        }
        if let Ok(secs) = std::env::var("LARDER_TIMEOUT_SECS") {
            config.request_timeout = parse_timeout(&secs)?;
        }
        Ok(config)
    }

    /// Default endpoints with storage rooted at `data_dir`.
    pub fn with_data_dir(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Config {
            vault_url: DEFAULT_VAULT_URL.to_string(),
            corpus_url: DEFAULT_CORPUS_URL.to_string(),
            meal_url: DEFAULT_MEAL_URL.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
            data_dir: data_dir.to_path_buf(),
            db_path: data_dir.join(DB_FILE),
        })
    }
}

/// Whole seconds, at least one.
fn parse_timeout(value: &str) -> Result<Duration> {
    let secs: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid LARDER_TIMEOUT_SECS: '{value}'"))?;
    if secs == 0 {
        anyhow::bail!("LARDER_TIMEOUT_SECS must be at least 1 second");
    }
    Ok(Duration::from_secs(secs))
}
