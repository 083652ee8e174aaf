use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used outside development.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEFAULT_SECRET: &str = "dev-secret-change-me";

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub upload_dir: PathBuf,
    /// Externally visible origin, used to build blob URLs.
    pub public_url: String,
    pub environment: String,
}

impl Config {
    /// Load configuration from the process environment (after `.env`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = var("DESIGNVOTE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("DESIGNVOTE_PORT")
            .unwrap_or_else(|| "5000".into())
            .parse()
            .context("Invalid DESIGNVOTE_PORT")?;
        let db_path: PathBuf = var("DESIGNVOTE_DB_PATH")
            .unwrap_or_else(|| "designvote.db".into())
            .into();
        let upload_dir: PathBuf = var("DESIGNVOTE_UPLOAD_DIR")
            .unwrap_or_else(|| "./uploads".into())
            .into();
        let public_url = var("DESIGNVOTE_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();
        let environment = var("DESIGNVOTE_ENV").unwrap_or_else(|| "development".into());

        let jwt_secret = var("DESIGNVOTE_JWT_SECRET").unwrap_or_else(|| DEFAULT_SECRET.into());
        if jwt_secret.is_empty() {
            bail!("DESIGNVOTE_JWT_SECRET is empty");
        }
        if environment != "development" && PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("DESIGNVOTE_JWT_SECRET is unset or still a placeholder; set it before running in {}", environment);
        }

        Ok(Config {
            host,
            port,
            db_path,
            jwt_secret,
            upload_dir,
            public_url,
            environment,
        })
    }

    /// Get server address as string
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL the local blob store hands out.
    pub fn upload_base_url(&self) -> String {
        format!("{}/uploads", self.public_url)
    }
}
