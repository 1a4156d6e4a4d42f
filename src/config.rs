//! Runtime configuration loaded from the environment (and `.env`).

use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_STORAGE_ROOT: &str = "./uploads";
const DEFAULT_RENDERER_BIN: &str = "weasyprint";
const DEFAULT_EVIDENCE_READ_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Everything the server and the report pipeline need to start.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Root directory evidence paths are resolved against.
    pub storage_root: PathBuf,
    pub icc_profile_path: PathBuf,
    /// Directory holding stylesheets referenced by the report templates.
    pub assets_dir: PathBuf,
    pub renderer_bin: String,
    pub evidence_read_concurrency: usize,
}

impl ReportConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let host = env::var("SERVER_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = parse_var("SERVER_PORT", DEFAULT_PORT)?;

        let storage_root = env::var("STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_STORAGE_ROOT));

        let icc_profile_path = env::var("ICC_PROFILE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_icc_profile_path());

        let assets_dir = env::var("REPORT_ASSETS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_assets_dir());

        let renderer_bin =
            env::var("HTML_RENDERER_BIN").unwrap_or_else(|_| DEFAULT_RENDERER_BIN.to_string());

        let evidence_read_concurrency =
            parse_var("EVIDENCE_READ_CONCURRENCY", DEFAULT_EVIDENCE_READ_CONCURRENCY)?;
        if evidence_read_concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: "EVIDENCE_READ_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url,
            host,
            port,
            storage_root,
            icc_profile_path,
            assets_dir,
            renderer_bin,
            evidence_read_concurrency,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

/// Get the static assets directory path.
pub fn get_static_dir() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static"))
}

pub fn default_icc_profile_path() -> PathBuf {
    get_static_dir().join("icc").join("sRGB.icc")
}

pub fn default_assets_dir() -> PathBuf {
    get_static_dir().join("report")
}
