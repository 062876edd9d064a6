use crate::{
    models::alias::BucketAliases,
    services::{oauth_service::OAuthEndpoints, session_service::DEFAULT_SESSION_MAX_AGE_SECS},
};
use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::{collections::HashMap, env, fmt, fs, path::PathBuf};
use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_INSTANCE_NAME: &str = "gcs-proxy";
const DEFAULT_ROOT_DIR: &str = "./data";

/// Centralized application configuration.
/// Combines the TOML file, environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub instance_name: String,
    pub oauth: OAuthConfig,
    pub store: StoreConfig,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Google-login gated proxy for object buckets")]
pub struct Args {
    /// Path to the TOML configuration file (overrides GCS_PROXY_CONFIG)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Host to bind to (overrides GCS_PROXY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GCS_PROXY_PORT)
    #[arg(long)]
    pub port: Option<u16>,
}

/// On-disk layout of the configuration file.
#[derive(Debug, Deserialize)]
pub struct FileConfig {
    pub web: WebSection,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize)]
pub struct WebSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub instance_name: Option<String>,
    pub oauth: OAuthConfig,
}

#[derive(Clone, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub session_secret: String,
    pub allowed_hosted_domains: Vec<String>,
    #[serde(default = "default_session_max_age")]
    pub session_max_age_secs: i64,
    pub auth_url: Option<String>,
    pub token_url: Option<String>,
    pub userinfo_url: Option<String>,
}

/// Where bucket objects are read from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Google Cloud Storage, one client per configured bucket.
    #[default]
    Gcs,
    /// `{root_dir}/{bucket}/{key}` on local disk.
    Filesystem,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Service-account JSON key used by the GCS backend.
    pub service_account_file_path: Option<PathBuf>,
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,
    pub index_document: Option<String>,
    #[serde(default)]
    pub buckets: HashMap<String, String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("`{0}` must not be empty")]
    Empty(&'static str),
    #[error("at least one allowed hosted domain is required")]
    NoAllowedDomains,
    #[error("allowed hosted domain `{0}` must be non-empty and carry no surrounding whitespace")]
    InvalidHostedDomain(String),
    #[error("alias `{0}` must be non-empty and must not contain `/`")]
    InvalidAlias(String),
    #[error("session max age must be positive, got {0}")]
    InvalidMaxAge(i64),
}

fn default_session_max_age() -> i64 {
    DEFAULT_SESSION_MAX_AGE_SECS
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT_DIR)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            service_account_file_path: None,
            root_dir: default_root_dir(),
            index_document: None,
            buckets: HashMap::new(),
        }
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("session_secret", &"<redacted>")
            .field("allowed_hosted_domains", &self.allowed_hosted_domains)
            .field("session_max_age_secs", &self.session_max_age_secs)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .finish()
    }
}

impl OAuthConfig {
    pub fn endpoints(&self) -> OAuthEndpoints {
        let defaults = OAuthEndpoints::default();
        OAuthEndpoints {
            auth_url: self.auth_url.clone().unwrap_or(defaults.auth_url),
            token_url: self.token_url.clone().unwrap_or(defaults.token_url),
            userinfo_url: self.userinfo_url.clone().unwrap_or(defaults.userinfo_url),
        }
    }
}

impl AppConfig {
    /// Parse CLI args, environment variables and the config file into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let config_path = match args.config.clone() {
            Some(path) => path,
            None => env::var("GCS_PROXY_CONFIG")
                .map(PathBuf::from)
                .context("no configuration file given (use --config or GCS_PROXY_CONFIG)")?,
        };
        let env_host = env::var("GCS_PROXY_HOST").ok();
        let env_port = match env::var("GCS_PROXY_PORT") {
            Ok(value) => Some(
                value
                    .parse::<u16>()
                    .with_context(|| format!("parsing GCS_PROXY_PORT value `{}`", value))?,
            ),
            Err(env::VarError::NotPresent) => None,
            Err(err) => return Err(err).context("reading GCS_PROXY_PORT"),
        };

        let text = fs::read_to_string(&config_path)
            .with_context(|| format!("reading config file {}", config_path.display()))?;
        let file = Self::parse_file(&text)
            .with_context(|| format!("parsing config file {}", config_path.display()))?;

        let cfg = Self::merge(file, &args, env_host, env_port);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn parse_file(text: &str) -> Result<FileConfig> {
        Ok(toml::from_str(text)?)
    }

    /// CLI wins over environment, environment over file, file over defaults.
    pub fn merge(
        file: FileConfig,
        args: &Args,
        env_host: Option<String>,
        env_port: Option<u16>,
    ) -> Self {
        let web = file.web;
        Self {
            host: args
                .host
                .clone()
                .or(env_host)
                .or(web.host)
                .unwrap_or_else(|| DEFAULT_HOST.into()),
            port: args.port.or(env_port).or(web.port).unwrap_or(DEFAULT_PORT),
            instance_name: web
                .instance_name
                .unwrap_or_else(|| DEFAULT_INSTANCE_NAME.into()),
            oauth: web.oauth,
            store: file.store,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let oauth = &self.oauth;
        if oauth.client_id.trim().is_empty() {
            return Err(ConfigError::Empty("web.oauth.client_id"));
        }
        if oauth.client_secret.trim().is_empty() {
            return Err(ConfigError::Empty("web.oauth.client_secret"));
        }
        if oauth.session_secret.is_empty() {
            return Err(ConfigError::Empty("web.oauth.session_secret"));
        }
        if oauth.allowed_hosted_domains.is_empty() {
            return Err(ConfigError::NoAllowedDomains);
        }
        if let Some(domain) = oauth
            .allowed_hosted_domains
            .iter()
            .find(|d| d.is_empty() || d.trim() != d.as_str())
        {
            return Err(ConfigError::InvalidHostedDomain(domain.clone()));
        }
        if oauth.session_max_age_secs <= 0 {
            return Err(ConfigError::InvalidMaxAge(oauth.session_max_age_secs));
        }
        if let Some(alias) = self
            .store
            .buckets
            .keys()
            .find(|alias| alias.is_empty() || alias.contains('/'))
        {
            return Err(ConfigError::InvalidAlias(alias.clone()));
        }
        Ok(())
    }

    pub fn aliases(&self) -> BucketAliases {
        BucketAliases::from(self.store.buckets.clone())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
