use std::{
    env,
    net::SocketAddr,
    path::{Path, PathBuf},
    str::FromStr,
};

use thiserror::Error;

pub const SQUARE_PRODUCTION_URL: &str = "https://connect.squareup.com";
pub const SQUARE_SANDBOX_URL: &str = "https://connect.squareupsandbox.com";
pub const DEFAULT_CALENDAR_ID: &str = "primary";
pub const DEFAULT_TIME_ZONE: &str = "America/Chicago";

const CREDENTIALS_FILE: &str = "credentials.json";
const TOKEN_FILE: &str = "token.json";
const LOCAL_CREDENTIALS_DIR: &str = "google_creds";
const CONFIG_DIR_NAME: &str = "smallbiz-mcp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            _ => Err(ConfigError::InvalidTransport(value.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub transport: Transport,
    pub square_access_token: String,
    pub square_base_url: String,
    pub calendar: CalendarSettings,
    pub database_url: Option<String>,
    pub api_token: Option<String>,
    pub bind_addr: String,
    pub bind_port: u16,
}

/// Where the calendar OAuth files live and which calendar the tools act on.
#[derive(Debug, Clone)]
pub struct CalendarSettings {
    pub calendar_id: String,
    pub default_time_zone: String,
    pub token_path: PathBuf,
    pub credentials_override: Option<PathBuf>,
    pub credential_candidates: Vec<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("SQUARE_ACCESS_TOKEN is required and must not be empty")]
    MissingSquareToken,
    #[error("SQUARE_ENVIRONMENT must be `production` or `sandbox`, got `{0}`")]
    InvalidSquareEnvironment(String),
    #[error("MCP_TRANSPORT must be `stdio` or `http`, got `{0}`")]
    InvalidTransport(String),
    #[error("MCP_API_TOKEN is required and must not be empty when MCP_TRANSPORT=http")]
    MissingApiToken,
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("invalid bind address or port")]
    InvalidSocket,
    #[error("DATABASE_URL is invalid: {0}")]
    InvalidDatabaseUrl(String),
    #[error("google calendar credentials not found; set GOOGLE_CALENDAR_CREDENTIALS_PATH or place credentials.json in one of: {searched}")]
    MissingCalendarCredentials { searched: String },
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let square_access_token =
            non_empty(&lookup, "SQUARE_ACCESS_TOKEN").ok_or(ConfigError::MissingSquareToken)?;

        let square_base_url = match non_empty(&lookup, "SQUARE_BASE_URL") {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => square_environment_url(
                non_empty(&lookup, "SQUARE_ENVIRONMENT").as_deref(),
            )?
            .to_string(),
        };

        let transport = non_empty(&lookup, "MCP_TRANSPORT")
            .map(|value| value.parse::<Transport>())
            .transpose()?
            .unwrap_or(Transport::Stdio);

        let api_token = non_empty(&lookup, "MCP_API_TOKEN");
        if transport == Transport::Http && api_token.is_none() {
            return Err(ConfigError::MissingApiToken);
        }

        let bind_addr = non_empty(&lookup, "BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());
        let bind_port = non_empty(&lookup, "BIND_PORT")
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8080);

        let config = Self {
            transport,
            square_access_token,
            square_base_url,
            calendar: CalendarSettings::from_lookup(&lookup),
            database_url: non_empty(&lookup, "DATABASE_URL"),
            api_token,
            bind_addr,
            bind_port,
        };

        if config.transport == Transport::Http {
            let _ = config.bind_socket()?;
        }
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

fn square_environment_url(environment: Option<&str>) -> Result<&'static str, ConfigError> {
    match environment.map(str::to_ascii_lowercase).as_deref() {
        None | Some("sandbox") => Ok(SQUARE_SANDBOX_URL),
        Some("production") => Ok(SQUARE_PRODUCTION_URL),
        Some(other) => Err(ConfigError::InvalidSquareEnvironment(other.to_string())),
    }
}

impl CalendarSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let credential_candidates = candidate_paths(CREDENTIALS_FILE);
        let token_path = non_empty(lookup, "GOOGLE_CALENDAR_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_token_path(&candidate_paths(TOKEN_FILE)));

        Self {
            calendar_id: non_empty(lookup, "GOOGLE_CALENDAR_ID")
                .unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string()),
            default_time_zone: non_empty(lookup, "GOOGLE_CALENDAR_TIME_ZONE")
                .unwrap_or_else(|| DEFAULT_TIME_ZONE.to_string()),
            token_path,
            credentials_override: non_empty(lookup, "GOOGLE_CALENDAR_CREDENTIALS_PATH")
                .map(PathBuf::from),
            credential_candidates,
        }
    }

    pub fn credentials_path(&self) -> Result<PathBuf, ConfigError> {
        resolve_credential_path(
            self.credentials_override.as_deref(),
            &self.credential_candidates,
        )
    }
}

/// Explicit override wins; otherwise the first candidate that exists on disk.
pub fn resolve_credential_path(
    explicit: Option<&Path>,
    candidates: &[PathBuf],
) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    candidates
        .iter()
        .find(|candidate| candidate.is_file())
        .cloned()
        .ok_or_else(|| ConfigError::MissingCalendarCredentials {
            searched: candidates
                .iter()
                .map(|candidate| candidate.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

fn candidate_paths(file_name: &str) -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(LOCAL_CREDENTIALS_DIR).join(file_name)];
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join(CONFIG_DIR_NAME).join(file_name));
    }
    candidates
}

fn default_token_path(candidates: &[PathBuf]) -> PathBuf {
    candidates
        .iter()
        .find(|candidate| candidate.is_file())
        .or_else(|| candidates.first())
        .cloned()
        .unwrap_or_else(|| PathBuf::from(TOKEN_FILE))
}
