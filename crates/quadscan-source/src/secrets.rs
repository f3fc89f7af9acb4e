//! OAuth client secrets.
//!
//! Read from `GOOGLE_OAUTH_CREDENTIALS` (inline JSON or a path to a JSON
//! file), falling back to `client_secret.json`. Both the `web` and
//! `installed` client shapes are accepted, as well as a bare object.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const SECRETS_ENV_VAR: &str = "GOOGLE_OAUTH_CREDENTIALS";
pub const DEFAULT_SECRETS_FILE: &str = "client_secret.json";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Read-only scopes requested for folder listing and downloads.
pub const DRIVE_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/drive.metadata.readonly",
    "https://www.googleapis.com/auth/drive.readonly",
];

#[derive(thiserror::Error, Debug)]
pub enum SecretsError {
    #[error("failed to read client secrets from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("client secrets are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("client secrets are missing '{0}'")]
    Missing(&'static str),
    #[error("no client secrets: set {SECRETS_ENV_VAR} or provide {DEFAULT_SECRETS_FILE}")]
    NotConfigured,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SecretsShape {
    Web { web: ClientSecrets },
    Installed { installed: ClientSecrets },
    Bare(ClientSecrets),
}

impl ClientSecrets {
    pub fn from_json_str(text: &str) -> Result<Self, SecretsError> {
        let secrets = match serde_json::from_str::<SecretsShape>(text)? {
            SecretsShape::Web { web } => web,
            SecretsShape::Installed { installed } => installed,
            SecretsShape::Bare(bare) => bare,
        };
        if secrets.client_id.is_empty() {
            return Err(SecretsError::Missing("client_id"));
        }
        if secrets.client_secret.is_empty() {
            return Err(SecretsError::Missing("client_secret"));
        }
        Ok(secrets)
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, SecretsError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SecretsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Resolve secrets from the environment, then `fallback`.
    pub fn discover(fallback: impl AsRef<Path>) -> Result<Self, SecretsError> {
        Self::discover_from(std::env::var(SECRETS_ENV_VAR).ok().as_deref(), fallback.as_ref())
    }

    fn discover_from(env_value: Option<&str>, fallback: &Path) -> Result<Self, SecretsError> {
        if let Some(value) = env_value.map(str::trim).filter(|v| !v.is_empty()) {
            if value.starts_with('{') {
                log::debug!("client secrets read inline from {SECRETS_ENV_VAR}");
                return Self::from_json_str(value);
            }
            log::debug!("client secrets read from {value} ({SECRETS_ENV_VAR})");
            return Self::load_file(value);
        }
        if fallback.is_file() {
            return Self::load_file(fallback);
        }
        Err(SecretsError::NotConfigured)
    }
}
