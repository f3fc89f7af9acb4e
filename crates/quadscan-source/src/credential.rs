//! Renewable access credential for the remote store.
//!
//! The session owns an `Option<Credential>`. [`CredentialManager`] checks it
//! before every remote call, refreshes it in place when expired, and takes it
//! out of the slot when it can no longer be used.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::secrets::{ClientSecrets, DRIVE_SCOPES};

/// Expiry is treated as reached this many seconds before the recorded instant.
pub const EXPIRY_SKEW_SECS: i64 = 10;

fn expiry_after(now: DateTime<Utc>, expires_in: Option<i64>) -> Option<DateTime<Utc>> {
    expires_in
        .and_then(TimeDelta::try_seconds)
        .and_then(|d| now.checked_add_signed(d))
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("not signed in to the remote store")]
    SignedOut,
    #[error("stored credential is missing '{0}'")]
    Incomplete(&'static str),
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),
    #[error("remote store rejected the credential (HTTP {status})")]
    Rejected { status: u16 },
}

/// Access credential as issued by the token endpoint.
///
/// Fields are optional because sessions persist whatever the consent flow
/// returned; [`Credential::validate`] enforces completeness.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(alias = "token")]
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(alias = "token_uri")]
    pub token_endpoint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    #[serde(default, alias = "scopes")]
    pub granted_scopes: Vec<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// Build the record handed over at consent-flow completion.
    pub fn from_grant(secrets: &ClientSecrets, grant: TokenGrant, requested_scopes: &[String]) -> Self {
        let now = Utc::now();
        let granted_scopes = match &grant.scope {
            Some(s) if !s.trim().is_empty() => s.split_whitespace().map(str::to_owned).collect(),
            _ => requested_scopes.to_vec(),
        };
        Self {
            access_token: Some(grant.access_token),
            refresh_token: grant.refresh_token,
            token_endpoint: Some(secrets.token_uri.clone()),
            client_id: Some(secrets.client_id.clone()),
            client_secret: Some(secrets.client_secret.clone()),
            granted_scopes,
            expiry: expiry_after(now, grant.expires_in),
        }
    }

    /// Credential for the read-only Drive scopes, checked with
    /// [`Credential::validate`] before it is handed out.
    pub fn for_drive(secrets: &ClientSecrets, grant: TokenGrant) -> Result<Self, AuthError> {
        let scopes: Vec<String> = DRIVE_SCOPES.iter().map(|s| s.to_string()).collect();
        let cred = Self::from_grant(secrets, grant, &scopes);
        cred.validate()?;
        Ok(cred)
    }

    /// All of access token, refresh token, token endpoint, client id, client
    /// secret and scopes must be present and non-empty.
    pub fn validate(&self) -> Result<(), AuthError> {
        fn present(field: &Option<String>) -> bool {
            field.as_deref().is_some_and(|v| !v.is_empty())
        }
        let checks: [(&'static str, bool); 6] = [
            ("access_token", present(&self.access_token)),
            ("refresh_token", present(&self.refresh_token)),
            ("token_endpoint", present(&self.token_endpoint)),
            ("client_id", present(&self.client_id)),
            ("client_secret", present(&self.client_secret)),
            ("granted_scopes", !self.granted_scopes.is_empty()),
        ];
        match checks.iter().find(|(_, ok)| !ok) {
            Some((field, _)) => Err(AuthError::Incomplete(*field)),
            None => Ok(()),
        }
    }

    /// A credential without an expiry never expires locally.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry
            .is_some_and(|exp| now + TimeDelta::seconds(EXPIRY_SKEW_SECS) >= exp)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    fn apply(&mut self, grant: TokenGrant, now: DateTime<Utc>) {
        self.access_token = Some(grant.access_token);
        if let Some(rotated) = grant.refresh_token {
            self.refresh_token = Some(rotated);
        }
        self.expiry = expiry_after(now, grant.expires_in);
        if let Some(scope) = grant.scope.filter(|s| !s.trim().is_empty()) {
            self.granted_scopes = scope.split_whitespace().map(str::to_owned).collect();
        }
    }
}

/// Successful token-endpoint response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Present when the endpoint rotates the refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Parameters of one refresh exchange.
#[derive(Clone, Copy, Debug)]
pub struct RefreshRequest<'a> {
    pub endpoint: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub refresh_token: &'a str,
}

/// Performs the refresh-token exchange.
pub trait TokenEndpoint: Send + Sync {
    fn refresh(&self, request: RefreshRequest<'_>) -> Result<TokenGrant, AuthError>;
}

/// OAuth2 token endpoint over HTTPS (`grant_type=refresh_token`).
pub struct HttpTokenEndpoint {
    client: reqwest::blocking::Client,
}

#[derive(Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl HttpTokenEndpoint {
    pub fn new(timeout: Option<Duration>) -> Result<Self, AuthError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::RefreshFailed(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

impl TokenEndpoint for HttpTokenEndpoint {
    fn refresh(&self, request: RefreshRequest<'_>) -> Result<TokenGrant, AuthError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", request.refresh_token),
            ("client_id", request.client_id),
            ("client_secret", request.client_secret),
        ];
        let response = self
            .client
            .post(request.endpoint)
            .form(&form)
            .send()
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let detail = match serde_json::from_str::<OAuthErrorBody>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {desc}", err.error),
                    None => err.error,
                },
                Err(_) => body,
            };
            return Err(AuthError::RefreshFailed(format!(
                "HTTP {}: {detail}",
                status.as_u16()
            )));
        }
        response
            .json()
            .map_err(|e| AuthError::RefreshFailed(format!("malformed token response: {e}")))
    }
}

/// Freshness checks and refresh for a session's credential slot.
#[derive(Clone)]
pub struct CredentialManager {
    endpoint: Arc<dyn TokenEndpoint>,
}

impl CredentialManager {
    pub fn new(endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self { endpoint }
    }

    /// Return a usable access token, refreshing first if expired.
    ///
    /// An incomplete credential or a failed refresh empties `slot`; the
    /// caller must re-authenticate.
    pub fn ensure_fresh(&self, slot: &mut Option<Credential>) -> Result<String, AuthError> {
        self.ensure_fresh_at(slot, Utc::now())
    }

    pub fn ensure_fresh_at(
        &self,
        slot: &mut Option<Credential>,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let Some(cred) = slot.as_mut() else {
            return Err(AuthError::SignedOut);
        };
        if let Err(err) = cred.validate() {
            log::warn!("dropping credential: {err}");
            slot.take();
            return Err(err);
        }
        if cred.is_expired_at(now) {
            log::info!("access token expired, refreshing");
            let grant = {
                // validate() guarantees these fields.
                let field = |f: &Option<String>| f.clone().unwrap_or_default();
                let (endpoint, client_id, client_secret, refresh_token) = (
                    field(&cred.token_endpoint),
                    field(&cred.client_id),
                    field(&cred.client_secret),
                    field(&cred.refresh_token),
                );
                self.endpoint.refresh(RefreshRequest {
                    endpoint: &endpoint,
                    client_id: &client_id,
                    client_secret: &client_secret,
                    refresh_token: &refresh_token,
                })
            };
            match grant {
                Ok(grant) => {
                    cred.apply(grant, now);
                    log::info!("access token refreshed");
                }
                Err(err) => {
                    log::error!("token refresh failed, re-authentication required: {err}");
                    slot.take();
                    return Err(err);
                }
            }
        }
        slot.as_ref()
            .and_then(|c| c.access_token.clone())
            .ok_or(AuthError::Incomplete("access_token"))
    }

    /// Drop the credential after the remote store rejected it.
    pub fn invalidate(&self, slot: &mut Option<Credential>, status: u16) -> AuthError {
        if slot.take().is_some() {
            log::warn!("credential invalidated after HTTP {status}");
        }
        AuthError::Rejected { status }
    }
}
