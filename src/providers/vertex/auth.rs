//! Bearer tokens for the platform API.
//!
//! A token is either configured directly or minted by running an external command
//! (by default `gcloud auth print-access-token`). Minted tokens are reused until
//! [`TOKEN_LIFETIME`] has passed and then minted again.

use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::providers::{Error as ProviderError, ErrorKind};

pub(crate) const DEFAULT_TOKEN_COMMAND: &str = "gcloud auth print-access-token";

/// gcloud access tokens expire after an hour.
pub(super) const TOKEN_LIFETIME: Duration = Duration::from_secs(50 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Credentials {
    /// A literal OAuth access token
    AccessToken(String),
    /// A command whose standard output is an access token
    TokenCommand(String),
}

#[derive(thiserror::Error, Debug)]
pub(super) enum Error {
    #[error("the access token is empty")]
    EmptyToken,

    #[error("the token command is empty")]
    EmptyCommand,

    #[error("failed to run token command \"{command}\"")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("token command \"{command}\" exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

impl From<Error> for ProviderError {
    fn from(value: Error) -> Self {
        ProviderError::from_source(ErrorKind::Authentication, Box::new(value))
    }
}

struct MintedToken {
    token: String,
    minted_at: Instant,
}

pub(super) struct TokenSource {
    credentials: Credentials,
    minted: Mutex<Option<MintedToken>>,
    clock: Arc<dyn Clock>,
}

impl TokenSource {
    pub(super) fn new(credentials: Credentials) -> TokenSource {
        TokenSource::with_clock(credentials, Arc::new(SystemClock))
    }

    pub(super) fn with_clock(credentials: Credentials, clock: Arc<dyn Clock>) -> TokenSource {
        TokenSource {
            credentials,
            minted: Mutex::new(None),
            clock,
        }
    }

    pub(super) async fn token(&self) -> Result<String, Error> {
        let command = match &self.credentials {
            Credentials::AccessToken(token) => return non_empty(token.trim().to_string()),
            Credentials::TokenCommand(command) => command,
        };

        // Held across the command so concurrent callers share one mint.
        let mut minted = self.minted.lock().await;

        let now = self.clock.now();

        if let Some(current) = minted.as_ref() {
            if now.saturating_duration_since(current.minted_at) < TOKEN_LIFETIME {
                return Ok(current.token.clone());
            }

            tracing::debug!("access token expired");
        }

        let token = non_empty(run_token_command(command).await?)?;

        *minted = Some(MintedToken {
            token: token.clone(),
            minted_at: now,
        });

        Ok(token)
    }
}

fn non_empty(token: String) -> Result<String, Error> {
    if token.is_empty() {
        return Err(Error::EmptyToken);
    }

    Ok(token)
}

async fn run_token_command(command: &str) -> Result<String, Error> {
    let mut words = command.split_whitespace();

    let program = words.next().ok_or(Error::EmptyCommand)?;

    tracing::debug!(command, "minting access token");

    let output = Command::new(program)
        .args(words)
        .output()
        .await
        .map_err(|source| Error::Spawn {
            command: command.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(Error::CommandFailed {
            command: command.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// The subset of a service-account key file that is of interest.
#[derive(Deserialize, Debug)]
struct ServiceAccountKey {
    #[serde(default)]
    project_id: Option<String>,
}

/// Reads the project identifier out of a service-account key (JSON text).
pub(crate) fn project_id_from_service_account(key: &str) -> Result<Option<String>, serde_json::Error> {
    let key: ServiceAccountKey = serde_json::from_str(key)?;

    Ok(key.project_id.filter(|p| !p.is_empty()))
}
