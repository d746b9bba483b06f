//! Octocrab client wrapper handed to handlers.
//!
//! `GitHubClient` exposes the REST verbs as JSON-in, JSON-out calls on
//! relative routes such as `/repos/{owner}/{repo}/issues/1/comments`, and
//! remembers which installation the current delivery belongs to.
//!
//! A client built with [`GitHubClient::from_app`] signs requests as the app
//! itself; [`GitHubClient::with_installation`] then exchanges that identity
//! for an installation access token, so handlers act with the permissions
//! granted to the installation that sent the delivery.

use octocrab::Octocrab;
use serde::Serialize;
use serde_json::Value;

use super::error::ClientError;
use crate::config::AppConfig;
use crate::types::InstallationId;

/// A GitHub API client, optionally bound to an app installation.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone)]
pub struct GitHubClient {
    client: Octocrab,
    app_id: Option<u64>,
    installation: Option<InstallationId>,
}

impl GitHubClient {
    pub fn new(client: Octocrab) -> Self {
        GitHubClient {
            client,
            app_id: None,
            installation: None,
        }
    }

    /// Creates a client that authenticates as the GitHub App `app_id`,
    /// signing its JWTs with the PEM-encoded RSA `private_key`.
    pub fn from_app(app_id: u64, private_key: &str) -> Result<Self, ClientError> {
        let key = jsonwebtoken::EncodingKey::from_rsa_pem(private_key.as_bytes())
            .map_err(|e| ClientError::configuration(format!("invalid app private key: {e}")))?;
        let client = Octocrab::builder()
            .app(octocrab::models::AppId(app_id), key)
            .build()
            .map_err(ClientError::from_octocrab)?;
        Ok(GitHubClient {
            client,
            app_id: Some(app_id),
            installation: None,
        })
    }

    /// Picks the authentication mode from configuration: app credentials
    /// when both `app_id` and `private_key` are set, else the token, else
    /// anonymous access.
    pub fn from_config(config: &AppConfig) -> Result<Self, ClientError> {
        match (config.app_id, config.private_key.as_deref()) {
            (Some(app_id), Some(key)) => GitHubClient::from_app(app_id, key),
            (Some(_), None) => Err(ClientError::configuration(
                "app_id is set but private_key is missing",
            )),
            (None, Some(_)) => Err(ClientError::configuration(
                "private_key is set but app_id is missing",
            )),
            (None, None) => match &config.token {
                Some(token) => GitHubClient::from_token(token.clone()),
                None => GitHubClient::anonymous(),
            },
        }
    }

    /// Creates a client authenticating with a token.
    pub fn from_token(token: impl Into<String>) -> Result<Self, ClientError> {
        let client = Octocrab::builder()
            .personal_token(token.into())
            .build()
            .map_err(ClientError::from_octocrab)?;
        Ok(GitHubClient::new(client))
    }

    /// Creates an unauthenticated client.
    pub fn anonymous() -> Result<Self, ClientError> {
        let client = Octocrab::builder()
            .build()
            .map_err(ClientError::from_octocrab)?;
        Ok(GitHubClient::new(client))
    }

    /// Returns a client scoped to `installation`.
    ///
    /// App-authenticated clients switch to the installation's access token,
    /// which octocrab fetches on first use and refreshes before it expires.
    /// Token and anonymous clients keep their credentials and only record
    /// the installation.
    pub fn with_installation(&self, installation: InstallationId) -> Result<Self, ClientError> {
        let client = if self.app_id.is_some() {
            self.client
                .installation(octocrab::models::InstallationId(installation.0))
                .map_err(ClientError::from_octocrab)?
        } else {
            self.client.clone()
        };
        Ok(GitHubClient {
            client,
            app_id: self.app_id,
            installation: Some(installation),
        })
    }

    pub fn installation(&self) -> Option<InstallationId> {
        self.installation
    }

    /// The app ID when the client authenticates as a GitHub App.
    pub fn app_id(&self) -> Option<u64> {
        self.app_id
    }

    /// Returns a reference to the underlying octocrab client.
    pub fn inner(&self) -> &Octocrab {
        &self.client
    }

    pub async fn get(&self, route: &str) -> Result<Value, ClientError> {
        self.client
            .get(route, None::<&()>)
            .await
            .map_err(ClientError::from_octocrab)
    }

    pub async fn post<B>(&self, route: &str, body: &B) -> Result<Value, ClientError>
    where
        B: Serialize + ?Sized,
    {
        self.client
            .post(route, Some(body))
            .await
            .map_err(ClientError::from_octocrab)
    }

    pub async fn patch<B>(&self, route: &str, body: &B) -> Result<Value, ClientError>
    where
        B: Serialize + ?Sized,
    {
        self.client
            .patch(route, Some(body))
            .await
            .map_err(ClientError::from_octocrab)
    }

    pub async fn put<B>(&self, route: &str, body: &B) -> Result<Value, ClientError>
    where
        B: Serialize + ?Sized,
    {
        self.client
            .put(route, Some(body))
            .await
            .map_err(ClientError::from_octocrab)
    }

    /// Sends a DELETE. GitHub answers most deletes with an empty body, so
    /// only the status is checked.
    pub async fn delete(&self, route: &str) -> Result<(), ClientError> {
        let response = self
            .client
            ._delete(route, None::<&()>)
            .await
            .map_err(ClientError::from_octocrab)?;
        octocrab::map_github_error(response)
            .await
            .map_err(ClientError::from_octocrab)?;
        Ok(())
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("app_id", &self.app_id)
            .field("installation", &self.installation)
            .finish_non_exhaustive()
    }
}
