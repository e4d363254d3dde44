//! The OAuth 2.1 authorization-code flow for one MCP server.
//!
//! An [`OAuthSession`] is keyed by the canonical server URL and drives the
//! whole lifecycle: discovery, dynamic registration, PKCE authorization,
//! code exchange, refresh. All durable state goes through the
//! [`OAuthStorage`] abstraction so embedders can persist tokens.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::canonical::canonicalize_server_url;
use crate::discovery;
use crate::error::{AuthError, AuthResult};
use crate::pkce::{generate_pkce_params, generate_state, PkceParams};
use crate::storage::{OAuthStorage, StorageKind};
use crate::types::{
    AuthorizationServerMetadata, ClientRegistrationRequest, ClientRegistrationResponse,
    OAuthConfig, StoredToken, TokenResponse,
};

/// A pending authorization hand-off: open `authorize_url` in a browser and
/// feed the callback's `code` and `state` to
/// [`OAuthSession::complete_authorization`].
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub authorize_url: String,
    pub state: String,
}

pub struct OAuthSession {
    http: reqwest::Client,
    server_url: String,
    config: OAuthConfig,
    storage: Arc<dyn OAuthStorage>,
}

impl OAuthSession {
    pub fn new(
        server_url: &str,
        config: OAuthConfig,
        storage: Arc<dyn OAuthStorage>,
    ) -> AuthResult<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            server_url: canonicalize_server_url(server_url)?,
            config,
            storage,
        })
    }

    /// The canonical server URL this session is bound to; used as the
    /// storage key and as the RFC 8707 `resource` parameter.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// A valid bearer token, refreshing when the current one is expired or
    /// inside the expires-soon window. `None` means the caller must run the
    /// authorization flow (again).
    pub async fn access_token(&self) -> AuthResult<Option<String>> {
        let Some(raw) = self.storage.get(StorageKind::Token, &self.server_url).await? else {
            return Ok(None);
        };
        let token: StoredToken = serde_json::from_value(raw)?;

        if !token.expires_soon() {
            return Ok(Some(token.access_token));
        }

        let Some(refresh_token) = token.refresh_token.clone() else {
            return Ok(if token.is_expired() {
                None
            } else {
                Some(token.access_token)
            });
        };

        match self.refresh(&refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed.access_token)),
            Err(err) => {
                // Fall through to None so the caller can re-authorize.
                tracing::warn!(server = %self.server_url, error = %err, "token refresh failed");
                self.storage
                    .delete(StorageKind::Token, &self.server_url)
                    .await?;
                Ok(None)
            }
        }
    }

    /// React to a 401 by (re)discovering the authorization server.
    pub async fn handle_unauthorized(
        &self,
        www_authenticate: Option<&str>,
    ) -> AuthResult<AuthorizationServerMetadata> {
        let resource_metadata_url =
            www_authenticate.and_then(discovery::parse_www_authenticate_resource);
        let metadata =
            discovery::discover(&self.http, &self.server_url, resource_metadata_url.as_deref())
                .await?;
        self.storage
            .set(
                StorageKind::ServerMetadata,
                &self.server_url,
                serde_json::to_value(&metadata)?,
            )
            .await?;
        Ok(metadata)
    }

    async fn server_metadata(&self) -> AuthResult<AuthorizationServerMetadata> {
        if let Some(raw) = self
            .storage
            .get(StorageKind::ServerMetadata, &self.server_url)
            .await?
        {
            return Ok(serde_json::from_value(raw)?);
        }
        self.handle_unauthorized(None).await
    }

    /// The client credentials to use: configured, cached, or freshly
    /// registered via RFC 7591.
    async fn ensure_client(
        &self,
        metadata: &AuthorizationServerMetadata,
    ) -> AuthResult<ClientRegistrationResponse> {
        if let Some(client_id) = &self.config.client_id {
            return Ok(ClientRegistrationResponse {
                client_id: client_id.clone(),
                client_secret: self.config.client_secret.clone(),
                redirect_uris: vec![self.config.redirect_uri.clone()],
                client_name: Some(self.config.client_name.clone()),
                scope: self.config.scope.clone(),
            });
        }

        if let Some(raw) = self
            .storage
            .get(StorageKind::ClientInfo, &self.server_url)
            .await?
        {
            return Ok(serde_json::from_value(raw)?);
        }

        let registration_endpoint = metadata.registration_endpoint.as_deref().ok_or_else(|| {
            AuthError::RegistrationFailed(
                "no client configured and the server does not support dynamic registration"
                    .to_string(),
            )
        })?;

        let request = ClientRegistrationRequest {
            redirect_uris: vec![self.config.redirect_uri.clone()],
            client_name: Some(self.config.client_name.clone()),
            scope: self.config.scope.clone(),
            token_endpoint_auth_method: Some("none".to_string()),
            grant_types: Some(vec![
                "authorization_code".to_string(),
                "refresh_token".to_string(),
            ]),
            response_types: Some(vec!["code".to_string()]),
        };

        let response = self
            .http
            .post(registration_endpoint)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::RegistrationFailed(body));
        }
        let registered: ClientRegistrationResponse = response.json().await?;

        // The server's registration response is authoritative: it may have
        // replaced our requested redirect URI.
        if let Some(granted) = registered.redirect_uris.first() {
            if granted != &self.config.redirect_uri {
                tracing::warn!(
                    requested = %self.config.redirect_uri,
                    granted = %granted,
                    "authorization server replaced the requested redirect URI"
                );
            }
        }

        self.storage
            .set(
                StorageKind::ClientInfo,
                &self.server_url,
                serde_json::to_value(&registered)?,
            )
            .await?;
        Ok(registered)
    }

    fn effective_redirect_uri(&self, client: &ClientRegistrationResponse) -> String {
        client
            .redirect_uris
            .first()
            .cloned()
            .unwrap_or_else(|| self.config.redirect_uri.clone())
    }

    /// Start the authorization-code flow: discovery, registration, PKCE and
    /// state generation, and the authorization URL the embedder must open.
    pub async fn begin_authorization(&self) -> AuthResult<AuthorizationRequest> {
        let metadata = self.server_metadata().await?;
        let client = self.ensure_client(&metadata).await?;

        let pkce = generate_pkce_params();
        let state = generate_state();
        self.storage
            .set(StorageKind::Pkce, &self.server_url, serde_json::to_value(&pkce)?)
            .await?;
        self.storage
            .set(StorageKind::State, &self.server_url, Value::String(state.clone()))
            .await?;

        let mut url = Url::parse(&metadata.authorization_endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &client.client_id)
                .append_pair("redirect_uri", &self.effective_redirect_uri(&client))
                .append_pair("state", &state)
                .append_pair("code_challenge", &pkce.code_challenge)
                .append_pair("code_challenge_method", &pkce.code_challenge_method)
                .append_pair("resource", &self.server_url);
            if let Some(scope) = &self.config.scope {
                query.append_pair("scope", scope);
            }
        }

        Ok(AuthorizationRequest {
            authorize_url: url.to_string(),
            state,
        })
    }

    /// Finish the flow with the `code` and `state` from the redirect
    /// callback. Verifies state, exchanges the code, stores the token.
    pub async fn complete_authorization(
        &self,
        code: &str,
        state: &str,
    ) -> AuthResult<StoredToken> {
        let expected_state = self
            .storage
            .get(StorageKind::State, &self.server_url)
            .await?
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or(AuthError::NoPendingAuthorization)?;
        if expected_state != state {
            return Err(AuthError::StateMismatch);
        }

        let pkce: PkceParams = self
            .storage
            .get(StorageKind::Pkce, &self.server_url)
            .await?
            .map(serde_json::from_value)
            .transpose()?
            .ok_or(AuthError::NoPendingAuthorization)?;

        let metadata = self.server_metadata().await?;
        let client = self.ensure_client(&metadata).await?;
        let redirect_uri = self.effective_redirect_uri(&client);

        let response = self
            .exchange_code(&metadata, &client, &redirect_uri, code, &pkce)
            .await?;
        let token = StoredToken::from_response(response);

        self.storage
            .set(
                StorageKind::Token,
                &self.server_url,
                serde_json::to_value(&token)?,
            )
            .await?;
        self.storage.delete(StorageKind::Pkce, &self.server_url).await?;
        self.storage.delete(StorageKind::State, &self.server_url).await?;
        Ok(token)
    }

    async fn exchange_code(
        &self,
        metadata: &AuthorizationServerMetadata,
        client: &ClientRegistrationResponse,
        redirect_uri: &str,
        code: &str,
        pkce: &PkceParams,
    ) -> AuthResult<TokenResponse> {
        match self
            .token_request(metadata, client, redirect_uri, code, pkce)
            .await
        {
            Ok(token) => Ok(token),
            Err(AuthError::TokenExchangeFailed(body)) => {
                // Some servers rewrite redirect URIs after registration and
                // reject the one we sent, telling us which one they expect.
                if let Some(expected) = expected_redirect_uri(&body) {
                    tracing::warn!(
                        sent = %redirect_uri,
                        expected = %expected,
                        "token endpoint rejected redirect_uri, retrying with the server-expected value"
                    );
                    return self
                        .token_request(metadata, client, &expected, code, pkce)
                        .await;
                }
                Err(AuthError::TokenExchangeFailed(body))
            }
            Err(err) => Err(err),
        }
    }

    async fn token_request(
        &self,
        metadata: &AuthorizationServerMetadata,
        client: &ClientRegistrationResponse,
        redirect_uri: &str,
        code: &str,
        pkce: &PkceParams,
    ) -> AuthResult<TokenResponse> {
        let mut form = HashMap::new();
        form.insert("grant_type", "authorization_code");
        form.insert("client_id", &client.client_id);
        form.insert("redirect_uri", redirect_uri);
        form.insert("code", code);
        form.insert("code_verifier", &pkce.code_verifier);
        form.insert("resource", &self.server_url);

        let mut request = self
            .http
            .post(&metadata.token_endpoint)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json");
        if let Some(secret) = &client.client_secret {
            request = request.basic_auth(&client.client_id, Some(secret));
        }

        let response = request.form(&form).send().await?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchangeFailed(body));
        }
        Ok(response.json().await?)
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<StoredToken> {
        let metadata = self.server_metadata().await?;
        let client = self.ensure_client(&metadata).await?;

        let mut form = HashMap::new();
        form.insert("grant_type", "refresh_token");
        form.insert("refresh_token", refresh_token);
        form.insert("client_id", client.client_id.as_str());
        form.insert("resource", &self.server_url);

        let mut request = self
            .http
            .post(&metadata.token_endpoint)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json");
        if let Some(secret) = &client.client_secret {
            request = request.basic_auth(&client.client_id, Some(secret));
        }

        let response = request.form(&form).send().await?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchangeFailed(body));
        }
        let refreshed: TokenResponse = response.json().await?;
        let mut token = StoredToken::from_response(refreshed);
        // Servers may omit the refresh token on rotation; keep the old one.
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }

        self.storage
            .set(
                StorageKind::Token,
                &self.server_url,
                serde_json::to_value(&token)?,
            )
            .await?;
        Ok(token)
    }
}

/// Parse the server-expected redirect URI out of an `unauthorized_client`
/// error body of the form "You sent X and we expected Y".
fn expected_redirect_uri(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    if parsed.get("error")?.as_str()? != "unauthorized_client" {
        return None;
    }
    let description = parsed.get("error_description")?.as_str()?;
    let expected = description.split("and we expected ").nth(1)?;
    let expected = expected
        .trim()
        .trim_end_matches('.')
        .trim_matches('"')
        .trim();
    if expected.is_empty() {
        None
    } else {
        Some(expected.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn expected_redirect_uri_parsing() {
        let body = serde_json::json!({
            "error": "unauthorized_client",
            "error_description":
                "You sent http://localhost:8080/callback and we expected http://localhost:8765/cb"
        })
        .to_string();
        assert_eq!(
            expected_redirect_uri(&body).as_deref(),
            Some("http://localhost:8765/cb")
        );

        let other = serde_json::json!({
            "error": "invalid_grant",
            "error_description": "code expired"
        })
        .to_string();
        assert!(expected_redirect_uri(&other).is_none());
        assert!(expected_redirect_uri("not json").is_none());
    }

    #[tokio::test]
    async fn access_token_is_none_without_stored_token() {
        let session = OAuthSession::new(
            "https://mcp.example.com/",
            OAuthConfig::default(),
            Arc::new(MemoryStorage::new()),
        )
        .unwrap();
        assert_eq!(session.server_url(), "https://mcp.example.com");
        assert!(session.access_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn access_token_returns_live_token_without_network() {
        let storage = Arc::new(MemoryStorage::new());
        let session = OAuthSession::new(
            "https://mcp.example.com",
            OAuthConfig::default(),
            storage.clone(),
        )
        .unwrap();

        let token = StoredToken {
            access_token: "live-token".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: None,
            scope: None,
            expires_at: None,
        };
        storage
            .set(
                StorageKind::Token,
                session.server_url(),
                serde_json::to_value(&token).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            session.access_token().await.unwrap().as_deref(),
            Some("live-token")
        );
    }

    #[tokio::test]
    async fn complete_authorization_rejects_wrong_state() {
        let storage = Arc::new(MemoryStorage::new());
        let session = OAuthSession::new(
            "https://mcp.example.com",
            OAuthConfig::default(),
            storage.clone(),
        )
        .unwrap();

        storage
            .set(
                StorageKind::State,
                session.server_url(),
                Value::String("expected".to_string()),
            )
            .await
            .unwrap();

        let err = session
            .complete_authorization("code", "tampered")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::StateMismatch));
    }
}
