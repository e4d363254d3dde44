//! Authorization server discovery (RFC 8414, RFC 9728).
//!
//! The ladder, starting from the origin of the MCP server URL:
//!
//! 1. `GET /.well-known/oauth-authorization-server` — the server is its own
//!    authorization server.
//! 2. Otherwise `GET /.well-known/oauth-protected-resource`, then follow
//!    `authorization_servers[0]` to its authorization-server metadata.
//! 3. A `WWW-Authenticate: Bearer resource="…"` header from any protected
//!    request short-circuits step 2 by naming the metadata URL directly.

use crate::error::{AuthError, AuthResult};
use crate::types::{AuthorizationServerMetadata, ProtectedResourceMetadata};
use url::Url;

const AS_WELL_KNOWN: &str = "/.well-known/oauth-authorization-server";
const PR_WELL_KNOWN: &str = "/.well-known/oauth-protected-resource";

fn origin_of(server_url: &str) -> AuthResult<String> {
    let url = Url::parse(server_url)?;
    let origin = url.origin().ascii_serialization();
    Ok(origin)
}

pub async fn fetch_authorization_server_metadata(
    http: &reqwest::Client,
    issuer: &str,
) -> AuthResult<AuthorizationServerMetadata> {
    let url = format!("{}{}", issuer.trim_end_matches('/'), AS_WELL_KNOWN);
    let response = http
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(AuthError::DiscoveryFailed(format!(
            "{url} returned {}",
            response.status()
        )));
    }
    Ok(response.json().await?)
}

pub async fn fetch_protected_resource_metadata(
    http: &reqwest::Client,
    metadata_url: &str,
) -> AuthResult<ProtectedResourceMetadata> {
    let response = http
        .get(metadata_url)
        .header("Accept", "application/json")
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(AuthError::DiscoveryFailed(format!(
            "{metadata_url} returned {}",
            response.status()
        )));
    }
    Ok(response.json().await?)
}

/// Run the discovery ladder for an MCP server URL.
///
/// `resource_metadata_url` is the value extracted from a
/// `WWW-Authenticate` challenge, when one was seen.
pub async fn discover(
    http: &reqwest::Client,
    server_url: &str,
    resource_metadata_url: Option<&str>,
) -> AuthResult<AuthorizationServerMetadata> {
    let origin = origin_of(server_url)?;

    if let Some(metadata_url) = resource_metadata_url {
        let resource = fetch_protected_resource_metadata(http, metadata_url).await?;
        return authorization_server_from_resource(http, &resource).await;
    }

    match fetch_authorization_server_metadata(http, &origin).await {
        Ok(metadata) => Ok(metadata),
        Err(first_err) => {
            tracing::debug!(%origin, error = %first_err, "server is not its own authorization server, trying protected-resource metadata");
            let pr_url = format!("{origin}{PR_WELL_KNOWN}");
            let resource = fetch_protected_resource_metadata(http, &pr_url)
                .await
                .map_err(|e| {
                    AuthError::DiscoveryFailed(format!(
                        "no authorization-server metadata at {origin} ({first_err}) and no protected-resource metadata ({e})"
                    ))
                })?;
            authorization_server_from_resource(http, &resource).await
        }
    }
}

async fn authorization_server_from_resource(
    http: &reqwest::Client,
    resource: &ProtectedResourceMetadata,
) -> AuthResult<AuthorizationServerMetadata> {
    let issuer = resource.authorization_servers.first().ok_or_else(|| {
        AuthError::DiscoveryFailed(
            "protected-resource metadata lists no authorization servers".to_string(),
        )
    })?;
    fetch_authorization_server_metadata(http, issuer).await
}

/// Extract `resource="…"` from a `WWW-Authenticate: Bearer …` header.
pub fn parse_www_authenticate_resource(header: &str) -> Option<String> {
    let rest = header.trim().strip_prefix("Bearer")?.trim();
    for part in rest.split(',') {
        let part = part.trim();
        if let Some(value) = part
            .strip_prefix("resource_metadata=")
            .or_else(|| part.strip_prefix("resource="))
        {
            return Some(value.trim_matches('"').to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_strips_path() {
        assert_eq!(
            origin_of("https://mcp.example.com/v1/mcp").unwrap(),
            "https://mcp.example.com"
        );
    }

    #[test]
    fn www_authenticate_resource_extraction() {
        assert_eq!(
            parse_www_authenticate_resource(
                r#"Bearer realm="mcp", resource_metadata="https://mcp.example.com/.well-known/oauth-protected-resource""#
            )
            .as_deref(),
            Some("https://mcp.example.com/.well-known/oauth-protected-resource")
        );
        assert_eq!(
            parse_www_authenticate_resource(r#"Bearer resource="https://x.example""#).as_deref(),
            Some("https://x.example")
        );
        assert!(parse_www_authenticate_resource("Basic realm=x").is_none());
        assert!(parse_www_authenticate_resource("Bearer realm=x").is_none());
    }
}
