//! # Conduit MCP Auth
//!
//! OAuth 2.1 client support for remote MCP transports: RFC 8414 / RFC 9728
//! discovery, RFC 7591 dynamic client registration, RFC 7636 PKCE (S256),
//! token refresh with an expires-soon window, and pluggable storage keyed by
//! the canonical server URL.
//!
//! The transport crate drives an [`OAuthSession`] per remote server: it asks
//! for [`OAuthSession::access_token`] before each request and calls
//! [`OAuthSession::handle_unauthorized`] on a first 401 to kick off
//! discovery. The embedder owns the browser hand-off between
//! [`OAuthSession::begin_authorization`] and
//! [`OAuthSession::complete_authorization`].

pub mod canonical;
pub mod discovery;
pub mod error;
pub mod pkce;
pub mod session;
pub mod storage;
pub mod types;

pub use canonical::canonicalize_server_url;
pub use error::{AuthError, AuthResult};
pub use pkce::{generate_pkce_params, generate_state, PkceParams};
pub use session::{AuthorizationRequest, OAuthSession};
pub use storage::{MemoryStorage, OAuthStorage, StorageKind};
pub use types::{
    AuthorizationServerMetadata, ClientRegistrationRequest, ClientRegistrationResponse,
    OAuthConfig, ProtectedResourceMetadata, StoredToken, TokenResponse,
};
