use base64::Engine;
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use sha2::Digest;

/// PKCE parameters for OAuth 2.1 (RFC 7636, method S256).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PkceParams {
    pub code_verifier: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
}

/// Generate a fresh PKCE pair.
///
/// The verifier is 64 characters, comfortably inside the 43-128 range
/// RFC 7636 allows, and alphanumerics are a subset of the unreserved set.
pub fn generate_pkce_params() -> PkceParams {
    let code_verifier = Alphanumeric.sample_string(&mut rand::rng(), 64);
    let digest = sha2::Sha256::digest(code_verifier.as_bytes());
    let code_challenge = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest);

    PkceParams {
        code_verifier,
        code_challenge,
        code_challenge_method: "S256".to_string(),
    }
}

/// Generate an opaque `state` parameter for CSRF protection.
pub fn generate_state() -> String {
    Alphanumeric.sample_string(&mut rand::rng(), 32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use sha2::Digest;

    #[test]
    fn verifier_is_within_rfc_bounds() {
        let params = generate_pkce_params();
        assert!(params.code_verifier.len() >= 43);
        assert!(params.code_verifier.len() <= 128);
        assert_eq!(params.code_challenge_method, "S256");
    }

    #[test]
    fn challenge_is_s256_of_verifier() {
        let params = generate_pkce_params();
        let expected = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(sha2::Sha256::digest(params.code_verifier.as_bytes()));
        assert_eq!(params.code_challenge, expected);
        // base64url, no padding
        assert!(!params.code_challenge.contains('='));
        assert!(!params.code_challenge.contains('+'));
        assert!(!params.code_challenge.contains('/'));
    }

    #[test]
    fn pkce_and_state_are_unique_per_call() {
        assert_ne!(
            generate_pkce_params().code_verifier,
            generate_pkce_params().code_verifier
        );
        let state = generate_state();
        assert_ne!(state, generate_state());
        assert_eq!(state.len(), 32);
    }
}
