//! PKCE (Proof Key for Code Exchange) verification
//!
//! Implements RFC 7636 challenge verification for the `plain` and `S256`
//! methods. Verifiers are looked up by method name through a
//! [`CodeChallengeVerifierRegistry`], which hosts may extend.
//!
//! # Example
//!
//! ```
//! use oauth_server::oauth::pkce::{CodeChallengeVerifierRegistry, s256_challenge};
//!
//! let registry = CodeChallengeVerifierRegistry::default();
//! let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
//! let challenge = s256_challenge(verifier);
//!
//! let s256 = registry.get("S256").unwrap();
//! assert!(s256.verify_code_challenge(verifier, &challenge));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

static CODE_CHALLENGE_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Za-z0-9\-._~]{43,128}$").expect("Invalid code challenge regex")
});

/// Returns `true` if `challenge` is 43-128 unreserved URI characters.
#[must_use]
pub fn is_valid_code_challenge(challenge: &str) -> bool {
    CODE_CHALLENGE_REGEX.is_match(challenge)
}

/// Computes the S256 challenge for `verifier`: `BASE64URL(SHA256(verifier))`.
#[must_use]
pub fn s256_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

// =============================================================================
// Verifiers
// =============================================================================

/// Checks a code verifier against a stored code challenge.
pub trait CodeChallengeVerifier: Send + Sync {
    /// Method name as sent in `code_challenge_method`.
    fn method(&self) -> &'static str;

    /// Returns `true` if `code_verifier` matches `code_challenge`.
    fn verify_code_challenge(&self, code_verifier: &str, code_challenge: &str) -> bool;
}

/// The `plain` method: the challenge is the verifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainVerifier;

impl CodeChallengeVerifier for PlainVerifier {
    fn method(&self) -> &'static str {
        "plain"
    }

    fn verify_code_challenge(&self, code_verifier: &str, code_challenge: &str) -> bool {
        constant_time_eq(code_verifier, code_challenge)
    }
}

/// The `S256` method.
#[derive(Debug, Clone, Copy, Default)]
pub struct S256Verifier;

impl CodeChallengeVerifier for S256Verifier {
    fn method(&self) -> &'static str {
        "S256"
    }

    fn verify_code_challenge(&self, code_verifier: &str, code_challenge: &str) -> bool {
        constant_time_eq(&s256_challenge(code_verifier), code_challenge)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Maps method names to verifiers.
///
/// The default registry knows `plain` and `S256`.
#[derive(Clone)]
pub struct CodeChallengeVerifierRegistry {
    verifiers: HashMap<String, Arc<dyn CodeChallengeVerifier>>,
}

impl CodeChallengeVerifierRegistry {
    /// Creates a registry with no verifiers.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            verifiers: HashMap::new(),
        }
    }

    /// Registers `verifier` under its method name, replacing any previous one.
    pub fn register(&mut self, verifier: Arc<dyn CodeChallengeVerifier>) {
        self.verifiers
            .insert(verifier.method().to_string(), verifier);
    }

    /// Looks up the verifier for `method`.
    #[must_use]
    pub fn get(&self, method: &str) -> Option<Arc<dyn CodeChallengeVerifier>> {
        self.verifiers.get(method).cloned()
    }

    /// Returns `true` if `method` is registered.
    #[must_use]
    pub fn supports(&self, method: &str) -> bool {
        self.verifiers.contains_key(method)
    }

    /// Registered method names, sorted.
    #[must_use]
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.verifiers.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }
}

impl Default for CodeChallengeVerifierRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(PlainVerifier));
        registry.register(Arc::new(S256Verifier));
        registry
    }
}

impl std::fmt::Debug for CodeChallengeVerifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeChallengeVerifierRegistry")
            .field("methods", &self.methods())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 7636 Appendix B
    const RFC_VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    const RFC_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

    fn mutate(s: &str, idx: usize) -> String {
        let mut bytes = s.as_bytes().to_vec();
        bytes[idx] = if bytes[idx] == b'A' { b'B' } else { b'A' };
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_rfc7636_vector() {
        assert_eq!(s256_challenge(RFC_VERIFIER), RFC_CHALLENGE);
        assert!(S256Verifier.verify_code_challenge(RFC_VERIFIER, RFC_CHALLENGE));
    }

    #[test]
    fn test_s256_rejects_single_byte_mutations() {
        for idx in 0..RFC_VERIFIER.len() {
            assert!(!S256Verifier.verify_code_challenge(&mutate(RFC_VERIFIER, idx), RFC_CHALLENGE));
        }
        for idx in 0..RFC_CHALLENGE.len() {
            assert!(!S256Verifier.verify_code_challenge(RFC_VERIFIER, &mutate(RFC_CHALLENGE, idx)));
        }
    }

    #[test]
    fn test_plain() {
        assert!(PlainVerifier.verify_code_challenge(RFC_VERIFIER, RFC_VERIFIER));
        for idx in 0..RFC_VERIFIER.len() {
            assert!(!PlainVerifier.verify_code_challenge(RFC_VERIFIER, &mutate(RFC_VERIFIER, idx)));
        }
        assert!(!PlainVerifier.verify_code_challenge(RFC_VERIFIER, RFC_CHALLENGE));
        assert!(!PlainVerifier.verify_code_challenge("abc", "abcd"));
    }

    #[test]
    fn test_default_registry() {
        let registry = CodeChallengeVerifierRegistry::default();
        assert_eq!(registry.methods(), vec!["S256", "plain"]);
        assert_eq!(registry.get("S256").unwrap().method(), "S256");
        assert_eq!(registry.get("plain").unwrap().method(), "plain");
        assert!(registry.get("s256").is_none());
        assert!(!registry.supports("S512"));
    }

    #[test]
    fn test_register_custom_verifier() {
        struct Reversed;
        impl CodeChallengeVerifier for Reversed {
            fn method(&self) -> &'static str {
                "reversed"
            }
            fn verify_code_challenge(&self, verifier: &str, challenge: &str) -> bool {
                verifier.chars().rev().collect::<String>() == challenge
            }
        }

        let mut registry = CodeChallengeVerifierRegistry::empty();
        registry.register(Arc::new(Reversed));
        assert!(registry.get("reversed").unwrap().verify_code_challenge("abc", "cba"));
        assert!(registry.get("plain").is_none());
    }

    #[test]
    fn test_code_challenge_format() {
        assert!(is_valid_code_challenge(RFC_CHALLENGE));
        assert!(is_valid_code_challenge(&"a".repeat(128)));
        assert!(is_valid_code_challenge("abc-._~ABC012345678901234567890123456789012"));
        assert!(!is_valid_code_challenge(&"a".repeat(42)));
        assert!(!is_valid_code_challenge(&"a".repeat(129)));
        assert!(!is_valid_code_challenge(&format!("{}+", "a".repeat(43))));
    }
}
