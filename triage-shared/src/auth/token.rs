/// One-time token generation and hashing
///
/// Invite and password-reset tokens are 40 random alphanumeric characters
/// behind a kind-specific prefix. Only the SHA-256 hex digest is persisted.
///
/// # Example
///
/// ```
/// use triage_shared::auth::token::{generate_token, hash_token};
/// use triage_shared::models::auth_token::AuthTokenKind;
///
/// let (token, hash) = generate_token(AuthTokenKind::Invite);
/// assert!(token.starts_with("inv_"));
/// assert_eq!(hash_token(&token), hash);
/// ```

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::models::auth_token::AuthTokenKind;

const TOKEN_RANDOM_LENGTH: usize = 40;

fn prefix(kind: AuthTokenKind) -> &'static str {
    match kind {
        AuthTokenKind::Invite => "inv_",
        AuthTokenKind::PasswordReset => "rst_",
    }
}

/// Generates a token and its hash
///
/// Returns `(token, hash)`. Hand the token to the user once and store only
/// the hash.
pub fn generate_token(kind: AuthTokenKind) -> (String, String) {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();

    let random: String = (0..TOKEN_RANDOM_LENGTH)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();

    let token = format!("{}{}", prefix(kind), random);
    let hash = hash_token(&token);

    (token, hash)
}

/// SHA-256 hex digest of a token
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_shape() {
        let (token, hash) = generate_token(AuthTokenKind::PasswordReset);

        assert!(token.starts_with("rst_"));
        assert_eq!(token.len(), 4 + TOKEN_RANDOM_LENGTH);
        assert!(token[4..].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_generate_token_unique() {
        let (a, _) = generate_token(AuthTokenKind::Invite);
        let (b, _) = generate_token(AuthTokenKind::Invite);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_token_known_vector() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
