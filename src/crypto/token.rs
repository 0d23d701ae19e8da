use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::parent::{ACCESS_CODE_ALPHABET, ACCESS_CODE_LEN};

/// The size of session and CSRF tokens in bytes.
const TOKEN_SIZE: usize = 32;

/// Generates an unguessable URL-safe token.
pub fn generate_token() -> Result<String> {
    let mut token = [0u8; TOKEN_SIZE];
    OsRng
        .try_fill_bytes(&mut token)
        .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))?;

    Ok(general_purpose::URL_SAFE_NO_PAD.encode(token))
}

/// The storage key form of a bearer token. The raw token is never persisted.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Generates a parent access code.
pub fn generate_access_code() -> Result<String> {
    let mut bytes = [0u8; ACCESS_CODE_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AppError::Internal(format!("Failed to generate access code: {}", e)))?;

    // The alphabet has 32 symbols, so the modulo is unbiased.
    Ok(bytes
        .iter()
        .map(|b| ACCESS_CODE_ALPHABET[*b as usize % ACCESS_CODE_ALPHABET.len()] as char)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parent::normalize_access_code;

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn digest_is_stable_hex() {
        let d = token_digest("abc");
        assert_eq!(d, token_digest("abc"));
        assert_eq!(d.len(), 64);
        assert_ne!(d, token_digest("abd"));
    }

    #[test]
    fn access_codes_round_trip_through_normalisation() {
        for _ in 0..100 {
            let code = generate_access_code().unwrap();
            assert_eq!(normalize_access_code(&code.to_lowercase()), Some(code));
        }
    }
}
