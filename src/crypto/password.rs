use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{AppError, Result};

/// Argon2id cost parameters used for new hashes.
///
/// Verification always uses the parameters encoded in the stored hash, so
/// changing these only affects hashes created afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Degree of parallelism.
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 3,
            parallelism: 6,
        }
    }
}

fn hash_blocking(secret: &str, cost: HashCost) -> Result<String> {
    let mut secret_bytes = secret.as_bytes().to_vec();

    let mut salt_bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|e| AppError::Internal(format!("Failed to generate salt: {}", e)))?;

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Credential(format!("Salt encoding error: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        ParamsBuilder::new()
            .m_cost(cost.memory_kib)
            .t_cost(cost.iterations)
            .p_cost(cost.parallelism)
            .build()
            .map_err(|e| AppError::Credential(format!("Argon2 params: {}", e)))?,
    );

    let hash = argon2
        .hash_password(&secret_bytes, &salt)
        .map_err(|e| AppError::Credential(format!("Argon2 hash error: {}", e)))?
        .to_string();

    secret_bytes.zeroize();
    Ok(hash)
}

fn verify_blocking(secret: &str, hash: &str) -> Result<bool> {
    let mut secret_bytes = secret.as_bytes().to_vec();
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Credential(format!("Hash parse error: {}", e)))?;
    let result = Argon2::default()
        .verify_password(&secret_bytes, &parsed_hash)
        .is_ok();

    secret_bytes.zeroize();
    Ok(result)
}

/// Hashes a password or PIN with Argon2id off the async runtime.
pub async fn hash_secret(secret: Zeroizing<String>, cost: HashCost) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_blocking(&secret, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
}

/// Checks a password or PIN against a stored Argon2 hash.
pub async fn verify_secret(secret: Zeroizing<String>, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_blocking(&secret, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?
}
