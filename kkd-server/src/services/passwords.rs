//! Password hashing
//!
//! bcrypt runs on the blocking pool so hashing never stalls the runtime.

use crate::error::{ApiError, ApiResult};
use tracing::warn;

/// bcrypt work factor
pub const HASH_COST: u32 = bcrypt::DEFAULT_COST;

/// Hash a plaintext password
pub async fn hash_password(plain: &str) -> ApiResult<String> {
    let plain = plain.to_owned();
    tokio::task::spawn_blocking(move || bcrypt::hash(plain, HASH_COST))
        .await
        .map_err(|e| ApiError::Internal(format!("Hashing task failed: {}", e)))?
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))
}

/// Check a plaintext password against a stored hash
///
/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(plain: &str, hash: &str) -> ApiResult<bool> {
    let plain = plain.to_owned();
    let hash = hash.to_owned();
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Verification task failed: {}", e)))?;

    match verified {
        Ok(matches) => Ok(matches),
        Err(e) => {
            warn!("Stored password hash could not be verified: {}", e);
            Ok(false)
        }
    }
}
