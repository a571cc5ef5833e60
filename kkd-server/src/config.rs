//! Configuration resolution for kkd-server
//!
//! Resolves the token signing secret with ENV → TOML → database priority.
//! When no source has one, a random secret is generated and persisted in the
//! settings table so issued tokens survive restarts.

use kkd_common::config::TomlConfig;
use kkd_common::db::{get_setting, set_setting};
use kkd_common::Result;
use rand::Rng;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Environment variable holding the token signing secret
pub const JWT_SECRET_ENV: &str = "KKD_JWT_SECRET";

/// Settings key for the persisted signing secret
pub const JWT_SECRET_SETTING: &str = "jwt_secret";

/// Resolve the token signing secret
///
/// **Priority:** ENV → TOML → database → generated
pub async fn resolve_jwt_secret(db: &SqlitePool, toml_config: &TomlConfig) -> Result<String> {
    let env_secret = std::env::var(JWT_SECRET_ENV)
        .ok()
        .filter(|s| is_valid_secret(s));
    let toml_secret = toml_config
        .auth
        .jwt_secret
        .clone()
        .filter(|s| is_valid_secret(s));

    if env_secret.is_some() && toml_secret.is_some() {
        warn!("JWT secret set in both environment and TOML config, using environment");
    }

    if let Some(secret) = env_secret {
        info!("JWT secret loaded from environment variable");
        return Ok(secret);
    }

    if let Some(secret) = toml_secret {
        info!("JWT secret loaded from TOML config");
        return Ok(secret);
    }

    if let Some(secret) = get_setting(db, JWT_SECRET_SETTING).await? {
        if is_valid_secret(&secret) {
            info!("JWT secret loaded from database");
            return Ok(secret);
        }
        warn!("Stored JWT secret is blank, generating a new one");
    }

    let secret = generate_secret();
    set_setting(db, JWT_SECRET_SETTING, &secret).await?;
    info!("Generated new JWT secret and stored it in the database");

    Ok(secret)
}

/// Non-empty, non-whitespace
pub fn is_valid_secret(secret: &str) -> bool {
    !secret.trim().is_empty()
}

/// 32 random bytes, hex encoded
fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
