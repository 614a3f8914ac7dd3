//! Token authentication
//!
//! Provides:
//! - SHA-256 hashed bearer tokens mapped to usernames
//! - Token generation, validation, and revocation
//! - Constant-time token comparison
//! - The [`IdentityVerifier`] seam used by terminal sessions

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Username reported when authentication is disabled
pub const ANONYMOUS_USER: &str = "anonymous";

/// Prefix of generated tokens
pub const TOKEN_PREFIX: &str = "termgate_";

// ============================================================================
// Error Types
// ============================================================================

/// Authentication errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credentials provided
    #[error("Authentication required")]
    MissingCredentials,

    /// Invalid token
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Token has been revoked
    #[error("Token revoked")]
    TokenRevoked,

    /// Token hash in configuration is malformed
    #[error("Invalid token hash: {0}")]
    InvalidHash(String),

    /// Internal error
    #[error("Auth internal error: {0}")]
    Internal(String),
}

/// Auth result type
pub type Result<T> = std::result::Result<T, AuthError>;

// ============================================================================
// Identity
// ============================================================================

/// A verified caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Identity {
    /// Username the credential belongs to
    pub username: String,
}

impl Identity {
    /// Create an identity
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    /// Identity used when authentication is disabled
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS_USER)
    }
}

/// Turns a presented credential into a verified identity
pub trait IdentityVerifier: Send + Sync {
    /// Verify the credential, if any was presented
    fn verify(&self, credential: Option<&str>) -> Result<Identity>;
}

// ============================================================================
// Auth Store
// ============================================================================

#[derive(Debug, Clone)]
struct StoredToken {
    /// SHA-256 hash of the token (the raw token is never stored)
    token_hash: [u8; 32],
    username: String,
    label: String,
    created_at: DateTime<Utc>,
    revoked: bool,
}

/// Non-sensitive token information for listing
#[derive(Debug, Clone, Serialize)]
pub struct TokenInfo {
    /// Hex hash of the token
    pub token_hash: String,
    /// Owner
    pub username: String,
    /// Human-readable label
    pub label: String,
    /// Registration time
    pub created_at: DateTime<Utc>,
    /// Whether revoked
    pub revoked: bool,
}

/// Token storage and validation
pub struct AuthStore {
    /// token_hash_hex → StoredToken
    tokens: RwLock<HashMap<String, StoredToken>>,
    enabled: bool,
}

impl AuthStore {
    /// Create a new auth store
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            enabled,
        }
    }

    /// Check if authentication is enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn hash_token(token: &str) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hasher.finalize().into()
    }

    fn hash_to_hex(hash: &[u8; 32]) -> String {
        hash.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn hex_to_hash(hex: &str) -> Result<[u8; 32]> {
        let hex = hex.trim();
        if hex.len() != 64 || !hex.is_ascii() {
            return Err(AuthError::InvalidHash(format!(
                "expected 64 hex characters, got {}",
                hex.len()
            )));
        }
        let mut hash = [0u8; 32];
        for (i, byte) in hash.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|e| AuthError::InvalidHash(e.to_string()))?;
        }
        Ok(hash)
    }

    /// Hex SHA-256 digest of a raw token, as stored in configuration
    #[must_use]
    pub fn token_digest(token: &str) -> String {
        Self::hash_to_hex(&Self::hash_token(token))
    }

    /// Generate a new token for a user
    ///
    /// Returns the raw token (only shown once) and its hex hash.
    pub fn generate_token(&self, username: &str, label: &str) -> Result<(String, String)> {
        let raw_token = format!("{}{}", TOKEN_PREFIX, Uuid::new_v4().as_simple());
        let token_hash_hex = Self::token_digest(&raw_token);
        self.register_hashed(username, &token_hash_hex, label)?;

        info!(
            user = %username,
            label = %label,
            token_prefix = %&raw_token[..TOKEN_PREFIX.len() + 4],
            "Token generated"
        );
        Ok((raw_token, token_hash_hex))
    }

    /// Register a token by its hex SHA-256 hash
    pub fn register_hashed(&self, username: &str, token_hash_hex: &str, label: &str) -> Result<()> {
        let token_hash = Self::hex_to_hash(token_hash_hex)?;
        let key = Self::hash_to_hex(&token_hash);

        let mut tokens = self
            .tokens
            .write()
            .map_err(|e| AuthError::Internal(format!("Lock poisoned: {}", e)))?;
        tokens.insert(
            key,
            StoredToken {
                token_hash,
                username: username.to_string(),
                label: label.to_string(),
                created_at: Utc::now(),
                revoked: false,
            },
        );
        Ok(())
    }

    /// Validate a raw token and return the identity it belongs to
    pub fn validate_token(&self, token: &str) -> Result<Identity> {
        if !self.enabled {
            return Ok(Identity::anonymous());
        }

        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let token_hash = Self::hash_token(token);
        let tokens = self
            .tokens
            .read()
            .map_err(|e| AuthError::Internal(format!("Lock poisoned: {}", e)))?;

        let Some(stored) = tokens.get(&Self::hash_to_hex(&token_hash)) else {
            warn!("Invalid token attempt");
            return Err(AuthError::InvalidCredentials);
        };

        let hashes_match: bool = stored.token_hash.ct_eq(&token_hash).into();
        if !hashes_match {
            return Err(AuthError::InvalidCredentials);
        }
        if stored.revoked {
            return Err(AuthError::TokenRevoked);
        }

        debug!(user = %stored.username, label = %stored.label, "Token validated");
        Ok(Identity::new(stored.username.clone()))
    }

    /// Revoke a token by its hex hash
    pub fn revoke(&self, token_hash_hex: &str) -> Result<()> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|e| AuthError::Internal(format!("Lock poisoned: {}", e)))?;

        let stored = tokens
            .get_mut(&token_hash_hex.trim().to_ascii_lowercase())
            .ok_or(AuthError::InvalidCredentials)?;
        stored.revoked = true;
        info!(user = %stored.username, label = %stored.label, "Token revoked");
        Ok(())
    }

    /// List all tokens (non-sensitive info only)
    pub fn list_tokens(&self) -> Result<Vec<TokenInfo>> {
        let tokens = self
            .tokens
            .read()
            .map_err(|e| AuthError::Internal(format!("Lock poisoned: {}", e)))?;

        Ok(tokens
            .iter()
            .map(|(hash_hex, stored)| TokenInfo {
                token_hash: hash_hex.clone(),
                username: stored.username.clone(),
                label: stored.label.clone(),
                created_at: stored.created_at,
                revoked: stored.revoked,
            })
            .collect())
    }

    /// Number of non-revoked tokens
    #[must_use]
    pub fn active_token_count(&self) -> usize {
        self.tokens
            .read()
            .map(|tokens| tokens.values().filter(|t| !t.revoked).count())
            .unwrap_or(0)
    }
}

impl IdentityVerifier for AuthStore {
    fn verify(&self, credential: Option<&str>) -> Result<Identity> {
        if !self.enabled {
            return Ok(Identity::anonymous());
        }
        match credential {
            Some(token) => self.validate_token(token),
            None => Err(AuthError::MissingCredentials),
        }
    }
}

#[cfg(test)]
mod tests;
