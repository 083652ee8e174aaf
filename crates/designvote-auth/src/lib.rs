//! Session/auth gate: bearer tokens, password hashing and anonymous
//! account provisioning.

pub mod anonymous;
pub mod password;
pub mod token;

use designvote_db::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("generated username already taken")]
    DuplicateUsername,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub use anonymous::{AnonymousAccount, Credentials, create_anonymous_account, generate_credentials};
pub use password::{hash_password, verify_password};
pub use token::{SESSION_TTL_DAYS, issue_token, session_token, validate_token};
