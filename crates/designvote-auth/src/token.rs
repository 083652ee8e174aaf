use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use designvote_types::api::Claims;

use crate::AuthError;

/// Lifetime of tokens handed out by register/login.
pub const SESSION_TTL_DAYS: i64 = 30;

/// Sign a token for `user_id`. `ttl = None` produces a token without an
/// `exp` claim, which never expires.
pub fn issue_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
    ttl: Option<Duration>,
) -> Result<String, AuthError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: ttl.map(|ttl| (Utc::now() + ttl).timestamp().max(0) as usize),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Token for an explicitly registered account.
pub fn session_token(secret: &str, user_id: Uuid, username: &str) -> Result<String, AuthError> {
    issue_token(secret, user_id, username, Some(Duration::days(SESSION_TTL_DAYS)))
}

/// Verify signature and, when the token carries one, expiry.
pub fn validate_token(secret: &str, token: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // exp is optional: anonymous tokens don't carry one
    validation.required_spec_claims.clear();

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}
