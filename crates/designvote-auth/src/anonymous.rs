use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use designvote_db::{Database, StoreError, UserRow};

use crate::AuthError;
use crate::password::hash_password;
use crate::token::issue_token;

const USERNAME_PREFIX: &str = "user_";
const USERNAME_SUFFIX_LEN: usize = 8;
const PASSWORD_LEN: usize = 12;

/// Regenerations allowed before a name collision is reported.
pub const MAX_NAME_ATTEMPTS: usize = 3;

const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// A freshly provisioned anonymous account. `password` is plaintext and is
/// never recoverable after this value is dropped.
#[derive(Debug)]
pub struct AnonymousAccount {
    pub user_id: Uuid,
    pub username: String,
    pub password: String,
    pub access_token: String,
}

fn random_string(rng: &mut impl Rng, charset: &[u8], len: usize) -> String {
    (0..len)
        .map(|_| charset[rng.random_range(0..charset.len())] as char)
        .collect()
}

/// Random `user_xxxxxxxx` name plus a 12 character password.
pub fn generate_credentials() -> Credentials {
    let mut rng = rand::rng();
    Credentials {
        username: format!(
            "{}{}",
            USERNAME_PREFIX,
            random_string(&mut rng, SUFFIX_CHARSET, USERNAME_SUFFIX_LEN)
        ),
        password: random_string(&mut rng, PASSWORD_CHARSET, PASSWORD_LEN),
    }
}

/// Provision an anonymous account with a non-expiring token.
///
/// Names come from `generate`; a collision triggers a regeneration, and after
/// [`MAX_NAME_ATTEMPTS`] collisions the call fails with
/// [`AuthError::DuplicateUsername`] having written nothing.
pub fn create_anonymous_account(
    db: &Database,
    jwt_secret: &str,
    mut generate: impl FnMut() -> Credentials,
) -> Result<AnonymousAccount, AuthError> {
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let creds = generate();
        let user = UserRow::new(&creds.username, hash_password(&creds.password)?);

        let inserted = db.unit_of_work(|uow| {
            if uow.get_user_by_username(&user.username)?.is_some() {
                return Err(StoreError::Conflict("username"));
            }
            uow.insert_user(&user)
        });

        match inserted {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                warn!("Anonymous username {} taken (attempt {})", creds.username, attempt);
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        let user_id: Uuid = user
            .id
            .parse()
            .map_err(|_| StoreError::Invalid(format!("non-uuid user id {}", user.id)))?;
        let access_token = issue_token(jwt_secret, user_id, &creds.username, None)?;

        info!("Created anonymous account {} ({})", creds.username, user_id);
        return Ok(AnonymousAccount {
            user_id,
            username: creds.username,
            password: creds.password,
            access_token,
        });
    }

    Err(AuthError::DuplicateUsername)
}
