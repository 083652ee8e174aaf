use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info};
use uuid::Uuid;

use designvote_auth::{
    AuthError, create_anonymous_account, generate_credentials, hash_password, session_token,
    verify_password,
};
use designvote_db::{Database, StoreError, UnitOfWork, UserRow};
use designvote_types::api::{LoginRequest, RegisterRequest, SessionResponse, TempUserResponse};

use crate::blob::BlobStore;
use crate::error::{AppError, AppResult};
use crate::extract::ApiJson;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub blobs: Arc<dyn BlobStore>,
}

/// Run `f` in its own unit of work on the blocking pool.
pub async fn run_unit_of_work<F, T>(state: &AppState, f: F) -> AppResult<T>
where
    F: FnOnce(&UnitOfWork<'_>) -> designvote_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    let result = tokio::task::spawn_blocking(move || state.db.unit_of_work(f))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            AppError::from(e)
        })?;
    Ok(result?)
}

/// GET /api/v1/reg_temp_user: provision an anonymous account.
pub async fn reg_temp_user(State(state): State<AppState>) -> AppResult<Json<TempUserResponse>> {
    let db = state.clone();
    let account = tokio::task::spawn_blocking(move || {
        create_anonymous_account(&db.db, &db.jwt_secret, generate_credentials)
    })
    .await?
    .map_err(temp_user_error)?;

    Ok(Json(TempUserResponse {
        access_token: account.access_token,
        username: account.username,
        password: account.password,
        visited: 1,
    }))
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    // Validate input
    let name_len = req.username.chars().count();
    if !(3..=32).contains(&name_len) {
        return Err(AppError::BadRequest("username must be 3-32 characters".into()));
    }
    if req.password.chars().count() < 8 {
        return Err(AppError::BadRequest("password must be at least 8 characters".into()));
    }

    let db = state.clone();
    let (user_id, username) = tokio::task::spawn_blocking(move || {
        let user = UserRow::new(&req.username, hash_password(&req.password)?);
        db.db.unit_of_work(|uow| {
            if uow.get_user_by_username(&user.username)?.is_some() {
                return Err(StoreError::Conflict("username"));
            }
            uow.insert_user(&user)
        })?;
        Ok::<_, AuthError>((user.id, user.username))
    })
    .await??;

    let user_id = parse_user_id(&user_id)?;
    let access_token = session_token(&state.jwt_secret, user_id, &username)?;

    info!("Registered {} ({})", username, user_id);
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user_id,
            username,
            access_token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Json<SessionResponse>> {
    let db = state.clone();
    let user = tokio::task::spawn_blocking(move || {
        let user = db
            .db
            .unit_of_work(|uow| uow.get_user_by_username(&req.username))?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(&req.password, &user.password)?;
        Ok::<_, AuthError>(user)
    })
    .await??;

    let user_id = parse_user_id(&user.id)?;
    let access_token = session_token(&state.jwt_secret, user_id, &user.username)?;

    Ok(Json(SessionResponse {
        user_id,
        username: user.username,
        access_token,
    }))
}

/// Running out of fresh anonymous names is the client's cue to retry, not
/// a conflict with an account they asked for.
fn temp_user_error(err: AuthError) -> AppError {
    match err {
        AuthError::DuplicateUsername => AppError::BadRequest("Username already exists".into()),
        other => other.into(),
    }
}

fn parse_user_id(id: &str) -> AppResult<Uuid> {
    id.parse()
        .map_err(|_| AppError::Internal(format!("corrupt user id '{}'", id)))
}
