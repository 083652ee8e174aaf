use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the realtime gateway.
/// Anonymous accounts carry no `exp` and never expire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<usize>,
}

// -- Accounts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned by both register and login.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub username: String,
    pub access_token: String,
}

/// Credentials of a freshly generated anonymous account. The plaintext
/// password is only ever returned here.
#[derive(Debug, Serialize, Deserialize)]
pub struct TempUserResponse {
    pub access_token: String,
    pub username: String,
    pub password: String,
    pub visited: u8,
}

// -- Designs --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignSummary {
    pub id: Uuid,
    pub image_url: String,
    pub votes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadDesignResponse {
    pub message: String,
    pub id: Uuid,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostCommentRequest {
    pub design_id: Uuid,
    pub comment: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostCommentResponse {
    pub success: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub design_id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub comment: String,
    pub likes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentPage {
    pub comments: Vec<CommentView>,
    pub total_comments: u64,
    pub current_page: u32,
    pub page_size: u32,
    pub has_more_comments: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyPage {
    pub replies: Vec<CommentView>,
    pub total_replies: u64,
    pub current_page: u32,
    pub page_size: u32,
    pub has_more_replies: bool,
}

/// `{"data": ...}` wrapper used by the listing endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct Data<T> {
    pub data: T,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
}
