use axum::{
    Extension, Json,
    extract::State,
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use designvote_db::{CommentRow, PageRequest};
use designvote_types::api::{
    Claims, CommentPage, CommentView, Data, PostCommentRequest, PostCommentResponse, ReplyPage,
};

use crate::auth::{AppState, run_unit_of_work};
use crate::error::{AppError, AppResult};
use crate::extract::{ApiJson, ApiQuery};

pub const MAX_COMMENT_LEN: usize = 1024;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct CommentQuery {
    pub design_id: Uuid,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Deserialize)]
pub struct ReplyQuery {
    pub comment_id: Uuid,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

fn page_request(page: u32, page_size: u32) -> AppResult<PageRequest> {
    if page == 0 {
        return Err(AppError::BadRequest("page starts at 1".into()));
    }
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(AppError::BadRequest(format!("page_size must be 1-{}", MAX_PAGE_SIZE)));
    }
    Ok(PageRequest::new(page, page_size))
}

/// POST /api/v1/comments: top-level comment, or a reply when `parent_id` is
/// set. The author is whoever holds the token.
pub async fn post_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<PostCommentRequest>,
) -> AppResult<Json<PostCommentResponse>> {
    let body = req.comment.trim();
    if body.is_empty() {
        return Err(AppError::BadRequest("comment is empty".into()));
    }
    if body.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::BadRequest(format!(
            "comment exceeds {} characters",
            MAX_COMMENT_LEN
        )));
    }

    let comment = CommentRow::new(
        req.design_id.to_string(),
        claims.sub.to_string(),
        body,
        req.parent_id.map(|id| id.to_string()),
    );

    run_unit_of_work(&state, move |uow| {
        if uow.get_user(&comment.user_id)?.is_none() {
            return Err(designvote_db::StoreError::NotFound("user"));
        }
        uow.insert_comment(&comment)
    })
    .await
    .map_err(|e| match e {
        // token outlived its account
        AppError::NotFound("user") => AppError::Unauthorized,
        other => other,
    })?;

    Ok(Json(PostCommentResponse { success: 1 }))
}

/// GET /api/v1/comments: a page of top-level comments, newest first.
pub async fn list_comments(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CommentQuery>,
) -> AppResult<Json<Data<CommentPage>>> {
    let page = page_request(query.page, query.page_size)?;
    let design_id = query.design_id.to_string();

    let result = run_unit_of_work(&state, move |uow| uow.get_comments(&design_id, page)).await?;

    Ok(Json(Data {
        data: CommentPage {
            comments: result.items.into_iter().map(comment_view).collect(),
            total_comments: result.total,
            current_page: result.page,
            page_size: result.page_size,
            has_more_comments: result.has_more,
        },
    }))
}

/// GET /api/v1/replies: a page of replies to one comment, newest first.
pub async fn list_replies(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ReplyQuery>,
) -> AppResult<Json<Data<ReplyPage>>> {
    let page = page_request(query.page, query.page_size)?;
    let comment_id = query.comment_id.to_string();

    let result =
        run_unit_of_work(&state, move |uow| uow.get_paginated_replies(&comment_id, page)).await?;

    Ok(Json(Data {
        data: ReplyPage {
            replies: result.items.into_iter().map(comment_view).collect(),
            total_replies: result.total,
            current_page: result.page,
            page_size: result.page_size,
            has_more_replies: result.has_more,
        },
    }))
}

fn comment_view(row: CommentRow) -> CommentView {
    let parse = |field: &str, value: &str| {
        value.parse::<Uuid>().unwrap_or_else(|e| {
            warn!("Corrupt {} '{}' on comment '{}': {}", field, value, row.id, e);
            Uuid::default()
        })
    };

    CommentView {
        id: parse("id", &row.id),
        design_id: parse("design_id", &row.design_id),
        user_id: parse("user_id", &row.user_id),
        parent_id: row.parent_id.as_deref().map(|p| parse("parent_id", p)),
        created_at: row
            .created_at
            .parse::<chrono::DateTime<chrono::Utc>>()
            .unwrap_or_else(|e| {
                warn!("Corrupt created_at '{}' on comment '{}': {}", row.created_at, row.id, e);
                chrono::DateTime::default()
            }),
        comment: row.body.clone(),
        likes: row.likes,
    }
}
