use axum::{
    Extension, Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use designvote_db::DesignRow;
use designvote_types::api::{Claims, DesignSummary, UploadDesignResponse};

use crate::auth::{AppState, run_unit_of_work};
use crate::error::{AppError, AppResult};

/// 10 MB upload limit for images
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

const MAX_CONTACT_LEN: usize = 100;

struct ImagePart {
    filename: String,
    content_type: String,
    data: Bytes,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::BadRequest(format!("malformed multipart body: {}", e.body_text()))
    }
}

/// POST /api/v1/designs: multipart with an `image` file part and an optional
/// `email` text part.
pub async fn upload_design(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<UploadDesignResponse>> {
    let mut multipart = multipart?;
    let mut image: Option<ImagePart> = None;
    let mut contact: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().unwrap_or("").to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                image = Some(ImagePart { filename, content_type, data });
            }
            Some("email") => {
                let text = field.text().await.map_err(multipart_error)?;
                let text = text.trim();
                if text.len() > MAX_CONTACT_LEN {
                    return Err(AppError::BadRequest("email is too long".into()));
                }
                contact = (!text.is_empty()).then(|| text.to_string());
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| AppError::BadRequest("missing image".into()))?;
    if image.data.is_empty() {
        return Err(AppError::BadRequest("empty image".into()));
    }
    if image.data.len() > MAX_IMAGE_SIZE {
        return Err(AppError::PayloadTooLarge);
    }
    if !image.content_type.starts_with("image/") {
        return Err(AppError::BadRequest("upload must be an image".into()));
    }

    let image_url = state
        .blobs
        .store(&image.filename, &image.content_type, &image.data)
        .await?;

    let design = DesignRow::new(&image_url, contact);
    let design_id = design.id.clone();

    if let Err(e) = run_unit_of_work(&state, move |uow| uow.insert_design(&design)).await {
        // Don't leave an orphaned blob behind
        if let Err(cleanup) = state.blobs.remove(&image_url).await {
            warn!("Failed to remove orphaned blob {}: {}", image_url, cleanup);
        }
        return Err(e);
    }

    info!("{} uploaded design {}", claims.username, design_id);

    let id: Uuid = design_id
        .parse()
        .map_err(|_| AppError::Internal(format!("corrupt design id '{}'", design_id)))?;
    Ok(Json(UploadDesignResponse {
        message: "Design uploaded successfully".into(),
        id,
    }))
}

/// GET /api/v1/designs: every design, unpaginated.
pub async fn list_designs(State(state): State<AppState>) -> AppResult<Json<Vec<DesignSummary>>> {
    let rows = run_unit_of_work(&state, |uow| uow.list_designs()).await?;

    let designs = rows
        .into_iter()
        .filter_map(|row| match row.id.parse::<Uuid>() {
            Ok(id) => Some(DesignSummary {
                id,
                image_url: row.image_url,
                votes: row.votes,
            }),
            Err(e) => {
                warn!("Skipping design with corrupt id '{}': {}", row.id, e);
                None
            }
        })
        .collect();

    Ok(Json(designs))
}
