use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use utoipa_axum::router::OpenApiRouter;
use uuid::Uuid;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    models::{CreateVideoEntity, VideoEntity},
    schema::videos,
};

const MAX_VIDEO_BYTES: usize = 100 * 1024 * 1024;
const ALLOWED_VIDEO_TYPES: [&str; 3] = ["video/mp4", "video/quicktime", "video/x-msvideo"];

/// FAQ videos: object-storage upload plus metadata listing.
pub fn routes_with_openapi() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().nest(
        "/videos",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_videos))
            .routes(utoipa_axum::routes!(upload_video))
            .route_layer(DefaultBodyLimit::max(MAX_VIDEO_BYTES)),
    )
}

/// Fetch all uploaded videos, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Videos"],
    responses(
        (status = 200, description = "List videos", body = StdResponse<Vec<VideoEntity>, String>)
    )
)]
async fn get_videos(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let videos: Vec<VideoEntity> = videos::table
        .order_by(videos::created_at.desc())
        .get_results(conn)
        .await
        .context("Failed to get videos")?;

    Ok(StdResponse {
        data: Some(videos),
        message: Some("Get videos successfully"),
    })
}

/// Upload a video to object storage and persist its metadata.
///
/// Multipart form with a `video` file field and optional `title` and
/// `description` text fields. Only MP4, MOV and AVI files are accepted.
#[utoipa::path(
    post,
    path = "/upload",
    tags = ["Videos"],
    responses(
        (status = 200, description = "Uploaded video", body = StdResponse<VideoEntity, String>),
        (status = 400, description = "Missing file or unsupported type")
    )
)]
async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut title: Option<String> = None;
    let mut description: Option<String> = None;
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::Validation(format!("Invalid multipart payload: {err}")))?
    {
        match field.name() {
            Some("title") => {
                title = Some(field.text().await.map_err(|err| {
                    AppError::Validation(format!("Invalid title field: {err}"))
                })?);
            }
            Some("description") => {
                description = Some(field.text().await.map_err(|err| {
                    AppError::Validation(format!("Invalid description field: {err}"))
                })?);
            }
            Some("video") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(|err| {
                    AppError::Validation(format!("Failed to read video field: {err}"))
                })?;
                file = Some((file_name, content_type, data.to_vec()));
            }
            _ => {}
        }
    }

    let (file_name, content_type, data) =
        file.ok_or_else(|| AppError::Validation("No video file provided".into()))?;

    if !ALLOWED_VIDEO_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::Validation(
            "Invalid file type. Only MP4, MOV, and AVI files are allowed.".into(),
        ));
    }

    let key = format!("videos/{}-{}", Uuid::new_v4(), file_name);
    let file_size = data.len() as i64;
    let s3_url = state
        .storage
        .put_object(&key, &content_type, data)
        .await
        .context("Failed to upload video")?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let video: VideoEntity = diesel::insert_into(videos::table)
        .values(CreateVideoEntity {
            title: title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| "FAQ Video".to_string()),
            description,
            s3_key: key,
            s3_url,
            file_size,
            mime_type: content_type,
        })
        .returning(VideoEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to create video record")?;

    Ok(StdResponse {
        data: Some(video),
        message: Some("Uploaded video successfully"),
    })
}
