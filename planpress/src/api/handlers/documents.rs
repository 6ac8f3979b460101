use crate::api::models::documents::{
    SavedResponse, SignedUrlResponse, TexFileEntry, TexFileListResponse, TexFileResponse, TexFileUpdateRequest,
};
use crate::errors::{Error, Result};
use crate::storage::{StorageError, UploadOptions};
use crate::{AppState, naming};
use axum::{
    Json,
    extract::{Path, State},
};
use bytes::Bytes;
use tracing::info;

/// GET /tex-files/ - list stored lesson plan sources
#[utoipa::path(
    get,
    path = "/tex-files/",
    tag = "documents",
    responses((status = 200, description = "Stored tex objects", body = TexFileListResponse))
)]
pub async fn list_tex_files(State(state): State<AppState>) -> Result<Json<TexFileListResponse>> {
    let objects = state.store.list(&state.config.buckets.tex).await?;
    let files = objects
        .into_iter()
        .map(|o| TexFileEntry {
            name: o.name,
            size: o.size,
            updated_at: o.updated_at,
        })
        .collect();
    Ok(Json(TexFileListResponse { files }))
}

/// GET /tex-files/{filename} - fetch one source for editing
#[utoipa::path(
    get,
    path = "/tex-files/{filename}",
    tag = "documents",
    params(("filename" = String, Path, description = "Key of the tex object")),
    responses(
        (status = 200, description = "Object content", body = TexFileResponse),
        (status = 404, description = "No such object")
    )
)]
pub async fn get_tex_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<TexFileResponse>> {
    naming::validate_tex_name(&filename).map_err(|e| Error::BadRequest { message: e.to_string() })?;

    let content = state
        .store
        .download(&state.config.buckets.tex, &filename)
        .await
        .map_err(|e| match e {
            StorageError::NotFound => Error::NotFound {
                resource: "tex file",
                name: filename.clone(),
            },
            e => e.into(),
        })?;

    let content = String::from_utf8(content.to_vec())
        .map_err(|_| Error::Other(anyhow::anyhow!("stored tex object {filename:?} is not valid UTF-8")))?;

    Ok(Json(TexFileResponse { filename, content }))
}

/// PUT /tex-files/{filename} - overwrite a source with edited content.
/// No locking: concurrent edits to the same object race and the last write wins.
#[utoipa::path(
    put,
    path = "/tex-files/{filename}",
    tag = "documents",
    params(("filename" = String, Path, description = "Key of the tex object")),
    request_body = TexFileUpdateRequest,
    responses((status = 200, description = "Content stored", body = SavedResponse))
)]
pub async fn update_tex_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Json(update): Json<TexFileUpdateRequest>,
) -> Result<Json<SavedResponse>> {
    naming::validate_tex_name(&filename).map_err(|e| Error::BadRequest { message: e.to_string() })?;

    state
        .store
        .upload(
            &state.config.buckets.tex,
            &filename,
            Bytes::from(update.content.into_bytes()),
            &UploadOptions {
                content_type: Some("text/x-tex".to_string()),
                cache_control: None,
                upsert: true,
            },
        )
        .await?;

    info!(%filename, "stored edited lesson plan");
    Ok(Json(SavedResponse {
        message: "Saved.".to_string(),
    }))
}

/// GET /pdf-files/{filename}/url - mint a time-limited link to a compiled PDF
#[utoipa::path(
    get,
    path = "/pdf-files/{filename}/url",
    tag = "documents",
    params(("filename" = String, Path, description = "Key of the pdf object")),
    responses(
        (status = 200, description = "Signed URL", body = SignedUrlResponse),
        (status = 404, description = "No such object")
    )
)]
pub async fn pdf_signed_url(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<SignedUrlResponse>> {
    naming::validate_pdf_name(&filename).map_err(|e| Error::BadRequest { message: e.to_string() })?;

    let ttl = state.config.signed_url_ttl;
    let signed_url = state
        .store
        .create_signed_url(&state.config.buckets.pdf, &filename, ttl)
        .await
        .map_err(|e| match e {
            StorageError::NotFound => Error::NotFound {
                resource: "pdf file",
                name: filename.clone(),
            },
            e => e.into(),
        })?;

    Ok(Json(SignedUrlResponse {
        signed_url,
        expires_in: ttl.as_secs(),
    }))
}
