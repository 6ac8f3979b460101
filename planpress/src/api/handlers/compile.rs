use crate::api::models::plans::{CompileLatexQuery, CompileLatexResponse};
use crate::errors::{Error, Result};
use crate::storage::UploadOptions;
use crate::{AppState, naming};
use axum::{
    Json,
    extract::{Query, State},
};
use bytes::Bytes;
use tracing::{debug, error, info, warn};

/// POST /compile-latex/?tex_filename=<name> - compile a stored `.tex` object
/// to PDF and store the result in the pdf bucket.
///
/// Download and compiler failures both collapse to the same fixed 500 detail;
/// the compiler's diagnostics only reach the server logs.
#[utoipa::path(
    post,
    path = "/compile-latex/",
    tag = "plans",
    summary = "Compile a stored lesson plan to PDF",
    params(CompileLatexQuery),
    responses(
        (status = 200, description = "PDF compiled and stored", body = CompileLatexResponse),
        (status = 400, description = "Malformed tex filename"),
        (status = 500, description = "Download or compilation failure")
    )
)]
pub async fn compile_latex(
    State(state): State<AppState>,
    Query(query): Query<CompileLatexQuery>,
) -> Result<Json<CompileLatexResponse>> {
    let tex_filename = query.tex_filename;
    naming::validate_tex_name(&tex_filename).map_err(|e| Error::BadRequest { message: e.to_string() })?;

    // Unique scratch directory per request; dropped (and deleted) on every
    // exit path, so concurrent compiles of the same key cannot collide.
    let scratch = tempfile::Builder::new().prefix("planpress-compile-").tempdir()?;

    let content = state
        .store
        .download(&state.config.buckets.tex, &tex_filename)
        .await
        .map_err(|e| {
            warn!(%tex_filename, error = %e, "failed to fetch LaTeX source for compilation");
            Error::Compilation
        })?;

    let tex_path = scratch.path().join(&tex_filename);
    tokio::fs::write(&tex_path, &content).await?;

    let pdf_path = state
        .compiler
        .compile(scratch.path(), &tex_filename)
        .await
        .map_err(|e| {
            error!(%tex_filename, error = %e, "LaTeX compilation failed");
            Error::Compilation
        })?;

    let pdf_content = Bytes::from(tokio::fs::read(&pdf_path).await?);
    let pdf_filename = naming::pdf_name_for(&tex_filename);

    // Last-write-wins: clear any stale PDF under this key, then upsert.
    if let Err(e) = state.store.remove(&state.config.buckets.pdf, &pdf_filename).await {
        debug!(%pdf_filename, error = %e, "could not remove stale PDF before upload");
    }
    state
        .store
        .upload(
            &state.config.buckets.pdf,
            &pdf_filename,
            pdf_content,
            &UploadOptions {
                content_type: Some("application/pdf".to_string()),
                cache_control: Some("max-age=3600".to_string()),
                upsert: true,
            },
        )
        .await?;

    info!(%tex_filename, %pdf_filename, "compiled lesson plan to PDF");
    Ok(Json(CompileLatexResponse {
        message: "Successfully compiled LaTeX to PDF.".to_string(),
        pdf_filename,
    }))
}
