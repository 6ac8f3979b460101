//! OpenAPI documentation configuration.
//!
//! The generated document is served at `/api-docs/openapi.json` with an
//! interactive viewer at `/docs`.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "planpress",
        description = "Lesson plan generation and LaTeX publishing service"
    ),
    paths(
        crate::api::handlers::plans::generate_lesson_plan,
        crate::api::handlers::compile::compile_latex,
        crate::api::handlers::documents::list_tex_files,
        crate::api::handlers::documents::get_tex_file,
        crate::api::handlers::documents::update_tex_file,
        crate::api::handlers::documents::pdf_signed_url,
        crate::api::handlers::health::health_check,
    ),
    components(schemas(
        crate::api::models::plans::LessonPlanRequest,
        crate::api::models::plans::GenerateLessonPlanResponse,
        crate::api::models::plans::CompileLatexResponse,
        crate::api::models::documents::TexFileEntry,
        crate::api::models::documents::TexFileListResponse,
        crate::api::models::documents::TexFileResponse,
        crate::api::models::documents::TexFileUpdateRequest,
        crate::api::models::documents::SavedResponse,
        crate::api::models::documents::SignedUrlResponse,
        crate::api::handlers::health::HealthResponse,
    )),
    tags(
        (name = "plans", description = "Lesson plan generation and compilation"),
        (name = "documents", description = "Stored document browsing and editing"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;
