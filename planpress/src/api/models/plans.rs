use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Lesson plan metadata submitted by the client. Only the title is required;
/// empty optional fields are treated as absent.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LessonPlanRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectives: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub materials_needed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_details: Option<String>,
}

/// Response for lesson plan generation: the LaTeX source exactly as returned
/// by the generator (also stored in the tex bucket).
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerateLessonPlanResponse {
    pub latex: String,
}

/// Query parameters for compilation
#[derive(Debug, Deserialize, IntoParams)]
pub struct CompileLatexQuery {
    /// Key of the `.tex` object in the tex bucket
    pub tex_filename: String,
}

/// Response for a successful compilation
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompileLatexResponse {
    pub message: String,
    /// Key of the PDF object in the pdf bucket
    pub pdf_filename: String,
}
