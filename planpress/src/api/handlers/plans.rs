use crate::api::models::plans::{GenerateLessonPlanResponse, LessonPlanRequest};
use crate::errors::Result;
use crate::storage::UploadOptions;
use crate::{AppState, naming};
use axum::{Json, extract::State};
use bytes::Bytes;
use chrono::Utc;
use std::io::Write as _;
use tracing::info;

/// POST /generate-lesson-plan/ - generate LaTeX from lesson plan metadata and
/// store it in the tex bucket.
///
/// The generator's output is taken verbatim; nothing checks that it is
/// well-formed LaTeX before it is stored (a later compile surfaces that).
#[utoipa::path(
    post,
    path = "/generate-lesson-plan/",
    tag = "plans",
    summary = "Generate a lesson plan",
    request_body = LessonPlanRequest,
    responses(
        (status = 200, description = "LaTeX generated and stored", body = GenerateLessonPlanResponse),
        (status = 500, description = "Completion API failure; detail carries the upstream message")
    )
)]
pub async fn generate_lesson_plan(
    State(state): State<AppState>,
    Json(plan): Json<LessonPlanRequest>,
) -> Result<Json<GenerateLessonPlanResponse>> {
    let latex = state.generator.generate(&plan).await?;

    // Uniquely named scratch file; removed on drop on every exit path.
    let mut scratch = tempfile::Builder::new()
        .prefix("lesson_plan_")
        .suffix(".tex")
        .tempfile()?;
    scratch.write_all(latex.as_bytes())?;

    let tex_filename = naming::generated_tex_name(Utc::now());
    let content = Bytes::from(tokio::fs::read(scratch.path()).await?);
    state
        .store
        .upload(
            &state.config.buckets.tex,
            &tex_filename,
            content,
            &UploadOptions {
                content_type: Some("text/x-tex".to_string()),
                cache_control: None,
                // Two generations within the same second share a key; last write wins.
                upsert: true,
            },
        )
        .await?;

    info!(%tex_filename, bytes = latex.len(), "stored generated lesson plan");
    Ok(Json(GenerateLessonPlanResponse { latex }))
}

#[cfg(test)]
mod tests {
    use crate::config::{GeneratorConfig, OpenAiSettings};
    use crate::test_utils::{StubCompiler, TEST_TEMPLATE, create_test_app, create_test_app_with_generator};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn is_generated_tex_name(name: &str) -> bool {
        name.strip_prefix("lesson_plan_")
            .and_then(|rest| rest.strip_suffix(".tex"))
            .is_some_and(|ts| ts.len() == 14 && ts.chars().all(|c| c.is_ascii_digit()))
    }

    #[tokio::test]
    async fn generate_returns_latex_and_stores_tex_object() {
        let ctx = create_test_app(StubCompiler::Succeed).await;

        let response = ctx
            .server
            .post("/generate-lesson-plan/")
            .json(&serde_json::json!({ "title": "Fractions Intro" }))
            .await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        let latex = body["latex"].as_str().expect("latex field");
        assert_eq!(latex, TEST_TEMPLATE);

        let objects = ctx.store.list(&ctx.config.buckets.tex).await.unwrap();
        assert_eq!(objects.len(), 1);
        assert!(
            is_generated_tex_name(&objects[0].name),
            "unexpected object name {:?}",
            objects[0].name
        );

        let stored = ctx
            .store
            .download(&ctx.config.buckets.tex, &objects[0].name)
            .await
            .unwrap();
        assert_eq!(stored.as_ref(), latex.as_bytes());
    }

    #[tokio::test]
    async fn generate_accepts_all_optional_fields() {
        let ctx = create_test_app(StubCompiler::Succeed).await;

        let response = ctx
            .server
            .post("/generate-lesson-plan/")
            .json(&serde_json::json!({
                "title": "Fractions Intro",
                "objectives": "compare fractions",
                "materials_needed": "fraction strips",
                "plan_details": "start with halves",
            }))
            .await;
        response.assert_status_ok();
    }

    #[tokio::test]
    async fn missing_title_is_rejected() {
        let ctx = create_test_app(StubCompiler::Succeed).await;

        let response = ctx
            .server
            .post("/generate-lesson-plan/")
            .json(&serde_json::json!({ "objectives": "no title" }))
            .await;
        response.assert_status(axum::http::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn completion_failure_surfaces_upstream_message() {
        let completion_api = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": { "message": "The engine is currently overloaded" }
            })))
            .mount(&completion_api)
            .await;

        let generator = GeneratorConfig::Openai(OpenAiSettings {
            api_key: "sk-test".to_string(),
            base_url: completion_api.uri(),
            ..Default::default()
        });
        let ctx = create_test_app_with_generator(generator, StubCompiler::Succeed).await;

        let response = ctx
            .server
            .post("/generate-lesson-plan/")
            .json(&serde_json::json!({ "title": "Fractions Intro" }))
            .await;
        response.assert_status(axum::http::StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = response.json();
        let detail = body["detail"].as_str().expect("detail field");
        assert!(detail.contains("The engine is currently overloaded"), "detail: {detail}");

        // Nothing was stored.
        assert!(ctx.store.list(&ctx.config.buckets.tex).await.unwrap().is_empty());
    }
}
