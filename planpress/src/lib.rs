//! # planpress: Lesson Plan Generation and Publishing
//!
//! `planpress` is an HTTP service that turns lesson plan metadata into LaTeX
//! source via a chat-completion API, persists that source in bucket-based
//! object storage, and compiles it to PDF on demand with a containerized LaTeX
//! toolchain. Companion UIs authenticate against the storage provider, browse
//! and edit the stored `.tex` sources through this API, trigger compilation,
//! and render compiled PDFs through signed URLs.
//!
//! ## Request Flow
//!
//! A client posts lesson plan metadata to `/generate-lesson-plan/`. The
//! service builds a prompt from the present fields, submits one completion
//! request (or reads a canned template in development mode), stores the
//! returned LaTeX under a timestamp-derived key in the tex bucket, and returns
//! the source to the caller. Later, `/compile-latex/` downloads that object
//! into a scratch directory, runs `pdflatex` inside a container against it,
//! and stores the produced PDF under the matching key in the pdf bucket.
//! `/pdf-files/{name}/url` then mints a signed URL for direct retrieval.
//!
//! Each request is handled linearly; the only shared state across requests is
//! the storage objects themselves, which are not versioned or locked.
//!
//! ## Core Components
//!
//! - [`completion`]: prompt construction and the completion API client
//! - [`storage`]: the [`storage::ObjectStore`] trait with Supabase and local
//!   filesystem backends
//! - [`compiler`]: the [`compiler::Compiler`] capability trait and the
//!   Docker-based `pdflatex` runner
//! - [`api`]: axum handlers and request/response models
//! - [`config`]: YAML + environment configuration loading
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use planpress::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = planpress::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     planpress::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod compiler;
pub mod completion;
pub mod config;
pub mod errors;
pub mod naming;
mod openapi;
pub mod storage;
pub mod telemetry;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::compiler::{Compiler, DockerCompiler};
use crate::completion::LatexGenerator;
use crate::openapi::ApiDoc;
use crate::storage::ObjectStore;
use axum::{
    Json, Router,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
pub use errors::{Error, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Application state shared across all request handlers.
///
/// # Fields
///
/// - `config`: Application configuration loaded from file/environment
/// - `store`: Object storage backend holding `.tex` sources and compiled PDFs
/// - `generator`: LaTeX source generator (completion API or canned template)
/// - `compiler`: LaTeX-to-PDF compiler (containerized `pdflatex` in production)
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ObjectStore>,
    pub generator: Arc<LatexGenerator>,
    pub compiler: Arc<dyn Compiler>,
}

/// Build the application router with all endpoints and middleware.
///
/// Routes keep the trailing-slash forms of the original deployment for
/// client compatibility.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/generate-lesson-plan/", post(api::handlers::plans::generate_lesson_plan))
        .route("/compile-latex/", post(api::handlers::compile::compile_latex))
        .route("/health/", get(api::handlers::health::health_check))
        .route("/tex-files/", get(api::handlers::documents::list_tex_files))
        .route(
            "/tex-files/{filename}",
            get(api::handlers::documents::get_tex_file).put(api::handlers::documents::update_tex_file),
        )
        .route("/pdf-files/{filename}/url", get(api::handlers::documents::pdf_signed_url))
        .with_state(state);

    let router = Router::new()
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .merge(api_routes);

    // The browser UI is served from a different origin than this API.
    router.layer(CorsLayer::permissive()).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// Main application struct that owns all resources and lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects the storage backend (for
///    Supabase this establishes the service session, so bad credentials fail
///    at boot), builds the generator and compiler, and assembles the router
/// 2. **Serve**: [`Application::serve`] binds a TCP port and handles requests
///    until the shutdown future resolves
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting planpress with configuration: {:#?}", config);

        let store = storage::create_object_store(&config.storage).await?;
        let generator = Arc::new(LatexGenerator::from_config(&config.generator)?);
        let compiler: Arc<dyn Compiler> = Arc::new(DockerCompiler::new(&config.compiler));

        let state = AppState::builder()
            .config(config.clone())
            .store(store)
            .generator(generator)
            .compiler(compiler)
            .build();

        let router = build_router(state);

        Ok(Self { router, config })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("planpress listening on http://{bind_addr}");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::test_utils::{StubCompiler, create_test_app};

    /// End-to-end scenario: generate a plan, compile it, check health.
    #[test_log::test(tokio::test)]
    async fn generate_then_compile_then_health() {
        let ctx = create_test_app(StubCompiler::Succeed).await;

        // Generate from a title-only request.
        let generate = ctx
            .server
            .post("/generate-lesson-plan/")
            .json(&serde_json::json!({ "title": "Fractions Intro" }))
            .await;
        generate.assert_status_ok();
        let latex = generate.json::<serde_json::Value>()["latex"]
            .as_str()
            .expect("latex field")
            .to_string();
        assert!(!latex.is_empty());

        // Exactly one tex object, named by a 14-digit timestamp.
        let tex_objects = ctx.store.list(&ctx.config.buckets.tex).await.unwrap();
        assert_eq!(tex_objects.len(), 1);
        let tex_name = tex_objects[0].name.clone();
        let timestamp = tex_name
            .strip_prefix("lesson_plan_")
            .and_then(|rest| rest.strip_suffix(".tex"))
            .expect("timestamp-derived name");
        assert_eq!(timestamp.len(), 14);
        assert!(timestamp.chars().all(|c| c.is_ascii_digit()));
        let stored = ctx.store.download(&ctx.config.buckets.tex, &tex_name).await.unwrap();
        assert_eq!(stored.as_ref(), latex.as_bytes());

        // Compile that object.
        let compile = ctx
            .server
            .post("/compile-latex/")
            .add_query_param("tex_filename", &tex_name)
            .await;
        compile.assert_status_ok();
        compile.assert_json(&serde_json::json!({
            "message": "Successfully compiled LaTeX to PDF.",
            "pdf_filename": format!("lesson_plan_{timestamp}.pdf"),
        }));

        let pdf_objects = ctx.store.list(&ctx.config.buckets.pdf).await.unwrap();
        assert_eq!(pdf_objects.len(), 1);
        assert_eq!(pdf_objects[0].name, format!("lesson_plan_{timestamp}.pdf"));

        // Health is healthy regardless of prior steps.
        let health = ctx.server.get("/health/").await;
        health.assert_status_ok();
        health.assert_json(&serde_json::json!({ "status": "healthy" }));
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let ctx = create_test_app(StubCompiler::Succeed).await;

        let response = ctx.server.get("/api-docs/openapi.json").await;
        response.assert_status_ok();
        let doc: serde_json::Value = response.json();
        assert!(doc["paths"]["/generate-lesson-plan/"].is_object());
        assert!(doc["paths"]["/compile-latex/"].is_object());
    }
}
