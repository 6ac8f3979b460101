//! Shared constructors for integration tests: a test server wired to a local
//! object store, a template-backed generator, and a stub compiler.

use crate::compiler::{self, CompileError, Compiler};
use crate::completion::LatexGenerator;
use crate::config::{Config, GeneratorConfig, StorageConfig};
use crate::storage::{LocalStore, ObjectStore};
use crate::{AppState, build_router};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Canned LaTeX returned by the template generator in tests.
pub const TEST_TEMPLATE: &str = "\\documentclass{article}\n\\begin{document}\nFractions Intro\n\\end{document}\n";

/// Just enough bytes to look like a PDF.
const STUB_PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n";

/// Stand-in for the containerized LaTeX toolchain.
#[derive(Clone, Copy)]
pub enum StubCompiler {
    /// Writes a stub PDF next to the source, like a successful pdflatex run
    Succeed,
    /// Fails the way a broken document does
    Fail,
}

#[async_trait]
impl Compiler for StubCompiler {
    async fn compile(&self, source_dir: &Path, source_file: &str) -> Result<PathBuf, CompileError> {
        match self {
            StubCompiler::Succeed => {
                let pdf_path = compiler::output_path(source_dir, source_file);
                tokio::fs::write(&pdf_path, STUB_PDF).await?;
                Ok(pdf_path)
            }
            StubCompiler::Fail => Err(CompileError::Failed {
                code: Some(1),
                diagnostics: "! Emergency stop.".to_string(),
            }),
        }
    }
}

/// A running test server plus handles on its backing state.
///
/// The temp directories live as long as the context; dropping it tears the
/// whole test app down.
pub struct TestContext {
    pub server: axum_test::TestServer,
    pub store: Arc<dyn ObjectStore>,
    pub config: Config,
    _storage_root: TempDir,
    _template_dir: Option<TempDir>,
}

/// Test app with a template-backed generator and the given compiler stub.
pub async fn create_test_app(stub: StubCompiler) -> TestContext {
    let template_dir = tempfile::tempdir().expect("failed to create template dir");
    let template_path = template_dir.path().join("template.tex");
    std::fs::write(&template_path, TEST_TEMPLATE).expect("failed to write template");

    let mut ctx = create_test_app_with_generator(GeneratorConfig::Template { path: template_path }, stub).await;
    ctx._template_dir = Some(template_dir);
    ctx
}

/// Test app with an explicit generator configuration (e.g. a wiremock-backed
/// completion API) and the given compiler stub.
pub async fn create_test_app_with_generator(generator_config: GeneratorConfig, stub: StubCompiler) -> TestContext {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    let storage_root = tempfile::tempdir().expect("failed to create storage root");

    let config = Config {
        storage: StorageConfig::Local {
            root: storage_root.path().to_path_buf(),
        },
        generator: generator_config.clone(),
        ..Default::default()
    };

    let store: Arc<dyn ObjectStore> = Arc::new(LocalStore::new(storage_root.path().to_path_buf()));
    let generator = Arc::new(LatexGenerator::from_config(&generator_config).expect("failed to build generator"));
    let compiler: Arc<dyn Compiler> = Arc::new(stub);

    let state = AppState::builder()
        .config(config.clone())
        .store(store.clone())
        .generator(generator)
        .compiler(compiler)
        .build();

    let server = axum_test::TestServer::new(build_router(state)).expect("failed to create test server");

    TestContext {
        server,
        store,
        config,
        _storage_root: storage_root,
        _template_dir: None,
    }
}
