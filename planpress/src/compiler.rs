//! LaTeX compilation behind a capability interface.
//!
//! The [`Compiler`] trait lets the containerized toolchain be swapped for an
//! in-process engine or a remote compilation service without touching the
//! compile flow. The production implementation, [`DockerCompiler`], runs
//! `pdflatex` inside a LaTeX container with the source directory mounted
//! read-write at `/data`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::process::Command;

/// Longest diagnostic slice kept for logs.
const DIAGNOSTIC_TAIL: usize = 2000;

#[derive(ThisError, Debug)]
pub enum CompileError {
    #[error("failed to invoke latex container: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("pdflatex exited with status {code:?}: {diagnostics}")]
    Failed { code: Option<i32>, diagnostics: String },

    #[error("pdflatex reported success but produced no output at {0:?}")]
    MissingOutput(PathBuf),

    #[error("compilation timed out after {0:?}")]
    Timeout(Duration),
}

/// Compile a `.tex` file living in `source_dir` into a PDF.
///
/// On success the returned path points at the produced PDF inside
/// `source_dir`. Implementations must verify the output file actually exists
/// before reporting success - a zero exit status alone is not proof.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, source_dir: &Path, source_file: &str) -> Result<PathBuf, CompileError>;
}

/// Expected output location for a given source file.
pub fn output_path(source_dir: &Path, source_file: &str) -> PathBuf {
    source_dir.join(source_file).with_extension("pdf")
}

/// Runs `pdflatex` in a sandboxed container via `docker run`.
pub struct DockerCompiler {
    image: String,
    timeout: Duration,
    extra_args: Vec<String>,
}

impl DockerCompiler {
    pub fn new(config: &crate::config::CompilerConfig) -> Self {
        Self {
            image: config.image.clone(),
            timeout: config.timeout,
            extra_args: config.extra_args.clone(),
        }
    }

    /// Arguments for `docker`. The container runs as the invoking uid:gid so
    /// the produced PDF is not root-owned on the host.
    fn run_args(&self, source_dir: &Path, source_file: &str) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            format!("{}:/data", source_dir.display()),
        ];

        #[cfg(unix)]
        {
            let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
            args.push("-u".to_string());
            args.push(format!("{uid}:{gid}"));
        }

        args.extend(self.extra_args.iter().cloned());
        args.push(self.image.clone());
        args.push("pdflatex".to_string());
        args.push("-interaction=nonstopmode".to_string());
        args.push(format!("/data/{source_file}"));
        args
    }
}

/// Last `max` bytes of a diagnostic stream, lossily decoded.
fn tail(output: &[u8], max: usize) -> String {
    let text = String::from_utf8_lossy(output);
    let start = text.len().saturating_sub(max);
    // Don't split a multi-byte character.
    match text.char_indices().find(|(i, _)| *i >= start) {
        Some((i, _)) => text[i..].to_string(),
        None => String::new(),
    }
}

#[async_trait]
impl Compiler for DockerCompiler {
    async fn compile(&self, source_dir: &Path, source_file: &str) -> Result<PathBuf, CompileError> {
        let args = self.run_args(source_dir, source_file);
        tracing::debug!(image = %self.image, ?args, "invoking latex container");

        let run = Command::new("docker")
            .args(&args)
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| CompileError::Timeout(self.timeout))??;

        if !output.status.success() {
            // pdflatex writes its diagnostics to stdout; docker failures land on stderr.
            let diagnostics = if output.stderr.is_empty() {
                tail(&output.stdout, DIAGNOSTIC_TAIL)
            } else {
                tail(&output.stderr, DIAGNOSTIC_TAIL)
            };
            return Err(CompileError::Failed {
                code: output.status.code(),
                diagnostics,
            });
        }

        let pdf_path = output_path(source_dir, source_file);
        if !tokio::fs::try_exists(&pdf_path).await.unwrap_or(false) {
            return Err(CompileError::MissingOutput(pdf_path));
        }
        Ok(pdf_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;

    fn compiler() -> DockerCompiler {
        DockerCompiler::new(&CompilerConfig {
            image: "blang/latex:ctanfull".to_string(),
            timeout: Duration::from_secs(120),
            extra_args: vec![],
        })
    }

    #[test]
    fn run_args_mount_source_dir_and_invoke_pdflatex() {
        let args = compiler().run_args(Path::new("/tmp/scratch"), "plan.tex");

        assert_eq!(args[0], "run");
        assert_eq!(args[1], "--rm");
        assert!(args.contains(&"-v".to_string()));
        assert!(args.contains(&"/tmp/scratch:/data".to_string()));
        assert!(args.contains(&"blang/latex:ctanfull".to_string()));
        assert!(args.contains(&"pdflatex".to_string()));
        assert!(args.contains(&"-interaction=nonstopmode".to_string()));
        assert_eq!(args.last().unwrap(), "/data/plan.tex");
    }

    #[cfg(unix)]
    #[test]
    fn run_args_pin_container_user() {
        let args = compiler().run_args(Path::new("/tmp/scratch"), "plan.tex");
        let position = args.iter().position(|a| a == "-u").expect("-u flag present");
        let user = &args[position + 1];
        let (uid, gid) = user.split_once(':').expect("uid:gid format");
        assert!(uid.chars().all(|c| c.is_ascii_digit()));
        assert!(gid.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn extra_args_precede_the_image() {
        let compiler = DockerCompiler::new(&CompilerConfig {
            image: "texlive/texlive".to_string(),
            timeout: Duration::from_secs(60),
            extra_args: vec!["--network".to_string(), "none".to_string()],
        });
        let args = compiler.run_args(Path::new("/tmp/s"), "a.tex");

        let network = args.iter().position(|a| a == "--network").unwrap();
        let image = args.iter().position(|a| a == "texlive/texlive").unwrap();
        assert!(network < image);
    }

    #[test]
    fn output_path_swaps_extension_in_place() {
        assert_eq!(
            output_path(Path::new("/tmp/scratch"), "lesson_plan_20231105124141.tex"),
            PathBuf::from("/tmp/scratch/lesson_plan_20231105124141.pdf")
        );
    }

    #[test]
    fn tail_keeps_the_end_of_long_output() {
        let long = "x".repeat(5000) + "! Emergency stop.";
        let t = tail(long.as_bytes(), 100);
        assert!(t.len() <= 100);
        assert!(t.ends_with("! Emergency stop."));
    }

    #[test]
    fn tail_handles_short_output() {
        assert_eq!(tail(b"short", 100), "short");
    }
}
