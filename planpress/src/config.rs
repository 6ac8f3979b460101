//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides.
//! The configuration file path defaults to `config.yaml` but can be specified
//! via `-f` flag or `PLANPRESS_CONFIG` environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources
//! override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `PLANPRESS_` override
//!    YAML values; use double underscores for nested keys
//!    (e.g. `PLANPRESS_COMPILER__IMAGE=texlive/texlive`)
//! 3. **OPENAI_API_KEY** - Special case: overrides `generator.api_key` if set
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port`
//! - **Generator**: `generator.mode` selects the completion API (`openai`) or a
//!   canned on-disk template (`template`) for cost-free development
//! - **Storage**: `storage.backend` selects Supabase (`supabase`) or a local
//!   directory tree (`local`)
//! - **Buckets**: `buckets.tex`, `buckets.pdf` - object storage bucket names
//! - **Compiler**: `compiler.image`, `compiler.timeout`, `compiler.extra_args`
//! - **Signed URLs**: `signed_url_ttl` - lifetime of minted PDF links

use anyhow::bail;
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use url::Url;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "PLANPRESS_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment
/// variables. All fields have sensible defaults defined in the `Default`
/// implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Special-case env override for the completion API key (OPENAI_API_KEY)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
    /// LaTeX source generator - completion API or canned template
    pub generator: GeneratorConfig,
    /// Object storage backend - Supabase or local directory
    pub storage: StorageConfig,
    /// Bucket names for stored `.tex` sources and compiled PDFs
    pub buckets: BucketConfig,
    /// Lifetime of signed URLs minted for PDF retrieval
    #[serde(with = "humantime_serde")]
    pub signed_url_ttl: Duration,
    /// Containerized LaTeX toolchain settings
    pub compiler: CompilerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            openai_api_key: None,
            generator: GeneratorConfig::default(),
            storage: StorageConfig::default(),
            buckets: BucketConfig::default(),
            signed_url_ttl: Duration::from_secs(3600),
            compiler: CompilerConfig::default(),
        }
    }
}

/// LaTeX source generator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum GeneratorConfig {
    /// Call an OpenAI-style chat-completion API
    Openai(OpenAiSettings),
    /// Read a canned LaTeX file instead of calling the completion API.
    /// Useful for cost-free local development and tests.
    Template { path: PathBuf },
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig::Template {
            path: PathBuf::from("lesson_plans/template.tex"),
        }
    }
}

/// Settings for the chat-completion API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenAiSettings {
    /// API key; usually supplied via the OPENAI_API_KEY environment variable
    pub api_key: String,
    /// Base URL of the API (override for proxies and tests)
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    /// Output-token cap for the completion
    pub max_tokens: u32,
    /// Bound on the whole completion request
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Object storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Supabase storage with a service-account session
    Supabase(SupabaseSettings),
    /// Local directory tree (development and tests)
    Local {
        #[serde(default = "default_storage_root")]
        root: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Local {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from(".planpress_data/storage")
}

/// Supabase project connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SupabaseSettings {
    /// Project URL, e.g. `https://xyzcompany.supabase.co`
    pub url: Url,
    /// Project anon/service key sent as the `apikey` header
    pub anon_key: String,
    /// Service account credentials for the password grant
    pub email: String,
    pub password: String,
    /// Bound on each storage HTTP request
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Bucket names for the two object classes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BucketConfig {
    pub tex: String,
    pub pdf: String,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            tex: "lesson_plans_tex".to_string(),
            pdf: "lesson_plans".to_string(),
        }
    }
}

/// Containerized LaTeX toolchain settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Docker image providing `pdflatex`
    pub image: String,
    /// Bound on one compilation run, container start included
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Additional flags passed to `docker run`
    pub extra_args: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            image: "blang/latex:ctanfull".to_string(),
            timeout: Duration::from_secs(120),
            extra_args: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // OPENAI_API_KEY overrides the configured key, preserving the other
        // generator settings. Empty values count as unset; ignored in
        // template mode.
        if let Some(key) = config.openai_api_key.take() {
            if !key.is_empty() {
                if let GeneratorConfig::Openai(settings) = &mut config.generator {
                    settings.api_key = key;
                }
            }
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("PLANPRESS_").split("__"))
            // Common OPENAI_API_KEY pattern
            .merge(Env::raw().only(&["OPENAI_API_KEY"]))
    }

    fn validate(&self) -> anyhow::Result<()> {
        if let GeneratorConfig::Openai(settings) = &self.generator {
            if settings.api_key.is_empty() {
                bail!("generator.api_key must be set (or provide OPENAI_API_KEY) when generator.mode is openai");
            }
            if settings.max_tokens == 0 {
                bail!("generator.max_tokens must be greater than zero");
            }
        }
        if self.buckets.tex.is_empty() || self.buckets.pdf.is_empty() {
            bail!("buckets.tex and buckets.pdf must not be empty");
        }
        if self.signed_url_ttl.is_zero() {
            bail!("signed_url_ttl must be greater than zero");
        }
        if self.compiler.image.is_empty() {
            bail!("compiler.image must not be empty");
        }
        if self.compiler.timeout.is_zero() {
            bail!("compiler.timeout must be greater than zero");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
