//! Object naming conventions shared by the generation and compilation flows.
//!
//! Generated lesson plans are keyed by a second-resolution timestamp
//! (`lesson_plan_YYYYMMDDHHMMSS.tex`) and the compiled PDF reuses the stem with
//! the suffix swapped. Names arriving from clients are validated before they are
//! used as storage keys or mounted into the compile container.

use chrono::{DateTime, Utc};
use thiserror::Error as ThisError;

pub const TEX_SUFFIX: &str = ".tex";
pub const PDF_SUFFIX: &str = ".pdf";

/// A client-supplied object name that cannot be used as a storage key.
#[derive(ThisError, Debug)]
#[error("invalid object name {name:?}: {reason}")]
pub struct InvalidName {
    pub name: String,
    pub reason: &'static str,
}

/// Storage key for a newly generated lesson plan.
///
/// Second resolution only: two plans generated within the same second collide
/// and the later upload wins. The format is part of the public API surface, so
/// callers relying on uniqueness must throttle above one request per second.
pub fn generated_tex_name(now: DateTime<Utc>) -> String {
    format!("lesson_plan_{}.tex", now.format("%Y%m%d%H%M%S"))
}

/// Derive the PDF key from a (validated) tex key by swapping the suffix.
pub fn pdf_name_for(tex_name: &str) -> String {
    let stem = tex_name.strip_suffix(TEX_SUFFIX).unwrap_or(tex_name);
    format!("{stem}{PDF_SUFFIX}")
}

/// Validate a client-supplied object name against the expected suffix.
///
/// Rejects anything that is not a bare `stem<suffix>` filename: path
/// separators, parent-directory references, and control characters are all
/// refused since the name is later joined onto a scratch directory that gets
/// mounted into the LaTeX container.
pub fn validate_object_name(name: &str, suffix: &str) -> Result<(), InvalidName> {
    let invalid = |reason: &'static str| InvalidName {
        name: name.to_string(),
        reason,
    };

    let Some(stem) = name.strip_suffix(suffix) else {
        return Err(invalid(match suffix {
            TEX_SUFFIX => "expected a `.tex` filename",
            _ => "expected a `.pdf` filename",
        }));
    };
    if stem.is_empty() {
        return Err(invalid("filename has an empty stem"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(invalid("filename must not contain path separators"));
    }
    if name.contains("..") {
        return Err(invalid("filename must not contain parent references"));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(invalid("filename must not contain control characters"));
    }
    Ok(())
}

pub fn validate_tex_name(name: &str) -> Result<(), InvalidName> {
    validate_object_name(name, TEX_SUFFIX)
}

pub fn validate_pdf_name(name: &str) -> Result<(), InvalidName> {
    validate_object_name(name, PDF_SUFFIX)
}
