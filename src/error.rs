use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the engine.
/// Every module returns `Result<T, EngineError>`.
#[derive(Debug, Error)]
pub enum EngineError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    // ── Remote metadata ─────────────────────────────────
    #[error("Version not present in remote manifest: {0}")]
    MissingVersion(String),

    #[error("Distribution for {0} declares no version manifest module")]
    ForgeManifestNotFound(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Control flow ────────────────────────────────────
    #[error("Download pass cancelled")]
    Cancelled,

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type EngineResult<T> = Result<T, EngineError>;
