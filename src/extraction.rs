// ─── Extraction Pipeline ───
// Three independent strategies: pack.xz via an external helper process,
// filtered zip extraction, and streaming tar.gz for runtime archives.

use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};

/// External helper used for pack.xz archives (a bundled Java tool).
#[derive(Debug, Clone)]
pub struct PackXzHelper {
    pub java_exec: PathBuf,
    pub helper_jar: PathBuf,
}

/// Unpack every queued pack.xz archive with a single helper invocation.
///
/// The helper receives a comma-joined list of all archive paths after the
/// download pass completes. The future resolves regardless of the helper's
/// exit code; a nonzero status is only logged.
pub async fn extract_pack_xz(helper: &PackXzHelper, archives: &[PathBuf]) -> EngineResult<()> {
    if archives.is_empty() {
        return Ok(());
    }

    let joined = archives
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(",");

    info!("Unpacking {} pack.xz archives", archives.len());
    let status = tokio::process::Command::new(&helper.java_exec)
        .arg("-jar")
        .arg(&helper.helper_jar)
        .arg("-dec")
        .arg(joined)
        .status()
        .await
        .map_err(|source| EngineError::Io {
            path: helper.java_exec.clone(),
            source,
        })?;

    if !status.success() {
        warn!("pack.xz helper exited with {status}");
    }
    Ok(())
}

/// Extract a zip archive into `target`, dropping any entry whose path
/// contains `exclusion` (platform-irrelevant natives, `META-INF/`).
pub fn extract_zip_filtered(
    archive_path: &Path,
    target: &Path,
    exclusion: Option<&str>,
) -> EngineResult<()> {
    let file = std::fs::File::open(archive_path).map_err(|source| EngineError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file)?;

    std::fs::create_dir_all(target).map_err(|source| EngineError::Io {
        path: target.to_path_buf(),
        source,
    })?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping zip entry with unsafe path: {}", entry.name());
            continue;
        };
        if let Some(needle) = exclusion {
            if entry.name().contains(needle) {
                continue;
            }
        }

        let out_path = target.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|source| EngineError::Io {
                path: out_path,
                source,
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| EngineError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut out = std::fs::File::create(&out_path).map_err(|source| EngineError::Io {
            path: out_path.clone(),
            source,
        })?;
        std::io::copy(&mut entry, &mut out).map_err(|source| EngineError::Io {
            path: out_path,
            source,
        })?;
    }

    Ok(())
}

/// Extract a Java runtime zip distribution into `runtime_dir` and return the
/// extracted root, named by the archive's first entry. The source archive is
/// removed once extraction finishes.
pub fn extract_runtime_zip(archive_path: &Path, runtime_dir: &Path) -> EngineResult<PathBuf> {
    let file = std::fs::File::open(archive_path).map_err(|source| EngineError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file)?;
    if archive.is_empty() {
        return Err(EngineError::Other(format!(
            "Runtime archive is empty: {}",
            archive_path.display()
        )));
    }

    let root = {
        let first = archive.by_index(0)?;
        first_component(first.name()).ok_or_else(|| {
            EngineError::Other(format!("Unnamed root entry in {}", archive_path.display()))
        })?
    };
    drop(archive);

    extract_zip_filtered(archive_path, runtime_dir, None)?;

    let _ = std::fs::remove_file(archive_path);
    Ok(runtime_dir.join(root))
}

/// Extract a Java runtime tar.gz distribution into `runtime_dir` and return
/// the extracted root. The archive is streamed (gunzip into tar) rather than
/// buffered, and deleted once extraction finishes.
pub fn extract_runtime_tar_gz(archive_path: &Path, runtime_dir: &Path) -> EngineResult<PathBuf> {
    let file = std::fs::File::open(archive_path).map_err(|source| EngineError::Io {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));

    std::fs::create_dir_all(runtime_dir).map_err(|source| EngineError::Io {
        path: runtime_dir.to_path_buf(),
        source,
    })?;

    let mut root: Option<String> = None;
    for entry in archive.entries().map_err(|source| EngineError::Io {
        path: archive_path.to_path_buf(),
        source,
    })? {
        let mut entry = entry.map_err(|source| EngineError::Io {
            path: archive_path.to_path_buf(),
            source,
        })?;
        if root.is_none() {
            let name = entry.path().map_err(|source| EngineError::Io {
                path: archive_path.to_path_buf(),
                source,
            })?;
            root = first_component(&name.to_string_lossy());
        }
        entry
            .unpack_in(runtime_dir)
            .map_err(|source| EngineError::Io {
                path: runtime_dir.to_path_buf(),
                source,
            })?;
    }

    let root = root.ok_or_else(|| {
        EngineError::Other(format!("Empty runtime archive: {}", archive_path.display()))
    })?;

    let _ = std::fs::remove_file(archive_path);
    Ok(runtime_dir.join(root))
}

/// Pick the strategy for a downloaded runtime archive by its file name.
pub fn extract_runtime_archive(archive_path: &Path, runtime_dir: &Path) -> EngineResult<PathBuf> {
    let name = archive_path.to_string_lossy();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        extract_runtime_tar_gz(archive_path, runtime_dir)
    } else {
        extract_runtime_zip(archive_path, runtime_dir)
    }
}

fn first_component(entry_name: &str) -> Option<String> {
    entry_name
        .split('/')
        .find(|part| !part.is_empty())
        .map(|part| part.to_string())
}
