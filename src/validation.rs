use std::io::{Cursor, Read};
use std::path::Path;

use sha1::{Digest, Sha1};
use tracing::{debug, warn};

/// Hash algorithms used across the engine. MD5 for distribution modules,
/// SHA-1 for Mojang-published files, SHA-256 for Java runtime archives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgo {
    Md5,
    Sha1,
    Sha256,
}

/// Compute the lowercase hex digest of `buffer` under `algo`.
pub fn calculate_hash(buffer: &[u8], algo: HashAlgo) -> String {
    match algo {
        HashAlgo::Md5 => hex::encode(md5::Md5::digest(buffer)),
        HashAlgo::Sha1 => hex::encode(Sha1::digest(buffer)),
        HashAlgo::Sha256 => hex::encode(sha2::Sha256::digest(buffer)),
    }
}

/// Content-addressable validation of a local file.
///
/// Returns false whenever the file is absent, regardless of the expected
/// hash. A `None` hash means "trust the local file if present".
pub fn validate_local(path: &Path, algo: HashAlgo, expected: Option<&str>) -> bool {
    let Ok(buffer) = std::fs::read(path) else {
        return false;
    };
    let Some(expected) = expected else {
        return true;
    };
    calculate_hash(&buffer, algo) == expected.to_lowercase()
}

/// Validate a forge-distributed artifact against a list of acceptable hashes.
///
/// The outer SHA-1 is tried first. Some forge jars cannot be validated by a
/// single outer hash (the container metadata is not covered), so a failing
/// `.jar` falls back to the embedded-manifest double pass.
pub fn validate_forge_checksum(path: &Path, checksums: &[String]) -> bool {
    let Ok(buffer) = std::fs::read(path) else {
        return false;
    };
    if checksums.is_empty() {
        return true;
    }

    let top_level = calculate_hash(&buffer, HashAlgo::Sha1);
    if checksums.iter().any(|c| c.eq_ignore_ascii_case(&top_level)) {
        return true;
    }

    if path.extension().and_then(|e| e.to_str()) == Some("jar") {
        debug!("Outer hash failed for {:?}, trying embedded manifest", path);
        return validate_forge_jar(&buffer, checksums);
    }

    false
}

const FORGE_MANIFEST_ENTRY: &str = "checksums.sha1";

/// Double-pass validation of a forge jar held in memory.
///
/// Opens the jar as a zip archive, computes the SHA-1 of every entry and
/// reads the embedded `checksums.sha1` manifest (whitespace-delimited
/// `hash filename` lines). The jar is accepted only if the manifest's own
/// hash is accept-listed and every manifest-declared entry matches its
/// computed hash. Pure function of the input buffer; no retry.
pub fn validate_forge_jar(buffer: &[u8], checksums: &[String]) -> bool {
    let mut archive = match zip::ZipArchive::new(Cursor::new(buffer)) {
        Ok(archive) => archive,
        Err(err) => {
            warn!("Forge jar is not a readable zip archive: {err}");
            return false;
        }
    };

    let mut entry_hashes: Vec<(String, String)> = Vec::new();
    let mut manifest_text: Option<String> = None;

    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Unreadable forge jar entry: {err}");
                return false;
            }
        };
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let mut contents = Vec::with_capacity(entry.size() as usize);
        if entry.read_to_end(&mut contents).is_err() {
            warn!("Failed reading forge jar entry {name}");
            return false;
        }

        let hash = calculate_hash(&contents, HashAlgo::Sha1);
        if name == FORGE_MANIFEST_ENTRY {
            if !checksums.iter().any(|c| c.eq_ignore_ascii_case(&hash)) {
                debug!("Embedded manifest hash not in accept list");
                return false;
            }
            manifest_text = Some(String::from_utf8_lossy(&contents).into_owned());
        }
        entry_hashes.push((name, hash));
    }

    let Some(manifest) = manifest_text else {
        debug!("Forge jar carries no {FORGE_MANIFEST_ENTRY} manifest");
        return false;
    };

    for line in manifest.lines() {
        let mut parts = line.split_whitespace();
        let (Some(expected), Some(file_name)) = (parts.next(), parts.next()) else {
            continue;
        };
        if file_name == FORGE_MANIFEST_ENTRY {
            continue;
        }
        let matches = entry_hashes
            .iter()
            .any(|(name, hash)| name == file_name && hash.eq_ignore_ascii_case(expected));
        if !matches {
            debug!("Forge jar entry {file_name} failed manifest validation");
            return false;
        }
    }

    true
}
