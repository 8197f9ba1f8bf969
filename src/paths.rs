use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "launchcore";

/// Directory layout for everything the engine touches on disk.
///
/// `common` holds version-independent shared data (assets, libraries,
/// versions, modstore); `instances` holds per-server files; `data` is the
/// root that also carries managed Java runtimes.
#[derive(Debug, Clone)]
pub struct DataLayout {
    data_dir: PathBuf,
    common_dir: PathBuf,
    instance_dir: PathBuf,
}

impl DataLayout {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let common_dir = data_dir.join("common");
        let instance_dir = data_dir.join("instances");
        Self {
            data_dir,
            common_dir,
            instance_dir,
        }
    }

    /// Default layout under the platform data directory.
    pub fn from_system_dirs() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME);
        Self::new(base)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn common_dir(&self) -> &Path {
        &self.common_dir
    }

    // ── Assets ──────────────────────────────────────────

    pub fn asset_indexes_dir(&self) -> PathBuf {
        self.common_dir.join("assets").join("indexes")
    }

    pub fn asset_objects_dir(&self) -> PathBuf {
        self.common_dir.join("assets").join("objects")
    }

    /// Content-addressed object path: `objects/<hash[0..2]>/<hash>`.
    pub fn asset_object(&self, hash: &str) -> PathBuf {
        self.asset_objects_dir().join(&hash[..2]).join(hash)
    }

    // ── Versions ────────────────────────────────────────

    pub fn version_dir(&self, version_id: &str) -> PathBuf {
        self.common_dir.join("versions").join(version_id)
    }

    pub fn version_json(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id)
            .join(format!("{version_id}.json"))
    }

    pub fn version_jar(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id)
            .join(format!("{version_id}.jar"))
    }

    // ── Libraries and distribution modules ──────────────

    pub fn libraries_dir(&self) -> PathBuf {
        self.common_dir.join("libraries")
    }

    pub fn modstore_dir(&self) -> PathBuf {
        self.common_dir.join("modstore")
    }

    pub fn instance_dir(&self, server_id: &str) -> PathBuf {
        self.instance_dir.join(server_id)
    }

    // ── Java runtimes ───────────────────────────────────

    pub fn runtime_dir(&self) -> PathBuf {
        self.data_dir.join("runtime").join("x64")
    }
}
