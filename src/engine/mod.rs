// ─── Asset Engine ───
// Determines which remote files are missing or corrupt locally, queues them
// per category, downloads them under bounded concurrency and hands completed
// archives to the extraction pipeline. One engine instance drives one
// validate-then-download cycle; every validation pass builds its tracker
// from scratch, so a pass with nothing to do is a cheap no-op.

pub mod download;
pub mod events;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use futures_util::future::join_all;
use tracing::{info, warn};

use crate::asset::{Asset, Category, DlTracker, TrackerCallback};
use crate::distribution::{find_version_manifest, resolve_distribution, DistroServer};
use crate::error::{EngineError, EngineResult};
use crate::extraction::{self, PackXzHelper};
use crate::http::build_http_client;
use crate::java::JavaProvisioner;
use crate::manifest::{AssetIndex, AssetIndexInfo, VersionEntry, VersionJson, RESOURCES_URL};
use crate::paths::DataLayout;
use crate::validation::{validate_local, HashAlgo};

use download::{run_category_pool, PoolContext, ProgressAccumulator};
use events::{CancellationToken, EngineEvent, ProgressCallback};

/// One category's share of a download pass.
#[derive(Debug, Clone, Copy)]
pub struct CategoryRequest {
    pub category: Category,
    pub limit: usize,
}

impl CategoryRequest {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            limit: category.default_limit(),
        }
    }

    pub fn with_limit(category: Category, limit: usize) -> Self {
        Self { category, limit }
    }
}

#[derive(Default)]
struct TrackerSet {
    assets: DlTracker,
    libraries: DlTracker,
    files: DlTracker,
    forge: DlTracker,
    java: DlTracker,
}

impl TrackerSet {
    fn get(&self, category: Category) -> &DlTracker {
        match category {
            Category::Assets => &self.assets,
            Category::Libraries => &self.libraries,
            Category::Files => &self.files,
            Category::Forge => &self.forge,
            Category::Java => &self.java,
        }
    }

    fn set(&mut self, category: Category, tracker: DlTracker) {
        *self.slot(category) = tracker;
    }

    /// Wholesale swap with a fresh empty tracker, so no observer ever sees a
    /// half-drained queue.
    fn take(&mut self, category: Category) -> DlTracker {
        std::mem::take(self.slot(category))
    }

    fn slot(&mut self, category: Category) -> &mut DlTracker {
        match category {
            Category::Assets => &mut self.assets,
            Category::Libraries => &mut self.libraries,
            Category::Files => &mut self.files,
            Category::Forge => &mut self.forge,
            Category::Java => &mut self.java,
        }
    }
}

pub struct AssetEngine {
    client: reqwest::Client,
    layout: DataLayout,
    events: ProgressCallback,
    cancel: CancellationToken,
    trackers: TrackerSet,
    extract_queue: Vec<PathBuf>,
    pack_xz_helper: Option<PackXzHelper>,
    /// Set by the java tracker's completion callback; consumed after the
    /// download pass to trigger runtime extraction.
    java_archive: Arc<Mutex<Option<PathBuf>>>,
}

impl AssetEngine {
    pub fn new(layout: DataLayout) -> EngineResult<Self> {
        let client = build_http_client()?;
        Ok(Self {
            client,
            layout,
            events: Arc::new(|_| {}),
            cancel: CancellationToken::new(),
            trackers: TrackerSet::default(),
            extract_queue: Vec::new(),
            pack_xz_helper: None,
            java_archive: Arc::new(Mutex::new(None)),
        })
    }

    pub fn with_events(mut self, events: ProgressCallback) -> Self {
        self.events = events;
        self
    }

    pub fn with_pack_xz_helper(mut self, helper: PackXzHelper) -> Self {
        self.pack_xz_helper = Some(helper);
        self
    }

    /// Token observed at each worker-pool iteration boundary. Cancelling it
    /// is the only way to stop a running pass short of process termination.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    pub fn tracker(&self, category: Category) -> &DlTracker {
        self.trackers.get(category)
    }

    // ── Remote metadata ─────────────────────────────────

    /// Fetch and cache a version JSON at `<common>/versions/<id>/<id>.json`.
    /// The cached copy is reused as long as it still parses.
    pub async fn load_version_json(&self, entry: &VersionEntry) -> EngineResult<VersionJson> {
        let cache_path = self.layout.version_json(&entry.id);
        if let Ok(bytes) = tokio::fs::read(&cache_path).await {
            if let Ok(version) = serde_json::from_slice::<VersionJson>(&bytes) {
                return Ok(version);
            }
            warn!("Cached version JSON at {:?} is unreadable, refetching", cache_path);
        }

        let response = self.client.get(&entry.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::DownloadFailed {
                url: entry.url.clone(),
                status: status.as_u16(),
            });
        }
        let text = response.text().await?;
        let version: VersionJson = serde_json::from_str(&text)?;

        if let Some(parent) = cache_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| EngineError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&cache_path, &text)
            .await
            .map_err(|source| EngineError::Io {
                path: cache_path,
                source,
            })?;
        Ok(version)
    }

    /// Fetch and cache the asset index at `<common>/assets/indexes/<id>.json`.
    /// A cached index whose recorded SHA-1 still matches is reused; an
    /// unresolvable remote index is fatal to the validation pass.
    async fn load_asset_index(&self, info: &AssetIndexInfo) -> EngineResult<AssetIndex> {
        let index_path = self
            .layout
            .asset_indexes_dir()
            .join(format!("{}.json", info.id));
        if validate_local(&index_path, HashAlgo::Sha1, info.sha1.as_deref()) {
            if let Ok(bytes) = tokio::fs::read(&index_path).await {
                if let Ok(index) = serde_json::from_slice::<AssetIndex>(&bytes) {
                    return Ok(index);
                }
            }
        }

        let response = self.client.get(&info.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::DownloadFailed {
                url: info.url.clone(),
                status: status.as_u16(),
            });
        }
        let text = response.text().await?;
        let index: AssetIndex = serde_json::from_str(&text)?;

        if let Some(parent) = index_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| EngineError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&index_path, &text)
            .await
            .map_err(|source| EngineError::Io {
                path: index_path,
                source,
            })?;
        Ok(index)
    }

    /// Read the forge version data written to disk by the distribution's
    /// `VersionManifest`-type module. A modded profile cannot launch without
    /// it, so a distribution that declares no such module is an error with
    /// no fallback.
    pub async fn load_forge_data(&self, server: &DistroServer) -> EngineResult<VersionJson> {
        let Some(module) = find_version_manifest(server) else {
            return Err(EngineError::ForgeManifestNotFound(server.id.clone()));
        };
        let path = self
            .layout
            .common_dir()
            .join("versions")
            .join(&module.artifact.path);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| EngineError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    // ── Validation passes ───────────────────────────────

    /// Validate every object in the version's asset index against the
    /// content-addressed store, building a fresh `assets` tracker.
    pub async fn validate_assets(&mut self, version: &VersionJson) -> EngineResult<()> {
        (self.events)(EngineEvent::Validate(Category::Assets));
        let Some(index_info) = &version.asset_index else {
            return Err(EngineError::MissingVersion(format!(
                "asset index for {}",
                version.id
            )));
        };

        let index = self.load_asset_index(index_info).await?;
        let mut tracker = DlTracker::new();
        for object in index.objects.values() {
            let destination = self.layout.asset_object(&object.hash);
            if validate_local(&destination, HashAlgo::Sha1, Some(&object.hash)) {
                continue;
            }
            let from = format!("{}/{}/{}", RESOURCES_URL, &object.hash[..2], object.hash);
            tracker.enqueue(Asset::new(
                object.hash.clone(),
                Some(object.hash.clone()),
                object.size,
                from,
                destination,
            ));
        }

        info!(
            "Asset validation queued {} of {} objects",
            tracker.len(),
            index.objects.len()
        );
        self.trackers.set(Category::Assets, tracker);
        Ok(())
    }

    /// Validate the version's library artifacts, filtered by OS rules,
    /// building a fresh `libraries` tracker.
    pub fn validate_libraries(&mut self, version: &VersionJson) {
        (self.events)(EngineEvent::Validate(Category::Libraries));
        let mut tracker = DlTracker::new();
        for library in &version.libraries {
            if !library.is_allowed_for_current_os() {
                continue;
            }
            let Some(artifact) = library
                .downloads
                .as_ref()
                .and_then(|d| d.artifact.as_ref())
            else {
                continue;
            };
            let destination = self.layout.libraries_dir().join(&artifact.path);
            if validate_local(&destination, HashAlgo::Sha1, Some(&artifact.sha1)) {
                continue;
            }
            tracker.enqueue(Asset::new(
                library.name.clone(),
                Some(artifact.sha1.clone()),
                artifact.size,
                artifact.url.clone(),
                destination,
            ));
        }

        info!("Library validation queued {} artifacts", tracker.len());
        self.trackers.set(Category::Libraries, tracker);
    }

    /// Validate the client jar and logging configuration into a fresh
    /// `files` tracker.
    pub fn validate_miscellaneous(&mut self, version: &VersionJson) {
        (self.events)(EngineEvent::Validate(Category::Files));
        let mut tracker = DlTracker::new();

        if let Some(client) = version.downloads.as_ref().and_then(|d| d.client.as_ref()) {
            let destination = self.layout.version_jar(&version.id);
            if !validate_local(&destination, HashAlgo::Sha1, Some(&client.sha1)) {
                tracker.enqueue(Asset::new(
                    format!("{}.jar", version.id),
                    Some(client.sha1.clone()),
                    client.size,
                    client.url.clone(),
                    destination,
                ));
            }
        }

        if let Some(log_file) = version
            .logging
            .as_ref()
            .and_then(|l| l.client.as_ref())
            .map(|c| &c.file)
        {
            let destination = self
                .layout
                .common_dir()
                .join("assets")
                .join("log_configs")
                .join(&log_file.id);
            if !validate_local(&destination, HashAlgo::Sha1, Some(&log_file.sha1)) {
                tracker.enqueue(Asset::new(
                    log_file.id.clone(),
                    Some(log_file.sha1.clone()),
                    log_file.size,
                    log_file.url.clone(),
                    destination,
                ));
            }
        }

        info!("Miscellaneous validation queued {} files", tracker.len());
        self.trackers.set(Category::Files, tracker);
    }

    /// Walk the server's distribution module tree into a fresh `forge`
    /// tracker, queueing any pack.xz archives for post-download unpacking.
    pub fn validate_distribution(&mut self, server: &DistroServer) {
        (self.events)(EngineEvent::Validate(Category::Forge));
        let resolution = resolve_distribution(&self.layout, server);
        info!(
            "Distribution validation for {} queued {} modules ({} pack.xz)",
            server.id,
            resolution.tracker.len(),
            resolution.extract_queue.len()
        );
        self.extract_queue.extend(resolution.extract_queue);
        self.trackers.set(Category::Forge, resolution.tracker);
    }

    /// Enqueue a Java runtime download for the given Minecraft version.
    /// Returns false when no matching build exists upstream.
    pub async fn validate_java(&mut self, minecraft_version: &str) -> EngineResult<bool> {
        (self.events)(EngineEvent::Validate(Category::Java));
        let slot = Arc::clone(&self.java_archive);
        let on_complete: TrackerCallback = Arc::new(move |asset: &Asset| {
            *slot.lock().expect("java archive slot poisoned") = Some(asset.to.clone());
        });

        let provisioner = JavaProvisioner::new(self.client.clone(), self.layout.clone());
        match provisioner
            .enqueue_runtime(minecraft_version, on_complete)
            .await?
        {
            Some(tracker) => {
                self.trackers.set(Category::Java, tracker);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ── Download pass ───────────────────────────────────

    /// Drain the requested categories' trackers concurrently.
    ///
    /// Builds a fresh progress accumulator seeded with the requested queued
    /// sizes. If every requested category is empty the pass completes
    /// synchronously with zero network activity. Otherwise each non-empty
    /// category runs its own bounded pool; pools run concurrently with each
    /// other with no global cap. Only after all of them drain does the
    /// pack.xz queue (and any completed Java archive) get extracted, and
    /// `DownloadComplete` fires exactly once.
    pub async fn process_dl_queues(&mut self, requests: &[CategoryRequest]) -> EngineResult<()> {
        let mut pending = Vec::new();
        let mut total = 0u64;
        for request in requests {
            let tracker = self.trackers.take(request.category);
            if tracker.is_empty() {
                continue;
            }
            total += tracker.size;
            pending.push((request.category, tracker, request.limit));
        }

        if pending.is_empty() {
            (self.events)(EngineEvent::DownloadComplete);
            return Ok(());
        }

        let accumulator = Arc::new(ProgressAccumulator::with_total(total));
        let pools = pending.into_iter().map(|(category, tracker, limit)| {
            let ctx = PoolContext {
                client: self.client.clone(),
                category,
                accumulator: Arc::clone(&accumulator),
                events: Arc::clone(&self.events),
                cancel: self.cancel.clone(),
            };
            async move {
                info!(
                    "Starting {} download pool: {} items, limit {}",
                    category,
                    tracker.len(),
                    limit
                );
                run_category_pool(&ctx, tracker, limit).await;
                // A cancelled pool abandoned queued assets; its queue did
                // not drain.
                if !ctx.cancel.is_cancelled() {
                    (ctx.events)(EngineEvent::CategoryComplete(category));
                }
            }
        });
        join_all(pools).await;

        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        if !self.extract_queue.is_empty() {
            if let Some(helper) = &self.pack_xz_helper {
                let archives = std::mem::take(&mut self.extract_queue);
                extraction::extract_pack_xz(helper, &archives).await?;
            } else {
                // Keep the queue; a later pass with a helper can drain it.
                warn!(
                    "{} pack.xz archives queued but no helper configured",
                    self.extract_queue.len()
                );
            }
        }

        let java_archive = self
            .java_archive
            .lock()
            .expect("java archive slot poisoned")
            .take();
        if let Some(archive) = java_archive {
            let root = extraction::extract_runtime_archive(&archive, &self.layout.runtime_dir())?;
            (self.events)(EngineEvent::JavaReady { root });
        }

        (self.events)(EngineEvent::DownloadComplete);
        Ok(())
    }
}
