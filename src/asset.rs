use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Download categories, each with its own queue and worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Assets,
    Libraries,
    Files,
    Forge,
    Java,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Assets,
        Category::Libraries,
        Category::Files,
        Category::Forge,
        Category::Java,
    ];

    /// Default worker-pool width for this category.
    pub fn default_limit(self) -> usize {
        match self {
            Category::Assets => 20,
            Category::Libraries | Category::Files | Category::Forge => 5,
            Category::Java => 1,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Assets => "assets",
            Category::Libraries => "libraries",
            Category::Files => "files",
            Category::Forge => "forge",
            Category::Java => "java",
        };
        f.write_str(name)
    }
}

/// Distribution module kinds. Determines where a module lands on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleType {
    Library,
    ForgeHosted,
    Forge,
    LiteLoader,
    ForgeMod,
    LiteMod,
    File,
    VersionManifest,
}

/// A remote-to-local file mapping with integrity metadata.
///
/// Immutable value object. `hash == None` means "trust the local file if
/// present" rather than a validation failure.
#[derive(Debug, Clone)]
pub struct Asset {
    pub id: String,
    pub hash: Option<String>,
    /// Declared byte size. The actual transfer size may differ; the
    /// orchestrator corrects the discrepancy at download time.
    pub size: u64,
    pub from: String,
    pub to: PathBuf,
}

impl Asset {
    pub fn new(
        id: impl Into<String>,
        hash: Option<String>,
        size: u64,
        from: impl Into<String>,
        to: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            hash,
            size,
            from: from.into(),
            to: to.into(),
        }
    }
}

/// An [`Asset`] declared by the distribution, tagged with its module type.
#[derive(Debug, Clone)]
pub struct DistroAsset {
    pub asset: Asset,
    pub module_type: ModuleType,
}

/// Invoked once per completed queue item with the finished asset.
pub type TrackerCallback = Arc<dyn Fn(&Asset) + Send + Sync>;

/// A per-category download queue paired with its declared total byte size.
///
/// Trackers are built fresh by each validation pass and replaced wholesale
/// with an empty tracker once their queue drains; they are never mutated in
/// place mid-pass.
#[derive(Default)]
pub struct DlTracker {
    pub queue: Vec<Asset>,
    /// Sum of declared sizes at enqueue time.
    pub size: u64,
    pub callback: Option<TrackerCallback>,
}

impl DlTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: TrackerCallback) -> Self {
        Self {
            queue: Vec::new(),
            size: 0,
            callback: Some(callback),
        }
    }

    pub fn enqueue(&mut self, asset: Asset) {
        self.size += asset.size;
        self.queue.push(asset);
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

impl fmt::Debug for DlTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DlTracker")
            .field("queue", &self.queue.len())
            .field("size", &self.size)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
