use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::asset::Category;

/// Lifecycle events emitted during validation and download passes.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A validation pass started building a fresh tracker for `category`.
    Validate(Category),
    /// Byte-level progress across the whole pass. Ordering across categories
    /// is nondeterministic; only the pass-global counters are meaningful.
    Progress {
        category: Category,
        progress: u64,
        total: u64,
    },
    /// One category's queue drained and its tracker was swapped out.
    CategoryComplete(Category),
    /// A connection-level failure for one asset. Sibling downloads continue.
    Error { category: Category, message: String },
    /// The whole download pass (including pack.xz extraction) finished.
    DownloadComplete,
    /// A downloaded Java runtime archive finished extracting. Resolving the
    /// OS-specific `bin/java(w)` binary under `root` is the Java discovery
    /// collaborator's job.
    JavaReady { root: PathBuf },
}

/// Receives every [`EngineEvent`] of a pass. Called inline from download
/// workers, so implementations should hand off rather than block.
pub type ProgressCallback = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// Cooperative cancellation for a download pass.
///
/// Checked at each worker-pool iteration boundary: in-flight transfers
/// finish their current asset, queued assets are abandoned and the pass
/// resolves with `EngineError::Cancelled`.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
