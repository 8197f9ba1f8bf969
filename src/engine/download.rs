// ─── Category Download Pool ───
// Bounded-concurrency worker pool over one category's queue. No retries and
// no per-asset timeout: a failed or skipped asset is simply absent on disk
// and gets redetected by the next validation pass.

use std::sync::{Arc, Mutex};

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::asset::{Asset, Category, DlTracker};
use crate::engine::events::{CancellationToken, EngineEvent, ProgressCallback};
use crate::validation::{calculate_hash, HashAlgo};

/// Byte counters for one `process_dl_queues` invocation. Owned by the pass,
/// never ambient state; shared across the pass's category pools.
#[derive(Debug, Default)]
pub struct ProgressAccumulator {
    counters: Mutex<Counters>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    progress: u64,
    total: u64,
}

impl ProgressAccumulator {
    pub fn with_total(total: u64) -> Self {
        Self {
            counters: Mutex::new(Counters { progress: 0, total }),
        }
    }

    /// Advance transferred bytes, returning the updated `(progress, total)`.
    fn advance(&self, bytes: u64) -> (u64, u64) {
        let mut counters = self.counters.lock().expect("progress counters poisoned");
        counters.progress += bytes;
        (counters.progress, counters.total)
    }

    /// Correct the pass total when a response's actual size disagrees with
    /// the declared size.
    fn adjust_total(&self, delta: i64) {
        let mut counters = self.counters.lock().expect("progress counters poisoned");
        counters.total = counters.total.saturating_add_signed(delta);
    }

    pub fn snapshot(&self) -> (u64, u64) {
        let counters = self.counters.lock().expect("progress counters poisoned");
        (counters.progress, counters.total)
    }
}

pub(crate) struct PoolContext {
    pub client: Client,
    pub category: Category,
    pub accumulator: Arc<ProgressAccumulator>,
    pub events: ProgressCallback,
    pub cancel: CancellationToken,
}

/// Drain one category's tracker under `limit` concurrent transfers.
///
/// The cancellation token is checked at each pool iteration boundary:
/// already-started transfers run to completion, queued assets are dropped.
/// The tracker callback fires only for assets whose bytes reached disk;
/// a skipped or failed asset stays absent and gets requeued by the next
/// validation pass.
pub(crate) async fn run_category_pool(ctx: &PoolContext, tracker: DlTracker, limit: usize) {
    let callback = tracker.callback.clone();
    stream::iter(tracker.queue)
        .map(|asset| {
            let callback = callback.clone();
            async move {
                if ctx.cancel.is_cancelled() {
                    return;
                }
                if download_one(ctx, &asset).await {
                    if let Some(callback) = &callback {
                        callback(&asset);
                    }
                }
            }
        })
        .buffer_unordered(limit.max(1))
        .collect::<Vec<()>>()
        .await;
}

/// Returns true only when the asset's bytes were written and flushed.
async fn download_one(ctx: &PoolContext, asset: &Asset) -> bool {
    if let Some(parent) = asset.to.parent() {
        if let Err(err) = tokio::fs::create_dir_all(parent).await {
            (ctx.events)(EngineEvent::Error {
                category: ctx.category,
                message: format!("cannot create {:?}: {err}", parent),
            });
            return false;
        }
    }

    let response = match ctx.client.get(&asset.from).send().await {
        Ok(response) => response,
        Err(err) => {
            (ctx.events)(EngineEvent::Error {
                category: ctx.category,
                message: format!("{}: {err}", asset.from),
            });
            return false;
        }
    };

    let status = response.status();
    if !status.is_success() {
        // Skip, not retry: count the declared bytes so the pass still
        // converges, and let the next validation pass requeue the asset.
        warn!(
            "HTTP {} for {} ({}), skipping",
            status.as_u16(),
            asset.from,
            asset.id
        );
        let (progress, total) = ctx.accumulator.advance(asset.size);
        (ctx.events)(EngineEvent::Progress {
            category: ctx.category,
            progress,
            total,
        });
        return false;
    }

    // Distribution metadata is sometimes stale: a content-length that
    // disagrees with the declared size corrects the pass total and flags
    // the written file for a hash re-check.
    let mut recheck_hash = false;
    if let Some(actual) = response.content_length() {
        if actual != asset.size {
            debug!(
                "Size mismatch for {}: declared {} actual {}",
                asset.id, asset.size, actual
            );
            ctx.accumulator
                .adjust_total(actual as i64 - asset.size as i64);
            recheck_hash = true;
        }
    }

    if !stream_to_file(ctx, asset, response).await {
        return false;
    }

    if recheck_hash {
        recheck_written_file(asset).await;
    }
    true
}

/// Stream the response body to `asset.to`, advancing pass progress per
/// chunk. Returns false on a transport or write failure.
async fn stream_to_file(ctx: &PoolContext, asset: &Asset, response: reqwest::Response) -> bool {
    let mut file = match tokio::fs::File::create(&asset.to).await {
        Ok(file) => file,
        Err(err) => {
            (ctx.events)(EngineEvent::Error {
                category: ctx.category,
                message: format!("cannot open {:?}: {err}", asset.to),
            });
            return false;
        }
    };

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                (ctx.events)(EngineEvent::Error {
                    category: ctx.category,
                    message: format!("{}: {err}", asset.from),
                });
                return false;
            }
        };
        if let Err(err) = file.write_all(&chunk).await {
            (ctx.events)(EngineEvent::Error {
                category: ctx.category,
                message: format!("write to {:?} failed: {err}", asset.to),
            });
            return false;
        }
        let (progress, total) = ctx.accumulator.advance(chunk.len() as u64);
        (ctx.events)(EngineEvent::Progress {
            category: ctx.category,
            progress,
            total,
        });
    }

    if let Err(err) = file.flush().await {
        (ctx.events)(EngineEvent::Error {
            category: ctx.category,
            message: format!("flush of {:?} failed: {err}", asset.to),
        });
        return false;
    }
    true
}

/// Re-validate a file whose transfer size disagreed with its declared size.
/// A mismatch is a warning, not a failure. Returns whether the written file
/// matched its declared hash; an asset with no hash (or a hash of unknown
/// width) has nothing to check against.
async fn recheck_written_file(asset: &Asset) -> bool {
    let Some(expected) = &asset.hash else {
        return true;
    };
    let Some(algo) = infer_algo(expected) else {
        warn!("Cannot infer hash algorithm for {} ({expected})", asset.id);
        return true;
    };
    match tokio::fs::read(&asset.to).await {
        Ok(buffer) => {
            let actual = calculate_hash(&buffer, algo);
            let matched = actual.eq_ignore_ascii_case(expected);
            if !matched {
                warn!(
                    "Hash mismatch after size-corrected download of {}: expected {} got {}",
                    asset.id, expected, actual
                );
            }
            matched
        }
        Err(err) => {
            warn!("Cannot re-read {:?} for re-check: {err}", asset.to);
            false
        }
    }
}

/// Hash algorithm by hex digest width.
fn infer_algo(hash: &str) -> Option<HashAlgo> {
    match hash.len() {
        32 => Some(HashAlgo::Md5),
        40 => Some(HashAlgo::Sha1),
        64 => Some(HashAlgo::Sha256),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_advances_and_adjusts() {
        let acc = ProgressAccumulator::with_total(100);
        assert_eq!(acc.advance(30), (30, 100));
        acc.adjust_total(-20);
        assert_eq!(acc.advance(10), (40, 80));
        acc.adjust_total(5);
        assert_eq!(acc.snapshot(), (40, 85));
    }

    #[test]
    fn algo_is_inferred_from_digest_width() {
        assert_eq!(infer_algo(&"a".repeat(32)), Some(HashAlgo::Md5));
        assert_eq!(infer_algo(&"a".repeat(40)), Some(HashAlgo::Sha1));
        assert_eq!(infer_algo(&"a".repeat(64)), Some(HashAlgo::Sha256));
        assert_eq!(infer_algo("zz"), None);
    }

    #[tokio::test]
    async fn size_corrected_recheck_flags_wrong_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib.jar");
        tokio::fs::write(&path, b"what actually landed").await.unwrap();

        let stale = Asset::new(
            "lib.jar",
            Some(calculate_hash(b"what was declared", HashAlgo::Sha1)),
            5,
            "http://x/lib.jar",
            path.clone(),
        );
        assert!(!recheck_written_file(&stale).await);

        let fresh = Asset::new(
            "lib.jar",
            Some(calculate_hash(b"what actually landed", HashAlgo::Sha1)),
            5,
            "http://x/lib.jar",
            path,
        );
        assert!(recheck_written_file(&fresh).await);
    }

    #[tokio::test]
    async fn recheck_without_a_hash_has_nothing_to_verify() {
        let asset = Asset::new("a.bin", None, 1, "http://x/a.bin", "/nonexistent/a.bin");
        assert!(recheck_written_file(&asset).await);
    }

    #[tokio::test]
    async fn recheck_of_an_unreadable_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let asset = Asset::new(
            "gone.bin",
            Some("a".repeat(40)),
            1,
            "http://x/gone.bin",
            dir.path().join("gone.bin"),
        );
        assert!(!recheck_written_file(&asset).await);
    }
}
