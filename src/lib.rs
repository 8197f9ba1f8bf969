// ─── launchcore ───
// Asset acquisition & validation engine for a desktop game launcher.
//
// Architecture:
//   asset        — Asset/DistroAsset descriptors, Category, DlTracker
//   validation   — hashing, local-file validation, forge jar double pass
//   manifest     — Mojang version manifest / version JSON / asset index
//   distribution — module tree resolution into the forge tracker
//   engine       — validation passes + bounded-concurrency download pass
//   extraction   — pack.xz helper, filtered zip, streaming tar.gz
//   java         — Adoptium runtime provisioning
//   paths        — on-disk layout (common / instances / runtime)
//
// The UI shell, auth flows, JVM argument construction and Java discovery
// are external collaborators; the engine exposes resolved paths and a
// structured event stream and nothing else.

pub mod asset;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod extraction;
pub mod http;
pub mod java;
pub mod manifest;
pub mod paths;
pub mod validation;

pub use asset::{Asset, Category, DistroAsset, DlTracker, ModuleType};
pub use engine::events::{CancellationToken, EngineEvent, ProgressCallback};
pub use engine::{AssetEngine, CategoryRequest};
pub use error::{EngineError, EngineResult};
pub use paths::DataLayout;
