// ─── Distribution Resolution ───
// Walks a server's declared module tree and decides which artifacts need to
// be fetched, producing the `forge` download tracker plus the queue of
// pack.xz archives that must be unpacked after the download pass.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::asset::{Asset, DistroAsset, DlTracker, ModuleType};
use crate::paths::DataLayout;
use crate::validation::{validate_local, HashAlgo};

const PACK_XZ_SUFFIX: &str = ".pack.xz";

/// A server as declared by the distribution manifest. Parsing and caching of
/// the manifest itself belong to the distribution manager collaborator; the
/// engine only consumes the resolved tree.
#[derive(Debug, Clone)]
pub struct DistroServer {
    pub id: String,
    pub modules: Vec<DistroModule>,
}

/// A node in a server's dependency tree, possibly with nested submodules.
#[derive(Debug, Clone)]
pub struct DistroModule {
    pub module_type: ModuleType,
    pub identifier: String,
    pub artifact: DistroArtifact,
    pub sub_modules: Vec<DistroModule>,
}

#[derive(Debug, Clone)]
pub struct DistroArtifact {
    /// Path relative to the module type's root directory.
    pub path: String,
    /// MD5 of the artifact's *validated* form (the unpacked file for
    /// pack.xz archives). `None` trusts any present local file.
    pub hash: Option<String>,
    pub url: String,
    pub size: u64,
}

/// Result of a distribution walk: the `forge` tracker and the raw pack.xz
/// archive paths awaiting the external unpack step.
#[derive(Debug)]
pub struct DistroResolution {
    pub tracker: DlTracker,
    pub extract_queue: Vec<PathBuf>,
}

/// Resolve a server's module tree into download work.
///
/// Pre-order walk over an explicit worklist. The tree is assumed acyclic;
/// a repeated identifier within one walk is treated as stale metadata and
/// skipped with a warning rather than failing the pass.
pub fn resolve_distribution(layout: &DataLayout, server: &DistroServer) -> DistroResolution {
    let mut worklist: Vec<&DistroModule> = server.modules.iter().rev().collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queued: Vec<DistroAsset> = Vec::new();
    let mut extract_queue: Vec<PathBuf> = Vec::new();

    while let Some(module) = worklist.pop() {
        if !seen.insert(module.identifier.as_str()) {
            warn!(
                "Duplicate module identifier {} in distribution for {}, skipping",
                module.identifier, server.id
            );
            continue;
        }

        let destination = module_destination(layout, &server.id, module);
        let validation_path = validation_path_for(&destination);

        if !validate_local(
            &validation_path,
            HashAlgo::Md5,
            module.artifact.hash.as_deref(),
        ) {
            debug!("Module {} requires download", module.identifier);
            if validation_path != destination {
                extract_queue.push(destination.clone());
            }
            queued.push(DistroAsset {
                asset: Asset::new(
                    module.identifier.clone(),
                    module.artifact.hash.clone(),
                    module.artifact.size,
                    module.artifact.url.clone(),
                    destination,
                ),
                module_type: module.module_type,
            });
        }

        worklist.extend(module.sub_modules.iter().rev());
    }

    let mut tracker = DlTracker::new();
    for distro_asset in queued {
        tracker.enqueue(distro_asset.asset);
    }

    DistroResolution {
        tracker,
        extract_queue,
    }
}

/// Locate the server's `VersionManifest`-type module, if it declares one.
/// Searches the whole tree; modded profiles sometimes nest it under the
/// loader module.
pub fn find_version_manifest(server: &DistroServer) -> Option<&DistroModule> {
    let mut worklist: Vec<&DistroModule> = server.modules.iter().collect();
    while let Some(module) = worklist.pop() {
        if module.module_type == ModuleType::VersionManifest {
            return Some(module);
        }
        worklist.extend(module.sub_modules.iter());
    }
    None
}

/// Where a module lands on disk, by module type.
fn module_destination(layout: &DataLayout, server_id: &str, module: &DistroModule) -> PathBuf {
    let relative = &module.artifact.path;
    match module.module_type {
        ModuleType::Library
        | ModuleType::Forge
        | ModuleType::ForgeHosted
        | ModuleType::LiteLoader => layout.libraries_dir().join(relative),
        ModuleType::ForgeMod | ModuleType::LiteMod => layout.modstore_dir().join(relative),
        ModuleType::File => layout.instance_dir(server_id).join(relative),
        ModuleType::VersionManifest => layout.common_dir().join("versions").join(relative),
    }
}

/// The path that actually gets validated: a pack.xz archive is unpacked in
/// place, so the suffix-stripped file is what the hash covers.
fn validation_path_for(destination: &PathBuf) -> PathBuf {
    let raw = destination.to_string_lossy();
    match raw.strip_suffix(PACK_XZ_SUFFIX) {
        Some(stripped) => PathBuf::from(stripped),
        None => destination.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::calculate_hash;

    fn module(
        module_type: ModuleType,
        identifier: &str,
        path: &str,
        hash: Option<String>,
    ) -> DistroModule {
        DistroModule {
            module_type,
            identifier: identifier.to_string(),
            artifact: DistroArtifact {
                path: path.to_string(),
                hash,
                url: format!("https://files.example.com/{path}"),
                size: 128,
            },
            sub_modules: Vec::new(),
        }
    }

    #[test]
    fn missing_module_is_enqueued_with_declared_size() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let server = DistroServer {
            id: "srv".into(),
            modules: vec![module(
                ModuleType::Library,
                "org.example:lib:1.0",
                "org/example/lib/1.0/lib-1.0.jar",
                Some("d41d8cd98f00b204e9800998ecf8427e".into()),
            )],
        };

        let resolution = resolve_distribution(&layout, &server);
        assert_eq!(resolution.tracker.len(), 1);
        assert_eq!(resolution.tracker.size, 128);
        assert!(resolution.extract_queue.is_empty());
        assert!(resolution.tracker.queue[0]
            .to
            .starts_with(layout.libraries_dir()));
    }

    #[test]
    fn pack_xz_module_with_invalid_stripped_path_queues_both() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let server = DistroServer {
            id: "srv".into(),
            modules: vec![module(
                ModuleType::ForgeMod,
                "com.example:mod:2.0",
                "com/example/mod-2.0.jar.pack.xz",
                Some(calculate_hash(b"unpacked jar", HashAlgo::Md5)),
            )],
        };

        let resolution = resolve_distribution(&layout, &server);
        assert_eq!(resolution.tracker.len(), 1);
        assert_eq!(resolution.extract_queue.len(), 1);
        let raw = &resolution.extract_queue[0];
        assert!(raw.to_string_lossy().ends_with(".pack.xz"));
        assert!(raw.starts_with(layout.modstore_dir()));
    }

    #[test]
    fn pack_xz_module_with_valid_stripped_path_is_skipped_entirely() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let contents = b"unpacked jar";

        let unpacked = layout.modstore_dir().join("com/example/mod-2.0.jar");
        std::fs::create_dir_all(unpacked.parent().unwrap()).unwrap();
        std::fs::write(&unpacked, contents).unwrap();

        let server = DistroServer {
            id: "srv".into(),
            modules: vec![module(
                ModuleType::ForgeMod,
                "com.example:mod:2.0",
                "com/example/mod-2.0.jar.pack.xz",
                Some(calculate_hash(contents, HashAlgo::Md5)),
            )],
        };

        let resolution = resolve_distribution(&layout, &server);
        assert!(resolution.tracker.is_empty());
        assert!(resolution.extract_queue.is_empty());
    }

    #[test]
    fn submodules_are_walked_and_file_modules_land_in_the_instance() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let mut parent = module(
            ModuleType::Forge,
            "net.minecraftforge:forge:1.12.2",
            "net/minecraftforge/forge-1.12.2.jar",
            Some("aa".repeat(16)),
        );
        parent.sub_modules.push(module(
            ModuleType::File,
            "servers.dat",
            "servers.dat",
            None,
        ));
        let server = DistroServer {
            id: "srv".into(),
            modules: vec![parent],
        };

        let resolution = resolve_distribution(&layout, &server);
        assert_eq!(resolution.tracker.len(), 2);
        let file_asset = resolution
            .tracker
            .queue
            .iter()
            .find(|a| a.id == "servers.dat")
            .unwrap();
        assert!(file_asset.to.starts_with(layout.instance_dir("srv")));
    }

    #[test]
    fn version_manifest_module_is_found_anywhere_in_the_tree() {
        let mut parent = module(
            ModuleType::Forge,
            "net.minecraftforge:forge:1.12.2",
            "net/minecraftforge/forge-1.12.2.jar",
            None,
        );
        parent.sub_modules.push(module(
            ModuleType::VersionManifest,
            "1.12.2-forge",
            "1.12.2-forge/1.12.2-forge.json",
            None,
        ));
        let server = DistroServer {
            id: "srv".into(),
            modules: vec![parent],
        };

        let found = find_version_manifest(&server).unwrap();
        assert_eq!(found.identifier, "1.12.2-forge");

        let bare = DistroServer {
            id: "srv".into(),
            modules: vec![module(
                ModuleType::Library,
                "org.example:lib:1.0",
                "org/example/lib-1.0.jar",
                None,
            )],
        };
        assert!(find_version_manifest(&bare).is_none());
    }

    #[test]
    fn duplicate_identifiers_are_resolved_once() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let repeated = module(
            ModuleType::Library,
            "org.example:lib:1.0",
            "org/example/lib-1.0.jar",
            Some("bb".repeat(16)),
        );
        let server = DistroServer {
            id: "srv".into(),
            modules: vec![repeated.clone(), repeated],
        };

        let resolution = resolve_distribution(&layout, &server);
        assert_eq!(resolution.tracker.len(), 1);
    }

    #[test]
    fn resolution_is_idempotent_without_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let server = DistroServer {
            id: "srv".into(),
            modules: vec![module(
                ModuleType::Library,
                "org.example:lib:1.0",
                "org/example/lib-1.0.jar",
                Some("cc".repeat(16)),
            )],
        };

        let first = resolve_distribution(&layout, &server);
        let second = resolve_distribution(&layout, &server);
        assert_eq!(first.tracker.len(), second.tracker.len());
        assert_eq!(first.tracker.size, second.tracker.size);
        assert_eq!(first.extract_queue, second.extract_queue);
    }
}
