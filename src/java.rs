// ─── Java Provisioning ───
// Thin wrapper that resolves the latest matching Adoptium build and enqueues
// its archive as a single-item `java` tracker. Downloads nothing itself;
// discovery of already-installed Java binaries is a separate collaborator.

use serde::Deserialize;
use tracing::{debug, info};

use crate::asset::{Asset, DlTracker, TrackerCallback};
use crate::error::EngineResult;
use crate::paths::DataLayout;

const ADOPTIUM_API_BASE: &str = "https://api.adoptium.net/v3/assets/latest";

#[derive(Debug, Deserialize)]
struct AdoptiumRelease {
    binary: AdoptiumBinary,
}

#[derive(Debug, Deserialize)]
struct AdoptiumBinary {
    package: AdoptiumPackage,
}

#[derive(Debug, Deserialize)]
struct AdoptiumPackage {
    checksum: String,
    link: String,
    name: String,
    size: u64,
}

/// Java major required by a Minecraft version: 17 from 1.17 onwards, 8 before.
pub fn required_major_for(minecraft_version: &str) -> u32 {
    let mut parts = minecraft_version.split('.');
    let major = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(1);
    let minor = parts
        .next()
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(0);

    if major > 1 || minor >= 17 {
        17
    } else {
        8
    }
}

pub struct JavaProvisioner {
    client: reqwest::Client,
    layout: DataLayout,
    api_base: String,
}

impl JavaProvisioner {
    pub fn new(client: reqwest::Client, layout: DataLayout) -> Self {
        Self {
            client,
            layout,
            api_base: ADOPTIUM_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Build a single-item `java` tracker for the latest Adoptium build
    /// matching the required major. Returns `None` when no upstream build
    /// matches. `on_complete` fires once the archive lands on disk, feeding
    /// the extraction pipeline.
    pub async fn enqueue_runtime(
        &self,
        minecraft_version: &str,
        on_complete: TrackerCallback,
    ) -> EngineResult<Option<DlTracker>> {
        let major = required_major_for(minecraft_version);
        let Some(package) = self.fetch_latest_package(major).await? else {
            return Ok(None);
        };

        info!("Enqueuing Java {} runtime: {}", major, package.name);
        let destination = self.layout.runtime_dir().join(&package.name);
        let mut tracker = DlTracker::with_callback(on_complete);
        tracker.enqueue(Asset::new(
            package.name,
            Some(package.checksum),
            package.size,
            package.link,
            destination,
        ));
        Ok(Some(tracker))
    }

    /// Probe the metadata API, preferring JRE images over full JDKs.
    async fn fetch_latest_package(&self, major: u32) -> EngineResult<Option<AdoptiumPackage>> {
        for image_type in ["jre", "jdk"] {
            let url = format!(
                "{}/{}/hotspot?architecture={}&image_type={}&os={}",
                self.api_base,
                major,
                platform_arch(),
                image_type,
                platform_os()
            );
            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                debug!(
                    "Adoptium query for {image_type} returned HTTP {}",
                    response.status().as_u16()
                );
                continue;
            }
            let releases: Vec<AdoptiumRelease> = response.json().await?;
            if let Some(release) = releases.into_iter().next() {
                return Ok(Some(release.binary.package));
            }
        }
        Ok(None)
    }
}

fn platform_arch() -> &'static str {
    match std::env::consts::ARCH {
        "aarch64" => "aarch64",
        _ => "x64",
    }
}

fn platform_os() -> &'static str {
    match std::env::consts::OS {
        "windows" => "windows",
        "macos" => "mac",
        _ => "linux",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn java_major_tracks_minecraft_version() {
        assert_eq!(required_major_for("1.12.2"), 8);
        assert_eq!(required_major_for("1.16.5"), 8);
        assert_eq!(required_major_for("1.17"), 17);
        assert_eq!(required_major_for("1.20.4"), 17);
    }

    #[tokio::test]
    async fn enqueue_builds_a_single_item_tracker() {
        let server = MockServer::start().await;
        let release = serde_json::json!([{
            "binary": {
                "package": {
                    "checksum": "ab".repeat(32),
                    "link": format!("{}/jdk.tar.gz", server.uri()),
                    "name": "OpenJDK17-jre_x64_linux.tar.gz",
                    "size": 40_000_000u64
                }
            }
        }]);
        Mock::given(method("GET"))
            .and(path_regex(r"^/17/hotspot$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(release))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let provisioner = JavaProvisioner::new(reqwest::Client::new(), layout.clone())
            .with_api_base(server.uri());

        let tracker = provisioner
            .enqueue_runtime("1.17.1", Arc::new(|_| {}))
            .await
            .unwrap()
            .expect("build should resolve");

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.size, 40_000_000);
        let asset = &tracker.queue[0];
        assert!(asset.to.starts_with(layout.runtime_dir()));
        assert_eq!(asset.hash.as_deref(), Some("ab".repeat(32).as_str()));
    }

    #[tokio::test]
    async fn enqueue_reports_missing_upstream_build() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let provisioner =
            JavaProvisioner::new(reqwest::Client::new(), DataLayout::new(dir.path()))
                .with_api_base(server.uri());

        let tracker = provisioner
            .enqueue_runtime("1.16.5", Arc::new(|_| {}))
            .await
            .unwrap();
        assert!(tracker.is_none());
    }
}
