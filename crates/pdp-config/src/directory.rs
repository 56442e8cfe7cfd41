//! [`DirectorySource`]: watch a directory's `pdp.json` + immediate-child
//! `*.sapl` files and publish a [`PdpConfiguration`] on every relevant
//! change (spec §4.4.1).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;

use notify::{RecursiveMode, Watcher};

use crate::configuration::{is_valid_pdp_id, PdpConfiguration, SaplDocument, VoterSource};
use crate::configuration_id::configuration_id;
use crate::error::{ConfigError, FatalError};
use crate::pdp_json::PdpJson;

const MAX_TOTAL_BYTES: u64 = 10 * 1024 * 1024;
const MAX_FILE_COUNT: usize = 1000;

/// Discover `pdp.json` and immediate-child `*.sapl` files under `root` and
/// build a [`PdpConfiguration`], honoring the size/file-count caps.
/// Subdirectories are ignored; symbolic links are followed (spec §4.4.1,
/// §9 "Symbolic-link policy").
pub fn build_configuration(root: &Path, pdp_id: &str) -> Result<PdpConfiguration, ConfigError> {
    let mut sapl_documents = Vec::new();
    let mut total_bytes: u64 = 0;
    let mut file_count = 0usize;

    let entries = std::fs::read_dir(root).map_err(|e| ConfigError::InvalidPdpJson(e.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::InvalidPdpJson(e.to_string()))?;
        let path = entry.path();
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(_) => continue,
        };
        if !metadata.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("sapl") {
            continue;
        }
        file_count += 1;
        total_bytes += metadata.len();
        if total_bytes > MAX_TOTAL_BYTES || file_count > MAX_FILE_COUNT {
            return Err(ConfigError::LimitExceeded);
        }
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::InvalidPdpJson(e.to_string()))?;
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
        sapl_documents.push(SaplDocument { name, text });
    }
    sapl_documents.sort_by(|a, b| a.name.cmp(&b.name));

    let pdp_json_path = root.join("pdp.json");
    let pdp_json_bytes = if pdp_json_path.is_file() {
        std::fs::read(&pdp_json_path).map_err(|e| ConfigError::InvalidPdpJson(e.to_string()))?
    } else {
        Vec::new()
    };
    let pdp_json = if pdp_json_bytes.is_empty() { PdpJson::default() } else { PdpJson::parse(&pdp_json_bytes)? };

    let mut config = PdpConfiguration::new(pdp_id.to_string(), pdp_json, sapl_documents);
    if config.configuration_id.is_none() {
        let mut content = pdp_json_bytes;
        for doc in &config.sapl_documents {
            content.extend_from_slice(doc.name.as_bytes());
            content.extend_from_slice(doc.text.as_bytes());
        }
        config.configuration_id = Some(configuration_id("directory", &root.display().to_string(), &content));
    }
    Ok(config)
}

/// Watches one directory, publishing a fresh [`PdpConfiguration`] on every
/// create/modify/delete of `pdp.json` or a `*.sapl` file.
pub struct DirectorySource {
    disposed: Arc<AtomicBool>,
    _watcher: notify::RecommendedWatcher,
}

impl DirectorySource {
    /// Construct, perform the initial load/publish (skipped, not fatal, if
    /// it fails validation), and start watching.
    pub fn start(
        root: impl Into<PathBuf>,
        pdp_id: impl Into<String>,
        sink: Arc<dyn VoterSource>,
    ) -> Result<Self, FatalError> {
        let root = root.into();
        let pdp_id = pdp_id.into();
        if !root.is_dir() {
            return Err(FatalError::NotADirectory);
        }
        if !is_valid_pdp_id(&pdp_id) {
            return Err(FatalError::InvalidPdpId);
        }

        publish_if_valid(&root, &pdp_id, sink.as_ref());

        let disposed = Arc::new(AtomicBool::new(false));
        let (tx, rx) = channel::<notify::Result<notify::Event>>();
        let mut watcher =
            notify::recommended_watcher(move |res| { let _ = tx.send(res); }).map_err(|e| FatalError::Watch(e.to_string()))?;
        watcher.watch(&root, RecursiveMode::NonRecursive).map_err(|e| FatalError::Watch(e.to_string()))?;

        let watch_root = root.clone();
        let watch_pdp_id = pdp_id.clone();
        let watch_disposed = Arc::clone(&disposed);
        std::thread::spawn(move || {
            for res in rx {
                if watch_disposed.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(event) = res else { continue };
                if !event.paths.iter().any(is_relevant_path) {
                    continue;
                }
                publish_if_valid(&watch_root, &watch_pdp_id, sink.as_ref());
            }
        });

        Ok(Self { disposed, _watcher: watcher })
    }

    /// Stop watching. Idempotent; a second call is a no-op.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

fn is_relevant_path(path: &PathBuf) -> bool {
    path.file_name().and_then(|n| n.to_str()) == Some("pdp.json")
        || path.extension().and_then(|e| e.to_str()) == Some("sapl")
}

fn publish_if_valid(root: &Path, pdp_id: &str, sink: &dyn VoterSource) {
    match build_configuration(root, pdp_id) {
        Ok(config) => sink.load_configuration(config, true),
        Err(err) => tracing::warn!(pdp_id, %err, "skipping directory source publish"),
    }
}
