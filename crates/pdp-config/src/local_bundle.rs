//! [`LocalBundleSource`]: treat every `*.saplbundle` file in a directory as
//! a distinct bundle, named by its filename (spec §4.4.3).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};

use notify::{RecursiveMode, Watcher};
use pdp_bundle::{Bundle, BundleParser};

use crate::configuration::{is_valid_pdp_id, PdpConfiguration, SaplDocument, VoterSource};
use crate::configuration_id::configuration_id;
use crate::error::{ConfigError, FatalError};
use crate::pdp_json::PdpJson;
use crate::security::BundleSecurityPolicy;

/// Parse and validate `bytes` as a bundle, producing the [`PdpConfiguration`]
/// it describes under `pdp_id`. `source_path` identifies the bundle file for
/// the fallback `configurationId` when `pdp.json` does not declare one.
pub fn load_bundle(
    bytes: &[u8],
    pdp_id: &str,
    policy: &BundleSecurityPolicy,
    source_path: &str,
) -> Result<PdpConfiguration, ConfigError> {
    let bundle: Bundle = BundleParser::parse(bytes).map_err(ConfigError::BundleRejected)?;
    policy.check(&bundle)?;

    let pdp_json = PdpJson::parse(&bundle.pdp_json)?;
    let sapl_documents = bundle
        .sapl_documents
        .iter()
        .map(|(name, bytes)| SaplDocument { name: name.clone(), text: String::from_utf8_lossy(bytes).into_owned() })
        .collect();
    let mut config = PdpConfiguration::new(pdp_id.to_string(), pdp_json, sapl_documents);
    if config.configuration_id.is_none() {
        config.configuration_id = Some(configuration_id("bundle", source_path, bytes));
    }
    Ok(config)
}

/// Watches a directory of `*.saplbundle` files, publishing/removing
/// configurations as bundles appear, change, or disappear.
pub struct LocalBundleSource {
    disposed: Arc<std::sync::atomic::AtomicBool>,
    _watcher: notify::RecommendedWatcher,
}

impl LocalBundleSource {
    /// Construct, load every existing `*.saplbundle` file, and start
    /// watching `root` for changes.
    pub fn start(
        root: impl Into<PathBuf>,
        policy: BundleSecurityPolicy,
        sink: Arc<dyn VoterSource>,
    ) -> Result<Self, FatalError> {
        policy.validate()?;
        let root = root.into();
        if !root.is_dir() {
            return Err(FatalError::NotADirectory);
        }

        let known = Arc::new(Mutex::new(HashMap::<String, PathBuf>::new()));
        for entry in std::fs::read_dir(&root).map_err(|_| FatalError::NotADirectory)? {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if let Some(pdp_id) = bundle_pdp_id(&path) {
                known.lock().unwrap().insert(pdp_id.clone(), path.clone());
                publish_bundle_file(&path, &pdp_id, &policy, sink.as_ref());
            }
        }

        let disposed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let (tx, rx) = channel::<notify::Result<notify::Event>>();
        let mut watcher =
            notify::recommended_watcher(move |res| { let _ = tx.send(res); }).map_err(|e| FatalError::Watch(e.to_string()))?;
        watcher.watch(&root, RecursiveMode::NonRecursive).map_err(|e| FatalError::Watch(e.to_string()))?;

        let watch_disposed = Arc::clone(&disposed);
        std::thread::spawn(move || {
            for res in rx {
                if watch_disposed.load(std::sync::atomic::Ordering::SeqCst) {
                    break;
                }
                let Ok(event) = res else { continue };
                for path in &event.paths {
                    let Some(pdp_id) = bundle_pdp_id(path) else { continue };
                    if path.exists() {
                        known.lock().unwrap().insert(pdp_id.clone(), path.clone());
                        publish_bundle_file(path, &pdp_id, &policy, sink.as_ref());
                    } else {
                        known.lock().unwrap().remove(&pdp_id);
                        sink.remove_configuration_for_pdp(&pdp_id);
                    }
                }
            }
        });

        Ok(Self { disposed, _watcher: watcher })
    }

    /// Stop watching. Idempotent.
    pub fn dispose(&self) {
        self.disposed.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

fn bundle_pdp_id(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some("saplbundle") {
        return None;
    }
    let pdp_id = path.file_stem().and_then(|s| s.to_str())?.to_string();
    is_valid_pdp_id(&pdp_id).then_some(pdp_id)
}

fn publish_bundle_file(path: &Path, pdp_id: &str, policy: &BundleSecurityPolicy, sink: &dyn VoterSource) {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(pdp_id, %err, "failed to read bundle file");
            return;
        }
    };
    match load_bundle(&bytes, pdp_id, policy, &path.display().to_string()) {
        Ok(config) => sink.load_configuration(config, true),
        Err(err) => tracing::warn!(pdp_id, %err, "skipping invalid bundle"),
    }
}
