//! [`MultiDirectorySource`]: treat each immediate subdirectory of a root as
//! an independent [`DirectorySource`], named by the subdirectory (spec
//! §4.4.2).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify::{RecursiveMode, Watcher};

use crate::configuration::VoterSource;
use crate::directory::DirectorySource;
use crate::error::FatalError;

/// Watches a root directory, spawning one [`DirectorySource`] per immediate
/// subdirectory (using the subdirectory's name as `pdpId`), plus optionally
/// the root itself as `"default"`.
pub struct MultiDirectorySource {
    sources: Arc<Mutex<HashMap<String, DirectorySource>>>,
    _watcher: notify::RecommendedWatcher,
}

impl MultiDirectorySource {
    /// Construct, discover existing subdirectories, and start watching `R`
    /// for subdirectory additions/removals.
    pub fn start(
        root: impl Into<PathBuf>,
        include_root_files: bool,
        sink: Arc<dyn VoterSource>,
    ) -> Result<Self, FatalError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(FatalError::NotADirectory);
        }

        let sources = Arc::new(Mutex::new(HashMap::new()));
        let mut has_default = false;
        for entry in std::fs::read_dir(&root).map_err(|_| FatalError::NotADirectory)? {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if name == "default" {
                has_default = true;
            }
            if let Ok(source) = DirectorySource::start(path, name, Arc::clone(&sink)) {
                sources.lock().unwrap().insert(name.to_string(), source);
            }
        }
        if include_root_files && !has_default {
            if let Ok(source) = DirectorySource::start(root.clone(), "default", Arc::clone(&sink)) {
                sources.lock().unwrap().insert("default".to_string(), source);
            }
        }

        let (tx, rx) = channel::<notify::Result<notify::Event>>();
        let mut watcher =
            notify::recommended_watcher(move |res| { let _ = tx.send(res); }).map_err(|e| FatalError::Watch(e.to_string()))?;
        watcher.watch(&root, RecursiveMode::NonRecursive).map_err(|e| FatalError::Watch(e.to_string()))?;

        let watch_root = root.clone();
        let watch_sources = Arc::clone(&sources);
        std::thread::spawn(move || {
            for res in rx {
                let Ok(event) = res else { continue };
                for path in &event.paths {
                    if path.parent() != Some(watch_root.as_path()) {
                        continue;
                    }
                    let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
                    let mut guard = watch_sources.lock().unwrap();
                    if path.is_dir() {
                        if !guard.contains_key(name) {
                            if let Ok(source) = DirectorySource::start(path.clone(), name, Arc::clone(&sink)) {
                                guard.insert(name.to_string(), source);
                            }
                        }
                    } else if !path.exists() {
                        if let Some(source) = guard.remove(name) {
                            source.dispose();
                            sink.remove_configuration_for_pdp(name);
                        }
                    }
                }
            }
        });

        Ok(Self { sources, _watcher: watcher })
    }

    /// Stop every subdirectory watcher. Idempotent.
    pub fn dispose(&self) {
        for source in self.sources.lock().unwrap().values() {
            source.dispose();
        }
    }
}
