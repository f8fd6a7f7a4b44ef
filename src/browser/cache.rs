//! On-disk V8 compilation cache.
//!
//! Entries produced by the browser (`Page.compilationCacheProduced`) are
//! written as `<hash>.bin` files next to an `index.json` mapping script URLs
//! to file names. On open, every entry is handed back to the browser with
//! `Page.addCompilationCache`.
//!
//! # Directory Layout
//!
//! ```text
//! cache_dir/
//! ├── index.json
//! ├── 5f3a9c0e1d2b4a67.bin
//! └── ...
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::Mutex;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::protocol::ParsedEvent;
use crate::session::{Session, SessionEvents};

// ============================================================================
// Constants
// ============================================================================

const INDEX_FILE: &str = "index.json";

// ============================================================================
// CacheIndex
// ============================================================================

/// Script URL → cache file name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CacheIndex {
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

impl CacheIndex {
    fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, dir: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(INDEX_FILE), content)?;
        Ok(())
    }
}

fn file_name(url: &str) -> String {
    let mut hasher = FxHasher::default();
    url.hash(&mut hasher);
    format!("{:016x}.bin", hasher.finish())
}

// ============================================================================
// ScriptCache
// ============================================================================

/// Persistent compilation cache for one window.
#[derive(Debug, Clone)]
pub struct ScriptCache {
    session: Session,
    dir: PathBuf,
    index: Arc<Mutex<CacheIndex>>,
}

impl ScriptCache {
    /// Opens `dir`, creating it if needed, and seeds the browser with every
    /// stored entry.
    ///
    /// Entries whose file is missing are dropped from the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or index cannot be read.
    pub async fn open(session: Session, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let mut index = CacheIndex::load(&dir)?;

        let mut seeded = 0usize;
        let mut missing = Vec::new();
        for (url, name) in &index.entries {
            let Ok(bytes) = fs::read(dir.join(name)) else {
                missing.push(url.clone());
                continue;
            };

            let params = json!({ "url": url, "data": BASE64.encode(bytes) });
            match session.send("Page.addCompilationCache", params).await {
                Ok(_) => seeded += 1,
                Err(e) => debug!(url = %url, error = %e, "Failed to seed compilation cache"),
            }
        }

        if !missing.is_empty() {
            for url in &missing {
                index.entries.remove(url);
            }
            index.save(&dir)?;
        }

        debug!(dir = %dir.display(), seeded, "Script cache opened");
        Ok(Self {
            session,
            dir,
            index: Arc::new(Mutex::new(index)),
        })
    }

    /// Returns the cache directory.
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the cached script URLs, sorted.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.index.lock().entries.keys().cloned().collect()
    }

    /// Returns the number of cached scripts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.lock().entries.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.lock().entries.is_empty()
    }

    /// Persists one base64 cache entry for `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is not base64 or cannot be written.
    pub fn store(&self, url: &str, data: &str) -> Result<()> {
        let bytes = BASE64
            .decode(data)
            .map_err(|e| Error::protocol(format!("Invalid compilation cache data: {e}")))?;

        let name = file_name(url);
        fs::write(self.dir.join(&name), &bytes)?;

        let snapshot = {
            let mut index = self.index.lock();
            index.entries.insert(url.to_string(), name);
            index.clone()
        };
        snapshot.save(&self.dir)?;

        debug!(url, bytes = bytes.len(), "Compilation cache stored");
        Ok(())
    }

    /// Asks the browser to produce cache entries for `urls`.
    ///
    /// Entries arrive later as `Page.compilationCacheProduced`.
    ///
    /// # Errors
    ///
    /// Returns the protocol error.
    pub async fn produce(&self, urls: &[&str]) -> Result<()> {
        let scripts: Vec<_> = urls.iter().map(|url| json!({ "url": url })).collect();
        self.session
            .send("Page.produceCompilationCache", json!({ "scripts": scripts }))
            .await?;
        Ok(())
    }

    /// Clears the browser's cache and removes every stored entry.
    ///
    /// # Errors
    ///
    /// Returns an error if files cannot be removed.
    pub async fn clear(&self) -> Result<()> {
        if let Err(e) = self
            .session
            .send("Page.clearCompilationCache", json!({}))
            .await
        {
            debug!(error = %e, "Failed to clear browser compilation cache");
        }

        let names: Vec<String> = {
            let mut index = self.index.lock();
            let names = index.entries.values().cloned().collect();
            index.entries.clear();
            names
        };

        for name in names {
            let path = self.dir.join(name);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        CacheIndex::default().save(&self.dir)
    }

    /// Persists produced entries until `closed` flips.
    pub fn spawn(
        &self,
        mut events: SessionEvents,
        mut closed: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        if let ParsedEvent::CompilationCacheProduced { url, data } = event.parse()
                            && let Err(e) = cache.store(&url, &data)
                        {
                            warn!(url = %url, error = %e, "Failed to persist compilation cache");
                        }
                    }
                    _ = closed.wait_for(|closed| *closed) => break,
                }
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::identifiers::SessionId;
    use crate::protocol::ProtocolEvent;
    use crate::session::TargetFilter;
    use crate::transport::testing::MockTransport;

    async fn session(mock: &Arc<MockTransport>) -> Session {
        Session::establish(mock.clone(), &TargetFilter::AnyPage)
            .await
            .expect("establish")
    }

    #[tokio::test]
    async fn test_store_then_reopen_seeds_browser() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mock = MockTransport::with_page("https://a.test/");

        let cache = ScriptCache::open(session(&mock).await, dir.path())
            .await
            .expect("open");
        assert!(cache.is_empty());
        cache.store("https://a.test/app.js", "AQID").expect("store");
        assert_eq!(cache.urls(), vec!["https://a.test/app.js"]);

        let reopened = ScriptCache::open(session(&mock).await, dir.path())
            .await
            .expect("reopen");
        assert_eq!(reopened.len(), 1);

        let seed = &mock.calls_to("Page.addCompilationCache")[0];
        assert_eq!(seed.params["url"], "https://a.test/app.js");
        assert_eq!(seed.params["data"], "AQID");
    }

    #[tokio::test]
    async fn test_missing_files_are_pruned() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mock = MockTransport::with_page("https://a.test/");
        let cache = ScriptCache::open(session(&mock).await, dir.path())
            .await
            .expect("open");
        cache.store("https://a.test/x.js", "AQID").expect("store");
        fs::remove_file(dir.path().join(file_name("https://a.test/x.js"))).expect("remove");

        let reopened = ScriptCache::open(session(&mock).await, dir.path())
            .await
            .expect("reopen");

        assert!(reopened.is_empty());
        assert_eq!(mock.count("Page.addCompilationCache"), 0);
    }

    #[tokio::test]
    async fn test_produced_entries_are_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mock = MockTransport::with_page("https://a.test/");
        let session = session(&mock).await;
        let cache = ScriptCache::open(session.clone(), dir.path())
            .await
            .expect("open");
        let (closed_tx, closed_rx) = watch::channel(false);
        let task = cache.spawn(session.events(), closed_rx);

        cache.produce(&["https://a.test/app.js"]).await.expect("produce");
        mock.emit(ProtocolEvent::new(
            "Page.compilationCacheProduced",
            json!({ "url": "https://a.test/app.js", "data": "AQID" }),
            Some(SessionId::new("S1")),
        ));

        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while cache.is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("entry persisted");

        let bytes = fs::read(dir.path().join(file_name("https://a.test/app.js"))).expect("read");
        assert_eq!(bytes, vec![1, 2, 3]);

        closed_tx.send_replace(true);
        task.await.expect("cache task");
    }

    #[tokio::test]
    async fn test_clear_removes_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mock = MockTransport::with_page("https://a.test/");
        let cache = ScriptCache::open(session(&mock).await, dir.path())
            .await
            .expect("open");
        cache.store("https://a.test/x.js", "AQID").expect("store");

        cache.clear().await.expect("clear");

        assert!(cache.is_empty());
        assert!(!dir.path().join(file_name("https://a.test/x.js")).exists());
        assert_eq!(mock.count("Page.clearCompilationCache"), 1);
    }
}
