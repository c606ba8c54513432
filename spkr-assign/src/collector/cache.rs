//! Content-addressed cache for conversation analysis
//!
//! The key is the BLAKE3 hash of the analyzer identity plus the conversation
//! text, so identical content hits the cache no matter which file it came
//! from or when. Entries are JSON files named `<key>.json`.
//!
//! Cache problems never fail a run: unreadable entries and failed writes
//! are logged and the live analyzer result is used.

use crate::types::{Conversation, ConversationAnalyzer, NameDetection, ProviderError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cache key for an analyzer/conversation pair
pub fn cache_key(analyzer: &str, text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(analyzer.as_bytes());
    hasher.update(&[0]);
    hasher.update(text.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Wraps an analyzer with an on-disk response cache
pub struct CachedAnalyzer {
    inner: Arc<dyn ConversationAnalyzer>,
    cache_dir: PathBuf,
}

impl CachedAnalyzer {
    pub fn new(inner: Arc<dyn ConversationAnalyzer>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            cache_dir: cache_dir.into(),
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    async fn read_entry(&self, path: &Path) -> Option<Vec<NameDetection>> {
        let content = tokio::fs::read_to_string(path).await.ok()?;
        match serde_json::from_str(&content) {
            Ok(detections) => Some(detections),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupt cache entry");
                None
            }
        }
    }

    async fn write_entry(&self, path: &Path, detections: &[NameDetection]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        let json = serde_json::to_vec_pretty(detections)?;
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, path).await
    }
}

#[async_trait]
impl ConversationAnalyzer for CachedAnalyzer {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn analyze(&self, conversation: &Conversation) -> Result<Vec<NameDetection>, ProviderError> {
        let key = cache_key(self.inner.name(), &conversation.text);
        let path = self.entry_path(&key);

        if let Some(detections) = self.read_entry(&path).await {
            debug!(source = %conversation.source, key = %&key[..16], "Analysis cache hit");
            return Ok(detections);
        }

        let detections = self.inner.analyze(conversation).await?;

        if let Err(e) = self.write_entry(&path, &detections).await {
            warn!(path = %path.display(), error = %e, "Failed to write analysis cache entry");
        }

        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAnalyzer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ConversationAnalyzer for CountingAnalyzer {
        fn name(&self) -> &str {
            "counting"
        }

        async fn analyze(&self, _c: &Conversation) -> Result<Vec<NameDetection>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![NameDetection {
                label: "A".to_string(),
                candidate_name: "Alice".to_string(),
                confidence: 0.9,
                evidence_quotes: vec![],
            }])
        }
    }

    fn conversation(source: &str, text: &str) -> Conversation {
        Conversation {
            source: source.to_string(),
            text: text.to_string(),
            labels: vec!["A".to_string()],
        }
    }

    #[test]
    fn test_key_depends_on_content_and_analyzer() {
        assert_eq!(cache_key("a", "hello"), cache_key("a", "hello"));
        assert_ne!(cache_key("a", "hello"), cache_key("b", "hello"));
        assert_ne!(cache_key("a", "hello"), cache_key("a", "hello!"));
    }

    #[tokio::test]
    async fn test_identical_content_hits_cache_regardless_of_source() {
        let dir = tempfile::tempdir().unwrap();
        let inner = Arc::new(CountingAnalyzer {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedAnalyzer::new(inner.clone(), dir.path());

        let first = cached.analyze(&conversation("one.json", "A: hi")).await.unwrap();
        let second = cached.analyze(&conversation("two.json", "A: hi")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        cached.analyze(&conversation("one.json", "A: bye")).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_corrupt_entry_falls_back_to_live_call() {
        let dir = tempfile::tempdir().unwrap();
        let inner = Arc::new(CountingAnalyzer {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedAnalyzer::new(inner.clone(), dir.path());

        let key = cache_key("counting", "A: hi");
        std::fs::write(dir.path().join(format!("{}.json", key)), "not json").unwrap();

        let detections = cached.analyze(&conversation("x", "A: hi")).await.unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
