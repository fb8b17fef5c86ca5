// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::prompt::{PromptFetcher, PromptSource, FALLBACK_PROMPT};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{info, warn};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Single-slot, process-wide cache of the rendered agent system prompt.
///
/// A fresh value is served for `ttl` after a successful fetch. On miss the
/// fetch runs under the write lock, so concurrent misses collapse into one
/// server round-trip; failures fall back to the static prompt and are not
/// cached, so the next call retries.
pub struct PromptCache {
    fetcher: Arc<dyn PromptFetcher>,
    ttl: Duration,
    slot: RwLock<Option<(String, Instant)>>,
}

impl PromptCache {
    pub fn new(fetcher: Arc<dyn PromptFetcher>, ttl_secs: u64) -> Self {
        Self {
            fetcher,
            ttl: Duration::from_secs(ttl_secs),
            slot: RwLock::new(None),
        }
    }

    fn fresh(&self, slot: &Option<(String, Instant)>) -> Option<String> {
        slot.as_ref().and_then(|(value, fetched_at)| {
            (fetched_at.elapsed() < self.ttl).then(|| value.clone())
        })
    }
}

#[async_trait]
impl PromptSource for PromptCache {
    async fn fetch(&self) -> String {
        {
            let slot = self.slot.read().await;
            if let Some(value) = self.fresh(&slot) {
                return value;
            }
        }

        let mut slot = self.slot.write().await;
        // Double-checked: a concurrent writer may have refreshed the slot.
        if let Some(value) = self.fresh(&slot) {
            return value;
        }

        match tokio::time::timeout(FETCH_TIMEOUT, self.fetcher.fetch_from_server()).await {
            Ok(Ok(prompt)) => {
                info!(chars = prompt.len(), "Fetched agent system prompt from tool server");
                *slot = Some((prompt.clone(), Instant::now()));
                prompt
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Prompt fetch failed, using fallback prompt");
                FALLBACK_PROMPT.to_string()
            }
            Err(_) => {
                warn!("Prompt fetch timed out, using fallback prompt");
                FALLBACK_PROMPT.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::prompt::PromptFetchError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl PromptFetcher for CountingFetcher {
        async fn fetch_from_server(&self) -> Result<String, PromptFetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                Err(PromptFetchError::Unreachable("refused".into()))
            } else {
                Ok(format!("prompt v{}", call))
            }
        }
    }

    #[tokio::test]
    async fn serves_cached_value_within_ttl() {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cache = PromptCache::new(fetcher.clone(), 3600);

        assert_eq!(cache.fetch().await, "prompt v1");
        assert_eq!(cache.fetch().await, "prompt v1");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_after_ttl_expiry() {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cache = PromptCache::new(fetcher.clone(), 10);

        assert_eq!(cache.fetch().await, "prompt v1");
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.fetch().await, "prompt v2");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failure_yields_fallback_and_is_not_cached() {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let cache = PromptCache::new(fetcher.clone(), 3600);

        assert_eq!(cache.fetch().await, FALLBACK_PROMPT);
        assert_eq!(cache.fetch().await, FALLBACK_PROMPT);
        // Every call retried the server because nothing was cached.
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }
}
