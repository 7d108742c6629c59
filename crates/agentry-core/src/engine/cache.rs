//! Agent-instance cache.
//!
//! Holds at most `max_size` engines keyed by `config_id`, so that many
//! conversations against one configuration share a single engine. Entries
//! idle longer than `max_idle` are stale and get rebuilt on next use. When
//! the cache overflows, the least-recently-used entry is evicted.
//!
//! A single async mutex guards the whole map and is held across the factory
//! call. Concurrent misses for the same id therefore build the engine once;
//! misses for different ids serialize.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use agentry_types::agent::AgentConfiguration;
use agentry_types::engine::{CacheEntryStats, CacheSettings, CacheStats};
use agentry_types::error::EngineError;

use super::{AgentEngineFactory, SharedEngine};

struct AgentInstance {
    engine: SharedEngine,
    created_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
    /// Monotonic twin of `last_used`, used for staleness.
    last_used_at: Instant,
    usage_count: u64,
    /// Recency rank; the smallest value is the LRU entry.
    use_seq: u64,
}

impl AgentInstance {
    fn is_stale(&self, now: Instant, max_idle: Duration) -> bool {
        now.saturating_duration_since(self.last_used_at) > max_idle
    }

    fn mark_used(&mut self, now: Instant, seq: u64) {
        self.last_used = Utc::now();
        self.last_used_at = now;
        self.usage_count += 1;
        self.use_seq = seq;
    }
}

struct CacheState {
    entries: HashMap<String, AgentInstance>,
    max_size: usize,
    next_seq: u64,
}

impl CacheState {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Remove LRU entries until the size limit holds again.
    fn evict_overflow(&mut self) -> Vec<(String, SharedEngine)> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.max_size {
            let Some(lru_id) = self
                .entries
                .iter()
                .min_by_key(|(_, instance)| instance.use_seq)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            if let Some(instance) = self.entries.remove(&lru_id) {
                evicted.push((lru_id, instance.engine));
            }
        }
        evicted
    }
}

/// Bounded, idle-expiring cache of engine handles keyed by configuration id.
pub struct AgentCache {
    state: Mutex<CacheState>,
    max_idle: Duration,
}

impl AgentCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self::with_limits(settings.max_size, Duration::from_secs(settings.max_idle_secs))
    }

    /// `max_size` is clamped to at least one entry.
    pub fn with_limits(max_size: usize, max_idle: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                max_size: max_size.max(1),
                next_seq: 0,
            }),
            max_idle,
        }
    }

    /// Return the live engine for `config`, building it with `factory` when
    /// absent or stale.
    pub async fn get_or_create<F: AgentEngineFactory>(
        &self,
        config: &AgentConfiguration,
        factory: &F,
    ) -> Result<SharedEngine, EngineError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let config_id = config.config_id.as_str();
        let now = Instant::now();

        if let Some(instance) = state.entries.get(config_id) {
            if !instance.is_stale(now, self.max_idle) {
                let seq = state.next_seq();
                if let Some(instance) = state.entries.get_mut(config_id) {
                    instance.mark_used(now, seq);
                    debug!(
                        config_id,
                        usage_count = instance.usage_count,
                        "Reusing cached agent engine"
                    );
                    return Ok(Arc::clone(&instance.engine));
                }
            }
        }

        if let Some(stale) = state.entries.remove(config_id) {
            info!(config_id, "Cached agent engine is stale, rebuilding");
            retire(config_id.to_string(), stale.engine);
        }

        info!(config_id, name = %config.name, "Creating agent engine");
        let engine: SharedEngine = Arc::new(factory.create_from_config(config).await?);

        let seq = state.next_seq();
        let created_at = Utc::now();
        state.entries.insert(
            config_id.to_string(),
            AgentInstance {
                engine: Arc::clone(&engine),
                created_at,
                last_used: created_at,
                last_used_at: Instant::now(),
                usage_count: 1,
                use_seq: seq,
            },
        );

        for (evicted_id, evicted) in state.evict_overflow() {
            info!(config_id = %evicted_id, "Evicted least-recently-used agent engine");
            retire(evicted_id, evicted);
        }

        Ok(engine)
    }

    /// Remove every entry idle longer than `max_idle`. Returns how many were removed.
    pub async fn evict_stale(&self) -> usize {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let stale_ids: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, instance)| instance.is_stale(now, self.max_idle))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale_ids {
            if let Some(instance) = state.entries.remove(id) {
                retire(id.clone(), instance.engine);
            }
        }

        if !stale_ids.is_empty() {
            info!(count = stale_ids.len(), "Evicted stale agent engines");
        }
        stale_ids.len()
    }

    /// Drop the entry for one configuration. Returns whether one existed.
    pub async fn invalidate(&self, config_id: &str) -> bool {
        let mut state = self.state.lock().await;
        match state.entries.remove(config_id) {
            Some(instance) => {
                debug!(config_id, "Invalidated cached agent engine");
                retire(config_id.to_string(), instance.engine);
                true
            }
            None => false,
        }
    }

    /// Change the capacity. Shrinking evicts LRU entries immediately.
    pub async fn resize(&self, max_size: usize) {
        let mut state = self.state.lock().await;
        state.max_size = max_size.max(1);
        for (evicted_id, evicted) in state.evict_overflow() {
            info!(config_id = %evicted_id, "Evicted agent engine after resize");
            retire(evicted_id, evicted);
        }
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        let count = state.entries.len();
        for (id, instance) in state.entries.drain() {
            retire(id, instance.engine);
        }
        info!(count, "Cleared agent cache");
    }

    /// Snapshot of the cache, most recently used first.
    pub async fn stats(&self) -> CacheStats {
        let state = self.state.lock().await;
        let mut ranked: Vec<(&String, &AgentInstance)> = state.entries.iter().collect();
        ranked.sort_by(|a, b| b.1.use_seq.cmp(&a.1.use_seq));

        CacheStats {
            size: state.entries.len(),
            max_size: state.max_size,
            max_idle_secs: self.max_idle.as_secs(),
            entries: ranked
                .into_iter()
                .map(|(id, instance)| CacheEntryStats {
                    config_id: id.clone(),
                    created_at: instance.created_at,
                    last_used: instance.last_used,
                    usage_count: instance.usage_count,
                })
                .collect(),
        }
    }
}

/// Shut an evicted engine down in the background. Failures are only logged.
///
/// An engine still held by an in-flight turn is left running; its resources
/// are released when the last holder drops it.
fn retire(config_id: String, engine: SharedEngine) {
    let engine = match Arc::try_unwrap(engine) {
        Ok(engine) => engine,
        Err(in_use) => {
            debug!(
                config_id = %config_id,
                holders = Arc::strong_count(&in_use) - 1,
                "Evicted agent engine still in use, deferring teardown to last drop"
            );
            return;
        }
    };
    tokio::spawn(async move {
        if let Err(e) = engine.shutdown().await {
            warn!(config_id = %config_id, error = %e, "Failed to shut down evicted agent engine");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use agentry_types::agent::ToolServerConfig;
    use agentry_types::conversation::ConversationMessage;
    use agentry_types::engine::InvocationResult;

    use crate::engine::{AgentEngine, BoxAgentEngine};

    struct StubEngine {
        shutdowns: Arc<AtomicUsize>,
        fail_shutdown: bool,
    }

    impl AgentEngine for StubEngine {
        async fn invoke(
            &self,
            _messages: &[ConversationMessage],
        ) -> Result<InvocationResult, EngineError> {
            Ok(InvocationResult::from_text("ok"))
        }

        async fn shutdown(&self) -> Result<(), EngineError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            if self.fail_shutdown {
                Err(EngineError::Shutdown("tool server already gone".to_string()))
            } else {
                Ok(())
            }
        }
    }

    /// Counts builds; optionally sleeps to widen race windows.
    #[derive(Default)]
    struct CountingFactory {
        builds: AtomicUsize,
        shutdowns: Arc<AtomicUsize>,
        delay: Option<Duration>,
        fail_shutdown: bool,
    }

    impl AgentEngineFactory for CountingFactory {
        async fn create_from_config(
            &self,
            _config: &AgentConfiguration,
        ) -> Result<BoxAgentEngine, EngineError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(BoxAgentEngine::new(StubEngine {
                shutdowns: Arc::clone(&self.shutdowns),
                fail_shutdown: self.fail_shutdown,
            }))
        }
    }

    struct FailingFactory;

    impl AgentEngineFactory for FailingFactory {
        async fn create_from_config(
            &self,
            _config: &AgentConfiguration,
        ) -> Result<BoxAgentEngine, EngineError> {
            Err(EngineError::ToolServer {
                name: "calc".to_string(),
                message: "command not found".to_string(),
            })
        }
    }

    fn config(name: &str) -> AgentConfiguration {
        AgentConfiguration::new(
            name,
            vec![ToolServerConfig::stdio("calc", "calc-server", vec![])],
            None,
            None,
        )
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_hit_returns_same_engine_and_counts_usage() {
        let cache = AgentCache::new(&CacheSettings::default());
        let factory = CountingFactory::default();
        let cfg = config("demo");

        let first = cache.get_or_create(&cfg, &factory).await.unwrap();
        let second = cache.get_or_create(&cfg, &factory).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);

        let stats = cache.stats().await;
        assert_eq!(stats.size, 1);
        assert_eq!(stats.entries[0].usage_count, 2);
        assert!(stats.entries[0].last_used >= stats.entries[0].created_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_misses_build_once() {
        let cache = AgentCache::new(&CacheSettings::default());
        let factory = CountingFactory {
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        };
        let cfg = config("demo");

        let (a, b) = tokio::join!(
            cache.get_or_create(&cfg, &factory),
            cache.get_or_create(&cfg, &factory)
        );

        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_overflow_evicts_least_recently_used() {
        let cache = AgentCache::with_limits(2, Duration::from_secs(1800));
        let factory = CountingFactory::default();
        let (a, b, c) = (config("a"), config("b"), config("c"));

        cache.get_or_create(&a, &factory).await.unwrap();
        cache.get_or_create(&b, &factory).await.unwrap();
        // Touch `a` so `b` becomes the LRU entry.
        cache.get_or_create(&a, &factory).await.unwrap();
        cache.get_or_create(&c, &factory).await.unwrap();

        let stats = cache.stats().await;
        let ids: Vec<&str> = stats.entries.iter().map(|e| e.config_id.as_str()).collect();
        assert_eq!(stats.size, 2);
        assert_eq!(ids, vec![c.config_id.as_str(), a.config_id.as_str()]);

        settle().await;
        assert_eq!(factory.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_entry_is_rebuilt() {
        let cache = AgentCache::with_limits(10, Duration::from_secs(60));
        let factory = CountingFactory::default();
        let cfg = config("demo");

        let first = cache.get_or_create(&cfg, &factory).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        let second = cache.get_or_create(&cfg, &factory).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().await.entries[0].usage_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_within_idle_limit_is_kept() {
        let cache = AgentCache::with_limits(10, Duration::from_secs(60));
        let factory = CountingFactory::default();
        let cfg = config("demo");

        cache.get_or_create(&cfg, &factory).await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        cache.get_or_create(&cfg, &factory).await.unwrap();

        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_stale_removes_only_idle_entries() {
        let cache = AgentCache::with_limits(10, Duration::from_secs(60));
        let factory = CountingFactory::default();
        let (old, fresh) = (config("old"), config("fresh"));

        cache.get_or_create(&old, &factory).await.unwrap();
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.get_or_create(&fresh, &factory).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(cache.evict_stale().await, 1);
        let stats = cache.stats().await;
        assert_eq!(stats.size, 1);
        assert_eq!(stats.entries[0].config_id, fresh.config_id);
    }

    #[tokio::test]
    async fn test_factory_failure_leaves_cache_unchanged() {
        let cache = AgentCache::new(&CacheSettings::default());
        let err = cache
            .get_or_create(&config("demo"), &FailingFactory)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::ToolServer { .. }));
        assert_eq!(cache.stats().await.size, 0);
    }

    #[tokio::test]
    async fn test_resize_shrink_evicts_lru() {
        let cache = AgentCache::with_limits(3, Duration::from_secs(1800));
        let factory = CountingFactory::default();
        let configs: Vec<_> = ["a", "b", "c"].into_iter().map(config).collect();
        for cfg in &configs {
            cache.get_or_create(cfg, &factory).await.unwrap();
        }

        cache.resize(1).await;

        let stats = cache.stats().await;
        assert_eq!(stats.max_size, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.entries[0].config_id, configs[2].config_id);

        // Capacity stays at one after the shrink.
        cache.get_or_create(&configs[0], &factory).await.unwrap();
        assert_eq!(cache.stats().await.size, 1);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = AgentCache::new(&CacheSettings::default());
        let factory = CountingFactory {
            fail_shutdown: true,
            ..Default::default()
        };
        let (a, b) = (config("a"), config("b"));
        cache.get_or_create(&a, &factory).await.unwrap();
        cache.get_or_create(&b, &factory).await.unwrap();

        assert!(cache.invalidate(&a.config_id).await);
        assert!(!cache.invalidate(&a.config_id).await);
        assert_eq!(cache.stats().await.size, 1);

        cache.clear().await;
        assert_eq!(cache.stats().await.size, 0);

        // Shutdown failures are swallowed.
        settle().await;
        assert_eq!(factory.shutdowns.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_evicted_engine_in_use_is_not_shut_down() {
        let cache = AgentCache::new(&CacheSettings::default());
        let factory = CountingFactory::default();
        let cfg = config("demo");

        let held = cache.get_or_create(&cfg, &factory).await.unwrap();
        assert!(cache.invalidate(&cfg.config_id).await);
        settle().await;

        assert_eq!(factory.shutdowns.load(Ordering::SeqCst), 0);
        let result = held.invoke(&[ConversationMessage::human("2+2")]).await.unwrap();
        assert_eq!(result.final_text(), "ok");
        assert_eq!(Arc::strong_count(&held), 1);
    }

    #[tokio::test]
    async fn test_stats_is_idempotent() {
        let cache = AgentCache::new(&CacheSettings::default());
        let factory = CountingFactory::default();
        cache.get_or_create(&config("a"), &factory).await.unwrap();
        cache.get_or_create(&config("b"), &factory).await.unwrap();

        let first = cache.stats().await;
        let second = cache.stats().await;
        assert_eq!(first, second);
        assert_eq!(first.max_idle_secs, 1800);
    }
}
