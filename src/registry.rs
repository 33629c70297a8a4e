//! Instance registry
//!
//! Single source of truth mapping logical names to live instance handles.
//! The registry enforces add-time name uniqueness, serves concurrent
//! lookups, and owns the lifetime of every handle it holds: removal closes.
//!
//! Registries are usually constructed at the composition root and shared by
//! reference; [`InstanceRegistry::global`] exists for applications that want
//! the process-wide access point instead.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tokio::sync::RwLock;

use crate::connection::ConnectOverrides;
use crate::instance::{InstanceHandle, RedisInstance};
use crate::metrics;
use crate::options::{InstanceOptions, OptionMap};
use crate::{Error, Result};

/// Concurrency-safe store of named instance handles.
///
/// All operations are in-memory; nothing here touches the network. Handles
/// are stored as trait objects so the registry never depends on the
/// concrete client type.
pub struct InstanceRegistry {
    instances: RwLock<HashMap<String, Arc<dyn InstanceHandle>>>,
}

impl InstanceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry, created on first access.
    ///
    /// Process-wide mutable state: prefer constructing a registry at the
    /// composition root and passing it down; reach for this only where
    /// dependency wiring is impractical. There is no implicit teardown —
    /// call [`shutdown`](Self::shutdown) explicitly if handles must be
    /// closed before process exit.
    pub fn global() -> &'static InstanceRegistry {
        static GLOBAL: OnceLock<InstanceRegistry> = OnceLock::new();
        GLOBAL.get_or_init(InstanceRegistry::new)
    }

    /// Register a handle under its own name.
    ///
    /// The registry takes ownership of the handle's lifetime: it will be
    /// the one to close it on removal. Insertion is atomic — concurrent
    /// readers see the instance fully formed or not at all.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::DuplicateName`] if the name already has a live
    /// instance; the existing handle is left untouched. There is no
    /// replace: remove first, then add.
    pub async fn add(&self, handle: Arc<dyn InstanceHandle>) -> Result<()> {
        let name = handle.name().to_string();
        let mut instances = self.instances.write().await;
        if instances.contains_key(&name) {
            metrics::counters::duplicate_name();
            return Err(Error::DuplicateName(name));
        }
        instances.insert(name.clone(), handle);
        metrics::counters::instance_registered();
        metrics::gauges::instances(1);
        tracing::info!(name = %name, "instance registered");
        Ok(())
    }

    /// Translate a flat option map and register the resulting instance.
    pub async fn add_map(&self, name: &str, cfg: &OptionMap) -> Result<()> {
        self.add_map_with(name, cfg, &ConnectOverrides::default())
            .await
    }

    /// Translate a flat option map with transport overrides and register
    /// the resulting instance.
    pub async fn add_map_with(
        &self,
        name: &str,
        cfg: &OptionMap,
        overrides: &ConnectOverrides,
    ) -> Result<()> {
        let instance = RedisInstance::from_map_with(name, cfg, overrides.clone());
        self.add(Arc::new(instance)).await
    }

    /// Register an instance from an already-resolved configuration,
    /// bypassing translation.
    pub async fn add_options(&self, name: &str, options: InstanceOptions) -> Result<()> {
        let instance = RedisInstance::new(name, options, ConnectOverrides::default());
        self.add(Arc::new(instance)).await
    }

    /// Register many instances from a name → option map table.
    ///
    /// One entry's failure never aborts the rest: every failure is logged
    /// and returned as a `(name, error)` pair, and the successes stay
    /// registered. An empty result means every entry was added.
    pub async fn add_all(&self, configs: &HashMap<String, OptionMap>) -> Vec<(String, Error)> {
        self.add_all_with(configs, &ConnectOverrides::default())
            .await
    }

    /// Register many instances with shared transport overrides.
    pub async fn add_all_with(
        &self,
        configs: &HashMap<String, OptionMap>,
        overrides: &ConnectOverrides,
    ) -> Vec<(String, Error)> {
        let mut failures = Vec::new();
        for (name, cfg) in configs {
            if let Err(e) = self.add_map_with(name, cfg, overrides).await {
                tracing::warn!(name = %name, error = %e, "instance registration failed");
                failures.push((name.clone(), e));
            }
        }
        failures
    }

    /// Remove a named instance, closing its handle.
    ///
    /// Removing an unknown name is a no-op. A close failure is logged and
    /// returned as [`Error::Close`], but the entry is evicted regardless so
    /// the name can always be registered again.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let removed = self.instances.write().await.remove(name);
        let Some(handle) = removed else {
            return Ok(());
        };

        metrics::counters::instance_removed();
        metrics::gauges::instances(-1);
        tracing::info!(name = %name, "instance removed");

        if let Err(e) = handle.close().await {
            metrics::counters::close_error();
            tracing::warn!(name = %name, error = %e, "closing removed instance failed");
            return Err(Error::Close {
                name: name.to_string(),
                source: Box::new(e),
            });
        }
        Ok(())
    }

    /// Whether an instance is registered under `name`.
    pub async fn has(&self, name: &str) -> bool {
        self.instances.read().await.contains_key(name)
    }

    /// The handle registered under `name`.
    ///
    /// The returned handle is a non-owning reference intended for long-lived
    /// reuse; do not close it.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] if nothing is registered under `name`.
    pub async fn get(&self, name: &str) -> Result<Arc<dyn InstanceHandle>> {
        self.instances
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// The Redis instance registered under `name`, typed.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NotFound`] if nothing is registered under `name`
    /// or [`Error::TypeMismatch`] if the handle is some other
    /// [`InstanceHandle`] implementation.
    pub async fn get_redis(&self, name: &str) -> Result<Arc<RedisInstance>> {
        let handle = self.get(name).await?;
        handle
            .as_any()
            .downcast::<RedisInstance>()
            .map_err(|_| Error::TypeMismatch(name.to_string()))
    }

    /// Names of all registered instances, in no particular order.
    pub async fn names(&self) -> Vec<String> {
        self.instances.read().await.keys().cloned().collect()
    }

    /// Number of registered instances.
    pub async fn len(&self) -> usize {
        self.instances.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.instances.read().await.is_empty()
    }

    /// Remove and close every instance.
    ///
    /// Close failures are reported per entry like [`add_all`](Self::add_all)
    /// failures; the registry is empty afterwards either way.
    pub async fn shutdown(&self) -> Vec<(String, Error)> {
        let drained: Vec<(String, Arc<dyn InstanceHandle>)> =
            self.instances.write().await.drain().collect();

        let mut failures = Vec::new();
        for (name, handle) in drained {
            metrics::counters::instance_removed();
            metrics::gauges::instances(-1);
            if let Err(e) = handle.close().await {
                metrics::counters::close_error();
                tracing::warn!(name = %name, error = %e, "closing instance during shutdown failed");
                failures.push((name, e));
            }
        }
        failures
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::any::Any;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn map(entries: &[(&str, &str)]) -> OptionMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Handle whose close always fails, for exercising the eviction path.
    struct FailingHandle {
        name: String,
        closed: AtomicBool,
    }

    #[async_trait]
    impl InstanceHandle for FailingHandle {
        fn name(&self) -> &str {
            &self.name
        }

        async fn close(&self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Err(Error::Config("close always fails".into()))
        }

        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    #[tokio::test]
    async fn test_add_then_get_and_has() {
        let registry = InstanceRegistry::new();
        registry
            .add_map("sessions", &map(&[("addr", "127.0.0.1:6379")]))
            .await
            .expect("add");

        assert!(registry.has("sessions").await);
        assert_eq!(registry.len().await, 1);
        let handle = registry.get("sessions").await.expect("get");
        assert_eq!(handle.name(), "sessions");
    }

    #[tokio::test]
    async fn test_duplicate_add_fails_and_first_wins() {
        let registry = InstanceRegistry::new();
        registry
            .add_map("cache", &map(&[("addr", "first:6379")]))
            .await
            .expect("first add");

        let second = registry
            .add_map("cache", &map(&[("addr", "second:6379")]))
            .await;
        assert!(matches!(second, Err(Error::DuplicateName(ref n)) if n == "cache"));

        let kept = registry.get_redis("cache").await.expect("get");
        assert_eq!(kept.options().addrs, vec!["first:6379".to_string()]);
    }

    #[tokio::test]
    async fn test_get_unknown_name_fails() {
        let registry = InstanceRegistry::new();
        assert!(matches!(
            registry.get("nope").await,
            Err(Error::NotFound(ref n)) if n == "nope"
        ));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = InstanceRegistry::new();
        assert!(!registry.has("ghost").await);
        registry.remove("ghost").await.expect("no-op remove");
        assert!(!registry.has("ghost").await);
    }

    #[tokio::test]
    async fn test_remove_then_re_add_reflects_new_config() {
        let registry = InstanceRegistry::new();
        registry
            .add_map("ratelimits", &map(&[("addr", "old:6379"), ("db", "1")]))
            .await
            .expect("add");

        registry.remove("ratelimits").await.expect("remove");
        registry
            .add_map("ratelimits", &map(&[("addr", "new:6379"), ("db", "7")]))
            .await
            .expect("re-add");

        let instance = registry.get_redis("ratelimits").await.expect("get");
        assert_eq!(instance.options().addrs, vec!["new:6379".to_string()]);
        assert_eq!(instance.options().db, 7);
    }

    #[tokio::test]
    async fn test_close_failure_still_evicts() {
        let registry = InstanceRegistry::new();
        let handle = Arc::new(FailingHandle {
            name: "stubborn".to_string(),
            closed: AtomicBool::new(false),
        });
        registry.add(handle.clone()).await.expect("add");

        let result = registry.remove("stubborn").await;
        assert!(matches!(result, Err(Error::Close { ref name, .. }) if name == "stubborn"));
        assert!(handle.closed.load(Ordering::SeqCst));
        assert!(!registry.has("stubborn").await);

        // The name is free again.
        registry
            .add_map("stubborn", &map(&[("addr", "a:1")]))
            .await
            .expect("re-add after failed close");
    }

    #[tokio::test]
    async fn test_add_all_partial_success() {
        let registry = InstanceRegistry::new();
        registry
            .add_map("taken", &map(&[("addr", "a:1")]))
            .await
            .expect("seed");

        let mut configs = HashMap::new();
        configs.insert("one".to_string(), map(&[("addr", "a:1")]));
        configs.insert("two".to_string(), map(&[("addr", "b:2")]));
        configs.insert("taken".to_string(), map(&[("addr", "c:3")]));

        let failures = registry.add_all(&configs).await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "taken");
        assert!(matches!(failures[0].1, Error::DuplicateName(_)));

        assert_eq!(registry.len().await, 3); // seed + one + two
        assert!(registry.has("one").await);
        assert!(registry.has("two").await);
    }

    #[tokio::test]
    async fn test_get_redis_type_mismatch() {
        let registry = InstanceRegistry::new();
        registry
            .add(Arc::new(FailingHandle {
                name: "alien".to_string(),
                closed: AtomicBool::new(false),
            }))
            .await
            .expect("add");

        assert!(matches!(
            registry.get_redis("alien").await,
            Err(Error::TypeMismatch(ref n)) if n == "alien"
        ));
    }

    #[tokio::test]
    async fn test_shutdown_empties_registry() {
        let registry = InstanceRegistry::new();
        registry
            .add_map("a", &map(&[("addr", "a:1")]))
            .await
            .expect("add a");
        registry
            .add_map("b", &map(&[("addr", "b:2")]))
            .await
            .expect("add b");

        let failures = registry.shutdown().await;
        assert!(failures.is_empty());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_global_is_one_registry() {
        let a = InstanceRegistry::global();
        let b = InstanceRegistry::global();
        assert!(std::ptr::eq(a, b));
    }
}
