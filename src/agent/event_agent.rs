//! Registry event loop.
//!
//! # Responsibilities
//! - Own the registry watch and rebuild it (with a bootstrap resync) when it breaks
//! - Route route/service changes to the debounce timer
//! - Keep the certificate index current for Secrets and TLS bindings
//! - Retry failed certificate events after a fixed delay
//! - Drain due stages into the commit channel on every tick

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::agent::retry::RetryQueue;
use crate::agent::timer::StageTimer;
use crate::commiter::{CommitError, CommitSender};
use crate::config::AgentConfig;
use crate::model::{ResourceKey, ResourceKind, ResourceMetadata, StageInfo};
use crate::observability::metrics;
use crate::radixtree::{CertError, RadixTree, RadixTreeGetter, TlsCert};
use crate::registry::{Registry, RegistryError};
use crate::synchronizer::{SyncError, Synchronizer};

/// Name prefix of certificate identities derived from TLS bindings.
///
/// Keeps a binding's entry apart from the entry of the Secret it references.
pub const VIRTUAL_TLS_PREFIX: &str = "__virtual_tls__/";

/// Identity under which a TLS binding's certificate is indexed.
pub fn virtual_tls_key(binding: &ResourceKey) -> ResourceKey {
    ResourceKey::new(
        binding.stage.clone(),
        format!("{VIRTUAL_TLS_PREFIX}{}", binding.resource_name),
    )
}

/// Errors raised by the event agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The watch could not be rebuilt; the process should exit.
    #[error("Registry watch could not be established after {attempts} attempts")]
    WatchExhausted { attempts: u32 },

    /// Leadership was lost; another replica owns reconciliation now.
    #[error("Leadership lost")]
    LeadershipLost,

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Certificate error: {0}")]
    Certificate(#[from] CertError),

    #[error("Failed to decode resource: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Commit error: {0}")]
    Commit(#[from] CommitError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Turns registry changes into debounced stage commits.
pub struct EventAgent {
    registry: Arc<dyn Registry>,
    synchronizer: Arc<dyn Synchronizer>,
    commit_tx: CommitSender,
    timer: Arc<StageTimer>,
    trees: Arc<dyn RadixTreeGetter>,
    config: AgentConfig,
    retries: RetryQueue,
    leader_lost: CancellationToken,
    watch_token: Option<CancellationToken>,
}

impl EventAgent {
    pub fn new(
        registry: Arc<dyn Registry>,
        synchronizer: Arc<dyn Synchronizer>,
        commit_tx: CommitSender,
        timer: Arc<StageTimer>,
        trees: Arc<dyn RadixTreeGetter>,
        config: AgentConfig,
    ) -> Self {
        let retries = RetryQueue::new(config.max_pending_retries, config.event_retry_delay());
        Self {
            registry,
            synchronizer,
            commit_tx,
            timer,
            trees,
            config,
            retries,
            leader_lost: CancellationToken::new(),
            watch_token: None,
        }
    }

    /// Stop with [`AgentError::LeadershipLost`] once `token` is cancelled.
    pub fn with_leader_token(mut self, token: CancellationToken) -> Self {
        self.leader_lost = token;
        self
    }

    /// Run until shutdown, leader loss, or an unrecoverable watch failure.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<(), AgentError> {
        tracing::info!(
            debounce_ms = self.config.debounce_window_ms,
            force_ms = self.config.force_window_ms,
            tick_ms = self.config.tick_interval_ms,
            "Event agent starting"
        );

        let Some(mut events) = self.rebuild_watch(&shutdown).await? else {
            return Ok(());
        };

        let mut ticker = time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Event agent received shutdown signal, exiting loop");
                    self.stop_watch();
                    return Ok(());
                }
                _ = self.leader_lost.cancelled() => {
                    tracing::warn!("Leadership lost, stopping event agent");
                    self.stop_watch();
                    return Err(AgentError::LeadershipLost);
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        tracing::warn!("Registry watch closed, rebuilding");
                        match self.rebuild_watch(&shutdown).await? {
                            Some(rebuilt) => events = rebuilt,
                            None => return Ok(()),
                        }
                    }
                },
                Some(event) = self.retries.next() => {
                    tracing::debug!(
                        kind = %event.kind,
                        name = %event.name,
                        retry_count = event.retry_count,
                        "Retrying event"
                    );
                    self.handle_event(event).await;
                }
                _ = ticker.tick() => self.handle_ticker().await,
            }
        }
    }

    fn stop_watch(&mut self) {
        if let Some(token) = self.watch_token.take() {
            token.cancel();
        }
    }

    /// Replace the watch, retrying with a fixed delay.
    ///
    /// Returns `Ok(None)` if shutdown fired while waiting.
    async fn rebuild_watch(
        &mut self,
        shutdown: &CancellationToken,
    ) -> Result<Option<mpsc::Receiver<ResourceMetadata>>, AgentError> {
        self.stop_watch();

        let attempts = self.config.retry_limit.max(1);
        for attempt in 1..=attempts {
            let token = shutdown.child_token();
            match self.open_watch(token.clone()).await {
                Ok(events) => {
                    tracing::info!(attempt, "Registry watch established");
                    self.watch_token = Some(token);
                    return Ok(Some(events));
                }
                Err(e) => {
                    token.cancel();
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Failed to establish registry watch"
                    );
                }
            }

            if attempt < attempts {
                tokio::select! {
                    _ = shutdown.cancelled() => return Ok(None),
                    _ = time::sleep(self.config.retry_delay()) => {}
                }
            }
        }

        tracing::error!(attempts, "Giving up on registry watch");
        Err(AgentError::WatchExhausted { attempts })
    }

    async fn open_watch(
        &self,
        token: CancellationToken,
    ) -> Result<mpsc::Receiver<ResourceMetadata>, AgentError> {
        let events = self.registry.watch(token).await?;
        self.bootstrap().await?;
        Ok(events)
    }

    /// Resync every stage after a (re)connect, without release reports.
    pub async fn bootstrap(&self) -> Result<(), AgentError> {
        let stages: Vec<StageInfo> = self
            .registry
            .list_stages()
            .await?
            .into_iter()
            .map(StageInfo::without_report)
            .collect();

        let keys: Vec<String> = stages.iter().map(StageInfo::key).collect();
        self.synchronizer.remove_not_exist_stage(&keys).await?;
        self.trees.remove_not_exist_stage(&stages);

        tracing::info!(stages = stages.len(), "Bootstrap sync");
        self.commit_tx.send(stages).await?;
        Ok(())
    }

    /// Dispatch one watch event.
    pub async fn handle_event(&mut self, event: ResourceMetadata) {
        metrics::record_event(event.kind.as_str());

        if event.kind == ResourceKind::Instance {
            tracing::trace!(name = %event.name, "Ignoring instance event");
            return;
        }

        if event.is_empty() || event.kind.is_certificate_kind() {
            if let Err(e) = self.handle_secret(&event).await {
                tracing::warn!(
                    stage = %event.stage,
                    kind = %event.kind,
                    name = %event.name,
                    retry_count = event.retry_count,
                    error = %e,
                    "Certificate event failed, scheduling retry"
                );
                self.schedule_retry(event);
            }
            return;
        }

        self.timer.update(event.stage);
    }

    fn schedule_retry(&mut self, mut event: ResourceMetadata) {
        event.retry_count += 1;
        if self.retries.push(event) {
            metrics::record_event_retry("scheduled");
        } else {
            metrics::record_event_retry("dropped");
            tracing::warn!(
                capacity = self.config.max_pending_retries,
                "Retry queue full, dropping event"
            );
        }
    }

    async fn handle_secret(&self, event: &ResourceMetadata) -> Result<(), AgentError> {
        if event.retry_count > self.config.max_event_retries {
            metrics::record_event_retry("exhausted");
            tracing::error!(
                stage = %event.stage,
                kind = %event.kind,
                name = %event.name,
                retry_count = event.retry_count,
                "Dropping event after too many retries"
            );
            return Ok(());
        }

        match event.kind {
            ResourceKind::Secret => self.handle_secret_object(event).await,
            ResourceKind::TlsBinding => {
                self.handle_tls_binding(&event.stage, &event.resource_key())
                    .await
            }
            _ => self.resync_all().await,
        }
    }

    async fn handle_secret_object(&self, event: &ResourceMetadata) -> Result<(), AgentError> {
        let key = event.resource_key();
        let tree = self.trees.get(&event.stage);

        let changed = match self.registry.get(ResourceKind::Secret, &key).await {
            Ok(secret) => {
                let cert = TlsCert::from_secret(&secret.secret_data()?);
                tree.insert(&key, cert)?
            }
            Err(e) if e.is_not_found() => tree.delete(&key),
            Err(e) => return Err(e.into()),
        };

        // Schedule before refreshing bindings; a retried event finds the tree unchanged.
        if changed {
            tracing::debug!(secret = %key, "Certificate index changed");
            self.timer.update(event.stage.clone());
        }

        self.refresh_bindings_of(&event.stage, &key.resource_name)
            .await
    }

    /// Re-index every binding of `stage` that references `secret`.
    ///
    /// Bindings that fail to decode are skipped.
    async fn refresh_bindings_of(&self, stage: &StageInfo, secret: &str) -> Result<(), AgentError> {
        let bindings = self.registry.list(ResourceKind::TlsBinding, stage).await?;
        for binding in bindings {
            match binding.tls_binding() {
                Ok(spec) if spec.secret_ref == secret => {
                    self.handle_tls_binding(stage, &binding.key()).await?;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        stage = %stage,
                        binding = %binding.name,
                        error = %e,
                        "Skipping undecodable TLS binding"
                    );
                }
            }
        }
        Ok(())
    }

    async fn handle_tls_binding(
        &self,
        stage: &StageInfo,
        binding_key: &ResourceKey,
    ) -> Result<(), AgentError> {
        let tree = self.trees.get(stage);
        let virtual_key = virtual_tls_key(binding_key);

        let binding = match self.registry.get(ResourceKind::TlsBinding, binding_key).await {
            Ok(binding) => binding,
            Err(e) if e.is_not_found() => {
                self.untrack(&*tree, &virtual_key, stage);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let spec = binding.tls_binding()?;
        if spec.snis.is_empty() {
            tracing::debug!(binding = %binding_key, "TLS binding declares no SNIs, skipping");
            return Ok(());
        }

        let secret_key = ResourceKey::new(stage.clone(), spec.secret_ref.clone());
        let changed = match self.registry.get(ResourceKind::Secret, &secret_key).await {
            Ok(secret) => {
                let cert = TlsCert::from_secret(&secret.secret_data()?).with_pinned_snis(spec.snis);
                tree.insert(&virtual_key, cert)?
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    binding = %binding_key,
                    secret = %spec.secret_ref,
                    "TLS binding references a missing secret"
                );
                tree.delete(&virtual_key)
            }
            Err(e) => return Err(e.into()),
        };

        if changed {
            tracing::debug!(binding = %binding_key, "Certificate index changed");
            self.timer.update(stage.clone());
        }
        Ok(())
    }

    fn untrack(&self, tree: &dyn RadixTree, key: &ResourceKey, stage: &StageInfo) {
        if tree.delete(key) {
            self.timer.update(stage.clone());
        }
    }

    async fn resync_all(&self) -> Result<(), AgentError> {
        let stages = self.registry.list_stages().await?;
        tracing::info!(stages = stages.len(), "Global resync requested");
        self.commit_tx.send(stages).await?;
        Ok(())
    }

    /// Forward due stages to the commit channel.
    ///
    /// The all-stages sentinel expands to every known stage. If listing
    /// fails the sentinel goes back into the timer and the rest is still sent.
    pub async fn handle_ticker(&self) {
        let due = self.timer.list_stages_for_commit();
        if due.is_empty() {
            return;
        }

        let batch = if due.iter().any(StageInfo::is_empty) {
            match self.registry.list_stages().await {
                Ok(all) => all,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to list stages, requeueing all-stages commit");
                    self.timer.update(StageInfo::all());
                    due.into_iter().filter(|stage| !stage.is_empty()).collect()
                }
            }
        } else {
            due
        };

        if batch.is_empty() {
            return;
        }
        tracing::debug!(stages = batch.len(), "Committing due stages");
        if let Err(e) = self.commit_tx.send(batch).await {
            tracing::error!(error = %e, "Failed to queue stages for commit");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commiter::commit_channel;
    use crate::model::Resource;
    use crate::radixtree::new_getter;
    use crate::registry::{MemoryRegistry, RegistryResult};
    use crate::synchronizer::StageConfiguration;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Memory registry whose reads can be switched to fail.
    #[derive(Default)]
    struct FlakyRegistry {
        inner: MemoryRegistry,
        fail_get: AtomicBool,
        fail_list_stages: AtomicBool,
    }

    #[async_trait]
    impl Registry for FlakyRegistry {
        async fn get(&self, kind: ResourceKind, key: &ResourceKey) -> RegistryResult<Resource> {
            if self.fail_get.load(Ordering::SeqCst) {
                return Err(RegistryError::Backend("injected".into()));
            }
            self.inner.get(kind, key).await
        }

        async fn list(&self, kind: ResourceKind, stage: &StageInfo) -> RegistryResult<Vec<Resource>> {
            self.inner.list(kind, stage).await
        }

        async fn list_stages(&self) -> RegistryResult<Vec<StageInfo>> {
            if self.fail_list_stages.load(Ordering::SeqCst) {
                return Err(RegistryError::Backend("injected".into()));
            }
            self.inner.list_stages().await
        }

        async fn watch(&self, token: CancellationToken) -> RegistryResult<mpsc::Receiver<ResourceMetadata>> {
            self.inner.watch(token).await
        }
    }

    struct NoopSynchronizer;

    #[async_trait]
    impl Synchronizer for NoopSynchronizer {
        async fn sync(&self, _: &str, _: &str, _: StageConfiguration) -> Result<(), SyncError> {
            Ok(())
        }

        async fn flush(&self) -> Result<(), SyncError> {
            Ok(())
        }

        async fn remove_not_exist_stage(&self, _: &[String]) -> Result<(), SyncError> {
            Ok(())
        }
    }

    fn config() -> AgentConfig {
        AgentConfig {
            debounce_window_ms: 100,
            force_window_ms: 1_000,
            ..AgentConfig::default()
        }
    }

    fn agent(
        registry: Arc<FlakyRegistry>,
    ) -> (EventAgent, mpsc::Receiver<Vec<StageInfo>>, Arc<StageTimer>) {
        let (tx, rx) = commit_channel(16);
        let config = config();
        let timer = Arc::new(StageTimer::from_config(&config));
        let agent = EventAgent::new(
            registry,
            Arc::new(NoopSynchronizer),
            tx,
            timer.clone(),
            new_getter(true),
            config,
        );
        (agent, rx, timer)
    }

    fn stage_entity(name: &str) -> Resource {
        Resource::new(ResourceKind::Stage, StageInfo::new("gw", name), name, json!({}))
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_secret_event_retried_with_incremented_count() {
        let registry = Arc::new(FlakyRegistry::default());
        registry.fail_get.store(true, Ordering::SeqCst);
        let (mut agent, _rx, _timer) = agent(registry);

        let mut event = ResourceMetadata::new(StageInfo::new("gw", "prod"), ResourceKind::Secret, "cert");
        event.retry_count = 1;
        agent.handle_event(event).await;

        let retried = agent.retries.next().await.expect("event should be retried");
        assert_eq!(retried.retry_count, 2);
        assert_eq!(retried.name, "cert");
    }

    #[tokio::test]
    async fn test_event_past_retry_ceiling_is_dropped() {
        let registry = Arc::new(FlakyRegistry::default());
        registry.fail_get.store(true, Ordering::SeqCst);
        let (mut agent, _rx, _timer) = agent(registry);

        let mut event = ResourceMetadata::new(StageInfo::new("gw", "prod"), ResourceKind::Secret, "cert");
        event.retry_count = agent.config.max_event_retries + 1;
        agent.handle_event(event).await;

        assert!(agent.retries.is_empty());
    }

    #[tokio::test]
    async fn test_route_event_marks_stage_and_instance_is_ignored() {
        let registry = Arc::new(FlakyRegistry::default());
        let (mut agent, _rx, timer) = agent(registry);
        let stage = StageInfo::new("gw", "prod");

        agent
            .handle_event(ResourceMetadata::new(stage.clone(), ResourceKind::Instance, "node-1"))
            .await;
        assert!(timer.is_empty());

        agent
            .handle_event(ResourceMetadata::new(stage, ResourceKind::Route, "r1"))
            .await;
        assert_eq!(timer.len(), 1);
    }

    #[tokio::test]
    async fn test_deleted_binding_with_missing_secret_is_noop() {
        let registry = Arc::new(FlakyRegistry::default());
        let (mut agent, _rx, timer) = agent(registry);

        agent
            .handle_event(ResourceMetadata::new(
                StageInfo::new("gw", "prod"),
                ResourceKind::TlsBinding,
                "t1",
            ))
            .await;

        assert!(timer.is_empty());
        assert!(agent.retries.is_empty());
    }

    #[tokio::test]
    async fn test_binding_with_pinned_snis_indexes_virtual_key() {
        let registry = Arc::new(FlakyRegistry::default());
        let stage = StageInfo::new("gw", "prod");
        registry.inner.put(Resource::new(
            ResourceKind::Secret,
            stage.clone(),
            "s1",
            json!({"data": {"tls.crt": "not a pem", "tls.key": "KEY"}}),
        ));
        registry.inner.put(Resource::new(
            ResourceKind::TlsBinding,
            stage.clone(),
            "t1",
            json!({"secretRef": "s1", "snis": ["api.example.com"]}),
        ));
        let (mut agent, _rx, timer) = agent(registry);

        agent
            .handle_event(ResourceMetadata::new(stage.clone(), ResourceKind::TlsBinding, "t1"))
            .await;

        let matched = agent
            .trees
            .get(&stage)
            .match_longest_prefix("api.example.com")
            .expect("binding SNI should match");
        assert_eq!(matched.sni, "api.example.com");
        assert_eq!(timer.len(), 1);
        assert!(agent.retries.is_empty());
    }

    #[tokio::test]
    async fn test_secret_change_schedules_commit_despite_undecodable_binding() {
        let registry = Arc::new(FlakyRegistry::default());
        let stage = StageInfo::new("gw", "prod");
        let certified = rcgen::generate_simple_self_signed(vec!["api.example.com".to_string()]).unwrap();
        registry.inner.put(Resource::new(
            ResourceKind::Secret,
            stage.clone(),
            "s1",
            json!({"data": {
                "tls.crt": certified.cert.pem(),
                "tls.key": certified.key_pair.serialize_pem(),
            }}),
        ));
        // No secretRef: this binding cannot be decoded.
        registry.inner.put(Resource::new(
            ResourceKind::TlsBinding,
            stage.clone(),
            "bad",
            json!({"snis": ["other.example.com"]}),
        ));
        let (mut agent, _rx, timer) = agent(registry);

        agent
            .handle_event(ResourceMetadata::new(stage.clone(), ResourceKind::Secret, "s1"))
            .await;

        assert!(agent.trees.get(&stage).match_longest_prefix("api.example.com").is_some());
        assert_eq!(timer.len(), 1);
        assert!(agent.retries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_expands_sentinel_to_all_stages() {
        let registry = Arc::new(FlakyRegistry::default());
        registry.inner.put(stage_entity("prod"));
        registry.inner.put(stage_entity("test"));
        let (agent, mut rx, timer) = agent(registry);

        timer.update(StageInfo::all());
        tokio::time::sleep(Duration::from_millis(150)).await;
        agent.handle_ticker().await;

        let batch = rx.recv().await.expect("batch should be sent");
        let keys: Vec<String> = batch.iter().map(StageInfo::key).collect();
        assert_eq!(keys, vec!["gw/prod".to_string(), "gw/test".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_fallback_requeues_sentinel_and_forwards_partial() {
        let registry = Arc::new(FlakyRegistry::default());
        registry.fail_list_stages.store(true, Ordering::SeqCst);
        let (agent, mut rx, timer) = agent(registry);

        timer.update(StageInfo::all());
        timer.update(StageInfo::new("gw", "prod"));
        tokio::time::sleep(Duration::from_millis(150)).await;
        agent.handle_ticker().await;

        let batch = rx.recv().await.expect("partial batch should be sent");
        assert_eq!(batch, vec![StageInfo::new("gw", "prod")]);
        assert_eq!(timer.len(), 1);
    }
}
