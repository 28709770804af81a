//! Shared fakes and fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use gateway_operator::agent::{AgentError, EventAgent, StageTimer};
use gateway_operator::commiter::{
    commit_channel, CommitSender, Commiter, ReleaseReporter, ReleaseStatus, StageCommitter,
};
use gateway_operator::config::AgentConfig;
use gateway_operator::convert::DefaultConverter;
use gateway_operator::lifecycle::Shutdown;
use gateway_operator::radixtree::{new_getter, RadixTreeGetter};
use gateway_operator::model::{Resource, ResourceKey, ResourceKind, ResourceMetadata, StageInfo};
use gateway_operator::registry::{MemoryRegistry, Registry, RegistryError, RegistryResult};
use gateway_operator::synchronizer::{StageConfiguration, SyncError, Synchronizer};

/// Agent settings scaled down for tests.
pub fn fast_agent_config() -> AgentConfig {
    AgentConfig {
        debounce_window_ms: 50,
        force_window_ms: 500,
        tick_interval_ms: 20,
        retry_limit: 3,
        retry_delay_secs: 0,
        event_retry_delay_ms: 50,
        max_event_retries: 3,
        max_pending_retries: 64,
    }
}

/// Poll `check` until it holds or five seconds pass.
pub async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Memory registry with switchable failures.
#[derive(Default)]
pub struct FlakyRegistry {
    pub inner: MemoryRegistry,
    pub fail_get: AtomicBool,
    pub fail_list_stages: AtomicBool,
    /// Remaining watch calls that fail; `u32::MAX` fails forever.
    pub failing_watches: AtomicU32,
    pub watch_calls: AtomicU32,
}

impl FlakyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_watches(&self, count: u32) {
        self.failing_watches.store(count, Ordering::SeqCst);
    }

    fn injected() -> RegistryError {
        RegistryError::Backend("injected failure".into())
    }
}

#[async_trait]
impl Registry for FlakyRegistry {
    async fn get(&self, kind: ResourceKind, key: &ResourceKey) -> RegistryResult<Resource> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.get(kind, key).await
    }

    async fn list(&self, kind: ResourceKind, stage: &StageInfo) -> RegistryResult<Vec<Resource>> {
        self.inner.list(kind, stage).await
    }

    async fn list_stages(&self) -> RegistryResult<Vec<StageInfo>> {
        if self.fail_list_stages.load(Ordering::SeqCst) {
            return Err(Self::injected());
        }
        self.inner.list_stages().await
    }

    async fn watch(&self, token: CancellationToken) -> RegistryResult<mpsc::Receiver<ResourceMetadata>> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failing_watches.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.failing_watches.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(Self::injected());
        }
        self.inner.watch(token).await
    }
}

/// Synchronizer that records every call.
#[derive(Default)]
pub struct RecordingSynchronizer {
    pub synced: Mutex<Vec<StageConfiguration>>,
    pub removals: Mutex<Vec<Vec<String>>>,
    pub flushes: AtomicUsize,
    pub fail_flush: AtomicBool,
}

impl RecordingSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest configuration synced for `gateway/stage`.
    pub fn last_for(&self, gateway: &str, stage: &str) -> Option<StageConfiguration> {
        self.synced
            .lock()
            .iter()
            .rev()
            .find(|c| c.gateway_name == gateway && c.stage_name == stage)
            .cloned()
    }

    pub fn sync_count(&self) -> usize {
        self.synced.lock().len()
    }
}

#[async_trait]
impl Synchronizer for RecordingSynchronizer {
    async fn sync(&self, _gateway: &str, _stage: &str, config: StageConfiguration) -> Result<(), SyncError> {
        self.synced.lock().push(config);
        Ok(())
    }

    async fn flush(&self) -> Result<(), SyncError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(SyncError::Rejected("injected flush failure".into()));
        }
        Ok(())
    }

    async fn remove_not_exist_stage(&self, existing: &[String]) -> Result<(), SyncError> {
        self.removals.lock().push(existing.to_vec());
        Ok(())
    }
}

/// Reporter that records every outcome.
#[derive(Default)]
pub struct RecordingReporter {
    pub reports: Mutex<Vec<(StageInfo, ReleaseStatus)>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses_for(&self, stage: &str) -> Vec<ReleaseStatus> {
        self.reports
            .lock()
            .iter()
            .filter(|(s, _)| s.stage_name == stage)
            .map(|(_, status)| status.clone())
            .collect()
    }
}

#[async_trait]
impl ReleaseReporter for RecordingReporter {
    async fn report(&self, stage: &StageInfo, status: ReleaseStatus) {
        self.reports.lock().push((stage.clone(), status));
    }
}

pub fn stage(name: &str) -> StageInfo {
    StageInfo::new("gw", name)
}

pub fn stage_entity(name: &str) -> Resource {
    Resource::new(ResourceKind::Stage, stage(name), name, json!({}))
}

pub fn route(stage_name: &str, name: &str, path: &str) -> Resource {
    Resource::new(
        ResourceKind::Route,
        stage(stage_name),
        name,
        json!({"uri": path, "methods": ["GET"]}),
    )
}

/// Self-signed certificate and key in PEM form.
pub fn self_signed_pem(names: &[&str]) -> (String, String) {
    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    let certified = rcgen::generate_simple_self_signed(names).unwrap();
    (certified.cert.pem(), certified.key_pair.serialize_pem())
}

pub fn secret(stage_name: &str, name: &str, cert: &str, key: &str) -> Resource {
    Resource::new(
        ResourceKind::Secret,
        stage(stage_name),
        name,
        json!({"data": {"tls.crt": cert, "tls.key": key}}),
    )
}

pub fn tls_binding(stage_name: &str, name: &str, secret: &str, snis: &[&str]) -> Resource {
    Resource::new(
        ResourceKind::TlsBinding,
        stage(stage_name),
        name,
        json!({"secretRef": secret, "snis": snis}),
    )
}

/// Agent and commiter wired to the fakes above.
pub struct Harness {
    pub registry: Arc<FlakyRegistry>,
    pub synchronizer: Arc<RecordingSynchronizer>,
    pub reporter: Arc<RecordingReporter>,
    pub timer: Arc<StageTimer>,
    pub trees: Arc<dyn RadixTreeGetter>,
    pub commit_tx: CommitSender,
    pub committer: Arc<StageCommitter>,
    pub shutdown: Shutdown,
    pub leader: CancellationToken,
    config: AgentConfig,
    commit_rx: Option<mpsc::Receiver<Vec<StageInfo>>>,
}

impl Harness {
    pub fn new(config: AgentConfig) -> Self {
        let registry = Arc::new(FlakyRegistry::new());
        let synchronizer = Arc::new(RecordingSynchronizer::new());
        let reporter = Arc::new(RecordingReporter::new());
        let timer = Arc::new(StageTimer::from_config(&config));
        let (commit_tx, commit_rx) = commit_channel(16);
        let committer = Arc::new(StageCommitter::new(
            registry.clone(),
            Arc::new(DefaultConverter::new()),
            synchronizer.clone(),
            timer.clone(),
            reporter.clone(),
        ));
        Self {
            registry,
            synchronizer,
            reporter,
            timer,
            trees: new_getter(true),
            commit_tx,
            committer,
            shutdown: Shutdown::new(),
            leader: CancellationToken::new(),
            config,
            commit_rx: Some(commit_rx),
        }
    }

    /// Spawn the commiter (once) and the agent.
    pub fn start(&mut self) -> JoinHandle<Result<(), AgentError>> {
        if let Some(rx) = self.commit_rx.take() {
            let commiter = Commiter::new(self.committer.clone(), rx, 4);
            tokio::spawn(commiter.run(self.shutdown.subscribe()));
        }

        let agent = EventAgent::new(
            self.registry.clone(),
            self.synchronizer.clone(),
            self.commit_tx.clone(),
            self.timer.clone(),
            self.trees.clone(),
            self.config.clone(),
        )
        .with_leader_token(self.leader.clone());
        tokio::spawn(agent.run(self.shutdown.subscribe()))
    }
}
