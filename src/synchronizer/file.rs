//! File-backed synchronizer.
//!
//! One pretty-printed JSON document per stage, written on flush.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use crate::synchronizer::types::{StageConfiguration, SyncError, Synchronizer};

const FILE_SUFFIX: &str = ".json";
const NAME_SEPARATOR: &str = "__";

pub struct FileSynchronizer {
    output_dir: PathBuf,
    pending: Mutex<BTreeMap<String, StageConfiguration>>,
}

impl FileSynchronizer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the document holding `gateway/stage`.
    pub fn stage_path(&self, gateway_name: &str, stage_name: &str) -> PathBuf {
        self.output_dir.join(format!(
            "{gateway_name}{NAME_SEPARATOR}{stage_name}{FILE_SUFFIX}"
        ))
    }

    /// Names must map back to the same stage from the file name alone.
    fn check_name(name: &str) -> Result<(), SyncError> {
        if name.is_empty()
            || name.contains(NAME_SEPARATOR)
            || name.contains(['/', '\\'])
            || name.starts_with('.')
        {
            return Err(SyncError::Rejected(format!(
                "name {name:?} cannot be stored as a file name"
            )));
        }
        Ok(())
    }

    fn stage_key_from_file(file_name: &str) -> Option<String> {
        let stem = file_name.strip_suffix(FILE_SUFFIX)?;
        let (gateway, stage) = stem.split_once(NAME_SEPARATOR)?;
        Some(format!("{gateway}/{stage}"))
    }
}

#[async_trait]
impl Synchronizer for FileSynchronizer {
    async fn sync(
        &self,
        gateway_name: &str,
        stage_name: &str,
        config: StageConfiguration,
    ) -> Result<(), SyncError> {
        Self::check_name(gateway_name)?;
        Self::check_name(stage_name)?;
        self.pending
            .lock()
            .insert(format!("{gateway_name}/{stage_name}"), config);
        Ok(())
    }

    async fn flush(&self) -> Result<(), SyncError> {
        let pending = std::mem::take(&mut *self.pending.lock());
        if pending.is_empty() {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        for config in pending.values() {
            let path = self.stage_path(&config.gateway_name, &config.stage_name);
            let body = serde_json::to_vec_pretty(config)?;
            tokio::fs::write(&path, body).await?;
            tracing::debug!(path = ?path, empty = config.is_empty(), "Wrote stage configuration");
        }

        tracing::info!(stages = pending.len(), "Flushed stage configuration");
        Ok(())
    }

    async fn remove_not_exist_stage(&self, existing: &[String]) -> Result<(), SyncError> {
        let existing: HashSet<&str> = existing.iter().map(String::as_str).collect();

        let mut entries = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(key) = file_name.to_str().and_then(Self::stage_key_from_file) else {
                continue;
            };
            if !existing.contains(key.as_str()) {
                tokio::fs::remove_file(entry.path()).await?;
                tracing::info!(stage = %key, "Removed configuration of deleted stage");
            }
        }
        Ok(())
    }
}
