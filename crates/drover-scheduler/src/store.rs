//! Status table persistence.

use async_trait::async_trait;
use drover_core::ports::StatusStore;
use drover_core::run::StatusRecord;
use drover_core::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Status store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    builds: Mutex<HashMap<u64, Vec<StatusRecord>>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn load(&self, build_number: u64) -> Result<Vec<StatusRecord>> {
        let builds = self
            .builds
            .lock()
            .map_err(|_| Error::Store("status store lock poisoned".to_string()))?;
        Ok(builds.get(&build_number).cloned().unwrap_or_default())
    }

    async fn save(&self, build_number: u64, record: &StatusRecord) -> Result<()> {
        let mut builds = self
            .builds
            .lock()
            .map_err(|_| Error::Store("status store lock poisoned".to_string()))?;
        builds.entry(build_number).or_default().push(record.clone());
        Ok(())
    }
}

/// One JSON file per build: `{dir}/build-{n}.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStatusStore {
    dir: PathBuf,
}

impl JsonFileStatusStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, build_number: u64) -> PathBuf {
        self.dir.join(format!("build-{}.json", build_number))
    }
}

#[async_trait]
impl StatusStore for JsonFileStatusStore {
    async fn load(&self, build_number: u64) -> Result<Vec<StatusRecord>> {
        let path = self.path(build_number);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(Error::Store(format!("{}: {}", path.display(), e)));
            }
        };
        serde_json::from_str(&content)
            .map_err(|e| Error::Store(format!("{}: {}", path.display(), e)))
    }

    async fn save(&self, build_number: u64, record: &StatusRecord) -> Result<()> {
        let mut records = self.load(build_number).await?;
        records.push(record.clone());

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Store(format!("{}: {}", self.dir.display(), e)))?;

        let path = self.path(build_number);
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(&records)?;
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| Error::Store(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::Store(format!("{}: {}", path.display(), e)))?;

        debug!(build = build_number, pipeline = %record.pipeline, status = %record.status, "Persisted status record");
        Ok(())
    }
}
