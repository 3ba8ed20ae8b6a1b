// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::Local;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::domain::models::crawl_state::CrawlState;
use crate::domain::models::record::ExtractedRecord;
use crate::domain::repositories::crawl_state_repository::{CrawlStateRepository, StateError};
use crate::domain::repositories::output_repository::{
    OutputDocument, OutputError, OutputRepository,
};

const RUN_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// 把目标名转换为可安全用作文件名的形式
fn file_stem(target: &str) -> String {
    target
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// 先写临时文件再重命名，保证读者不会看到写了一半的文件
async fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp, path).await
}

/// 基于 JSON 文件的断点存储
///
/// 每个目标一个文件：`<state_dir>/crawl_state_<target>.json`。
pub struct JsonFileStateStore {
    state_dir: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn path_for(&self, target: &str) -> PathBuf {
        self.state_dir
            .join(format!("crawl_state_{}.json", file_stem(target)))
    }
}

#[async_trait]
impl CrawlStateRepository for JsonFileStateStore {
    async fn load(&self, target: &str) -> Result<Option<CrawlState>, StateError> {
        match fs::read(self.path_for(target)).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StateError::Io(e)),
        }
    }

    async fn save(&self, target: &str, state: &CrawlState) -> Result<(), StateError> {
        let data = serde_json::to_vec_pretty(state)?;
        write_atomically(&self.path_for(target), &data).await?;
        debug!(target = %target, since = %state.last_since, until = %state.last_until, "Crawl state saved");
        Ok(())
    }

    async fn clear(&self, target: &str) -> Result<(), StateError> {
        match fs::remove_file(self.path_for(target)).await {
            Ok(()) => {
                debug!(target = %target, "Crawl state cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateError::Io(e)),
        }
    }
}

/// 基于 JSON 文件的结果输出
///
/// 文件路径为 `<output_dir>/<target>/<target>_records_<stamp>.json`，
/// `stamp` 在一次运行内固定，因此每次检查点都会覆盖同一个文件。
pub struct JsonOutputStore {
    output_dir: PathBuf,
    run_stamp: String,
}

impl JsonOutputStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self::with_run_stamp(output_dir, Local::now().format(RUN_STAMP_FORMAT).to_string())
    }

    pub fn with_run_stamp(output_dir: impl Into<PathBuf>, run_stamp: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            run_stamp: run_stamp.into(),
        }
    }

    fn target_dir(&self, target: &str) -> PathBuf {
        self.output_dir.join(file_stem(target))
    }

    fn file_prefix(target: &str) -> String {
        format!("{}_records_", file_stem(target))
    }

    pub fn path_for(&self, target: &str) -> PathBuf {
        self.target_dir(target)
            .join(format!("{}{}.json", Self::file_prefix(target), self.run_stamp))
    }

    /// 查找目标最新的输出文件（按文件名中的时间戳排序）
    async fn latest_file(&self, target: &str) -> Result<Option<PathBuf>, OutputError> {
        let prefix = Self::file_prefix(target);
        let mut entries = match fs::read_dir(self.target_dir(target)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(OutputError::Io(e)),
        };

        let mut latest: Option<String> = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&prefix) || !name.ends_with(".json") {
                continue;
            }
            match latest {
                Some(ref current) if *current >= name => {}
                _ => latest = Some(name),
            }
        }

        Ok(latest.map(|name| self.target_dir(target).join(name)))
    }
}

#[async_trait]
impl OutputRepository for JsonOutputStore {
    async fn save(&self, target: &str, records: &[ExtractedRecord]) -> Result<(), OutputError> {
        let document = OutputDocument::new(records.to_vec());
        let data = serde_json::to_vec_pretty(&document)?;
        let path = self.path_for(target);
        write_atomically(&path, &data).await?;
        debug!(target = %target, records = records.len(), path = %path.display(), "Output written");
        Ok(())
    }

    async fn load_latest(&self, target: &str) -> Result<Vec<ExtractedRecord>, OutputError> {
        let Some(path) = self.latest_file(target).await? else {
            return Ok(Vec::new());
        };
        let data = fs::read(&path).await?;
        let document: OutputDocument = serde_json::from_slice(&data)?;
        debug!(target = %target, records = document.records.len(), path = %path.display(), "Previous output loaded");
        Ok(document.records)
    }
}

/// 内存断点存储，用于测试
#[derive(Default)]
pub struct InMemoryStateStore {
    states: DashMap<String, CrawlState>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: &str) -> Option<CrawlState> {
        self.states.get(target).map(|s| s.clone())
    }

    pub fn insert(&self, target: &str, state: CrawlState) {
        self.states.insert(target.to_string(), state);
    }
}

#[async_trait]
impl CrawlStateRepository for InMemoryStateStore {
    async fn load(&self, target: &str) -> Result<Option<CrawlState>, StateError> {
        Ok(self.get(target))
    }

    async fn save(&self, target: &str, state: &CrawlState) -> Result<(), StateError> {
        self.insert(target, state.clone());
        Ok(())
    }

    async fn clear(&self, target: &str) -> Result<(), StateError> {
        self.states.remove(target);
        Ok(())
    }
}

/// 内存结果输出，用于测试
#[derive(Default)]
pub struct InMemoryOutputStore {
    outputs: DashMap<String, Vec<ExtractedRecord>>,
}

impl InMemoryOutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self, target: &str) -> Vec<ExtractedRecord> {
        self.outputs
            .get(target)
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn ids(&self, target: &str) -> Vec<String> {
        self.records(target).into_iter().map(|r| r.id).collect()
    }
}

#[async_trait]
impl OutputRepository for InMemoryOutputStore {
    async fn save(&self, target: &str, records: &[ExtractedRecord]) -> Result<(), OutputError> {
        self.outputs.insert(target.to_string(), records.to_vec());
        Ok(())
    }

    async fn load_latest(&self, target: &str) -> Result<Vec<ExtractedRecord>, OutputError> {
        Ok(self.records(target))
    }
}
