// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::record::ExtractedRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 输出错误类型
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 输出文件内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDocument {
    /// 最后一条记录的时间戳
    pub last_saved_record_timestamp: String,
    /// 全部记录
    pub records: Vec<ExtractedRecord>,
}

impl OutputDocument {
    pub fn new(records: Vec<ExtractedRecord>) -> Self {
        let last_saved_record_timestamp = records
            .last()
            .map(|r| r.timestamp.to_rfc3339())
            .unwrap_or_default();
        Self {
            last_saved_record_timestamp,
            records,
        }
    }
}

/// 输出仓库特质
///
/// 负责把一个目标的记录写成输出文件。同一次运行内对同一目标的多次保存
/// 会覆盖同一个文件，因此可以在每个窗口结束后作为检查点调用。
#[async_trait]
pub trait OutputRepository: Send + Sync {
    /// 保存目标的全部记录
    async fn save(&self, target: &str, records: &[ExtractedRecord]) -> Result<(), OutputError>;

    /// 读取目标最近一次保存的记录（用于续爬时合并）
    async fn load_latest(&self, target: &str) -> Result<Vec<ExtractedRecord>, OutputError>;
}
