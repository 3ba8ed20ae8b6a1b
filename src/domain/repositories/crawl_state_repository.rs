// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_state::CrawlState;
use async_trait::async_trait;
use thiserror::Error;

/// 断点存储错误类型
#[derive(Error, Debug)]
pub enum StateError {
    /// IO错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 其他错误
    #[error("State error: {0}")]
    Other(String),
}

/// 爬取断点仓库特质
///
/// 每个爬取目标最多保存一份断点。
#[async_trait]
pub trait CrawlStateRepository: Send + Sync {
    /// 读取目标的断点，不存在时返回 `None`（全新运行）
    async fn load(&self, target: &str) -> Result<Option<CrawlState>, StateError>;

    /// 覆盖保存目标的断点
    async fn save(&self, target: &str, state: &CrawlState) -> Result<(), StateError>;

    /// 删除目标的断点（全部窗口完成后调用）
    async fn clear(&self, target: &str) -> Result<(), StateError>;
}
