// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 解码后的领域记录
///
/// `id` 在整个爬取运行中唯一且在重试之间保持稳定，
/// 由运行级的去重集合保证最终输出中不会重复出现。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    /// 记录唯一标识符
    pub id: String,
    /// 记录产生时间
    pub timestamp: DateTime<Utc>,
    /// 原始记录内容
    pub payload: serde_json::Value,
}

impl ExtractedRecord {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            timestamp,
            payload,
        }
    }
}

/// 一次捕获事件
///
/// 代表一个被观察到的网络响应，只存在于捕获监听器内部，解码后即丢弃。
#[derive(Debug, Clone)]
pub struct CaptureEvent {
    /// 请求ID
    pub request_id: String,
    /// 响应对应的接口URL
    pub endpoint_url: String,
    /// 原始响应体
    pub raw_body: Vec<u8>,
    /// 响应体是否经过传输编码（base64 + 可能的压缩）
    pub is_compressed: bool,
}
