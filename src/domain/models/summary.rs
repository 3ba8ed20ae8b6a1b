// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 目标级的最终结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// 爬取目标
    pub target: String,
    /// 收集到的记录数
    pub record_count: usize,
    /// 结果状态
    pub status: SummaryStatus,
    /// 失败原因
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

/// 结果状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Success,
    Error,
}

impl Summary {
    pub fn success(target: impl Into<String>, record_count: usize) -> Self {
        Self {
            target: target.into(),
            record_count,
            status: SummaryStatus::Success,
            error_detail: None,
        }
    }

    pub fn error(target: impl Into<String>, record_count: usize, detail: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            record_count,
            status: SummaryStatus::Error,
            error_detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SummaryStatus::Success
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_detail {
            Some(detail) => write!(
                f,
                "{}: {} records, error ({})",
                self.target, self.record_count, detail
            ),
            None => write!(f, "{}: {} records, success", self.target, self.record_count),
        }
    }
}
