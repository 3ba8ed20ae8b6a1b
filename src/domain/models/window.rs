// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 时间窗口实体
///
/// 表示一段左闭右开的日期区间 `[since, until)`，是爬取的最小调度单位。
/// 窗口按 `since` 升序排列、互不重叠且首尾相接，只由编排器修改状态。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// 起始日期（包含）
    pub since: NaiveDate,
    /// 结束日期（不包含）
    pub until: NaiveDate,
    /// 窗口状态
    pub status: WindowStatus,
}

/// 窗口状态枚举
///
/// 状态转换遵循以下流程：
/// Pending → InProgress → Completed/Empty/Blocked
///
/// Blocked 之后窗口会以（可能收窄的）范围重新进入 Pending，
/// 只有身份池全部耗尽时才停留在 Blocked。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    /// 待处理
    #[default]
    Pending,
    /// 处理中
    InProgress,
    /// 已完成
    Completed,
    /// 上游确认该范围没有数据
    Empty,
    /// 被限流
    Blocked,
}

impl fmt::Display for WindowStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WindowStatus::Pending => write!(f, "pending"),
            WindowStatus::InProgress => write!(f, "in_progress"),
            WindowStatus::Completed => write!(f, "completed"),
            WindowStatus::Empty => write!(f, "empty"),
            WindowStatus::Blocked => write!(f, "blocked"),
        }
    }
}

impl Window {
    /// 创建一个待处理窗口
    pub fn new(since: NaiveDate, until: NaiveDate) -> Self {
        Self {
            since,
            until,
            status: WindowStatus::Pending,
        }
    }

    /// 将窗口收窄到最新已捕获记录之后
    ///
    /// 新的 `since` 为 `latest` 所在日期的下一天（不早于原来的 `since`）。
    /// 收窄后范围为空时返回 `None`，表示窗口内已经没有剩余数据需要请求。
    pub fn narrow_after(&self, latest: DateTime<Utc>) -> Option<Window> {
        let next_day = latest.date_naive().checked_add_days(Days::new(1))?;
        let since = next_day.max(self.since);
        if since >= self.until {
            return None;
        }
        Some(Window::new(since, self.until))
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.since, self.until)
    }
}
