// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::window::Window;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 爬取断点
///
/// 每个目标一份，记录当前活动身份与当前待处理窗口。
/// 首次尝试窗口时创建，每次窗口结束后覆盖，全部完成后删除。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlState {
    /// 活动身份在身份池中的索引
    pub last_identity_index: usize,
    /// 当前窗口起始日期
    pub last_since: NaiveDate,
    /// 当前窗口结束日期
    pub last_until: NaiveDate,
}

impl CrawlState {
    pub fn new(identity_index: usize, window: &Window) -> Self {
        Self {
            last_identity_index: identity_index,
            last_since: window.since,
            last_until: window.until,
        }
    }

    /// 断点对应的窗口
    pub fn window(&self) -> Window {
        Window::new(self.last_since, self.last_until)
    }
}
