// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::fmt;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engines::traits::{BrowsingSession, EngineError};
use crate::workers::capture_listener::{CaptureSignals, TerminalSignal};

/// 一次窗口尝试的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    /// 窗口已抓取完毕
    Completed,
    /// 窗口内没有数据
    Empty,
    /// 当前身份被限流
    Blocked,
}

impl fmt::Display for DriveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DriveOutcome::Completed => write!(f, "completed"),
            DriveOutcome::Empty => write!(f, "empty"),
            DriveOutcome::Blocked => write!(f, "blocked"),
        }
    }
}

/// 翻页驱动配置
#[derive(Debug, Clone)]
pub struct DriveSettings {
    /// 每个窗口最多滚动次数
    pub max_iterations: u32,
    /// 每次滚动后的等待时间
    pub pagination_pause: Duration,
    /// 连续无新记录多少次视为到底
    pub stall_iterations: u32,
    /// 等待首批数据的超时
    pub first_batch_timeout: Duration,
    /// 页面加载超时
    pub page_load_timeout: Duration,
    /// 页面上表示限流的提示文字
    pub ui_throttle_markers: Vec<String>,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            pagination_pause: Duration::from_millis(1200),
            stall_iterations: 3,
            first_batch_timeout: Duration::from_secs(20),
            page_load_timeout: Duration::from_secs(30),
            ui_throttle_markers: vec!["Something went wrong".to_string()],
        }
    }
}

/// 翻页驱动
///
/// 打开搜索页后反复滚动到底部，由捕获监听器在后台收集数据；
/// 每轮滚动后按优先级检查终止信号与停滞情况。
pub struct PaginationDriver {
    settings: DriveSettings,
}

impl PaginationDriver {
    pub fn new(settings: DriveSettings) -> Self {
        Self { settings }
    }

    /// 驱动一个窗口直到终止信号、停滞或达到滚动上限
    ///
    /// # 参数
    ///
    /// * `session` - 浏览会话，监听器应已订阅其网络事件
    /// * `url` - 窗口的搜索地址
    /// * `signals` - 与监听器共享的信号
    ///
    /// # 返回值
    ///
    /// * `Ok(DriveOutcome)` - 窗口结果
    /// * `Err(EngineError)` - 导航或滚动失败
    pub async fn drive(
        &self,
        session: &dyn BrowsingSession,
        url: &str,
        signals: &CaptureSignals,
    ) -> Result<DriveOutcome, EngineError> {
        match tokio::time::timeout(self.settings.page_load_timeout, session.navigate(url)).await {
            Ok(result) => result?,
            Err(_) => warn!(
                timeout_secs = self.settings.page_load_timeout.as_secs(),
                "Page load timed out, continuing"
            ),
        }

        if tokio::time::timeout(
            self.settings.first_batch_timeout,
            signals.wait_for_first_batch(),
        )
        .await
        .is_err()
        {
            info!(
                timeout_secs = self.settings.first_batch_timeout.as_secs(),
                "No data captured after page load"
            );
        }

        if self.ui_throttled(session).await {
            signals.raise(TerminalSignal::Throttled);
        }
        if let Some(outcome) = outcome_for(signals.terminal()) {
            return Ok(outcome);
        }

        let mut last_count = signals.record_count();
        let mut stalled = 0;

        for iteration in 1..=self.settings.max_iterations {
            session.scroll_to_bottom().await?;
            tokio::time::sleep(self.settings.pagination_pause).await;

            if let Some(outcome) = outcome_for(signals.terminal()) {
                debug!(iteration, %outcome, "Terminal signal observed");
                return Ok(outcome);
            }

            let count = signals.record_count();
            if count > last_count {
                debug!(iteration, new_records = count - last_count, total = count, "Scrolled");
                last_count = count;
                stalled = 0;
                continue;
            }

            stalled += 1;
            if stalled >= self.settings.stall_iterations {
                if self.ui_throttled(session).await {
                    signals.raise(TerminalSignal::Throttled);
                    return Ok(DriveOutcome::Blocked);
                }
                info!(iteration, total = count, "No new records, window exhausted");
                return Ok(DriveOutcome::Completed);
            }
        }

        warn!(
            max_iterations = self.settings.max_iterations,
            total = signals.record_count(),
            "Scroll ceiling reached, window may be incomplete"
        );
        Ok(DriveOutcome::Completed)
    }

    async fn ui_throttled(&self, session: &dyn BrowsingSession) -> bool {
        for marker in &self.settings.ui_throttle_markers {
            match session.page_contains_text(marker).await {
                Ok(true) => {
                    warn!(marker = %marker, "Throttle notice shown on page");
                    return true;
                }
                Ok(false) => {}
                Err(e) => warn!("Page text check failed: {}", e),
            }
        }
        false
    }
}

fn outcome_for(signal: Option<TerminalSignal>) -> Option<DriveOutcome> {
    match signal? {
        TerminalSignal::Throttled => Some(DriveOutcome::Blocked),
        TerminalSignal::Empty => Some(DriveOutcome::Empty),
    }
}
