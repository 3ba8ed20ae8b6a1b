// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::window::Window;
use chrono::{Days, NaiveDate};
use thiserror::Error;

/// 窗口规划错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlanError {
    /// 日期范围无效
    #[error("Invalid range: since {since} must be before until {until} and window_days ({window_days}) must be at least 1")]
    InvalidRange {
        since: NaiveDate,
        until: NaiveDate,
        window_days: u32,
    },
}

/// 将日期范围拆分为按时间排序的窗口
///
/// 窗口覆盖 `[since, until)`，每个窗口最多跨越 `window_days` 天，
/// 最后一个窗口被截断到 `until`。纯函数，续爬时可以原样重新计算。
///
/// # 参数
///
/// * `since` - 起始日期（包含）
/// * `until` - 结束日期（不包含）
/// * `window_days` - 单个窗口的天数
///
/// # 返回值
///
/// * `Ok(Vec<Window>)` - 全部为 Pending 状态的窗口序列
/// * `Err(PlanError)` - `since >= until` 或 `window_days < 1`
pub fn plan_windows(
    since: NaiveDate,
    until: NaiveDate,
    window_days: u32,
) -> Result<Vec<Window>, PlanError> {
    if since >= until || window_days < 1 {
        return Err(PlanError::InvalidRange {
            since,
            until,
            window_days,
        });
    }

    let mut windows = Vec::new();
    let mut start = since;
    while start < until {
        let end = start
            .checked_add_days(Days::new(u64::from(window_days)))
            .map_or(until, |d| d.min(until));
        windows.push(Window::new(start, end));
        start = end;
    }

    Ok(windows)
}

/// 根据断点计算剩余窗口
///
/// 断点窗口（可能已被收窄）排在最前，随后是所有从断点 `until`
/// 开始或之后的规划窗口。断点 `until` 落在某个规划窗口内部时（断点由不同的
/// `window_days` 写出），先补上该窗口的剩余部分，保证窗口首尾相接。
/// 断点不在规划范围内时返回 `None`。
pub fn resume_windows(planned: &[Window], saved: &Window) -> Option<Vec<Window>> {
    let first = planned.first()?;
    let last = planned.last()?;
    if saved.since >= saved.until || saved.since < first.since || saved.until > last.until {
        return None;
    }

    let mut remaining = vec![Window::new(saved.since, saved.until)];
    if let Some(straddling) = planned
        .iter()
        .find(|w| w.since < saved.until && saved.until < w.until)
    {
        remaining.push(Window::new(saved.until, straddling.until));
    }
    remaining.extend(
        planned
            .iter()
            .filter(|w| w.since >= saved.until)
            .map(|w| Window::new(w.since, w.until)),
    );
    Some(remaining)
}
