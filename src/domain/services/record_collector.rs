// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::record::ExtractedRecord;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use parking_lot::Mutex;
use std::sync::Arc;

/// 记录收集器
///
/// 持有一个目标的记录集合，并共享运行级的去重集合。
/// 捕获监听器在后台写入，编排器与翻页驱动可以并发读取。
#[derive(Debug)]
pub struct RecordCollector {
    seen: Arc<DashSet<String>>,
    records: Mutex<Vec<ExtractedRecord>>,
}

impl RecordCollector {
    /// 创建收集器
    ///
    /// # 参数
    ///
    /// * `seen` - 运行级去重集合，跨窗口、跨身份轮换共享
    pub fn new(seen: Arc<DashSet<String>>) -> Self {
        Self {
            seen,
            records: Mutex::new(Vec::new()),
        }
    }

    /// 提交一条候选记录，只有未见过的ID会被保存
    pub fn offer(&self, record: ExtractedRecord) -> bool {
        if !self.seen.insert(record.id.clone()) {
            return false;
        }
        self.records.lock().push(record);
        true
    }

    /// 批量提交候选记录，返回新增数量
    pub fn offer_all<I>(&self, records: I) -> usize
    where
        I: IntoIterator<Item = ExtractedRecord>,
    {
        records.into_iter().map(|r| self.offer(r)).filter(|added| *added).count()
    }

    /// 已保存的记录数
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 当前记录的副本
    pub fn snapshot(&self) -> Vec<ExtractedRecord> {
        self.records.lock().clone()
    }

    /// 从第 `offset` 条开始的记录中最新的时间戳
    ///
    /// 用于计算一次被限流的尝试最远捕获到了哪里。
    pub fn latest_timestamp_from(&self, offset: usize) -> Option<DateTime<Utc>> {
        self.records
            .lock()
            .iter()
            .skip(offset)
            .map(|r| r.timestamp)
            .max()
    }
}
