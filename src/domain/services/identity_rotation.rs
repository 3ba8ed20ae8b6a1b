// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::identity::Identity;
use metrics::counter;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// 身份轮换错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RotationError {
    /// 身份池为空
    #[error("Identity pool is empty")]
    EmptyPool,
    /// 同一窗口连续失败次数达到身份池大小
    #[error("Identity pool exhausted: {failures} consecutive failures with a pool of {pool_size}")]
    PoolExhausted { failures: usize, pool_size: usize },
}

/// 起始身份选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStart {
    /// 从第一个身份开始
    #[default]
    First,
    /// 随机选择起始身份
    Random,
}

/// 身份轮换管理器
///
/// 持有有序的身份池与当前游标。被限流时严格按轮询推进并回绕，
/// 从不永久移除身份：之前被限流的身份可能在运行中途恢复。
#[derive(Debug, Clone)]
pub struct IdentityRotationManager {
    pool: Vec<Identity>,
    cursor: usize,
}

impl IdentityRotationManager {
    /// 创建轮换管理器，游标指向第一个身份
    ///
    /// # 返回值
    ///
    /// * `Ok(IdentityRotationManager)` - 创建成功
    /// * `Err(RotationError::EmptyPool)` - 身份池为空
    pub fn new(pool: Vec<Identity>) -> Result<Self, RotationError> {
        if pool.is_empty() {
            return Err(RotationError::EmptyPool);
        }
        Ok(Self { pool, cursor: 0 })
    }

    /// 按策略创建轮换管理器
    pub fn with_start(pool: Vec<Identity>, start: IdentityStart) -> Result<Self, RotationError> {
        let mut manager = Self::new(pool)?;
        if start == IdentityStart::Random {
            let index = rand::random_range(0..manager.pool.len());
            manager.start_from(index);
        }
        Ok(manager)
    }

    /// 当前活动身份
    pub fn current(&self) -> &Identity {
        &self.pool[self.cursor]
    }

    /// 当前游标位置
    pub fn current_index(&self) -> usize {
        self.cursor
    }

    /// 身份池大小
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// 推进到下一个身份
    ///
    /// 游标移动到 `(index + 1) mod poolSize`，返回新的活动身份。
    pub fn advance(&mut self) -> &Identity {
        let previous = self.cursor;
        self.cursor = (self.cursor + 1) % self.pool.len();
        counter!("harvest_identity_rotations_total").increment(1);
        info!(
            from = %self.pool[previous],
            to = %self.pool[self.cursor],
            "Rotated identity"
        );
        &self.pool[self.cursor]
    }

    /// 设置游标位置（用于续爬）
    ///
    /// 超出身份池范围的索引按池大小取模。
    pub fn start_from(&mut self, index: usize) -> &Identity {
        if index >= self.pool.len() {
            warn!(
                index,
                pool_size = self.pool.len(),
                "Saved identity index is outside the pool, wrapping around"
            );
        }
        self.cursor = index % self.pool.len();
        &self.pool[self.cursor]
    }

    /// 检查调用方提供的连续失败计数是否已经耗尽身份池
    ///
    /// # 参数
    ///
    /// * `consecutive_failures` - 同一窗口的连续失败次数
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 仍有身份可以尝试
    /// * `Err(RotationError::PoolExhausted)` - 每个身份都已失败过一次
    pub fn ensure_not_exhausted(&self, consecutive_failures: usize) -> Result<(), RotationError> {
        if consecutive_failures >= self.pool.len() {
            return Err(RotationError::PoolExhausted {
                failures: consecutive_failures,
                pool_size: self.pool.len(),
            });
        }
        Ok(())
    }
}
