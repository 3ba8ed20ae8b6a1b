// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 纯逻辑部分：窗口规划、身份轮换、记录判定与去重、搜索地址构造。
pub mod identity_rotation;
pub mod record_collector;
pub mod record_predicate;
pub mod search_query;
pub mod timeline_predicate;
pub mod window_planner;
