// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 身份（identity）：预先登录的浏览器配置
/// - 时间窗口（window）：爬取的最小调度单位
/// - 记录（record）：从网络响应中解码出的领域记录
/// - 爬取断点（crawl_state）：支持断点续爬的持久化状态
/// - 结果汇总（summary）：每个目标的最终结果
pub mod crawl_state;
pub mod identity;
pub mod record;
pub mod summary;
pub mod window;
