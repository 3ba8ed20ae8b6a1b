// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则：
/// - 爬取断点仓库（crawl_state_repository）：保存与恢复续爬位置
/// - 输出仓库（output_repository）：写出与读回目标的记录
///
/// 具体实现由基础设施层提供。
pub mod crawl_state_repository;
pub mod output_repository;
