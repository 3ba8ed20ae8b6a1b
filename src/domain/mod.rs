// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：身份、窗口、记录与断点
/// - 仓库接口（repositories）：断点与输出的持久化抽象
/// - 服务（services）：窗口规划、身份轮换、记录判定
///
/// 领域层不依赖浏览器或文件系统的具体实现。
pub mod models;
pub mod repositories;
pub mod services;
