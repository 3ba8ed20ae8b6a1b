// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含抓取用例：窗口调度、身份轮换与断点续抓
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心实体、服务和仓库接口
pub mod domain;

/// 引擎模块
///
/// 浏览会话抽象、Chromium 实现与响应体解码
pub mod engines;

/// 基础设施模块
///
/// 提供断点与结果文件存储、监控指标
pub mod infrastructure;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 网络捕获监听器与翻页驱动
pub mod workers;
