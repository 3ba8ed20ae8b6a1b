// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 提供领域仓库接口的具体实现与监控指标注册：
/// - 存储（storage）：断点文件与结果文件的读写，以及测试用的内存实现
/// - 指标（metrics）：抓取过程的指标描述
pub mod metrics;
pub mod storage;
