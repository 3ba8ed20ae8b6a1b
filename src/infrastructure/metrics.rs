// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_gauge};

/// 注册抓取过程的各类监控指标
///
/// 不安装导出器。嵌入方安装 recorder 之前，所有指标调用都是空操作。
pub fn describe_metrics() {
    describe_counter!(
        "harvest_records_captured_total",
        "Total number of new records captured from network responses"
    );
    describe_counter!(
        "harvest_identity_rotations_total",
        "Total number of identity rotations after throttling or failures"
    );
    describe_counter!(
        "harvest_windows_resolved_total",
        "Total number of windows resolved, labelled by final status"
    );
    describe_counter!(
        "harvest_capture_events_dropped_total",
        "Total number of matched responses dropped because the body could not be read"
    );
    describe_gauge!(
        "harvest_consecutive_blocks",
        "Consecutive throttled attempts on the current window"
    );
}
