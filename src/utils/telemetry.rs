// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Deserialize;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::settings::LoggingSettings;

/// 日志文件滚动周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// 初始化日志
///
/// 未设置 `RUST_LOG` 时默认 `info,harvestrs=debug`。控制台输出始终开启，
/// `json` 为真时输出 JSON 行；配置了日志目录时同时写入滚动日志文件。
///
/// # 返回值
///
/// * `Ok(Some(WorkerGuard))` - 文件日志的后台写入句柄，必须持有到进程结束
/// * `Ok(None)` - 未启用文件日志
/// * `Err(InitError)` - 日志目录无法创建
pub fn init_telemetry(logging: &LoggingSettings) -> Result<Option<WorkerGuard>, InitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,harvestrs=debug".into());

    let (file_layer, guard) = match file_writer(logging)? {
        Some((writer, guard)) => (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        ),
        None => (None, None),
    };
    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if logging.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
    Ok(guard)
}

fn file_writer(logging: &LoggingSettings) -> Result<Option<(NonBlocking, WorkerGuard)>, InitError> {
    if logging.dir.trim().is_empty() {
        return Ok(None);
    }
    let appender = RollingFileAppender::builder()
        .rotation(logging.rotation.into())
        .filename_prefix(logging.file_prefix.as_str())
        .build(&logging.dir)?;
    Ok(Some(tracing_appender::non_blocking(appender)))
}
