// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::application::use_cases::harvest_use_case::CrawlConfig;
use crate::domain::models::identity::Identity;
use crate::domain::services::identity_rotation::IdentityStart;
use crate::domain::services::search_query::SearchQuery;
use crate::engines::chromium_session::BrowserOptions;
use crate::utils::errors::SettingsError;
use crate::utils::telemetry::LogRotation;
use crate::workers::capture_listener::CaptureSettings;
use crate::workers::pagination_driver::DriveSettings;

/// 应用程序配置设置
///
/// 加载顺序：内置默认值 → `config/default.toml` → `config/{HARVESTRS_ENVIRONMENT}.toml`
/// → 环境变量 `HARVESTRS__SECTION__KEY`。
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Settings {
    /// 抓取配置
    #[validate(nested)]
    pub crawl: CrawlSettings,
    /// 网络捕获配置
    #[validate(nested)]
    pub capture: CaptureConfig,
    /// 浏览器配置
    #[validate(nested)]
    pub browser: BrowserSettings,
    /// 搜索页面配置
    #[validate(nested)]
    pub search: SearchSettings,
    /// 存储配置
    pub storage: StorageSettings,
    /// 日志配置
    pub logging: LoggingSettings,
}

/// 抓取配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_range"))]
pub struct CrawlSettings {
    /// 已登录的浏览器配置目录，按轮换顺序排列
    #[validate(length(min = 1))]
    pub identities: Vec<String>,
    /// 抓取目标
    #[validate(length(min = 1))]
    pub targets: Vec<String>,
    /// 起始日期（包含）
    pub since: NaiveDate,
    /// 结束日期（不包含）
    pub until: NaiveDate,
    /// 每个窗口的天数
    #[validate(range(min = 1))]
    pub window_days: u32,
    /// 每个窗口最多滚动次数
    #[validate(range(min = 1))]
    pub max_iterations: u32,
    /// 每次滚动后的等待时间（秒）
    #[validate(range(min = 0.0))]
    pub pagination_pause_seconds: f64,
    /// 轮换身份后的等待时间（秒）
    #[validate(range(min = 0.0))]
    pub rotate_delay_seconds: f64,
    /// 连续无新记录多少次视为到底
    #[validate(range(min = 1))]
    pub stall_iterations: u32,
    /// 等待首批数据的超时（秒）
    pub first_batch_timeout_seconds: u64,
    /// 页面加载超时（秒）
    pub page_load_timeout_seconds: u64,
    /// 起始身份选择策略
    pub identity_start: IdentityStart,
}

fn validate_range(crawl: &CrawlSettings) -> Result<(), ValidationError> {
    if crawl.since >= crawl.until {
        let mut error = ValidationError::new("invalid_range");
        error.message = Some(format!("since {} must be before until {}", crawl.since, crawl.until).into());
        return Err(error);
    }
    Ok(())
}

/// 网络捕获配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CaptureConfig {
    /// 目标接口URL的正则表达式
    #[validate(length(min = 1))]
    pub endpoint_patterns: Vec<String>,
    /// 响应体中的限流标记
    pub throttle_markers: Vec<String>,
    /// 页面上的限流提示
    pub ui_throttle_markers: Vec<String>,
    /// 扫描限流标记的前缀字节数
    #[validate(range(min = 1))]
    pub marker_scan_bytes: usize,
    /// 事件轮询间隔（毫秒）
    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,
    /// 单个响应体的 JSON 节点预算
    #[validate(range(min = 1))]
    pub max_nodes: usize,
}

/// 浏览器配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BrowserSettings {
    /// 是否无头运行
    pub headless: bool,
    /// Chrome 可执行文件路径
    pub chrome_executable: Option<String>,
    /// 启动超时（秒）
    #[validate(range(min = 1))]
    pub launch_timeout_seconds: u64,
}

/// 搜索页面配置设置
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SearchSettings {
    /// 搜索页面地址
    #[validate(length(min = 1))]
    pub base_url: String,
    /// 查询模板，支持 `{target}`、`{since}`、`{until}`
    #[validate(length(min = 1))]
    pub query_template: String,
    /// 额外的查询参数
    pub extra_params: String,
}

/// 存储配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// 断点文件目录
    pub state_dir: String,
    /// 结果文件目录
    pub output_dir: String,
}

/// 日志配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// 控制台是否输出 JSON 行
    pub json: bool,
    /// 日志文件目录，为空时只输出到控制台
    pub dir: String,
    /// 日志文件名前缀
    pub file_prefix: String,
    /// 日志文件滚动周期
    pub rotation: LogRotation,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// # 返回值
    ///
    /// * `Ok(Settings)` - 成功加载并通过校验的配置
    /// * `Err(SettingsError)` - 加载或校验失败
    pub fn new() -> Result<Self, SettingsError> {
        let env = std::env::var("HARVESTRS_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Self::with_defaults(Config::builder())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::with_prefix("HARVESTRS")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("crawl.identities")
                    .with_list_parse_key("crawl.targets")
                    .with_list_parse_key("capture.endpoint_patterns")
                    .with_list_parse_key("capture.throttle_markers")
                    .with_list_parse_key("capture.ui_throttle_markers"),
            );

        Self::build(builder)
    }

    /// 从 TOML 文本加载配置（叠加在默认值之上）
    pub fn from_toml_str(toml: &str) -> Result<Self, SettingsError> {
        let builder = Self::with_defaults(Config::builder())?
            .add_source(File::from_str(toml, FileFormat::Toml));
        Self::build(builder)
    }

    fn with_defaults(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        builder
            // Default crawl settings
            .set_default("crawl.window_days", 1)?
            .set_default("crawl.max_iterations", 100)?
            .set_default("crawl.pagination_pause_seconds", 1.2)?
            .set_default("crawl.rotate_delay_seconds", 5.0)?
            .set_default("crawl.stall_iterations", 3)?
            .set_default("crawl.first_batch_timeout_seconds", 20)?
            .set_default("crawl.page_load_timeout_seconds", 30)?
            .set_default("crawl.identity_start", "first")?
            // Default capture settings
            .set_default("capture.endpoint_patterns", vec!["SearchTimeline", "UserTweets"])?
            .set_default("capture.throttle_markers", vec!["rate limit exceeded"])?
            .set_default("capture.ui_throttle_markers", vec!["Something went wrong"])?
            .set_default("capture.marker_scan_bytes", 1000)?
            .set_default("capture.poll_interval_ms", 250)?
            .set_default("capture.max_nodes", 200_000)?
            // Default browser settings
            .set_default("browser.headless", false)?
            .set_default("browser.launch_timeout_seconds", 60)?
            // Default search settings
            .set_default("search.base_url", "https://x.com/search")?
            .set_default("search.query_template", "from:{target} since:{since} until:{until}")?
            .set_default("search.extra_params", "src=typed_query&f=live")?
            // Default storage settings
            .set_default("storage.state_dir", ".")?
            .set_default("storage.output_dir", "output")?
            // Default logging settings
            .set_default("logging.json", false)?
            .set_default("logging.dir", "logs")?
            .set_default("logging.file_prefix", "harvestrs.log")?
            .set_default("logging.rotation", "daily")
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, SettingsError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// 构造一次运行使用的不可变配置
    pub fn crawl_config(&self) -> Result<CrawlConfig, SettingsError> {
        let crawl = &self.crawl;
        let capture = CaptureSettings::new(
            &self.capture.endpoint_patterns,
            &self.capture.throttle_markers,
            self.capture.marker_scan_bytes,
            Duration::from_millis(self.capture.poll_interval_ms),
            self.capture.max_nodes,
        )?;

        Ok(CrawlConfig {
            identities: Identity::pool_from_dirs(&crawl.identities),
            targets: crawl.targets.clone(),
            since: crawl.since,
            until: crawl.until,
            window_days: crawl.window_days,
            identity_start: crawl.identity_start,
            rotate_delay: Duration::from_secs_f64(crawl.rotate_delay_seconds),
            drive: DriveSettings {
                max_iterations: crawl.max_iterations,
                pagination_pause: Duration::from_secs_f64(crawl.pagination_pause_seconds),
                stall_iterations: crawl.stall_iterations,
                first_batch_timeout: Duration::from_secs(crawl.first_batch_timeout_seconds),
                page_load_timeout: Duration::from_secs(crawl.page_load_timeout_seconds),
                ui_throttle_markers: self.capture.ui_throttle_markers.clone(),
            },
            capture,
            search: SearchQuery::new(
                self.search.base_url.as_str(),
                self.search.query_template.as_str(),
                self.search.extra_params.as_str(),
            ),
        })
    }

    /// 浏览器启动参数
    pub fn browser_options(&self) -> BrowserOptions {
        BrowserOptions {
            headless: self.browser.headless,
            chrome_executable: self
                .browser
                .chrome_executable
                .as_deref()
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from),
            launch_timeout: Duration::from_secs(self.browser.launch_timeout_seconds),
            ..BrowserOptions::default()
        }
    }
}
