// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::identity::Identity;
use crate::engines::traits::{
    BrowsingSession, EngineError, NetworkEvent, NetworkEventStream, ResponseBody, SessionProvider,
};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFinished, EventResponseReceived, GetResponseBodyParams, RequestId,
    SetCacheDisabledParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// 浏览器启动参数
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// 是否无头运行
    pub headless: bool,
    /// Chrome 可执行文件路径，未设置时自动探测
    pub chrome_executable: Option<PathBuf>,
    /// 启动超时
    pub launch_timeout: Duration,
    /// 单条 CDP 命令超时
    pub request_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_executable: None,
            launch_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// 基于 chromiumoxide 的会话提供者
///
/// 每次 `open` 启动一个独立的 Chromium 进程，使用身份的配置目录
/// 作为 `--user-data-dir`，从而复用该身份已登录的 Cookie。
pub struct ChromiumSessionProvider {
    options: BrowserOptions,
}

impl ChromiumSessionProvider {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }

    fn launch_config(&self, identity: &Identity) -> Result<BrowserConfig, EngineError> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(&identity.profile_dir)
            .request_timeout(self.options.request_timeout)
            .arg("--start-maximized")
            .arg("--disable-dev-shm-usage");

        if !self.options.headless {
            builder = builder.with_head();
        }
        if let Some(ref executable) = self.options.chrome_executable {
            builder = builder.chrome_executable(executable);
        }

        builder.build().map_err(EngineError::Launch)
    }
}

#[async_trait]
impl SessionProvider for ChromiumSessionProvider {
    async fn open(&self, identity: &Identity) -> Result<Arc<dyn BrowsingSession>, EngineError> {
        let config = self.launch_config(identity)?;

        let (browser, mut handler) =
            tokio::time::timeout(self.options.launch_timeout, Browser::launch(config))
                .await
                .map_err(|_| EngineError::Timeout)?
                .map_err(|e| EngineError::Launch(e.to_string()))?;

        // Spawn a handler to process browser events
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = match prepare_page(&browser).await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(e);
            }
        };

        info!(identity = %identity, "Browser session opened");

        Ok(Arc::new(ChromiumSession {
            browser: Mutex::new(Some(browser)),
            page,
            handler_task,
            identity: identity.to_string(),
        }))
    }

    fn name(&self) -> &'static str {
        "chromium"
    }
}

async fn prepare_page(browser: &Browser) -> Result<Page, EngineError> {
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| EngineError::Launch(e.to_string()))?;

    page.execute(EnableParams::default())
        .await
        .map_err(|e| EngineError::Cdp(format!("Network.enable: {}", e)))?;
    page.execute(SetCacheDisabledParams::new(true))
        .await
        .map_err(|e| EngineError::Cdp(format!("Network.setCacheDisabled: {}", e)))?;

    Ok(page)
}

/// Chromium 浏览会话
pub struct ChromiumSession {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler_task: JoinHandle<()>,
    identity: String,
}

#[async_trait]
impl BrowsingSession for ChromiumSession {
    async fn network_events(&self) -> Result<NetworkEventStream, EngineError> {
        let responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| EngineError::Cdp(e.to_string()))?
            .map(|event| NetworkEvent::ResponseReceived {
                request_id: event.request_id.inner().clone(),
                url: event.response.url.clone(),
            });

        let finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(|e| EngineError::Cdp(e.to_string()))?
            .map(|event| NetworkEvent::LoadingFinished {
                request_id: event.request_id.inner().clone(),
            });

        Ok(futures::stream::select(responses, finished).boxed())
    }

    async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        debug!(identity = %self.identity, url, "Navigating");
        self.page
            .goto(url)
            .await
            .map_err(|e| EngineError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<(), EngineError> {
        self.page
            .evaluate(SCROLL_TO_BOTTOM)
            .await
            .map_err(|e| EngineError::Other(format!("Scroll failed: {}", e)))?;
        Ok(())
    }

    async fn page_contains_text(&self, text: &str) -> Result<bool, EngineError> {
        let needle = serde_json::to_string(text).map_err(|e| EngineError::Other(e.to_string()))?;
        let script = format!(
            "document.body ? document.body.innerText.includes({}) : false",
            needle
        );

        self.page
            .evaluate(script)
            .await
            .map_err(|e| EngineError::Cdp(e.to_string()))?
            .into_value::<bool>()
            .map_err(|e| EngineError::Other(format!("Unexpected page check result: {}", e)))
    }

    async fn response_body(&self, request_id: &str) -> Result<ResponseBody, EngineError> {
        let response = self
            .page
            .execute(GetResponseBodyParams::new(RequestId::new(request_id)))
            .await
            .map_err(body_fetch_error)?;

        Ok(ResponseBody {
            body: response.result.body.clone(),
            base64_encoded: response.result.base64_encoded,
        })
    }

    async fn close(&self) -> Result<(), EngineError> {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return Ok(());
        };

        let closed = browser
            .close()
            .await
            .map_err(|e| EngineError::Other(format!("Browser close failed: {}", e)));
        if let Err(e) = browser.wait().await {
            warn!(identity = %self.identity, "Browser process did not exit cleanly: {}", e);
        }
        self.handler_task.abort();

        info!(identity = %self.identity, "Browser session closed");
        closed.map(|_| ())
    }
}

/// 响应体读取失败时区分单个事件错误与会话断开
fn body_fetch_error(err: CdpError) -> EngineError {
    match err {
        CdpError::ChannelSendError(_) | CdpError::NoResponse => EngineError::Closed,
        CdpError::Timeout => EngineError::Timeout,
        other => EngineError::Cdp(format!("Network.getResponseBody: {}", other)),
    }
}
