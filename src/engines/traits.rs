// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::identity::Identity;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use thiserror::Error;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 浏览器启动失败
    #[error("Browser launch failed: {0}")]
    Launch(String),
    /// 页面导航失败
    #[error("Navigation failed: {0}")]
    Navigation(String),
    /// DevTools 协议调用失败
    #[error("CDP command failed: {0}")]
    Cdp(String),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 会话已关闭
    #[error("Session closed")]
    Closed,
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl EngineError {
    /// 判断错误是否只影响单个事件
    ///
    /// 单次响应体读取失败不影响会话，其余错误意味着本次尝试失败。
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Cdp(_) | EngineError::Timeout)
    }
}

/// 浏览器网络事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// 收到响应头
    ResponseReceived { request_id: String, url: String },
    /// 响应体加载完成，可以读取
    LoadingFinished { request_id: String },
}

/// 通过请求ID读取到的响应体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseBody {
    /// 响应体文本（base64 编码时为编码后的文本）
    pub body: String,
    /// 是否为 base64 传输编码
    pub base64_encoded: bool,
}

/// 网络事件流
pub type NetworkEventStream = BoxStream<'static, NetworkEvent>;

/// 浏览会话特质
///
/// 一个已登录、可交互的浏览器页面。由会话提供者创建，
/// 窗口尝试结束后必须调用 `close` 释放底层资源。
#[async_trait]
pub trait BrowsingSession: Send + Sync {
    /// 订阅网络事件，必须在导航之前调用以免丢失首批响应
    async fn network_events(&self) -> Result<NetworkEventStream, EngineError>;

    /// 导航到指定地址
    async fn navigate(&self, url: &str) -> Result<(), EngineError>;

    /// 滚动到页面底部以触发下一页加载
    async fn scroll_to_bottom(&self) -> Result<(), EngineError>;

    /// 检查页面可见文本是否包含指定内容
    async fn page_contains_text(&self, text: &str) -> Result<bool, EngineError>;

    /// 通过请求ID读取完整响应体
    async fn response_body(&self, request_id: &str) -> Result<ResponseBody, EngineError>;

    /// 关闭会话
    async fn close(&self) -> Result<(), EngineError>;
}

/// 会话提供者特质
///
/// 给定一个身份，返回已就绪的登录会话。
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// 为身份打开新的浏览会话
    async fn open(&self, identity: &Identity) -> Result<Arc<dyn BrowsingSession>, EngineError>;

    /// 提供者名称
    fn name(&self) -> &'static str;
}
