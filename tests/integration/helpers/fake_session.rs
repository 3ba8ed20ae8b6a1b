// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::StreamExt;
use harvestrs::domain::models::identity::Identity;
use harvestrs::engines::traits::{
    BrowsingSession, EngineError, NetworkEvent, NetworkEventStream, ResponseBody, SessionProvider,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

const ENDPOINT: &str = "https://x.com/i/api/graphql/q1/SearchTimeline?variables=%7B%7D";

/// 一次页面加载或滚动后浏览器收到的响应
#[derive(Debug, Clone)]
pub enum Batch {
    /// 包含若干记录的时间线响应
    Records(Vec<(&'static str, DateTime<Utc>)>),
    /// 没有更多条目的时间线响应
    Exhausted,
    /// 带限流标记的响应
    Throttle,
    /// 没有任何网络请求
    Nothing,
}

/// 一次窗口尝试的脚本
#[derive(Debug, Clone, Default)]
pub struct AttemptScript {
    /// 第一个元素在导航时发出，其余依次在每次滚动时发出
    pub batches: Vec<Batch>,
    /// 页面是否显示限流提示
    pub ui_notice: bool,
    /// 打开会话是否失败
    pub fail_open: bool,
}

impl AttemptScript {
    pub fn batches(batches: Vec<Batch>) -> Self {
        Self {
            batches,
            ..Self::default()
        }
    }

    pub fn throttled() -> Self {
        Self::batches(vec![Batch::Throttle])
    }

    pub fn records(records: Vec<(&'static str, DateTime<Utc>)>) -> Self {
        Self::batches(vec![Batch::Records(records)])
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }
}

/// 一次导航：使用的身份与访问的地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub identity: String,
    pub url: String,
}

/// 按脚本返回会话的提供者
#[derive(Default)]
pub struct FakeSessionProvider {
    scripts: Mutex<VecDeque<AttemptScript>>,
    visits: Arc<Mutex<Vec<Visit>>>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    cancel_on_open: Mutex<Option<(usize, watch::Sender<bool>)>>,
}

impl FakeSessionProvider {
    pub fn new(scripts: Vec<AttemptScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            ..Self::default()
        }
    }

    /// 在第 `attempt` 次打开会话时发出停止信号（从 1 开始计数）
    pub fn cancel_on_open(&self, attempt: usize, shutdown: watch::Sender<bool>) {
        *self.cancel_on_open.lock() = Some((attempt, shutdown));
    }

    pub fn visits(&self) -> Vec<Visit> {
        self.visits.lock().clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for FakeSessionProvider {
    async fn open(&self, identity: &Identity) -> Result<Arc<dyn BrowsingSession>, EngineError> {
        let attempt = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, ref shutdown)) = *self.cancel_on_open.lock() {
            if at == attempt {
                let _ = shutdown.send(true);
            }
        }

        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| AttemptScript::batches(vec![Batch::Exhausted]));
        if script.fail_open {
            return Err(EngineError::Launch(format!("profile {} is locked", identity.name)));
        }

        let (tx, rx) = unbounded();
        Ok(Arc::new(FakeSession {
            identity: identity.name.clone(),
            script,
            events_tx: tx,
            events_rx: Mutex::new(Some(rx)),
            bodies: Mutex::new(HashMap::new()),
            emitted: AtomicUsize::new(0),
            visits: self.visits.clone(),
            closed: self.closed.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub struct FakeSession {
    identity: String,
    script: AttemptScript,
    events_tx: UnboundedSender<NetworkEvent>,
    events_rx: Mutex<Option<UnboundedReceiver<NetworkEvent>>>,
    bodies: Mutex<HashMap<String, ResponseBody>>,
    emitted: AtomicUsize,
    visits: Arc<Mutex<Vec<Visit>>>,
    closed: Arc<AtomicUsize>,
}

impl FakeSession {
    /// 发出脚本中的下一个批次
    fn emit_next(&self) {
        let n = self.emitted.fetch_add(1, Ordering::SeqCst);
        let body = match self.script.batches.get(n) {
            Some(Batch::Records(records)) => timeline_body(records),
            Some(Batch::Exhausted) => timeline_body(&[]),
            Some(Batch::Throttle) => r#"{"errors":[{"message":"Rate limit exceeded","code":88}]}"#.to_string(),
            Some(Batch::Nothing) | None => return,
        };

        let request_id = format!("{}-{}", self.identity, n);
        self.bodies.lock().insert(
            request_id.clone(),
            ResponseBody {
                body,
                base64_encoded: false,
            },
        );
        let _ = self.events_tx.unbounded_send(NetworkEvent::ResponseReceived {
            request_id: request_id.clone(),
            url: ENDPOINT.to_string(),
        });
        let _ = self
            .events_tx
            .unbounded_send(NetworkEvent::LoadingFinished { request_id });
    }
}

#[async_trait]
impl BrowsingSession for FakeSession {
    async fn network_events(&self) -> Result<NetworkEventStream, EngineError> {
        let rx = self.events_rx.lock().take().ok_or(EngineError::Closed)?;
        Ok(rx.boxed())
    }

    async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        self.visits.lock().push(Visit {
            identity: self.identity.clone(),
            url: url.to_string(),
        });
        self.emit_next();
        Ok(())
    }

    async fn scroll_to_bottom(&self) -> Result<(), EngineError> {
        self.emit_next();
        Ok(())
    }

    async fn page_contains_text(&self, text: &str) -> Result<bool, EngineError> {
        Ok(self.script.ui_notice && text == "Something went wrong")
    }

    async fn response_body(&self, request_id: &str) -> Result<ResponseBody, EngineError> {
        self.bodies
            .lock()
            .get(request_id)
            .cloned()
            .ok_or_else(|| EngineError::Cdp(format!("No resource with given identifier {}", request_id)))
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn created_at(ts: &DateTime<Utc>) -> String {
    ts.format("%a %b %d %H:%M:%S +0000 %Y").to_string()
}

/// 构造一个搜索时间线响应
pub fn timeline_body(records: &[(&'static str, DateTime<Utc>)]) -> String {
    let entries: Vec<Value> = records
        .iter()
        .map(|(id, ts)| {
            json!({
                "entryId": format!("tweet-{}", id),
                "content": { "itemContent": { "tweet_results": { "result": {
                    "__typename": "Tweet",
                    "rest_id": id,
                    "legacy": { "created_at": created_at(ts), "full_text": format!("record {}", id) }
                } } } }
            })
        })
        .collect();

    json!({
        "data": { "search_by_raw_query": { "search_timeline": { "timeline": {
            "instructions": [{ "type": "TimelineAddEntries", "entries": entries }]
        } } } }
    })
    .to_string()
}
