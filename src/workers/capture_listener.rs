// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use metrics::counter;
use regex::RegexSet;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::models::record::CaptureEvent;
use crate::domain::services::record_collector::RecordCollector;
use crate::domain::services::record_predicate::{extract_records, RecordPredicate};
use crate::engines::body_decoder::{decode_base64, decode_body, DecodeError};
use crate::engines::traits::{BrowsingSession, EngineError, NetworkEvent, NetworkEventStream};

/// 窗口终止信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalSignal {
    /// 响应体出现限流标记或页面出现限流提示
    Throttled,
    /// 响应结构表明没有更多数据
    Empty,
}

const NO_SIGNAL: u8 = 0;
const THROTTLED: u8 = 1;
const EMPTY: u8 = 2;

impl TerminalSignal {
    fn as_u8(self) -> u8 {
        match self {
            TerminalSignal::Throttled => THROTTLED,
            TerminalSignal::Empty => EMPTY,
        }
    }
}

/// 监听器与翻页驱动共享的信号
///
/// 终止信号每个窗口尝试至多设置一次，先写入者生效。
#[derive(Debug, Default)]
pub struct CaptureSignals {
    terminal: AtomicU8,
    records: AtomicUsize,
    batches: AtomicUsize,
    data_arrived: Notify,
}

impl CaptureSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置终止信号
    ///
    /// # 返回值
    ///
    /// 本次调用是否生效（已有信号时返回 false）
    pub fn raise(&self, signal: TerminalSignal) -> bool {
        self.terminal
            .compare_exchange(NO_SIGNAL, signal.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn terminal(&self) -> Option<TerminalSignal> {
        match self.terminal.load(Ordering::Acquire) {
            THROTTLED => Some(TerminalSignal::Throttled),
            EMPTY => Some(TerminalSignal::Empty),
            _ => None,
        }
    }

    /// 本次尝试新增的记录数
    pub fn record_count(&self) -> usize {
        self.records.load(Ordering::Acquire)
    }

    /// 本次尝试成功解析的响应数
    pub fn batch_count(&self) -> usize {
        self.batches.load(Ordering::Acquire)
    }

    /// 记录一个成功解析的批次，首个批次会唤醒首批等待方
    pub fn record_batch(&self, added: usize) {
        self.records.fetch_add(added, Ordering::AcqRel);
        if self.batches.fetch_add(1, Ordering::AcqRel) == 0 {
            // notify_one 会保留许可，等待方晚到也能被唤醒
            self.data_arrived.notify_one();
        }
    }

    /// 等待首批数据到达
    pub async fn wait_for_first_batch(&self) {
        if self.batch_count() > 0 {
            return;
        }
        self.data_arrived.notified().await;
    }
}

/// 监听器配置
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    endpoints: RegexSet,
    throttle_markers: Vec<String>,
    /// 扫描限流标记的前缀字节数
    pub marker_scan_bytes: usize,
    /// 事件流轮询间隔，决定停止信号的响应速度
    pub poll_interval: Duration,
    /// 单个响应体的 JSON 节点预算
    pub max_nodes: usize,
}

impl CaptureSettings {
    pub fn new(
        endpoint_patterns: &[String],
        throttle_markers: &[String],
        marker_scan_bytes: usize,
        poll_interval: Duration,
        max_nodes: usize,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            endpoints: RegexSet::new(endpoint_patterns)?,
            throttle_markers: throttle_markers.iter().map(|m| m.to_lowercase()).collect(),
            marker_scan_bytes,
            poll_interval,
            max_nodes,
        })
    }

    pub fn matches_endpoint(&self, url: &str) -> bool {
        self.endpoints.is_match(url)
    }

    /// 在响应体前缀中查找限流标记（大小写不敏感）
    pub fn is_throttled(&self, body: &str) -> bool {
        let end = body.len().min(self.marker_scan_bytes);
        let prefix = String::from_utf8_lossy(&body.as_bytes()[..end]).to_lowercase();
        self.throttle_markers.iter().any(|m| prefix.contains(m.as_str()))
    }
}

/// 单个响应处理失败的原因
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Body fetch failed: {0}")]
    Fetch(#[from] EngineError),
    #[error("Body decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("Body is not JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// 单个响应体的检查结果
#[derive(Debug, PartialEq)]
pub enum BodyInspection {
    /// 出现限流标记
    Throttled,
    /// 成功解析
    Parsed {
        added: usize,
        candidates: usize,
        exhausted: bool,
    },
}

/// 监听器退出时的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    pub matched: usize,
    pub batches: usize,
    pub records_added: usize,
    pub dropped: usize,
}

/// 网络捕获监听器
///
/// 在后台任务中消费浏览器网络事件：筛选目标接口的响应，读取并解码响应体，
/// 抽取记录放入收集器，并向翻页驱动报告终止信号。
pub struct CaptureListener {
    session: Arc<dyn BrowsingSession>,
    predicate: Arc<dyn RecordPredicate>,
    collector: Arc<RecordCollector>,
    signals: Arc<CaptureSignals>,
    settings: Arc<CaptureSettings>,
    pending: HashMap<String, String>,
    seen_requests: HashSet<String>,
    stats: CaptureStats,
}

impl CaptureListener {
    pub fn new(
        session: Arc<dyn BrowsingSession>,
        predicate: Arc<dyn RecordPredicate>,
        collector: Arc<RecordCollector>,
        signals: Arc<CaptureSignals>,
        settings: Arc<CaptureSettings>,
    ) -> Self {
        Self {
            session,
            predicate,
            collector,
            signals,
            settings,
            pending: HashMap::new(),
            seen_requests: HashSet::new(),
            stats: CaptureStats::default(),
        }
    }

    /// 在后台任务中运行监听器
    ///
    /// # 参数
    ///
    /// * `events` - 会话的网络事件流
    /// * `stop` - 停止信号，值变为 `true` 后在下一个事件间隙退出
    pub fn spawn(
        self,
        events: NetworkEventStream,
        stop: watch::Receiver<bool>,
    ) -> JoinHandle<CaptureStats> {
        tokio::spawn(self.run(events, stop))
    }

    async fn run(mut self, mut events: NetworkEventStream, stop: watch::Receiver<bool>) -> CaptureStats {
        debug!(predicate = self.predicate.name(), "Capture listener started");

        loop {
            if *stop.borrow() {
                break;
            }
            if let Some(signal) = self.signals.terminal() {
                debug!(?signal, "Terminal signal raised, listener stops accepting events");
                break;
            }

            match tokio::time::timeout(self.settings.poll_interval, events.next()).await {
                Ok(Some(event)) => {
                    if !self.handle_event(event).await {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("Network event stream ended");
                    break;
                }
                Err(_) => continue,
            }
        }

        debug!(
            matched = self.stats.matched,
            batches = self.stats.batches,
            records = self.stats.records_added,
            dropped = self.stats.dropped,
            "Capture listener stopped"
        );
        self.stats
    }

    /// 处理单个网络事件，返回 `false` 表示会话已不可用、监听器应退出
    async fn handle_event(&mut self, event: NetworkEvent) -> bool {
        match event {
            NetworkEvent::ResponseReceived { request_id, url } => {
                if !self.settings.matches_endpoint(&url) {
                    return true;
                }
                if !self.seen_requests.insert(request_id.clone()) {
                    return true;
                }
                self.stats.matched += 1;
                self.pending.insert(request_id, url);
            }
            NetworkEvent::LoadingFinished { request_id } => {
                let Some(url) = self.pending.remove(&request_id) else {
                    return true;
                };
                match self.process_response(&request_id, url).await {
                    Ok(BodyInspection::Throttled) => {
                        if self.signals.raise(TerminalSignal::Throttled) {
                            warn!(request_id = %request_id, "Throttle marker found in response body");
                        }
                    }
                    Ok(BodyInspection::Parsed { added, candidates, exhausted }) => {
                        self.stats.batches += 1;
                        self.stats.records_added += added;
                        debug!(request_id = %request_id, added, candidates, "Captured batch");
                        if exhausted && self.signals.raise(TerminalSignal::Empty) {
                            info!(request_id = %request_id, "Response signals no further data");
                        }
                    }
                    Err(CaptureError::Fetch(e)) if !e.is_transient() => {
                        self.stats.dropped += 1;
                        counter!("harvest_capture_events_dropped_total").increment(1);
                        warn!(request_id = %request_id, "Session unavailable, capture listener stops: {}", e);
                        return false;
                    }
                    Err(e) => {
                        self.stats.dropped += 1;
                        counter!("harvest_capture_events_dropped_total").increment(1);
                        warn!(request_id = %request_id, "Dropping captured response: {}", e);
                    }
                }
            }
        }
        true
    }

    async fn process_response(
        &self,
        request_id: &str,
        endpoint_url: String,
    ) -> Result<BodyInspection, CaptureError> {
        let body = self.session.response_body(request_id).await?;
        let event = CaptureEvent {
            request_id: request_id.to_string(),
            endpoint_url,
            raw_body: if body.base64_encoded {
                decode_base64(&body.body)?
            } else {
                body.body.into_bytes()
            },
            is_compressed: body.base64_encoded,
        };

        let (text, codec) = decode_body(&event.raw_body, event.is_compressed)?;
        debug!(
            request_id = %event.request_id,
            endpoint = %event.endpoint_url,
            %codec,
            bytes = text.len(),
            "Decoded response body"
        );

        let inspection = inspect_body(
            &text,
            &self.settings,
            self.predicate.as_ref(),
            &self.collector,
        )?;
        if let BodyInspection::Parsed { added, .. } = inspection {
            self.signals.record_batch(added);
        }
        Ok(inspection)
    }
}

/// 检查已解码的响应体并收集记录
///
/// 限流标记优先于解析；解析成功时同一批次中的记录总会被收集，
/// 即使结构上已经表明没有更多数据。
pub fn inspect_body(
    text: &str,
    settings: &CaptureSettings,
    predicate: &dyn RecordPredicate,
    collector: &RecordCollector,
) -> Result<BodyInspection, serde_json::Error> {
    if settings.is_throttled(text) {
        return Ok(BodyInspection::Throttled);
    }

    let root: Value = serde_json::from_str(text)?;
    let extraction = extract_records(&root, predicate, settings.max_nodes);
    if extraction.truncated {
        warn!(visited = extraction.visited, "JSON node budget exhausted, batch truncated");
    }

    let candidates = extraction.records.len();
    let added = collector.offer_all(extraction.records);
    if added > 0 {
        counter!("harvest_records_captured_total").increment(added as u64);
    }

    Ok(BodyInspection::Parsed {
        added,
        candidates,
        exhausted: predicate.signals_exhaustion(&root),
    })
}
