// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use dashmap::DashSet;
use metrics::{counter, gauge};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::models::crawl_state::CrawlState;
use crate::domain::models::identity::Identity;
use crate::domain::models::summary::Summary;
use crate::domain::models::window::{Window, WindowStatus};
use crate::domain::repositories::crawl_state_repository::CrawlStateRepository;
use crate::domain::repositories::output_repository::OutputRepository;
use crate::domain::services::identity_rotation::{
    IdentityRotationManager, IdentityStart, RotationError,
};
use crate::domain::services::record_collector::RecordCollector;
use crate::domain::services::record_predicate::RecordPredicate;
use crate::domain::services::search_query::SearchQuery;
use crate::domain::services::window_planner::{plan_windows, resume_windows, PlanError};
use crate::engines::traits::{BrowsingSession, EngineError, SessionProvider};
use crate::workers::capture_listener::{CaptureListener, CaptureSettings, CaptureSignals};
use crate::workers::pagination_driver::{DriveOutcome, DriveSettings, PaginationDriver};

/// 抓取错误类型
#[derive(Error, Debug)]
pub enum CrawlError {
    /// 时间范围非法
    #[error("Invalid crawl range: {0}")]
    Plan(#[from] PlanError),
    /// 身份池错误
    #[error("Identity pool error: {0}")]
    Rotation(#[from] RotationError),
    /// 所有身份都在同一窗口被限流
    #[error("Window {window} blocked after {attempts} consecutive throttled attempts")]
    Blocked { window: Window, attempts: usize },
    /// 收到停止信号
    #[error("Crawl cancelled")]
    Cancelled,
}

/// 单次窗口尝试的失败原因
#[derive(Error, Debug)]
enum AttemptError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Attempt cancelled")]
    Cancelled,
}

/// 一次运行的不可变配置
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub identities: Vec<Identity>,
    pub targets: Vec<String>,
    pub since: NaiveDate,
    pub until: NaiveDate,
    pub window_days: u32,
    pub identity_start: IdentityStart,
    pub rotate_delay: Duration,
    pub drive: DriveSettings,
    pub capture: CaptureSettings,
    pub search: SearchQuery,
}

/// 抓取用例
///
/// 按窗口顺序抓取每个目标：绑定身份、打开会话、启动监听器与翻页驱动，
/// 遇到限流时轮换身份并重试同一窗口（收窄到已捕获的最新记录之后）。
/// 每次窗口状态变化都会持久化，进程重启后从断点继续。
pub struct HarvestUseCase<SP, SR, OR> {
    sessions: Arc<SP>,
    state_repo: Arc<SR>,
    output_repo: Arc<OR>,
    predicate: Arc<dyn RecordPredicate>,
    config: Arc<CrawlConfig>,
    capture: Arc<CaptureSettings>,
    driver: PaginationDriver,
    seen: Arc<DashSet<String>>,
    shutdown: watch::Receiver<bool>,
}

impl<SP, SR, OR> HarvestUseCase<SP, SR, OR>
where
    SP: SessionProvider + 'static,
    SR: CrawlStateRepository + 'static,
    OR: OutputRepository + 'static,
{
    pub fn new(
        sessions: Arc<SP>,
        state_repo: Arc<SR>,
        output_repo: Arc<OR>,
        predicate: Arc<dyn RecordPredicate>,
        config: CrawlConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let capture = Arc::new(config.capture.clone());
        let driver = PaginationDriver::new(config.drive.clone());
        Self {
            sessions,
            state_repo,
            output_repo,
            predicate,
            config: Arc::new(config),
            capture,
            driver,
            seen: Arc::new(DashSet::new()),
            shutdown,
        }
    }

    /// 抓取所有目标
    ///
    /// # 返回值
    ///
    /// * `Ok(Vec<Summary>)` - 每个已处理目标一条汇总
    /// * `Err(CrawlError)` - 配置错误（时间范围或身份池），此时不会处理任何目标
    pub async fn run(&self) -> Result<Vec<Summary>, CrawlError> {
        let planned = plan_windows(self.config.since, self.config.until, self.config.window_days)?;
        let mut rotation = IdentityRotationManager::with_start(
            self.config.identities.clone(),
            self.config.identity_start,
        )?;

        info!(
            targets = self.config.targets.len(),
            windows = planned.len(),
            identities = rotation.pool_size(),
            predicate = self.predicate.name(),
            sessions = self.sessions.name(),
            "Starting harvest run"
        );

        let mut summaries = Vec::with_capacity(self.config.targets.len());
        for target in &self.config.targets {
            if self.is_cancelled() {
                warn!(target = %target, "Run cancelled, remaining targets skipped");
                break;
            }

            let collector = Arc::new(RecordCollector::new(self.seen.clone()));
            let result = self
                .crawl_target(target, &planned, &mut rotation, &collector)
                .await;

            self.checkpoint_output(target, &collector).await;

            let summary = match &result {
                Ok(()) => Summary::success(target.as_str(), collector.len()),
                Err(e) => Summary::error(target.as_str(), collector.len(), e.to_string()),
            };
            if summary.is_success() {
                info!(target = %target, records = summary.record_count, "Target finished");
            } else {
                error!(target = %target, records = summary.record_count, "Target failed: {}", summary);
            }
            summaries.push(summary);

            if matches!(result, Err(CrawlError::Cancelled)) {
                break;
            }
        }

        for summary in &summaries {
            info!("{}", summary);
        }
        Ok(summaries)
    }

    async fn crawl_target(
        &self,
        target: &str,
        planned: &[Window],
        rotation: &mut IdentityRotationManager,
        collector: &Arc<RecordCollector>,
    ) -> Result<(), CrawlError> {
        let mut remaining: VecDeque<Window> = planned.iter().cloned().collect();

        match self.state_repo.load(target).await {
            Ok(Some(state)) => match resume_windows(planned, &state.window()) {
                Some(rest) => {
                    info!(
                        target = %target,
                        since = %state.last_since,
                        until = %state.last_until,
                        identity_index = state.last_identity_index,
                        "Resuming from saved state"
                    );
                    rotation.start_from(state.last_identity_index);
                    remaining = rest.into();
                    self.seed_from_previous_output(target, collector).await;
                }
                None => warn!(
                    target = %target,
                    window = %state.window(),
                    "Saved window lies outside the requested range, starting fresh"
                ),
            },
            Ok(None) => debug!(target = %target, "No saved state, starting fresh"),
            Err(e) => warn!(target = %target, "Failed to load crawl state, starting fresh: {}", e),
        }

        while let Some(window) = remaining.pop_front() {
            let resolved = self.resolve_window(target, window, rotation, collector).await?;
            counter!("harvest_windows_resolved_total", "status" => resolved.status.to_string())
                .increment(1);
            info!(target = %target, window = %resolved, status = %resolved.status, "Window resolved");

            self.checkpoint_output(target, collector).await;
            match remaining.front() {
                Some(next) => self.persist_state(target, rotation.current_index(), next).await,
                None => {
                    if let Err(e) = self.state_repo.clear(target).await {
                        warn!(target = %target, "Failed to clear crawl state: {}", e);
                    }
                }
            }
        }

        Ok(())
    }

    /// 反复尝试一个窗口直到完成、为空，或身份池耗尽
    async fn resolve_window(
        &self,
        target: &str,
        mut window: Window,
        rotation: &mut IdentityRotationManager,
        collector: &Arc<RecordCollector>,
    ) -> Result<Window, CrawlError> {
        let mut consecutive_blocks = 0;

        loop {
            if self.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }

            window.status = WindowStatus::InProgress;
            self.persist_state(target, rotation.current_index(), &window).await;

            let offset = collector.len();
            let identity = rotation.current().clone();
            match self.attempt_window(target, &identity, &window, collector).await {
                Ok(DriveOutcome::Completed) => {
                    window.status = WindowStatus::Completed;
                    return Ok(window);
                }
                Ok(DriveOutcome::Empty) => {
                    window.status = WindowStatus::Empty;
                    return Ok(window);
                }
                Ok(DriveOutcome::Blocked) => {
                    warn!(target = %target, identity = %identity, window = %window, "Identity throttled");
                }
                Err(AttemptError::Engine(e)) => {
                    warn!(target = %target, identity = %identity, window = %window, "Window attempt failed: {}", e);
                }
                Err(AttemptError::Cancelled) => return Err(CrawlError::Cancelled),
            }

            window.status = WindowStatus::Blocked;
            rotation.advance();

            let captured = collector
                .latest_timestamp_from(offset)
                .map(|latest| (latest, window.narrow_after(latest)));
            match captured {
                Some((_, None)) => {
                    info!(target = %target, window = %window, "Window fully captured before throttle");
                    window.status = WindowStatus::Completed;
                    return Ok(window);
                }
                Some((latest, Some(narrowed))) if narrowed.since > window.since => {
                    info!(
                        target = %target,
                        captured = collector.len() - offset,
                        latest = %latest,
                        window = %narrowed,
                        "Partial progress before throttle, narrowing window"
                    );
                    window = narrowed;
                    consecutive_blocks = 0;
                    gauge!("harvest_consecutive_blocks").set(0.0);
                }
                _ => {
                    // 没有捕获，或捕获的记录都早于窗口起点：窗口没有前进
                    consecutive_blocks += 1;
                    gauge!("harvest_consecutive_blocks").set(consecutive_blocks as f64);
                    if let Err(e) = rotation.ensure_not_exhausted(consecutive_blocks) {
                        error!(target = %target, window = %window, "{}", e);
                        self.persist_state(target, rotation.current_index(), &window).await;
                        return Err(CrawlError::Blocked {
                            window,
                            attempts: consecutive_blocks,
                        });
                    }
                }
            }

            self.persist_state(target, rotation.current_index(), &window).await;
            self.pause_before_retry().await?;
        }
    }

    #[instrument(
        skip_all,
        fields(target = %target, identity = %identity, since = %window.since, until = %window.until)
    )]
    async fn attempt_window(
        &self,
        target: &str,
        identity: &Identity,
        window: &Window,
        collector: &Arc<RecordCollector>,
    ) -> Result<DriveOutcome, AttemptError> {
        let session = self.sessions.open(identity).await?;
        let result = self.drive_session(session.clone(), target, window, collector).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }
        result
    }

    async fn drive_session(
        &self,
        session: Arc<dyn BrowsingSession>,
        target: &str,
        window: &Window,
        collector: &Arc<RecordCollector>,
    ) -> Result<DriveOutcome, AttemptError> {
        let events = session.network_events().await?;
        let signals = Arc::new(CaptureSignals::new());
        let (stop_tx, stop_rx) = watch::channel(false);

        let listener = CaptureListener::new(
            session.clone(),
            self.predicate.clone(),
            collector.clone(),
            signals.clone(),
            self.capture.clone(),
        )
        .spawn(events, stop_rx);

        let url = self.config.search.url_for(target, window);
        let mut shutdown = self.shutdown.clone();
        let outcome = tokio::select! {
            result = self.driver.drive(session.as_ref(), &url, &signals) => result.map_err(AttemptError::from),
            _ = wait_for_shutdown(&mut shutdown) => Err(AttemptError::Cancelled),
        };

        // 监听器在当前事件处理完后退出
        let _ = stop_tx.send(true);
        match listener.await {
            Ok(stats) => debug!(
                matched = stats.matched,
                batches = stats.batches,
                dropped = stats.dropped,
                "Listener finished"
            ),
            Err(e) => warn!("Capture listener task failed: {}", e),
        }

        info!(records = signals.record_count(), outcome = ?outcome.as_ref().ok(), "Attempt finished");
        outcome
    }

    async fn pause_before_retry(&self) -> Result<(), CrawlError> {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.config.rotate_delay) => Ok(()),
            _ = wait_for_shutdown(&mut shutdown) => Err(CrawlError::Cancelled),
        }
    }

    async fn seed_from_previous_output(&self, target: &str, collector: &RecordCollector) {
        match self.output_repo.load_latest(target).await {
            Ok(records) => {
                let seeded = collector.offer_all(records);
                info!(target = %target, seeded, "Loaded records from previous output");
            }
            Err(e) => warn!(target = %target, "Failed to load previous output: {}", e),
        }
    }

    async fn persist_state(&self, target: &str, identity_index: usize, window: &Window) {
        let state = CrawlState::new(identity_index, window);
        if let Err(e) = self.state_repo.save(target, &state).await {
            warn!(target = %target, "Failed to persist crawl state: {}", e);
        }
    }

    async fn checkpoint_output(&self, target: &str, collector: &RecordCollector) {
        if let Err(e) = self.output_repo.save(target, &collector.snapshot()).await {
            warn!(target = %target, "Failed to write output: {}", e);
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        // 发送端已释放，不会再有停止信号
        futures::future::pending::<()>().await;
    }
}
