// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use harvestrs::application::use_cases::harvest_use_case::HarvestUseCase;
use harvestrs::config::settings::Settings;
use harvestrs::domain::services::timeline_predicate::TimelinePredicate;
use harvestrs::engines::chromium_session::ChromiumSessionProvider;
use harvestrs::infrastructure::metrics::describe_metrics;
use harvestrs::infrastructure::storage::{JsonFileStateStore, JsonOutputStore};
use harvestrs::utils::telemetry;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

/// 主函数
///
/// 加载配置，组装会话提供者、存储与抓取用例，运行到结束或收到 Ctrl-C
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    let settings = Settings::new()?;

    // 2. Initialize logging
    let _log_guard = telemetry::init_telemetry(&settings.logging)?;
    info!("Starting harvestrs...");
    describe_metrics();

    let crawl_config = settings.crawl_config()?;
    info!(
        targets = crawl_config.targets.len(),
        identities = crawl_config.identities.len(),
        since = %crawl_config.since,
        until = %crawl_config.until,
        "Configuration loaded"
    );

    // 3. Shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, finishing current attempt"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
        let _ = shutdown_tx.send(true);
    });

    // 4. Initialize Components
    let sessions = Arc::new(ChromiumSessionProvider::new(settings.browser_options()));
    let state_store = Arc::new(JsonFileStateStore::new(&settings.storage.state_dir));
    let output_store = Arc::new(JsonOutputStore::new(&settings.storage.output_dir));

    let use_case = HarvestUseCase::new(
        sessions,
        state_store,
        output_store,
        Arc::new(TimelinePredicate::new()),
        crawl_config,
        shutdown_rx,
    );

    // 5. Run
    let summaries = use_case.run().await?;
    let failed = summaries.iter().filter(|s| !s.is_success()).count();
    info!(
        processed = summaries.len(),
        failed,
        records = summaries.iter().map(|s| s.record_count).sum::<usize>(),
        "Harvest finished"
    );

    if failed > 0 {
        anyhow::bail!("{} of {} targets failed", failed, summaries.len());
    }
    Ok(())
}
