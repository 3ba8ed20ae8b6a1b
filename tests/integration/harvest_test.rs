// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;

use harvestrs::application::use_cases::harvest_use_case::{CrawlConfig, HarvestUseCase};
use harvestrs::domain::models::crawl_state::CrawlState;
use harvestrs::domain::models::record::ExtractedRecord;
use harvestrs::domain::models::summary::{Summary, SummaryStatus};
use harvestrs::domain::models::window::Window;
use harvestrs::domain::repositories::crawl_state_repository::{CrawlStateRepository, StateError};
use harvestrs::domain::repositories::output_repository::{OutputError, OutputRepository};
use harvestrs::domain::services::timeline_predicate::TimelinePredicate;
use harvestrs::infrastructure::storage::{
    InMemoryOutputStore, InMemoryStateStore, JsonFileStateStore, JsonOutputStore,
};
use serde_json::json;
use tokio::sync::watch;

use super::helpers::fake_session::{AttemptScript, Batch, FakeSessionProvider};
use super::helpers::{at, crawl_config, date};

mockall::mock! {
    pub StateRepo {}

    #[async_trait::async_trait]
    impl CrawlStateRepository for StateRepo {
        async fn load(&self, target: &str) -> Result<Option<CrawlState>, StateError>;
        async fn save(&self, target: &str, state: &CrawlState) -> Result<(), StateError>;
        async fn clear(&self, target: &str) -> Result<(), StateError>;
    }
}

mockall::mock! {
    pub OutputRepo {}

    #[async_trait::async_trait]
    impl OutputRepository for OutputRepo {
        async fn save(&self, target: &str, records: &[ExtractedRecord]) -> Result<(), OutputError>;
        async fn load_latest(&self, target: &str) -> Result<Vec<ExtractedRecord>, OutputError>;
    }
}

async fn run_with<SR, OR>(
    provider: Arc<FakeSessionProvider>,
    state: Arc<SR>,
    output: Arc<OR>,
    config: CrawlConfig,
    shutdown: watch::Receiver<bool>,
) -> Vec<Summary>
where
    SR: CrawlStateRepository + 'static,
    OR: OutputRepository + 'static,
{
    HarvestUseCase::new(
        provider,
        state,
        output,
        Arc::new(TimelinePredicate::new()),
        config,
        shutdown,
    )
    .run()
    .await
    .unwrap()
}

async fn run_in_memory(
    provider: Arc<FakeSessionProvider>,
    state: Arc<InMemoryStateStore>,
    output: Arc<InMemoryOutputStore>,
    config: CrawlConfig,
) -> Vec<Summary> {
    let (_tx, rx) = watch::channel(false);
    run_with(provider, state, output, config, rx).await
}

fn searched_since(url: &str, since: &str) -> bool {
    url.contains(&format!("since%3A{}", since))
}

#[tokio::test(start_paused = true)]
async fn test_windows_complete_with_file_stores() {
    let dir = tempfile::tempdir().unwrap();
    let state = Arc::new(JsonFileStateStore::new(dir.path()));
    let output = Arc::new(JsonOutputStore::with_run_stamp(dir.path().join("out"), "20251010_101010"));
    let provider = Arc::new(FakeSessionProvider::new(vec![
        AttemptScript::records(vec![("t1", at(2025, 10, 1, 9)), ("t2", at(2025, 10, 1, 18))]),
        AttemptScript::records(vec![("t1", at(2025, 10, 1, 9)), ("t3", at(2025, 10, 2, 7))]),
    ]));
    let (_tx, rx) = watch::channel(false);

    let summaries = run_with(
        provider.clone(),
        state.clone(),
        output.clone(),
        crawl_config(2, "2025-10-01", "2025-10-03", 1),
        rx,
    )
    .await;

    assert_eq!(summaries, vec![Summary::success("alice", 3)]);
    assert!(state.load("alice").await.unwrap().is_none());

    let ids: Vec<String> = output
        .load_latest("alice")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["t1", "t2", "t3"]);

    let visits = provider.visits();
    assert_eq!(visits.len(), 2);
    assert!(searched_since(&visits[0].url, "2025-10-01"));
    assert!(searched_since(&visits[1].url, "2025-10-02"));
    assert_eq!(provider.closed(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_throttle_rotates_identity_and_retries_window() {
    let state = Arc::new(InMemoryStateStore::new());
    let output = Arc::new(InMemoryOutputStore::new());
    let provider = Arc::new(FakeSessionProvider::new(vec![
        AttemptScript::throttled(),
        AttemptScript::records(vec![("t1", at(2025, 10, 1, 12))]),
    ]));

    let summaries = run_in_memory(
        provider.clone(),
        state.clone(),
        output.clone(),
        crawl_config(3, "2025-10-01", "2025-10-02", 1),
    )
    .await;

    assert_eq!(summaries, vec![Summary::success("alice", 1)]);
    let visits = provider.visits();
    assert_eq!(visits.len(), 2);
    assert_eq!(visits[0].identity, "account_0");
    assert_eq!(visits[1].identity, "account_1");
    assert_eq!(visits[0].url, visits[1].url);
    assert!(state.get("alice").is_none());
    assert_eq!(output.ids("alice"), vec!["t1"]);
}

#[tokio::test(start_paused = true)]
async fn test_whole_pool_blocked_keeps_earlier_windows() {
    let state = Arc::new(InMemoryStateStore::new());
    let output = Arc::new(InMemoryOutputStore::new());
    let provider = Arc::new(FakeSessionProvider::new(vec![
        AttemptScript::records(vec![("t1", at(2025, 10, 1, 12))]),
        AttemptScript::throttled(),
        AttemptScript::throttled(),
        AttemptScript::throttled(),
    ]));

    let summaries = run_in_memory(
        provider.clone(),
        state.clone(),
        output.clone(),
        crawl_config(3, "2025-10-01", "2025-10-03", 1),
    )
    .await;

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].status, SummaryStatus::Error);
    assert_eq!(summaries[0].record_count, 1);
    assert!(summaries[0]
        .error_detail
        .as_deref()
        .unwrap()
        .contains("blocked after 3 consecutive throttled attempts"));

    assert_eq!(output.ids("alice"), vec!["t1"]);
    assert_eq!(provider.opened(), 4);
    assert_eq!(provider.closed(), 4);

    // the blocked window stays persisted for the next run
    let saved = state.get("alice").unwrap();
    assert_eq!(saved.last_since, date("2025-10-02"));
    assert_eq!(saved.last_until, date("2025-10-03"));
    assert_eq!(saved.last_identity_index, 0);
}

#[tokio::test(start_paused = true)]
async fn test_partial_capture_narrows_retry() {
    let state = Arc::new(InMemoryStateStore::new());
    let output = Arc::new(InMemoryOutputStore::new());
    let provider = Arc::new(FakeSessionProvider::new(vec![
        AttemptScript::batches(vec![
            Batch::Records(vec![("t1", at(2025, 10, 1, 12))]),
            Batch::Throttle,
        ]),
        AttemptScript::records(vec![("t2", at(2025, 10, 2, 8))]),
    ]));

    let summaries = run_in_memory(
        provider.clone(),
        state.clone(),
        output.clone(),
        crawl_config(2, "2025-10-01", "2025-10-04", 3),
    )
    .await;

    assert_eq!(summaries, vec![Summary::success("alice", 2)]);
    let visits = provider.visits();
    assert_eq!(visits.len(), 2);
    assert!(searched_since(&visits[0].url, "2025-10-01"));
    assert!(searched_since(&visits[1].url, "2025-10-02"));
    assert!(visits[1].url.contains("until%3A2025-10-04"));
    assert_eq!(output.ids("alice"), vec!["t1", "t2"]);
}

#[tokio::test(start_paused = true)]
async fn test_narrowing_past_window_end_completes() {
    let provider = Arc::new(FakeSessionProvider::new(vec![AttemptScript::batches(vec![
        Batch::Records(vec![("t1", at(2025, 10, 1, 23))]),
        Batch::Throttle,
    ])]));

    let summaries = run_in_memory(
        provider.clone(),
        Arc::new(InMemoryStateStore::new()),
        Arc::new(InMemoryOutputStore::new()),
        crawl_config(2, "2025-10-01", "2025-10-02", 1),
    )
    .await;

    assert_eq!(summaries, vec![Summary::success("alice", 1)]);
    assert_eq!(provider.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_records_older_than_window_do_not_reset_block_counter() {
    let provider = Arc::new(FakeSessionProvider::new(vec![
        AttemptScript::batches(vec![
            Batch::Records(vec![("quoted-1", at(2025, 9, 1, 12))]),
            Batch::Throttle,
        ]),
        AttemptScript::batches(vec![
            Batch::Records(vec![("quoted-2", at(2025, 9, 1, 13))]),
            Batch::Throttle,
        ]),
        AttemptScript::records(vec![("late", at(2025, 10, 5, 9))]),
    ]));
    let state = Arc::new(InMemoryStateStore::new());
    let output = Arc::new(InMemoryOutputStore::new());

    let summaries = run_in_memory(
        provider.clone(),
        state.clone(),
        output.clone(),
        crawl_config(2, "2025-10-05", "2025-10-06", 1),
    )
    .await;

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].status, SummaryStatus::Error);
    assert!(summaries[0]
        .error_detail
        .as_deref()
        .unwrap()
        .contains("blocked after 2 consecutive throttled attempts"));
    assert_eq!(provider.opened(), 2);
    assert_eq!(output.ids("alice"), vec!["quoted-1", "quoted-2"]);

    let saved = state.get("alice").unwrap();
    assert_eq!(saved.last_since, date("2025-10-05"));
    assert_eq!(saved.last_until, date("2025-10-06"));
}

#[tokio::test(start_paused = true)]
async fn test_ui_notice_counts_as_throttle() {
    let provider = Arc::new(FakeSessionProvider::new(vec![
        AttemptScript {
            batches: vec![Batch::Records(vec![("t1", at(2025, 10, 1, 6))])],
            ui_notice: true,
            fail_open: false,
        },
        AttemptScript::records(vec![("t2", at(2025, 10, 2, 6))]),
    ]));
    let output = Arc::new(InMemoryOutputStore::new());

    let summaries = run_in_memory(
        provider.clone(),
        Arc::new(InMemoryStateStore::new()),
        output.clone(),
        crawl_config(2, "2025-10-01", "2025-10-03", 2),
    )
    .await;

    assert_eq!(summaries, vec![Summary::success("alice", 2)]);
    let visits = provider.visits();
    assert_eq!(visits.len(), 2);
    assert_eq!(visits[1].identity, "account_1");
    assert!(searched_since(&visits[1].url, "2025-10-02"));
}

#[tokio::test(start_paused = true)]
async fn test_resume_skips_finished_windows_and_unions_output() {
    let state = Arc::new(InMemoryStateStore::new());
    state.insert(
        "alice",
        CrawlState::new(1, &Window::new(date("2025-10-02"), date("2025-10-03"))),
    );
    let output = Arc::new(InMemoryOutputStore::new());
    output
        .save(
            "alice",
            &[ExtractedRecord::new("t1", at(2025, 10, 1, 10), json!({ "rest_id": "t1" }))],
        )
        .await
        .unwrap();

    let provider = Arc::new(FakeSessionProvider::new(vec![AttemptScript::records(vec![
        ("t1", at(2025, 10, 1, 10)),
        ("t9", at(2025, 10, 2, 10)),
    ])]));

    let summaries = run_in_memory(
        provider.clone(),
        state.clone(),
        output.clone(),
        crawl_config(3, "2025-10-01", "2025-10-03", 1),
    )
    .await;

    assert_eq!(summaries, vec![Summary::success("alice", 2)]);
    let visits = provider.visits();
    assert_eq!(visits.len(), 1);
    assert_eq!(visits[0].identity, "account_1");
    assert!(searched_since(&visits[0].url, "2025-10-02"));
    assert_eq!(output.ids("alice"), vec!["t1", "t9"]);
    assert!(state.get("alice").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_block_resumes_with_file_stores() {
    let dir = tempfile::tempdir().unwrap();
    let out_dir = dir.path().join("out");
    let config = || crawl_config(2, "2025-10-01", "2025-10-03", 1);

    // first run: window 1 completes, window 2 exhausts the pool
    let state = Arc::new(JsonFileStateStore::new(dir.path()));
    let first_output = Arc::new(JsonOutputStore::with_run_stamp(&out_dir, "20251010_101010"));
    let first = Arc::new(FakeSessionProvider::new(vec![
        AttemptScript::records(vec![("t1", at(2025, 10, 1, 9)), ("t2", at(2025, 10, 1, 20))]),
        AttemptScript::throttled(),
        AttemptScript::throttled(),
    ]));
    let (_tx, rx) = watch::channel(false);

    let summaries = run_with(first.clone(), state.clone(), first_output, config(), rx).await;

    assert_eq!(summaries[0].status, SummaryStatus::Error);
    assert_eq!(summaries[0].record_count, 2);
    let saved = state.load("alice").await.unwrap().unwrap();
    assert_eq!(saved.window(), Window::new(date("2025-10-02"), date("2025-10-03")));

    // second run: fresh process, new output file, same directories
    let state = Arc::new(JsonFileStateStore::new(dir.path()));
    let second_output = Arc::new(JsonOutputStore::with_run_stamp(&out_dir, "20251011_080000"));
    let second = Arc::new(FakeSessionProvider::new(vec![AttemptScript::records(vec![
        ("t2", at(2025, 10, 1, 20)),
        ("t3", at(2025, 10, 2, 11)),
    ])]));
    let (_tx, rx) = watch::channel(false);

    let summaries = run_with(second.clone(), state.clone(), second_output.clone(), config(), rx).await;

    assert_eq!(summaries, vec![Summary::success("alice", 3)]);
    let visits = second.visits();
    assert_eq!(visits.len(), 1);
    assert!(searched_since(&visits[0].url, "2025-10-02"));
    assert_eq!(visits[0].identity, format!("account_{}", saved.last_identity_index));

    let ids: Vec<String> = second_output
        .load_latest("alice")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["t1", "t2", "t3"]);
    assert!(state.load("alice").await.unwrap().is_none());
    assert_eq!(std::fs::read_dir(out_dir.join("alice")).unwrap().count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_session_open_failure_rotates() {
    let provider = Arc::new(FakeSessionProvider::new(vec![
        AttemptScript::failing_open(),
        AttemptScript::records(vec![("t1", at(2025, 10, 1, 12))]),
    ]));

    let summaries = run_in_memory(
        provider.clone(),
        Arc::new(InMemoryStateStore::new()),
        Arc::new(InMemoryOutputStore::new()),
        crawl_config(2, "2025-10-01", "2025-10-02", 1),
    )
    .await;

    assert_eq!(summaries, vec![Summary::success("alice", 1)]);
    assert_eq!(provider.opened(), 2);
    assert_eq!(provider.closed(), 1);
    assert_eq!(provider.visits()[0].identity, "account_1");
}

#[tokio::test(start_paused = true)]
async fn test_persistence_failures_do_not_abort() {
    let mut state = MockStateRepo::new();
    state.expect_load().returning(|_| Ok(None));
    state
        .expect_save()
        .returning(|_, _| Err(StateError::Other("disk full".to_string())));
    state
        .expect_clear()
        .times(1)
        .returning(|_| Err(StateError::Other("read-only filesystem".to_string())));

    let mut output = MockOutputRepo::new();
    output
        .expect_save()
        .returning(|_, _| Err(OutputError::Io(std::io::Error::other("disk full"))));
    output.expect_load_latest().never();

    let provider = Arc::new(FakeSessionProvider::new(vec![
        AttemptScript::records(vec![("t1", at(2025, 10, 1, 12))]),
        AttemptScript::records(vec![("t2", at(2025, 10, 2, 12))]),
    ]));
    let (_tx, rx) = watch::channel(false);

    let summaries = run_with(
        provider.clone(),
        Arc::new(state),
        Arc::new(output),
        crawl_config(1, "2025-10-01", "2025-10-03", 1),
        rx,
    )
    .await;

    assert_eq!(summaries, vec![Summary::success("alice", 2)]);
    assert_eq!(provider.visits().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_run_and_keeps_state() {
    let state = Arc::new(InMemoryStateStore::new());
    let provider = Arc::new(FakeSessionProvider::new(vec![AttemptScript::batches(vec![
        Batch::Records(vec![("t1", at(2025, 10, 1, 12))]),
        Batch::Nothing,
    ])]));
    let (tx, rx) = watch::channel(false);
    provider.cancel_on_open(1, tx);

    let mut config = crawl_config(2, "2025-10-01", "2025-10-03", 1);
    config.targets = vec!["alice".to_string(), "bob".to_string()];

    let summaries = run_with(
        provider.clone(),
        state.clone(),
        Arc::new(InMemoryOutputStore::new()),
        config,
        rx,
    )
    .await;

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].target, "alice");
    assert_eq!(summaries[0].error_detail.as_deref(), Some("Crawl cancelled"));
    assert_eq!(provider.opened(), 1);
    assert_eq!(provider.closed(), 1);

    let saved = state.get("alice").unwrap();
    assert_eq!(saved.last_since, date("2025-10-01"));
    assert!(state.get("bob").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_multiple_targets_share_rotation() {
    let provider = Arc::new(FakeSessionProvider::new(vec![
        AttemptScript::throttled(),
        AttemptScript::records(vec![("a1", at(2025, 10, 1, 12))]),
        AttemptScript::records(vec![("b1", at(2025, 10, 1, 13))]),
    ]));
    let output = Arc::new(InMemoryOutputStore::new());
    let mut config = crawl_config(2, "2025-10-01", "2025-10-02", 1);
    config.targets = vec!["alice".to_string(), "bob".to_string()];

    let summaries = run_in_memory(
        provider.clone(),
        Arc::new(InMemoryStateStore::new()),
        output.clone(),
        config,
    )
    .await;

    assert_eq!(
        summaries,
        vec![Summary::success("alice", 1), Summary::success("bob", 1)]
    );
    let identities: Vec<String> = provider.visits().into_iter().map(|v| v.identity).collect();
    assert_eq!(identities, vec!["account_0", "account_1", "account_1"]);
    assert!(provider.visits()[2].url.contains("from%3Abob"));
    assert_eq!(output.ids("bob"), vec!["b1"]);
}
