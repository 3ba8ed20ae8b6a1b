// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod fake_session;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use harvestrs::application::use_cases::harvest_use_case::CrawlConfig;
use harvestrs::domain::models::identity::Identity;
use harvestrs::domain::services::identity_rotation::IdentityStart;
use harvestrs::domain::services::search_query::SearchQuery;
use harvestrs::workers::capture_listener::CaptureSettings;
use harvestrs::workers::pagination_driver::DriveSettings;
use std::time::Duration;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn identities(count: usize) -> Vec<Identity> {
    (0..count)
        .map(|i| Identity::new(i, format!("/profiles/account_{}", i)))
        .collect()
}

/// 构造测试用配置，所有等待都很短，配合暂停的时钟使用
pub fn crawl_config(pool: usize, since: &str, until: &str, window_days: u32) -> CrawlConfig {
    CrawlConfig {
        identities: identities(pool),
        targets: vec!["alice".to_string()],
        since: date(since),
        until: date(until),
        window_days,
        identity_start: IdentityStart::First,
        rotate_delay: Duration::from_secs(5),
        drive: DriveSettings {
            max_iterations: 20,
            pagination_pause: Duration::from_millis(500),
            stall_iterations: 3,
            first_batch_timeout: Duration::from_secs(2),
            page_load_timeout: Duration::from_secs(5),
            ui_throttle_markers: vec!["Something went wrong".to_string()],
        },
        capture: CaptureSettings::new(
            &["SearchTimeline".to_string(), "UserTweets".to_string()],
            &["rate limit exceeded".to_string()],
            1000,
            Duration::from_millis(20),
            10_000,
        )
        .unwrap(),
        search: SearchQuery::new(
            "https://x.com/search",
            "from:{target} since:{since} until:{until}",
            "f=live",
        ),
    }
}
