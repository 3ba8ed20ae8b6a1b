// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::record::ExtractedRecord;
use crate::domain::services::record_predicate::RecordPredicate;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// `legacy.created_at` 的时间格式，例如 `Thu Mar 13 09:59:29 +0000 2025`
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// 已知响应中 `instructions` 列表的位置
const INSTRUCTION_POINTERS: [&str; 3] = [
    "/data/search_by_raw_query/search_timeline/timeline/instructions",
    "/data/user/result/timeline_v2/timeline/instructions",
    "/data/user/result/timeline/timeline/instructions",
];

/// 已知的时间线节点形态
#[derive(Debug, Deserialize)]
#[serde(tag = "__typename")]
enum TimelineEntity {
    Tweet(TweetNode),
    TweetWithVisibilityResults { tweet: TweetNode },
}

/// 记录的最小字段约定
#[derive(Debug, Deserialize)]
struct TweetNode {
    rest_id: Option<String>,
    id_str: Option<String>,
    id: Option<Value>,
    legacy: Legacy,
}

#[derive(Debug, Deserialize)]
struct Legacy {
    created_at: String,
}

impl TweetNode {
    fn stable_id(&self) -> Option<String> {
        if let Some(id) = self.rest_id.as_ref().or(self.id_str.as_ref()) {
            return Some(id.clone());
        }
        match self.id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// 时间线记录判定器
///
/// 识别 `Tweet` 与 `TweetWithVisibilityResults` 两种带标签的节点，
/// 要求存在稳定ID与可解析的 `legacy.created_at`。
#[derive(Debug, Default, Clone)]
pub struct TimelinePredicate;

impl TimelinePredicate {
    pub fn new() -> Self {
        Self
    }

    fn instruction_entries(root: &Value) -> Option<usize> {
        let instructions = INSTRUCTION_POINTERS
            .iter()
            .find_map(|pointer| root.pointer(pointer))?
            .as_array()?;

        Some(
            instructions
                .iter()
                .filter(|inst| inst.get("type").and_then(Value::as_str) == Some("TimelineAddEntries"))
                .filter_map(|inst| inst.get("entries").and_then(Value::as_array))
                .map(Vec::len)
                .sum(),
        )
    }
}

impl RecordPredicate for TimelinePredicate {
    fn decode(&self, node: &Value) -> Option<ExtractedRecord> {
        let typename = node.get("__typename")?.as_str()?;
        if typename != "Tweet" && typename != "TweetWithVisibilityResults" {
            return None;
        }

        let (tweet, payload) = match TimelineEntity::deserialize(node).ok()? {
            TimelineEntity::Tweet(tweet) => (tweet, node.clone()),
            TimelineEntity::TweetWithVisibilityResults { tweet } => {
                (tweet, node.get("tweet").cloned().unwrap_or(Value::Null))
            }
        };

        let id = tweet.stable_id()?;
        let timestamp = match DateTime::parse_from_str(&tweet.legacy.created_at, CREATED_AT_FORMAT) {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                debug!(id = %id, created_at = %tweet.legacy.created_at, "Unparseable created_at: {}", e);
                return None;
            }
        };

        Some(ExtractedRecord::new(id, timestamp, payload))
    }

    fn signals_exhaustion(&self, root: &Value) -> bool {
        Self::instruction_entries(root).unwrap_or(0) == 0
    }

    fn name(&self) -> &'static str {
        "timeline"
    }
}
