// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::record::ExtractedRecord;
use serde_json::Value;

/// 记录判定特质
///
/// 定义"什么样的 JSON 节点算一条记录"。上游响应结构的漂移由实现方负责，
/// 核心只负责遍历与去重。
pub trait RecordPredicate: Send + Sync {
    /// 尝试把一个 JSON 节点解码为记录
    fn decode(&self, node: &Value) -> Option<ExtractedRecord>;

    /// 判断一个完整响应是否表示当前范围已经没有更多数据
    fn signals_exhaustion(&self, _root: &Value) -> bool {
        false
    }

    /// 判定器名称
    fn name(&self) -> &'static str;
}

/// 一次遍历的结果
#[derive(Debug, Default)]
pub struct Extraction {
    /// 按文档顺序找到的候选记录
    pub records: Vec<ExtractedRecord>,
    /// 访问过的节点数
    pub visited: usize,
    /// 是否因节点预算耗尽而提前停止
    pub truncated: bool,
}

/// 在 JSON 树中查找所有候选记录
///
/// 使用显式栈做前序遍历，避免深层嵌套或恶意构造的响应导致栈溢出；
/// 访问的节点数不超过 `max_nodes`。命中记录的节点仍会继续向下遍历，
/// 嵌套记录同样会被收集，重复的ID交给去重集合处理。
pub fn extract_records(root: &Value, predicate: &dyn RecordPredicate, max_nodes: usize) -> Extraction {
    let mut extraction = Extraction::default();
    let mut stack: Vec<&Value> = vec![root];

    while let Some(node) = stack.pop() {
        if extraction.visited >= max_nodes {
            extraction.truncated = true;
            break;
        }
        extraction.visited += 1;

        match node {
            Value::Object(map) => {
                if let Some(record) = predicate.decode(node) {
                    extraction.records.push(record);
                }
                let children: Vec<&Value> = map.values().filter(|v| is_container(v)).collect();
                stack.extend(children.into_iter().rev());
            }
            Value::Array(items) => {
                stack.extend(items.iter().filter(|v| is_container(v)).rev());
            }
            _ => {}
        }
    }

    extraction
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}
