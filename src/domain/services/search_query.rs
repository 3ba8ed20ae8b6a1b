// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::window::Window;

/// 搜索页面地址构造器
///
/// 查询模板支持 `{target}`、`{since}`、`{until}` 三个占位符，
/// 日期格式为 `YYYY-MM-DD`。
#[derive(Debug, Clone)]
pub struct SearchQuery {
    base_url: String,
    query_template: String,
    extra_params: String,
}

impl SearchQuery {
    pub fn new(
        base_url: impl Into<String>,
        query_template: impl Into<String>,
        extra_params: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            query_template: query_template.into(),
            extra_params: extra_params.into(),
        }
    }

    /// 渲染查询语句
    pub fn render_query(&self, target: &str, window: &Window) -> String {
        self.query_template
            .replace("{target}", target)
            .replace("{since}", &window.since.format("%Y-%m-%d").to_string())
            .replace("{until}", &window.until.format("%Y-%m-%d").to_string())
    }

    /// 构造窗口对应的搜索页面URL
    pub fn url_for(&self, target: &str, window: &Window) -> String {
        let query = urlencoding::encode(&self.render_query(target, window)).into_owned();
        let mut url = format!("{}?q={}", self.base_url.trim_end_matches('?'), query);
        if !self.extra_params.is_empty() {
            url.push('&');
            url.push_str(self.extra_params.trim_start_matches('&'));
        }
        url
    }
}
