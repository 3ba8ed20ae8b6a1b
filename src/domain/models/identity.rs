// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// 身份实体
///
/// 指向一个预先完成登录的浏览器配置目录。身份由外部的登录引导流程创建，
/// 在爬取过程中只读，从不修改。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// 在身份池中的位置
    pub index: usize,
    /// 身份名称，通常为配置目录的最后一段
    pub name: String,
    /// 浏览器用户数据目录
    pub profile_dir: PathBuf,
}

impl Identity {
    /// 根据配置目录创建身份
    pub fn new(index: usize, profile_dir: impl Into<PathBuf>) -> Self {
        let profile_dir = profile_dir.into();
        let name = profile_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| profile_dir.to_string_lossy().to_string());
        Self {
            index,
            name,
            profile_dir,
        }
    }

    /// 按配置顺序构建身份池
    pub fn pool_from_dirs<I, P>(dirs: I) -> Vec<Identity>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        dirs.into_iter()
            .enumerate()
            .map(|(index, dir)| Identity::new(index, dir.as_ref()))
            .collect()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.index)
    }
}
