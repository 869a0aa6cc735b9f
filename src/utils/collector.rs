//! # 文件收集器
//!
//! 在目录中按 glob 模式收集文件列表。
//!
//! ## 功能
//! - glob 模式匹配（`glob::Pattern`，逗号分隔多模式）
//! - 可选递归搜索
//! - 可选只收集空文件
//!
//! ## 依赖关系
//! - 被 `commands/preprocess.rs`（位移文件发现）与 `phonon/cleanup.rs` 调用
//! - 使用 `walkdir` 遍历目录

use crate::error::{PhonoflowError, Result};

use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 文件收集器
pub struct FileCollector {
    /// 搜索根目录
    root: PathBuf,
    /// 匹配模式列表
    patterns: Vec<Pattern>,
    /// 是否递归
    recursive: bool,
    /// 只收集零长度文件
    empty_only: bool,
}

impl FileCollector {
    /// 创建新的文件收集器，默认匹配所有文件
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            patterns: Vec::new(),
            recursive: false,
            empty_only: false,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.patterns = pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Pattern::new(s).map_err(|e| {
                    PhonoflowError::InvalidArgument(format!("bad glob pattern '{}': {}", s, e))
                })
            })
            .collect::<Result<_>>()?;
        Ok(self)
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn empty_only(mut self, empty_only: bool) -> Self {
        self.empty_only = empty_only;
        self
    }

    /// 收集所有匹配的文件，按路径排序
    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(PhonoflowError::DirectoryNotFound {
                path: self.root.display().to_string(),
            });
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root).max_depth(max_depth).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| self.root.display().to_string());
                PhonoflowError::FileReadError {
                    path,
                    source: e.into(),
                }
            })?;

            if !entry.file_type().is_file() || !self.matches_patterns(entry.path()) {
                continue;
            }

            if self.empty_only {
                let len = entry
                    .metadata()
                    .map_err(|e| PhonoflowError::FileReadError {
                        path: entry.path().display().to_string(),
                        source: e.into(),
                    })?
                    .len();
                if len != 0 {
                    continue;
                }
            }

            files.push(entry.into_path());
        }

        Ok(files)
    }

    /// 检查文件名是否匹配任一模式
    fn matches_patterns(&self, path: &Path) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };
        self.patterns.iter().any(|p| p.matches(filename))
    }
}
