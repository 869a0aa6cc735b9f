//! # 空文件清理
//!
//! 闸门全部通过后，递归删除作业目录树中所有零长度文件。
//! 不询问、可重复执行，非空文件永远不会被删除。
//!
//! ## 依赖关系
//! - 被 `commands/postprocess.rs` 使用
//! - 使用 `utils/collector.rs`

use crate::error::{PhonoflowError, Result};
use crate::models::JobDir;
use crate::utils::collector::FileCollector;

use std::fs;
use std::io;

/// 删除各作业目录下的空文件，返回删除数量
pub fn remove_empty_files(jobs: &[JobDir]) -> Result<usize> {
    let mut removed = 0;

    for job in jobs {
        let empties = FileCollector::new(&job.path)
            .recursive(true)
            .empty_only(true)
            .collect()?;

        for file in &empties {
            match fs::remove_file(file) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(PhonoflowError::FileWriteError {
                        path: file.display().to_string(),
                        source: e,
                    })
                }
            }
        }

        if !empties.is_empty() {
            log::info!("{}: removed {} empty file(s)", job.name, empties.len());
        }
    }

    Ok(removed)
}
