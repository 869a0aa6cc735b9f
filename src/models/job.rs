//! # 作业目录
//!
//! 每个位移结构对应一个 `{prefix}-{index:03}` 目录，序号从 1 开始。
//! 目录由预处理创建，外部引擎在两阶段之间写入结果，后处理只读（清理步骤除外）。
//!
//! ## 依赖关系
//! - 被 `models/run_record.rs`, `phonon/`, `commands/` 使用

use crate::config::{JOB_INDEX_WIDTH, RESULT_DATA_FILE, RESULT_LOG_FILE};

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDir {
    pub name: String,
    pub path: PathBuf,
}

impl JobDir {
    pub fn new(root: &Path, prefix: &str, index: usize) -> Self {
        let name = Self::name_for(prefix, index);
        JobDir {
            path: root.join(&name),
            name,
        }
    }

    /// `disp` + 5 -> `disp-005`
    pub fn name_for(prefix: &str, index: usize) -> String {
        format!("{}-{:0width$}", prefix, index, width = JOB_INDEX_WIDTH)
    }

    pub fn result_log(&self) -> PathBuf {
        self.path.join(RESULT_LOG_FILE)
    }

    pub fn result_data(&self) -> PathBuf {
        self.path.join(RESULT_DATA_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_naming() {
        assert_eq!(JobDir::name_for("disp", 5), "disp-005");
        assert_eq!(JobDir::name_for("441Mono2bo3-disp", 12), "441Mono2bo3-disp-012");
        assert_eq!(JobDir::name_for("disp", 1234), "disp-1234");
    }

    #[test]
    fn test_job_paths() {
        let job = JobDir::new(Path::new("/work"), "disp", 3);
        assert_eq!(job.path, Path::new("/work/disp-003"));
        assert_eq!(job.result_log(), Path::new("/work/disp-003/OUTCAR"));
        assert_eq!(job.result_data(), Path::new("/work/disp-003/vasprun.xml"));
    }
}
