//! # 运行记录
//!
//! 预处理与后处理之间唯一传递的状态。预处理结束时一次性写入
//! `workflow_state.json`，后处理开始时读取一次，之后不再修改。
//!
//! 写入先落到临时文件再改名，进程中途被杀不会留下半截的记录。
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `models/job.rs`, `config.rs`

use crate::config::{validate_job_prefix, validate_supercell};
use crate::error::{PhonoflowError, Result};
use crate::models::job::JobDir;

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// 位移基准结构（对称化后的单胞）
    pub unit_structure_path: PathBuf,
    pub supercell_factors: [u32; 3],
    pub job_prefix: String,
    pub job_count: usize,
    /// 元素行原样顺序，不去重不排序
    pub atom_symbols: Vec<String>,
}

impl RunRecord {
    pub fn new(
        unit_structure_path: PathBuf,
        supercell_factors: [u32; 3],
        job_prefix: impl Into<String>,
        job_count: usize,
        atom_symbols: Vec<String>,
    ) -> Result<Self> {
        let record = RunRecord {
            unit_structure_path,
            supercell_factors,
            job_prefix: job_prefix.into(),
            job_count,
            atom_symbols,
        };
        record.validate().map_err(PhonoflowError::InvalidArgument)?;
        Ok(record)
    }

    fn validate(&self) -> std::result::Result<(), String> {
        validate_supercell(&self.supercell_factors).map_err(|e| e.to_string())?;
        validate_job_prefix(&self.job_prefix).map_err(|e| e.to_string())?;
        if self.job_count == 0 {
            return Err("job_count must be at least 1".to_string());
        }
        if self.atom_symbols.is_empty() {
            return Err("atom_symbols must not be empty".to_string());
        }
        Ok(())
    }

    /// 记录隐含的全部作业目录，按序号升序
    pub fn job_dirs(&self, root: &Path) -> Vec<JobDir> {
        (1..=self.job_count)
            .map(|index| JobDir::new(root, &self.job_prefix, index))
            .collect()
    }

    /// ATOM_NAME 字段：元素符号按原顺序直接拼接
    pub fn atom_name(&self) -> String {
        self.atom_symbols.concat()
    }

    /// 原子写入：先写 `<path>.tmp` 再改名
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PhonoflowError::Other(format!("Failed to serialise run record: {}", e)))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json + "\n").map_err(|e| PhonoflowError::FileWriteError {
            path: tmp.display().to_string(),
            source: e,
        })?;
        fs::rename(&tmp, path).map_err(|e| PhonoflowError::FileWriteError {
            path: path.display().to_string(),
            source: e,
        })?;

        log::info!("Run record written to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PhonoflowError::RunRecordMissing {
                    path: path.display().to_string(),
                })
            }
            Err(e) => {
                return Err(PhonoflowError::FileReadError {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };

        let record: RunRecord =
            serde_json::from_str(&content).map_err(|e| PhonoflowError::RunRecordCorrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        record
            .validate()
            .map_err(|reason| PhonoflowError::RunRecordCorrupt {
                path: path.display().to_string(),
                reason,
            })?;

        log::info!("Run record loaded from {}", path.display());
        Ok(record)
    }

    /// 删除旧记录，返回是否确实删除了文件
    pub fn discard(path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PhonoflowError::FileWriteError {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(root: &Path) -> RunRecord {
        RunRecord::new(
            root.join("POSCAR-unitcell"),
            [2, 2, 2],
            "disp",
            8,
            vec!["O".to_string(), "B".to_string(), "O".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("workflow_state.json");
        let record = sample(tmp.path());

        record.save(&path).unwrap();
        assert!(!tmp.path().join("workflow_state.json.tmp").exists());

        let loaded = RunRecord::load(&path).unwrap();
        assert_eq!(loaded, record);
        // 顺序与重复保持不变
        assert_eq!(loaded.atom_symbols, vec!["O", "B", "O"]);
        assert_eq!(loaded.atom_name(), "OBO");
    }

    #[test]
    fn test_stable_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("workflow_state.json");
        sample(tmp.path()).save(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "atom_symbols",
                "job_count",
                "job_prefix",
                "supercell_factors",
                "unit_structure_path"
            ]
        );
    }

    #[test]
    fn test_missing_record() {
        let tmp = TempDir::new().unwrap();
        let err = RunRecord::load(&tmp.path().join("workflow_state.json")).unwrap_err();
        assert!(matches!(err, PhonoflowError::RunRecordMissing { .. }));
    }

    #[test]
    fn test_corrupt_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("workflow_state.json");

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            RunRecord::load(&path),
            Err(PhonoflowError::RunRecordCorrupt { .. })
        ));

        fs::write(
            &path,
            r#"{"unit_structure_path":"POSCAR-unitcell","supercell_factors":[2,0,2],
               "job_prefix":"disp","job_count":4,"atom_symbols":["Si"]}"#,
        )
        .unwrap();
        assert!(matches!(
            RunRecord::load(&path),
            Err(PhonoflowError::RunRecordCorrupt { .. })
        ));
    }

    #[test]
    fn test_new_rejects_invalid() {
        let tmp = TempDir::new().unwrap();
        let unit = tmp.path().join("POSCAR-unitcell");
        assert!(RunRecord::new(unit.clone(), [1, 1, 1], "", 1, vec!["Si".into()]).is_err());
        assert!(RunRecord::new(unit.clone(), [1, 1, 1], "disp", 0, vec!["Si".into()]).is_err());
        assert!(RunRecord::new(unit, [1, 1, 1], "disp", 1, vec![]).is_err());
    }

    #[test]
    fn test_job_dirs_in_order() {
        let tmp = TempDir::new().unwrap();
        let record = sample(tmp.path());
        let names: Vec<_> = record
            .job_dirs(tmp.path())
            .into_iter()
            .map(|j| j.name)
            .collect();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "disp-001");
        assert_eq!(names[7], "disp-008");
    }

    #[test]
    fn test_discard() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("workflow_state.json");
        assert!(!RunRecord::discard(&path).unwrap());
        sample(tmp.path()).save(&path).unwrap();
        assert!(RunRecord::discard(&path).unwrap());
        assert!(!path.exists());
    }
}
