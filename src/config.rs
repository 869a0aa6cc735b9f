//! # 工作流配置
//!
//! 集中定义所有固定文件名、收敛标记、采样密度与超时等常量，
//! 以及在任何阶段执行前组装好的 [`WorkflowConfig`] 与 [`Workspace`]。
//!
//! ## 依赖关系
//! - 被 `commands/`, `phonon/`, `models/` 使用
//! - 使用 `error.rs`

use crate::error::{PhonoflowError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ─────────────────────────────────────────────────────────────
// 工作目录中的文件
// ─────────────────────────────────────────────────────────────

/// 运行记录文件（预处理写入，后处理读取）
pub const RUN_RECORD_FILE: &str = "workflow_state.json";

/// 用户结构在工作目录中的副本
pub const WORK_STRUCTURE_FILE: &str = "POSCAR";

/// `phonopy --symmetry` 的输出
pub const SYMMETRIZED_FILE: &str = "PPOSCAR";

/// 位移基准结构
pub const UNIT_STRUCTURE_FILE: &str = "POSCAR-unitcell";

/// 位移工具生成的文件前缀，后接数字序号
pub const DISPLACEMENT_PREFIX: &str = "POSCAR-";

pub const FORCE_SETS_FILE: &str = "FORCE_SETS";
pub const BAND_CONF_FILE: &str = "band.conf";
pub const BAND_YAML_FILE: &str = "band.yaml";
pub const EXPORT_OUTPUT_FILE: &str = "phononband.out";
pub const CONVERGENCE_REPORT_FILE: &str = "convergence_report.csv";
pub const LOG_FILE_PREFIX: &str = "workflow_";

// ─────────────────────────────────────────────────────────────
// 作业目录中的文件
// ─────────────────────────────────────────────────────────────

pub const JOB_STRUCTURE_FILE: &str = "POSCAR";

/// 每个作业目录都会复制的辅助输入文件
pub const AUX_INPUT_FILES: [&str; 3] = ["INCAR", "KPOINTS", "POTCAR"];

/// 外部引擎写出的结果日志
pub const RESULT_LOG_FILE: &str = "OUTCAR";

/// 力常数聚合时收集的结果数据文件
pub const RESULT_DATA_FILE: &str = "vasprun.xml";

pub const SBATCH_FILE: &str = "submit.sbatch";

/// 作业目录序号宽度：`{prefix}-001`
pub const JOB_INDEX_WIDTH: usize = 3;

// ─────────────────────────────────────────────────────────────
// 收敛判据
// ─────────────────────────────────────────────────────────────

/// 电子步达到目标精度
pub const ACCURACY_MARKER: &str = "aborting loop because EDIFF is reached";

/// 计算正常结束
pub const TERMINATION_MARKER: &str = "Voluntary";

// ─────────────────────────────────────────────────────────────
// 能带配置与导出
// ─────────────────────────────────────────────────────────────

/// 每段路径的采样点数，不可配置
pub const BAND_POINTS: u32 = 51;

pub const EXPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// 由操作者在任何控制器运行前给出的选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub symmetrize: bool,
    pub supercell_factors: [u32; 3],
    pub job_prefix: String,
    pub band_path_override: Option<Vec<String>>,
}

impl WorkflowConfig {
    pub fn validate(&self) -> Result<()> {
        validate_supercell(&self.supercell_factors)?;
        validate_job_prefix(&self.job_prefix)?;
        match self.band_path_override {
            Some(ref path) => validate_band_path(path),
            None => Ok(()),
        }
    }
}

/// 能带路径至少需要两个高对称点
pub fn validate_band_path(tokens: &[String]) -> Result<()> {
    if tokens.len() < 2 {
        return Err(PhonoflowError::InvalidArgument(format!(
            "band path needs at least two high-symmetry points, got '{}'",
            tokens.join(" ")
        )));
    }
    Ok(())
}

/// 扩胞倍数必须全部为正
pub fn validate_supercell(factors: &[u32; 3]) -> Result<()> {
    if factors.iter().any(|&f| f == 0) {
        return Err(PhonoflowError::InvalidArgument(format!(
            "supercell factors must be positive, got {} {} {}",
            factors[0], factors[1], factors[2]
        )));
    }
    Ok(())
}

/// 前缀只能包含 ASCII 字母数字与 `-` `_` `.`，且不能以 `.` 开头
pub fn validate_job_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(PhonoflowError::InvalidArgument(
            "job prefix must not be empty".to_string(),
        ));
    }
    if prefix.starts_with('.') {
        return Err(PhonoflowError::InvalidArgument(format!(
            "job prefix must not start with '.': {}",
            prefix
        )));
    }
    if let Some(bad) = prefix
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(PhonoflowError::InvalidArgument(format!(
            "job prefix contains unsupported character '{}': {}",
            bad, prefix
        )));
    }
    Ok(())
}

/// 共享目录树的根
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Workspace { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.root.join(name)
    }

    pub fn run_record_path(&self) -> PathBuf {
        self.join(RUN_RECORD_FILE)
    }

    pub fn unit_structure_path(&self) -> PathBuf {
        self.join(UNIT_STRUCTURE_FILE)
    }

    /// 确认工作目录存在
    pub fn ensure_exists(&self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(PhonoflowError::DirectoryNotFound {
                path: self.root.display().to_string(),
            });
        }
        Ok(())
    }
}
